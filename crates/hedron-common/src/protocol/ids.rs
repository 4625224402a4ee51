//! Entity and transaction identities.
//!
//! Accounts, files and topics share the `shard.realm.num` shape. A
//! [`TransactionId`] pairs the paying account with a valid-start
//! [`Timestamp`] and is the idempotency key the network deduplicates on.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::SystemTime;

use super::error::HedronError;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Last valid-start (unix nanos) reserved by [`TransactionId::generate_span`].
static LAST_VALID_START: AtomicI64 = AtomicI64::new(0);

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        pub struct $name {
            pub shard: u64,
            pub realm: u64,
            pub num: u64,
        }

        impl $name {
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }

            /// Shorthand for an entity in shard 0, realm 0.
            pub const fn from_num(num: u64) -> Self {
                Self { shard: 0, realm: 0, num }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = HedronError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let parts: Vec<&str> = s.split('.').collect();
                let parse = |part: &str| {
                    part.parse::<u64>().map_err(|_| {
                        HedronError::InvalidRequest(format!(
                            "invalid {} '{}': expected shard.realm.num",
                            stringify!($name),
                            s
                        ))
                    })
                };
                match parts.as_slice() {
                    [shard, realm, num] => Ok(Self::new(parse(shard)?, parse(realm)?, parse(num)?)),
                    [num] => Ok(Self::from_num(parse(num)?)),
                    _ => Err(HedronError::InvalidRequest(format!(
                        "invalid {} '{}': expected shard.realm.num",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }
    };
}

entity_id!(
    /// A network account. Nodes are addressed by their account id too.
    AccountId
);
entity_id!(
    /// A stored file.
    FileId
);
entity_id!(
    /// A consensus topic.
    TopicId
);

/// Seconds and nanoseconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_unix_nanos(system_time_nanos())
    }

    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self {
            seconds: nanos.div_euclid(NANOS_PER_SECOND),
            nanos: nanos.rem_euclid(NANOS_PER_SECOND) as u32,
        }
    }

    /// `None` when the timestamp does not fit in an `i64` of nanoseconds.
    pub fn to_unix_nanos(self) -> Option<i64> {
        self.seconds
            .checked_mul(NANOS_PER_SECOND)?
            .checked_add(i64::from(self.nanos))
    }

    /// Adds `nanos`, carrying into seconds. `None` on overflow.
    pub fn checked_plus_nanos(self, nanos: u64) -> Option<Self> {
        let per_second = NANOS_PER_SECOND as u64;
        let total = u64::from(self.nanos) + nanos % per_second;
        let carry = i64::try_from(nanos / per_second + total / per_second).ok()?;

        Some(Self {
            seconds: self.seconds.checked_add(carry)?,
            nanos: (total % per_second) as u32,
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

fn system_time_nanos() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Identity of one logical operation: payer account plus valid-start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Timestamp,
}

impl TransactionId {
    pub fn new(account_id: AccountId, valid_start: Timestamp) -> Self {
        Self { account_id, valid_start }
    }

    /// Generates a fresh id for `account_id`.
    ///
    /// The valid-start is backdated by a random 5-8 seconds to tolerate clock
    /// skew against the nodes, and is always strictly later than every id
    /// previously generated in this process, so a regenerated id never
    /// collides with or precedes the one it replaces.
    pub fn generate(account_id: AccountId) -> Self {
        Self::generate_span(account_id, 1)
    }

    /// Generates the first id of a `span`-part operation.
    ///
    /// All of `for_chunk(0..span)` is reserved, so no later generated id
    /// lands on one of the chunk ids.
    pub fn generate_span(account_id: AccountId, span: usize) -> Self {
        let span = i64::try_from(span.max(1)).unwrap_or(i64::MAX);
        let backdate = rand::thread_rng().gen_range(5 * NANOS_PER_SECOND..8 * NANOS_PER_SECOND);
        let candidate = system_time_nanos() - backdate;

        loop {
            let last = LAST_VALID_START.load(Ordering::Acquire);
            let next = candidate.max(last.saturating_add(1));
            let reserved = next.saturating_add(span - 1);

            if LAST_VALID_START
                .compare_exchange_weak(last, reserved, Ordering::SeqCst, Ordering::Acquire)
                .is_ok()
            {
                return Self::new(account_id, Timestamp::from_unix_nanos(next));
            }
        }
    }

    /// The id of chunk `index` in a multi-part operation started by `self`.
    ///
    /// Saturates at the largest representable timestamp; use
    /// [`try_for_chunk`](Self::try_for_chunk) to detect that.
    pub fn for_chunk(&self, index: usize) -> Self {
        self.try_for_chunk(index).unwrap_or(Self::new(
            self.account_id,
            Timestamp {
                seconds: i64::MAX,
                nanos: (NANOS_PER_SECOND - 1) as u32,
            },
        ))
    }

    pub fn try_for_chunk(&self, index: usize) -> Result<Self, HedronError> {
        let valid_start = self.valid_start.checked_plus_nanos(index as u64).ok_or_else(|| {
            HedronError::InvalidRequest(format!("transaction id {} has no room for chunk {}", self, index))
        })?;
        Ok(Self::new(self.account_id, valid_start))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)
    }
}

impl FromStr for TransactionId {
    type Err = HedronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HedronError::InvalidRequest(format!("invalid transaction id '{}'", s));

        let (account, timestamp) = s.split_once('@').ok_or_else(invalid)?;
        let (seconds, nanos) = timestamp.split_once('.').ok_or_else(invalid)?;

        // Nanoseconds are always written as exactly nine digits.
        if nanos.len() != 9 || !nanos.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        Ok(Self::new(
            account.parse()?,
            Timestamp {
                seconds: seconds.parse().map_err(|_| invalid())?,
                nanos: nanos.parse().map_err(|_| invalid())?,
            },
        ))
    }
}
