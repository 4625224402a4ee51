use hedron_common::transport::Channel;
use hedron_common::AccountId;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Shared handle to a pooled node.
pub type NodeHandle = Arc<Node>;

#[derive(Debug)]
struct Health {
    current_backoff: Duration,
    readmit_at: Instant,
    consecutive_failures: u32,
}

/// One server endpoint.
///
/// A node starts healthy with its backoff at the pool minimum. Each
/// escalation doubles the backoff (up to the pool maximum) and keeps the
/// node out of rotation for that long; each successful call halves it
/// again.
pub struct Node {
    account_id: AccountId,
    address: String,
    health: Mutex<Health>,
    channel: Mutex<Option<Arc<dyn Channel>>>,
}

impl Node {
    pub fn new(account_id: AccountId, address: impl Into<String>, min_backoff: Duration) -> Self {
        Self {
            account_id,
            address: address.into(),
            health: Mutex::new(Health {
                current_backoff: min_backoff,
                readmit_at: Instant::now(),
                consecutive_failures: 0,
            }),
            channel: Mutex::new(None),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// A node is healthy once its readmit instant has passed.
    pub fn is_healthy(&self) -> bool {
        self.health().readmit_at <= Instant::now()
    }

    /// How long until the node is readmitted; zero when healthy.
    pub fn remaining_backoff(&self) -> Duration {
        self.health().readmit_at.saturating_duration_since(Instant::now())
    }

    pub fn current_backoff(&self) -> Duration {
        self.health().current_backoff
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.health().consecutive_failures
    }

    pub(crate) fn escalate(&self, max_backoff: Duration) -> Duration {
        let mut health = self.health();
        health.current_backoff = (health.current_backoff * 2).min(max_backoff);
        health.readmit_at = Instant::now() + health.current_backoff;
        health.consecutive_failures += 1;
        health.current_backoff
    }

    pub(crate) fn decrease(&self, min_backoff: Duration) -> Duration {
        let mut health = self.health();
        health.current_backoff = (health.current_backoff / 2).max(min_backoff);
        health.consecutive_failures = 0;
        health.current_backoff
    }

    pub(crate) fn cached_channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn cache_channel(&self, channel: Arc<dyn Channel>) {
        *self.channel.lock().unwrap_or_else(|e| e.into_inner()) = Some(channel);
    }

    fn health(&self) -> MutexGuard<'_, Health> {
        self.health.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let health = self.health();
        f.debug_struct("Node")
            .field("account_id", &self.account_id)
            .field("address", &self.address)
            .field("current_backoff", &health.current_backoff)
            .field("consecutive_failures", &health.consecutive_failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_millis(250);
    const MAX: Duration = Duration::from_secs(2);

    fn node() -> Node {
        Node::new(AccountId::from_num(3), "127.0.0.1:50211", MIN)
    }

    #[test]
    fn test_node_creation() {
        let node = node();
        assert_eq!(node.account_id(), AccountId::from_num(3));
        assert_eq!(node.address(), "127.0.0.1:50211");
        assert!(node.is_healthy());
        assert_eq!(node.remaining_backoff(), Duration::ZERO);
        assert_eq!(node.current_backoff(), MIN);
        assert!(node.cached_channel().is_none());
    }

    #[test]
    fn test_escalate_doubles_until_cap() {
        let node = node();

        assert_eq!(node.escalate(MAX), Duration::from_millis(500));
        assert_eq!(node.escalate(MAX), Duration::from_secs(1));
        assert_eq!(node.escalate(MAX), MAX);
        assert_eq!(node.escalate(MAX), MAX);
        assert_eq!(node.consecutive_failures(), 4);
    }

    #[test]
    fn test_escalated_node_is_unhealthy() {
        let node = node();
        node.escalate(MAX);

        assert!(!node.is_healthy());
        let remaining = node.remaining_backoff();
        assert!(remaining > Duration::ZERO && remaining <= Duration::from_millis(500));
    }

    #[test]
    fn test_decrease_halves_until_floor() {
        let node = node();
        node.escalate(MAX);
        node.escalate(MAX);

        assert_eq!(node.decrease(MIN), Duration::from_millis(500));
        assert_eq!(node.consecutive_failures(), 0);
        assert_eq!(node.decrease(MIN), MIN);
        assert_eq!(node.decrease(MIN), MIN);
    }
}
