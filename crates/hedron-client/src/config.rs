use hedron_common::{AccountId, Amount, HedronError, Result};
use hedron_network::NodePoolConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::client::DEFAULT_MAX_QUERY_PAYMENT;

/// Operator credentials as stored in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// `shard.realm.num`
    pub account_id: String,
    /// Hex-encoded Ed25519 seed
    pub private_key: String,
}

/// Client configuration loadable from a JSON file.
///
/// Every field has a default, so a file only needs to list the network:
///
/// ```json
/// { "network": { "127.0.0.1:50211": "0.0.3" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Node address (`host:port`) to node account id
    pub network: BTreeMap<String, String>,
    /// Account paying for queries and transactions
    pub operator: Option<OperatorConfig>,
    /// Overrides every request's own attempt limit
    ///
    /// Default: None (requests use their own limit, 10 unless set)
    pub max_attempts: Option<usize>,
    /// Initial per-request backoff in milliseconds
    ///
    /// Default: 250ms
    pub min_backoff_ms: u64,
    /// Per-request backoff ceiling in milliseconds
    ///
    /// Default: 8000ms
    pub max_backoff_ms: u64,
    /// Deadline for a single transport call
    ///
    /// Default: None (the channel's own timeout applies)
    pub request_timeout_ms: Option<u64>,
    /// Most a paid query may cost, in tinyunits
    ///
    /// Default: 1 unit
    pub default_max_query_payment: Amount,
    /// Backoff a node starts at and decays back to
    ///
    /// Default: 8000ms
    pub node_min_backoff_ms: u64,
    /// Ceiling for a failing node's backoff
    ///
    /// Default: 1 hour
    pub node_max_backoff_ms: u64,
    /// Candidate nodes per request
    ///
    /// Default: None (a third of the network)
    pub max_nodes_per_request: Option<usize>,
    /// Address-book refresh period; None disables the refresher
    ///
    /// Default: 24 hours
    pub address_book_refresh_secs: Option<u64>,
    /// Regenerate expired transaction ids
    ///
    /// Default: true
    pub regenerate_transaction_id: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: BTreeMap::new(),
            operator: None,
            max_attempts: None,
            min_backoff_ms: 250,
            max_backoff_ms: 8000,
            request_timeout_ms: None,
            default_max_query_payment: DEFAULT_MAX_QUERY_PAYMENT,
            node_min_backoff_ms: 8000,
            node_max_backoff_ms: 60 * 60 * 1000,
            max_nodes_per_request: None,
            address_book_refresh_secs: Some(24 * 60 * 60),
            regenerate_transaction_id: true,
        }
    }
}

impl ClientConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.is_empty() {
            return Err(HedronError::Config("network must list at least one node".to_string()));
        }
        if self.min_backoff_ms > self.max_backoff_ms {
            return Err(HedronError::Config(format!(
                "min_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.min_backoff_ms, self.max_backoff_ms
            )));
        }
        if self.node_min_backoff_ms > self.node_max_backoff_ms {
            return Err(HedronError::Config(format!(
                "node_min_backoff_ms ({}) exceeds node_max_backoff_ms ({})",
                self.node_min_backoff_ms, self.node_max_backoff_ms
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(HedronError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.max_nodes_per_request == Some(0) {
            return Err(HedronError::Config("max_nodes_per_request must be at least 1".to_string()));
        }
        if self.default_max_query_payment < Amount::ZERO {
            return Err(HedronError::Config("default_max_query_payment must not be negative".to_string()));
        }
        Ok(())
    }

    /// `(account, address)` pairs for the node pool.
    pub fn network_entries(&self) -> Result<Vec<(AccountId, String)>> {
        self.network
            .iter()
            .map(|(address, account)| {
                let account_id = account
                    .parse()
                    .map_err(|_| HedronError::Config(format!("invalid node account '{}' for {}", account, address)))?;
                Ok((account_id, address.clone()))
            })
            .collect()
    }

    pub fn pool_config(&self) -> NodePoolConfig {
        NodePoolConfig {
            min_backoff: Duration::from_millis(self.node_min_backoff_ms),
            max_backoff: Duration::from_millis(self.node_max_backoff_ms),
            max_nodes_per_request: self.max_nodes_per_request,
        }
    }
}
