use hedron_common::transport::{Channel, Connector};
use hedron_common::{AccountId, HedronError, Result};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::node::{Node, NodeHandle};

/// Node backoff bounds and request fan-out.
#[derive(Debug, Clone)]
pub struct NodePoolConfig {
    /// Backoff a node starts at and decays back to.
    pub min_backoff: Duration,
    /// Ceiling for a node's backoff after repeated failures.
    pub max_backoff: Duration,
    /// Candidate nodes handed to each request; `None` means a third of the
    /// network, at least one.
    pub max_nodes_per_request: Option<usize>,
}

impl Default for NodePoolConfig {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_secs(8),
            max_backoff: Duration::from_secs(60 * 60),
            max_nodes_per_request: None,
        }
    }
}

/// All known nodes of one network.
///
/// Health state lives on each [`Node`]; the pool only owns membership and
/// the connector used to open channels.
pub struct NodePool {
    nodes: RwLock<Vec<NodeHandle>>,
    connector: Arc<dyn Connector>,
    config: NodePoolConfig,
    cursor: AtomicUsize,
}

impl NodePool {
    /// Creates a pool from `(account, address)` entries.
    ///
    /// An account listed twice keeps its first address.
    pub fn new(
        entries: impl IntoIterator<Item = (AccountId, String)>,
        connector: Arc<dyn Connector>,
        config: NodePoolConfig,
    ) -> Self {
        let nodes = dedup_entries(entries)
            .into_iter()
            .map(|(account_id, address)| Arc::new(Node::new(account_id, address, config.min_backoff)))
            .collect();

        Self {
            nodes: RwLock::new(nodes),
            connector,
            config,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &NodePoolConfig {
        &self.config
    }

    pub fn nodes(&self) -> Vec<NodeHandle> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Round-robin over healthy nodes.
    ///
    /// When every node is backing off, the one readmitted soonest is
    /// returned so the caller can wait for it.
    pub fn select_any(&self) -> Result<NodeHandle> {
        let nodes = self.read();
        if nodes.is_empty() {
            return Err(HedronError::NodeUnavailable("node pool is empty".to_string()));
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        let healthy = (0..nodes.len())
            .map(|offset| &nodes[(start + offset) % nodes.len()])
            .find(|node| node.is_healthy());

        let node = match healthy {
            Some(node) => node,
            None => nodes
                .iter()
                .min_by_key(|node| node.remaining_backoff())
                .ok_or_else(|| HedronError::NodeUnavailable("node pool is empty".to_string()))?,
        };

        Ok(node.clone())
    }

    pub fn select_by_account(&self, account_id: AccountId) -> Option<NodeHandle> {
        self.read().iter().find(|node| node.account_id() == account_id).cloned()
    }

    /// Candidate accounts for a request that did not pin its own nodes.
    ///
    /// Healthy nodes are preferred and shuffled so concurrent requests spread
    /// across the network.
    pub fn node_account_ids_for_request(&self) -> Vec<AccountId> {
        let nodes = self.read();

        let mut candidates: Vec<AccountId> = nodes
            .iter()
            .filter(|node| node.is_healthy())
            .map(|node| node.account_id())
            .collect();
        if candidates.is_empty() {
            candidates = nodes.iter().map(|node| node.account_id()).collect();
        }

        let count = self
            .config
            .max_nodes_per_request
            .unwrap_or((nodes.len() + 2) / 3)
            .clamp(1, candidates.len().max(1));

        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(count);
        candidates
    }

    /// Returns the node's channel, opening one on first use.
    pub fn acquire_channel(&self, node: &Node) -> Result<Arc<dyn Channel>> {
        if let Some(channel) = node.cached_channel() {
            return Ok(channel);
        }

        let channel = self.connector.connect(node.address())?;
        debug!(node = %node.account_id(), address = node.address(), "opened channel");
        node.cache_channel(channel.clone());
        Ok(channel)
    }

    pub fn escalate_backoff(&self, node: &Node) {
        let backoff = node.escalate(self.config.max_backoff);
        warn!(
            node = %node.account_id(),
            backoff_ms = backoff.as_millis() as u64,
            failures = node.consecutive_failures(),
            "node marked unhealthy"
        );
    }

    pub fn decrease_backoff(&self, node: &Node) {
        node.decrease(self.config.min_backoff);
    }

    /// Replaces the membership with `entries`.
    ///
    /// Nodes whose account and address are unchanged keep their handle, so
    /// health state and cached channels survive a refresh. Returns the new
    /// node count.
    pub fn replace_membership(&self, entries: impl IntoIterator<Item = (AccountId, String)>) -> usize {
        let entries = dedup_entries(entries);
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());

        let mut retained = 0;
        let next: Vec<NodeHandle> = entries
            .into_iter()
            .map(|(account_id, address)| {
                match nodes
                    .iter()
                    .find(|node| node.account_id() == account_id && node.address() == address)
                {
                    Some(existing) => {
                        retained += 1;
                        existing.clone()
                    }
                    None => Arc::new(Node::new(account_id, address, self.config.min_backoff)),
                }
            })
            .collect();

        let removed = nodes.len() - retained;
        let added = next.len() - retained;
        *nodes = next;

        info!(nodes = nodes.len(), added, removed, "replaced network membership");
        nodes.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<NodeHandle>> {
        self.nodes.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn dedup_entries(entries: impl IntoIterator<Item = (AccountId, String)>) -> Vec<(AccountId, String)> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for (account_id, address) in entries {
        if seen.contains(&account_id) {
            debug!(node = %account_id, address = %address, "ignoring duplicate node entry");
            continue;
        }
        seen.push(account_id);
        out.push((account_id, address));
    }
    out
}
