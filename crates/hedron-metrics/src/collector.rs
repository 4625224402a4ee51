// Copyright 2025 Hedron Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::registry::MetricsRegistry;
use crate::snapshot::MetricsSnapshot;
use std::sync::Arc;
use std::time::Instant;

/// Recording interface used by the execution engine.
///
/// The engine calls these from inside its retry loop, so implementations
/// must be cheap and must never block on I/O.
pub trait MetricsCollector: Send + Sync {
    /// Records a finished execution.
    ///
    /// # Arguments
    /// * `method` - The RPC method as `service/name`
    /// * `start_time` - When `execute` was entered
    /// * `success` - Whether the execution produced a value
    fn record_execution(&self, method: &str, start_time: Instant, success: bool);

    /// Records one dispatch to a node.
    fn record_attempt(&self, node_account_id: &str);

    /// Records that a node was marked unhealthy after an attempt.
    fn record_node_failure(&self, node_account_id: &str);

    /// Records an attempt that ended in a retry decision.
    fn record_retry(&self);

    /// Records an attempt that failed at the transport layer.
    fn record_transport_failure(&self);

    /// Records a transaction id regenerated after expiry.
    fn record_expiration(&self);

    fn snapshot(&self) -> MetricsSnapshot;
}

/// Default collector backed by a [`MetricsRegistry`].
///
/// # Example
///
/// ```rust
/// use hedron_metrics::{ClientMetricsCollector, MetricsCollector};
///
/// let collector = ClientMetricsCollector::new();
/// collector.record_retry();
/// assert_eq!(collector.snapshot().retries, 1);
/// ```
#[derive(Debug, Clone)]
pub struct ClientMetricsCollector {
    registry: Arc<MetricsRegistry>,
}

impl ClientMetricsCollector {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Creates a collector over a shared registry, so several clients can
    /// report into one place.
    pub fn with_registry(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }
}

impl Default for ClientMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for ClientMetricsCollector {
    fn record_execution(&self, method: &str, start_time: Instant, success: bool) {
        let latency_us = start_time.elapsed().as_micros() as u64;
        self.registry.record_execution(method, latency_us, success);
    }

    fn record_attempt(&self, node_account_id: &str) {
        self.registry.record_attempt(node_account_id);
    }

    fn record_node_failure(&self, node_account_id: &str) {
        self.registry.record_node_failure(node_account_id);
    }

    fn record_retry(&self) {
        self.registry.record_retry();
    }

    fn record_transport_failure(&self) {
        self.registry.record_transport_failure();
    }

    fn record_expiration(&self) {
        self.registry.record_expiration();
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot()
    }
}
