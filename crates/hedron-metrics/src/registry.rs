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

use crate::snapshot::{MethodMetrics, MetricsSnapshot, NodeMetrics};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::{Instant, SystemTime};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Default)]
struct MethodStats {
    call_count: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    total_latency_us: AtomicU64,
}

impl MethodStats {
    fn record(&self, latency_us: u64, success: bool) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> MethodMetrics {
        let call_count = self.call_count.load(Ordering::Relaxed);
        let total_latency_us = self.total_latency_us.load(Ordering::Relaxed);

        MethodMetrics {
            call_count,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            avg_latency_us: total_latency_us.checked_div(call_count).unwrap_or(0),
        }
    }
}

#[derive(Debug, Default)]
struct NodeStats {
    attempt_count: AtomicU64,
    failure_count: AtomicU64,
    last_attempt_ms: AtomicU64,
}

impl NodeStats {
    fn snapshot(&self, node_account_id: &str) -> NodeMetrics {
        NodeMetrics {
            node_account_id: node_account_id.to_string(),
            attempt_count: self.attempt_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            last_attempt_ms: self.last_attempt_ms.load(Ordering::Relaxed),
        }
    }
}

/// Thread-safe store behind a [`crate::ClientMetricsCollector`].
///
/// Global counters are plain atomics with relaxed ordering; snapshots are
/// best-effort and may observe counters mid-update. Per-method and per-node
/// entries are created on first use under a write lock and updated
/// lock-free afterwards.
///
/// # Example
///
/// ```rust
/// use hedron_metrics::MetricsRegistry;
///
/// let registry = MetricsRegistry::new();
/// registry.record_attempt("0.0.3");
/// registry.record_execution("CryptoService/cryptoGetBalance", 150, true);
///
/// let snapshot = registry.snapshot();
/// assert_eq!(snapshot.nodes["0.0.3"].attempt_count, 1);
/// ```
#[derive(Debug)]
pub struct MetricsRegistry {
    executions: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    transport_failures: AtomicU64,
    expirations: AtomicU64,
    methods: StdRwLock<HashMap<String, Arc<MethodStats>>>,
    nodes: StdRwLock<HashMap<String, Arc<NodeStats>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            executions: AtomicU64::new(0),
            successful_executions: AtomicU64::new(0),
            failed_executions: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            methods: StdRwLock::new(HashMap::new()),
            nodes: StdRwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records one finished execution of `method`.
    pub fn record_execution(&self, method: &str, latency_us: u64, success: bool) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_executions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_executions.fetch_add(1, Ordering::Relaxed);
        }

        self.method_stats(method).record(latency_us, success);
    }

    /// Records one dispatch to `node_account_id`.
    pub fn record_attempt(&self, node_account_id: &str) {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let stats = self.node_stats(node_account_id);
        stats.attempt_count.fetch_add(1, Ordering::Relaxed);
        stats.last_attempt_ms.store(now_ms(), Ordering::Relaxed);
    }

    /// Records that `node_account_id` was penalized after an attempt.
    pub fn record_node_failure(&self, node_account_id: &str) {
        self.node_stats(node_account_id)
            .failure_count
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let methods = self
            .methods
            .read()
            .map(|methods| {
                methods
                    .iter()
                    .map(|(name, stats)| (name.clone(), stats.snapshot()))
                    .collect()
            })
            .unwrap_or_default();

        let nodes = self
            .nodes
            .read()
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|(id, stats)| (id.clone(), stats.snapshot(id)))
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            successful_executions: self.successful_executions.load(Ordering::Relaxed),
            failed_executions: self.failed_executions.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms(),
            methods,
            nodes,
        }
    }

    fn method_stats(&self, method: &str) -> Arc<MethodStats> {
        if let Some(stats) = self.methods.read().ok().and_then(|m| m.get(method).cloned()) {
            return stats;
        }

        match self.methods.write() {
            Ok(mut methods) => methods.entry(method.to_string()).or_default().clone(),
            Err(poisoned) => poisoned.into_inner().entry(method.to_string()).or_default().clone(),
        }
    }

    fn node_stats(&self, node_account_id: &str) -> Arc<NodeStats> {
        if let Some(stats) = self.nodes.read().ok().and_then(|n| n.get(node_account_id).cloned()) {
            return stats;
        }

        match self.nodes.write() {
            Ok(mut nodes) => nodes.entry(node_account_id.to_string()).or_default().clone(),
            Err(poisoned) => poisoned.into_inner().entry(node_account_id.to_string()).or_default().clone(),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
