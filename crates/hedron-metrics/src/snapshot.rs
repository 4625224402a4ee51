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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome counts for one RPC method, e.g. `CryptoService/cryptoGetBalance`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodMetrics {
    pub call_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_latency_us: u64,
}

/// Attempts sent to one node, keyed by its account id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node_account_id: String,
    pub attempt_count: u64,
    pub failure_count: u64,
    pub last_attempt_ms: u64,
}

impl NodeMetrics {
    pub fn new(node_account_id: String) -> Self {
        Self {
            node_account_id,
            attempt_count: 0,
            failure_count: 0,
            last_attempt_ms: 0,
        }
    }
}

/// Complete metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Calls to `execute`, one per request (or per chunk).
    pub executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    /// Individual dispatches to a node.
    pub attempts: u64,
    /// Attempts that ended in a retry decision (busy, transport, unhealthy node).
    pub retries: u64,
    pub transport_failures: u64,
    /// Transaction ids regenerated after an expiry precheck.
    pub expirations: u64,
    pub uptime_ms: u64,
    pub methods: HashMap<String, MethodMetrics>,
    pub nodes: HashMap<String, NodeMetrics>,
}

impl MetricsSnapshot {
    /// Fraction of executions that succeeded, or `None` before the first one.
    pub fn success_rate(&self) -> Option<f64> {
        if self.executions == 0 {
            None
        } else {
            Some(self.successful_executions as f64 / self.executions as f64)
        }
    }
}
