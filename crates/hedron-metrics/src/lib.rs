//! Hedron Execution Metrics
//!
//! Thread-safe counters describing what the execution engine did: how many
//! requests were executed, how many attempts and retries that took, which
//! nodes were contacted and how often they failed.
//!
//! # Architecture
//!
//! - [`MetricsRegistry`]: atomic counters plus per-method and per-node maps
//! - [`MetricsCollector`]: the recording interface the engine talks to
//! - [`MetricsSnapshot`]: serializable point-in-time copy of the registry
//!
//! # Usage Example
//!
//! ```rust
//! use hedron_metrics::{ClientMetricsCollector, MetricsCollector};
//! use std::time::Instant;
//!
//! let collector = ClientMetricsCollector::new();
//!
//! let start = Instant::now();
//! collector.record_attempt("0.0.3");
//! collector.record_execution("CryptoService/cryptoGetBalance", start, true);
//!
//! let snapshot = collector.snapshot();
//! assert_eq!(snapshot.executions, 1);
//! assert_eq!(snapshot.attempts, 1);
//! ```
//!
//! # Thread Safety
//!
//! Counter increments are lock-free. The method and node maps sit behind a
//! `RwLock` that is only written when a new key first appears.

mod collector;
mod registry;
mod snapshot;

pub use collector::{ClientMetricsCollector, MetricsCollector};
pub use registry::MetricsRegistry;
pub use snapshot::{MethodMetrics, MetricsSnapshot, NodeMetrics};
