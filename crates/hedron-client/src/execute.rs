//! The attempt/retry loop shared by every query and transaction.
//!
//! One call drives its attempts strictly in sequence. Each attempt picks a
//! node, builds the wire payload, dispatches it and classifies the outcome.
//! Transport failures and retryable prechecks are absorbed until the attempt
//! cap is reached; everything else is returned at once.

use hedron_common::transport::RpcStatus;
use hedron_common::{HedronError, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::classify::should_retry_transport;
use crate::client::Client;
use crate::executable::{Executable, ExecutionState, RequestKind};

/// Backoff slept after a retryable precheck on attempt `attempt`.
///
/// The backoff doubles on every attempt after the first as long as it has
/// not yet exceeded `max`, so the attempt that crosses `max` may land on up
/// to twice its value.
pub fn backoff_for_attempt(min: Duration, max: Duration, attempt: usize) -> Duration {
    let mut backoff = min;
    for step in 1..=attempt {
        backoff = next_backoff(step, backoff, max);
    }
    backoff
}

fn next_backoff(attempt: usize, backoff: Duration, max: Duration) -> Duration {
    if attempt > 0 && backoff <= max {
        backoff * 2
    } else {
        backoff
    }
}

pub(crate) async fn execute<E: Executable>(client: &Client, request: &mut E) -> Result<E::Response> {
    let start = Instant::now();
    let method = request.method().to_string();

    let result = run(client, request).await;
    client.metrics().record_execution(&method, start, result.is_ok());

    result
}

async fn run<E: Executable>(client: &Client, request: &mut E) -> Result<E::Response> {
    let pool = client.pool();
    let metrics = client.metrics();

    let max_attempts = client.max_attempts().unwrap_or_else(|| request.max_attempts());
    let (min_backoff, max_backoff) = request.backoff_bounds(client);
    let method = request.method();

    let mut backoff = min_backoff;
    let mut last_error: Option<HedronError> = None;

    for attempt in 0..max_attempts {
        backoff = next_backoff(attempt, backoff, max_backoff);

        if request.kind() == RequestKind::Transaction && attempt > 0 && request.node_selection().len() > 1 {
            request.advance();
        }

        let wire_request = request.build_request(attempt)?;

        let node = match request.current_node() {
            None => pool.select_any()?,
            Some(account_id) => pool
                .select_by_account(account_id)
                .ok_or(HedronError::InvalidNode(account_id))?,
        };
        let node_id = node.account_id().to_string();

        if !node.is_healthy() {
            let wait = node.remaining_backoff();
            debug!(
                node = %node_id,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "node is backing off; waiting before next attempt"
            );
            metrics.record_retry();
            last_error = Some(HedronError::NodeUnavailable(format!(
                "node {} is backing off",
                node_id
            )));
            tokio::time::sleep(wait).await;
            continue;
        }

        let channel = match pool.acquire_channel(&node) {
            Ok(channel) => channel,
            Err(e) => {
                warn!(node = %node_id, attempt, error = %e, "failed to open channel");
                pool.escalate_backoff(&node);
                metrics.record_node_failure(&node_id);
                last_error = Some(e);
                continue;
            }
        };

        if request.kind() == RequestKind::Query {
            request.advance();
        }

        debug!(
            node = %node_id,
            %method,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            "dispatching request"
        );
        metrics.record_attempt(&node_id);

        let call = channel.unary(method, wire_request.clone());
        let outcome = match request.request_timeout(client) {
            Some(timeout) => tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
                Err(RpcStatus::deadline_exceeded(format!(
                    "request timed out after {}ms",
                    timeout.as_millis()
                )))
            }),
            None => call.await,
        };

        let response = match outcome {
            Ok(response) => response,
            Err(status) => {
                metrics.record_transport_failure();
                if should_retry_transport(&status) {
                    warn!(node = %node_id, attempt, status = %status, "retryable transport failure");
                    pool.escalate_backoff(&node);
                    metrics.record_node_failure(&node_id);
                    last_error = Some(HedronError::Rpc(status));
                    continue;
                }

                return Err(HedronError::TransportTerminal {
                    attempts: attempt + 1,
                    status,
                });
            }
        };

        pool.decrease_backoff(&node);

        match request.classify(&response) {
            ExecutionState::Finished => {
                return request.map_response(response, node.account_id(), wire_request);
            }
            ExecutionState::Retry => {
                let error = request.map_status_error(&response);
                debug!(
                    node = %node_id,
                    attempt,
                    status = %response.precheck(),
                    backoff_ms = backoff.as_millis() as u64,
                    "node asked to retry"
                );
                metrics.record_retry();
                last_error = Some(error);
                tokio::time::sleep(backoff).await;
            }
            ExecutionState::Expired => {
                let previous = request.transaction_id();
                if request.kind() == RequestKind::Transaction && request.regenerate_identity(client)? {
                    info!(
                        previous = ?previous.map(|id| id.to_string()),
                        regenerated = ?request.transaction_id().map(|id| id.to_string()),
                        "transaction expired; regenerated transaction id"
                    );
                    metrics.record_expiration();
                    last_error = Some(request.map_status_error(&response));
                    continue;
                }

                return Err(request.map_status_error(&response));
            }
            ExecutionState::Error => {
                return Err(request.map_status_error(&response));
            }
        }
    }

    Err(HedronError::AttemptsExhausted {
        attempts: max_attempts,
        last: last_error.map(Box::new),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_millis(250);
    const MAX: Duration = Duration::from_secs(1);

    #[test]
    fn test_backoff_schedule_pins_overshoot() {
        let schedule: Vec<u64> = (0..6)
            .map(|attempt| backoff_for_attempt(MIN, MAX, attempt).as_millis() as u64)
            .collect();

        // 1000 <= max, so it still doubles once more and overshoots to 2000.
        assert_eq!(schedule, vec![250, 500, 1000, 2000, 2000, 2000]);
    }

    #[test]
    fn test_backoff_exact_cap_multiple() {
        let max = Duration::from_millis(8000);
        assert_eq!(backoff_for_attempt(MIN, max, 5), Duration::from_millis(8000));
        assert_eq!(backoff_for_attempt(MIN, max, 6), Duration::from_millis(16000));
        assert_eq!(backoff_for_attempt(MIN, max, 7), Duration::from_millis(16000));
    }

    #[test]
    fn test_backoff_min_above_max() {
        let min = Duration::from_secs(2);
        assert_eq!(backoff_for_attempt(min, MAX, 0), min);
        assert_eq!(backoff_for_attempt(min, MAX, 3), min);
    }
}
