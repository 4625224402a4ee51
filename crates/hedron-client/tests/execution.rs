mod common;

use common::*;
use hedron_client::{backoff_for_attempt, AccountBalanceQuery, HedronError, PrivateKey, TransferTransaction};
use hedron_common::transport::{RpcCode, RpcStatus};
use hedron_common::{AccountId, Amount, Status};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

#[test]
fn test_backoff_after_each_attempt_is_pinned() {
    let min = Duration::from_millis(250);
    let max = Duration::from_secs(8);

    let expected_ms = [250, 500, 1000, 2000, 4000, 8000, 16000, 16000, 16000, 16000];
    for (attempt, expected) in expected_ms.into_iter().enumerate() {
        assert_eq!(
            backoff_for_attempt(min, max, attempt),
            Duration::from_millis(expected),
            "attempt {}",
            attempt
        );
    }
}

#[tokio::test]
async fn test_always_busy_dispatches_exactly_the_cap() {
    let network = StubNetwork::new(|_, _| query_status(Status::Busy));
    let client = bare_client(&network, &[3]);
    client.set_max_attempts(4);

    let err = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .execute(&client)
        .await
        .unwrap_err();

    assert_eq!(network.calls().len(), 4);
    match err {
        HedronError::AttemptsExhausted { attempts, last } => {
            assert_eq!(attempts, 4);
            assert_eq!(last.and_then(|e| e.status()), Some(Status::Busy));
        }
        other => panic!("expected AttemptsExhausted, got {:?}", other),
    }

    let snapshot = client.metrics_snapshot();
    assert_eq!(snapshot.attempts, 4);
    assert_eq!(snapshot.retries, 4);
    assert_eq!(snapshot.failed_executions, 1);
}

#[tokio::test]
async fn test_request_attempt_limit_applies_without_client_override() {
    let network = StubNetwork::new(|_, _| query_status(Status::PlatformNotActive));
    let client = bare_client(&network, &[3]);

    let err = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .max_attempts(2)
        .execute(&client)
        .await
        .unwrap_err();

    assert!(matches!(err, HedronError::AttemptsExhausted { attempts: 2, .. }));
    assert_eq!(network.calls().len(), 2);
}

#[tokio::test]
async fn test_busy_twice_then_ok_heals_node() {
    let node_slot: Arc<OnceLock<hedron_network::NodeHandle>> = Arc::new(OnceLock::new());
    let observed = Arc::new(Mutex::new(Vec::new()));

    let network = {
        let node_slot = node_slot.clone();
        let observed = observed.clone();
        StubNetwork::new(move |_, index| {
            if let Some(node) = node_slot.get() {
                observed.lock().unwrap().push(node.current_backoff());
            }
            if index < 2 {
                query_status(Status::Busy)
            } else {
                query_ok(balance_body(1001, 42))
            }
        })
    };
    let client = bare_client(&network, &[3]);

    let node = client.pool().select_by_account(AccountId::from_num(3)).unwrap();
    for _ in 0..3 {
        client.pool().escalate_backoff(&node);
    }
    assert_eq!(node.current_backoff(), Duration::from_millis(8));
    node_slot.set(node.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(node.is_healthy());

    let balance = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .execute(&client)
        .await
        .unwrap();

    assert_eq!(balance.balance, Amount::from_tinyunits(42));
    assert_eq!(network.calls().len(), 3);

    let ms: Vec<u64> = observed.lock().unwrap().iter().map(|d| d.as_millis() as u64).collect();
    assert_eq!(ms, vec![8, 4, 2]);
    assert_eq!(node.current_backoff(), Duration::from_millis(1));
    assert!(node.current_backoff() < Duration::from_millis(4));
}

#[tokio::test]
async fn test_backing_off_node_is_waited_for_without_dispatch() {
    let dispatched_at = Arc::new(Mutex::new(Vec::new()));
    let network = {
        let dispatched_at = dispatched_at.clone();
        StubNetwork::new(move |_, _| {
            dispatched_at.lock().unwrap().push(Instant::now());
            query_ok(balance_body(1001, 5))
        })
    };
    let client = bare_client(&network, &[3]);

    let node = client.pool().select_by_account(AccountId::from_num(3)).unwrap();
    for _ in 0..6 {
        client.pool().escalate_backoff(&node);
    }
    let escalated_at = Instant::now();
    assert_eq!(node.current_backoff(), Duration::from_millis(64));
    assert!(!node.is_healthy());

    let balance = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .node_account_ids([AccountId::from_num(3)])
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(balance.balance, Amount::from_tinyunits(5));

    let dispatched_at = dispatched_at.lock().unwrap().clone();
    assert_eq!(dispatched_at.len(), 1);
    assert!(dispatched_at[0].duration_since(escalated_at) >= Duration::from_millis(60));

    let snapshot = client.metrics_snapshot();
    assert_eq!(snapshot.attempts, 1);
    assert_eq!(snapshot.retries, 1);
}

#[tokio::test]
async fn test_channel_open_failure_escalates_and_next_node_serves() {
    let network = StubNetwork::new(|_, _| ack(Status::Ok));
    let connector = Arc::new(RefusingConnector {
        network: network.clone(),
        refused: address(3),
    });
    let client = bare_client_over(connector, &[3, 4]);
    client.set_operator(OPERATOR, PrivateKey::generate());

    let response = TransferTransaction::new()
        .transfer(OPERATOR, Amount::from_tinyunits(-1))
        .transfer(AccountId::from_num(1002), Amount::from_tinyunits(1))
        .node_account_ids([AccountId::from_num(3), AccountId::from_num(4)])
        .execute(&client)
        .await
        .unwrap();

    assert_eq!(response.node_account_id, AccountId::from_num(4));
    let nodes: Vec<u64> = network.calls().iter().map(|call| call.node()).collect();
    assert_eq!(nodes, vec![4]);

    let refused = client.pool().select_by_account(AccountId::from_num(3)).unwrap();
    assert_eq!(refused.consecutive_failures(), 1);
    assert_eq!(client.metrics_snapshot().nodes["0.0.3"].failure_count, 1);
}

#[tokio::test]
async fn test_unavailable_node_is_escalated_and_next_node_used() {
    let network = StubNetwork::new(|call, _| {
        if call.node() == 3 {
            Err(RpcStatus::unavailable("connection refused"))
        } else {
            query_ok(balance_body(1001, 7))
        }
    });
    let client = bare_client(&network, &[3, 4]);

    let mut query = AccountBalanceQuery::new();
    query
        .account_id(AccountId::from_num(1001))
        .node_account_ids([AccountId::from_num(3), AccountId::from_num(4)]);
    let balance = query.execute(&client).await.unwrap();

    assert_eq!(balance.balance, Amount::from_tinyunits(7));
    let nodes: Vec<u64> = network.calls().iter().map(|call| call.node()).collect();
    assert_eq!(nodes, vec![3, 4]);

    let node3 = client.pool().select_by_account(AccountId::from_num(3)).unwrap();
    assert_eq!(node3.consecutive_failures(), 1);
    assert_eq!(node3.current_backoff(), Duration::from_millis(2));

    let snapshot = client.metrics_snapshot();
    assert_eq!(snapshot.transport_failures, 1);
    assert_eq!(snapshot.nodes["0.0.3"].failure_count, 1);
}

#[tokio::test]
async fn test_stream_reset_is_retried() {
    let network = StubNetwork::new(|_, index| {
        if index == 0 {
            Err(RpcStatus::new(RpcCode::Internal, "Received RST_STREAM with code 2"))
        } else {
            query_ok(balance_body(1001, 1))
        }
    });
    let client = bare_client(&network, &[3, 4]);

    let mut query = AccountBalanceQuery::new();
    query
        .account_id(AccountId::from_num(1001))
        .node_account_ids([AccountId::from_num(3), AccountId::from_num(4)]);

    assert!(query.execute(&client).await.is_ok());
    assert_eq!(network.calls().len(), 2);
}

#[tokio::test]
async fn test_non_retryable_transport_failure_is_terminal() {
    let network = StubNetwork::new(|_, _| Err(RpcStatus::new(RpcCode::Internal, "handler panicked")));
    let client = bare_client(&network, &[3, 4]);

    let err = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .execute(&client)
        .await
        .unwrap_err();

    match err {
        HedronError::TransportTerminal { attempts, status } => {
            assert_eq!(attempts, 1);
            assert_eq!(status.code, RpcCode::Internal);
        }
        other => panic!("expected TransportTerminal, got {:?}", other),
    }
    assert_eq!(network.calls().len(), 1);
}

#[tokio::test]
async fn test_request_timeout_is_deadline_exceeded() {
    let network = StubNetwork::new(|_, _| query_ok(balance_body(1001, 1)));
    network.set_delay(Duration::from_millis(500));
    let client = bare_client(&network, &[3]);

    let err = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .request_timeout(Duration::from_millis(20))
        .execute(&client)
        .await
        .unwrap_err();

    match err {
        HedronError::TransportTerminal { attempts: 1, status } => {
            assert_eq!(status.code, RpcCode::DeadlineExceeded);
        }
        other => panic!("expected a deadline failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_pinned_node_fails_fast() {
    let network = StubNetwork::new(|_, _| query_ok(balance_body(1001, 1)));
    let client = bare_client(&network, &[3]);

    let err = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .node_account_ids([AccountId::from_num(99)])
        .execute(&client)
        .await
        .unwrap_err();

    assert!(matches!(err, HedronError::InvalidNode(id) if id == AccountId::from_num(99)));
    assert!(network.calls().is_empty());
}

#[tokio::test]
async fn test_non_retryable_precheck_is_returned_at_once() {
    let network = StubNetwork::new(|_, _| query_status(Status::InvalidAccountId));
    let client = bare_client(&network, &[3]);

    let err = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .execute(&client)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(Status::InvalidAccountId));
    assert_eq!(network.calls().len(), 1);
}

#[tokio::test]
async fn test_successful_execution_is_recorded() {
    let network = StubNetwork::new(|_, _| query_ok(balance_body(1001, 5)));
    let client = bare_client(&network, &[3]);

    AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .execute(&client)
        .await
        .unwrap();

    let snapshot = client.metrics_snapshot();
    assert_eq!(snapshot.executions, 1);
    assert_eq!(snapshot.successful_executions, 1);
    assert_eq!(snapshot.methods["CryptoService/cryptoGetBalance"].success_count, 1);
    assert_eq!(snapshot.nodes["0.0.3"].attempt_count, 1);
}
