//! End-to-end runs over the JSON-RPC HTTP channel against in-process nodes.

use hedron_client::{AccountBalanceQuery, Client, PrivateKey, TransferTransaction};
use hedron_common::{
    AccountId, Amount, JsonRpcRequest, JsonRpcResponse, Status, TransactionAck, WireQueryResponse, WireRequest,
    WireResponse,
};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Answers with a wire response, or `None` for an HTTP 503.
type Reply = dyn Fn(&str, &WireRequest) -> Option<WireResponse> + Send + Sync;

struct TestNode {
    addr: String,
    methods: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestNode {
    async fn new(reply: impl Fn(&str, &WireRequest) -> Option<WireResponse> + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let methods = Arc::new(Mutex::new(Vec::new()));
        let reply: Arc<Reply> = Arc::new(reply);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let server_methods = methods.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { continue };
                        let reply = reply.clone();
                        let methods = server_methods.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req: Request<Incoming>| {
                                let reply = reply.clone();
                                let methods = methods.clone();
                                async move {
                                    let body = req.into_body().collect().await?.to_bytes();
                                    let request: JsonRpcRequest = serde_json::from_slice(&body).unwrap();
                                    methods.lock().unwrap().push(request.method.clone());
                                    Ok::<_, hyper::Error>(respond(request, reply.as_ref()))
                                }
                            });
                            let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
                        });
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            addr,
            methods,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn respond(request: JsonRpcRequest, reply: &Reply) -> Response<Full<Bytes>> {
    let wire: WireRequest = serde_json::from_value(request.params).unwrap();

    match reply(&request.method, &wire) {
        Some(response) => {
            let body = JsonRpcResponse::success(request.id, serde_json::to_value(response).unwrap());
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(serde_json::to_vec(&body).unwrap())))
                .unwrap()
        }
        None => Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(Full::new(Bytes::new()))
            .unwrap(),
    }
}

fn http_client(nodes: &[(&TestNode, u64)]) -> Client {
    let client = Client::for_network(
        nodes
            .iter()
            .map(|(node, num)| (node.addr.clone(), AccountId::from_num(*num))),
    );
    client
        .set_min_backoff(Duration::from_millis(1))
        .set_max_backoff(Duration::from_millis(8));
    client
}

#[tokio::test]
async fn test_balance_query_over_http() {
    let node = TestNode::new(|_, _| {
        Some(WireResponse::Query(WireQueryResponse::new(
            Status::Ok,
            Amount::ZERO,
            json!({ "account_id": AccountId::from_num(1001), "balance": 1234 }),
        )))
    })
    .await;
    let client = http_client(&[(&node, 3)]);

    let balance = AccountBalanceQuery::new()
        .account_id(AccountId::from_num(1001))
        .execute(&client)
        .await
        .unwrap();

    assert_eq!(balance.balance, Amount::from_tinyunits(1234));
    assert_eq!(node.methods(), vec!["CryptoService/cryptoGetBalance".to_string()]);
}

#[tokio::test]
async fn test_transfer_fails_over_to_healthy_node() {
    let down = TestNode::new(|_, _| None).await;
    let up = TestNode::new(|method, _| match method {
        "CryptoService/cryptoTransfer" => Some(WireResponse::Transaction(TransactionAck::new(Status::Ok))),
        _ => Some(WireResponse::Query(WireQueryResponse::new(
            Status::Ok,
            Amount::ZERO,
            json!({ "receipt": { "status": Status::Success } }),
        ))),
    })
    .await;

    let client = http_client(&[(&down, 3), (&up, 4)]);
    client.set_operator(AccountId::from_num(1001), PrivateKey::generate());

    let response = TransferTransaction::new()
        .transfer(AccountId::from_num(1001), Amount::from_tinyunits(-5))
        .transfer(AccountId::from_num(1002), Amount::from_tinyunits(5))
        .node_account_ids([AccountId::from_num(3), AccountId::from_num(4)])
        .execute(&client)
        .await
        .unwrap();

    assert_eq!(response.node_account_id, AccountId::from_num(4));
    assert_eq!(down.methods().len(), 1);

    let receipt = response.get_receipt(&client).await.unwrap();
    assert_eq!(receipt.status, Status::Success);
    assert_eq!(
        up.methods(),
        vec![
            "CryptoService/cryptoTransfer".to_string(),
            "CryptoService/getTransactionReceipts".to_string(),
        ]
    );

    let down_node = client.pool().select_by_account(AccountId::from_num(3)).unwrap();
    assert_eq!(down_node.consecutive_failures(), 1);
}
