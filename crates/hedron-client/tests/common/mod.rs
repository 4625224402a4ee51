//! Scripted in-memory network shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hedron_client::{Client, PrivateKey};
use hedron_common::transport::{Channel, Connector, RpcMethod, RpcStatus};
use hedron_common::{
    AccountId, Amount, HedronError, ResponseType, Result, SignedTransaction, Status, TransactionAck, TransactionBody,
    WireQueryResponse, WireRequest, WireResponse,
};
use hedron_network::NodePoolConfig;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OPERATOR: AccountId = AccountId::from_num(1001);

/// One dispatch as seen by the stub network.
#[derive(Debug, Clone)]
pub struct Call {
    pub address: String,
    pub method: RpcMethod,
    pub request: WireRequest,
}

impl Call {
    pub fn node(&self) -> u64 {
        self.address
            .trim_start_matches("node")
            .split(':')
            .next()
            .and_then(|num| num.parse().ok())
            .unwrap()
    }

    pub fn response_type(&self) -> Option<ResponseType> {
        match &self.request {
            WireRequest::Query(query) => Some(query.header.response_type),
            WireRequest::Transaction(_) => None,
        }
    }

    pub fn payment(&self) -> Option<&SignedTransaction> {
        match &self.request {
            WireRequest::Query(query) => query.header.payment.as_ref(),
            WireRequest::Transaction(_) => None,
        }
    }

    pub fn query_body(&self) -> &Value {
        match &self.request {
            WireRequest::Query(query) => &query.body,
            WireRequest::Transaction(_) => panic!("expected a query"),
        }
    }

    pub fn transaction_body(&self) -> TransactionBody {
        match &self.request {
            WireRequest::Transaction(signed) => signed.body().unwrap(),
            WireRequest::Query(_) => panic!("expected a transaction"),
        }
    }
}

type Handler = dyn Fn(&Call, usize) -> std::result::Result<WireResponse, RpcStatus> + Send + Sync;

/// Answers every call with a scripted handler and records it.
///
/// The handler also receives how many calls came before this one.
pub struct StubNetwork {
    handler: Box<Handler>,
    calls: Mutex<Vec<Call>>,
    delay: Mutex<Duration>,
}

impl StubNetwork {
    pub fn new(
        handler: impl Fn(&Call, usize) -> std::result::Result<WireResponse, RpcStatus> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        })
    }

    /// Makes every call take `delay` before it is answered.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| call.method.name == name).count()
    }

    pub fn count_where(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }
}

struct StubChannel {
    address: String,
    network: Arc<StubNetwork>,
}

#[async_trait]
impl Channel for StubChannel {
    async fn unary(&self, method: RpcMethod, request: WireRequest) -> std::result::Result<WireResponse, RpcStatus> {
        let call = Call {
            address: self.address.clone(),
            method,
            request,
        };

        let delay = *self.network.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let index = {
            let mut calls = self.network.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len() - 1
        };
        (self.network.handler)(&call, index)
    }
}

pub struct StubConnector(pub Arc<StubNetwork>);

impl Connector for StubConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn Channel>> {
        Ok(Arc::new(StubChannel {
            address: address.to_string(),
            network: self.0.clone(),
        }))
    }
}

/// Like [`StubConnector`], but refuses to open a channel to `refused`.
pub struct RefusingConnector {
    pub network: Arc<StubNetwork>,
    pub refused: String,
}

impl Connector for RefusingConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn Channel>> {
        if address == self.refused {
            return Err(HedronError::Transport(format!("connection to {} refused", address)));
        }
        StubConnector(self.network.clone()).connect(address)
    }
}

pub fn address(node: u64) -> String {
    format!("node{}:50211", node)
}

/// Millisecond-scale node backoff so tests never wait long.
pub fn fast_pool() -> NodePoolConfig {
    NodePoolConfig {
        min_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_secs(1),
        max_nodes_per_request: None,
    }
}

/// A client over `nodes` with fast backoff and no operator.
pub fn bare_client(network: &Arc<StubNetwork>, nodes: &[u64]) -> Client {
    bare_client_over(Arc::new(StubConnector(network.clone())), nodes)
}

/// A client over `nodes` reached through `connector`, with fast backoff.
pub fn bare_client_over(connector: Arc<dyn Connector>, nodes: &[u64]) -> Client {
    let entries = nodes.iter().map(|n| (AccountId::from_num(*n), address(*n)));
    let client = Client::with_connector(entries, connector, fast_pool());
    client
        .set_min_backoff(Duration::from_millis(1))
        .set_max_backoff(Duration::from_millis(8));
    client
}

/// A client over `nodes` with [`OPERATOR`] paying. Returns the operator key.
pub fn client(network: &Arc<StubNetwork>, nodes: &[u64]) -> (Client, PrivateKey) {
    let client = bare_client(network, nodes);
    let key = PrivateKey::generate();
    client.set_operator(OPERATOR, key.clone());
    (client, key)
}

pub fn query_ok(body: Value) -> std::result::Result<WireResponse, RpcStatus> {
    Ok(WireResponse::Query(WireQueryResponse::new(Status::Ok, Amount::ZERO, body)))
}

pub fn query_status(status: Status) -> std::result::Result<WireResponse, RpcStatus> {
    Ok(WireResponse::Query(WireQueryResponse::new(status, Amount::ZERO, Value::Null)))
}

pub fn cost(tinyunits: i64) -> std::result::Result<WireResponse, RpcStatus> {
    Ok(WireResponse::Query(WireQueryResponse::new(
        Status::Ok,
        Amount::from_tinyunits(tinyunits),
        Value::Null,
    )))
}

pub fn ack(status: Status) -> std::result::Result<WireResponse, RpcStatus> {
    Ok(WireResponse::Transaction(TransactionAck::new(status)))
}

pub fn receipt(status: Status) -> std::result::Result<WireResponse, RpcStatus> {
    query_ok(json!({ "receipt": { "status": status } }))
}

pub fn balance_body(account: u64, balance: i64) -> Value {
    json!({
        "account_id": AccountId::from_num(account),
        "balance": balance,
    })
}
