//! HTTP Transport
//!
//! [`HttpChannel`] carries each unary call as one JSON-RPC 2.0 POST to the
//! node. Failures are translated into an [`RpcStatus`] so the execution
//! engine can apply its retry heuristic without knowing about HTTP:
//!
//! | condition | code |
//! |-----------|------|
//! | connect or IO failure | `Unavailable` |
//! | no response within the channel timeout | `DeadlineExceeded` |
//! | HTTP 429 | `ResourceExhausted` |
//! | HTTP 503 | `Unavailable` |
//! | JSON-RPC `-32603` | `Internal` (message preserved) |
//! | JSON-RPC `-32601` | `Unimplemented` |
//! | JSON-RPC parse/request/params errors | `InvalidArgument` |
//! | anything else | `Unknown` |

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector as HyperConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Channel, Connector, RpcCode, RpcMethod, RpcStatus};
use crate::protocol::jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::protocol::{HedronError, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Result, WireRequest, WireResponse};

/// Default time to wait for a node to answer one call.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC over HTTP/1.1 to a single node.
pub struct HttpChannel {
    url: Uri,
    client: Client<HyperConnector, Full<Bytes>>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpChannel {
    /// Creates a channel for `address`, either `host:port` or an
    /// `http://` URL.
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let url = normalize_address(address)?;
        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            url,
            client,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    async fn post(&self, body: Vec<u8>) -> std::result::Result<Bytes, RpcStatus> {
        let request = Request::builder()
            .method("POST")
            .uri(self.url.clone())
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| RpcStatus::new(RpcCode::InvalidArgument, format!("failed to build request: {}", e)))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| {
                RpcStatus::deadline_exceeded(format!(
                    "no response from {} within {}ms",
                    self.url,
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| RpcStatus::unavailable(format!("HTTP request to {} failed: {}", self.url, e)))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(RpcStatus::new(RpcCode::ResourceExhausted, "node is rate limiting requests"));
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                return Err(RpcStatus::unavailable("node answered 503 Service Unavailable"));
            }
            status if !status.is_success() => {
                return Err(RpcStatus::new(RpcCode::Unknown, format!("unexpected HTTP status {}", status)));
            }
            _ => {}
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| RpcStatus::unavailable(format!("failed to read response: {}", e)))?;

        Ok(body.to_bytes())
    }
}

#[async_trait]
impl Channel for HttpChannel {
    async fn unary(&self, method: RpcMethod, request: WireRequest) -> std::result::Result<WireResponse, RpcStatus> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let params = serde_json::to_value(&request)
            .map_err(|e| RpcStatus::new(RpcCode::InvalidArgument, format!("failed to encode request: {}", e)))?;
        let body = serde_json::to_vec(&JsonRpcRequest::new(method.to_string(), params, json!(id)))
            .map_err(|e| RpcStatus::new(RpcCode::InvalidArgument, format!("failed to encode request: {}", e)))?;

        tracing::trace!(url = %self.url, %method, id, "sending unary call");

        let bytes = self.post(body).await?;
        let response: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RpcStatus::new(RpcCode::Unknown, format!("malformed JSON-RPC response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(status_from_jsonrpc(error));
        }

        let result = response
            .result
            .ok_or_else(|| RpcStatus::new(RpcCode::Unknown, "JSON-RPC response missing result"))?;

        serde_json::from_value(result)
            .map_err(|e| RpcStatus::new(RpcCode::Unknown, format!("malformed wire response: {}", e)))
    }
}

/// Opens [`HttpChannel`]s.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_TIMEOUT)
    }
}

impl Connector for HttpConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn Channel>> {
        Ok(Arc::new(HttpChannel::new(address, self.timeout)?))
    }
}

fn normalize_address(address: &str) -> Result<Uri> {
    if address.starts_with("https://") {
        return Err(HedronError::Transport(format!(
            "invalid node address '{}': TLS endpoints are not supported by the HTTP channel",
            address
        )));
    }

    let url = if address.starts_with("http://") {
        address.to_string()
    } else {
        format!("http://{}/", address)
    };

    url.parse::<Uri>()
        .map_err(|e| HedronError::Transport(format!("invalid node address '{}': {}", address, e)))
}

fn status_from_jsonrpc(error: JsonRpcError) -> RpcStatus {
    let code = match error.code {
        INTERNAL_ERROR => RpcCode::Internal,
        METHOD_NOT_FOUND => RpcCode::Unimplemented,
        PARSE_ERROR | INVALID_REQUEST | INVALID_PARAMS => RpcCode::InvalidArgument,
        _ => RpcCode::Unknown,
    };
    RpcStatus::new(code, error.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bare_address() {
        let url = normalize_address("127.0.0.1:50211").unwrap();
        assert_eq!(url.to_string(), "http://127.0.0.1:50211/");
    }

    #[test]
    fn test_normalize_keeps_http_url() {
        let url = normalize_address("http://node.example:8080/rpc").unwrap();
        assert_eq!(url.to_string(), "http://node.example:8080/rpc");
    }

    #[test]
    fn test_normalize_rejects_tls_and_garbage() {
        assert!(normalize_address("https://node.example").is_err());
        assert!(normalize_address("not a host").is_err());
    }

    #[test]
    fn test_jsonrpc_error_mapping() {
        let internal = status_from_jsonrpc(JsonRpcError::internal_error("Received RST_STREAM with error code 0"));
        assert_eq!(internal.code, RpcCode::Internal);
        assert!(internal.message.contains("RST_STREAM"));

        assert_eq!(status_from_jsonrpc(JsonRpcError::method_not_found()).code, RpcCode::Unimplemented);
        assert_eq!(status_from_jsonrpc(JsonRpcError::invalid_params("bad")).code, RpcCode::InvalidArgument);
        assert_eq!(status_from_jsonrpc(JsonRpcError::new(-32000, "server")).code, RpcCode::Unknown);
    }

    #[tokio::test]
    async fn test_closed_port_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let channel = HttpChannel::new(&addr, Duration::from_secs(2)).unwrap();
        let request = WireRequest::Query(crate::protocol::WireQuery {
            header: crate::protocol::QueryHeader {
                payment: None,
                response_type: crate::protocol::ResponseType::CostAnswer,
            },
            body: serde_json::Value::Null,
        });

        let err = channel
            .unary(RpcMethod::new("CryptoService", "getAccountInfo"), request)
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcCode::Unavailable);
    }
}
