//! Hedron Transport Layer
//!
//! The execution engine is agnostic to the RPC framework underneath. All it
//! needs is a unary call that either yields a [`WireResponse`] or fails with
//! an [`RpcStatus`]; that contract is the [`Channel`] trait. A [`Connector`]
//! turns a node address into a channel.
//!
//! # Components
//!
//! - **[`Channel`]**: one unary request/response call
//! - **[`Connector`]**: creates channels for node addresses
//! - **[`HttpChannel`]** / **[`HttpConnector`]**: JSON-RPC 2.0 over HTTP/1.1
//!
//! # Example
//!
//! ```no_run
//! use hedron_common::transport::{Connector, HttpConnector, RpcMethod};
//! use hedron_common::{QueryHeader, ResponseType, WireQuery, WireRequest};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = HttpConnector::default().connect("127.0.0.1:50211")?;
//! let request = WireRequest::Query(WireQuery {
//!     header: QueryHeader { payment: None, response_type: ResponseType::AnswerOnly },
//!     body: json!({"account_id": {"shard": 0, "realm": 0, "num": 2}}),
//! });
//! let response = channel
//!     .unary(RpcMethod::new("CryptoService", "cryptoGetBalance"), request)
//!     .await?;
//! println!("{:?}", response.precheck());
//! # Ok(())
//! # }
//! ```

pub mod http;

pub use http::{HttpChannel, HttpConnector};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::protocol::{Result, WireRequest, WireResponse};

/// Status code of a failed unary call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    ResourceExhausted,
    Unimplemented,
    Internal,
    Unavailable,
}

/// A failed unary call: the transport-level error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unavailable, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(RpcCode::DeadlineExceeded, message)
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcStatus {}

/// A unary RPC on a node, written `service/name` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RpcMethod {
    pub service: &'static str,
    pub name: &'static str,
}

impl RpcMethod {
    pub const fn new(service: &'static str, name: &'static str) -> Self {
        Self { service, name }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.name)
    }
}

/// A ready connection to one node.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn unary(&self, method: RpcMethod, request: WireRequest) -> std::result::Result<WireResponse, RpcStatus>;
}

/// Opens channels to node addresses.
pub trait Connector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Arc<dyn Channel>>;
}
