//! Hedron Common Types and Transport
//!
//! This crate provides the protocol definitions and the transport seam shared
//! by every Hedron crate.
//!
//! # Overview
//!
//! Hedron is a client library that executes queries and transactions against
//! a permissioned network of equivalent nodes. This crate contains the pieces
//! that the node pool and the execution engine both need:
//!
//! - **Protocol Layer**: account and transaction identities, precheck statuses,
//!   amounts, wire payloads and the unified error type
//! - **Transport Layer**: the unary [`transport::Channel`] trait and its HTTP
//!   JSON-RPC implementation
//!
//! # Wire Format
//!
//! - **Transport**: HTTP/1.1 POST, one JSON-RPC 2.0 call per unary request
//! - **Serialization**: JSON, byte fields hex encoded
//! - **Signed bytes**: the JSON encoding of a [`TransactionBody`]
//!
//! # Example
//!
//! ```
//! use hedron_common::{AccountId, TransactionId};
//!
//! let payer: AccountId = "0.0.1001".parse().unwrap();
//! let id = TransactionId::generate(payer);
//! assert_eq!(id.account_id, payer);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
