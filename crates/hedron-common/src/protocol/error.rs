use thiserror::Error;

use super::amount::Amount;
use super::ids::{AccountId, TransactionId};
use super::status::Status;
use crate::transport::RpcStatus;

#[derive(Error, Debug)]
pub enum HedronError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A single failed unary call, recorded as the cause of a later failure.
    #[error("RPC failed: {0}")]
    Rpc(RpcStatus),

    #[error("RPC failed with non-retryable status after {attempts} attempts: {status}")]
    TransportTerminal { attempts: usize, status: RpcStatus },

    #[error("request failed after {attempts} attempts{}", describe_cause(.last))]
    AttemptsExhausted {
        attempts: usize,
        #[source]
        last: Option<Box<HedronError>>,
    },

    #[error("{} failed precheck with status {status}", describe_subject(.transaction_id))]
    Precheck {
        status: Status,
        transaction_id: Option<TransactionId>,
    },

    #[error("receipt for transaction {transaction_id} contained error status {status}")]
    Receipt {
        status: Status,
        transaction_id: TransactionId,
    },

    #[error("query cost of {query_cost} is greater than the maximum allowed payment of {max_query_payment}")]
    MaxQueryPaymentExceeded {
        query_cost: Amount,
        max_query_payment: Amount,
    },

    #[error("payload requires {chunks} chunks but the maximum is {max_chunks}")]
    MaxChunksExceeded { chunks: usize, max_chunks: usize },

    #[error("node account {0} is not part of the network")]
    InvalidNode(AccountId),

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("no payer account: configure an operator or set an explicit transaction id")]
    NoPayerAccount,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HedronError {
    /// The node-reported status carried by precheck and receipt errors.
    pub fn status(&self) -> Option<Status> {
        match self {
            HedronError::Precheck { status, .. } | HedronError::Receipt { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn describe_cause(last: &Option<Box<HedronError>>) -> String {
    match last {
        Some(cause) => format!(": {}", cause),
        None => String::new(),
    }
}

fn describe_subject(transaction_id: &Option<TransactionId>) -> String {
    match transaction_id {
        Some(id) => format!("transaction {}", id),
        None => "request".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, HedronError>;
