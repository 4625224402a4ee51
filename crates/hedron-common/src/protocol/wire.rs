//! Wire payloads exchanged with nodes.
//!
//! Every unary call carries one [`WireRequest`] and yields one
//! [`WireResponse`]. Queries are read-shaped: the response has a header
//! (precheck status and cost) and a body. Transactions are write-shaped: the
//! response is an acknowledgement carrying only the precheck status.
//!
//! Signed bytes are the JSON encoding of a [`TransactionBody`]; byte fields
//! are hex encoded on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha384};

use super::amount::Amount;
use super::error::Result;
use super::ids::{AccountId, FileId, TopicId, TransactionId};
use super::status::Status;

/// Which half of the two-phase read protocol a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    /// The full, paid answer.
    AnswerOnly,
    /// Only the cost of the answer; no payment attached.
    CostAnswer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHeader {
    pub payment: Option<SignedTransaction>,
    pub response_type: ResponseType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireQuery {
    pub header: QueryHeader,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub precheck: Status,
    #[serde(default)]
    pub cost: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireQueryResponse {
    pub header: ResponseHeader,
    #[serde(default)]
    pub body: Value,
}

impl WireQueryResponse {
    pub fn new(precheck: Status, cost: Amount, body: Value) -> Self {
        Self { header: ResponseHeader { precheck, cost }, body }
    }
}

/// Acknowledgement of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAck {
    pub precheck: Status,
    #[serde(default)]
    pub cost: Amount,
}

impl TransactionAck {
    pub fn new(precheck: Status) -> Self {
        Self { precheck, cost: Amount::ZERO }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    #[serde(with = "hex::serde")]
    pub public_key_prefix: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(with = "hex::serde")]
    pub body_bytes: Vec<u8>,
    pub sig_map: Vec<SignaturePair>,
}

impl SignedTransaction {
    pub fn body(&self) -> Result<TransactionBody> {
        Ok(serde_json::from_slice(&self.body_bytes)?)
    }

    /// SHA-384 over the signed envelope, as reported back to callers.
    pub fn hash(&self) -> Vec<u8> {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        Sha384::digest(&bytes).to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountAmount {
    pub account_id: AccountId,
    pub amount: Amount,
}

/// Position of one chunk inside a multi-part topic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub initial_transaction_id: TransactionId,
    pub total: u32,
    pub number: u32,
}

/// Operation-specific part of a transaction body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionPayload {
    CryptoTransfer {
        transfers: Vec<AccountAmount>,
    },
    FileAppend {
        file_id: FileId,
        #[serde(with = "hex::serde")]
        contents: Vec<u8>,
    },
    ConsensusSubmitMessage {
        topic_id: TopicId,
        #[serde(with = "hex::serde")]
        message: Vec<u8>,
        chunk_info: Option<ChunkInfo>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    pub node_account_id: AccountId,
    pub transaction_fee: Amount,
    pub valid_duration_secs: u64,
    #[serde(default)]
    pub memo: String,
    pub data: TransactionPayload,
}

impl TransactionBody {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum WireRequest {
    Query(WireQuery),
    Transaction(SignedTransaction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum WireResponse {
    Query(WireQueryResponse),
    Transaction(TransactionAck),
}

impl WireResponse {
    /// The node's precheck verdict, whatever the response shape.
    pub fn precheck(&self) -> Status {
        match self {
            WireResponse::Query(response) => response.header.precheck,
            WireResponse::Transaction(ack) => ack.precheck,
        }
    }

    pub fn into_query(self) -> Option<WireQueryResponse> {
        match self {
            WireResponse::Query(response) => Some(response),
            WireResponse::Transaction(_) => None,
        }
    }
}
