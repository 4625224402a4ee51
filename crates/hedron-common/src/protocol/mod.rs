pub mod amount;
pub mod error;
pub mod ids;
pub mod jsonrpc;
pub mod status;
pub mod wire;


pub use amount::Amount;
pub use error::{HedronError, Result};
pub use ids::{AccountId, FileId, Timestamp, TopicId, TransactionId};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use status::Status;
pub use wire::{
    AccountAmount, ChunkInfo, QueryHeader, ResponseHeader, ResponseType, SignaturePair, SignedTransaction,
    TransactionAck, TransactionBody, TransactionPayload, WireQuery, WireQueryResponse, WireRequest,
    WireResponse,
};
