//! Transport and precheck classification.

use hedron_common::transport::{RpcCode, RpcStatus};
use hedron_common::Status;

use crate::executable::{ExecutionState, RequestKind};

/// Whether a failed unary call is worth another attempt on another node.
///
/// `Internal` is only transient when the node reset the stream.
pub fn should_retry_transport(status: &RpcStatus) -> bool {
    match status.code {
        RpcCode::ResourceExhausted | RpcCode::Unavailable => true,
        RpcCode::Internal => is_stream_reset(&status.message),
        _ => false,
    }
}

fn is_stream_reset(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("rst_stream") || message.contains("rst stream")
}

/// Default mapping from a precheck status to the loop's next step.
pub fn classify_precheck(status: Status, kind: RequestKind) -> ExecutionState {
    match status {
        Status::Ok => ExecutionState::Finished,
        Status::Busy | Status::PlatformNotActive | Status::PlatformTransactionNotCreated => {
            ExecutionState::Retry
        }
        Status::TransactionExpired if kind == RequestKind::Transaction => ExecutionState::Expired,
        _ => ExecutionState::Error,
    }
}
