use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by a node, either as a precheck verdict on submission or
/// as the final outcome recorded in a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Success,
    Unknown,
    Busy,
    PlatformNotActive,
    PlatformTransactionNotCreated,
    TransactionExpired,
    InvalidTransactionStart,
    InvalidTransactionId,
    DuplicateTransaction,
    InvalidNodeAccount,
    InvalidSignature,
    InvalidAccountId,
    InvalidFileId,
    InvalidTopicId,
    InsufficientTxFee,
    InsufficientPayerBalance,
    InsufficientAccountBalance,
    InvalidQueryPayment,
    ReceiptNotFound,
    RecordNotFound,
    MaxFileSizeExceeded,
    InvalidChunkNumber,
    InvalidChunkTransactionId,
    NotSupported,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same spelling as the wire form.
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_spelling() {
        assert_eq!(serde_json::to_string(&Status::Busy).unwrap(), "\"BUSY\"");
        assert_eq!(
            serde_json::from_str::<Status>("\"PLATFORM_TRANSACTION_NOT_CREATED\"").unwrap(),
            Status::PlatformTransactionNotCreated
        );
    }

    #[test]
    fn test_display_matches_wire() {
        assert_eq!(Status::TransactionExpired.to_string(), "TRANSACTION_EXPIRED");
        assert!(Status::Ok.is_ok());
        assert!(!Status::Success.is_ok());
    }
}
