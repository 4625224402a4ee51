use hedron_common::transport::RpcMethod;
use hedron_common::{
    AccountId, FileId, HedronError, Result, Status, TopicId, TransactionId, WireQueryResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{body_field, precheck_error, require, Query, QueryData};
use crate::executable::ExecutionState;

/// Outcome of a transaction once the network has reached consensus on it.
///
/// Free. Retries until the receipt leaves its pending states, so it doubles
/// as "wait for this transaction".
pub type TransactionReceiptQuery = Query<TransactionReceiptQueryData>;

#[derive(Debug, Clone, Default)]
pub struct TransactionReceiptQueryData {
    transaction_id: Option<TransactionId>,
    validate_status: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub status: Status,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub file_id: Option<FileId>,
    #[serde(default)]
    pub topic_id: Option<TopicId>,
    #[serde(default)]
    pub topic_sequence_number: Option<u64>,
}

impl TransactionReceipt {
    /// Turns a non-`SUCCESS` receipt into [`HedronError::Receipt`].
    pub fn validate_status(self, transaction_id: TransactionId) -> Result<Self> {
        if self.status == Status::Success {
            Ok(self)
        } else {
            Err(HedronError::Receipt {
                status: self.status,
                transaction_id,
            })
        }
    }
}

impl TransactionReceiptQuery {
    pub fn transaction_id(&mut self, transaction_id: TransactionId) -> &mut Self {
        self.data_mut().transaction_id = Some(transaction_id);
        self
    }

    /// Fail with [`HedronError::Receipt`] unless the receipt is `SUCCESS`.
    pub fn validate_status(&mut self, validate: bool) -> &mut Self {
        self.data_mut().validate_status = validate;
        self
    }
}

fn receipt_status(body: &Value) -> Option<Status> {
    body.get("receipt")
        .and_then(|receipt| receipt.get("status"))
        .and_then(|status| serde_json::from_value(status.clone()).ok())
}

impl QueryData for TransactionReceiptQueryData {
    type Output = TransactionReceipt;

    const METHOD: RpcMethod = RpcMethod::new("CryptoService", "getTransactionReceipts");

    fn is_payment_required(&self) -> bool {
        false
    }

    fn body(&self) -> Result<Value> {
        Ok(json!({ "transaction_id": require(self.transaction_id, "transaction id")? }))
    }

    fn classify(&self, response: &WireQueryResponse) -> ExecutionState {
        match response.header.precheck {
            Status::Ok => {}
            Status::Busy
            | Status::Unknown
            | Status::ReceiptNotFound
            | Status::PlatformNotActive
            | Status::PlatformTransactionNotCreated => return ExecutionState::Retry,
            _ => return ExecutionState::Error,
        }

        match receipt_status(&response.body) {
            Some(Status::Unknown | Status::Busy | Status::ReceiptNotFound | Status::Ok) => ExecutionState::Retry,
            _ => ExecutionState::Finished,
        }
    }

    fn map_status_error(&self, response: &WireQueryResponse) -> HedronError {
        let precheck = response.header.precheck;

        match (precheck, receipt_status(&response.body), self.transaction_id) {
            (Status::Ok, Some(status), Some(transaction_id)) => HedronError::Receipt { status, transaction_id },
            _ => precheck_error(precheck, self.transaction_id),
        }
    }

    fn parse_response(&self, body: Value, _node_account_id: AccountId) -> Result<TransactionReceipt> {
        let receipt: TransactionReceipt = body_field(&body, "receipt")?;

        match (self.validate_status, self.transaction_id) {
            (true, Some(transaction_id)) => receipt.validate_status(transaction_id),
            _ => Ok(receipt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedron_common::{Amount, Timestamp};

    fn data() -> TransactionReceiptQueryData {
        TransactionReceiptQueryData {
            transaction_id: Some(TransactionId::new(AccountId::from_num(2), Timestamp { seconds: 1, nanos: 0 })),
            validate_status: true,
        }
    }

    fn response(precheck: Status, receipt: Option<Status>) -> WireQueryResponse {
        let body = match receipt {
            Some(status) => json!({ "receipt": { "status": status } }),
            None => Value::Null,
        };
        WireQueryResponse::new(precheck, Amount::ZERO, body)
    }

    #[test]
    fn test_pending_receipts_retry() {
        let data = data();
        for pending in [Status::Unknown, Status::Busy, Status::ReceiptNotFound, Status::Ok] {
            assert_eq!(data.classify(&response(Status::Ok, Some(pending))), ExecutionState::Retry);
        }
        for precheck in [Status::Busy, Status::Unknown, Status::ReceiptNotFound] {
            assert_eq!(data.classify(&response(precheck, None)), ExecutionState::Retry);
        }
    }

    #[test]
    fn test_final_receipts_finish() {
        let data = data();
        assert_eq!(data.classify(&response(Status::Ok, Some(Status::Success))), ExecutionState::Finished);
        assert_eq!(
            data.classify(&response(Status::Ok, Some(Status::InsufficientPayerBalance))),
            ExecutionState::Finished
        );
        assert_eq!(data.classify(&response(Status::InvalidTransactionId, None)), ExecutionState::Error);
    }

    #[test]
    fn test_validate_status() {
        let data = data();
        let body = json!({ "receipt": { "status": "INVALID_SIGNATURE" } });
        let err = data.parse_response(body.clone(), AccountId::from_num(3)).unwrap_err();
        assert_eq!(err.status(), Some(Status::InvalidSignature));
        assert!(matches!(err, HedronError::Receipt { .. }));

        let lenient = TransactionReceiptQueryData {
            validate_status: false,
            ..data
        };
        let receipt = lenient.parse_response(body, AccountId::from_num(3)).unwrap();
        assert_eq!(receipt.status, Status::InvalidSignature);
    }

    #[test]
    fn test_pending_receipt_error_carries_receipt_status() {
        let err = data().map_status_error(&response(Status::Ok, Some(Status::Unknown)));
        assert!(matches!(err, HedronError::Receipt { status: Status::Unknown, .. }));

        let err = data().map_status_error(&response(Status::Busy, None));
        assert!(matches!(err, HedronError::Precheck { status: Status::Busy, .. }));
    }
}
