use hedron_common::{AccountId, Result, TransactionId};
use std::fmt;

use crate::client::Client;
use crate::query::{TransactionReceipt, TransactionReceiptQuery};

/// A transaction the network accepted for consensus.
///
/// Acceptance is not success: the outcome is in the receipt.
#[derive(Clone, PartialEq, Eq)]
pub struct TransactionResponse {
    pub node_account_id: AccountId,
    pub transaction_id: TransactionId,
    /// SHA-384 of the signed transaction as sent.
    pub transaction_hash: Vec<u8>,
    /// Whether [`Self::get_receipt`] fails on a non-`SUCCESS` receipt.
    pub validate_status: bool,
}

impl TransactionResponse {
    pub fn validate_status(&mut self, validate: bool) -> &mut Self {
        self.validate_status = validate;
        self
    }

    /// A receipt query pinned to the node that accepted the transaction.
    pub fn get_receipt_query(&self) -> TransactionReceiptQuery {
        let mut query = TransactionReceiptQuery::new();
        query
            .transaction_id(self.transaction_id)
            .node_account_ids([self.node_account_id])
            .validate_status(self.validate_status);
        query
    }

    pub async fn get_receipt(&self, client: &Client) -> Result<TransactionReceipt> {
        self.get_receipt_query().execute(client).await
    }
}

impl fmt::Debug for TransactionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionResponse")
            .field("node_account_id", &self.node_account_id.to_string())
            .field("transaction_id", &self.transaction_id.to_string())
            .field("transaction_hash", &hex::encode(&self.transaction_hash))
            .field("validate_status", &self.validate_status)
            .finish()
    }
}
