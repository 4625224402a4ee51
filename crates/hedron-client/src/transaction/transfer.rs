use hedron_common::transport::RpcMethod;
use hedron_common::{AccountAmount, AccountId, Amount, HedronError, Result, TransactionPayload};

use super::{ChunkContext, Transaction, TransactionData};

/// Moves value between accounts. The amounts must balance to zero.
pub type TransferTransaction = Transaction<TransferTransactionData>;

#[derive(Debug, Clone, Default)]
pub struct TransferTransactionData {
    transfers: Vec<AccountAmount>,
}

impl TransferTransaction {
    /// Adds `amount` to `account_id`; negative amounts debit it.
    pub fn transfer(&mut self, account_id: AccountId, amount: Amount) -> &mut Self {
        self.data_mut().transfers.push(AccountAmount { account_id, amount });
        self
    }

    pub fn get_transfers(&self) -> &[AccountAmount] {
        &self.data().transfers
    }
}

impl TransactionData for TransferTransactionData {
    const METHOD: RpcMethod = RpcMethod::new("CryptoService", "cryptoTransfer");

    fn to_payload(&self, _chunk: &ChunkContext) -> Result<TransactionPayload> {
        let net: i64 = self.transfers.iter().map(|t| t.amount.to_tinyunits()).sum();
        if net != 0 {
            return Err(HedronError::InvalidRequest(format!(
                "transfers must sum to zero, got {}",
                Amount::from_tinyunits(net)
            )));
        }

        Ok(TransactionPayload::CryptoTransfer {
            transfers: self.transfers.clone(),
        })
    }
}
