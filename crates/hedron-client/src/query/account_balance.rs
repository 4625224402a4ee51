use hedron_common::transport::RpcMethod;
use hedron_common::{AccountId, Amount, HedronError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{body_field, require, Query, QueryData};

/// Balance of an account. Free to ask.
pub type AccountBalanceQuery = Query<AccountBalanceQueryData>;

#[derive(Debug, Clone, Default)]
pub struct AccountBalanceQueryData {
    account_id: Option<AccountId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub balance: Amount,
}

impl AccountBalanceQuery {
    pub fn account_id(&mut self, account_id: AccountId) -> &mut Self {
        self.data_mut().account_id = Some(account_id);
        self
    }

    pub fn get_account_id(&self) -> Option<AccountId> {
        self.data().account_id
    }
}

impl QueryData for AccountBalanceQueryData {
    type Output = AccountBalance;

    const METHOD: RpcMethod = RpcMethod::new("CryptoService", "cryptoGetBalance");

    fn is_payment_required(&self) -> bool {
        false
    }

    fn body(&self) -> Result<Value> {
        Ok(json!({ "account_id": require(self.account_id, "account id")? }))
    }

    fn parse_response(&self, body: Value, _node_account_id: AccountId) -> Result<AccountBalance> {
        let balance = AccountBalance {
            account_id: body_field(&body, "account_id")?,
            balance: body_field(&body, "balance")?,
        };

        match self.account_id {
            Some(expected) if expected != balance.account_id => Err(HedronError::InvalidResponse(format!(
                "asked for the balance of {} but got {}",
                expected, balance.account_id
            ))),
            _ => Ok(balance),
        }
    }
}
