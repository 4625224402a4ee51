use hedron_common::transport::RpcMethod;
use hedron_common::{AccountId, Amount, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{require, Query, QueryData};

/// Account details. Paid.
pub type AccountInfoQuery = Query<AccountInfoQueryData>;

#[derive(Debug, Clone, Default)]
pub struct AccountInfoQueryData {
    account_id: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: AccountId,
    pub balance: Amount,
    /// Hex-encoded public key guarding the account.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub deleted: bool,
}

impl AccountInfoQuery {
    pub fn account_id(&mut self, account_id: AccountId) -> &mut Self {
        self.data_mut().account_id = Some(account_id);
        self
    }
}

impl QueryData for AccountInfoQueryData {
    type Output = AccountInfo;

    const METHOD: RpcMethod = RpcMethod::new("CryptoService", "getAccountInfo");

    fn body(&self) -> Result<Value> {
        Ok(json!({ "account_id": require(self.account_id, "account id")? }))
    }

    fn parse_response(&self, body: Value, _node_account_id: AccountId) -> Result<AccountInfo> {
        Ok(serde_json::from_value(body)?)
    }
}
