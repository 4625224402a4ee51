//! Read-shaped requests and the query payment sub-protocol.
//!
//! A paid query is executed twice: first as a cost-only request that
//! carries no payment, then as the real request with one signed payment
//! transfer per candidate node. Free queries skip straight to the second
//! step without a payment.

mod account_balance;
mod account_info;
mod address_book;
mod file_contents;
mod receipt;

pub use account_balance::{AccountBalance, AccountBalanceQuery, AccountBalanceQueryData};
pub use account_info::{AccountInfo, AccountInfoQuery, AccountInfoQueryData};
pub use address_book::{AddressBookPage, AddressBookPageData, AddressBookQuery, ADDRESS_BOOK_FILE_ID};
pub use file_contents::{FileContents, FileContentsQuery, FileContentsQueryData};
pub use receipt::{TransactionReceipt, TransactionReceiptQuery, TransactionReceiptQueryData};

use hedron_common::transport::RpcMethod;
use hedron_common::{
    AccountAmount, AccountId, Amount, HedronError, QueryHeader, ResponseType, Result, SignedTransaction,
    Status, TransactionBody, TransactionId, TransactionPayload, WireQuery, WireQueryResponse, WireRequest,
    WireResponse,
};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::classify::classify_precheck;
use crate::client::Client;
use crate::executable::{self, ExecutionState, RequestKind, RequestSettings};
use crate::key::Operator;
use crate::node_list::NodeSelection;
use crate::transaction::{sign_body, DEFAULT_VALID_DURATION};

/// Nodes never quote less than this for a paid query.
pub const MIN_QUERY_COST: Amount = Amount::from_tinyunits(25);

/// Fee offered for the payment transfer attached to a paid query.
pub const PAYMENT_TRANSACTION_FEE: Amount = Amount::from_units(1);

/// The payload of one kind of query.
pub trait QueryData: Clone + Send + Sync {
    type Output: Send;

    const METHOD: RpcMethod;

    fn is_payment_required(&self) -> bool {
        true
    }

    fn body(&self) -> Result<Value>;

    fn parse_response(&self, body: Value, node_account_id: AccountId) -> Result<Self::Output>;

    fn classify(&self, response: &WireQueryResponse) -> ExecutionState {
        classify_precheck(response.header.precheck, RequestKind::Query)
    }

    fn map_status_error(&self, response: &WireQueryResponse) -> HedronError {
        HedronError::Precheck {
            status: response.header.precheck,
            transaction_id: None,
        }
    }
}

/// A query with its node list, payment and retry settings.
#[derive(Debug, Clone)]
pub struct Query<D> {
    data: D,
    node_selection: NodeSelection,
    payment_amount: Option<Amount>,
    max_query_payment: Option<Amount>,
    payments: HashMap<AccountId, SignedTransaction>,
    settings: RequestSettings,
}

impl<D: QueryData + Default> Default for Query<D> {
    fn default() -> Self {
        Self::with_data(D::default())
    }
}

impl<D: QueryData + Default> Query<D> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: QueryData> Query<D> {
    pub fn with_data(data: D) -> Self {
        Self {
            data,
            node_selection: NodeSelection::Unset,
            payment_amount: None,
            max_query_payment: None,
            payments: HashMap::new(),
            settings: RequestSettings::default(),
        }
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    /// Pins the nodes this query may be sent to.
    pub fn node_account_ids(&mut self, ids: impl IntoIterator<Item = AccountId>) -> &mut Self {
        self.node_selection = NodeSelection::fixed(ids.into_iter().collect());
        self
    }

    pub fn get_node_account_ids(&self) -> &[AccountId] {
        self.node_selection.ids()
    }

    /// Pays exactly `amount` and skips the cost lookup.
    pub fn payment_amount(&mut self, amount: Amount) -> &mut Self {
        self.payment_amount = Some(amount);
        self
    }

    /// Refuses to pay more than `amount` for this query.
    pub fn max_query_payment(&mut self, amount: Amount) -> &mut Self {
        self.max_query_payment = Some(amount);
        self
    }

    pub fn max_attempts(&mut self, max_attempts: usize) -> &mut Self {
        self.settings.max_attempts = Some(max_attempts);
        self
    }

    pub fn min_backoff(&mut self, min_backoff: Duration) -> &mut Self {
        self.settings.min_backoff = Some(min_backoff);
        self
    }

    pub fn max_backoff(&mut self, max_backoff: Duration) -> &mut Self {
        self.settings.max_backoff = Some(max_backoff);
        self
    }

    pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.settings.request_timeout = Some(timeout);
        self
    }

    /// Asks the network what answering this query would cost.
    ///
    /// The query itself is left untouched, so repeated calls are
    /// independent. A cost below [`MIN_QUERY_COST`] is raised to it.
    pub async fn get_cost(&self, client: &Client) -> Result<Amount> {
        let mut cost_query = CostQuery {
            query: self,
            node_selection: self.node_selection.clone(),
        };

        let cost = crate::execute::execute(client, &mut cost_query).await?;
        Ok(cost.max(MIN_QUERY_COST))
    }

    pub async fn execute(&mut self, client: &Client) -> Result<D::Output> {
        if self.data.is_payment_required() {
            self.prepare_payments(client).await?;
        }

        crate::execute::execute(client, self).await
    }

    async fn prepare_payments(&mut self, client: &Client) -> Result<()> {
        let operator = client.operator().ok_or(HedronError::NoPayerAccount)?;

        let amount = match self.payment_amount {
            Some(amount) => amount,
            None => {
                let max_query_payment = self
                    .max_query_payment
                    .unwrap_or_else(|| client.default_max_query_payment());
                let cost = self.get_cost(client).await?;

                if cost > max_query_payment {
                    return Err(HedronError::MaxQueryPaymentExceeded {
                        query_cost: cost,
                        max_query_payment,
                    });
                }
                cost
            }
        };

        if self.node_selection.is_unset() {
            let ids = client.pool().node_account_ids_for_request();
            if ids.is_empty() {
                return Err(HedronError::NodeUnavailable("node pool is empty".to_string()));
            }
            self.node_selection.populate(ids);
        }

        let transaction_id = TransactionId::generate(operator.account_id);
        self.payments = self
            .node_selection
            .ids()
            .iter()
            .map(|node| Ok((*node, payment_transaction(&operator, transaction_id, *node, amount)?)))
            .collect::<Result<_>>()?;

        debug!(
            method = %D::METHOD,
            amount = amount.to_tinyunits(),
            nodes = self.payments.len(),
            "prepared query payments"
        );
        Ok(())
    }

    fn wire_query(&self, response_type: ResponseType, payment: Option<SignedTransaction>) -> Result<WireRequest> {
        Ok(WireRequest::Query(WireQuery {
            header: QueryHeader { payment, response_type },
            body: self.data.body()?,
        }))
    }
}

fn payment_transaction(
    operator: &Operator,
    transaction_id: TransactionId,
    node_account_id: AccountId,
    amount: Amount,
) -> Result<SignedTransaction> {
    let body = TransactionBody {
        transaction_id,
        node_account_id,
        transaction_fee: PAYMENT_TRANSACTION_FEE,
        valid_duration_secs: DEFAULT_VALID_DURATION.as_secs(),
        memo: String::new(),
        data: TransactionPayload::CryptoTransfer {
            transfers: vec![
                AccountAmount {
                    account_id: operator.account_id,
                    amount: -amount,
                },
                AccountAmount {
                    account_id: node_account_id,
                    amount,
                },
            ],
        },
    };

    sign_body(&body, std::slice::from_ref(&operator.signer))
}

fn expect_query_response(response: &WireResponse) -> Option<&WireQueryResponse> {
    match response {
        WireResponse::Query(response) => Some(response),
        WireResponse::Transaction(_) => None,
    }
}

fn unexpected_response(method: RpcMethod) -> HedronError {
    HedronError::InvalidResponse(format!("{} answered with a transaction acknowledgement", method))
}

impl<D: QueryData> executable::Executable for Query<D> {
    type Response = D::Output;

    fn node_selection(&self) -> &NodeSelection {
        &self.node_selection
    }

    fn node_selection_mut(&mut self) -> &mut NodeSelection {
        &mut self.node_selection
    }

    fn backoff_bounds(&self, client: &Client) -> (Duration, Duration) {
        self.settings.backoff_bounds(client)
    }

    fn request_timeout(&self, client: &Client) -> Option<Duration> {
        self.settings.request_timeout(client)
    }

    fn max_attempts(&self) -> usize {
        self.settings.max_attempts()
    }

    fn kind(&self) -> RequestKind {
        RequestKind::Query
    }

    fn method(&self) -> RpcMethod {
        D::METHOD
    }

    fn build_request(&self, _attempt: usize) -> Result<WireRequest> {
        let payment = if self.data.is_payment_required() {
            let node = self.node_selection.current().ok_or_else(|| {
                HedronError::InvalidRequest("paid query has no candidate nodes".to_string())
            })?;
            let payment = self.payments.get(&node).cloned().ok_or_else(|| {
                HedronError::InvalidRequest(format!("no query payment prepared for node {}", node))
            })?;
            Some(payment)
        } else {
            None
        };

        self.wire_query(ResponseType::AnswerOnly, payment)
    }

    fn classify(&self, response: &WireResponse) -> ExecutionState {
        match expect_query_response(response) {
            Some(response) => self.data.classify(response),
            None => ExecutionState::Error,
        }
    }

    fn map_status_error(&self, response: &WireResponse) -> HedronError {
        match expect_query_response(response) {
            Some(response) => self.data.map_status_error(response),
            None => unexpected_response(D::METHOD),
        }
    }

    fn map_response(
        &self,
        response: WireResponse,
        node_account_id: AccountId,
        _request: WireRequest,
    ) -> Result<Self::Response> {
        let response = response.into_query().ok_or_else(|| unexpected_response(D::METHOD))?;
        self.data.parse_response(response.body, node_account_id)
    }
}

/// The cost-only form of a query: same body, no payment, and the answer
/// is the quoted cost.
struct CostQuery<'a, D> {
    query: &'a Query<D>,
    node_selection: NodeSelection,
}

impl<D: QueryData> executable::Executable for CostQuery<'_, D> {
    type Response = Amount;

    fn node_selection(&self) -> &NodeSelection {
        &self.node_selection
    }

    fn node_selection_mut(&mut self) -> &mut NodeSelection {
        &mut self.node_selection
    }

    fn backoff_bounds(&self, client: &Client) -> (Duration, Duration) {
        self.query.settings.backoff_bounds(client)
    }

    fn request_timeout(&self, client: &Client) -> Option<Duration> {
        self.query.settings.request_timeout(client)
    }

    fn max_attempts(&self) -> usize {
        self.query.settings.max_attempts()
    }

    fn kind(&self) -> RequestKind {
        RequestKind::Query
    }

    fn method(&self) -> RpcMethod {
        D::METHOD
    }

    fn build_request(&self, _attempt: usize) -> Result<WireRequest> {
        self.query.wire_query(ResponseType::CostAnswer, None)
    }

    fn classify(&self, response: &WireResponse) -> ExecutionState {
        classify_precheck(response.precheck(), RequestKind::Query)
    }

    fn map_status_error(&self, response: &WireResponse) -> HedronError {
        HedronError::Precheck {
            status: response.precheck(),
            transaction_id: None,
        }
    }

    fn map_response(&self, response: WireResponse, _node: AccountId, _request: WireRequest) -> Result<Amount> {
        let response = response.into_query().ok_or_else(|| unexpected_response(D::METHOD))?;
        Ok(response.header.cost)
    }
}

/// Reads `field` out of a response body.
pub(crate) fn body_field<T: serde::de::DeserializeOwned>(body: &Value, field: &str) -> Result<T> {
    let value = body
        .get(field)
        .cloned()
        .ok_or_else(|| HedronError::InvalidResponse(format!("response is missing '{}'", field)))?;
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn require<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| HedronError::InvalidRequest(format!("{} must be set", what)))
}

pub(crate) fn precheck_error(status: Status, transaction_id: Option<TransactionId>) -> HedronError {
    HedronError::Precheck { status, transaction_id }
}
