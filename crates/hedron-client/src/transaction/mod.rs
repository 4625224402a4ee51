//! Write-shaped requests.
//!
//! A transaction is frozen before it is sent: its id is fixed, its
//! candidate nodes are chosen and one signed body is produced per node (and
//! per chunk, for payloads split across several transactions). Execution
//! then only picks which of those pre-signed bodies goes out.

mod chunked;
mod file_append;
mod response;
mod topic_message_submit;
mod transfer;

pub use chunked::{ChunkContext, ChunkData, ChunkedExecutionError};
pub use file_append::{FileAppendTransaction, FileAppendTransactionData};
pub use response::TransactionResponse;
pub use topic_message_submit::{TopicMessageSubmitTransaction, TopicMessageSubmitTransactionData};
pub use transfer::{TransferTransaction, TransferTransactionData};

use hedron_common::transport::RpcMethod;
use hedron_common::{
    AccountId, Amount, HedronError, Result, SignedTransaction, TransactionBody, TransactionId,
    TransactionPayload, WireRequest, WireResponse,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::classify::classify_precheck;
use crate::client::Client;
use crate::executable::{self, ExecutionState, RequestKind, RequestSettings};
use crate::key::{signature_pair, PrivateKey, Signer};
use crate::node_list::NodeSelection;

/// How long after its valid start a transaction may still be accepted.
pub const DEFAULT_VALID_DURATION: Duration = Duration::from_secs(120);

pub const DEFAULT_MAX_TRANSACTION_FEE: Amount = Amount::from_units(2);

/// The payload of one kind of transaction.
pub trait TransactionData: Clone + Send + Sync {
    const METHOD: RpcMethod;

    fn default_max_transaction_fee(&self) -> Amount {
        DEFAULT_MAX_TRANSACTION_FEE
    }

    /// Set by payloads that may be split over several transactions.
    fn chunk_data(&self) -> Option<&ChunkData> {
        None
    }

    fn to_payload(&self, chunk: &ChunkContext) -> Result<TransactionPayload>;
}

/// Signs `body` with every signer.
pub(crate) fn sign_body(body: &TransactionBody, signers: &[Arc<dyn Signer>]) -> Result<SignedTransaction> {
    let body_bytes = body.to_bytes()?;
    let sig_map = signers
        .iter()
        .map(|signer| signature_pair(signer.as_ref(), &body_bytes))
        .collect();

    Ok(SignedTransaction { body_bytes, sig_map })
}

#[derive(Debug, Clone)]
struct Frozen {
    transaction_id: TransactionId,
    node_ids: Vec<AccountId>,
    /// `chunks[chunk][node]`, nodes in `node_ids` order.
    chunks: Vec<Vec<SignedTransaction>>,
}

#[derive(Clone)]
pub struct Transaction<D> {
    data: D,
    node_selection: NodeSelection,
    transaction_id: Option<TransactionId>,
    transaction_id_is_explicit: bool,
    max_transaction_fee: Option<Amount>,
    valid_duration: Duration,
    memo: String,
    regenerate_transaction_id: Option<bool>,
    settings: RequestSettings,
    signers: Vec<Arc<dyn Signer>>,
    frozen: Option<Frozen>,
    current_chunk: usize,
}

impl<D: TransactionData + Default> Default for Transaction<D> {
    fn default() -> Self {
        Self::with_data(D::default())
    }
}

impl<D: TransactionData + Default> Transaction<D> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: TransactionData> Transaction<D> {
    pub fn with_data(data: D) -> Self {
        Self {
            data,
            node_selection: NodeSelection::Unset,
            transaction_id: None,
            transaction_id_is_explicit: false,
            max_transaction_fee: None,
            valid_duration: DEFAULT_VALID_DURATION,
            memo: String::new(),
            regenerate_transaction_id: None,
            settings: RequestSettings::default(),
            signers: Vec::new(),
            frozen: None,
            current_chunk: 0,
        }
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    /// Changing the payload of a frozen transaction thaws it.
    pub(crate) fn data_mut(&mut self) -> &mut D {
        self.thaw();
        &mut self.data
    }

    /// Uses a caller-chosen id. Such an id is never regenerated.
    pub fn transaction_id(&mut self, transaction_id: TransactionId) -> &mut Self {
        self.thaw();
        self.transaction_id = Some(transaction_id);
        self.transaction_id_is_explicit = true;
        self
    }

    pub fn get_transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    pub fn node_account_ids(&mut self, ids: impl IntoIterator<Item = AccountId>) -> &mut Self {
        self.thaw();
        self.node_selection = NodeSelection::fixed(ids.into_iter().collect());
        self
    }

    pub fn get_node_account_ids(&self) -> &[AccountId] {
        self.node_selection.ids()
    }

    pub fn max_transaction_fee(&mut self, fee: Amount) -> &mut Self {
        self.thaw();
        self.max_transaction_fee = Some(fee);
        self
    }

    pub fn transaction_valid_duration(&mut self, duration: Duration) -> &mut Self {
        self.thaw();
        self.valid_duration = duration;
        self
    }

    pub fn transaction_memo(&mut self, memo: impl Into<String>) -> &mut Self {
        self.thaw();
        self.memo = memo.into();
        self
    }

    /// Overrides the client's default for regenerating an expired id.
    pub fn regenerate_transaction_id(&mut self, regenerate: bool) -> &mut Self {
        self.regenerate_transaction_id = Some(regenerate);
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

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Number of transactions this one is sent as.
    pub fn chunk_count(&self) -> usize {
        self.data.chunk_data().map_or(1, ChunkData::chunk_count)
    }

    /// Freezes without a client; the id and nodes must already be set.
    pub fn freeze(&mut self) -> Result<&mut Self> {
        self.freeze_with(None)
    }

    /// Fixes the id and candidate nodes, then signs one body per node and
    /// chunk.
    ///
    /// The client supplies what the transaction does not set itself: the
    /// payer for a generated id, the candidate nodes and the operator's
    /// signature.
    pub fn freeze_with(&mut self, client: Option<&Client>) -> Result<&mut Self> {
        if self.frozen.is_some() {
            return Ok(self);
        }

        if let Some(chunk_data) = self.data.chunk_data() {
            chunk_data.check_limit()?;
        }

        let operator = client.and_then(Client::operator);

        let transaction_id = match self.transaction_id {
            Some(id) => id,
            None => {
                let payer = operator.as_ref().ok_or(HedronError::NoPayerAccount)?.account_id;
                TransactionId::generate_span(payer, self.chunk_count())
            }
        };
        transaction_id.try_for_chunk(self.chunk_count() - 1)?;

        if self.node_selection.is_unset() {
            let client = client.ok_or_else(|| {
                HedronError::InvalidRequest("node account ids must be set to freeze without a client".to_string())
            })?;
            let ids = client.pool().node_account_ids_for_request();
            if ids.is_empty() {
                return Err(HedronError::NodeUnavailable("node pool is empty".to_string()));
            }
            self.node_selection.populate(ids);
        }

        if let Some(operator) = operator {
            let key = operator.signer.public_key();
            if !self.signers.iter().any(|signer| signer.public_key() == key) {
                self.signers.insert(0, operator.signer.clone());
            }
        }

        let node_ids = self.node_selection.ids().to_vec();
        let chunks = self.build_chunks(transaction_id, &node_ids)?;

        debug!(
            method = %D::METHOD,
            %transaction_id,
            nodes = node_ids.len(),
            chunks = chunks.len(),
            "froze transaction"
        );

        self.transaction_id = Some(transaction_id);
        self.frozen = Some(Frozen {
            transaction_id,
            node_ids,
            chunks,
        });
        Ok(self)
    }

    pub fn sign(&mut self, key: PrivateKey) -> &mut Self {
        self.sign_with(Arc::new(key))
    }

    /// Adds a signature. A frozen transaction is signed in place.
    pub fn sign_with(&mut self, signer: Arc<dyn Signer>) -> &mut Self {
        let key = signer.public_key();
        if self.signers.iter().any(|existing| existing.public_key() == key) {
            return self;
        }

        if let Some(frozen) = &mut self.frozen {
            for signed in frozen.chunks.iter_mut().flatten() {
                let pair = signature_pair(signer.as_ref(), &signed.body_bytes);
                signed.sig_map.push(pair);
            }
        }

        self.signers.push(signer);
        self
    }

    /// The signed bodies for every chunk and node, once frozen.
    pub fn signed_transactions(&self) -> Option<&[Vec<SignedTransaction>]> {
        self.frozen.as_ref().map(|frozen| frozen.chunks.as_slice())
    }

    /// Submits the transaction.
    ///
    /// A chunked transaction submits every chunk, waiting for each receipt
    /// in turn, and returns the response for the first chunk.
    pub async fn execute(&mut self, client: &Client) -> Result<TransactionResponse> {
        self.freeze_with(Some(client))?;

        if self.chunk_count() > 1 {
            let responses = self.execute_all(client).await?;
            return responses
                .into_iter()
                .next()
                .ok_or_else(|| HedronError::InvalidResponse("chunked execution returned no responses".to_string()));
        }

        self.current_chunk = 0;
        crate::execute::execute(client, self).await
    }

    /// Submits every chunk in order and returns one response per chunk.
    ///
    /// Chunk `i + 1` is only sent once chunk `i` has a `SUCCESS` receipt.
    pub async fn execute_all(
        &mut self,
        client: &Client,
    ) -> std::result::Result<Vec<TransactionResponse>, ChunkedExecutionError> {
        if let Err(error) = self.freeze_with(Some(client)) {
            return Err(ChunkedExecutionError {
                responses: Vec::new(),
                error,
            });
        }

        let total = self.chunk_count();
        let mut responses = Vec::with_capacity(total);

        for index in 0..total {
            self.current_chunk = index;

            let response = match crate::execute::execute(client, self).await {
                Ok(response) => response,
                Err(error) => return Err(ChunkedExecutionError { responses, error }),
            };

            if total > 1 {
                let mut receipt_query = response.get_receipt_query();
                receipt_query.validate_status(true);
                if let Some(max_attempts) = self.settings.max_attempts {
                    receipt_query.max_attempts(max_attempts);
                }

                if let Err(error) = receipt_query.execute(client).await {
                    responses.push(response);
                    return Err(ChunkedExecutionError { responses, error });
                }
                debug!(chunk = index + 1, total, transaction_id = %response.transaction_id, "chunk reached consensus");
            }

            responses.push(response);
        }

        self.current_chunk = 0;
        Ok(responses)
    }

    fn build_chunks(&self, transaction_id: TransactionId, node_ids: &[AccountId]) -> Result<Vec<Vec<SignedTransaction>>> {
        let total = self.chunk_count();
        let fee = self
            .max_transaction_fee
            .unwrap_or_else(|| self.data.default_max_transaction_fee());

        (0..total)
            .map(|index| {
                let chunk = ChunkContext {
                    index,
                    total,
                    initial_transaction_id: transaction_id,
                };
                let payload = self.data.to_payload(&chunk)?;

                node_ids
                    .iter()
                    .map(|node_account_id| {
                        let body = TransactionBody {
                            transaction_id: chunk.transaction_id(),
                            node_account_id: *node_account_id,
                            transaction_fee: fee,
                            valid_duration_secs: self.valid_duration.as_secs(),
                            memo: self.memo.clone(),
                            data: payload.clone(),
                        };
                        sign_body(&body, &self.signers)
                    })
                    .collect()
            })
            .collect()
    }

    fn thaw(&mut self) {
        self.frozen = None;
    }

    fn current_chunk_id(&self) -> Option<TransactionId> {
        self.frozen
            .as_ref()
            .map(|frozen| frozen.transaction_id.for_chunk(self.current_chunk))
    }
}

impl<D: fmt::Debug> fmt::Debug for Transaction<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("data", &self.data)
            .field("node_selection", &self.node_selection)
            .field("transaction_id", &self.transaction_id.map(|id| id.to_string()))
            .field("signers", &self.signers.len())
            .field("frozen", &self.frozen.is_some())
            .finish_non_exhaustive()
    }
}

impl<D: TransactionData> executable::Executable for Transaction<D> {
    type Response = TransactionResponse;

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
        RequestKind::Transaction
    }

    fn method(&self) -> RpcMethod {
        D::METHOD
    }

    fn build_request(&self, _attempt: usize) -> Result<WireRequest> {
        let frozen = self.frozen.as_ref().ok_or_else(|| {
            HedronError::InvalidRequest("transaction must be frozen before it is executed".to_string())
        })?;
        let node = self
            .node_selection
            .current()
            .ok_or_else(|| HedronError::InvalidRequest("transaction has no candidate nodes".to_string()))?;
        let position = frozen
            .node_ids
            .iter()
            .position(|id| *id == node)
            .ok_or(HedronError::InvalidNode(node))?;

        frozen
            .chunks
            .get(self.current_chunk)
            .and_then(|chunk| chunk.get(position))
            .cloned()
            .map(WireRequest::Transaction)
            .ok_or_else(|| {
                HedronError::InvalidRequest(format!("no signed body for chunk {}", self.current_chunk + 1))
            })
    }

    fn classify(&self, response: &WireResponse) -> ExecutionState {
        match response {
            WireResponse::Transaction(ack) => classify_precheck(ack.precheck, RequestKind::Transaction),
            WireResponse::Query(_) => ExecutionState::Error,
        }
    }

    fn map_status_error(&self, response: &WireResponse) -> HedronError {
        match response {
            WireResponse::Transaction(ack) => HedronError::Precheck {
                status: ack.precheck,
                transaction_id: self.current_chunk_id(),
            },
            WireResponse::Query(_) => {
                HedronError::InvalidResponse(format!("{} answered with a query response", D::METHOD))
            }
        }
    }

    fn map_response(
        &self,
        _response: WireResponse,
        node_account_id: AccountId,
        request: WireRequest,
    ) -> Result<TransactionResponse> {
        let signed = match request {
            WireRequest::Transaction(signed) => signed,
            WireRequest::Query(_) => {
                return Err(HedronError::InvalidRequest("transaction sent a query payload".to_string()));
            }
        };

        Ok(TransactionResponse {
            node_account_id,
            transaction_id: signed.body()?.transaction_id,
            transaction_hash: signed.hash(),
            validate_status: true,
        })
    }

    fn regenerate_identity(&mut self, client: &Client) -> Result<bool> {
        let allowed = self
            .regenerate_transaction_id
            .unwrap_or_else(|| client.default_regenerate_transaction_id());
        if !allowed || self.transaction_id_is_explicit || self.chunk_count() > 1 {
            return Ok(false);
        }

        let (payer, node_ids) = match &self.frozen {
            Some(frozen) => (frozen.transaction_id.account_id, frozen.node_ids.clone()),
            None => return Ok(false),
        };

        let transaction_id = TransactionId::generate(payer);
        let chunks = self.build_chunks(transaction_id, &node_ids)?;

        self.transaction_id = Some(transaction_id);
        self.frozen = Some(Frozen {
            transaction_id,
            node_ids,
            chunks,
        });
        Ok(true)
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        self.current_chunk_id()
    }
}
