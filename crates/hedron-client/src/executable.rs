use hedron_common::transport::RpcMethod;
use hedron_common::{AccountId, HedronError, Result, TransactionId, WireRequest, WireResponse};
use std::time::Duration;

use crate::client::{Client, DEFAULT_MAX_ATTEMPTS};
use crate::node_list::NodeSelection;

/// Per-attempt verdict on a node's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Transient; back off and try again.
    Retry,
    Finished,
    Error,
    /// The transaction id is too old; retry under a fresh one if allowed.
    Expired,
}

/// Read-shaped requests get a header and a body back; write-shaped ones
/// only an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Query,
    Transaction,
}

/// Everything the execution loop needs from a request.
pub(crate) trait Executable: Send {
    type Response: Send;

    fn node_selection(&self) -> &NodeSelection;

    fn node_selection_mut(&mut self) -> &mut NodeSelection;

    fn advance(&mut self) {
        self.node_selection_mut().advance();
    }

    fn current_node(&self) -> Option<AccountId> {
        self.node_selection().current()
    }

    /// `(min, max)` for the per-attempt backoff, falling back to the
    /// client's defaults.
    fn backoff_bounds(&self, client: &Client) -> (Duration, Duration);

    fn request_timeout(&self, client: &Client) -> Option<Duration>;

    /// Attempt limit when the client does not override it.
    fn max_attempts(&self) -> usize;

    fn kind(&self) -> RequestKind;

    fn method(&self) -> RpcMethod;

    /// Wire payload for the current node.
    fn build_request(&self, attempt: usize) -> Result<WireRequest>;

    fn classify(&self, response: &WireResponse) -> ExecutionState;

    fn map_status_error(&self, response: &WireResponse) -> HedronError;

    fn map_response(
        &self,
        response: WireResponse,
        node_account_id: AccountId,
        request: WireRequest,
    ) -> Result<Self::Response>;

    /// Replaces an expired transaction id. Returns whether it did.
    fn regenerate_identity(&mut self, _client: &Client) -> Result<bool> {
        Ok(false)
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        None
    }
}

/// Per-request overrides of the client's retry defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RequestSettings {
    pub(crate) max_attempts: Option<usize>,
    pub(crate) min_backoff: Option<Duration>,
    pub(crate) max_backoff: Option<Duration>,
    pub(crate) request_timeout: Option<Duration>,
}

impl RequestSettings {
    pub(crate) fn backoff_bounds(&self, client: &Client) -> (Duration, Duration) {
        (
            self.min_backoff.unwrap_or_else(|| client.min_backoff()),
            self.max_backoff.unwrap_or_else(|| client.max_backoff()),
        )
    }

    pub(crate) fn request_timeout(&self, client: &Client) -> Option<Duration> {
        self.request_timeout.or_else(|| client.request_timeout())
    }

    pub(crate) fn max_attempts(&self) -> usize {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }
}
