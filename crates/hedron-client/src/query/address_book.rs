use hedron_common::transport::RpcMethod;
use hedron_common::{AccountId, FileId, HedronError, Result};
use hedron_network::{NodeAddress, NodeAddressBook};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{Query, QueryData};
use crate::client::Client;

/// File the network publishes its node list in.
pub const ADDRESS_BOOK_FILE_ID: FileId = FileId::from_num(102);

const DEFAULT_PAGE_SIZE: usize = 25;

/// One page of the address book, starting at `offset`.
#[derive(Debug, Clone)]
pub struct AddressBookPageData {
    file_id: FileId,
    offset: usize,
    page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressBookPage {
    #[serde(default)]
    pub node_addresses: Vec<NodeAddress>,
    /// Where the next page starts; absent on the last page.
    #[serde(default)]
    pub next_offset: Option<usize>,
}

impl QueryData for AddressBookPageData {
    type Output = AddressBookPage;

    const METHOD: RpcMethod = RpcMethod::new("AddressBookService", "getNodes");

    fn is_payment_required(&self) -> bool {
        false
    }

    fn body(&self) -> Result<Value> {
        Ok(json!({
            "file_id": self.file_id,
            "offset": self.offset,
            "limit": self.page_size,
        }))
    }

    fn parse_response(&self, body: Value, _node_account_id: AccountId) -> Result<AddressBookPage> {
        Ok(serde_json::from_value(body)?)
    }
}

/// Fetches the whole node address book, page by page.
///
/// Free. Every page goes through the same execution engine as any other
/// query, so a page that fails on one node is retried on another.
#[derive(Debug, Clone)]
pub struct AddressBookQuery {
    file_id: FileId,
    page_size: usize,
    limit: Option<usize>,
    node_account_ids: Vec<AccountId>,
    max_attempts: Option<usize>,
    request_timeout: Option<Duration>,
}

impl Default for AddressBookQuery {
    fn default() -> Self {
        Self {
            file_id: ADDRESS_BOOK_FILE_ID,
            page_size: DEFAULT_PAGE_SIZE,
            limit: None,
            node_account_ids: Vec::new(),
            max_attempts: None,
            request_timeout: None,
        }
    }
}

impl AddressBookQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_id(&mut self, file_id: FileId) -> &mut Self {
        self.file_id = file_id;
        self
    }

    pub fn page_size(&mut self, page_size: usize) -> &mut Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Stops after `limit` nodes.
    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn node_account_ids(&mut self, ids: impl IntoIterator<Item = AccountId>) -> &mut Self {
        self.node_account_ids = ids.into_iter().collect();
        self
    }

    pub fn max_attempts(&mut self, max_attempts: usize) -> &mut Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub async fn execute(&self, client: &Client) -> Result<NodeAddressBook> {
        let mut book = NodeAddressBook::default();
        let mut offset = 0;

        loop {
            let mut page = Query::with_data(AddressBookPageData {
                file_id: self.file_id,
                offset,
                page_size: self.page_size,
            });
            page.node_account_ids(self.node_account_ids.iter().copied());
            if let Some(max_attempts) = self.max_attempts {
                page.max_attempts(max_attempts);
            }
            if let Some(timeout) = self.request_timeout {
                page.request_timeout(timeout);
            }

            let AddressBookPage {
                node_addresses,
                next_offset,
            } = page.execute(client).await?;

            debug!(offset, nodes = node_addresses.len(), "received address book page");
            let received = node_addresses.len();
            book.node_addresses.extend(node_addresses);

            if let Some(limit) = self.limit {
                if book.node_addresses.len() >= limit {
                    book.node_addresses.truncate(limit);
                    break;
                }
            }

            match next_offset {
                None => break,
                Some(_) if received == 0 => break,
                Some(next) if next <= offset => {
                    return Err(HedronError::InvalidResponse(format!(
                        "address book page at offset {} pointed back to {}",
                        offset, next
                    )));
                }
                Some(next) => offset = next,
            }
        }

        Ok(book)
    }
}
