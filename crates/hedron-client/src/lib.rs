//! Hedron Client
//!
//! Executes queries and transactions against a permissioned network of
//! equivalent nodes.
//!
//! # Overview
//!
//! Every request goes through one execution loop that:
//! - picks a node from the shared [`hedron_network::NodePool`], skipping
//!   nodes that are backing off
//! - dispatches the request over the node's [`hedron_common::transport::Channel`]
//! - classifies transport failures and node-reported precheck statuses
//! - retries with exponential backoff until an attempt limit is reached
//!
//! On top of the loop:
//! - paid queries look up their cost first and attach one signed payment
//!   per candidate node
//! - transactions whose id expired before reaching consensus are re-signed
//!   under a fresh id
//! - payloads too large for one transaction are split into chunks that are
//!   submitted strictly in order
//!
//! # Example
//!
//! ```no_run
//! use hedron_client::{AccountBalanceQuery, Client, PrivateKey, TransferTransaction};
//! use hedron_common::{AccountId, Amount};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::for_network([("127.0.0.1:50211".to_string(), AccountId::from_num(3))]);
//! client.set_operator("0.0.1001".parse()?, "11".repeat(32).parse::<PrivateKey>()?);
//!
//! let balance = AccountBalanceQuery::new()
//!     .account_id(AccountId::from_num(1001))
//!     .execute(&client)
//!     .await?;
//! println!("balance: {}", balance.balance);
//!
//! let response = TransferTransaction::new()
//!     .transfer(AccountId::from_num(1001), Amount::from_tinyunits(-10))
//!     .transfer(AccountId::from_num(1002), Amount::from_tinyunits(10))
//!     .execute(&client)
//!     .await?;
//! let receipt = response.get_receipt(&client).await?;
//! println!("status: {}", receipt.status);
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
mod config;
mod executable;
mod execute;
mod key;
mod node_list;
mod query;
mod transaction;

pub use classify::{classify_precheck, should_retry_transport};
pub use client::{
    Client, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_QUERY_PAYMENT, DEFAULT_MIN_BACKOFF,
};
pub use config::{ClientConfig, OperatorConfig};
pub use executable::{ExecutionState, RequestKind};
pub use execute::backoff_for_attempt;
pub use key::{Operator, PrivateKey, PublicKey, Signer};
pub use node_list::{NodeList, NodeSelection};
pub use query::{
    AccountBalance, AccountBalanceQuery, AccountBalanceQueryData, AccountInfo, AccountInfoQuery,
    AccountInfoQueryData, AddressBookPage, AddressBookPageData, AddressBookQuery, FileContents,
    FileContentsQuery, FileContentsQueryData, Query, QueryData, TransactionReceipt, TransactionReceiptQuery,
    TransactionReceiptQueryData, ADDRESS_BOOK_FILE_ID, MIN_QUERY_COST, PAYMENT_TRANSACTION_FEE,
};
pub use transaction::{
    ChunkContext, ChunkData, ChunkedExecutionError, FileAppendTransaction, FileAppendTransactionData,
    TopicMessageSubmitTransaction, TopicMessageSubmitTransactionData, Transaction, TransactionData,
    TransactionResponse, TransferTransaction, TransferTransactionData, DEFAULT_MAX_TRANSACTION_FEE,
    DEFAULT_VALID_DURATION,
};

pub use hedron_common::{HedronError, Result};
