//! Hedron Node Pool
//!
//! Tracks the network's nodes, their health, and the channels used to reach
//! them. Every in-flight request shares the same [`NodePool`], so all health
//! mutations go through per-node locks and membership sits behind a
//! `RwLock`.
//!
//! - [`Node`]: one endpoint with its exponential backoff state
//! - [`NodePool`]: selection, channel acquisition, backoff, membership
//! - [`AddressBookRefresher`]: background task that replaces the membership
//!   from a freshly fetched [`NodeAddressBook`]

pub mod address_book;
pub mod node;
pub mod pool;
pub mod refresh;

pub use address_book::{NodeAddress, NodeAddressBook};
pub use node::{Node, NodeHandle};
pub use pool::{NodePool, NodePoolConfig};
pub use refresh::{AddressBookRefresher, AddressBookSource, RefreshHandle, DEFAULT_REFRESH_PERIOD};
