//! Periodic address-book refresh.
//!
//! The refresher re-fetches the network's address book on a fixed period
//! and swaps the pool's membership. The fetch itself is a query executed
//! through the client's own execution engine, which is why the source is a
//! trait implemented above this crate.

use async_trait::async_trait;
use hedron_common::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address_book::NodeAddressBook;
use crate::pool::NodePool;

pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Something that can fetch the current address book.
#[async_trait]
pub trait AddressBookSource: Send + Sync {
    async fn fetch_address_book(&self) -> Result<NodeAddressBook>;
}

/// Background task replacing pool membership.
pub struct AddressBookRefresher {
    pool: Arc<NodePool>,
    source: Arc<dyn AddressBookSource>,
    period: Duration,
    token: CancellationToken,
}

impl AddressBookRefresher {
    pub fn new(pool: Arc<NodePool>, source: Arc<dyn AddressBookSource>, period: Duration) -> Self {
        Self {
            pool,
            source,
            period,
            token: CancellationToken::new(),
        }
    }

    /// Fetches the address book once and applies it.
    ///
    /// An empty book is ignored so a bad fetch cannot empty the pool.
    pub async fn refresh_once(&self) -> Result<usize> {
        let book = self.source.fetch_address_book().await?;
        let entries = book.entries();

        if entries.is_empty() {
            warn!("fetched address book has no reachable nodes; keeping current membership");
            return Ok(self.pool.len());
        }

        Ok(self.pool.replace_membership(entries))
    }

    /// Starts the refresh loop. The first refresh happens one period from
    /// now; the task stops when the returned handle is cancelled or dropped.
    pub fn spawn(self) -> RefreshHandle {
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            self.run().await;
        });

        RefreshHandle { token, handle: Some(handle) }
    }

    async fn run(self) {
        let start = tokio::time::Instant::now() + self.period;
        let mut interval = tokio::time::interval_at(start, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = self.period.as_secs(), "address book refresher started");

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = interval.tick() => {
                    match self.refresh_once().await {
                        Ok(nodes) => debug!(nodes, "address book refreshed"),
                        Err(e) => warn!(error = %e, "address book refresh failed"),
                    }
                }
            }
        }

        info!("address book refresher stopped");
    }
}

/// Owner of a running refresher. Dropping it stops the task.
#[derive(Debug)]
pub struct RefreshHandle {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Cancels the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
