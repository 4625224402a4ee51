//! The caller context every request executes against.

use async_trait::async_trait;
use hedron_common::transport::{Connector, HttpConnector};
use hedron_common::{AccountId, Amount, Result};
use hedron_metrics::{ClientMetricsCollector, MetricsCollector, MetricsSnapshot};
use hedron_network::{
    AddressBookRefresher, AddressBookSource, NodeAddressBook, NodePool, NodePoolConfig, RefreshHandle,
};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::key::{Operator, PrivateKey, Signer};
use crate::query::AddressBookQuery;

/// Attempt limit of a request that does not set its own.
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Initial per-request backoff.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(250);

/// Per-request backoff ceiling.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Most a paid query may cost unless the query sets its own cap.
pub const DEFAULT_MAX_QUERY_PAYMENT: Amount = Amount::from_units(1);

#[derive(Debug, Clone)]
struct ClientSettings {
    max_attempts: Option<usize>,
    min_backoff: Duration,
    max_backoff: Duration,
    request_timeout: Option<Duration>,
    default_max_query_payment: Amount,
    default_regenerate_transaction_id: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_attempts: None,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            request_timeout: None,
            default_max_query_payment: DEFAULT_MAX_QUERY_PAYMENT,
            default_regenerate_transaction_id: true,
        }
    }
}

struct ClientInner {
    pool: Arc<NodePool>,
    operator: RwLock<Option<Arc<Operator>>>,
    settings: RwLock<ClientSettings>,
    metrics: Arc<dyn MetricsCollector>,
    refresher: Mutex<Option<RefreshHandle>>,
}

/// Handle to one network: its node pool, the paying operator and the
/// defaults requests fall back to.
///
/// Cloning is cheap and every clone shares the same pool, so node health
/// learned by one request benefits all others.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Connects to `network` over HTTP JSON-RPC.
    ///
    /// `network` maps node addresses (`host:port`) to node accounts.
    pub fn for_network(network: impl IntoIterator<Item = (String, AccountId)>) -> Self {
        let mut entries: Vec<(AccountId, String)> = network
            .into_iter()
            .map(|(address, account_id)| (account_id, address))
            .collect();
        entries.sort();

        Self::with_connector(entries, Arc::new(HttpConnector::default()), NodePoolConfig::default())
    }

    /// Builds a client over a custom transport.
    pub fn with_connector(
        entries: impl IntoIterator<Item = (AccountId, String)>,
        connector: Arc<dyn Connector>,
        pool_config: NodePoolConfig,
    ) -> Self {
        let pool = Arc::new(NodePool::new(entries, connector, pool_config));

        Self {
            inner: Arc::new(ClientInner {
                pool,
                operator: RwLock::new(None),
                settings: RwLock::new(ClientSettings::default()),
                metrics: Arc::new(ClientMetricsCollector::new()),
                refresher: Mutex::new(None),
            }),
        }
    }

    /// Builds a client from a loaded configuration.
    ///
    /// The address-book refresher is only started when called from inside a
    /// tokio runtime.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let connector = Arc::new(HttpConnector::default());
        let client = Self::with_connector(config.network_entries()?, connector, config.pool_config());

        if let Some(operator) = &config.operator {
            let account_id: AccountId = operator.account_id.parse()?;
            let key: PrivateKey = operator.private_key.parse()?;
            client.set_operator(account_id, key);
        }

        {
            let mut settings = client.settings_mut();
            settings.max_attempts = config.max_attempts;
            settings.min_backoff = Duration::from_millis(config.min_backoff_ms);
            settings.max_backoff = Duration::from_millis(config.max_backoff_ms);
            settings.request_timeout = config.request_timeout_ms.map(Duration::from_millis);
            settings.default_max_query_payment = config.default_max_query_payment;
            settings.default_regenerate_transaction_id = config.regenerate_transaction_id;
        }

        if let Some(secs) = config.address_book_refresh_secs {
            if tokio::runtime::Handle::try_current().is_ok() {
                client.start_address_book_refresh(Duration::from_secs(secs));
            } else {
                debug!("no tokio runtime; address book refresh not started");
            }
        }

        Ok(client)
    }

    pub fn set_operator(&self, account_id: AccountId, key: PrivateKey) -> &Self {
        self.set_operator_with_signer(account_id, Arc::new(key))
    }

    /// Uses an external signer for the operator account.
    pub fn set_operator_with_signer(&self, account_id: AccountId, signer: Arc<dyn Signer>) -> &Self {
        let operator = Operator::with_signer(account_id, signer);
        *self.inner.operator.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(operator));
        self
    }

    pub fn operator(&self) -> Option<Arc<Operator>> {
        self.inner.operator.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn operator_account_id(&self) -> Option<AccountId> {
        self.operator().map(|operator| operator.account_id)
    }

    /// Overrides every request's own attempt limit.
    pub fn set_max_attempts(&self, max_attempts: usize) -> &Self {
        self.settings_mut().max_attempts = Some(max_attempts);
        self
    }

    pub fn max_attempts(&self) -> Option<usize> {
        self.settings().max_attempts
    }

    pub fn set_min_backoff(&self, min_backoff: Duration) -> &Self {
        self.settings_mut().min_backoff = min_backoff;
        self
    }

    pub fn min_backoff(&self) -> Duration {
        self.settings().min_backoff
    }

    pub fn set_max_backoff(&self, max_backoff: Duration) -> &Self {
        self.settings_mut().max_backoff = max_backoff;
        self
    }

    pub fn max_backoff(&self) -> Duration {
        self.settings().max_backoff
    }

    pub fn set_request_timeout(&self, timeout: Option<Duration>) -> &Self {
        self.settings_mut().request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.settings().request_timeout
    }

    pub fn set_default_max_query_payment(&self, amount: Amount) -> &Self {
        self.settings_mut().default_max_query_payment = amount;
        self
    }

    pub fn default_max_query_payment(&self) -> Amount {
        self.settings().default_max_query_payment
    }

    /// Whether expired transactions get a fresh id by default.
    pub fn set_default_regenerate_transaction_id(&self, regenerate: bool) -> &Self {
        self.settings_mut().default_regenerate_transaction_id = regenerate;
        self
    }

    pub fn default_regenerate_transaction_id(&self) -> bool {
        self.settings().default_regenerate_transaction_id
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.inner.pool
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.inner.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Fetches the address book now and replaces the pool's membership.
    pub async fn refresh_address_book(&self) -> Result<usize> {
        AddressBookRefresher::new(self.inner.pool.clone(), self.address_book_source(), Duration::ZERO)
            .refresh_once()
            .await
    }

    /// Starts (or restarts) the background address-book refresher.
    ///
    /// Must be called from inside a tokio runtime. The task stops when the
    /// last clone of this client is dropped.
    pub fn start_address_book_refresh(&self, period: Duration) {
        let handle =
            AddressBookRefresher::new(self.inner.pool.clone(), self.address_book_source(), period).spawn();

        let previous = self
            .inner
            .refresher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if previous.is_some() {
            info!("replaced running address book refresher");
        }
    }

    pub async fn stop_address_book_refresh(&self) {
        let handle = self.inner.refresher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    pub fn is_refreshing_address_book(&self) -> bool {
        self.inner
            .refresher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn address_book_source(&self) -> Arc<dyn AddressBookSource> {
        Arc::new(NetworkAddressBook {
            client: Arc::downgrade(&self.inner),
        })
    }

    fn settings(&self) -> ClientSettings {
        self.inner.settings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn settings_mut(&self) -> std::sync::RwLockWriteGuard<'_, ClientSettings> {
        self.inner.settings.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("nodes", &self.inner.pool.len())
            .field("operator", &self.operator_account_id())
            .field("settings", &self.settings())
            .finish()
    }
}

/// Fetches the address book through the client's own execution engine.
///
/// Holds the client weakly so the refresher task never keeps it alive.
struct NetworkAddressBook {
    client: Weak<ClientInner>,
}

#[async_trait]
impl AddressBookSource for NetworkAddressBook {
    async fn fetch_address_book(&self) -> Result<NodeAddressBook> {
        let inner = self.client.upgrade().ok_or_else(|| {
            hedron_common::HedronError::NodeUnavailable("client has been dropped".to_string())
        })?;
        let client = Client { inner };

        AddressBookQuery::new().execute(&client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedron_common::transport::{Channel, RpcStatus};
    use hedron_common::{WireRequest, WireResponse};

    struct NoConnector;

    struct NoChannel;

    #[async_trait]
    impl Channel for NoChannel {
        async fn unary(
            &self,
            _method: hedron_common::transport::RpcMethod,
            _request: WireRequest,
        ) -> std::result::Result<WireResponse, RpcStatus> {
            Err(RpcStatus::unavailable("no network"))
        }
    }

    impl Connector for NoConnector {
        fn connect(&self, _address: &str) -> Result<Arc<dyn Channel>> {
            Ok(Arc::new(NoChannel))
        }
    }

    fn client() -> Client {
        Client::with_connector(
            vec![(AccountId::from_num(3), "node3:50211".to_string())],
            Arc::new(NoConnector),
            NodePoolConfig::default(),
        )
    }

    #[test]
    fn test_defaults() {
        let client = client();
        assert_eq!(client.max_attempts(), None);
        assert_eq!(client.min_backoff(), Duration::from_millis(250));
        assert_eq!(client.max_backoff(), Duration::from_secs(8));
        assert_eq!(client.default_max_query_payment(), Amount::from_tinyunits(100_000_000));
        assert!(client.default_regenerate_transaction_id());
        assert!(client.operator().is_none());
        assert_eq!(client.pool().len(), 1);
    }

    #[test]
    fn test_setters_are_shared_between_clones() {
        let client = client();
        let clone = client.clone();

        client.set_max_attempts(3).set_request_timeout(Some(Duration::from_secs(2)));
        clone.set_operator(AccountId::from_num(1001), PrivateKey::generate());

        assert_eq!(clone.max_attempts(), Some(3));
        assert_eq!(clone.request_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(client.operator_account_id(), Some(AccountId::from_num(1001)));
    }

    #[test]
    fn test_for_network_sorts_nodes() {
        let client = Client::for_network(vec![
            ("127.0.0.1:50214".to_string(), AccountId::from_num(4)),
            ("127.0.0.1:50213".to_string(), AccountId::from_num(3)),
        ]);

        let ids: Vec<u64> = client.pool().nodes().iter().map(|node| node.account_id().num).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_refresher_lifecycle() {
        let client = client();
        assert!(!client.is_refreshing_address_book());

        client.start_address_book_refresh(Duration::from_secs(3600));
        assert!(client.is_refreshing_address_book());

        client.stop_address_book_refresh().await;
        assert!(!client.is_refreshing_address_book());
    }

    #[tokio::test]
    async fn test_refresh_source_fails_after_client_dropped() {
        let client = client();
        let source = client.address_book_source();
        drop(client);

        let err = source.fetch_address_book().await.unwrap_err();
        assert!(matches!(err, hedron_common::HedronError::NodeUnavailable(_)));
    }
}
