use crate::core::config::SessionConfig;
use crate::core::errors::ClientError;
use crate::core::kernel::{
    HttpClient, HttpConfig, ReqwestHttp, SocketFactory, TungsteniteFactory,
};
use crate::core::traits::{Clock, SystemClock, TokenStorage};
use crate::events::dispatcher::EventBus;
use crate::events::normalizer::EventNormalizer;
use crate::push::codec::StorefrontCodec;
use crate::push::manager::{PushConfig, PushConnectionManager};
use crate::push::protocol::WireFrame;
use crate::session::client::SessionClient;
use crate::session::credentials::CredentialStore;
use crate::session::refresh::RefreshCoordinator;
use crate::session::storage::FileTokenStorage;
use crate::trade::api::TradeApi;
use crate::trade::tracker::TradeLockTracker;
use std::sync::Arc;
use std::time::Duration;

/// The wired-up session layer.
///
/// The composition root: everything is an explicitly constructed
/// instance with injected dependencies - no globals - so an application
/// builds one of these at startup and hands the pieces to whoever needs
/// them, and tests assemble the same graph over mock seams.
pub struct SessionServices {
    pub config: SessionConfig,
    pub credentials: CredentialStore,
    pub client: SessionClient,
    pub trades: TradeApi,
    pub push: PushConnectionManager,
    pub bus: EventBus,
}

impl SessionServices {
    /// Build the production graph: file-backed token storage, reqwest
    /// transport, tungstenite push factory, wall clock.
    pub fn build(config: SessionConfig) -> Result<Self, ClientError> {
        let storage: Arc<dyn TokenStorage> =
            Arc::new(FileTokenStorage::new(config.token_store_path.clone()));
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttp::new(
            HttpConfig::new(config.api_base_url.clone())
                .with_timeout(config.timeout_seconds)
                .with_user_agent(config.user_agent.clone()),
        )?);
        let socket_factory: Arc<dyn SocketFactory<Frame = WireFrame>> = Arc::new(
            TungsteniteFactory::new(config.push_url.clone(), StorefrontCodec),
        );
        Self::assemble(config, storage, http, socket_factory, Arc::new(SystemClock))
    }

    /// Build the graph over explicit seams. Tests use this with mock
    /// storage, transport, and clock.
    pub fn assemble(
        config: SessionConfig,
        storage: Arc<dyn TokenStorage>,
        http: Arc<dyn HttpClient>,
        socket_factory: Arc<dyn SocketFactory<Frame = WireFrame>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        let credentials = CredentialStore::new(storage);
        credentials.load()?;

        let bus = EventBus::new();
        let refresh =
            RefreshCoordinator::new(Arc::clone(&http), credentials.clone(), bus.clone());
        let client = SessionClient::new(http, credentials.clone(), refresh);
        let trades = TradeApi::new(client.clone());

        let normalizer = Arc::new(EventNormalizer::new(bus.clone(), config.role, clock));
        let push_config = PushConfig {
            max_reconnect_attempts: config.max_reconnect_attempts,
            ..PushConfig::default()
        };
        let push = PushConnectionManager::new(
            socket_factory,
            credentials.clone(),
            normalizer,
            bus.clone(),
            push_config,
        );

        Ok(Self {
            config,
            credentials,
            client,
            trades,
            push,
            bus,
        })
    }

    /// Start tracking one trade's lock progress. Drop the tracker when
    /// the trade view closes.
    pub fn track_trade(&self, trade_request_id: impl Into<String>) -> TradeLockTracker {
        TradeLockTracker::new(
            trade_request_id,
            self.bus.clone(),
            Duration::from_millis(self.config.completed_signal_delay_ms),
        )
    }
}
