use anyhow::Context;
use bazaarx::core::config::SessionConfig;
use bazaarx::core::types::EventKind;
use bazaarx::events::dispatcher::{BusEvent, Topic};
use bazaarx::utils::factory::SessionServices;
use tracing::info;

/// Push monitor: connects the session's push channel and prints every
/// event it delivers. Handy for watching a storefront session live.
///
/// Expects `BAZAAR_API_BASE_URL` and `BAZAAR_PUSH_URL` (plus optional
/// `BAZAAR_ROLE` etc.) in the environment or a `.env` file, with tokens
/// already persisted from a previous login.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    #[cfg(feature = "env-file")]
    let config = SessionConfig::from_env_file("BAZAAR").context("loading configuration")?;
    #[cfg(not(feature = "env-file"))]
    let config = SessionConfig::from_env("BAZAAR").context("loading configuration")?;

    let services = SessionServices::build(config).context("building session services")?;
    if services.credentials.current().is_none() {
        tracing::warn!("no persisted session tokens; the push connection will not authenticate");
    }

    let kinds = [
        EventKind::Text,
        EventKind::Media,
        EventKind::InventoryItem,
        EventKind::Unboxing,
        EventKind::SystemNotification,
    ];
    let _subscriptions: Vec<_> = kinds
        .into_iter()
        .map(|kind| {
            services.push.subscribe(kind, move |event| {
                info!(?kind, id = ?event.id, sender = ?event.sender_id, "event");
            })
        })
        .collect();
    let _trade_sub = services.bus.subscribe(Topic::TradeLock, |event| {
        if let BusEvent::TradeLock(update) = event {
            info!(
                trade = %update.trade_request_id,
                owner = update.owner_locked,
                requester = update.requester_locked,
                "trade lock update"
            );
        }
    });

    let mut state = services.push.watch_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            info!(state = ?*state.borrow(), "push connection");
        }
    });

    services.push.connect();
    info!("push monitor running, press Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;

    services.push.disconnect();
    Ok(())
}
