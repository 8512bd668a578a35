pub mod core;
pub mod events;
pub mod push;
pub mod session;
pub mod trade;
pub mod utils;

pub use crate::core::{config::SessionConfig, errors::ClientError, types::*};
pub use crate::events::dispatcher::{BusEvent, EventBus, SubscriptionHandle, Topic};
pub use crate::push::manager::PushConnectionManager;
pub use crate::session::client::SessionClient;
pub use crate::trade::tracker::TradeLockTracker;
pub use crate::utils::factory::SessionServices;
