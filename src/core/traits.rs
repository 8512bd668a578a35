use crate::core::{errors::ClientError, types::CredentialPair};
use chrono::{DateTime, Utc};

/// Time source seam. Injected so tests can pin `occurred_at` defaults.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Durable persistence for the token pair.
///
/// Both tokens live and die together: `save` replaces the whole pair and
/// `clear` removes both. The credential store writes through on every
/// mutation and reloads once at startup.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<CredentialPair>, ClientError>;
    fn save(&self, pair: &CredentialPair) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}
