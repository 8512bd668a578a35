use crate::core::errors::ClientError;
use crate::core::traits::TokenStorage;
use crate::core::types::CredentialPair;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Process-wide holder of the current access/refresh token pair.
///
/// The pair is mutated only by the refresh coordinator (successful
/// refresh or login) and cleared on logout or irrecoverable refresh
/// failure. Every mutation writes through to durable storage so a
/// restart resumes the session.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    tokens: RwLock<Option<CredentialPair>>,
    storage: Arc<dyn TokenStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tokens: RwLock::new(None),
                storage,
            }),
        }
    }

    /// Rehydrate the in-memory pair from durable storage. Called once at
    /// startup by the composition root.
    pub fn load(&self) -> Result<(), ClientError> {
        let restored = self.inner.storage.load()?;
        if restored.is_some() {
            debug!("restored persisted session tokens");
        }
        *write_lock(&self.inner.tokens) = restored;
        Ok(())
    }

    pub fn current(&self) -> Option<CredentialPair> {
        read_lock(&self.inner.tokens).clone()
    }

    pub fn access_token(&self) -> Option<String> {
        read_lock(&self.inner.tokens)
            .as_ref()
            .and_then(CredentialPair::access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        read_lock(&self.inner.tokens)
            .as_ref()
            .and_then(CredentialPair::refresh_token)
    }

    /// Replace the pair and persist it.
    pub fn set(&self, pair: CredentialPair) -> Result<(), ClientError> {
        self.inner.storage.save(&pair)?;
        *write_lock(&self.inner.tokens) = Some(pair);
        Ok(())
    }

    /// Drop both tokens, in memory and on disk, together.
    pub fn clear(&self) -> Result<(), ClientError> {
        self.inner.storage.clear()?;
        *write_lock(&self.inner.tokens) = None;
        Ok(())
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
