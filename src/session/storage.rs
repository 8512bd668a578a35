use crate::core::errors::ClientError;
use crate::core::traits::TokenStorage;
use crate::core::types::CredentialPair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// On-disk shape of the persisted session. Zeroized when dropped so
/// token material does not linger in freed memory.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredTokens {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Durable token persistence in a single well-known file.
///
/// Both tokens are written together and the whole file is removed on
/// clear, so the pair can never be half-persisted.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<CredentialPair>, ClientError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ClientError::Storage(format!(
                    "failed to read token file: {}",
                    e
                )))
            }
        };

        let stored: StoredTokens = serde_json::from_str(&contents)
            .map_err(|e| ClientError::Storage(format!("corrupt token file: {}", e)))?;
        Ok(Some(CredentialPair::from_parts(
            stored.access_token.clone(),
            stored.refresh_token.clone(),
        )))
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), ClientError> {
        let stored = StoredTokens {
            access_token: pair.access_token(),
            refresh_token: pair.refresh_token(),
        };
        let contents = serde_json::to_string(&stored)
            .map_err(|e| ClientError::Storage(format!("failed to encode tokens: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ClientError::Storage(format!("failed to create token dir: {}", e))
                })?;
            }
        }
        fs::write(&self.path, contents)
            .map_err(|e| ClientError::Storage(format!("failed to write token file: {}", e)))
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(format!(
                "failed to remove token file: {}",
                e
            ))),
        }
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<(Option<String>, Option<String>)>>,
}

impl MemoryTokenStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<CredentialPair>, ClientError> {
        let slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(slot
            .as_ref()
            .map(|(access, refresh)| CredentialPair::from_parts(access.clone(), refresh.clone())))
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), ClientError> {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some((pair.access_token(), pair.refresh_token()));
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = None;
        Ok(())
    }
}
