use anyhow::Result;
use std::sync::{Arc, RwLock};

use crate::core::error::GenerationError;
use crate::core::io::Storage;

pub const CREDENTIAL_KEY: &str = "gemini_api_key";
pub const CREDENTIAL_HELP_URL: &str = "https://aistudio.google.com/app/apikey";

/// The single active API credential, mirrored to durable storage.
///
/// Readers take a snapshot with [`CredentialStore::get`]; a later `set` or `clear`
/// never affects a snapshot already handed out.
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
    current: RwLock<Option<String>>,
}

impl CredentialStore {
    /// Restores whatever credential the previous session persisted.
    pub async fn load(storage: Arc<dyn Storage>) -> Result<Self> {
        let stored = storage
            .get(CREDENTIAL_KEY)
            .await?
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        log::debug!("Credential restored from storage: {}", stored.is_some());
        Ok(Self {
            storage,
            current: RwLock::new(stored),
        })
    }

    pub async fn set(&self, token: &str) -> Result<(), GenerationError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GenerationError::EmptyCredential);
        }
        self.storage
            .set(CREDENTIAL_KEY, token)
            .await
            .map_err(GenerationError::Storage)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        log::info!("Credential saved");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), GenerationError> {
        self.storage
            .remove(CREDENTIAL_KEY)
            .await
            .map_err(GenerationError::Storage)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        log::info!("Credential cleared");
        Ok(())
    }

    pub fn get(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_present(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
