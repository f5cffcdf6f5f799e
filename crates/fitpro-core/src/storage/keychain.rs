use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use super::{check_key, KeyValueStore, StorageError};

/// Default keychain service name
pub const SERVICE_NAME: &str = "fitpro";

/// Stores each key as a separate entry in the OS keychain.
///
/// Keychain calls block (and may wait on an unlock prompt), so each one runs
/// on Tokio's blocking pool.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different service name, e.g. to keep several API environments apart
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(Entry) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        check_key(key)?;
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || op(Entry::new(&service, &key)?))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let value = value.to_string();
        self.with_entry(key, move |entry| Ok(entry.set_password(&value)?))
            .await?;
        debug!(service = %self.service, key = key, "Stored keychain entry");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}
