//! Durable key/value storage for the session.
//!
//! This module provides:
//! - `KeyValueStore`: the async get/set/remove contract the session relies on
//! - `FileStore`: one file per key in a data directory
//! - `KeyringStore`: OS-level credential storage via keyring
//! - `MemoryStore`: process-local storage for tests and throwaway sessions
//!
//! Each operation is atomic on its own; there are no multi-key transactions.

pub mod file;
pub mod keychain;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use self::file::FileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Key holding the serialized user record
pub const USER_KEY: &str = "user";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a key that does not exist is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Keys become file names and keychain accounts, so keep them simple.
pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key() {
        assert!(check_key(TOKEN_KEY).is_ok());
        assert!(check_key(USER_KEY).is_ok());
        assert!(check_key("last-sync_2").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("../token").is_err());
        assert!(check_key("a b").is_err());
    }
}
