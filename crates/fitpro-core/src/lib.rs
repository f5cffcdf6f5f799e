//! FitPro core - session, storage and API client for the FitPro backend.
//!
//! Front ends create an [`ApiClient`] and a [`KeyValueStore`], hand both to
//! [`SessionStore::new`] and call [`SessionStore::restore`] once at startup.
//! After that the store's state decides which screen to show.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError, ApiEvent, AuthResponse, ExpiryHook};
pub use auth::{Route, Session, SessionError, SessionState, SessionStore};
pub use config::{Config, StorageBackend};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StorageError};
