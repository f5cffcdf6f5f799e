//! REST API client module for the FitPro backend.
//!
//! This module provides the `ApiClient` for logging in, managing the
//! profile and reading/writing body stats and workouts.
//!
//! The API uses JWT bearer token authentication obtained from the
//! `/auth/login` and `/auth/signup` endpoints.

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiEvent, AuthResponse, ExpiryHook};
pub use error::ApiError;
