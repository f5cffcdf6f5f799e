//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionStore`: the single source of truth for who is logged in
//! - `SessionState` / `Route`: observable session status and the screen it implies
//! - Forms that validate credentials, profiles and measurements before they
//!   reach the API
//!
//! The token and user record are persisted together, and a 401 from the API
//! ends the session that issued the request.

pub mod forms;
pub mod session;

pub use forms::{LoginForm, MeasurementForm, ProfileForm, SignupForm};
pub use session::{Route, Session, SessionError, SessionState, SessionStore};
