//! API client for communicating with the FitPro REST API.
//!
//! Every request goes through two hooks:
//! - the request side attaches `Authorization: Bearer <token>` to everything
//!   except the `/auth/` endpoints, whenever a token is armed;
//! - the response side turns a 401 on an authenticated request into a single
//!   `ApiEvent::SessionExpired`, disarms the token and waits for the
//!   registered `ExpiryHook` before handing the error back. A 403 has no side
//!   effects.

use std::fmt;
use std::sync::{Arc, RwLock as StdRwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;

use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{
    NewWorkout, Profile, RecordStats, UserStats, WorkoutHistory, WorkoutStats,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Requests under this prefix are sent without a bearer token.
const AUTH_PATH_PREFIX: &str = "/auth/";

pub const LOGIN_PATH: &str = "/auth/login";
pub const SIGNUP_PATH: &str = "/auth/signup";
pub const PROFILE_PATH: &str = "/api/users/profile";
pub const STATS_PATH: &str = "/api/stats";
pub const LATEST_STATS_PATH: &str = "/api/stats/latest";
pub const STATS_HISTORY_PATH: &str = "/api/stats/history";
pub const WEIGHT_PROGRESS_PATH: &str = "/api/stats/progress/weight";
pub const BODY_FAT_PROGRESS_PATH: &str = "/api/stats/progress/bodyfat";
pub const WORKOUTS_PATH: &str = "/api/workouts";
pub const WORKOUT_STATS_PATH: &str = "/api/workouts/stats";

const USER_AGENT: &str = concat!("fitpro-core/", env!("CARGO_PKG_VERSION"));

/// Buffered session events per subscriber.
const EVENT_CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// Events
// ============================================================================

/// Notifications emitted by the client for whoever tracks the session.
#[derive(Clone, PartialEq, Eq)]
pub enum ApiEvent {
    /// The server rejected `token` with a 401. Emitted once per token.
    SessionExpired { token: String },
}

impl fmt::Debug for ApiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiEvent::SessionExpired { .. } => f
                .debug_struct("SessionExpired")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Told about a 401 on a request that carried `token`. The failing request
/// does not return until the hook has finished, so whatever the hook clears is
/// gone by the time the caller sees `ApiError::Unauthorized`.
///
/// Called for every such 401, including ones for a token that was already
/// disarmed; implementations must ignore tokens they no longer hold.
#[async_trait]
pub trait ExpiryHook: Send + Sync {
    async fn session_expired(&self, token: &str);
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    email: &'a str,
    password: &'a str,
    username: &'a str,
}

#[derive(Deserialize)]
struct ProfileResponse {
    profile: Profile,
}

/// Response of `/auth/login` and `/auth/signup`.
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "crate::models::user::deserialize_optional_id")]
    pub id: Option<String>,
    /// Only present once onboarding is complete. A partially filled profile
    /// is treated as absent.
    #[serde(default, deserialize_with = "deserialize_complete_profile")]
    pub profile: Option<Profile>,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("id", &self.id)
            .field("profile", &self.profile)
            .finish()
    }
}

// The backend sends the profile as a loose map whose values are null until
// the user finishes onboarding.
fn deserialize_complete_profile<'de, D>(deserializer: D) -> Result<Option<Profile>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn is_auth_path(path: &str) -> bool {
    path.starts_with(AUTH_PATH_PREFIX)
}

// ============================================================================
// Client
// ============================================================================

/// API client for FitPro.
///
/// Holds the armed bearer token, so it is shared behind an `Arc` rather than
/// cloned. The underlying `reqwest::Client` pools connections.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
    events: broadcast::Sender<ApiEvent>,
    expiry_hook: StdRwLock<Option<Weak<dyn ExpiryHook>>>,
}

impl ApiClient {
    /// Create a client for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .build()?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
            events,
            expiry_hook: StdRwLock::new(None),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.api_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach `token` to subsequent non-auth requests
    pub async fn arm(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    /// Stop sending a bearer token
    pub async fn disarm(&self) {
        *self.token.write().await = None;
    }

    pub async fn is_armed(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Receive `SessionExpired` notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ApiEvent> {
        self.events.subscribe()
    }

    /// Register the component that owns the session. Held weakly; replaces
    /// any earlier hook.
    pub fn set_expiry_hook(&self, hook: Weak<dyn ExpiryHook>) {
        if let Ok(mut slot) = self.expiry_hook.write() {
            *slot = Some(hook);
        }
    }

    fn expiry_hook(&self) -> Option<Arc<dyn ExpiryHook>> {
        self.expiry_hook
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request side: which token, if any, goes on this request.
    async fn bearer_for(&self, path: &str) -> Option<String> {
        if is_auth_path(path) {
            None
        } else {
            self.token.read().await.clone()
        }
    }

    /// Response side of a 401. Only the first rejection of the armed token
    /// disarms it and notifies subscribers. The expiry hook runs for every
    /// authenticated 401 so that concurrent callers also return only after
    /// the session is gone.
    async fn handle_unauthorized(&self, path: &str, bearer: Option<String>) {
        if is_auth_path(path) {
            // Bad credentials, not an expired session
            return;
        }
        let Some(used) = bearer else {
            return;
        };

        let mut armed = self.token.write().await;
        let first = armed.as_deref() == Some(used.as_str());
        if first {
            *armed = None;
        }
        drop(armed);

        if first {
            warn!(path = path, "Session expired, bearer token disarmed");
            // No receivers just means nobody is tracking the session
            let _ = self.events.send(ApiEvent::SessionExpired {
                token: used.clone(),
            });
        }

        if let Some(hook) = self.expiry_hook() {
            hook.session_expired(&used).await;
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let bearer = self.bearer_for(path).await;

        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(ref token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, path = path, authenticated = bearer.is_some(), "Sending request");

        let response = request.send().await.map_err(ApiError::from_transport)?;
        let status = response.status();

        if status.is_success() {
            return response.text().await.map_err(ApiError::from_transport);
        }

        let text = response.text().await.unwrap_or_default();
        debug!(method = %method, path = path, status = status.as_u16(), "Request failed");

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(path, bearer).await;
        }
        Err(ApiError::from_status(status, &text))
    }

    fn parse<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
        serde_json::from_str(text).map_err(|e| ApiError::invalid_response(e, text))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let text = self.send::<()>(Method::GET, path, None).await?;
        Self::parse(&text)
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let text = self.send(Method::POST, path, Some(body)).await?;
        Self::parse(&text)
    }

    fn check_token(auth: AuthResponse) -> Result<AuthResponse, ApiError> {
        if auth.token.trim().is_empty() {
            return Err(ApiError::InvalidResponse {
                message: "No token in response".to_string(),
                body: String::new(),
            });
        }
        Ok(auth)
    }

    // ===== Authentication =====

    /// Exchange credentials for a token. Sent without a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let auth: AuthResponse = self
            .post(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        let auth = Self::check_token(auth)?;
        info!(username = %auth.username, has_profile = auth.profile.is_some(), "Logged in");
        Ok(auth)
    }

    /// Create an account. Sent without a bearer token.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<AuthResponse, ApiError> {
        let auth: AuthResponse = self
            .post(
                SIGNUP_PATH,
                &SignupRequest {
                    email,
                    password,
                    username,
                },
            )
            .await?;
        let auth = Self::check_token(auth)?;
        info!(username = %auth.username, "Signed up");
        Ok(auth)
    }

    // ===== Profile =====

    /// Store the profile and return the server's copy of it
    pub async fn update_profile(&self, profile: &Profile) -> Result<Profile, ApiError> {
        let response: ProfileResponse = self.post(PROFILE_PATH, profile).await?;
        Ok(response.profile)
    }

    // ===== Body Stats =====

    pub async fn record_stats(&self, stats: &RecordStats) -> Result<UserStats, ApiError> {
        self.post(STATS_PATH, stats).await
    }

    /// Most recent measurement, or `None` if nothing has been recorded yet
    pub async fn get_latest_stats(&self) -> Result<Option<UserStats>, ApiError> {
        match self.get(LATEST_STATS_PATH).await {
            Ok(stats) => Ok(Some(stats)),
            Err(ApiError::NotFound(_)) => {
                debug!("No stats recorded yet");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// All measurements, newest first as ordered by the server
    pub async fn get_stats_history(&self) -> Result<Vec<UserStats>, ApiError> {
        self.get(STATS_HISTORY_PATH).await
    }

    /// Measurements carrying a weight, in chronological order
    pub async fn get_weight_progress(&self) -> Result<Vec<UserStats>, ApiError> {
        self.get(WEIGHT_PROGRESS_PATH).await
    }

    /// Measurements carrying a body-fat percentage, in chronological order
    pub async fn get_body_fat_progress(&self) -> Result<Vec<UserStats>, ApiError> {
        self.get(BODY_FAT_PROGRESS_PATH).await
    }

    // ===== Workouts =====

    pub async fn get_workout_stats(&self) -> Result<WorkoutStats, ApiError> {
        self.get(WORKOUT_STATS_PATH).await
    }

    pub async fn get_workout_history(&self) -> Result<Vec<WorkoutHistory>, ApiError> {
        self.get(WORKOUTS_PATH).await
    }

    pub async fn save_workout(&self, workout: &NewWorkout) -> Result<WorkoutHistory, ApiError> {
        self.post(WORKOUTS_PATH, workout).await
    }
}
