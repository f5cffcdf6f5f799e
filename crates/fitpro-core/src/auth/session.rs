use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, AuthResponse, ExpiryHook};
use crate::models::{Profile, User};
use crate::storage::{KeyValueStore, StorageError, TOKEN_KEY, USER_KEY};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Session changed while the request was in flight")]
    SessionChanged,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to serialize user record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A bearer token together with the identity it belongs to.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    fn from_auth(auth: AuthResponse, email: &str) -> Self {
        Self {
            token: auth.token,
            user: User {
                id: auth.id,
                email: auth.email.unwrap_or_else(|| email.to_string()),
                username: auth.username,
                profile: auth.profile,
            },
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Session validity as seen by the rest of the app
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Saved session not read yet
    Unknown,
    Unauthenticated,
    Authenticated(User),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Entry point a UI should mount for this state
    pub fn route(&self) -> Route {
        match self {
            SessionState::Unknown => Route::Splash,
            SessionState::Unauthenticated => Route::Welcome,
            SessionState::Authenticated(user) if user.has_profile() => Route::Home,
            SessionState::Authenticated(_) => Route::ProfileSetup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Splash,
    Welcome,
    ProfileSetup,
    Home,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Splash => write!(f, "Splash"),
            Route::Welcome => write!(f, "Welcome"),
            Route::ProfileSetup => write!(f, "Profile Setup"),
            Route::Home => write!(f, "Home"),
        }
    }
}

/// Single source of truth for who is logged in.
///
/// The token and user record are written to storage before the new state is
/// published, and the API client is armed with the token of the active
/// session. Mutations are serialized, so a caller awaiting an operation sees
/// either the whole new session or the old one.
///
/// The store is the client's expiry hook: a 401 on an authenticated request
/// clears memory and storage before the request returns its error.
pub struct SessionStore {
    api: Arc<ApiClient>,
    storage: Arc<dyn KeyValueStore>,
    session: Mutex<Option<Session>>,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    /// Create a store and register it as the client's expiry hook. The state
    /// starts as `Unknown` until `restore()` runs.
    pub fn new(api: Arc<ApiClient>, storage: Arc<dyn KeyValueStore>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Unknown);
        let store = Arc::new(Self {
            api,
            storage,
            session: Mutex::new(None),
            state,
        });

        let hook: Weak<Self> = Arc::downgrade(&store);
        store.api.set_expiry_hook(hook);
        store
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state transitions, e.g. to switch screens
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.session.lock().await.as_ref().map(|s| s.user.clone())
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    // ===== Lifecycle =====

    /// Adopt the saved session, if there is a complete and readable one.
    /// Never fails: anything unusable is logged, discarded and reported as
    /// `Unauthenticated`.
    pub async fn restore(&self) -> SessionState {
        let mut slot = self.session.lock().await;

        let loaded = match self.load_persisted().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable saved session");
                self.discard_persisted().await;
                None
            }
        };

        match loaded {
            Some(session) => {
                info!(
                    username = %session.user.username,
                    has_profile = session.user.has_profile(),
                    "Restored session"
                );
                self.api.arm(session.token.clone()).await;
                let user = session.user.clone();
                *slot = Some(session);
                self.publish(SessionState::Authenticated(user));
            }
            None => {
                debug!("No saved session");
                self.api.disarm().await;
                *slot = None;
                self.publish(SessionState::Unauthenticated);
            }
        }

        self.state()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let mut slot = self.session.lock().await;
        let auth = self.api.login(email, password).await?;
        self.install(&mut slot, Session::from_auth(auth, email)).await
    }

    /// Create an account and log into it. The new session has no profile.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<User, SessionError> {
        let mut slot = self.session.lock().await;
        let auth = self.api.signup(email, password, username).await?;
        let mut session = Session::from_auth(auth, email);
        session.user.profile = None;
        self.install(&mut slot, session).await
    }

    /// Replace the profile of the logged-in user, keeping everything else.
    ///
    /// The lock is not held during the request, so a 401 can end the session
    /// before the error comes back. The result is only applied if the same
    /// session is still active afterwards.
    pub async fn update_profile(&self, profile: &Profile) -> Result<Profile, SessionError> {
        let token = self
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(SessionError::NotAuthenticated)?;

        let saved = self.api.update_profile(profile).await?;

        let mut slot = self.session.lock().await;
        let current = match slot.as_ref() {
            Some(current) if current.token == token => current,
            Some(_) => return Err(SessionError::SessionChanged),
            None => return Err(SessionError::NotAuthenticated),
        };

        let mut next = current.clone();
        next.user.profile = Some(saved.clone());
        let user_record = serde_json::to_string(&next.user)?;
        self.storage.set(USER_KEY, &user_record).await?;

        let user = next.user.clone();
        *slot = Some(next);
        self.publish(SessionState::Authenticated(user));
        info!("Profile updated");
        Ok(saved)
    }

    /// Forget the session. Safe to call when already logged out.
    ///
    /// Memory and the API client are cleared even if storage fails; the
    /// storage error is still returned.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let mut slot = self.session.lock().await;
        let erased = self.erase_persisted().await;
        self.api.disarm().await;
        if slot.take().is_some() {
            info!("Logged out");
        }
        self.publish(SessionState::Unauthenticated);
        erased.map_err(SessionError::from)
    }

    /// Reaction to a 401 for `token`. Ignored unless `token` is still the
    /// active session, so a late rejection never signs out a newer login.
    async fn expire(&self, token: &str) {
        let mut slot = self.session.lock().await;
        match slot.as_ref() {
            Some(current) if current.token == token => {}
            _ => {
                debug!("Ignoring expiry for a session that is no longer active");
                return;
            }
        }

        if let Err(e) = self.erase_persisted().await {
            warn!(error = %e, "Failed to clear saved session after expiry");
        }
        *slot = None;
        self.publish(SessionState::Unauthenticated);
        info!("Session expired, signed out");
    }

    // ===== Persistence =====

    async fn install(
        &self,
        slot: &mut Option<Session>,
        next: Session,
    ) -> Result<User, SessionError> {
        if let Err(e) = self.persist(&next).await {
            warn!(error = %e, "Failed to save session, restoring previous one");
            self.roll_back(slot.as_ref()).await;
            return Err(e);
        }

        info!(username = %next.user.username, has_profile = next.user.has_profile(), "Session started");
        self.api.arm(next.token.clone()).await;
        let user = next.user.clone();
        *slot = Some(next);
        self.publish(SessionState::Authenticated(user.clone()));
        Ok(user)
    }

    async fn persist(&self, session: &Session) -> Result<(), SessionError> {
        let user_record = serde_json::to_string(&session.user)?;
        self.storage.set(TOKEN_KEY, &session.token).await?;
        self.storage.set(USER_KEY, &user_record).await?;
        Ok(())
    }

    async fn roll_back(&self, previous: Option<&Session>) {
        let result = match previous {
            Some(session) => self.persist(session).await,
            None => self.erase_persisted().await.map_err(SessionError::from),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to restore previous saved session");
        }
    }

    async fn load_persisted(&self) -> Result<Option<Session>, SessionError> {
        let token = self.storage.get(TOKEN_KEY).await?;
        let user = self.storage.get(USER_KEY).await?;

        match (token, user) {
            (Some(token), Some(user)) if !token.trim().is_empty() => {
                let user: User = serde_json::from_str(&user)?;
                Ok(Some(Session { token, user }))
            }
            (None, None) => Ok(None),
            _ => {
                warn!("Saved session is incomplete, discarding");
                self.discard_persisted().await;
                Ok(None)
            }
        }
    }

    async fn erase_persisted(&self) -> Result<(), StorageError> {
        let token = self.storage.remove(TOKEN_KEY).await;
        let user = self.storage.remove(USER_KEY).await;
        token.and(user)
    }

    async fn discard_persisted(&self) {
        if let Err(e) = self.erase_persisted().await {
            warn!(error = %e, "Failed to discard saved session");
        }
    }
}

#[async_trait]
impl ExpiryHook for SessionStore {
    async fn session_expired(&self, token: &str) {
        self.expire(token).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FitnessGoal, FitnessLevel, Gender};

    fn user(profile: Option<Profile>) -> User {
        User {
            id: None,
            email: "a@b.com".to_string(),
            username: "abc".to_string(),
            profile,
        }
    }

    fn profile() -> Profile {
        Profile {
            age: "30".to_string(),
            weight: "70".to_string(),
            height: "170".to_string(),
            gender: Gender::Male,
            fitness_level: FitnessLevel::Beginner,
            fitness_goals: FitnessGoal::Strength,
        }
    }

    #[test]
    fn test_route_for_state() {
        assert_eq!(SessionState::Unknown.route(), Route::Splash);
        assert_eq!(SessionState::Unauthenticated.route(), Route::Welcome);
        assert_eq!(
            SessionState::Authenticated(user(None)).route(),
            Route::ProfileSetup
        );
        assert_eq!(
            SessionState::Authenticated(user(Some(profile()))).route(),
            Route::Home
        );
    }

    #[test]
    fn test_session_from_auth_falls_back_to_login_email() {
        let auth: AuthResponse =
            serde_json::from_str(r#"{"token":"T1","username":"abc"}"#).expect("parse");
        let session = Session::from_auth(auth, "a@b.com");
        assert_eq!(session.token, "T1");
        assert_eq!(session.user, user(None));
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session {
            token: "very-secret".to_string(),
            user: user(None),
        };
        let printed = format!("{:?}", session);
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("abc"));
    }
}
