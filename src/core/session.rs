//! Authentication state shared by the transport, auth provider and CLI.

use crate::store::{self, SessionStore};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "auth-token";
pub const USER_KEY: &str = "auth-user";
pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    LoginInProgress,
    Authenticated,
    /// The API rejected the token; the user has to log in again.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: serde_json::Value,
    pub name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

pub struct Session {
    store: Arc<dyn SessionStore>,
    state: RwLock<AuthState>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let state = match store.get(TOKEN_KEY) {
            Ok(Some(_)) => AuthState::Authenticated,
            _ => AuthState::Anonymous,
        };
        Self {
            store,
            state: RwLock::new(state),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(store::MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn state(&self) -> AuthState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_state(&self, state: AuthState) {
        debug!(?state, "Session state change");
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read session token");
                None
            }
        }
    }

    /// The stored user, or `None` when absent or not valid JSON.
    pub fn user(&self) -> Option<UserInfo> {
        let raw = self.store.get(USER_KEY).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn raw_user(&self) -> Option<String> {
        self.store.get(USER_KEY).ok().flatten()
    }

    pub fn store_credentials(&self, token: &str, user: &UserInfo) -> store::Result<()> {
        self.store.set(TOKEN_KEY, token)?;
        let user_json = serde_json::to_string(user).unwrap_or_else(|_| "{}".to_string());
        self.store.set(USER_KEY, &user_json)?;
        Ok(())
    }

    /// Removes token and user. Falls back to wiping the whole store when
    /// a targeted removal leaves something behind.
    pub fn clear_credentials(&self) {
        let removed = self.store.remove(TOKEN_KEY).and(self.store.remove(USER_KEY));
        let leftover = self.token().is_some() || self.raw_user().is_some();
        if removed.is_err() || leftover {
            warn!("Credential cleanup incomplete, clearing session store");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear session store");
            }
        }
    }

    pub fn begin_login(&self) {
        self.set_state(AuthState::LoginInProgress);
    }

    pub fn finish_login(&self, success: bool) {
        self.set_state(if success {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        });
    }

    /// Drops credentials after the API refused them and returns the route
    /// the user should be sent to.
    pub fn expire(&self) -> &'static str {
        self.clear_credentials();
        self.set_state(AuthState::Expired);
        LOGIN_ROUTE
    }

    /// Polls until no login is in progress or `max_attempts` intervals pass.
    pub async fn wait_for_login(&self, max_attempts: u32, interval: Duration) {
        let mut attempts = 0;
        while self.state() == AuthState::LoginInProgress && attempts < max_attempts {
            tokio::time::sleep(interval).await;
            attempts += 1;
        }
        if attempts > 0 {
            debug!(attempts, "Waited for login to complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserInfo {
        UserInfo {
            id: serde_json::json!(7),
            name: "Alice".to_string(),
            email: Some("alice@example.com".to_string()),
            roles: vec!["ROLE_USER".to_string()],
        }
    }

    #[test]
    fn test_new_session_is_anonymous() {
        let session = Session::in_memory();
        assert_eq!(session.state(), AuthState::Anonymous);
        assert!(session.token().is_none());
        assert!(session.user().is_none());
    }

    #[test]
    fn test_session_with_stored_token_starts_authenticated() {
        let store = Arc::new(store::MemoryStore::new());
        store.set(TOKEN_KEY, "jwt").unwrap();
        let session = Session::new(store);
        assert_eq!(session.state(), AuthState::Authenticated);
    }

    #[test]
    fn test_store_and_clear_credentials() {
        let session = Session::in_memory();
        session.store_credentials("jwt", &user()).unwrap();

        assert_eq!(session.token().as_deref(), Some("jwt"));
        assert_eq!(session.user(), Some(user()));

        session.clear_credentials();
        assert!(session.token().is_none());
        assert!(session.user().is_none());
    }

    #[test]
    fn test_expire_clears_and_returns_login_route() {
        let session = Session::in_memory();
        session.store_credentials("jwt", &user()).unwrap();
        session.set_state(AuthState::Authenticated);

        assert_eq!(session.expire(), "/login");
        assert_eq!(session.state(), AuthState::Expired);
        assert!(session.token().is_none());
    }

    #[test]
    fn test_user_with_invalid_json_is_none() {
        let session = Session::in_memory();
        session.store().set(USER_KEY, "not json").unwrap();
        assert!(session.user().is_none());
        assert_eq!(session.raw_user().as_deref(), Some("not json"));
    }

    #[tokio::test]
    async fn test_wait_for_login_returns_when_login_finishes() {
        let session = Arc::new(Session::in_memory());
        session.begin_login();

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session.wait_for_login(50, Duration::from_millis(5)).await;
                session.state()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        session.finish_login(true);

        assert_eq!(waiter.await.unwrap(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_wait_for_login_gives_up_after_max_attempts() {
        let session = Session::in_memory();
        session.begin_login();
        session.wait_for_login(3, Duration::from_millis(1)).await;
        assert_eq!(session.state(), AuthState::LoginInProgress);
    }
}
