use crate::core::session::{AuthState, LOGIN_ROUTE, Session, UserInfo};
use crate::providers::http_client::HttpError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// How long `check` waits for a concurrent login: 50 polls, 100 ms apart.
const LOGIN_WAIT_ATTEMPTS: u32 = 50;
const LOGIN_WAIT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("No token received from server")]
    NoToken,
    #[error("Invalid token received")]
    InvalidToken,
    #[error("Token is already expired")]
    TokenExpired,
    #[error("Failed to store token")]
    Storage,
    #[error("Network error. Please try again.")]
    Network,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Authenticated,
    Unauthenticated { redirect_to: &'static str },
    SessionExpired { redirect_to: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: Value,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorAction {
    Logout { redirect_to: &'static str },
    Propagate,
}

/// Decodes the payload segment of a JWT without verifying the signature.
pub fn decode_jwt(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| debug!(error = %e, "Failed to decode JWT payload"))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn is_expired(claims: &Value, now: i64) -> bool {
    claims
        .get("exp")
        .and_then(Value::as_f64)
        .is_some_and(|exp| exp < now as f64)
}

fn truthy(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    })
}

/// Capitalized local part of an email: `"jane@example.com"` gives `"Jane"`.
pub fn first_name(email: &str) -> String {
    match email.split_once('@') {
        Some((local, _)) => {
            let mut chars = local.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        None => email.to_string(),
    }
}

fn user_info_from_claims(claims: &Value, username: &str) -> UserInfo {
    let id = truthy(claims.get("sub"))
        .or_else(|| truthy(claims.get("user_id")))
        .cloned()
        .unwrap_or(json!(1));
    let email = truthy(claims.get("email"))
        .or_else(|| truthy(claims.get("username")))
        .and_then(Value::as_str)
        .unwrap_or(username)
        .to_string();
    let roles = claims
        .get("roles")
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    UserInfo {
        id,
        name: first_name(&email),
        email: Some(email),
        roles,
    }
}

fn jwt_roles(token: &str) -> Vec<String> {
    decode_jwt(token)
        .map(|claims| user_info_from_claims(&claims, "").roles)
        .unwrap_or_default()
}

pub struct AuthProvider {
    auth_url: String,
    client: reqwest::Client,
    session: Arc<Session>,
}

impl AuthProvider {
    pub fn new(auth_url: &str, session: Arc<Session>) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(AuthProvider {
            auth_url: auth_url.trim_end_matches('/').to_string(),
            client,
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    #[instrument(name = "Login", skip(self, password), fields(username = %username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<UserInfo, AuthError> {
        self.session.begin_login();
        let result = self.try_login(username, password).await;
        self.session.finish_login(result.is_ok());
        match &result {
            Ok(user) => info!(user = %user.name, "Login completed"),
            Err(e) => warn!(error = %e, "Login failed"),
        }
        result
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<UserInfo, AuthError> {
        let url = format!("{}/login-proxy", self.auth_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Login request failed");
                AuthError::Network
            })?;
        debug!(status = response.status().as_u16(), "Login response received");

        if !response.status().is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = ["message", "error"]
                .iter()
                .find_map(|key| truthy(body.get(*key)).and_then(Value::as_str))
                .unwrap_or("Invalid credentials");
            return Err(AuthError::InvalidCredentials(message.to_string()));
        }

        let body: Value = response.json().await.map_err(|_| AuthError::Network)?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NoToken)?;

        let claims = decode_jwt(token).ok_or(AuthError::InvalidToken)?;
        if is_expired(&claims, Utc::now().timestamp()) {
            return Err(AuthError::TokenExpired);
        }

        let user = user_info_from_claims(&claims, username);
        self.session
            .store_credentials(token, &user)
            .map_err(|_| AuthError::Storage)?;
        if self.session.token().as_deref() != Some(token) || self.session.raw_user().is_none() {
            return Err(AuthError::Storage);
        }

        Ok(user)
    }

    pub fn logout(&self) -> &'static str {
        self.session.clear_credentials();
        self.session.set_state(AuthState::Anonymous);
        info!("Logged out");
        LOGIN_ROUTE
    }

    pub async fn check(&self) -> CheckOutcome {
        self.session
            .wait_for_login(LOGIN_WAIT_ATTEMPTS, LOGIN_WAIT_INTERVAL)
            .await;

        let Some(token) = self.session.token() else {
            return CheckOutcome::Unauthenticated {
                redirect_to: LOGIN_ROUTE,
            };
        };

        if decode_jwt(&token).is_some_and(|claims| is_expired(&claims, Utc::now().timestamp())) {
            self.session.expire();
            return CheckOutcome::SessionExpired {
                redirect_to: LOGIN_ROUTE,
            };
        }

        CheckOutcome::Authenticated
    }

    /// Roles of the stored user, falling back to the token's claims.
    pub fn get_permissions(&self) -> Vec<String> {
        let (Some(token), Some(_)) = (self.session.token(), self.session.raw_user()) else {
            return Vec::new();
        };
        match self.session.user() {
            Some(user) => user.roles,
            None => jwt_roles(&token),
        }
    }

    pub fn get_identity(&self) -> Option<Identity> {
        self.session.token()?;
        self.session.raw_user()?;
        Some(match self.session.user() {
            Some(user) => Identity {
                id: truthy(Some(&user.id)).cloned().unwrap_or(json!(1)),
                name: if user.name.is_empty() {
                    "User".to_string()
                } else {
                    user.name
                },
                email: user.email,
            },
            None => Identity {
                id: json!(1),
                name: "User".to_string(),
                email: None,
            },
        })
    }

    pub fn on_error(&self, error: &HttpError) -> ErrorAction {
        if error.is_unauthorized() {
            return ErrorAction::Logout {
                redirect_to: self.session.expire(),
            };
        }
        ErrorAction::Propagate
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::session::USER_KEY;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn make_jwt(claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    fn future_exp() -> i64 {
        Utc::now().timestamp() + 3600
    }

    async fn provider_with_login_response(
        status: u16,
        body: Value,
    ) -> (MockServer, AuthProvider) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login-proxy"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        let provider =
            AuthProvider::new(&server.uri(), Arc::new(Session::in_memory())).unwrap();
        (server, provider)
    }

    #[test]
    fn test_decode_jwt() {
        let token = make_jwt(json!({"sub": 5, "roles": ["ROLE_USER"]}));
        let claims = decode_jwt(&token).unwrap();
        assert_eq!(claims["sub"], json!(5));

        assert!(decode_jwt("not-a-token").is_none());
        assert!(decode_jwt("a.!!!.c").is_none());
    }

    #[test]
    fn test_first_name() {
        assert_eq!(first_name("jane@example.com"), "Jane");
        assert_eq!(first_name("jane"), "jane");
        assert_eq!(first_name("@example.com"), "");
    }

    #[test]
    fn test_user_info_from_claims() {
        let user = user_info_from_claims(
            &json!({"user_id": 9, "username": "bob@corp.io", "roles": ["ROLE_ADMIN", 3]}),
            "ignored",
        );
        assert_eq!(user.id, json!(9));
        assert_eq!(user.name, "Bob");
        assert_eq!(user.email.as_deref(), Some("bob@corp.io"));
        assert_eq!(user.roles, vec!["ROLE_ADMIN".to_string()]);

        let user = user_info_from_claims(&json!({}), "carol@corp.io");
        assert_eq!(user.id, json!(1));
        assert_eq!(user.name, "Carol");
        assert!(user.roles.is_empty());
    }

    #[tokio::test]
    async fn test_login_success_stores_credentials() {
        let server = MockServer::start().await;
        let token = make_jwt(json!({
            "sub": "u-1",
            "email": "alice@example.com",
            "roles": ["ROLE_INT_DEVELOPER"],
            "exp": future_exp()
        }));
        Mock::given(method("POST"))
            .and(path("/login-proxy"))
            .and(body_json(json!({"username": "alice", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": token})))
            .mount(&server)
            .await;

        let session = Arc::new(Session::in_memory());
        let provider = AuthProvider::new(&server.uri(), Arc::clone(&session)).unwrap();

        let user = provider.login("alice", "pw").await.unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.id, json!("u-1"));
        assert_eq!(session.token().as_deref(), Some(token.as_str()));
        assert_eq!(session.state(), AuthState::Authenticated);
        assert_eq!(provider.get_permissions(), vec!["ROLE_INT_DEVELOPER"]);
        assert_eq!(provider.check().await, CheckOutcome::Authenticated);
    }

    #[tokio::test]
    async fn test_login_rejected_uses_server_message() {
        let (_server, provider) =
            provider_with_login_response(401, json!({"message": "Bad password"})).await;
        let err = provider.login("alice", "wrong").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials("Bad password".to_string()));
        assert_eq!(provider.session().state(), AuthState::Anonymous);

        let (_server, provider) = provider_with_login_response(400, json!({})).await;
        let err = provider.login("alice", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_login_without_token() {
        let (_server, provider) = provider_with_login_response(200, json!({})).await;
        assert_eq!(
            provider.login("a", "b").await.unwrap_err(),
            AuthError::NoToken
        );
    }

    #[tokio::test]
    async fn test_login_with_garbage_token() {
        let (_server, provider) =
            provider_with_login_response(200, json!({"token": "garbage"})).await;
        assert_eq!(
            provider.login("a", "b").await.unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[tokio::test]
    async fn test_login_with_expired_token() {
        let token = make_jwt(json!({"exp": Utc::now().timestamp() - 10}));
        let (_server, provider) =
            provider_with_login_response(200, json!({"token": token})).await;
        assert_eq!(
            provider.login("a", "b").await.unwrap_err(),
            AuthError::TokenExpired
        );
        assert!(provider.session().token().is_none());
    }

    #[tokio::test]
    async fn test_login_network_error() {
        let provider =
            AuthProvider::new("http://127.0.0.1:9", Arc::new(Session::in_memory())).unwrap();
        assert_eq!(
            provider.login("a", "b").await.unwrap_err(),
            AuthError::Network
        );
        assert_eq!(provider.session().state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_check_without_token() {
        let provider =
            AuthProvider::new("http://localhost", Arc::new(Session::in_memory())).unwrap();
        assert_eq!(
            provider.check().await,
            CheckOutcome::Unauthenticated {
                redirect_to: "/login"
            }
        );
    }

    #[tokio::test]
    async fn test_check_with_expired_token_clears_session() {
        let session = Arc::new(Session::in_memory());
        let expired = make_jwt(json!({"exp": Utc::now().timestamp() - 60}));
        session.store().set(crate::core::session::TOKEN_KEY, &expired).unwrap();

        let provider = AuthProvider::new("http://localhost", Arc::clone(&session)).unwrap();
        assert_eq!(
            provider.check().await,
            CheckOutcome::SessionExpired {
                redirect_to: "/login"
            }
        );
        assert!(session.token().is_none());
    }

    #[test]
    fn test_logout_clears_credentials() {
        let session = Arc::new(Session::in_memory());
        let provider = AuthProvider::new("http://localhost", Arc::clone(&session)).unwrap();
        session
            .store_credentials("t", &user_info_from_claims(&json!({}), "x@y.z"))
            .unwrap();

        assert_eq!(provider.logout(), "/login");
        assert!(session.token().is_none());
        assert!(provider.get_identity().is_none());
    }

    #[test]
    fn test_identity_and_permissions_fallbacks() {
        let session = Arc::new(Session::in_memory());
        let provider = AuthProvider::new("http://localhost", Arc::clone(&session)).unwrap();
        assert!(provider.get_permissions().is_empty());

        let token = make_jwt(json!({"roles": ["ROLE_FROM_JWT"]}));
        session.store().set(crate::core::session::TOKEN_KEY, &token).unwrap();
        session.store().set(USER_KEY, "{broken").unwrap();

        assert_eq!(provider.get_permissions(), vec!["ROLE_FROM_JWT"]);
        assert_eq!(
            provider.get_identity(),
            Some(Identity {
                id: json!(1),
                name: "User".to_string(),
                email: None
            })
        );
    }

    #[test]
    fn test_on_error_logs_out_on_401_only() {
        let session = Arc::new(Session::in_memory());
        let provider = AuthProvider::new("http://localhost", Arc::clone(&session)).unwrap();
        session.store().set(crate::core::session::TOKEN_KEY, "t").unwrap();

        let not_found = HttpError::Status {
            message: "Not Found".to_string(),
            status_code: 404,
            errors: None,
        };
        assert_eq!(provider.on_error(&not_found), ErrorAction::Propagate);
        assert!(session.token().is_some());

        let unauthorized = HttpError::Status {
            message: "expired".to_string(),
            status_code: 401,
            errors: None,
        };
        assert_eq!(
            provider.on_error(&unauthorized),
            ErrorAction::Logout {
                redirect_to: "/login"
            }
        );
        assert!(session.token().is_none());
    }
}
