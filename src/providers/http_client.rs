use crate::core::session::Session;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub const JSON: &str = "application/json";
pub const JSON_LD: &str = "application/ld+json";
pub const MERGE_PATCH: &str = "application/merge-patch+json";

const SESSION_EXPIRED_MESSAGE: &str = "Authentication expired. Please login again.";

#[derive(Debug, Error)]
pub enum HttpError {
    /// Non-2xx answer from the API. `errors` carries Hydra `violations`.
    #[error("{message}")]
    Status {
        message: String,
        status_code: u16,
        errors: Option<Value>,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl HttpError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HttpError::Status { status_code, .. } => Some(*status_code),
            HttpError::Transport(e) => e.status().map(|s| s.as_u16()),
            HttpError::Decode(_) => None,
        }
    }

    pub fn errors(&self) -> Option<&Value> {
        match self {
            HttpError::Status { errors, .. } => errors.as_ref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }
}

/// Response body: parsed JSON for JSON/JSON-LD content, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            Body::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            Body::Json(value) => value,
            Body::Text(text) => Value::String(text),
        }
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub data: Body,
    pub headers: HeaderMap,
    pub status: u16,
}

#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Method,
    /// Applied over the default `Accept`/`Content-Type` headers.
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestInit {
    pub fn new(method: Method) -> Self {
        RequestInit {
            method,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    content_type.contains(JSON) || content_type.contains(JSON_LD)
}

fn parse_body(content_type: &str, text: String) -> Result<Body, HttpError> {
    if is_json_content_type(content_type) && !text.is_empty() {
        Ok(Body::Json(serde_json::from_str(&text)?))
    } else {
        Ok(Body::Text(text))
    }
}

/// A non-empty string field of a Hydra error document.
fn problem_field(data: &Body, name: &str) -> Option<String> {
    data.as_json()?
        .get(name)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn violations(data: &Body) -> Option<Value> {
    data.as_json()?.get("violations").cloned()
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// First non-empty of `description`, `detail`, `title`, then the status text.
pub fn error_message(data: &Body, status_text: &str) -> String {
    ["description", "detail", "title"]
        .iter()
        .find_map(|field| problem_field(data, field))
        .unwrap_or_else(|| status_text.to_string())
}

/// Authenticated JSON-LD client for the Hydra API.
pub struct HttpClient {
    base_url: String,
    client: reqwest::Client,
    session: Arc<Session>,
}

impl HttpClient {
    pub fn new(base_url: &str, session: Arc<Session>) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Maps a `Location` header back to a path under the API base.
    pub fn resolve_location(&self, location: &str) -> String {
        if let Some(rest) = location.strip_prefix(&self.base_url) {
            return rest.to_string();
        }
        let base_path = url::Url::parse(&self.base_url)
            .map(|u| u.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        match location.strip_prefix(&base_path) {
            Some(rest) if !base_path.is_empty() && rest.starts_with('/') => rest.to_string(),
            _ => location.to_string(),
        }
    }

    fn headers_for(&self, init: &RequestInit) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::from([
            ("accept".to_string(), JSON_LD.to_string()),
            ("content-type".to_string(), JSON.to_string()),
        ]);
        for (name, value) in &init.headers {
            headers.insert(name.to_lowercase(), value.clone());
        }
        if let Some(token) = self.session.token() {
            headers.insert("authorization".to_string(), format!("Bearer {token}"));
        }
        headers
    }

    #[instrument(
        name = "HydraRequest",
        skip(self, init),
        fields(method = %init.method, path = %path)
    )]
    pub async fn request(&self, path: &str, init: RequestInit) -> Result<HttpResponse, HttpError> {
        let url = self.url_for(path);
        debug!("Requesting {}", url);

        let mut builder = self.client.request(init.method.clone(), &url);
        for (name, value) in self.headers_for(&init) {
            builder = builder.header(name, value);
        }
        if let Some(body) = &init.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response.text().await?;
        debug!(status = status.as_u16(), "Received response");

        let data = parse_body(&content_type, text)?;

        if !status.is_success() {
            return Err(self.status_error(status, &data));
        }

        Ok(HttpResponse {
            data,
            headers,
            status: status.as_u16(),
        })
    }

    fn status_error(&self, status: StatusCode, data: &Body) -> HttpError {
        if status == StatusCode::UNAUTHORIZED {
            let redirect = self.session.expire();
            warn!(redirect_to = redirect, "Session rejected by API");
            return HttpError::Status {
                message: SESSION_EXPIRED_MESSAGE.to_string(),
                status_code: status.as_u16(),
                errors: violations(data),
            };
        }

        HttpError::Status {
            message: error_message(data, &status_text(status)),
            status_code: status.as_u16(),
            errors: violations(data),
        }
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, HttpError> {
        self.request(path, RequestInit::new(Method::GET)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Value,
        content_type: &str,
    ) -> Result<HttpResponse, HttpError> {
        let init = RequestInit::new(Method::POST)
            .header("Content-Type", content_type)
            .json(body);
        self.request(path, init).await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: Value,
        content_type: &str,
    ) -> Result<HttpResponse, HttpError> {
        let init = RequestInit::new(Method::PATCH)
            .header("Content-Type", content_type)
            .json(body);
        self.request(path, init).await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse, HttpError> {
        self.request(path, RequestInit::new(Method::DELETE)).await
    }
}
