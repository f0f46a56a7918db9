//! Backend HTTP client: availability lookups and registration.

use crate::validation::FormValues;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure of a backend call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
    },
}

impl ApiError {
    /// The human-readable message the server attached to the error, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Server {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// Whether repeating the request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(e) => !e.is_decode(),
            ApiError::Server { status, .. } => *status >= 500 || *status == 429,
        }
    }

    /// Build a `Server` error from a non-success response, pulling `message`
    /// out of a JSON body when there is one.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message);
        ApiError::Server { status, message }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Which identifier an availability lookup is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityKind {
    Username,
    Email,
}

impl AvailabilityKind {
    /// Form field the lookup validates.
    pub fn field(&self) -> &'static str {
        match self {
            AvailabilityKind::Username => "username",
            AvailabilityKind::Email => "email",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            AvailabilityKind::Username => "/api/auth/check-username",
            AvailabilityKind::Email => "/api/auth/check-email",
        }
    }
}

/// Verdict returned by the availability endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Remote lookup used by availability checkers.
pub trait AvailabilityApi: Send + Sync {
    fn lookup(
        &self,
        kind: AvailabilityKind,
        value: &str,
    ) -> impl Future<Output = Result<AvailabilityResponse, ApiError>> + Send;
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Account created by a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Client for the administrative backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a new account from validated registration data.
    pub async fn register(&self, data: &FormValues) -> Result<RegisteredUser, ApiError> {
        let field = |name: &str| data.get(name).map(String::as_str).unwrap_or("");
        let request = RegisterRequest {
            username: field("username"),
            email: field("email"),
            password: field("password"),
        };

        let response = self
            .client
            .post(format!("{}/api/auth/register", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        Ok(response.json().await?)
    }
}

impl AvailabilityApi for ApiClient {
    async fn lookup(
        &self,
        kind: AvailabilityKind,
        value: &str,
    ) -> Result<AvailabilityResponse, ApiError> {
        debug!("Checking {} availability", kind.field());

        let response = self
            .client
            .get(format!("{}{}", self.base_url, kind.path()))
            .query(&[(kind.field(), value)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        Ok(response.json().await?)
    }
}
