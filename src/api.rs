//! Backend API client.
//!
//! The backend is an opaque JSON-over-HTTP contract under `/api/*`. Every
//! call resolves to an [`ApiOutcome`]; nothing here returns an error or
//! panics past the call site. Non-2xx responses carry `{"error": "..."}`,
//! which becomes the user-facing message (or a generic fallback).

use crate::config::ApiConfig;
use crate::host::{Notice, PageHost};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Shown when the server gives no usable error message.
pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

/// Shown when the request never completed.
pub const NETWORK_ERROR: &str = "Network error. Please check your connection and try again.";

/// HTTP method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Delete,
}

/// Backend endpoints the client calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Signup,
    Chat,
    FeedbackSession,
    FeedbackRating,
    FeedbackSubmit,
    /// Revoke one signed-in session by id
    RevokeSession(String),
    RevokeOtherSessions,
    CreateDeveloperKey,
    /// Revoke a developer API key by id
    RevokeDeveloperKey(String),
    ProfileLinks,
    ProfileDashboard,
    CreateCheckout,
    OpenClawGrant,
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::RevokeSession(_) | Endpoint::RevokeDeveloperKey(_) => Method::Delete,
            _ => Method::Post,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::Login => "/api/login".to_string(),
            Endpoint::Signup => "/api/signup".to_string(),
            Endpoint::Chat => "/api/chat".to_string(),
            Endpoint::FeedbackSession => "/api/feedback/session".to_string(),
            Endpoint::FeedbackRating => "/api/feedback/rating".to_string(),
            Endpoint::FeedbackSubmit => "/api/feedback/submit".to_string(),
            Endpoint::RevokeSession(id) => format!("/api/sessions/{}", id),
            Endpoint::RevokeOtherSessions => "/api/sessions/revoke-others".to_string(),
            Endpoint::CreateDeveloperKey => "/api/developer/keys".to_string(),
            Endpoint::RevokeDeveloperKey(id) => format!("/api/developer/keys/{}", id),
            Endpoint::ProfileLinks => "/api/profile/links".to_string(),
            Endpoint::ProfileDashboard => "/api/profile/dashboard".to_string(),
            Endpoint::CreateCheckout => "/api/create-checkout".to_string(),
            Endpoint::OpenClawGrant => "/api/openclaw/grant".to_string(),
        }
    }
}

/// Result of a backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// 2xx with the parsed body (`Null` when empty or not JSON)
    Success(Value),
    /// Non-2xx. `message` is the server's `error` field or the fallback.
    Rejected { status: u16, message: String },
    /// The request did not complete.
    Transport { message: String },
}

impl ApiOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success(_))
    }

    /// Message to show the user on failure.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            ApiOutcome::Success(_) => None,
            ApiOutcome::Rejected { message, .. } => Some(message),
            ApiOutcome::Transport { .. } => Some(NETWORK_ERROR),
        }
    }

    /// Show the failure message, if any, through the host.
    pub fn notify_failure(&self, host: &dyn PageHost) {
        if let Some(message) = self.user_message() {
            host.notify(Notice::error(message));
        }
    }
}

/// Classify a completed HTTP response.
pub fn outcome_from_response(status: u16, body: &str) -> ApiOutcome {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if (200..300).contains(&status) {
        if parsed.is_none() && !body.trim().is_empty() {
            warn!("Response body is not JSON ({} bytes)", body.len());
        }
        return ApiOutcome::Success(parsed.unwrap_or(Value::Null));
    }

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(GENERIC_ERROR)
        .to_string();

    ApiOutcome::Rejected { status, message }
}

/// Blocking JSON client for the backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Cannot build configured HTTP client, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Send `body` to `endpoint`.
    pub fn call(&self, endpoint: &Endpoint, body: &Value) -> ApiOutcome {
        let url = self.url(endpoint);
        let request = match endpoint.method() {
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };

        debug!("{:?} {}", endpoint.method(), url);
        let response = match request.json(body).send() {
            Ok(response) => response,
            Err(e) => {
                error!("Request to {} failed: {}", url, e);
                return ApiOutcome::Transport {
                    message: e.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        let text = match response.text() {
            Ok(text) => text,
            Err(e) => {
                error!("Cannot read response from {}: {}", url, e);
                return ApiOutcome::Transport {
                    message: e.to_string(),
                };
            }
        };

        let outcome = outcome_from_response(status, &text);
        if let ApiOutcome::Rejected { status, message } = &outcome {
            warn!("{} returned {}: {}", url, status, message);
        }
        outcome
    }

    /// Ask for confirmation, then call. `None` when the user declined.
    pub fn call_confirmed(
        &self,
        host: &dyn PageHost,
        prompt: &str,
        endpoint: &Endpoint,
        body: &Value,
    ) -> Option<ApiOutcome> {
        if !host.confirm(prompt) {
            return None;
        }
        let outcome = self.call(endpoint, body);
        outcome.notify_failure(host);
        Some(outcome)
    }

    /// Sign out every other session of the current user.
    pub fn revoke_other_sessions(&self, host: &dyn PageHost) -> Option<ApiOutcome> {
        self.call_confirmed(
            host,
            "Sign out of all other devices?",
            &Endpoint::RevokeOtherSessions,
            &Value::Object(Default::default()),
        )
    }
}
