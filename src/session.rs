//! Session summary - what happened during one visit.
//!
//! A tracker is created when the page loads, records queries, resolutions
//! and generic events, and sends the summary once at teardown. Delivery is
//! fire-and-forget: no acknowledgement, no retry, nothing kept locally.

use crate::api::{ApiClient, Endpoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// A search or question the user issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

/// An answer the user accepted for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub query: String,
    pub resolution: String,
    pub timestamp: DateTime<Utc>,
}

/// A generic tagged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// Summary of one visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub queries: Vec<QueryRecord>,
    pub resolutions: Vec<ResolutionRecord>,
    pub events: Vec<EventRecord>,
}

impl SessionSummary {
    /// Visit length in seconds, once ended.
    pub fn duration_secs(&self) -> Option<i64> {
        self.ended_at.map(|end| (end - self.started_at).num_seconds())
    }
}

/// Best-effort, unacknowledged delivery (the browser's `sendBeacon`).
pub trait Beacon {
    fn send(&self, summary: &SessionSummary);
}

/// Posts the summary to the feedback endpoint from a detached thread.
///
/// Delivery is best effort: `send` returns immediately, and a process that
/// exits right after may end before the request goes out.
pub struct HttpBeacon {
    client: ApiClient,
}

impl HttpBeacon {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl Beacon for HttpBeacon {
    fn send(&self, summary: &SessionSummary) {
        let body = match serde_json::to_value(summary) {
            Ok(body) => body,
            Err(e) => {
                warn!("Cannot serialize session summary: {}", e);
                return;
            }
        };

        let client = self.client.clone();
        std::thread::spawn(move || {
            let outcome = client.call(&Endpoint::FeedbackSession, &body);
            debug!("Session beacon delivered: {}", outcome.is_success());
        });
    }
}

/// Records one visit and sends it at most once.
#[derive(Debug)]
pub struct SessionTracker {
    summary: SessionSummary,
    sent: bool,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionTracker {
    /// Start a new visit with a fresh id.
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            summary: SessionSummary {
                session_id: Uuid::new_v4().to_string(),
                user_id,
                started_at: Utc::now(),
                ended_at: None,
                queries: Vec::new(),
                resolutions: Vec::new(),
                events: Vec::new(),
            },
            sent: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.summary.session_id
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Attach the user once they sign in mid-visit.
    pub fn set_user(&mut self, user_id: impl Into<String>) {
        self.summary.user_id = Some(user_id.into());
    }

    pub fn record_query(&mut self, query: impl Into<String>) {
        self.summary.queries.push(QueryRecord {
            query: query.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_resolution(&mut self, query: impl Into<String>, resolution: impl Into<String>) {
        self.summary.resolutions.push(ResolutionRecord {
            query: query.into(),
            resolution: resolution.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_event(&mut self, event_type: impl Into<String>, payload: Value) {
        self.summary.events.push(EventRecord {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        });
    }

    /// Send the summary. Returns false if it was already sent.
    pub fn flush(&mut self, beacon: &dyn Beacon) -> bool {
        if self.sent {
            return false;
        }
        self.summary.ended_at = Some(Utc::now());
        beacon.send(&self.summary);
        self.sent = true;
        true
    }
}
