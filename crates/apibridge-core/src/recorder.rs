use std::sync::atomic::{AtomicU64, Ordering};

use apibridge_storage::{BridgeStorage, CallLogInput};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::credential::Provider;

/// Stored response bodies are capped at this many characters.
pub const RESPONSE_BODY_LIMIT: usize = 5000;

/// What captured headers carry instead of secret material.
pub const REDACTED_PLACEHOLDER: &str = "***";

static DROPPED_LOGS: AtomicU64 = AtomicU64::new(0);

/// Attempts whose log row could not be persisted. Persistence failures are
/// swallowed so a logging-storage outage is never mistaken for an API
/// outage, but they are counted rather than vanishing entirely.
pub fn dropped_logs() -> u64 {
    DROPPED_LOGS.load(Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Failed,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Failed => "failed",
            CallStatus::Error => "error",
        }
    }
}

/// The logical row whose usage counters an attempt should bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Endpoint(i64),
    App(i64),
}

#[derive(Debug, Clone)]
pub struct CallAttempt {
    pub provider: Provider,
    pub credential_id: Option<i64>,
    pub target: Option<LogTarget>,
    pub action: String,
    pub method: String,
    pub url: String,
    pub request_body: Option<String>,
    pub request_headers: Option<JsonValue>,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub response_time: Option<f64>,
    pub status: CallStatus,
    pub error_message: Option<String>,
    pub acting_user: Option<String>,
}

/// Character-bounded copy of a response body for storage.
pub fn truncate_body(text: &str) -> String {
    match text.char_indices().nth(RESPONSE_BODY_LIMIT) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Persists one attempt and bumps its target's counters. Never raises:
/// whatever the outbound call produced is what the caller must see, so
/// both the insert and the counter update swallow their own failures.
pub async fn record(storage: &BridgeStorage, attempt: CallAttempt) {
    let (endpoint_id, app_id) = match attempt.target {
        Some(LogTarget::Endpoint(id)) => (Some(id), None),
        Some(LogTarget::App(id)) => (None, Some(id)),
        None => (None, None),
    };

    let input = CallLogInput {
        provider: attempt.provider.as_str().to_string(),
        credential_id: attempt.credential_id,
        endpoint_id,
        app_id,
        action: attempt.action,
        request_method: attempt.method,
        request_url: attempt.url,
        request_body: attempt.request_body,
        request_headers: attempt.request_headers,
        status_code: attempt.status_code,
        response_body: attempt.response_body.map(|body| truncate_body(&body)),
        response_time: attempt.response_time,
        status: attempt.status.as_str().to_string(),
        error_message: attempt.error_message,
        acting_user: attempt.acting_user,
    };
    if let Err(err) = storage.insert_call_log(input).await {
        DROPPED_LOGS.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, "call log insert failed");
    }

    if let Some(target) = attempt.target {
        let result = match target {
            LogTarget::Endpoint(id) => storage.touch_endpoint(id).await,
            LogTarget::App(id) => storage.touch_app(id).await,
        };
        if let Err(err) = result {
            warn!(error = %err, "usage counter update failed");
        }
    }
}
