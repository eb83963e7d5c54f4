pub mod client;
pub mod credential;
pub mod error;
pub mod mediator;
pub mod recorder;
pub mod resolve;
pub mod token;

pub use client::shared_client;
pub use credential::{
    CredentialHandle, CredentialSecret, GRAPH_AUTHORITY, GRAPH_RESOURCE_BASE, GraphSettings,
    KintoneSettings, Provider,
};
pub use error::{BridgeError, BridgeResult};
pub use mediator::{
    HttpMethod, KINTONE_PASSWORD_HEADER, KINTONE_TOKEN_HEADER, Mediator, OutboundRequest,
};
pub use recorder::{
    CallAttempt, CallStatus, LogTarget, REDACTED_PLACEHOLDER, RESPONSE_BODY_LIMIT, dropped_logs,
    truncate_body,
};
pub use resolve::resolve_credential;
pub use token::{GRAPH_SCOPE, TOKEN_EXPIRY_MARGIN_SECS, ensure_access_token};
