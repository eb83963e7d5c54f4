use apibridge_storage::StorageError;

use crate::credential::Provider;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failure taxonomy for the mediation layer. Outbound-call failures are
/// always surfaced to the caller; the only suppression point in the whole
/// layer is the call recorder.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no active {0} credential")]
    NoActiveCredential(Provider),
    #[error("credential {0} not found or disabled")]
    CredentialNotFound(i64),
    #[error("token exchange rejected: {body}")]
    Authentication { body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream rejected with status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("invalid credential secret: {0}")]
    InvalidSecret(&'static str),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("serde json error: {0}")]
    Serde(#[from] serde_json::Error),
}
