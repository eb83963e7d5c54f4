use apibridge_storage::BridgeStorage;

use crate::credential::{CredentialHandle, Provider};
use crate::error::{BridgeError, BridgeResult};

/// Resolves the credential a façade will be bound to.
///
/// With an explicit id the row must exist, be enabled, and belong to the
/// requested provider; anything else is `CredentialNotFound`. Without an
/// id the newest enabled credential for the provider wins, and an empty
/// table yields `NoActiveCredential`. No side effects on any path.
pub async fn resolve_credential(
    storage: &BridgeStorage,
    provider: Provider,
    credential_id: Option<i64>,
) -> BridgeResult<CredentialHandle> {
    let model = match credential_id {
        Some(id) => match storage.find_credential(id).await? {
            Some(model) if model.enabled && model.provider == provider.as_str() => model,
            _ => return Err(BridgeError::CredentialNotFound(id)),
        },
        None => storage
            .newest_active_credential(provider.as_str())
            .await?
            .ok_or(BridgeError::NoActiveCredential(provider))?,
    };
    CredentialHandle::from_model(model)
}
