use apibridge_storage::BridgeStorage;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::credential::{CredentialHandle, CredentialSecret};
use crate::error::{BridgeError, BridgeResult};

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens are treated as expired this many seconds early, so a caller
/// never receives one that lapses mid-flight.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Returns a bearer token for a Graph credential, exchanging client
/// credentials when the cached one is absent or past its margin-adjusted
/// expiry. Runs inline before every Graph call; a successful exchange is
/// persisted back onto the credential row (last writer wins under
/// concurrent refreshes), a rejected one mutates nothing.
pub async fn ensure_access_token(
    storage: &BridgeStorage,
    client: &wreq::Client,
    credential: &mut CredentialHandle,
) -> BridgeResult<String> {
    let (client_id, client_secret, tenant_id, cached_token, expires_at) = match &credential.secret {
        CredentialSecret::Graph {
            client_id,
            client_secret,
            tenant_id,
            access_token,
            expires_at,
        } => (
            client_id.clone(),
            client_secret.clone(),
            tenant_id.clone(),
            access_token.clone(),
            *expires_at,
        ),
        _ => return Err(BridgeError::InvalidSecret("graph credential required")),
    };

    let now = OffsetDateTime::now_utc().unix_timestamp();
    if let (Some(token), Some(expiry)) = (cached_token, expires_at)
        && expiry > now
    {
        return Ok(token);
    }

    let settings = credential.graph_settings();
    let token_url = format!(
        "{}/{}/oauth2/v2.0/token",
        settings.authority().trim_end_matches('/'),
        tenant_id
    );
    let form = [
        ("client_id", client_id.as_str()),
        ("client_secret", client_secret.as_str()),
        ("scope", GRAPH_SCOPE),
        ("grant_type", "client_credentials"),
    ];
    let response = client
        .post(&token_url)
        .form(&form)
        .send()
        .await
        .map_err(|err| BridgeError::Transport(err.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| BridgeError::Transport(err.to_string()))?;
    if status.as_u16() != 200 {
        return Err(BridgeError::Authentication { body });
    }
    let tokens: TokenResponse = serde_json::from_str(&body)
        .map_err(|err| BridgeError::Transport(format!("token response decode failed: {err}")))?;

    let expires_at = now + tokens.expires_in - TOKEN_EXPIRY_MARGIN_SECS;
    credential.secret = CredentialSecret::Graph {
        client_id,
        client_secret,
        tenant_id,
        access_token: Some(tokens.access_token.clone()),
        expires_at: Some(expires_at),
    };
    let secret_json = serde_json::to_value(&credential.secret)?;
    storage
        .update_credential_secret(credential.id, secret_json)
        .await?;
    debug!(credential_id = credential.id, expires_at, "bearer token refreshed");
    Ok(tokens.access_token)
}
