use std::fmt;

use apibridge_storage::entities;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

pub const GRAPH_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const GRAPH_RESOURCE_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const KINTONE_DOMAIN: &str = "cybozu.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Graph,
    Kintone,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Graph => "graph",
            Provider::Kintone => "kintone",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "graph" => Some(Provider::Graph),
            "kintone" => Some(Provider::Kintone),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret material, discriminated by an explicit tag so that invalid
/// field combinations are unrepresentable. For Graph the cached bearer
/// token and its expiry (unix seconds) ride along and are rewritten by
/// the token manager as a side effect of normal use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialSecret {
    Graph {
        client_id: String,
        client_secret: String,
        tenant_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<i64>,
    },
    KintoneApiToken {
        api_token: String,
    },
    KintonePassword {
        username: String,
        password: String,
    },
}

impl CredentialSecret {
    pub fn provider(&self) -> Provider {
        match self {
            CredentialSecret::Graph { .. } => Provider::Graph,
            CredentialSecret::KintoneApiToken { .. } | CredentialSecret::KintonePassword { .. } => {
                Provider::Kintone
            }
        }
    }
}

/// Graph connection settings; both fields default to the public cloud.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_base: Option<String>,
}

impl GraphSettings {
    pub fn authority(&self) -> &str {
        self.authority.as_deref().unwrap_or(GRAPH_AUTHORITY)
    }

    pub fn resource_base(&self) -> &str {
        self.resource_base.as_deref().unwrap_or(GRAPH_RESOURCE_BASE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KintoneSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    /// Explicit origin override; takes precedence over the subdomain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub use_guest_space: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_space_id: Option<String>,
}

impl KintoneSettings {
    pub fn origin(&self) -> Option<String> {
        if let Some(base) = &self.base_url {
            return Some(base.trim_end_matches('/').to_string());
        }
        self.subdomain
            .as_ref()
            .map(|subdomain| format!("https://{subdomain}.{KINTONE_DOMAIN}"))
    }
}

/// A resolved credential, detached from the storage row. Façades hold one
/// handle for their whole lifetime instead of re-resolving per call.
#[derive(Debug, Clone)]
pub struct CredentialHandle {
    pub id: i64,
    pub provider: Provider,
    pub name: Option<String>,
    pub secret: CredentialSecret,
    pub settings: serde_json::Value,
}

impl CredentialHandle {
    pub fn from_model(model: entities::credentials::Model) -> BridgeResult<Self> {
        let Some(provider) = Provider::parse(&model.provider) else {
            return Err(BridgeError::InvalidSecret("unknown provider"));
        };
        let secret: CredentialSecret = serde_json::from_value(model.secret)?;
        if secret.provider() != provider {
            return Err(BridgeError::InvalidSecret(
                "secret kind does not match the credential provider",
            ));
        }
        Ok(Self {
            id: model.id,
            provider,
            name: model.name,
            secret,
            settings: model.settings.unwrap_or(serde_json::Value::Null),
        })
    }

    pub fn graph_settings(&self) -> GraphSettings {
        serde_json::from_value(self.settings.clone()).unwrap_or_default()
    }

    pub fn kintone_settings(&self) -> KintoneSettings {
        serde_json::from_value(self.settings.clone()).unwrap_or_default()
    }
}
