use std::time::Instant;

use apibridge_storage::BridgeStorage;
use base64::Engine;
use http::header::CONTENT_TYPE;
use serde_json::{Value as JsonValue, json};

use crate::client::shared_client;
use crate::credential::{CredentialHandle, CredentialSecret, Provider};
use crate::error::{BridgeError, BridgeResult};
use crate::recorder::{self, CallAttempt, CallStatus, LogTarget, truncate_body};
use crate::resolve::resolve_credential;
use crate::token::ensure_access_token;

/// The non-standard header Kintone expects for raw API tokens.
pub const KINTONE_TOKEN_HEADER: &str = "X-Cybozu-API-Token";

/// Kintone's password authentication header. Deliberately NOT the standard
/// `Authorization: Basic` header; the upstream API requires this exact
/// name, so it must survive any cleanup.
pub const KINTONE_PASSWORD_HEADER: &str = "X-Cybozu-Authorization";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn as_method(&self) -> wreq::Method {
        match self {
            HttpMethod::Get => wreq::Method::GET,
            HttpMethod::Post => wreq::Method::POST,
            HttpMethod::Put => wreq::Method::PUT,
            HttpMethod::Patch => wreq::Method::PATCH,
            HttpMethod::Delete => wreq::Method::DELETE,
        }
    }
}

/// One outbound call as a façade describes it: a relative path plus the
/// bookkeeping the recorder needs. The body slot is always offered; no
/// method is special-cased.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub path: String,
    pub action: String,
    pub params: Vec<(String, String)>,
    pub body: Option<JsonValue>,
    pub log_target: Option<LogTarget>,
    pub acting_user: Option<String>,
    /// Kintone guest-space override; wins over the credential settings.
    pub guest_space: Option<String>,
}

impl OutboundRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            action: "other".to_string(),
            params: Vec::new(),
            body: None,
            log_target: None,
            acting_user: None,
            guest_space: None,
        }
    }

    pub fn action(mut self, action: &str) -> Self {
        self.action = action.to_string();
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn target(mut self, target: Option<LogTarget>) -> Self {
        self.log_target = target;
        self
    }

    pub fn user(mut self, user: Option<String>) -> Self {
        self.acting_user = user;
        self
    }

    pub fn guest_space(mut self, space: Option<String>) -> Self {
        self.guest_space = space;
        self
    }
}

/// Executes outbound calls for one resolved credential: picks the
/// authentication header, builds the absolute URL, times the round-trip,
/// classifies the outcome, hands everything to the recorder, and then
/// either returns the parsed body or re-raises the failure. Exactly one
/// log row per invocation, on every path.
pub struct Mediator {
    storage: BridgeStorage,
    credential: CredentialHandle,
    proxy: Option<String>,
}

impl Mediator {
    pub fn new(storage: BridgeStorage, credential: CredentialHandle, proxy: Option<String>) -> Self {
        Self {
            storage,
            credential,
            proxy,
        }
    }

    /// Resolves a credential and binds a mediator to it in one step.
    pub async fn resolve(
        storage: BridgeStorage,
        provider: Provider,
        credential_id: Option<i64>,
        proxy: Option<String>,
    ) -> BridgeResult<Self> {
        let credential = resolve_credential(&storage, provider, credential_id).await?;
        Ok(Self::new(storage, credential, proxy))
    }

    pub fn credential(&self) -> &CredentialHandle {
        &self.credential
    }

    pub fn storage(&self) -> &BridgeStorage {
        &self.storage
    }

    pub async fn execute(&mut self, request: OutboundRequest) -> BridgeResult<JsonValue> {
        let (header_name, header_value, captured) = self.auth_header().await?;
        let url = self.build_url(&request)?;
        let client = shared_client(self.proxy.as_deref())?;

        let mut builder = client
            .request(request.method.as_method(), &url)
            .header(header_name, &header_value);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let outcome = Self::send(builder).await;
        let elapsed = started.elapsed().as_secs_f64();
        self.finish(request, url, captured, elapsed, outcome).await
    }

    /// Raw binary upload (Graph drive content). Same log-then-classify
    /// flow as `execute`, with an octet-stream body instead of JSON.
    pub async fn upload(&mut self, request: OutboundRequest, content: Vec<u8>) -> BridgeResult<JsonValue> {
        let (header_name, header_value, captured) = self.auth_header().await?;
        let url = self.build_url(&request)?;
        let client = shared_client(self.proxy.as_deref())?;

        let builder = client
            .request(request.method.as_method(), &url)
            .header(header_name, &header_value)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content);

        let started = Instant::now();
        let outcome = Self::send(builder).await;
        let elapsed = started.elapsed().as_secs_f64();
        self.finish(request, url, captured, elapsed, outcome).await
    }

    /// Multipart file upload (Kintone `file.json`).
    pub async fn upload_multipart(
        &mut self,
        request: OutboundRequest,
        file_name: String,
        content: Vec<u8>,
    ) -> BridgeResult<JsonValue> {
        let (header_name, header_value, captured) = self.auth_header().await?;
        let url = self.build_url(&request)?;
        let client = shared_client(self.proxy.as_deref())?;

        let part = wreq::multipart::Part::bytes(content).file_name(file_name);
        let form = wreq::multipart::Form::new().part("file", part);
        let builder = client
            .request(request.method.as_method(), &url)
            .header(header_name, &header_value)
            .multipart(form);

        let started = Instant::now();
        let outcome = Self::send(builder).await;
        let elapsed = started.elapsed().as_secs_f64();
        self.finish(request, url, captured, elapsed, outcome).await
    }

    async fn send(builder: wreq::RequestBuilder) -> Result<(u16, String), String> {
        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text().await {
                    Ok(text) => Ok((status, text)),
                    Err(err) => Err(err.to_string()),
                }
            }
            Err(err) => Err(err.to_string()),
        }
    }

    /// Classification, recording, and the final verdict. Every branch
    /// records exactly once before returning.
    async fn finish(
        &self,
        request: OutboundRequest,
        url: String,
        captured_headers: JsonValue,
        elapsed: f64,
        outcome: Result<(u16, String), String>,
    ) -> BridgeResult<JsonValue> {
        let attempt = |status: CallStatus| CallAttempt {
            provider: self.credential.provider,
            credential_id: Some(self.credential.id),
            target: request.log_target,
            action: request.action.clone(),
            method: request.method.as_str().to_string(),
            url: url.clone(),
            request_body: request.body.as_ref().map(JsonValue::to_string),
            request_headers: Some(captured_headers.clone()),
            status_code: None,
            response_body: None,
            response_time: None,
            status,
            error_message: None,
            acting_user: request.acting_user.clone(),
        };

        match outcome {
            Ok((status_code, text)) => {
                if status_code >= 400 {
                    let mut row = attempt(CallStatus::Failed);
                    row.status_code = Some(i32::from(status_code));
                    row.response_body = Some(text.clone());
                    row.response_time = Some(elapsed);
                    row.error_message = Some(text.clone());
                    recorder::record(&self.storage, row).await;
                    return Err(BridgeError::Upstream {
                        status: status_code,
                        body: truncate_body(&text),
                    });
                }

                let parsed = if text.trim().is_empty() {
                    Ok(JsonValue::Null)
                } else {
                    serde_json::from_str::<JsonValue>(&text)
                };
                match parsed {
                    Ok(value) => {
                        let mut row = attempt(CallStatus::Success);
                        row.status_code = Some(i32::from(status_code));
                        row.response_body = Some(text);
                        row.response_time = Some(elapsed);
                        recorder::record(&self.storage, row).await;
                        Ok(value)
                    }
                    Err(err) => {
                        let message = format!("response decode failed: {err}");
                        let mut row = attempt(CallStatus::Error);
                        row.status_code = Some(i32::from(status_code));
                        row.response_body = Some(text);
                        row.response_time = Some(elapsed);
                        row.error_message = Some(message.clone());
                        recorder::record(&self.storage, row).await;
                        Err(BridgeError::Transport(message))
                    }
                }
            }
            Err(message) => {
                let mut row = attempt(CallStatus::Error);
                row.error_message = Some(message.clone());
                recorder::record(&self.storage, row).await;
                Err(BridgeError::Transport(message))
            }
        }
    }

    /// Authentication header plus its redacted capture for the log row.
    async fn auth_header(&mut self) -> BridgeResult<(&'static str, String, JsonValue)> {
        match &self.credential.secret {
            CredentialSecret::Graph { .. } => {
                let client = shared_client(self.proxy.as_deref())?;
                let token =
                    ensure_access_token(&self.storage, &client, &mut self.credential).await?;
                let captured = json!({
                    "Authorization": format!("Bearer {}", recorder::REDACTED_PLACEHOLDER),
                });
                Ok(("Authorization", format!("Bearer {token}"), captured))
            }
            CredentialSecret::KintoneApiToken { api_token } => {
                let captured = json!({ KINTONE_TOKEN_HEADER: recorder::REDACTED_PLACEHOLDER });
                Ok((KINTONE_TOKEN_HEADER, api_token.clone(), captured))
            }
            CredentialSecret::KintonePassword { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                let captured = json!({ KINTONE_PASSWORD_HEADER: recorder::REDACTED_PLACEHOLDER });
                Ok((KINTONE_PASSWORD_HEADER, encoded, captured))
            }
        }
    }

    fn build_url(&self, request: &OutboundRequest) -> BridgeResult<String> {
        build_url(&self.credential, request)
    }
}

fn build_url(credential: &CredentialHandle, request: &OutboundRequest) -> BridgeResult<String> {
    let path = request.path.trim_start_matches('/');
    match credential.provider {
        Provider::Graph => {
            let settings = credential.graph_settings();
            let base = settings.resource_base().trim_end_matches('/').to_string();
            Ok(format!("{base}/{path}"))
        }
        Provider::Kintone => {
            let settings = credential.kintone_settings();
            let origin = settings
                .origin()
                .ok_or(BridgeError::InvalidSecret("kintone subdomain not configured"))?;
            let space = request.guest_space.clone().or_else(|| {
                if settings.use_guest_space {
                    settings.guest_space_id.clone()
                } else {
                    None
                }
            });
            Ok(match space {
                Some(space) => format!("{origin}/k/guest/{space}/v1/{path}"),
                None => format!("{origin}/k/v1/{path}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kintone_credential(settings: JsonValue) -> CredentialHandle {
        CredentialHandle {
            id: 1,
            provider: Provider::Kintone,
            name: None,
            secret: CredentialSecret::KintoneApiToken {
                api_token: "tok".to_string(),
            },
            settings,
        }
    }

    #[test]
    fn graph_url_joins_base_and_relative_path() {
        let credential = CredentialHandle {
            id: 1,
            provider: Provider::Graph,
            name: None,
            secret: CredentialSecret::Graph {
                client_id: "c".to_string(),
                client_secret: "s".to_string(),
                tenant_id: "t".to_string(),
                access_token: None,
                expires_at: None,
            },
            settings: JsonValue::Null,
        };
        let request = OutboundRequest::new(HttpMethod::Get, "/me/joinedTeams");
        assert_eq!(
            build_url(&credential, &request).unwrap(),
            "https://graph.microsoft.com/v1.0/me/joinedTeams"
        );
    }

    #[test]
    fn kintone_url_uses_default_prefix() {
        let credential = kintone_credential(json!({ "subdomain": "acme" }));
        let request = OutboundRequest::new(HttpMethod::Get, "records.json");
        assert_eq!(
            build_url(&credential, &request).unwrap(),
            "https://acme.cybozu.com/k/v1/records.json"
        );
    }

    #[test]
    fn kintone_url_switches_to_guest_space_prefix_from_settings() {
        let credential = kintone_credential(json!({
            "subdomain": "acme",
            "use_guest_space": true,
            "guest_space_id": "7",
        }));
        let request = OutboundRequest::new(HttpMethod::Get, "records.json");
        assert_eq!(
            build_url(&credential, &request).unwrap(),
            "https://acme.cybozu.com/k/guest/7/v1/records.json"
        );
    }

    #[test]
    fn caller_guest_space_override_wins() {
        let credential = kintone_credential(json!({ "subdomain": "acme" }));
        let request = OutboundRequest::new(HttpMethod::Get, "records.json")
            .guest_space(Some("42".to_string()));
        assert_eq!(
            build_url(&credential, &request).unwrap(),
            "https://acme.cybozu.com/k/guest/42/v1/records.json"
        );
    }

    #[test]
    fn method_names_match_the_wire() {
        for (method, name, wire) in [
            (HttpMethod::Get, "GET", wreq::Method::GET),
            (HttpMethod::Post, "POST", wreq::Method::POST),
            (HttpMethod::Put, "PUT", wreq::Method::PUT),
            (HttpMethod::Patch, "PATCH", wreq::Method::PATCH),
            (HttpMethod::Delete, "DELETE", wreq::Method::DELETE),
        ] {
            assert_eq!(method.as_str(), name);
            assert_eq!(method.as_method(), wire);
        }
    }

    #[test]
    fn missing_subdomain_is_an_error() {
        let credential = kintone_credential(JsonValue::Null);
        let request = OutboundRequest::new(HttpMethod::Get, "records.json");
        assert!(matches!(
            build_url(&credential, &request),
            Err(BridgeError::InvalidSecret(_))
        ));
    }
}
