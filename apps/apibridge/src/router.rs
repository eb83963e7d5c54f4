use std::sync::{Arc, RwLock};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use apibridge_core::BridgeError;
use apibridge_services::{GraphService, KintoneService};
use apibridge_storage::BridgeStorage;

use crate::cli::GlobalConfig;

#[derive(Clone)]
pub(crate) struct BridgeState {
    storage: BridgeStorage,
    config: Arc<RwLock<GlobalConfig>>,
}

impl BridgeState {
    fn proxy(&self) -> Option<String> {
        self.config.read().ok().and_then(|guard| guard.proxy.clone())
    }

    fn admin_key(&self) -> Result<String, Response> {
        self.config
            .read()
            .map(|guard| guard.admin_key.clone())
            .map_err(|_| {
                (StatusCode::INTERNAL_SERVER_ERROR, "config lock poisoned").into_response()
            })
    }
}

pub(crate) fn bridge_router(
    storage: BridgeStorage,
    config: Arc<RwLock<GlobalConfig>>,
) -> Router {
    let state = BridgeState { storage, config };

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/graph/teams/channel-message",
            post(graph_channel_message),
        )
        .route("/api/graph/teams/chat-message", post(graph_chat_message))
        .route("/api/graph/teams/joined", get(graph_joined_teams))
        .route("/api/graph/mail/send", post(graph_send_mail))
        .route("/api/graph/mail/messages", get(graph_list_messages))
        .route("/api/graph/sites/{site_id}", get(graph_get_site))
        .route("/api/graph/sites/{site_id}/lists", get(graph_site_lists))
        .route(
            "/api/graph/sites/{site_id}/lists/{list_id}/items",
            get(graph_list_items),
        )
        .route("/api/kintone/records", get(kintone_get_records))
        .route("/api/kintone/record", get(kintone_get_record))
        .route("/api/kintone/record/add", post(kintone_add_record))
        .route("/api/kintone/records/add", post(kintone_add_records))
        .route("/api/kintone/record/update", put(kintone_update_record))
        .route("/api/kintone/records/update", put(kintone_update_records))
        .route("/api/kintone/records/delete", post(kintone_delete_records))
        .route("/api/kintone/app", get(kintone_app_info))
        .route("/api/kintone/form-fields", get(kintone_form_fields))
        .route("/api/logs", get(list_logs))
        .with_state(state)
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

#[allow(clippy::result_large_err)]
fn require_admin(state: &BridgeState, headers: &HeaderMap) -> Result<(), Response> {
    let admin_key = state.admin_key()?;
    if is_admin(headers, &admin_key) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response())
    }
}

fn is_admin(headers: &HeaderMap, admin_key: &str) -> bool {
    if let Some(value) = header_value(headers, "x-admin-key") {
        return value == admin_key;
    }

    let Some(auth) = header_value(headers, "authorization") else {
        return false;
    };
    let auth = auth.trim();
    for prefix in ["Bearer ", "bearer "] {
        if let Some(token) = auth.strip_prefix(prefix) {
            return token.trim() == admin_key;
        }
    }
    false
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn bridge_error(err: BridgeError) -> Response {
    let (status, message) = match &err {
        BridgeError::NoActiveCredential(provider) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("no active credential for {provider}"),
        ),
        BridgeError::CredentialNotFound(id) => {
            (StatusCode::NOT_FOUND, format!("credential {id} not found"))
        }
        BridgeError::Authentication { body } => (
            StatusCode::BAD_GATEWAY,
            format!("token exchange rejected: {body}"),
        ),
        BridgeError::Upstream { status, body } => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            body.clone(),
        ),
        BridgeError::Transport(message) => (StatusCode::BAD_GATEWAY, message.clone()),
        BridgeError::InvalidSecret(message) => {
            (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
        }
        BridgeError::Storage(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        BridgeError::Serde(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
}

fn ok(value: JsonValue) -> Response {
    Json(value).into_response()
}

/// Caller identity and credential selection shared by every invoke route.
/// Flattened into JSON bodies; query routes carry the two fields inline
/// because urlencoded deserialization cannot flatten numeric fields.
#[derive(Debug, Default, Deserialize)]
struct InvokeScope {
    credential_id: Option<i64>,
    user: Option<String>,
}

async fn graph(state: &BridgeState, scope: &InvokeScope) -> Result<GraphService, Response> {
    GraphService::connect(state.storage.clone(), scope.credential_id, state.proxy())
        .await
        .map(|service| service.acting_user(scope.user.clone()))
        .map_err(bridge_error)
}

async fn kintone(
    state: &BridgeState,
    scope: &InvokeScope,
    guest_space: Option<String>,
) -> Result<KintoneService, Response> {
    KintoneService::connect(state.storage.clone(), scope.credential_id, state.proxy())
        .await
        .map(|service| service.acting_user(scope.user.clone()).guest_space(guest_space))
        .map_err(bridge_error)
}

// Graph routes

#[derive(Deserialize)]
struct ChannelMessageBody {
    #[serde(flatten)]
    scope: InvokeScope,
    team_id: String,
    channel_id: String,
    message: String,
}

async fn graph_channel_message(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Json(body): Json<ChannelMessageBody>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match graph(&state, &body.scope).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service
        .send_channel_message(&body.team_id, &body.channel_id, &body.message)
        .await
    {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct ChatMessageBody {
    #[serde(flatten)]
    scope: InvokeScope,
    chat_id: String,
    message: String,
}

async fn graph_chat_message(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Json(body): Json<ChatMessageBody>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match graph(&state, &body.scope).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.send_chat_message(&body.chat_id, &body.message).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

async fn graph_joined_teams(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Query(scope): Query<InvokeScope>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match graph(&state, &scope).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.list_joined_teams().await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct SendMailBody {
    #[serde(flatten)]
    scope: InvokeScope,
    to: Vec<String>,
    subject: String,
    body: String,
    #[serde(default)]
    cc: Option<Vec<String>>,
    #[serde(default = "default_true")]
    html: bool,
}

fn default_true() -> bool {
    true
}

async fn graph_send_mail(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Json(body): Json<SendMailBody>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match graph(&state, &body.scope).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service
        .send_mail(
            &body.to,
            &body.subject,
            &body.body,
            body.cc.as_deref(),
            body.html,
        )
        .await
    {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct ListMessagesQuery {
    credential_id: Option<i64>,
    user: Option<String>,
    #[serde(default = "default_folder")]
    folder: String,
    #[serde(default = "default_top")]
    top: u32,
}

impl ListMessagesQuery {
    fn scope(&self) -> InvokeScope {
        InvokeScope {
            credential_id: self.credential_id,
            user: self.user.clone(),
        }
    }
}

fn default_folder() -> String {
    "inbox".to_string()
}

fn default_top() -> u32 {
    10
}

async fn graph_list_messages(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Query(query): Query<ListMessagesQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match graph(&state, &query.scope()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.list_messages(&query.folder, query.top).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

async fn graph_get_site(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Path(site_id): Path<String>,
    Query(scope): Query<InvokeScope>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match graph(&state, &scope).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.get_site(&site_id).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

async fn graph_site_lists(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Path(site_id): Path<String>,
    Query(scope): Query<InvokeScope>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match graph(&state, &scope).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.list_site_lists(&site_id).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

async fn graph_list_items(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Path((site_id, list_id)): Path<(String, String)>,
    Query(scope): Query<InvokeScope>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match graph(&state, &scope).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.get_list_items(&site_id, &list_id).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

// Kintone routes

#[derive(Deserialize)]
struct RecordsQuery {
    credential_id: Option<i64>,
    user: Option<String>,
    app: String,
    #[serde(default)]
    query: Option<String>,
    /// Comma-separated field list.
    #[serde(default)]
    fields: Option<String>,
    #[serde(default)]
    total_count: bool,
    #[serde(default)]
    guest_space: Option<String>,
}

impl RecordsQuery {
    fn scope(&self) -> InvokeScope {
        InvokeScope {
            credential_id: self.credential_id,
            user: self.user.clone(),
        }
    }
}

async fn kintone_get_records(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Query(query): Query<RecordsQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &query.scope(), query.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    let fields: Option<Vec<String>> = query.fields.as_deref().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect()
    });
    match service
        .get_records(
            &query.app,
            query.query.as_deref(),
            fields.as_deref(),
            query.total_count,
        )
        .await
    {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct RecordQuery {
    credential_id: Option<i64>,
    user: Option<String>,
    app: String,
    id: String,
    #[serde(default)]
    guest_space: Option<String>,
}

impl RecordQuery {
    fn scope(&self) -> InvokeScope {
        InvokeScope {
            credential_id: self.credential_id,
            user: self.user.clone(),
        }
    }
}

async fn kintone_get_record(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Query(query): Query<RecordQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &query.scope(), query.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.get_record(&query.app, &query.id).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct AddRecordBody {
    #[serde(flatten)]
    scope: InvokeScope,
    app: String,
    record: JsonValue,
    #[serde(default)]
    guest_space: Option<String>,
}

async fn kintone_add_record(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Json(body): Json<AddRecordBody>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &body.scope, body.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.add_record(&body.app, body.record.clone()).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct AddRecordsBody {
    #[serde(flatten)]
    scope: InvokeScope,
    app: String,
    records: Vec<JsonValue>,
    #[serde(default)]
    guest_space: Option<String>,
}

async fn kintone_add_records(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Json(body): Json<AddRecordsBody>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &body.scope, body.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.add_records(&body.app, body.records.clone()).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct UpdateRecordBody {
    #[serde(flatten)]
    scope: InvokeScope,
    app: String,
    id: String,
    record: JsonValue,
    #[serde(default)]
    revision: Option<String>,
    #[serde(default)]
    guest_space: Option<String>,
}

async fn kintone_update_record(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Json(body): Json<UpdateRecordBody>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &body.scope, body.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service
        .update_record(
            &body.app,
            &body.id,
            body.record.clone(),
            body.revision.as_deref(),
        )
        .await
    {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

async fn kintone_update_records(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Json(body): Json<AddRecordsBody>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &body.scope, body.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.update_records(&body.app, body.records.clone()).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct DeleteRecordsBody {
    #[serde(flatten)]
    scope: InvokeScope,
    app: String,
    ids: Vec<String>,
    #[serde(default)]
    guest_space: Option<String>,
}

async fn kintone_delete_records(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Json(body): Json<DeleteRecordsBody>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &body.scope, body.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.delete_records(&body.app, &body.ids).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

#[derive(Deserialize)]
struct AppQuery {
    credential_id: Option<i64>,
    user: Option<String>,
    app: String,
    #[serde(default)]
    guest_space: Option<String>,
}

impl AppQuery {
    fn scope(&self) -> InvokeScope {
        InvokeScope {
            credential_id: self.credential_id,
            user: self.user.clone(),
        }
    }
}

async fn kintone_app_info(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Query(query): Query<AppQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &query.scope(), query.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.get_app_info(&query.app).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

async fn kintone_form_fields(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Query(query): Query<AppQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    let mut service = match kintone(&state, &query.scope(), query.guest_space.clone()).await {
        Ok(service) => service,
        Err(resp) => return resp,
    };
    match service.get_form_fields(&query.app).await {
        Ok(value) => ok(value),
        Err(err) => bridge_error(err),
    }
}

// Logs

#[derive(Deserialize)]
struct LogsQuery {
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_page_size")]
    page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    50
}

async fn list_logs(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    Query(query): Query<LogsQuery>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers) {
        return resp;
    }
    match state.storage.list_call_logs(query.page, query.page_size).await {
        Ok((items, num_pages)) => {
            let items = items
                .into_iter()
                .map(|log| {
                    json!({
                        "id": log.id,
                        "provider": log.provider,
                        "credential_id": log.credential_id,
                        "endpoint_id": log.endpoint_id,
                        "app_id": log.app_id,
                        "action": log.action,
                        "request_method": log.request_method,
                        "request_url": log.request_url,
                        "status_code": log.status_code,
                        "response_time": log.response_time,
                        "status": log.status,
                        "error_message": log.error_message,
                        "acting_user": log.acting_user,
                        "created_at": format_time(log.created_at),
                    })
                })
                .collect::<Vec<_>>();
            ok(json!({ "items": items, "num_pages": num_pages }))
        }
        Err(err) => bridge_error(BridgeError::Storage(err)),
    }
}

fn format_time(value: time::OffsetDateTime) -> String {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}
