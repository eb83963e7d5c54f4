use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// One immutable row per outbound attempt. The credential / endpoint / app
/// references are plain columns on purpose: log history must survive
/// deletion of the rows they point at.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "call_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub provider: String,
    pub credential_id: Option<i64>,
    pub endpoint_id: Option<i64>,
    pub app_id: Option<i64>,
    pub action: String,
    pub request_method: String,
    pub request_url: String,
    pub request_body: Option<String>,
    /// Captured request headers with secret values replaced by a placeholder.
    pub request_headers: Option<Json>,
    pub status_code: Option<i32>,
    /// Truncated before insert; see the recorder.
    pub response_body: Option<String>,
    /// Fractional seconds; absent when the transport failed before a response.
    pub response_time: Option<f64>,
    /// "success", "failed" or "error".
    pub status: String,
    pub error_message: Option<String>,
    pub acting_user: Option<String>,
    #[sea_orm(indexed)]
    pub created_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
