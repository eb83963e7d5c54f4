use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A named Graph operation shape, with rolling usage counters.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "endpoints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "endpoint_name")]
    pub name: String,
    /// "teams", "outlook", "sharepoint" or "graph".
    pub service: String,
    /// Path template relative to the versioned resource base.
    pub path: String,
    pub method: String,
    pub requires_body: bool,
    pub description: Option<String>,
    pub enabled: bool,
    pub total_calls: i64,
    pub last_called: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
