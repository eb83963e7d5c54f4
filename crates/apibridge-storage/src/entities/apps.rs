use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A Kintone app registered under one connection credential.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "apps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "app_credential_code")]
    pub credential_id: i64,
    /// Numeric app id on the Kintone side, kept opaque here.
    #[sea_orm(unique_key = "app_credential_code")]
    pub app_code: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub total_requests: i64,
    pub last_accessed: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[sea_orm(belongs_to, from = "credential_id", to = "id", on_delete = "Cascade")]
    pub credential: HasOne<super::credentials::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
