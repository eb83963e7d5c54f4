use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "credentials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// "graph" or "kintone".
    pub provider: String,
    pub name: Option<String>,
    /// Per-provider connection settings (authority / subdomain / guest space).
    pub settings: Option<Json>,
    /// Tagged secret union; for Graph this also carries the cached bearer
    /// token and its expiry, mutated by the token manager during normal use.
    pub secret: Json,
    pub enabled: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[sea_orm(has_many)]
    pub apps: HasMany<super::apps::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
