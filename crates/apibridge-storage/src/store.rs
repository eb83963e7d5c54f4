use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveValue, ColumnTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Schema,
};
use time::OffsetDateTime;

use crate::entities;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("serde json error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct CredentialInput {
    pub provider: String,
    pub name: Option<String>,
    pub settings: Option<Json>,
    pub secret: Json,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct EndpointInput {
    pub name: String,
    pub service: String,
    pub path: String,
    pub method: String,
    pub requires_body: bool,
    pub description: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct AppInput {
    pub credential_id: i64,
    pub app_code: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
}

/// One outbound attempt, ready to persist. Field semantics follow the
/// `call_logs` entity; truncation and redaction happen before this struct
/// is built.
#[derive(Debug, Clone)]
pub struct CallLogInput {
    pub provider: String,
    pub credential_id: Option<i64>,
    pub endpoint_id: Option<i64>,
    pub app_id: Option<i64>,
    pub action: String,
    pub request_method: String,
    pub request_url: String,
    pub request_body: Option<String>,
    pub request_headers: Option<Json>,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub response_time: Option<f64>,
    pub status: String,
    pub error_message: Option<String>,
    pub acting_user: Option<String>,
}

/// Storage handle shared by the mediator, the recorder and the admin
/// surface. Cloning is cheap; all clones share one connection pool.
#[derive(Clone)]
pub struct BridgeStorage {
    db: DatabaseConnection,
}

impl BridgeStorage {
    pub async fn connect(dsn: &str) -> Result<Self, DbErr> {
        let db = Database::connect(dsn).await?;
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Entity-first schema sync (SeaORM 2.0), run once at bootstrap.
    pub async fn sync(&self) -> Result<(), DbErr> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::Credentials)
            .register(entities::Endpoints)
            .register(entities::Apps)
            .register(entities::CallLogs)
            .register(entities::GlobalConfig)
            .sync(&self.db)
            .await
    }

    // Credentials

    pub async fn insert_credential(&self, input: CredentialInput) -> StorageResult<i64> {
        let now = OffsetDateTime::now_utc();
        let active = entities::credentials::ActiveModel {
            provider: ActiveValue::Set(input.provider),
            name: ActiveValue::Set(input.name),
            settings: ActiveValue::Set(input.settings),
            secret: ActiveValue::Set(input.secret),
            enabled: ActiveValue::Set(input.enabled),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let result = entities::Credentials::insert(active).exec(&self.db).await?;
        Ok(result.last_insert_id)
    }

    pub async fn find_credential(
        &self,
        id: i64,
    ) -> StorageResult<Option<entities::credentials::Model>> {
        Ok(entities::Credentials::find_by_id(id).one(&self.db).await?)
    }

    /// Default-selection policy: the most recently created enabled
    /// credential for the provider. No uniqueness is enforced; ties are
    /// broken by id so the order stays stable.
    pub async fn newest_active_credential(
        &self,
        provider: &str,
    ) -> StorageResult<Option<entities::credentials::Model>> {
        use entities::credentials::Column;
        Ok(entities::Credentials::find()
            .filter(Column::Provider.eq(provider))
            .filter(Column::Enabled.eq(true))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .one(&self.db)
            .await?)
    }

    /// Persists a refreshed secret (cached token + expiry live inside it).
    pub async fn update_credential_secret(&self, id: i64, secret: Json) -> StorageResult<()> {
        let active = entities::credentials::ActiveModel {
            id: ActiveValue::Set(id),
            secret: ActiveValue::Set(secret),
            updated_at: ActiveValue::Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };
        entities::Credentials::update(active).exec(&self.db).await?;
        Ok(())
    }

    pub async fn set_credential_enabled(&self, id: i64, enabled: bool) -> StorageResult<()> {
        let active = entities::credentials::ActiveModel {
            id: ActiveValue::Set(id),
            enabled: ActiveValue::Set(enabled),
            updated_at: ActiveValue::Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };
        entities::Credentials::update(active).exec(&self.db).await?;
        Ok(())
    }

    // Endpoints

    pub async fn insert_endpoint(&self, input: EndpointInput) -> StorageResult<i64> {
        let now = OffsetDateTime::now_utc();
        let active = entities::endpoints::ActiveModel {
            name: ActiveValue::Set(input.name),
            service: ActiveValue::Set(input.service),
            path: ActiveValue::Set(input.path),
            method: ActiveValue::Set(input.method),
            requires_body: ActiveValue::Set(input.requires_body),
            description: ActiveValue::Set(input.description),
            enabled: ActiveValue::Set(input.enabled),
            total_calls: ActiveValue::Set(0),
            last_called: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let result = entities::Endpoints::insert(active).exec(&self.db).await?;
        Ok(result.last_insert_id)
    }

    /// Seeds well-known endpoints at boot, inserting only names that do not
    /// exist yet.
    pub async fn ensure_endpoints(&self, defaults: &[EndpointInput]) -> StorageResult<()> {
        let existing = entities::Endpoints::find().all(&self.db).await?;
        let mut known = std::collections::HashSet::new();
        for endpoint in existing {
            known.insert(endpoint.name);
        }
        for default in defaults {
            if known.contains(&default.name) {
                continue;
            }
            let _ = self.insert_endpoint(default.clone()).await?;
        }
        Ok(())
    }

    pub async fn find_endpoint(
        &self,
        id: i64,
    ) -> StorageResult<Option<entities::endpoints::Model>> {
        Ok(entities::Endpoints::find_by_id(id).one(&self.db).await?)
    }

    /// First enabled endpoint for the service whose path contains the given
    /// fragment. Used by façades to resolve a log target; a miss is
    /// tolerated metadata drift, not a failure.
    pub async fn match_endpoint(
        &self,
        service: &str,
        path_fragment: &str,
    ) -> StorageResult<Option<entities::endpoints::Model>> {
        use entities::endpoints::Column;
        Ok(entities::Endpoints::find()
            .filter(Column::Service.eq(service))
            .filter(Column::Path.contains(path_fragment))
            .filter(Column::Enabled.eq(true))
            .order_by_asc(Column::Id)
            .one(&self.db)
            .await?)
    }

    /// Unsynchronized read-modify-write by design; lost increments under
    /// concurrent access are accepted.
    pub async fn touch_endpoint(&self, id: i64) -> StorageResult<()> {
        let Some(endpoint) = entities::Endpoints::find_by_id(id).one(&self.db).await? else {
            return Ok(());
        };
        let active = entities::endpoints::ActiveModel {
            id: ActiveValue::Set(endpoint.id),
            total_calls: ActiveValue::Set(endpoint.total_calls + 1),
            last_called: ActiveValue::Set(Some(OffsetDateTime::now_utc())),
            ..Default::default()
        };
        entities::Endpoints::update(active).exec(&self.db).await?;
        Ok(())
    }

    // Apps

    pub async fn insert_app(&self, input: AppInput) -> StorageResult<i64> {
        let now = OffsetDateTime::now_utc();
        let active = entities::apps::ActiveModel {
            credential_id: ActiveValue::Set(input.credential_id),
            app_code: ActiveValue::Set(input.app_code),
            name: ActiveValue::Set(input.name),
            description: ActiveValue::Set(input.description),
            enabled: ActiveValue::Set(input.enabled),
            total_requests: ActiveValue::Set(0),
            last_accessed: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let result = entities::Apps::insert(active).exec(&self.db).await?;
        Ok(result.last_insert_id)
    }

    pub async fn find_app(
        &self,
        credential_id: i64,
        app_code: &str,
    ) -> StorageResult<Option<entities::apps::Model>> {
        use entities::apps::Column;
        Ok(entities::Apps::find()
            .filter(Column::CredentialId.eq(credential_id))
            .filter(Column::AppCode.eq(app_code))
            .one(&self.db)
            .await?)
    }

    /// Same lossy counter contract as `touch_endpoint`.
    pub async fn touch_app(&self, id: i64) -> StorageResult<()> {
        let Some(app) = entities::Apps::find_by_id(id).one(&self.db).await? else {
            return Ok(());
        };
        let active = entities::apps::ActiveModel {
            id: ActiveValue::Set(app.id),
            total_requests: ActiveValue::Set(app.total_requests + 1),
            last_accessed: ActiveValue::Set(Some(OffsetDateTime::now_utc())),
            ..Default::default()
        };
        entities::Apps::update(active).exec(&self.db).await?;
        Ok(())
    }

    // Call logs (append-only)

    pub async fn insert_call_log(&self, input: CallLogInput) -> StorageResult<i64> {
        let active = entities::call_logs::ActiveModel {
            provider: ActiveValue::Set(input.provider),
            credential_id: ActiveValue::Set(input.credential_id),
            endpoint_id: ActiveValue::Set(input.endpoint_id),
            app_id: ActiveValue::Set(input.app_id),
            action: ActiveValue::Set(input.action),
            request_method: ActiveValue::Set(input.request_method),
            request_url: ActiveValue::Set(input.request_url),
            request_body: ActiveValue::Set(input.request_body),
            request_headers: ActiveValue::Set(input.request_headers),
            status_code: ActiveValue::Set(input.status_code),
            response_body: ActiveValue::Set(input.response_body),
            response_time: ActiveValue::Set(input.response_time),
            status: ActiveValue::Set(input.status),
            error_message: ActiveValue::Set(input.error_message),
            acting_user: ActiveValue::Set(input.acting_user),
            created_at: ActiveValue::Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };
        let result = entities::CallLogs::insert(active).exec(&self.db).await?;
        Ok(result.last_insert_id)
    }

    pub async fn count_call_logs(&self) -> StorageResult<u64> {
        Ok(entities::CallLogs::find().count(&self.db).await?)
    }

    pub async fn list_call_logs(
        &self,
        page: u64,
        page_size: u64,
    ) -> StorageResult<(Vec<entities::call_logs::Model>, u64)> {
        use entities::call_logs::Column;

        let page = std::cmp::Ord::max(page, 1);
        let page_size = std::cmp::Ord::max(page_size, 1);
        let paginator = entities::CallLogs::find()
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .paginate(&self.db, page_size);
        let num_pages = paginator.num_pages().await?;
        let items = if num_pages == 0 || page > num_pages {
            Vec::new()
        } else {
            paginator.fetch_page(page - 1).await?
        };
        Ok((items, num_pages))
    }

    // Global config

    pub async fn load_global_config(
        &self,
    ) -> StorageResult<Option<entities::global_config::Model>> {
        use entities::global_config::Column;
        Ok(entities::GlobalConfig::find()
            .order_by_asc(Column::Id)
            .one(&self.db)
            .await?)
    }

    pub async fn upsert_global_config(&self, id: i64, config_json: Json) -> StorageResult<()> {
        let now = OffsetDateTime::now_utc();
        let existing = entities::GlobalConfig::find_by_id(id).one(&self.db).await?;
        let active = entities::global_config::ActiveModel {
            id: ActiveValue::Set(id),
            config_json: ActiveValue::Set(config_json),
            updated_at: ActiveValue::Set(now),
        };
        if existing.is_some() {
            entities::GlobalConfig::update(active).exec(&self.db).await?;
        } else {
            entities::GlobalConfig::insert(active).exec(&self.db).await?;
        }
        Ok(())
    }
}
