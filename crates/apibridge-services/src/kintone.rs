use apibridge_core::{
    BridgeResult, HttpMethod, LogTarget, Mediator, OutboundRequest, Provider,
};
use apibridge_storage::BridgeStorage;
use serde_json::{Value as JsonValue, json};

/// Kintone record CRUD, app metadata and file upload over the mediator.
/// Per-call log attribution goes to the registered app matching the app
/// code, when one exists.
pub struct KintoneService {
    mediator: Mediator,
    acting_user: Option<String>,
    /// Guest-space override applied to every call this façade issues; the
    /// credential settings still apply when this is unset.
    guest_space: Option<String>,
}

impl KintoneService {
    pub async fn connect(
        storage: BridgeStorage,
        credential_id: Option<i64>,
        proxy: Option<String>,
    ) -> BridgeResult<Self> {
        let mediator = Mediator::resolve(storage, Provider::Kintone, credential_id, proxy).await?;
        Ok(Self {
            mediator,
            acting_user: None,
            guest_space: None,
        })
    }

    pub fn acting_user(mut self, user: Option<String>) -> Self {
        self.acting_user = user;
        self
    }

    pub fn guest_space(mut self, space: Option<String>) -> Self {
        self.guest_space = space;
        self
    }

    pub fn credential_id(&self) -> i64 {
        self.mediator.credential().id
    }

    async fn target(&self, app_code: &str) -> BridgeResult<Option<LogTarget>> {
        let app = self
            .mediator
            .storage()
            .find_app(self.mediator.credential().id, app_code)
            .await?;
        Ok(app.map(|a| LogTarget::App(a.id)))
    }

    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        action: &str,
        target: Option<LogTarget>,
    ) -> OutboundRequest {
        OutboundRequest::new(method, path)
            .action(action)
            .target(target)
            .user(self.acting_user.clone())
            .guest_space(self.guest_space.clone())
    }

    pub async fn get_records(
        &mut self,
        app: &str,
        query: Option<&str>,
        fields: Option<&[String]>,
        total_count: bool,
    ) -> BridgeResult<JsonValue> {
        let target = self.target(app).await?;
        let mut request = self
            .request(HttpMethod::Get, "records.json", "get_records", target)
            .param("app", app);
        if let Some(query) = query {
            request = request.param("query", query);
        }
        if let Some(fields) = fields {
            for field in fields {
                request = request.param("fields", field.clone());
            }
        }
        if total_count {
            request = request.param("totalCount", "true");
        }
        self.mediator.execute(request).await
    }

    pub async fn get_record(&mut self, app: &str, record_id: &str) -> BridgeResult<JsonValue> {
        let target = self.target(app).await?;
        let request = self
            .request(HttpMethod::Get, "record.json", "get_record", target)
            .param("app", app)
            .param("id", record_id);
        self.mediator.execute(request).await
    }

    pub async fn add_record(&mut self, app: &str, record: JsonValue) -> BridgeResult<JsonValue> {
        let target = self.target(app).await?;
        let request = self
            .request(HttpMethod::Post, "record.json", "add_record", target)
            .json(json!({ "app": app, "record": record }));
        self.mediator.execute(request).await
    }

    pub async fn add_records(
        &mut self,
        app: &str,
        records: Vec<JsonValue>,
    ) -> BridgeResult<JsonValue> {
        let target = self.target(app).await?;
        let request = self
            .request(HttpMethod::Post, "records.json", "add_records", target)
            .json(json!({ "app": app, "records": records }));
        self.mediator.execute(request).await
    }

    /// The revision is forwarded verbatim when given; optimistic locking is
    /// the upstream's to enforce.
    pub async fn update_record(
        &mut self,
        app: &str,
        record_id: &str,
        record: JsonValue,
        revision: Option<&str>,
    ) -> BridgeResult<JsonValue> {
        let mut body = json!({ "app": app, "id": record_id, "record": record });
        if let Some(revision) = revision {
            body["revision"] = json!(revision);
        }
        let target = self.target(app).await?;
        let request = self
            .request(HttpMethod::Put, "record.json", "update_record", target)
            .json(body);
        self.mediator.execute(request).await
    }

    pub async fn update_records(
        &mut self,
        app: &str,
        records: Vec<JsonValue>,
    ) -> BridgeResult<JsonValue> {
        let target = self.target(app).await?;
        let request = self
            .request(HttpMethod::Put, "records.json", "update_records", target)
            .json(json!({ "app": app, "records": records }));
        self.mediator.execute(request).await
    }

    pub async fn delete_records(
        &mut self,
        app: &str,
        record_ids: &[String],
    ) -> BridgeResult<JsonValue> {
        let target = self.target(app).await?;
        let request = self
            .request(HttpMethod::Delete, "records.json", "delete_records", target)
            .json(json!({ "app": app, "ids": record_ids }));
        self.mediator.execute(request).await
    }

    pub async fn get_app_info(&mut self, app: &str) -> BridgeResult<JsonValue> {
        let target = self.target(app).await?;
        let request = self
            .request(HttpMethod::Get, "app.json", "get_app_info", target)
            .param("id", app);
        self.mediator.execute(request).await
    }

    pub async fn get_form_fields(&mut self, app: &str) -> BridgeResult<JsonValue> {
        let target = self.target(app).await?;
        let request = self
            .request(
                HttpMethod::Get,
                "app/form/fields.json",
                "get_form_fields",
                target,
            )
            .param("app", app);
        self.mediator.execute(request).await
    }

    /// Multipart upload; the returned fileKey is what record fields
    /// reference.
    pub async fn upload_file(
        &mut self,
        file_name: &str,
        content: Vec<u8>,
    ) -> BridgeResult<JsonValue> {
        let request = self.request(HttpMethod::Post, "file.json", "upload_file", None);
        self.mediator
            .upload_multipart(request, file_name.to_string(), content)
            .await
    }
}
