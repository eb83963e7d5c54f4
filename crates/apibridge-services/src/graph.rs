use apibridge_core::{
    BridgeResult, HttpMethod, LogTarget, Mediator, OutboundRequest, Provider,
};
use apibridge_storage::BridgeStorage;
use serde_json::{Value as JsonValue, json};

/// Teams / Outlook / SharePoint operations as thin builders over the
/// mediator. One credential is resolved at construction and reused for
/// every call the façade issues.
pub struct GraphService {
    mediator: Mediator,
    acting_user: Option<String>,
}

impl GraphService {
    pub async fn connect(
        storage: BridgeStorage,
        credential_id: Option<i64>,
        proxy: Option<String>,
    ) -> BridgeResult<Self> {
        let mediator = Mediator::resolve(storage, Provider::Graph, credential_id, proxy).await?;
        Ok(Self {
            mediator,
            acting_user: None,
        })
    }

    pub fn acting_user(mut self, user: Option<String>) -> Self {
        self.acting_user = user;
        self
    }

    pub fn credential_id(&self) -> i64 {
        self.mediator.credential().id
    }

    /// First enabled endpoint for the service whose path contains the
    /// fragment. A miss means the call goes unattributed, not unlogged.
    async fn target(&self, service: &str, fragment: &str) -> BridgeResult<Option<LogTarget>> {
        let endpoint = self.mediator.storage().match_endpoint(service, fragment).await?;
        Ok(endpoint.map(|e| LogTarget::Endpoint(e.id)))
    }

    fn request(
        &self,
        method: HttpMethod,
        path: String,
        action: &str,
        target: Option<LogTarget>,
    ) -> OutboundRequest {
        OutboundRequest::new(method, path)
            .action(action)
            .target(target)
            .user(self.acting_user.clone())
    }

    // Teams

    pub async fn send_channel_message(
        &mut self,
        team_id: &str,
        channel_id: &str,
        message: &str,
    ) -> BridgeResult<JsonValue> {
        let target = self.target("teams", "messages").await?;
        let request = self
            .request(
                HttpMethod::Post,
                format!("teams/{team_id}/channels/{channel_id}/messages"),
                "send_channel_message",
                target,
            )
            .json(json!({ "body": { "content": message } }));
        self.mediator.execute(request).await
    }

    pub async fn send_chat_message(
        &mut self,
        chat_id: &str,
        message: &str,
    ) -> BridgeResult<JsonValue> {
        let target = self.target("teams", "chats").await?;
        let request = self
            .request(
                HttpMethod::Post,
                format!("chats/{chat_id}/messages"),
                "send_chat_message",
                target,
            )
            .json(json!({ "body": { "content": message } }));
        self.mediator.execute(request).await
    }

    pub async fn list_joined_teams(&mut self) -> BridgeResult<JsonValue> {
        let target = self.target("teams", "joinedTeams").await?;
        let request = self.request(
            HttpMethod::Get,
            "me/joinedTeams".to_string(),
            "list_joined_teams",
            target,
        );
        self.mediator.execute(request).await
    }

    // Outlook

    pub async fn send_mail(
        &mut self,
        to: &[String],
        subject: &str,
        body: &str,
        cc: Option<&[String]>,
        html: bool,
    ) -> BridgeResult<JsonValue> {
        let recipients = |addresses: &[String]| -> JsonValue {
            addresses
                .iter()
                .map(|address| json!({ "emailAddress": { "address": address } }))
                .collect()
        };

        let mut message = json!({
            "message": {
                "subject": subject,
                "body": {
                    "contentType": if html { "HTML" } else { "Text" },
                    "content": body,
                },
                "toRecipients": recipients(to),
            }
        });
        if let Some(cc) = cc {
            message["message"]["ccRecipients"] = recipients(cc);
        }

        let target = self.target("outlook", "sendMail").await?;
        let request = self
            .request(
                HttpMethod::Post,
                "me/sendMail".to_string(),
                "send_mail",
                target,
            )
            .json(message);
        self.mediator.execute(request).await
    }

    pub async fn list_messages(&mut self, folder: &str, top: u32) -> BridgeResult<JsonValue> {
        let target = self.target("outlook", "messages").await?;
        let request = self
            .request(
                HttpMethod::Get,
                format!("me/mailFolders/{folder}/messages"),
                "list_messages",
                target,
            )
            .param("$top", top.to_string());
        self.mediator.execute(request).await
    }

    // SharePoint

    pub async fn get_site(&mut self, site_id: &str) -> BridgeResult<JsonValue> {
        let target = self.target("sharepoint", "sites").await?;
        let request = self.request(
            HttpMethod::Get,
            format!("sites/{site_id}"),
            "get_site",
            target,
        );
        self.mediator.execute(request).await
    }

    pub async fn list_site_lists(&mut self, site_id: &str) -> BridgeResult<JsonValue> {
        let target = self.target("sharepoint", "lists").await?;
        let request = self.request(
            HttpMethod::Get,
            format!("sites/{site_id}/lists"),
            "list_site_lists",
            target,
        );
        self.mediator.execute(request).await
    }

    pub async fn get_list_items(
        &mut self,
        site_id: &str,
        list_id: &str,
    ) -> BridgeResult<JsonValue> {
        let target = self.target("sharepoint", "items").await?;
        let request = self.request(
            HttpMethod::Get,
            format!("sites/{site_id}/lists/{list_id}/items"),
            "get_list_items",
            target,
        );
        self.mediator.execute(request).await
    }

    /// Binary upload to a drive path. The `:/path:/content` addressing is
    /// Graph's, not ours.
    pub async fn upload_drive_file(
        &mut self,
        site_id: &str,
        drive_id: &str,
        file_path: &str,
        content: Vec<u8>,
    ) -> BridgeResult<JsonValue> {
        let target = self.target("sharepoint", "content").await?;
        let request = self.request(
            HttpMethod::Put,
            format!("sites/{site_id}/drives/{drive_id}/root:/{file_path}:/content"),
            "upload_drive_file",
            target,
        );
        self.mediator.upload(request, content).await
    }
}
