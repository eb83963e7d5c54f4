use apibridge_storage::EndpointInput;

fn endpoint(
    name: &str,
    service: &str,
    path: &str,
    method: &str,
    requires_body: bool,
    description: &str,
) -> EndpointInput {
    EndpointInput {
        name: name.to_string(),
        service: service.to_string(),
        path: path.to_string(),
        method: method.to_string(),
        requires_body,
        description: Some(description.to_string()),
        enabled: true,
    }
}

/// The well-known Graph endpoints registered at boot. Seeding is
/// insert-if-missing by name, so operators can edit rows without the next
/// boot reverting them.
pub fn default_endpoints() -> Vec<EndpointInput> {
    vec![
        // Teams
        endpoint(
            "Teams - send channel message",
            "teams",
            "teams/{team_id}/channels/{channel_id}/messages",
            "POST",
            true,
            "Post a message to a Teams channel",
        ),
        endpoint(
            "Teams - send chat message",
            "teams",
            "chats/{chat_id}/messages",
            "POST",
            true,
            "Post a message to a Teams chat",
        ),
        endpoint(
            "Teams - list joined teams",
            "teams",
            "me/joinedTeams",
            "GET",
            false,
            "Teams the signed-in identity has joined",
        ),
        endpoint(
            "Teams - list channels",
            "teams",
            "teams/{team_id}/channels",
            "GET",
            false,
            "Channels of a team",
        ),
        // Outlook
        endpoint(
            "Outlook - send mail",
            "outlook",
            "me/sendMail",
            "POST",
            true,
            "Send a mail message",
        ),
        endpoint(
            "Outlook - inbox messages",
            "outlook",
            "me/mailFolders/inbox/messages",
            "GET",
            false,
            "Messages in the inbox folder",
        ),
        endpoint(
            "Outlook - list mail folders",
            "outlook",
            "me/mailFolders",
            "GET",
            false,
            "All mail folders",
        ),
        // SharePoint
        endpoint(
            "SharePoint - get site",
            "sharepoint",
            "sites/{site_id}",
            "GET",
            false,
            "Site metadata",
        ),
        endpoint(
            "SharePoint - list site lists",
            "sharepoint",
            "sites/{site_id}/lists",
            "GET",
            false,
            "Lists of a site",
        ),
        endpoint(
            "SharePoint - get list items",
            "sharepoint",
            "sites/{site_id}/lists/{list_id}/items",
            "GET",
            false,
            "Items of a list",
        ),
        endpoint(
            "SharePoint - upload file",
            "sharepoint",
            "sites/{site_id}/drives/{drive_id}/root:/{file_path}:/content",
            "PUT",
            true,
            "Upload file content to a drive path",
        ),
        endpoint(
            "SharePoint - list drives",
            "sharepoint",
            "sites/{site_id}/drives",
            "GET",
            false,
            "Document libraries of a site",
        ),
        // Graph generic
        endpoint(
            "Graph - current user",
            "graph",
            "me",
            "GET",
            false,
            "Profile of the signed-in identity",
        ),
        endpoint(
            "Graph - list users",
            "graph",
            "users",
            "GET",
            false,
            "Users in the organization",
        ),
    ]
}
