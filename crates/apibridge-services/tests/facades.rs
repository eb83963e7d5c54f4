use apibridge_services::{GraphService, KintoneService, default_endpoints};
use apibridge_storage::{AppInput, BridgeStorage, CredentialInput};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn storage() -> BridgeStorage {
    let storage = BridgeStorage::connect("sqlite::memory:").await.unwrap();
    storage.sync().await.unwrap();
    storage
}

async fn graph_credential(storage: &BridgeStorage, server_uri: &str) -> i64 {
    // Token valid for an hour, so no exchange happens in these tests.
    let expires = time::OffsetDateTime::now_utc().unix_timestamp() + 3600;
    storage
        .insert_credential(CredentialInput {
            provider: "graph".to_string(),
            name: Some("test".to_string()),
            settings: Some(json!({
                "authority": server_uri,
                "resource_base": format!("{server_uri}/v1.0"),
            })),
            secret: json!({
                "kind": "graph",
                "client_id": "c",
                "client_secret": "s",
                "tenant_id": "t",
                "access_token": "cached",
                "expires_at": expires,
            }),
            enabled: true,
        })
        .await
        .unwrap()
}

async fn kintone_credential(storage: &BridgeStorage, server_uri: &str) -> i64 {
    storage
        .insert_credential(CredentialInput {
            provider: "kintone".to_string(),
            name: None,
            settings: Some(json!({ "subdomain": "acme", "base_url": server_uri })),
            secret: json!({ "kind": "kintone_api_token", "api_token": "tok" }),
            enabled: true,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn channel_message_hits_the_teams_path_with_the_wrapped_body() {
    let storage = storage().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1.0/teams/T1/channels/C1/messages"))
        .and(body_json(json!({ "body": { "content": "hello" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "m1" })))
        .expect(1)
        .mount(&server)
        .await;

    let id = graph_credential(&storage, &server.uri()).await;
    let mut graph = GraphService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap();
    let value = graph.send_channel_message("T1", "C1", "hello").await.unwrap();
    assert_eq!(value["id"], "m1");
}

#[tokio::test]
async fn send_mail_builds_recipients_and_content_type() {
    let storage = storage().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1.0/me/sendMail"))
        .and(body_json(json!({
            "message": {
                "subject": "hi",
                "body": { "contentType": "Text", "content": "plain" },
                "toRecipients": [
                    { "emailAddress": { "address": "a@example.com" } }
                ],
                "ccRecipients": [
                    { "emailAddress": { "address": "b@example.com" } }
                ],
            }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let id = graph_credential(&storage, &server.uri()).await;
    let mut graph = GraphService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap();
    let to = vec!["a@example.com".to_string()];
    let cc = vec!["b@example.com".to_string()];
    let value = graph
        .send_mail(&to, "hi", "plain", Some(&cc), false)
        .await
        .unwrap();
    assert!(value.is_null());
}

#[tokio::test]
async fn list_messages_passes_the_top_query_param() {
    let storage = storage().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me/mailFolders/archive/messages"))
        .and(query_param("$top", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let id = graph_credential(&storage, &server.uri()).await;
    let mut graph = GraphService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap();
    graph.list_messages("archive", 25).await.unwrap();
}

#[tokio::test]
async fn seeded_endpoint_is_attributed_on_graph_calls() {
    let storage = storage().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/me/joinedTeams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    storage.ensure_endpoints(&default_endpoints()).await.unwrap();
    let id = graph_credential(&storage, &server.uri()).await;
    let mut graph = GraphService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap()
        .acting_user(Some("ops".to_string()));
    graph.list_joined_teams().await.unwrap();

    let (logs, _) = storage.list_call_logs(1, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    let endpoint_id = logs[0].endpoint_id.expect("endpoint attributed");
    let endpoint = storage.find_endpoint(endpoint_id).await.unwrap().unwrap();
    assert_eq!(endpoint.name, "Teams - list joined teams");
    assert_eq!(endpoint.total_calls, 1);
    assert_eq!(logs[0].acting_user.as_deref(), Some("ops"));
}

#[tokio::test]
async fn get_records_serializes_query_fields_and_total_count() {
    let storage = storage().await;
    let server = MockServer::start().await;

    let check = |request: &Request| {
        let pairs: Vec<(String, String)> = request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let fields: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| k == "fields")
            .map(|(_, v)| v.as_str())
            .collect();
        pairs.contains(&("app".to_string(), "7".to_string()))
            && pairs.contains(&("query".to_string(), "status = \"open\"".to_string()))
            && fields == ["title", "status"]
            && pairs.contains(&("totalCount".to_string(), "true".to_string()))
    };
    Mock::given(method("GET"))
        .and(path("/k/v1/records.json"))
        .and(move |request: &Request| check(request))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let id = kintone_credential(&storage, &server.uri()).await;
    let mut kintone = KintoneService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap();
    let fields = vec!["title".to_string(), "status".to_string()];
    kintone
        .get_records("7", Some("status = \"open\""), Some(&fields), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn update_record_forwards_the_revision_when_given() {
    let storage = storage().await;
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/k/v1/record.json"))
        .and(body_json(json!({
            "app": "7",
            "id": "12",
            "record": { "title": { "value": "new" } },
            "revision": "3",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "revision": "4" })))
        .expect(1)
        .mount(&server)
        .await;

    let id = kintone_credential(&storage, &server.uri()).await;
    let mut kintone = KintoneService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap();
    let value = kintone
        .update_record("7", "12", json!({ "title": { "value": "new" } }), Some("3"))
        .await
        .unwrap();
    assert_eq!(value["revision"], "4");
}

#[tokio::test]
async fn delete_records_sends_ids_in_the_body() {
    let storage = storage().await;
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/k/v1/records.json"))
        .and(body_json(json!({ "app": "7", "ids": ["1", "2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let id = kintone_credential(&storage, &server.uri()).await;
    let mut kintone = KintoneService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap();
    kintone
        .delete_records("7", &["1".to_string(), "2".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn registered_app_is_attributed_and_touched() {
    let storage = storage().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/k/v1/record.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "record": {} })))
        .mount(&server)
        .await;

    let credential_id = kintone_credential(&storage, &server.uri()).await;
    let app_id = storage
        .insert_app(AppInput {
            credential_id,
            app_code: "7".to_string(),
            name: "Tickets".to_string(),
            description: None,
            enabled: true,
        })
        .await
        .unwrap();

    let mut kintone = KintoneService::connect(storage.clone(), Some(credential_id), None)
        .await
        .unwrap();
    kintone.get_record("7", "1").await.unwrap();

    let (logs, _) = storage.list_call_logs(1, 10).await.unwrap();
    assert_eq!(logs[0].app_id, Some(app_id));
    assert_eq!(logs[0].action, "get_record");
    let app = storage.find_app(credential_id, "7").await.unwrap().unwrap();
    assert_eq!(app.total_requests, 1);
    assert!(app.last_accessed.is_some());
}

#[tokio::test]
async fn drive_upload_puts_bytes_to_the_content_path() {
    let storage = storage().await;
    let server = MockServer::start().await;

    let is_octet_stream = |request: &Request| {
        request
            .headers
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == "application/octet-stream")
            && request.body == b"quarterly numbers"
    };
    Mock::given(method("PUT"))
        .and(path("/v1.0/sites/S1/drives/D1/root:/reports/q3.txt:/content"))
        .and(move |request: &Request| is_octet_stream(request))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "item9" })))
        .expect(1)
        .mount(&server)
        .await;

    storage.ensure_endpoints(&default_endpoints()).await.unwrap();
    let id = graph_credential(&storage, &server.uri()).await;
    let mut graph = GraphService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap();
    let value = graph
        .upload_drive_file("S1", "D1", "reports/q3.txt", b"quarterly numbers".to_vec())
        .await
        .unwrap();
    assert_eq!(value["id"], "item9");

    let (logs, _) = storage.list_call_logs(1, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "success");
    assert_eq!(logs[0].action, "upload_drive_file");
    let endpoint_id = logs[0].endpoint_id.expect("endpoint attributed");
    let endpoint = storage.find_endpoint(endpoint_id).await.unwrap().unwrap();
    assert_eq!(endpoint.name, "SharePoint - upload file");
}

#[tokio::test]
async fn file_upload_is_multipart_and_returns_the_file_key() {
    let storage = storage().await;
    let server = MockServer::start().await;

    let is_multipart_with_file = |request: &Request| {
        let multipart = request
            .headers
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&request.body);
        multipart
            && body.contains("name=\"file\"")
            && body.contains("filename=\"notes.txt\"")
            && body.contains("meeting notes")
    };
    Mock::given(method("POST"))
        .and(path("/k/v1/file.json"))
        .and(move |request: &Request| is_multipart_with_file(request))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "fileKey": "fk-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let id = kintone_credential(&storage, &server.uri()).await;
    let mut kintone = KintoneService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap();
    let value = kintone
        .upload_file("notes.txt", b"meeting notes".to_vec())
        .await
        .unwrap();
    assert_eq!(value["fileKey"], "fk-123");

    let (logs, _) = storage.list_call_logs(1, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "success");
    assert_eq!(logs[0].action, "upload_file");
    assert_eq!(logs[0].app_id, None);
}

#[tokio::test]
async fn facade_guest_space_applies_to_every_call() {
    let storage = storage().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/k/guest/9/v1/records.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let id = kintone_credential(&storage, &server.uri()).await;
    let mut kintone = KintoneService::connect(storage.clone(), Some(id), None)
        .await
        .unwrap()
        .guest_space(Some("9".to_string()));
    kintone.get_records("7", None, None, false).await.unwrap();
}
