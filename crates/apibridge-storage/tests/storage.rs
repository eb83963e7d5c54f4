use apibridge_storage::{BridgeStorage, CallLogInput, CredentialInput, EndpointInput};
use serde_json::json;

async fn storage() -> BridgeStorage {
    let storage = BridgeStorage::connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    storage.sync().await.expect("schema sync");
    storage
}

fn kintone_credential(name: &str, enabled: bool) -> CredentialInput {
    CredentialInput {
        provider: "kintone".to_string(),
        name: Some(name.to_string()),
        settings: Some(json!({ "subdomain": "acme" })),
        secret: json!({ "kind": "kintone_api_token", "api_token": "tok" }),
        enabled,
    }
}

#[tokio::test]
async fn newest_active_credential_prefers_latest_and_skips_disabled() {
    let storage = storage().await;

    let first = storage
        .insert_credential(kintone_credential("old", true))
        .await
        .unwrap();
    let second = storage
        .insert_credential(kintone_credential("new", true))
        .await
        .unwrap();
    let disabled = storage
        .insert_credential(kintone_credential("off", false))
        .await
        .unwrap();
    assert!(first < second && second < disabled);

    let resolved = storage
        .newest_active_credential("kintone")
        .await
        .unwrap()
        .expect("one active credential");
    assert_eq!(resolved.id, second);
    assert!(resolved.enabled);

    assert!(storage
        .newest_active_credential("graph")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn update_credential_secret_persists_new_token_material() {
    let storage = storage().await;
    let id = storage
        .insert_credential(CredentialInput {
            provider: "graph".to_string(),
            name: None,
            settings: None,
            secret: json!({
                "kind": "graph",
                "client_id": "c",
                "client_secret": "s",
                "tenant_id": "t",
            }),
            enabled: true,
        })
        .await
        .unwrap();

    let refreshed = json!({
        "kind": "graph",
        "client_id": "c",
        "client_secret": "s",
        "tenant_id": "t",
        "access_token": "fresh",
        "expires_at": 1_900_000_000i64,
    });
    storage
        .update_credential_secret(id, refreshed.clone())
        .await
        .unwrap();

    let row = storage.find_credential(id).await.unwrap().unwrap();
    assert_eq!(row.secret, refreshed);
}

#[tokio::test]
async fn ensure_endpoints_is_idempotent() {
    let storage = storage().await;
    let defaults = vec![EndpointInput {
        name: "Teams - channel message".to_string(),
        service: "teams".to_string(),
        path: "teams/{team_id}/channels/{channel_id}/messages".to_string(),
        method: "POST".to_string(),
        requires_body: true,
        description: None,
        enabled: true,
    }];

    storage.ensure_endpoints(&defaults).await.unwrap();
    storage.ensure_endpoints(&defaults).await.unwrap();

    let matched = storage
        .match_endpoint("teams", "messages")
        .await
        .unwrap()
        .expect("seeded endpoint");
    assert_eq!(matched.total_calls, 0);
    assert!(matched.last_called.is_none());
}

#[tokio::test]
async fn touch_endpoint_increments_counter_and_stamps_last_called() {
    let storage = storage().await;
    let id = storage
        .insert_endpoint(EndpointInput {
            name: "Outlook - send".to_string(),
            service: "outlook".to_string(),
            path: "me/sendMail".to_string(),
            method: "POST".to_string(),
            requires_body: true,
            description: None,
            enabled: true,
        })
        .await
        .unwrap();

    let before = time::OffsetDateTime::now_utc();
    for _ in 0..3 {
        storage.touch_endpoint(id).await.unwrap();
    }

    let endpoint = storage.find_endpoint(id).await.unwrap().unwrap();
    assert_eq!(endpoint.total_calls, 3);
    assert!(endpoint.last_called.expect("stamped") >= before);

    // Touching a missing id is a silent no-op.
    storage.touch_endpoint(id + 100).await.unwrap();
}

#[tokio::test]
async fn call_logs_are_append_only_and_listed_newest_first() {
    let storage = storage().await;
    for (status, code) in [("success", Some(200)), ("failed", Some(404)), ("error", None)] {
        storage
            .insert_call_log(CallLogInput {
                provider: "graph".to_string(),
                credential_id: None,
                endpoint_id: None,
                app_id: None,
                action: "other".to_string(),
                request_method: "GET".to_string(),
                request_url: "https://graph.microsoft.com/v1.0/me".to_string(),
                request_body: None,
                request_headers: None,
                status_code: code,
                response_body: None,
                response_time: code.map(|_| 0.25),
                status: status.to_string(),
                error_message: None,
                acting_user: None,
            })
            .await
            .unwrap();
    }

    assert_eq!(storage.count_call_logs().await.unwrap(), 3);
    let (items, pages) = storage.list_call_logs(1, 2).await.unwrap();
    assert_eq!(pages, 2);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].status, "error");
}
