//! End-to-end request behaviour against scripted fakes.

mod common;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpMethod, HttpResponse};
use bridge_traits::native::NativeBridge;
use bridge_traits::time::ManualClock;
use chrono::{TimeZone, Utc};
use common::{harness, harness_with, BASE_URL};
use core_client::{ApiClient, ClientError, RequestOrigin, UploadFile};
use core_runtime::events::{
    AuthEvent, BridgeEvent, ClientEvent, EventBus, EventStream, NoticeLevel, RequestEvent,
};
use mockall::mock;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn notices(stream: &mut EventStream) -> Vec<String> {
    stream
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::Notice(notice) if notice.level == NoticeLevel::Error => {
                Some(notice.message)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_read_is_served_from_cache_when_network_fails() {
    let h = harness();
    let mut stream = EventStream::new(h.events.subscribe());
    let tasks = json!([{"id": 1, "title": "X"}]);
    h.http.respond(HttpMethod::Get, "/tasks", 200, &tasks);

    assert_eq!(h.api.get("/tasks").await.unwrap(), tasks);
    assert_eq!(h.api.cache().get("/tasks").await, Some(tasks.clone()));

    h.http.set_down(true);
    assert_eq!(h.api.get("/tasks").await.unwrap(), tasks);

    let events = stream.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        ClientEvent::Request(RequestEvent::ServedFromCache { path, .. }) if path == "/tasks"
    )));
    assert!(!events.iter().any(|e| matches!(e, ClientEvent::Notice(_))));
}

#[tokio::test]
async fn test_server_error_on_cached_read_is_recovered() {
    let h = harness();
    h.http.respond(HttpMethod::Get, "/habits", 200, &json!(["read"]));
    h.api.get("/habits").await.unwrap();

    h.http
        .respond_raw(HttpMethod::Get, "/habits", HttpResponse::new(502, "").with_reason("Bad Gateway"));
    assert_eq!(h.api.get("/habits").await.unwrap(), json!(["read"]));
}

#[tokio::test]
async fn test_uncached_read_failure_is_not_an_auth_error() {
    let h = harness();
    h.http.set_down(true);

    let err = h.api.get("/habits").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert!(!matches!(err, ClientError::Unauthorized { .. }));
}

#[tokio::test]
async fn test_known_offline_fails_fast_and_silently() {
    let h = harness();
    let mut stream = EventStream::new(h.events.subscribe());
    h.network.set_offline(true);

    let err = h.api.get("/journal").await.unwrap_err();
    assert!(matches!(err, ClientError::Connectivity));
    assert_eq!(err.to_string(), "Offline: No internet connection.");
    assert!(h.http.requests().is_empty());
    assert!(notices(&mut stream).is_empty());
}

#[tokio::test]
async fn test_login_token_is_attached_to_later_requests() {
    let h = harness();
    let mut stream = EventStream::new(h.events.subscribe());
    h.http.respond(
        HttpMethod::Post,
        "/auth/login",
        200,
        &json!({"status": "success", "data": {"token": "abc123", "is_admin": true}}),
    );
    h.http.respond(HttpMethod::Get, "/protected", 200, &json!({"ok": true}));

    let credentials = h.api.login("ada", "hunter2").await.unwrap();
    assert!(credentials.is_admin);
    assert!(h.api.tokens().is_admin().await);

    let login = h.http.last_request().unwrap();
    assert_eq!(login.authorization(), None);
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(login.body.as_ref().unwrap()).unwrap(),
        json!({"username": "ada", "password": "hunter2"})
    );

    h.api.get("/protected").await.unwrap();
    let request = h.http.last_request().unwrap();
    assert_eq!(request.authorization(), Some("Bearer abc123"));
    assert_eq!(
        request.headers.get("Content-Type").map(String::as_str),
        Some("application/json")
    );
    assert!(request.body.is_none());

    let events = stream.drain();
    assert!(events.contains(&ClientEvent::Auth(AuthEvent::SignedIn { is_admin: true })));
    assert!(events.iter().any(|e| matches!(
        e,
        ClientEvent::Notice(n) if n.level == NoticeLevel::Success && n.message == "Login successful"
    )));
}

#[tokio::test]
async fn test_logout_stops_sending_the_header() {
    let h = harness();
    h.http.respond(HttpMethod::Get, "/protected", 200, &json!({}));
    h.api.tokens().set_token("abc123").await.unwrap();
    h.api.get("/protected").await.unwrap();
    assert_eq!(
        h.http.last_request().unwrap().authorization(),
        Some("Bearer abc123")
    );

    h.api.tokens().set_token("rotated").await.unwrap();
    h.api.get("/protected").await.unwrap();
    assert_eq!(
        h.http.last_request().unwrap().authorization(),
        Some("Bearer rotated")
    );

    h.api.logout().await.unwrap();
    h.api.get("/protected").await.unwrap();
    assert_eq!(h.http.last_request().unwrap().authorization(), None);
    assert!(!h.api.tokens().is_logged_in().await);
}

#[tokio::test]
async fn test_unauthorized_propagates_even_when_cached() {
    let h = harness();
    h.http.respond(HttpMethod::Get, "/tasks", 200, &json!([1]));
    h.api.get("/tasks").await.unwrap();

    let mut stream = EventStream::new(h.events.subscribe());
    h.http
        .respond(HttpMethod::Get, "/tasks", 401, &json!({"detail": "Token expired"}));

    match h.api.get("/tasks").await {
        Err(ClientError::Unauthorized { message }) => assert_eq!(message, "Token expired"),
        other => panic!("expected Unauthorized, got {:?}", other),
    }
    assert_eq!(notices(&mut stream), vec!["Token expired".to_string()]);

    let err = h
        .api
        .request_with(RequestOrigin::Background, HttpMethod::Get, "/tasks", None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(notices(&mut stream).is_empty());

    // Failing requests never clear the token.
    h.api.tokens().set_token("abc123").await.unwrap();
    let _ = h.api.get("/tasks").await;
    assert!(h.api.tokens().is_logged_in().await);
}

#[tokio::test]
async fn test_failed_write_is_never_served_from_cache() {
    let h = harness();
    h.http.respond(HttpMethod::Get, "/tasks", 200, &json!([{"id": 7}]));
    h.http.respond(HttpMethod::Get, "/tasks/7", 200, &json!({"id": 7}));
    h.api.get("/tasks").await.unwrap();
    h.api.get("/tasks/7").await.unwrap();

    h.network.set_offline(true);
    let err = h
        .api
        .put("/tasks/7", &json!({"done": true}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Connectivity));

    h.network.set_offline(false);
    h.http.set_down(true);
    assert!(h.api.delete("/tasks/7").await.is_err());

    h.http.set_down(false);
    h.http.respond(
        HttpMethod::Put,
        "/tasks/7",
        500,
        &json!({"detail": "Database locked"}),
    );
    match h.api.put("/tasks/7", &json!({"done": true})).await {
        Err(ClientError::Http { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Database locked");
        }
        other => panic!("expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_write_body_is_json_and_reads_carry_none() {
    let h = harness();
    h.http
        .respond(HttpMethod::Post, "/tasks", 201, &json!({"id": 8, "title": "Y"}));

    let created = h.api.post("/tasks", &json!({"title": "Y"})).await.unwrap();
    assert_eq!(created["id"], 8);

    let request = h.http.last_request().unwrap();
    assert_eq!(request.url, format!("{}/tasks", BASE_URL));
    assert_eq!(request.body.as_deref(), Some(br#"{"title":"Y"}"#.as_slice()));

    // Writes are not cached.
    assert_eq!(h.api.cache().get("/tasks").await, None);
}

#[tokio::test]
async fn test_non_json_and_empty_bodies() {
    let h = harness();
    h.http
        .respond_raw(HttpMethod::Get, "/health", HttpResponse::new(200, "pong"));
    h.http
        .respond_raw(HttpMethod::Delete, "/tasks/7", HttpResponse::new(204, ""));

    assert_eq!(h.api.get("/health").await.unwrap(), json!("pong"));
    assert_eq!(h.api.delete("/tasks/7").await.unwrap(), serde_json::Value::Null);
}

#[tokio::test]
async fn test_get_json_decodes_payload() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Task {
        id: u32,
        title: String,
    }

    let h = harness();
    h.http
        .respond(HttpMethod::Get, "/tasks", 200, &json!([{"id": 1, "title": "X"}]));

    let tasks: Vec<Task> = h.api.get_json("/tasks").await.unwrap();
    assert_eq!(
        tasks,
        vec![Task {
            id: 1,
            title: "X".to_string()
        }]
    );
}

#[tokio::test]
async fn test_setup_accepts_bare_token_and_login_rejects_unknown_shape() {
    let h = harness();
    h.http
        .respond(HttpMethod::Post, "/auth/setup", 200, &json!({"token": "first"}));
    h.http
        .respond(HttpMethod::Post, "/auth/login", 200, &json!({"welcome": true}));

    let credentials = h.api.setup("ada", "hunter2").await.unwrap();
    assert_eq!(credentials.token, "first");
    assert!(!credentials.is_admin);

    h.api.logout().await.unwrap();
    let err = h.api.login("ada", "hunter2").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
    assert!(!h.api.tokens().is_logged_in().await);
}

#[tokio::test]
async fn test_upload_uses_multipart_and_reports_detail() {
    let h = harness();
    let mut stream = EventStream::new(h.events.subscribe());
    h.api.tokens().set_token("abc123").await.unwrap();
    h.http
        .respond(HttpMethod::Post, "/journal/attachments", 200, &json!({"id": "f1"}));

    let file = UploadFile::new("receipt.png", vec![1u8, 2, 3]).with_content_type("image/png");
    let uploaded = h.api.upload("/journal/attachments", file.clone()).await.unwrap();
    assert_eq!(uploaded, json!({"id": "f1"}));

    let request = h.http.last_request().unwrap();
    let part = request.multipart.as_ref().unwrap();
    assert_eq!(part.field, "file");
    assert_eq!(part.file_name, "receipt.png");
    assert_eq!(part.content_type.as_deref(), Some("image/png"));
    assert_eq!(request.authorization(), Some("Bearer abc123"));
    assert!(request.body.is_none());

    h.http.respond(
        HttpMethod::Post,
        "/journal/attachments",
        413,
        &json!({"detail": "File too large"}),
    );
    match h.api.upload("/journal/attachments", file.clone()).await {
        Err(ClientError::Upload { status, message }) => {
            assert_eq!(status, 413);
            assert_eq!(message, "File too large");
        }
        other => panic!("expected Upload error, got {:?}", other),
    }

    h.http.respond(HttpMethod::Post, "/journal/attachments", 500, &json!({}));
    let err = h.api.upload("/journal/attachments", file).await.unwrap_err();
    assert_eq!(err.to_string(), "Upload failed");

    assert_eq!(
        notices(&mut stream),
        vec!["File too large".to_string(), "Upload failed".to_string()]
    );
}

#[tokio::test]
async fn test_stale_cache_is_not_served_when_max_age_is_set() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    ));
    let h = harness_with(|builder| {
        builder
            .clock(clock.clone())
            .offline_cache_max_age(Duration::from_secs(3600))
    });
    h.http.respond(HttpMethod::Get, "/finance/summary", 200, &json!({"total": 10}));
    h.api.get("/finance/summary").await.unwrap();

    h.http.set_down(true);
    clock.advance(Duration::from_secs(1800));
    assert_eq!(
        h.api.get("/finance/summary").await.unwrap(),
        json!({"total": 10})
    );

    clock.advance(Duration::from_secs(3600));
    assert!(h.api.get("/finance/summary").await.is_err());
}

mock! {
    pub Shell {}

    #[async_trait]
    impl NativeBridge for Shell {
        async fn log_offline_action(&self, method: &str, path: &str, body: &str) -> BridgeResult<()>;
        async fn save_auth_token(&self, token: &str) -> BridgeResult<()>;
        async fn get_auth_token(&self) -> BridgeResult<Option<String>>;
        async fn clear_auth_token(&self) -> BridgeResult<()>;
    }
}

#[tokio::test]
async fn test_bridge_failure_never_fails_the_request() {
    let mut shell = MockShell::new();
    shell
        .expect_log_offline_action()
        .withf(|method, path, body| {
            method.to_string() == "PUT"
                && path.to_string() == "/tasks/7"
                && body.to_string() == r#"{"done":true}"#
        })
        .times(2)
        .returning(|_, _, _| Err(BridgeError::OperationFailed("journal locked".to_string())));
    shell.expect_get_auth_token().returning(|| Ok(None));

    let h = harness_with(|builder| {
        builder
            .native_bridge(Arc::new(shell))
            .bridge_retry(bridge_traits::RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                use_exponential_backoff: true,
            })
    });
    let mut stream = EventStream::new(h.events.subscribe());
    h.http.respond(HttpMethod::Put, "/tasks/7", 200, &json!({"id": 7, "done": true}));
    h.http.respond(HttpMethod::Get, "/tasks", 200, &json!([]));

    let updated = h.api.put("/tasks/7", &json!({"done": true})).await.unwrap();
    assert_eq!(updated["done"], true);
    // Reads are never journaled.
    h.api.get("/tasks").await.unwrap();

    h.api.bridge().flush().await;
    let stats = h.api.bridge().delivery_stats();
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.dropped, 1);

    let dropped: Vec<ClientEvent> = stream
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::Bridge(BridgeEvent::ActionDropped { .. })))
        .collect();
    assert_eq!(dropped.len(), 1);
}

#[tokio::test]
async fn test_login_mirrors_token_to_bridge() {
    let mut shell = MockShell::new();
    shell
        .expect_save_auth_token()
        .withf(|token| token.to_string() == "abc123")
        .times(1)
        .returning(|_| Ok(()));
    shell.expect_log_offline_action().returning(|_, _, _| Ok(()));
    shell.expect_get_auth_token().returning(|| Ok(None));

    let h = harness_with(|builder| builder.native_bridge(Arc::new(shell)));
    h.http.respond(
        HttpMethod::Post,
        "/auth/login",
        200,
        &json!({"access_token": "abc123", "is_admin": false}),
    );

    h.api.login("ada", "hunter2").await.unwrap();
    h.api.bridge().flush().await;
    assert_eq!(h.api.bridge().delivery_stats().delivered, 1);
}

#[tokio::test]
async fn test_token_restored_from_bridge_is_used() {
    let mut shell = MockShell::new();
    shell
        .expect_get_auth_token()
        .times(1)
        .returning(|| Ok(Some("from-shell".to_string())));

    let h = harness_with(|builder| builder.native_bridge(Arc::new(shell)));
    h.http.respond(HttpMethod::Get, "/protected", 200, &json!({}));

    h.api.get("/protected").await.unwrap();
    h.api.get("/protected").await.unwrap();

    let requests = h.http.requests_to(HttpMethod::Get, "/protected");
    assert!(requests
        .iter()
        .all(|r| r.authorization() == Some("Bearer from-shell")));
    assert_eq!(
        h.settings.raw(core_auth::TOKEN_KEY),
        Some("from-shell".to_string())
    );
}

#[tokio::test]
async fn test_logout_survives_a_bridge_that_cannot_clear() {
    let mut shell = MockShell::new();
    shell.expect_save_auth_token().returning(|_| Ok(()));
    shell
        .expect_clear_auth_token()
        .times(1)
        .returning(|| Err(BridgeError::NotAvailable("keychain locked".to_string())));
    // The shell keeps answering the old token after the failed clear.
    shell
        .expect_get_auth_token()
        .returning(|| Ok(Some("abc123".to_string())));
    shell
        .expect_log_offline_action()
        .withf(|method, path, body| {
            method.to_string() == "POST"
                && path.to_string() == "/auth/login"
                && !body.contains("hunter2")
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let h = harness_with(|builder| builder.native_bridge(Arc::new(shell)));
    h.http.respond(
        HttpMethod::Post,
        "/auth/login",
        200,
        &json!({"access_token": "abc123", "is_admin": false}),
    );
    h.http.respond(HttpMethod::Get, "/protected", 200, &json!({}));

    h.api.login("ada", "hunter2").await.unwrap();
    h.api.logout().await.unwrap();
    h.api.get("/protected").await.unwrap();

    assert_eq!(h.http.last_request().unwrap().authorization(), None);
    assert!(!h.api.tokens().is_logged_in().await);
    assert_eq!(h.settings.raw(core_auth::TOKEN_KEY), None);

    h.api.bridge().flush().await;
    assert_eq!(h.api.bridge().delivery_stats().delivered, 1);
}

#[tokio::test]
async fn test_clients_sharing_a_bus_see_each_others_events() {
    let h = harness();
    let events = EventBus::new(8);
    let other = ApiClient::new(
        h.api.config(),
        h.api.tokens().clone(),
        h.api.cache().clone(),
        h.api.bridge().clone(),
        events.clone(),
    );
    let mut stream = EventStream::new(events.subscribe());

    h.http.set_down(true);
    let _ = other.get("/tasks").await;
    assert_eq!(notices(&mut stream).len(), 1);
}
