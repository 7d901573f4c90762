//! Integration tests for the health and admin HTTP endpoints.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{TestRelay, drain};
use relay_core::types::{Role, UserId};

#[tokio::test]
async fn test_health_check() {
    let relay = TestRelay::new();
    let _alice = relay.connect("alice").await;
    let app = relay.app();

    let response = app.request("GET", "/api/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["connections"], 1);
    assert_eq!(response.body["data"]["online_users"], 1);
}

#[tokio::test]
async fn test_system_status_requires_admin() {
    let relay = TestRelay::new();
    let app = relay.app();

    let anonymous = app
        .request("GET", "/api/admin/system-status", None, None)
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let user_token = relay.token("alice", Role::User);
    let user = app
        .request("GET", "/api/admin/system-status", None, Some(&user_token))
        .await;
    assert_eq!(user.status, StatusCode::FORBIDDEN);
    assert_eq!(user.body["error"], "FORBIDDEN");

    let bad = app
        .request("GET", "/api/admin/system-status", None, Some("garbage"))
        .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_system_status_reports_sessions_and_plugins() {
    let relay = TestRelay::new();
    relay
        .load(std::sync::Arc::new(plugin_builtin::BuiltinPlugin::new()))
        .await;
    let _alice = relay.connect("alice").await;
    let _bob = relay.connect("bob").await;
    let app = relay.app();

    let token = relay.token("root", Role::Admin);
    let response = app
        .request("GET", "/api/admin/system-status", None, Some(&token))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let data = &response.body["data"];
    assert_eq!(data["connections"], 2);
    let users: Vec<&str> = data["sessions"]
        .as_array()
        .expect("sessions is an array")
        .iter()
        .filter_map(|s| s["user_id"].as_str())
        .collect();
    assert_eq!(users, vec!["alice", "bob"]);
    assert_eq!(data["metrics"]["connections_accepted"], 2);
    assert_eq!(data["plugins"][0]["descriptor"]["name"], "builtin");
    assert_eq!(data["plugins"][0]["state"], "active");
}

#[tokio::test]
async fn test_kick_user() {
    let relay = TestRelay::new();
    let alice = relay.connect("alice").await;
    let bob = relay.connect("bob").await;
    drain(&alice);
    let app = relay.app();
    let token = relay.token("root", Role::Admin);

    let response = app
        .request(
            "POST",
            "/api/admin/kick-user",
            Some(json!({ "user_id": "bob", "reason": "spamming" })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["closed"], 1);
    assert_eq!(
        drain(&bob).close,
        Some((4001, "Kicked: spamming".to_string()))
    );
    assert!(!relay.engine.sessions.is_online(&UserId::from("bob")));
    assert_eq!(drain(&alice).messages.len(), 1, "alice sees bob leave");
}

#[tokio::test]
async fn test_kick_user_errors() {
    let relay = TestRelay::new();
    let app = relay.app();
    let admin = relay.token("root", Role::Admin);

    let offline = app
        .request(
            "POST",
            "/api/admin/kick-user",
            Some(json!({ "user_id": "ghost" })),
            Some(&admin),
        )
        .await;
    assert_eq!(offline.status, StatusCode::NOT_FOUND);
    assert_eq!(offline.body["message"], "User ghost is not online");

    let blank = app
        .request(
            "POST",
            "/api/admin/kick-user",
            Some(json!({ "user_id": "  " })),
            Some(&admin),
        )
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let user = relay.token("alice", Role::User);
    let forbidden = app
        .request(
            "POST",
            "/api/admin/kick-user",
            Some(json!({ "user_id": "bob" })),
            Some(&user),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}
