use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use relay_api::auth::create_token;
use relay_api::{AppState, AppStateInner, router};
use relay_core::EngineConfig;
use relay_db::Database;
use relay_types::events::GatewayEvent;
use relay_types::models::DisplayFields;

const SECRET: &str = "test-secret";
const OWNER: i64 = 1;

fn setup() -> (AppState, Router) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let config = EngineConfig {
        send_delay: Duration::ZERO,
        ..EngineConfig::default()
    };
    let state = AppStateInner::new(db, OWNER, SECRET.to_string(), config);
    let app = router(state.clone());
    (state, app)
}

fn token(user_id: i64, username: &str) -> String {
    let display = DisplayFields {
        username: Some(username.to_string()),
        ..DisplayFields::default()
    };
    create_token(SECRET, user_id, &display).unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_needs_no_token() {
    let (_, app) = setup();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let (_, app) = setup();
    let (status, _) = call(&app, Method::POST, "/start", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::POST, "/start", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn start_reports_role() {
    let (_, app) = setup();
    let (status, body) = call(&app, Method::POST, "/start", Some(&token(OWNER, "owner")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "owner");
    assert_eq!(body["user"]["username"], "owner");

    let (_, body) = call(&app, Method::POST, "/start", Some(&token(2, "bob")), None).await;
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn regular_user_cannot_compose() {
    let (_, app) = setup();
    let bob = token(2, "bob");
    call(&app, Method::POST, "/start", Some(&bob), None).await;

    let (status, body) = call(&app, Method::POST, "/compose", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");
}

#[tokio::test]
async fn compose_with_nobody_else_registered() {
    let (_, app) = setup();
    let owner = token(OWNER, "owner");
    call(&app, Method::POST, "/start", Some(&owner), None).await;

    let (status, body) = call(&app, Method::POST, "/compose", Some(&owner), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "no_recipients");
}

#[tokio::test]
async fn out_of_order_steps_conflict() {
    let (_, app) = setup();
    let owner = token(OWNER, "owner");
    call(&app, Method::POST, "/start", Some(&owner), None).await;
    call(&app, Method::POST, "/start", Some(&token(2, "bob")), None).await;

    let (status, _) = call(&app, Method::POST, "/compose/confirm", Some(&owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&app, Method::POST, "/compose", Some(&owner), None).await;
    let (status, body) = call(&app, Method::POST, "/compose/finish", Some(&owner), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "empty_selection");

    let (status, _) = call(&app, Method::POST, "/compose/cancel", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, "/compose", Some(&owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn broadcast_delivers_and_reports_back() {
    let (state, app) = setup();
    let owner = token(OWNER, "owner");
    call(&app, Method::POST, "/start", Some(&owner), None).await;
    call(&app, Method::POST, "/start", Some(&token(2, "bob")), None).await;
    call(&app, Method::POST, "/start", Some(&token(3, "carol")), None).await;

    // Owner and bob are online; carol is not.
    let (_, mut owner_rx) = state.dispatcher.register_user_channel(OWNER).await;
    let (_, mut bob_rx) = state.dispatcher.register_user_channel(2).await;

    let (status, body) = call(&app, Method::POST, "/compose", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["state"], "selecting_recipients");
    assert_eq!(body["candidates"].as_array().unwrap().len(), 2);

    call(&app, Method::POST, "/compose/recipients/2", Some(&owner), None).await;
    let (_, body) = call(&app, Method::POST, "/compose/recipients/3", Some(&owner), None).await;
    assert_eq!(body["recipients"], json!([2, 3]));

    let (_, body) = call(&app, Method::POST, "/compose/finish", Some(&owner), None).await;
    assert_eq!(body["state"], "entering_text");

    let (status, body) = call(&app, Method::POST, "/compose/text", Some(&owner), Some(json!({ "text": "hello" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sender_label"], "@owner");
    assert_eq!(body["recipient_count"], 2);

    let (status, body) = call(&app, Method::POST, "/compose/confirm", Some(&owner), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["recipient_count"], 2);

    let received = tokio::time::timeout(Duration::from_secs(2), bob_rx.recv())
        .await
        .unwrap()
        .unwrap();
    match received {
        GatewayEvent::MessageReceived { text, reply_to } => {
            assert_eq!(text, "Message from @owner\n\nhello");
            assert_eq!(reply_to, Some(OWNER));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let finished = tokio::time::timeout(Duration::from_secs(2), owner_rx.recv())
        .await
        .unwrap()
        .unwrap();
    match finished {
        GatewayEvent::BroadcastFinished { report } => {
            assert_eq!(report.total, 2);
            assert_eq!(report.successful, 1);
            assert_eq!(report.failed, 1);
            assert_eq!(report.failed_recipients, vec!["@carol".to_string()]);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let (_, stats) = call(&app, Method::GET, "/stats", Some(&owner), None).await;
    assert_eq!(stats["total_users"], 3);
    assert_eq!(stats["total_messages"], 1);
    assert_eq!(stats["total_broadcasts"], 1);
}

#[tokio::test]
async fn admin_routes_are_owner_only() {
    let (_, app) = setup();
    let owner = token(OWNER, "owner");
    let bob = token(2, "bob");
    call(&app, Method::POST, "/start", Some(&owner), None).await;
    call(&app, Method::POST, "/start", Some(&bob), None).await;

    for uri in ["/admin/users", "/admin/messages", "/admin/admins"] {
        let (status, _) = call(&app, Method::GET, uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    let (status, _) = call(&app, Method::POST, "/admin/admins/2", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::GET, "/admin/users", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn granted_admin_can_compose_until_revoked() {
    let (_, app) = setup();
    let owner = token(OWNER, "owner");
    let bob = token(2, "bob");
    call(&app, Method::POST, "/start", Some(&owner), None).await;
    call(&app, Method::POST, "/start", Some(&bob), None).await;

    let (status, body) = call(&app, Method::POST, "/admin/admins/2", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["done"], true);

    let (status, _) = call(&app, Method::POST, "/admin/admins/2", Some(&owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, Method::POST, "/compose", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, grants) = call(&app, Method::GET, "/admin/admins", Some(&owner), None).await;
    assert_eq!(grants[0]["user_id"], 2);
    assert_eq!(grants[0]["granted_by"], OWNER);

    let (status, _) = call(&app, Method::DELETE, "/admin/admins/2", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::POST, "/compose", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_cannot_be_granted_or_deleted() {
    let (_, app) = setup();
    let owner = token(OWNER, "owner");
    call(&app, Method::POST, "/start", Some(&owner), None).await;

    let (status, body) = call(&app, Method::POST, "/admin/admins/1", Some(&owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_subject");

    let (status, _) = call(&app, Method::DELETE, "/admin/users/1", Some(&owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::DELETE, "/admin/users/99", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deactivated_user_leaves_recipient_list() {
    let (_, app) = setup();
    let owner = token(OWNER, "owner");
    call(&app, Method::POST, "/start", Some(&owner), None).await;
    call(&app, Method::POST, "/start", Some(&token(2, "bob")), None).await;
    call(&app, Method::POST, "/start", Some(&token(3, "carol")), None).await;

    let (status, _) = call(&app, Method::POST, "/admin/users/3/deactivate", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, users) = call(&app, Method::GET, "/users", Some(&owner), None).await;
    let ids: Vec<i64> = users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2]);

    // Still visible to the owner's full listing.
    let (_, all) = call(&app, Method::GET, "/admin/users", Some(&owner), None).await;
    assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn confirm_from_unregistered_sender_is_rejected() {
    let (state, app) = setup();
    let owner = token(OWNER, "owner");
    // The owner never checks in, so the directory has no sender record.
    call(&app, Method::POST, "/start", Some(&token(2, "bob")), None).await;
    let (_, mut bob_rx) = state.dispatcher.register_user_channel(2).await;

    call(&app, Method::POST, "/compose", Some(&owner), None).await;
    call(&app, Method::POST, "/compose/recipients/2", Some(&owner), None).await;
    call(&app, Method::POST, "/compose/finish", Some(&owner), None).await;
    let (status, _) = call(&app, Method::POST, "/compose/text", Some(&owner), Some(json!({ "text": "hi" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::POST, "/compose/confirm", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_sender");

    let (status, body) = call(&app, Method::GET, "/compose", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "confirming");

    let (_, stats) = call(&app, Method::GET, "/stats", Some(&owner), None).await;
    assert_eq!(stats["total_broadcasts"], 0);
    assert!(bob_rx.try_recv().is_err());
}
