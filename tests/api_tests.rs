mod common;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{PASSWORD, TestApp, test_app};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use unichat::{router::create_router, utils::error_codes};

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn login(app: &Router, username: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["resp_data"]["access_token"].as_str().unwrap().to_string()
}

fn router(app: &TestApp) -> Router {
    create_router(app.state.clone())
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let (status, body) = call(&router(&app), Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], error_codes::SUCCESS);
    assert_eq!(body["resp_data"]["status"], "ok");
}

#[tokio::test]
async fn register_verify_login_and_me() {
    let app = test_app();
    let api = router(&app);

    let (status, body) = call(
        &api,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "asha",
            "email": "asha@iitd.ac.in",
            "password": PASSWORD,
            "first_name": "Asha",
            "last_name": "Kumar"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["resp_data"]["verification_required"], true);

    let (status, body) = call(
        &api,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "asha", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], error_codes::EMAIL_NOT_VERIFIED);

    let token = app.mailer.token_for("asha@iitd.ac.in").unwrap();
    let (status, _) = call(
        &api,
        Method::POST,
        "/api/auth/verify-email",
        None,
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &api,
        Method::POST,
        "/api/auth/verify-email",
        None,
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::INVALID_TOKEN);

    let access = login(&api, "asha").await;
    let (status, body) = call(&api, Method::GET, "/api/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["username"], "asha");
    assert_eq!(body["resp_data"]["university_badge"], "IIT Delhi");
    assert!(body["resp_data"].get("password_hash").is_none());
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer_token() {
    let app = test_app();
    let api = router(&app);

    let (status, body) = call(&api, Method::GET, "/api/rooms/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], error_codes::AUTH_FAILED);

    let (status, _) = call(&api, Method::GET, "/api/rooms/mine", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejected_registration_reports_a_stable_code() {
    let app = test_app();
    let (status, body) = call(
        &router(&app),
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "outsider",
            "email": "outsider@gmail.com",
            "password": PASSWORD,
            "first_name": "Out",
            "last_name": "Sider"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::INVALID_DOMAIN);
    assert!(body.get("resp_data").is_none());
}

#[tokio::test]
async fn room_lifecycle_over_http() {
    let app = test_app();
    app.verified_user("asha", "asha@iitd.ac.in").await;
    app.verified_user("bilal", "bilal@iitd.ac.in").await;
    let api = router(&app);
    let asha = login(&api, "asha").await;
    let bilal = login(&api, "bilal").await;

    let (status, body) = call(
        &api,
        Method::POST,
        "/api/rooms",
        Some(&asha),
        Some(json!({ "name": "Algorithms", "room_type": "study_group", "max_members": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["resp_data"]["room_type"], "study_group");
    let room_id = body["resp_data"]["id"].as_i64().unwrap();

    let (status, body) = call(
        &api,
        Method::POST,
        &format!("/api/rooms/{room_id}/join"),
        Some(&bilal),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["resp_data"]["role"], "member");

    let (status, body) = call(
        &api,
        Method::POST,
        &format!("/api/rooms/{room_id}/join"),
        Some(&bilal),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], error_codes::ALREADY_MEMBER);

    let (status, body) = call(
        &api,
        Method::POST,
        &format!("/api/rooms/{room_id}/messages"),
        Some(&bilal),
        Some(json!({ "content": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["resp_data"]["message_type"], "text");

    let (status, body) = call(
        &api,
        Method::POST,
        &format!("/api/rooms/{room_id}/leave"),
        Some(&asha),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["succession"]["action"], "promoted");

    let (status, body) = call(
        &api,
        Method::GET,
        &format!("/api/rooms/{room_id}"),
        Some(&bilal),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["member_count"], 1);
    assert_eq!(body["resp_data"]["name"], "Algorithms");

    let (status, body) = call(
        &api,
        Method::GET,
        "/api/notifications?unread_only=true",
        Some(&bilal),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"].as_array().unwrap().len(), 1);

    let (status, body) = call(
        &api,
        Method::GET,
        "/api/rooms/4242",
        Some(&bilal),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], error_codes::NOT_FOUND);
}

#[tokio::test]
async fn deactivated_account_loses_access() {
    let app = test_app();
    app.verified_user("asha", "asha@iitd.ac.in").await;
    let api = router(&app);
    let token = login(&api, "asha").await;

    let (status, _) = call(&api, Method::POST, "/api/auth/deactivate", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&api, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], error_codes::ACCOUNT_DEACTIVATED);
}
