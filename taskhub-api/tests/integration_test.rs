/// Integration tests for the TaskHub API
///
/// These tests drive the full router over the in-memory store:
/// - Public sign-up and sign-in
/// - JWT authentication and correlation ids
/// - Error mapping (400, 401, 403, 404, 422, 503)
/// - Team, project and task flow

mod common;

use axum::http::{Method, StatusCode};
use common::TestContext;
use serde_json::json;
use taskhub_shared::auth::principal::SystemRole;
use uuid::Uuid;

#[tokio::test]
async fn test_health_reports_in_memory_store() {
    let ctx = TestContext::new();

    let res = ctx.request(Method::GET, "/health", None, None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["database"], "in_memory");
}

#[tokio::test]
async fn test_signup_then_login() {
    let ctx = TestContext::new();

    let res = ctx
        .request(
            Method::POST,
            "/v1/users",
            None,
            Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "Sup3r$ecret" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["email"], "ada@example.com");
    assert!(res.body.get("password_hash").is_none());

    let res = ctx
        .request(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "ADA@example.com", "password": "Sup3r$ecret" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["token_type"], "Bearer");
    assert_eq!(res.body["role"], "member");

    let token = res.body["access_token"].as_str().unwrap().to_string();
    let user_id = res.body["user_id"].as_str().unwrap().to_string();
    let res = ctx.get(&format!("/v1/users/{}/permissions", user_id), &token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!([]));
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let ctx = TestContext::new();
    ctx.request(
        Method::POST,
        "/v1/users",
        None,
        Some(json!({ "name": "Bo", "email": "bo@example.com", "password": "Sup3r$ecret" })),
    )
    .await;

    let res = ctx
        .request(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "bo@example.com", "password": "nope" })),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let ctx = TestContext::new();

    let res = ctx
        .request(Method::POST, "/v1/teams", None, Some(json!({ "name": "Core" })))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = ctx.post("/v1/teams", "not-a-token", json!({ "name": "Core" })).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_validation_failures_listed_by_field() {
    let ctx = TestContext::new();

    let res = ctx
        .request(
            Method::POST,
            "/v1/users",
            None,
            Some(json!({ "name": "", "email": "not-an-email", "password": "weak" })),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["error"], "validation_error");
    let details = res.body["details"].as_object().unwrap();
    assert!(details.contains_key("name"));
    assert!(details.contains_key("email"));
    assert!(details.contains_key("password"));
}

#[tokio::test]
async fn test_forbidden_hides_reason() {
    let ctx = TestContext::new();
    let member = ctx.user("Mia", SystemRole::Member).await;

    let res = ctx.post("/v1/teams", &member.token, json!({ "name": "Ops" })).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["error"], "forbidden");
    assert!(!res.body["message"].as_str().unwrap().contains("Evaluator"));

    let res = ctx.post("/v1/roles", &member.token, json!({ "name": "Auditor" })).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_input_is_bad_request() {
    let ctx = TestContext::new();
    let manager = ctx.user("Max", SystemRole::Manager).await;

    let res = ctx.get("/v1/teams/not-a-uuid", &manager.token).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "bad_request");

    let res = ctx.post("/v1/teams", &manager.token, json!({ "title": 5 })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_correlation_id_echoed() {
    let ctx = TestContext::new();
    let id = Uuid::new_v4();

    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-correlation-id", id.to_string())
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request).await.unwrap();
    assert_eq!(response.headers()["x-correlation-id"], id.to_string().as_str());

    let res = ctx.request(Method::GET, "/health", None, None).await;
    let generated = res.headers["x-correlation-id"].to_str().unwrap();
    assert!(Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn test_requests_cancelled_after_shutdown() {
    let ctx = TestContext::new();
    let manager = ctx.user("Max", SystemRole::Manager).await;

    ctx.shutdown.cancel();
    let res = ctx.post("/v1/teams", &manager.token, json!({ "name": "Core" })).await;

    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["error"], "service_unavailable");
}

#[tokio::test]
async fn test_team_project_task_flow() {
    let ctx = TestContext::new();
    let leader = ctx.user("Lee", SystemRole::Manager).await;
    let member = ctx.user("Mo", SystemRole::Member).await;
    let outsider = ctx.user("Oz", SystemRole::Member).await;

    let res = ctx.post("/v1/teams", &leader.token, json!({ "name": "<b>Core</b>" })).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["name"], "&lt;b&gt;Core&lt;/b&gt;");
    let team_id = res.body["id"].as_str().unwrap().to_string();

    let res = ctx
        .post(&format!("/v1/teams/{}/members", team_id), &leader.token, json!({ "user_id": member.id }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = ctx.get(&format!("/v1/teams/{}", team_id), &member.token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["member_ids"].as_array().unwrap().len(), 2);

    let res = ctx
        .post("/v1/projects", &leader.token, json!({ "team_id": team_id, "name": "Launch" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let project_id = res.body["id"].as_str().unwrap().to_string();

    let res = ctx
        .post("/v1/tasks", &member.token, json!({ "project_id": project_id, "title": "Write docs" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "todo");
    let task_id = res.body["id"].as_str().unwrap().to_string();

    let res = ctx.get(&format!("/v1/tasks/{}", task_id), &outsider.token).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = ctx
        .put(&format!("/v1/tasks/{}/status", task_id), &member.token, json!({ "status": "done" }))
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["details"]["status"].is_array());

    let res = ctx
        .put(&format!("/v1/tasks/{}/status", task_id), &member.token, json!({ "status": "in_progress" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "in_progress");

    let res = ctx
        .post(&format!("/v1/tasks/{}/comments", task_id), &member.token, json!({ "body": "On it" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = ctx.get(&format!("/v1/projects/{}/tasks", project_id), &leader.token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = ctx.get(&format!("/v1/tasks/{}", task_id), &leader.token).await;
    assert_eq!(res.body["comments"].as_array().unwrap().len(), 1);

    let res = ctx
        .request(Method::DELETE, &format!("/v1/tasks/{}", task_id), Some(&member.token), None)
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = ctx.get(&format!("/v1/tasks/{}", task_id), &leader.token).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
