/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - An application over the in-memory store
/// - Test user creation with JWT tokens
/// - A JSON request helper

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use taskhub_api::app::{build_router, AppState};
use taskhub_api::config::{ApiConfig, Config, JwtConfig};
use taskhub_shared::auth::jwt::{create_token, Claims};
use taskhub_shared::auth::principal::SystemRole;
use taskhub_shared::commands::{build_mediator, Services};
use taskhub_shared::models::user::User;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "integration-tests-secret-at-least-32-bytes";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub services: Services,
    pub shutdown: CancellationToken,
}

/// Response status, headers and JSON body (`Null` when empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// A stored user and a token for them
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

impl TestContext {
    pub fn new() -> Self {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: None,
            jwt: JwtConfig {
                secret: SECRET.to_string(),
            },
            admin: None,
        };
        let services = Services::in_memory(SECRET);
        let state = AppState::new(build_mediator(&services), config, None);
        let shutdown = state.shutdown.clone();

        Self {
            app: build_router(state),
            services,
            shutdown,
        }
    }

    /// Stores a user directly and issues an access token
    pub async fn user(&self, name: &str, role: SystemRole) -> TestUser {
        let user = User::new(name, format!("{}@example.com", name.to_lowercase()), "unused");
        let uow = self.services.store.begin();
        uow.users.insert(user.clone()).await.unwrap();
        uow.users.save_changes().await.unwrap();

        let token = create_token(&Claims::new(user.id, role), SECRET).unwrap();
        TestUser { id: user.id, token }
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }
}
