/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use taskhub_api::{app::{build_router, AppState}, config::Config};
/// use taskhub_shared::commands::{build_mediator, Services};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let services = Services::in_memory(config.jwt.secret.clone());
/// let state = AppState::new(build_mediator(&services), config, None);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::convert::Infallible;
use std::sync::Arc;
use taskhub_shared::auth::{jwt, principal::Principal};
use taskhub_shared::pipeline::{mediator::Mediator, RequestContext};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Header carrying the correlation id in both directions
pub static CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Every command and query pipeline
    pub mediator: Arc<Mediator>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Present when the PostgreSQL store is in use
    pub db: Option<PgPool>,

    /// Cancelled on shutdown; every request context gets a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(mediator: Mediator, config: Config, db: Option<PgPool>) -> Self {
        Self {
            mediator: Arc::new(mediator),
            config: Arc::new(config),
            db,
            shutdown: CancellationToken::new(),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Correlation id of the current HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

/// Pipeline context for the current HTTP request
///
/// Built from the authenticated principal (anonymous on public routes), the
/// correlation id and a child of the shutdown token.
pub struct Scope(pub RequestContext);

#[async_trait]
impl FromRequestParts<AppState> for Scope {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .unwrap_or_else(Principal::anonymous);
        let correlation_id = parts
            .extensions
            .get::<CorrelationId>()
            .map(|c| c.0)
            .unwrap_or_else(Uuid::new_v4);

        Ok(Scope(
            RequestContext::new(principal)
                .with_correlation_id(correlation_id)
                .with_cancellation(state.shutdown.child_token()),
        ))
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                          # Health check (public)
/// └── /v1/
///     ├── POST /users                      # Sign up (public)
///     ├── POST /auth/login                 # Sign in (public)
///     ├── GET  /users/:id/permissions
///     ├── POST /users/:id/roles
///     ├── POST /roles
///     ├── PUT  /roles/:id/parent
///     ├── POST /roles/:id/permissions
///     ├── POST /permissions
///     ├── POST /teams
///     ├── GET  /teams/:id
///     ├── POST /teams/:id/members
///     ├── POST /projects
///     ├── GET  /projects/:id
///     ├── PUT  /projects/:id
///     ├── GET  /projects/:id/tasks
///     ├── POST /tasks
///     ├── GET  /tasks/:id
///     ├── PUT  /tasks/:id
///     ├── DELETE /tasks/:id
///     ├── PUT  /tasks/:id/assignee
///     ├── PUT  /tasks/:id/status
///     └── POST /tasks/:id/comments
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. CORS (tower-http CorsLayer)
/// 2. Logging (tower-http TraceLayer)
/// 3. Correlation id
/// 4. JWT authentication (everything under `/v1` except sign-up and sign-in)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{health, projects, roles, tasks, teams, users};

    let public_routes = Router::new()
        .route("/users", post(users::create_user))
        .route("/auth/login", post(users::login));

    let protected_routes = Router::new()
        .route("/users/:id/permissions", get(users::effective_permissions))
        .route("/users/:id/roles", post(roles::assign_role))
        .route("/roles", post(roles::create_role))
        .route("/roles/:id/parent", put(roles::set_parent))
        .route("/roles/:id/permissions", post(roles::grant_permission))
        .route("/permissions", post(roles::create_permission))
        .route("/teams", post(teams::create_team))
        .route("/teams/:id", get(teams::get_team))
        .route("/teams/:id/members", post(teams::add_member))
        .route("/projects", post(projects::create_project))
        .route("/projects/:id", get(projects::get_project).put(projects::update_project))
        .route("/projects/:id/tasks", get(projects::list_tasks))
        .route("/tasks", post(tasks::create_task))
        .route(
            "/tasks/:id",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/tasks/:id/assignee", put(tasks::assign_task))
        .route("/tasks/:id/status", put(tasks::update_status))
        .route("/tasks/:id/comments", post(tasks::add_comment))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = public_routes.merge(protected_routes);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, CORRELATION_HEADER.clone()])
            .expose_headers([CORRELATION_HEADER.clone()])
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/v1", v1_routes)
        .layer(middleware::from_fn(correlation_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Reads or assigns the correlation id and echoes it on the response
async fn correlation_layer(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(&CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .unwrap_or_else(Uuid::new_v4);

    req.extensions_mut().insert(CorrelationId(correlation_id));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_HEADER.clone(), value);
    }
    response
}

/// JWT authentication middleware layer
///
/// Validates the bearer token and injects the caller's [`Principal`] into
/// request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_token(token, state.jwt_secret())?;

    req.extensions_mut().insert(claims.principal());

    Ok(next.run(req).await)
}
