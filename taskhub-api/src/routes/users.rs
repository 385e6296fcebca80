/// User endpoints
///
/// - `POST /v1/users` - Sign up (public)
/// - `POST /v1/auth/login` - Sign in and receive an access token (public)
/// - `GET /v1/users/:id/permissions` - Effective permission names

use super::{ApiJson, ApiPath};
use crate::app::{AppState, Scope};
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use taskhub_shared::commands::users::{CreateUser, GetEffectivePermissions, Login, LoginResponse};
use taskhub_shared::models::user::User;
use uuid::Uuid;

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/users
/// Content-Type: application/json
///
/// {
///   "name": "Ada Lovelace",
///   "email": "ada@example.com",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed, including a taken email
pub async fn create_user(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiJson(req): ApiJson<CreateUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.mediator.send(req, &ctx).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Login endpoint
///
/// # Response
///
/// ```json
/// {
///   "access_token": "eyJ...",
///   "token_type": "Bearer",
///   "expires_in": 28800,
///   "user_id": "uuid",
///   "role": "member"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials, disabled or locked account
pub async fn login(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiJson(req): ApiJson<Login>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(state.mediator.send(req, &ctx).await?))
}

pub async fn effective_permissions(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<String>>> {
    let names = state
        .mediator
        .send(GetEffectivePermissions { user_id }, &ctx)
        .await?;
    Ok(Json(names))
}
