/// Identity administration endpoints (administrators only)
///
/// - `POST /v1/roles`
/// - `PUT /v1/roles/:id/parent`
/// - `POST /v1/roles/:id/permissions`
/// - `POST /v1/permissions`
/// - `POST /v1/users/:id/roles`

use super::{ApiJson, ApiPath};
use crate::app::{AppState, Scope};
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use taskhub_shared::commands::roles::{
    AssignRole, CreatePermission, CreateRole, GrantPermission, SetRoleParent,
};
use taskhub_shared::models::{
    permission::Permission, role::Role, role_permission::RolePermission, user_role::UserRole,
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ParentBody {
    /// `null` detaches the role
    pub parent_role_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GrantBody {
    pub permission_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub role_id: Uuid,
}

pub async fn create_role(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiJson(req): ApiJson<CreateRole>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    let role = state.mediator.send(req, &ctx).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn set_parent(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(role_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ParentBody>,
) -> ApiResult<Json<Role>> {
    let request = SetRoleParent {
        role_id,
        parent_role_id: body.parent_role_id,
    };
    Ok(Json(state.mediator.send(request, &ctx).await?))
}

pub async fn create_permission(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiJson(req): ApiJson<CreatePermission>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    let permission = state.mediator.send(req, &ctx).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn grant_permission(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(role_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<GrantBody>,
) -> ApiResult<(StatusCode, Json<RolePermission>)> {
    let request = GrantPermission {
        role_id,
        permission_id: body.permission_id,
    };
    let grant = state.mediator.send(request, &ctx).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AssignBody>,
) -> ApiResult<(StatusCode, Json<UserRole>)> {
    let request = AssignRole {
        user_id,
        role_id: body.role_id,
    };
    let assignment = state.mediator.send(request, &ctx).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}
