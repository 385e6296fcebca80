/// Project endpoints
///
/// - `POST /v1/projects`
/// - `GET /v1/projects/:id`
/// - `PUT /v1/projects/:id`
/// - `GET /v1/projects/:id/tasks`

use super::{ApiJson, ApiPath};
use crate::app::{AppState, Scope};
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use taskhub_shared::commands::projects::{CreateProject, GetProject, ListProjectTasks, UpdateProject};
use taskhub_shared::models::{project::Project, task::Task};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ProjectBody {
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
}

pub async fn create_project(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiJson(req): ApiJson<CreateProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.mediator.send(req, &ctx).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(project_id): ApiPath<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.mediator.send(GetProject { project_id }, &ctx).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(project_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ProjectBody>,
) -> ApiResult<Json<Project>> {
    let request = UpdateProject {
        project_id,
        name: body.name,
        description: body.description,
        manager_id: body.manager_id,
    };
    Ok(Json(state.mediator.send(request, &ctx).await?))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(project_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.mediator.send(ListProjectTasks { project_id }, &ctx).await?))
}
