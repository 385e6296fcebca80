/// Task endpoints
///
/// - `POST /v1/tasks`
/// - `GET /v1/tasks/:id` - Task with its comments
/// - `PUT /v1/tasks/:id` - Title and description
/// - `DELETE /v1/tasks/:id`
/// - `PUT /v1/tasks/:id/assignee`
/// - `PUT /v1/tasks/:id/status`
/// - `POST /v1/tasks/:id/comments`

use super::{ApiJson, ApiPath};
use crate::app::{AppState, Scope};
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use taskhub_shared::commands::tasks::{
    AddComment, AssignTask, CreateTask, DeleteTask, GetTask, TaskDetails, UpdateTask, UpdateTaskStatus,
};
use taskhub_shared::models::task::{Task, TaskComment, TaskStatus};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct TaskBody {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssigneeBody {
    /// `null` unassigns the task
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub body: String,
}

pub async fn create_task(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiJson(req): ApiJson<CreateTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.mediator.send(req, &ctx).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<TaskDetails>> {
    Ok(Json(state.mediator.send(GetTask { task_id }, &ctx).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<TaskBody>,
) -> ApiResult<Json<Task>> {
    let request = UpdateTask {
        task_id,
        title: body.title,
        description: body.description,
    };
    Ok(Json(state.mediator.send(request, &ctx).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.mediator.send(DeleteTask { task_id }, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_task(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AssigneeBody>,
) -> ApiResult<Json<Task>> {
    let request = AssignTask {
        task_id,
        assignee_id: body.assignee_id,
    };
    Ok(Json(state.mediator.send(request, &ctx).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusBody>,
) -> ApiResult<Json<Task>> {
    let request = UpdateTaskStatus {
        task_id,
        status: body.status,
    };
    Ok(Json(state.mediator.send(request, &ctx).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CommentBody>,
) -> ApiResult<(StatusCode, Json<TaskComment>)> {
    let request = AddComment {
        task_id,
        body: body.body,
    };
    let comment = state.mediator.send(request, &ctx).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
