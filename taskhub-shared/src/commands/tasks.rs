/// Task commands
///
/// The caller creating a task becomes its owner. Status changes follow the
/// [`TaskStatus`] lifecycle; a move the lifecycle does not allow is a
/// validation failure on `status`. Deleting a task deletes its comments in
/// the same commit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{caller_id, Services};
use crate::auth::context::ResourceRef;
use crate::auth::requirement::{Requirement, TaskOperation};
use crate::models::task::{Task, TaskComment, TaskStatus};
use crate::models::user::User;
use crate::pipeline::authorize::{Gate, Gated};
use crate::pipeline::mediator::Mediator;
use crate::pipeline::validation::{FieldRules, MustExist, Validator};
use crate::pipeline::{
    Handler, Pipeline, PipelineError, PipelineResult, Request, RequestContext, ValidationFailures,
};
use crate::store::{StoreBackend, UnitOfWork};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTask {
    pub project_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTask {
    pub task_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTask {
    pub task_id: Uuid,
}

/// A task with its comments, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub comments: Vec<TaskComment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTask {
    pub task_id: Uuid,
    /// `None` unassigns the task
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTaskStatus {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddComment {
    pub task_id: Uuid,

    #[validate(length(min = 1, max = 2000, message = "Comment must be between 1 and 2000 characters"))]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTask {
    pub task_id: Uuid,
}

macro_rules! task_request {
    ($($request:ident => $response:ty, $operation:ident);* $(;)?) => {
        $(
            impl Request for $request {
                type Response = $response;
                const NAME: &'static str = stringify!($request);
            }

            impl Gated for $request {
                fn gate(&self) -> Gate {
                    Gate::Resource {
                        requirement: Requirement::Task(TaskOperation::$operation),
                        target: ResourceRef::Task(self.task_id),
                    }
                }
            }
        )*
    };
}

task_request! {
    UpdateTask => Task, Update;
    GetTask => TaskDetails, Read;
    AssignTask => Task, Assign;
    UpdateTaskStatus => Task, UpdateStatus;
    AddComment => TaskComment, AddComment;
    DeleteTask => (), Delete;
}

impl Request for CreateTask {
    type Response = Task;
    const NAME: &'static str = "CreateTask";
}

impl Gated for CreateTask {
    fn gate(&self) -> Gate {
        Gate::Resource {
            requirement: Requirement::Task(TaskOperation::Create),
            target: ResourceRef::NewTask {
                project_id: self.project_id,
            },
        }
    }
}

/// Rejects status moves the lifecycle does not allow
///
/// A missing task is left for authorization to report as not found.
pub struct StatusTransition {
    store: Arc<dyn StoreBackend>,
}

impl StatusTransition {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Validator<UpdateTaskStatus> for StatusTransition {
    async fn validate(&self, request: &UpdateTaskStatus) -> PipelineResult<ValidationFailures> {
        let uow = self.store.begin();
        let Some(task) = uow.tasks.get_by_id(request.task_id).await? else {
            return Ok(ValidationFailures::new());
        };

        if task.status != request.status && !task.status.can_transition_to(request.status) {
            return Ok(ValidationFailures::single(
                "status",
                format!(
                    "Cannot move a task from {} to {}",
                    task.status.as_str(),
                    request.status.as_str()
                ),
            ));
        }
        Ok(ValidationFailures::new())
    }
}

pub struct TaskHandlers {
    store: Arc<dyn StoreBackend>,
}

impl TaskHandlers {
    pub fn new(services: &Services) -> Self {
        Self {
            store: services.store.clone(),
        }
    }
}

async fn load_task(uow: &UnitOfWork, id: Uuid) -> PipelineResult<Task> {
    uow.tasks
        .get_by_id(id)
        .await?
        .ok_or(PipelineError::NotFound { entity: "Task", id })
}

async fn comments_of(uow: &UnitOfWork, task_id: Uuid) -> PipelineResult<Vec<TaskComment>> {
    let mut comments = uow
        .comments
        .get_where(&|c: &TaskComment| c.task_id == task_id)
        .await?;
    comments.sort_by_key(|c| c.created_at);
    Ok(comments)
}

#[async_trait]
impl Handler<CreateTask> for TaskHandlers {
    async fn handle(&self, request: &CreateTask, ctx: &RequestContext) -> PipelineResult<Task> {
        let owner_id = caller_id(ctx)?;
        let mut task = Task::new(request.project_id, &request.title, owner_id)
            .with_description(request.description.clone());
        task.assign(request.assignee_id);

        let uow = self.store.begin();
        ctx.cancellable(uow.tasks.insert(task.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(task_id = %task.id, project_id = %task.project_id, "Task created");
        Ok(task)
    }
}

#[async_trait]
impl Handler<UpdateTask> for TaskHandlers {
    async fn handle(&self, request: &UpdateTask, ctx: &RequestContext) -> PipelineResult<Task> {
        let uow = self.store.begin();
        let mut task = ctx.cancellable(load_task(&uow, request.task_id)).await??;

        task.title = request.title.clone();
        task.description = request.description.clone();
        task.updated_at = chrono::Utc::now();

        ctx.cancellable(uow.tasks.update(task.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;
        Ok(task)
    }
}

#[async_trait]
impl Handler<GetTask> for TaskHandlers {
    async fn handle(&self, request: &GetTask, ctx: &RequestContext) -> PipelineResult<TaskDetails> {
        let uow = self.store.begin();
        let task = ctx.cancellable(load_task(&uow, request.task_id)).await??;
        let comments = ctx.cancellable(comments_of(&uow, task.id)).await??;
        Ok(TaskDetails { task, comments })
    }
}

#[async_trait]
impl Handler<AssignTask> for TaskHandlers {
    async fn handle(&self, request: &AssignTask, ctx: &RequestContext) -> PipelineResult<Task> {
        let uow = self.store.begin();
        let mut task = ctx.cancellable(load_task(&uow, request.task_id)).await??;

        task.assign(request.assignee_id);
        ctx.cancellable(uow.tasks.update(task.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(task_id = %task.id, assignee_id = ?task.assignee_id, "Task assigned");
        Ok(task)
    }
}

#[async_trait]
impl Handler<UpdateTaskStatus> for TaskHandlers {
    async fn handle(&self, request: &UpdateTaskStatus, ctx: &RequestContext) -> PipelineResult<Task> {
        let uow = self.store.begin();
        let mut task = ctx.cancellable(load_task(&uow, request.task_id)).await??;

        if task.status == request.status {
            return Ok(task);
        }
        // Re-checked here: the status may have moved since validation ran
        if !task.set_status(request.status) {
            return Err(PipelineError::Conflict(format!(
                "Task {} is now {}",
                task.id,
                task.status.as_str()
            )));
        }

        ctx.cancellable(uow.tasks.update(task.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(task_id = %task.id, status = task.status.as_str(), "Task status changed");
        Ok(task)
    }
}

#[async_trait]
impl Handler<AddComment> for TaskHandlers {
    async fn handle(&self, request: &AddComment, ctx: &RequestContext) -> PipelineResult<TaskComment> {
        let author_id = caller_id(ctx)?;
        let comment = TaskComment::new(request.task_id, author_id, &request.body);

        let uow = self.store.begin();
        ctx.cancellable(uow.comments.insert(comment.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;
        Ok(comment)
    }
}

#[async_trait]
impl Handler<DeleteTask> for TaskHandlers {
    async fn handle(&self, request: &DeleteTask, ctx: &RequestContext) -> PipelineResult<()> {
        let uow = self.store.begin();
        let task = ctx.cancellable(load_task(&uow, request.task_id)).await??;

        let comments = ctx.cancellable(comments_of(&uow, task.id)).await??;
        let comment_count = comments.len();
        for comment in comments {
            ctx.cancellable(uow.comments.delete(comment)).await??;
        }

        let task_id = task.id;
        ctx.cancellable(uow.tasks.delete(task)).await??;
        // Comments and task go in one commit; a failure keeps both
        ctx.cancellable(uow.save_changes()).await??;

        info!(task_id = %task_id, comments = comment_count, "Task deleted");
        Ok(())
    }
}

pub fn register(mediator: &mut Mediator, services: &Services) {
    let handlers = Arc::new(TaskHandlers::new(services));
    let store = &services.store;

    let create_task: Vec<Arc<dyn Validator<CreateTask>>> = vec![
        Arc::new(FieldRules),
        Arc::new(MustExist::<CreateTask, User>::new("assignee_id", store.clone(), |r| r.assignee_id)),
    ];
    let update_task: Vec<Arc<dyn Validator<UpdateTask>>> = vec![Arc::new(FieldRules)];
    let assign_task: Vec<Arc<dyn Validator<AssignTask>>> = vec![Arc::new(
        MustExist::<AssignTask, User>::new("assignee_id", store.clone(), |r| r.assignee_id),
    )];
    let update_status: Vec<Arc<dyn Validator<UpdateTaskStatus>>> =
        vec![Arc::new(StatusTransition::new(store.clone()))];
    let add_comment: Vec<Arc<dyn Validator<AddComment>>> = vec![Arc::new(FieldRules)];

    mediator
        .register(Pipeline::<CreateTask>::gated(handlers.clone(), create_task, services.authorization()))
        .register(Pipeline::<UpdateTask>::gated(handlers.clone(), update_task, services.authorization()))
        .register(Pipeline::<GetTask>::gated(handlers.clone(), Vec::new(), services.authorization()))
        .register(Pipeline::<AssignTask>::gated(handlers.clone(), assign_task, services.authorization()))
        .register(Pipeline::<UpdateTaskStatus>::gated(handlers.clone(), update_status, services.authorization()))
        .register(Pipeline::<AddComment>::gated(handlers.clone(), add_comment, services.authorization()))
        .register(Pipeline::<DeleteTask>::gated(handlers, Vec::new(), services.authorization()));
}
