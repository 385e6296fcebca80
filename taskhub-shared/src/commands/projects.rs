/// Project commands

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::Services;
use crate::auth::context::ResourceRef;
use crate::auth::requirement::{ProjectOperation, Requirement};
use crate::models::project::Project;
use crate::models::task::Task;
use crate::models::user::User;
use crate::pipeline::authorize::{Gate, Gated};
use crate::pipeline::mediator::Mediator;
use crate::pipeline::validation::{FieldRules, MustExist, Validator};
use crate::pipeline::{Handler, Pipeline, PipelineError, PipelineResult, Request, RequestContext};
use crate::store::{StoreBackend, UnitOfWork};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProject {
    pub team_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProject {
    pub project_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetProject {
    pub project_id: Uuid,
}

/// Tasks of one project, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProjectTasks {
    pub project_id: Uuid,
}

impl Request for CreateProject {
    type Response = Project;
    const NAME: &'static str = "CreateProject";
}

impl Gated for CreateProject {
    fn gate(&self) -> Gate {
        Gate::Resource {
            requirement: Requirement::Project(ProjectOperation::Create),
            target: ResourceRef::NewProject { team_id: self.team_id },
        }
    }
}

impl Request for UpdateProject {
    type Response = Project;
    const NAME: &'static str = "UpdateProject";
}

impl Gated for UpdateProject {
    fn gate(&self) -> Gate {
        Gate::Resource {
            requirement: Requirement::Project(ProjectOperation::Update),
            target: ResourceRef::Project(self.project_id),
        }
    }
}

impl Request for GetProject {
    type Response = Project;
    const NAME: &'static str = "GetProject";
}

impl Gated for GetProject {
    fn gate(&self) -> Gate {
        Gate::Resource {
            requirement: Requirement::Project(ProjectOperation::Read),
            target: ResourceRef::Project(self.project_id),
        }
    }
}

impl Request for ListProjectTasks {
    type Response = Vec<Task>;
    const NAME: &'static str = "ListProjectTasks";
}

impl Gated for ListProjectTasks {
    fn gate(&self) -> Gate {
        Gate::Resource {
            requirement: Requirement::Project(ProjectOperation::Read),
            target: ResourceRef::Project(self.project_id),
        }
    }
}

pub struct ProjectHandlers {
    store: Arc<dyn StoreBackend>,
}

impl ProjectHandlers {
    pub fn new(services: &Services) -> Self {
        Self {
            store: services.store.clone(),
        }
    }
}

async fn load_project(uow: &UnitOfWork, id: Uuid) -> PipelineResult<Project> {
    uow.projects
        .get_by_id(id)
        .await?
        .ok_or(PipelineError::NotFound { entity: "Project", id })
}

#[async_trait]
impl Handler<CreateProject> for ProjectHandlers {
    async fn handle(&self, request: &CreateProject, ctx: &RequestContext) -> PipelineResult<Project> {
        let mut project = Project::new(request.team_id, &request.name, request.description.clone());
        project.set_manager(request.manager_id);

        let uow = self.store.begin();
        ctx.cancellable(uow.projects.insert(project.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(project_id = %project.id, team_id = %project.team_id, "Project created");
        Ok(project)
    }
}

#[async_trait]
impl Handler<UpdateProject> for ProjectHandlers {
    async fn handle(&self, request: &UpdateProject, ctx: &RequestContext) -> PipelineResult<Project> {
        let uow = self.store.begin();
        let mut project = ctx.cancellable(load_project(&uow, request.project_id)).await??;

        project.name = request.name.clone();
        project.description = request.description.clone();
        project.set_manager(request.manager_id);

        ctx.cancellable(uow.projects.update(project.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(project_id = %project.id, "Project updated");
        Ok(project)
    }
}

#[async_trait]
impl Handler<GetProject> for ProjectHandlers {
    async fn handle(&self, request: &GetProject, ctx: &RequestContext) -> PipelineResult<Project> {
        let uow = self.store.begin();
        ctx.cancellable(load_project(&uow, request.project_id)).await?
    }
}

#[async_trait]
impl Handler<ListProjectTasks> for ProjectHandlers {
    async fn handle(&self, request: &ListProjectTasks, ctx: &RequestContext) -> PipelineResult<Vec<Task>> {
        let uow = self.store.begin();
        let project_id = request.project_id;

        let mut tasks = ctx
            .cancellable(uow.tasks.get_where(&|t: &Task| t.project_id == project_id))
            .await??;
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }
}

pub fn register(mediator: &mut Mediator, services: &Services) {
    let handlers = Arc::new(ProjectHandlers::new(services));
    let store = &services.store;

    let create_project: Vec<Arc<dyn Validator<CreateProject>>> = vec![
        Arc::new(FieldRules),
        Arc::new(MustExist::<CreateProject, User>::new("manager_id", store.clone(), |r| r.manager_id)),
    ];

    let update_project: Vec<Arc<dyn Validator<UpdateProject>>> = vec![
        Arc::new(FieldRules),
        Arc::new(MustExist::<UpdateProject, User>::new("manager_id", store.clone(), |r| r.manager_id)),
    ];

    mediator
        .register(Pipeline::<CreateProject>::gated(handlers.clone(), create_project, services.authorization()))
        .register(Pipeline::<UpdateProject>::gated(handlers.clone(), update_project, services.authorization()))
        .register(Pipeline::<GetProject>::gated(handlers.clone(), Vec::new(), services.authorization()))
        .register(Pipeline::<ListProjectTasks>::gated(handlers, Vec::new(), services.authorization()));
}
