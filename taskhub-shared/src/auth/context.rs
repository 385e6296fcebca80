/// Resource context for authorization
///
/// Evaluators never touch the store. The [`ContextLoader`] reads the target
/// resource and the chain above it (task → project → team) into a
/// [`ResourceContext`], from which [`ResourceContext::relationship`] derives
/// how a given user relates to the resource.
///
/// Create operations target a resource that does not exist yet, so their
/// context carries only the parent (`NewProject` loads the team, `NewTask`
/// loads the project and team).

use std::collections::HashSet;
use uuid::Uuid;

use crate::models::team::TeamMember;
use crate::store::{StoreError, UnitOfWork};

/// Target of a gated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    Team(Uuid),
    NewTeam,
    Project(Uuid),
    NewProject { team_id: Uuid },
    Task(Uuid),
    NewTask { project_id: Uuid },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamContext {
    /// `None` while the team is being created
    pub team_id: Option<Uuid>,
    pub leader_id: Option<Uuid>,
    pub member_ids: HashSet<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectContext {
    /// `None` while the project is being created
    pub project_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub team: TeamContext,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskContext {
    /// `None` while the task is being created
    pub task_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub project: ProjectContext,
}

/// What an evaluator knows about the target resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceContext {
    Team(TeamContext),
    Project(ProjectContext),
    Task(TaskContext),
}

/// How a user relates to a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relationship {
    pub team_leader: bool,
    pub team_member: bool,
    pub project_manager: bool,
    pub task_owner: bool,
    pub task_assignee: bool,
}

impl TeamContext {
    fn relate(&self, user_id: Uuid, rel: &mut Relationship) {
        rel.team_leader = self.leader_id == Some(user_id);
        rel.team_member = self.member_ids.contains(&user_id);
    }
}

impl ProjectContext {
    fn relate(&self, user_id: Uuid, rel: &mut Relationship) {
        self.team.relate(user_id, rel);
        rel.project_manager = self.manager_id == Some(user_id);
    }
}

impl ResourceContext {
    /// Id of the concrete resource, if it exists yet
    pub fn resource_id(&self) -> Option<Uuid> {
        match self {
            ResourceContext::Team(team) => team.team_id,
            ResourceContext::Project(project) => project.project_id,
            ResourceContext::Task(task) => task.task_id,
        }
    }

    pub fn relationship(&self, user_id: Uuid) -> Relationship {
        let mut rel = Relationship::default();
        match self {
            ResourceContext::Team(team) => team.relate(user_id, &mut rel),
            ResourceContext::Project(project) => project.relate(user_id, &mut rel),
            ResourceContext::Task(task) => {
                task.project.relate(user_id, &mut rel);
                rel.task_owner = task.owner_id == Some(user_id);
                rel.task_assignee = task.assignee_id == Some(user_id);
            }
        }
        rel
    }
}

/// Failure to build a context
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads resource contexts from a unit of work
pub struct ContextLoader<'a> {
    uow: &'a UnitOfWork,
}

impl<'a> ContextLoader<'a> {
    pub fn new(uow: &'a UnitOfWork) -> Self {
        Self { uow }
    }

    pub async fn load(&self, target: ResourceRef) -> Result<ResourceContext, ContextError> {
        let context = match target {
            ResourceRef::NewTeam => ResourceContext::Team(TeamContext::default()),
            ResourceRef::Team(id) => ResourceContext::Team(self.team(id).await?),
            ResourceRef::NewProject { team_id } => ResourceContext::Project(ProjectContext {
                team: self.team(team_id).await?,
                ..Default::default()
            }),
            ResourceRef::Project(id) => ResourceContext::Project(self.project(id).await?),
            ResourceRef::NewTask { project_id } => ResourceContext::Task(TaskContext {
                project: self.project(project_id).await?,
                ..Default::default()
            }),
            ResourceRef::Task(id) => {
                let task = self
                    .uow
                    .tasks
                    .get_by_id(id)
                    .await?
                    .ok_or(ContextError::NotFound { entity: "Task", id })?;

                ResourceContext::Task(TaskContext {
                    task_id: Some(task.id),
                    owner_id: Some(task.owner_id),
                    assignee_id: task.assignee_id,
                    project: self.project(task.project_id).await?,
                })
            }
        };

        Ok(context)
    }

    async fn project(&self, id: Uuid) -> Result<ProjectContext, ContextError> {
        let project = self
            .uow
            .projects
            .get_by_id(id)
            .await?
            .ok_or(ContextError::NotFound { entity: "Project", id })?;

        Ok(ProjectContext {
            project_id: Some(project.id),
            manager_id: project.manager_id,
            team: self.team(project.team_id).await?,
        })
    }

    async fn team(&self, id: Uuid) -> Result<TeamContext, ContextError> {
        let team = self
            .uow
            .teams
            .get_by_id(id)
            .await?
            .ok_or(ContextError::NotFound { entity: "Team", id })?;

        let members = self
            .uow
            .team_members
            .get_where(&|m: &TeamMember| m.team_id == id)
            .await?;

        Ok(TeamContext {
            team_id: Some(team.id),
            leader_id: Some(team.leader_id),
            member_ids: members.into_iter().map(|m| m.user_id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{project::Project, task::Task, team::Team};
    use crate::store::{memory::InMemoryStore, StoreBackend};

    #[tokio::test]
    async fn test_task_context_walks_up_to_team() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let leader = Uuid::new_v4();
        let member = Uuid::new_v4();
        let manager = Uuid::new_v4();

        let team = Team::new("Platform", leader);
        let mut project = Project::new(team.id, "Auth", None);
        project.set_manager(Some(manager));
        let task = Task::new(project.id, "Rotate keys", member);

        uow.teams.insert(team.clone()).await.unwrap();
        uow.team_members.insert(TeamMember::new(team.id, member)).await.unwrap();
        uow.projects.insert(project.clone()).await.unwrap();
        uow.tasks.insert(task.clone()).await.unwrap();
        uow.teams.save_changes().await.unwrap();
        uow.team_members.save_changes().await.unwrap();
        uow.projects.save_changes().await.unwrap();
        uow.tasks.save_changes().await.unwrap();

        let context = ContextLoader::new(&uow).load(ResourceRef::Task(task.id)).await.unwrap();
        assert_eq!(context.resource_id(), Some(task.id));

        let rel = context.relationship(member);
        assert!(rel.team_member && rel.task_owner);
        assert!(!rel.team_leader && !rel.project_manager);

        assert!(context.relationship(leader).team_leader);
        assert!(context.relationship(manager).project_manager);
    }

    #[tokio::test]
    async fn test_missing_target_is_not_found() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let id = Uuid::new_v4();

        let err = ContextLoader::new(&uow).load(ResourceRef::Project(id)).await.unwrap_err();
        assert!(matches!(err, ContextError::NotFound { entity: "Project", id: missing } if missing == id));
    }

    #[tokio::test]
    async fn test_new_team_context_is_empty() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let context = ContextLoader::new(&uow).load(ResourceRef::NewTeam).await.unwrap();

        assert_eq!(context.resource_id(), None);
        assert_eq!(context.relationship(Uuid::new_v4()), Relationship::default());
    }
}
