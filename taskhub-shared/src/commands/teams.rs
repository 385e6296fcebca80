/// Team commands
///
/// The creator of a team becomes its leader and first member.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{caller_id, Services};
use crate::auth::context::ResourceRef;
use crate::auth::requirement::{Requirement, TeamOperation};
use crate::models::team::{Team, TeamMember};
use crate::models::user::User;
use crate::pipeline::authorize::{Gate, Gated};
use crate::pipeline::mediator::Mediator;
use crate::pipeline::validation::{FieldRules, MustBeUnique, MustExist, Validator};
use crate::pipeline::{Handler, Pipeline, PipelineError, PipelineResult, Request, RequestContext};
use crate::store::StoreBackend;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTeam {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
}

impl Request for CreateTeam {
    type Response = Team;
    const NAME: &'static str = "CreateTeam";
}

impl Gated for CreateTeam {
    fn gate(&self) -> Gate {
        Gate::Resource {
            requirement: Requirement::Team(TeamOperation::Create),
            target: ResourceRef::NewTeam,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTeam {
    pub team_id: Uuid,
}

/// A team with its member ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamDetails {
    #[serde(flatten)]
    pub team: Team,
    pub member_ids: Vec<Uuid>,
}

impl Request for GetTeam {
    type Response = TeamDetails;
    const NAME: &'static str = "GetTeam";
}

impl Gated for GetTeam {
    fn gate(&self) -> Gate {
        Gate::Resource {
            requirement: Requirement::Team(TeamOperation::Read),
            target: ResourceRef::Team(self.team_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
}

impl Request for AddTeamMember {
    type Response = TeamMember;
    const NAME: &'static str = "AddTeamMember";
}

impl Gated for AddTeamMember {
    fn gate(&self) -> Gate {
        Gate::Resource {
            requirement: Requirement::Team(TeamOperation::ManageMembers),
            target: ResourceRef::Team(self.team_id),
        }
    }
}

pub struct TeamHandlers {
    store: Arc<dyn StoreBackend>,
}

impl TeamHandlers {
    pub fn new(services: &Services) -> Self {
        Self {
            store: services.store.clone(),
        }
    }
}

#[async_trait]
impl Handler<CreateTeam> for TeamHandlers {
    async fn handle(&self, request: &CreateTeam, ctx: &RequestContext) -> PipelineResult<Team> {
        let leader_id = caller_id(ctx)?;
        let team = Team::new(&request.name, leader_id);

        // The team and its leader's membership commit together
        let uow = self.store.begin();
        ctx.cancellable(uow.teams.insert(team.clone())).await??;
        ctx.cancellable(uow.team_members.insert(TeamMember::new(team.id, leader_id))).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(team_id = %team.id, leader_id = %leader_id, "Team created");
        Ok(team)
    }
}

#[async_trait]
impl Handler<GetTeam> for TeamHandlers {
    async fn handle(&self, request: &GetTeam, ctx: &RequestContext) -> PipelineResult<TeamDetails> {
        let uow = self.store.begin();
        let team = ctx
            .cancellable(uow.teams.get_by_id(request.team_id))
            .await??
            .ok_or(PipelineError::NotFound {
                entity: "Team",
                id: request.team_id,
            })?;

        let team_id = team.id;
        let mut member_ids: Vec<Uuid> = ctx
            .cancellable(uow.team_members.get_where(&|m: &TeamMember| m.team_id == team_id))
            .await??
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        member_ids.sort();

        Ok(TeamDetails { team, member_ids })
    }
}

#[async_trait]
impl Handler<AddTeamMember> for TeamHandlers {
    async fn handle(&self, request: &AddTeamMember, ctx: &RequestContext) -> PipelineResult<TeamMember> {
        let member = TeamMember::new(request.team_id, request.user_id);

        let uow = self.store.begin();
        ctx.cancellable(uow.team_members.insert(member.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(team_id = %request.team_id, user_id = %request.user_id, "Team member added");
        Ok(member)
    }
}

pub fn register(mediator: &mut Mediator, services: &Services) {
    let handlers = Arc::new(TeamHandlers::new(services));
    let store = &services.store;

    let create_team: Vec<Arc<dyn Validator<CreateTeam>>> = vec![Arc::new(FieldRules)];

    let add_member: Vec<Arc<dyn Validator<AddTeamMember>>> = vec![
        Arc::new(MustExist::<AddTeamMember, User>::new("user_id", store.clone(), |r| Some(r.user_id))),
        Arc::new(MustBeUnique::<AddTeamMember, TeamMember>::new(
            "user_id",
            "User is already a member of this team",
            store.clone(),
            |r, m| m.team_id == r.team_id && m.user_id == r.user_id,
        )),
    ];

    mediator
        .register(Pipeline::<CreateTeam>::gated(handlers.clone(), create_team, services.authorization()))
        .register(Pipeline::<GetTeam>::gated(handlers.clone(), Vec::new(), services.authorization()))
        .register(Pipeline::<AddTeamMember>::gated(handlers, add_member, services.authorization()));
}
