/// Team endpoints
///
/// - `POST /v1/teams` - Create a team; the caller becomes its leader
/// - `GET /v1/teams/:id` - Team with member ids
/// - `POST /v1/teams/:id/members` - Add a member

use super::{ApiJson, ApiPath};
use crate::app::{AppState, Scope};
use crate::error::ApiResult;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use taskhub_shared::commands::teams::{AddTeamMember, CreateTeam, GetTeam, TeamDetails};
use taskhub_shared::models::team::{Team, TeamMember};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct MemberBody {
    pub user_id: Uuid,
}

pub async fn create_team(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiJson(req): ApiJson<CreateTeam>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    let team = state.mediator.send(req, &ctx).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn get_team(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<TeamDetails>> {
    Ok(Json(state.mediator.send(GetTeam { team_id }, &ctx).await?))
}

pub async fn add_member(
    State(state): State<AppState>,
    Scope(ctx): Scope,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<MemberBody>,
) -> ApiResult<(StatusCode, Json<TeamMember>)> {
    let request = AddTeamMember {
        team_id,
        user_id: body.user_id,
    };
    let member = state.mediator.send(request, &ctx).await?;
    Ok((StatusCode::CREATED, Json(member)))
}
