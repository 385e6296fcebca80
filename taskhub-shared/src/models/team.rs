/// Team and team membership models
///
/// A team has one leader. Membership is a (team, user) join row; the leader is
/// added as a member when the team is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,

    pub name: String,

    pub leader_id: Uuid,

    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn new(name: impl Into<String>, leader_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            leader_id,
            created_at: Utc::now(),
        }
    }

    pub fn set_leader(&mut self, leader_id: Uuid) {
        self.leader_id = leader_id;
    }
}

impl Entity for Team {
    const NAME: &'static str = "Team";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: Uuid,

    pub team_id: Uuid,

    pub user_id: Uuid,

    pub joined_at: DateTime<Utc>,
}

impl TeamMember {
    pub fn new(team_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            team_id,
            user_id,
            joined_at: Utc::now(),
        }
    }
}

impl Entity for TeamMember {
    const NAME: &'static str = "TeamMember";

    fn id(&self) -> Uuid {
        self.id
    }
}

