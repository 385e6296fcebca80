/// Project model
///
/// Projects belong to a team and may name a manager, who gains the
/// project-manager relationship in authorization checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,

    pub team_id: Uuid,

    pub name: String,

    pub description: Option<String>,

    pub manager_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(team_id: Uuid, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            team_id,
            name: name.into(),
            description,
            manager_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn set_manager(&mut self, manager_id: Option<Uuid>) {
        self.manager_id = manager_id;
    }
}

impl Entity for Project {
    const NAME: &'static str = "Project";

    fn id(&self) -> Uuid {
        self.id
    }
}

