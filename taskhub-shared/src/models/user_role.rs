/// User to role assignment
///
/// One row per (user, role) pair. PostgreSQL enforces the pair's uniqueness;
/// the assignment command also checks it before writing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRole {
    pub id: Uuid,

    pub user_id: Uuid,

    pub role_id: Uuid,

    pub assigned_at: DateTime<Utc>,
}

impl UserRole {
    pub fn new(user_id: Uuid, role_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role_id,
            assigned_at: Utc::now(),
        }
    }
}

impl Entity for UserRole {
    const NAME: &'static str = "UserRole";

    fn id(&self) -> Uuid {
        self.id
    }
}

