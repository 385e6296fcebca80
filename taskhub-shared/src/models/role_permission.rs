/// Role to permission grant
///
/// One row per (role, permission) pair, unique in PostgreSQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RolePermission {
    pub id: Uuid,

    pub role_id: Uuid,

    pub permission_id: Uuid,

    pub granted_at: DateTime<Utc>,
}

impl RolePermission {
    pub fn new(role_id: Uuid, permission_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            role_id,
            permission_id,
            granted_at: Utc::now(),
        }
    }
}

impl Entity for RolePermission {
    const NAME: &'static str = "RolePermission";

    fn id(&self) -> Uuid {
        self.id
    }
}

