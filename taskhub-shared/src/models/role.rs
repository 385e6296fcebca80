/// Role model and hierarchy view
///
/// Roles may name a parent role. The parent link is structural only: effective
/// permissions come from directly assigned roles, never from ancestors. The
/// link must still never form a cycle, which [`RoleHierarchy`] checks before a
/// role is created or re-parented.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE roles (
///     id UUID PRIMARY KEY,
///     name VARCHAR(100) NOT NULL UNIQUE,
///     description TEXT,
///     parent_role_id UUID REFERENCES roles(id),
///     created_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::store::Entity;

/// Named role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,

    pub name: String,

    pub description: Option<String>,

    pub parent_role_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description,
            parent_role_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_parent(mut self, parent_role_id: Uuid) -> Self {
        self.parent_role_id = Some(parent_role_id);
        self
    }

    /// Replaces the parent link. Callers check [`RoleHierarchy::would_cycle`] first.
    pub fn set_parent(&mut self, parent_role_id: Option<Uuid>) {
        self.parent_role_id = parent_role_id;
    }
}

impl Entity for Role {
    const NAME: &'static str = "Role";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Parent links of a role snapshot
///
/// Walks are bounded by the number of roles, so a corrupt store that already
/// holds a cycle cannot make them loop forever.
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    parents: HashMap<Uuid, Option<Uuid>>,
}

impl RoleHierarchy {
    pub fn new(roles: &[Role]) -> Self {
        Self {
            parents: roles.iter().map(|r| (r.id, r.parent_role_id)).collect(),
        }
    }

    pub fn contains(&self, role_id: Uuid) -> bool {
        self.parents.contains_key(&role_id)
    }

    /// Ancestors of `role_id`, nearest first, excluding the role itself
    pub fn ancestors(&self, role_id: Uuid) -> Vec<Uuid> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([role_id]);
        let mut current = self.parents.get(&role_id).copied().flatten();

        while let Some(parent) = current {
            if !seen.insert(parent) || chain.len() >= self.parents.len() {
                break;
            }
            chain.push(parent);
            current = self.parents.get(&parent).copied().flatten();
        }

        chain
    }

    /// Whether giving `role_id` the parent `new_parent` would close a loop
    pub fn would_cycle(&self, role_id: Uuid, new_parent: Uuid) -> bool {
        new_parent == role_id || self.ancestors(new_parent).contains(&role_id)
    }
}
