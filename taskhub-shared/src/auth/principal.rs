/// Authenticated caller
///
/// A [`Principal`] is what the boundary knows about the caller before any
/// store access: an optional user id and a coarse [`SystemRole`]. Effective
/// permissions are resolved on demand by the authorizer.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Coarse role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    Member,
    Manager,
    Admin,
}

impl SystemRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::Member => "member",
            SystemRole::Manager => "manager",
            SystemRole::Admin => "admin",
        }
    }

    /// Highest system role implied by a user's assigned role names
    ///
    /// Roles named `Admin` or `Manager` (case-insensitive) map onto the
    /// matching system role; everyone else is a `Member`.
    pub fn from_role_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names
            .into_iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "admin" => SystemRole::Admin,
                "manager" => SystemRole::Manager,
                _ => SystemRole::Member,
            })
            .max()
            .unwrap_or(SystemRole::Member)
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: Option<Uuid>,
    system_role: SystemRole,
}

impl Principal {
    pub fn user(user_id: Uuid, system_role: SystemRole) -> Self {
        Self {
            user_id: Some(user_id),
            system_role,
        }
    }

    /// A caller without an identity claim
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            system_role: SystemRole::Member,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn system_role(&self) -> SystemRole {
        self.system_role
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.system_role == SystemRole::Admin
    }

    pub fn is_manager(&self) -> bool {
        self.system_role == SystemRole::Manager
    }
}
