/// Authorization requirements
///
/// A [`Requirement`] is one (resource type, operation) question. Operations
/// are closed per resource type, so an impossible pair such as "assign a
/// team" cannot be expressed.
///
/// Every requirement has two stable names:
///
/// - a policy name, `<Resource><Operation>` (`"TaskAssign"`), used to look
///   policies up by name
/// - a permission name, `<Resource>.<Operation>` (`"Task.Assign"`), which the
///   named-permission evaluator checks against the caller's effective
///   permissions
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::requirement::{Requirement, TaskOperation};
///
/// let requirement: Requirement = "TaskDelete".parse().unwrap();
/// assert_eq!(requirement, Requirement::Task(TaskOperation::Delete));
/// assert_eq!(requirement.permission_name(), "Task.Delete");
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource types guarded by requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Team,
    Project,
    Task,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Team => "Team",
            ResourceType::Project => "Project",
            ResourceType::Task => "Task",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamOperation {
    Read,
    Create,
    Update,
    Delete,
    ManageMembers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectOperation {
    Read,
    Create,
    Update,
    Delete,
    ManageTasks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskOperation {
    Read,
    Create,
    Update,
    Delete,
    Assign,
    UpdateStatus,
    AddComment,
}

impl TeamOperation {
    const ALL: [TeamOperation; 5] = [
        TeamOperation::Read,
        TeamOperation::Create,
        TeamOperation::Update,
        TeamOperation::Delete,
        TeamOperation::ManageMembers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamOperation::Read => "Read",
            TeamOperation::Create => "Create",
            TeamOperation::Update => "Update",
            TeamOperation::Delete => "Delete",
            TeamOperation::ManageMembers => "ManageMembers",
        }
    }
}

impl ProjectOperation {
    const ALL: [ProjectOperation; 5] = [
        ProjectOperation::Read,
        ProjectOperation::Create,
        ProjectOperation::Update,
        ProjectOperation::Delete,
        ProjectOperation::ManageTasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectOperation::Read => "Read",
            ProjectOperation::Create => "Create",
            ProjectOperation::Update => "Update",
            ProjectOperation::Delete => "Delete",
            ProjectOperation::ManageTasks => "ManageTasks",
        }
    }
}

impl TaskOperation {
    const ALL: [TaskOperation; 7] = [
        TaskOperation::Read,
        TaskOperation::Create,
        TaskOperation::Update,
        TaskOperation::Delete,
        TaskOperation::Assign,
        TaskOperation::UpdateStatus,
        TaskOperation::AddComment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOperation::Read => "Read",
            TaskOperation::Create => "Create",
            TaskOperation::Update => "Update",
            TaskOperation::Delete => "Delete",
            TaskOperation::Assign => "Assign",
            TaskOperation::UpdateStatus => "UpdateStatus",
            TaskOperation::AddComment => "AddComment",
        }
    }
}

/// One authorization question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirement {
    Team(TeamOperation),
    Project(ProjectOperation),
    Task(TaskOperation),
}

/// Unknown policy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown policy: {0}")]
pub struct UnknownPolicy(pub String);

impl Requirement {
    /// Every requirement, in declaration order
    pub fn all() -> Vec<Requirement> {
        TeamOperation::ALL
            .iter()
            .map(|op| Requirement::Team(*op))
            .chain(ProjectOperation::ALL.iter().map(|op| Requirement::Project(*op)))
            .chain(TaskOperation::ALL.iter().map(|op| Requirement::Task(*op)))
            .collect()
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            Requirement::Team(_) => ResourceType::Team,
            Requirement::Project(_) => ResourceType::Project,
            Requirement::Task(_) => ResourceType::Task,
        }
    }

    pub fn operation_name(&self) -> &'static str {
        match self {
            Requirement::Team(op) => op.as_str(),
            Requirement::Project(op) => op.as_str(),
            Requirement::Task(op) => op.as_str(),
        }
    }

    /// `"TeamRead"` style name
    pub fn policy_name(&self) -> String {
        format!("{}{}", self.resource_type().as_str(), self.operation_name())
    }

    /// `"Team.Read"` style name
    pub fn permission_name(&self) -> String {
        format!("{}.{}", self.resource_type().as_str(), self.operation_name())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.policy_name())
    }
}

impl FromStr for Requirement {
    type Err = UnknownPolicy;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Requirement::all()
            .into_iter()
            .find(|requirement| requirement.policy_name() == name)
            .ok_or_else(|| UnknownPolicy(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_set_is_closed() {
        let all = Requirement::all();
        assert_eq!(all.len(), 17);
        assert_eq!(all.iter().filter(|r| r.resource_type() == ResourceType::Task).count(), 7);
    }

    #[test]
    fn test_policy_names_round_trip() {
        for requirement in Requirement::all() {
            let parsed: Requirement = requirement.policy_name().parse().unwrap();
            assert_eq!(parsed, requirement);
        }
    }

    #[test]
    fn test_names() {
        let requirement = Requirement::Project(ProjectOperation::ManageTasks);
        assert_eq!(requirement.policy_name(), "ProjectManageTasks");
        assert_eq!(requirement.permission_name(), "Project.ManageTasks");
        assert_eq!(requirement.to_string(), "ProjectManageTasks");
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = "TeamAssign".parse::<Requirement>().unwrap_err();
        assert_eq!(err, UnknownPolicy("TeamAssign".to_string()));
    }
}
