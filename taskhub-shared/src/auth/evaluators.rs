/// Policy evaluators
///
/// An [`Evaluator`] votes on a single requirement for a single caller. Votes
/// are combined by the authorizer with OR: one `Allow` grants the
/// requirement, and without one the answer is deny. Evaluators therefore only
/// ever vote `Allow` or abstain with `Deny`; there is no veto.
///
/// Standalone [`Assertion`]s are different: they are checked before any
/// evaluator and every one of them must hold.
///
/// # Evaluators
///
/// - [`AdminEvaluator`]: the `Admin` system role holds every requirement
/// - [`NamedPermissionEvaluator`]: the caller's effective permissions contain
///   `"<Resource>.<Operation>"`
/// - [`TeamEvaluator`], [`ProjectEvaluator`], [`TaskEvaluator`]: the caller's
///   relationship to the resource (leader, member, manager, owner, assignee)

use std::collections::HashSet;

use super::context::{Relationship, ResourceContext};
use super::principal::Principal;
use super::requirement::{ProjectOperation, Requirement, TaskOperation, TeamOperation};

/// An evaluator's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Allow,
    Deny,
}

impl Vote {
    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Vote::Allow
        } else {
            Vote::Deny
        }
    }
}

/// Everything an evaluator may look at about the caller
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub principal: &'a Principal,

    /// Effective permission names
    pub permissions: &'a HashSet<String>,
}

/// Evaluator failure; the authorizer treats it as a deny
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("{evaluator} cannot evaluate {requirement}")]
    Unsupported {
        evaluator: &'static str,
        requirement: Requirement,
    },

    #[error("Evaluation failed: {0}")]
    Failed(String),
}

/// Votes on requirements
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        subject: &Subject<'_>,
        requirement: Requirement,
        context: &ResourceContext,
    ) -> Result<Vote, EvaluatorError>;
}

/// Claims-only check that must hold on its own
pub trait Assertion: Send + Sync {
    fn name(&self) -> &'static str;

    fn holds(&self, principal: &Principal) -> bool;
}

/// Requires a non-empty identity claim
pub struct Authenticated;

impl Assertion for Authenticated {
    fn name(&self) -> &'static str {
        "Authenticated"
    }

    fn holds(&self, principal: &Principal) -> bool {
        principal.is_authenticated()
    }
}

/// Requires the `Admin` system role
pub struct Administrator;

impl Assertion for Administrator {
    fn name(&self) -> &'static str {
        "Administrator"
    }

    fn holds(&self, principal: &Principal) -> bool {
        principal.is_authenticated() && principal.is_admin()
    }
}

pub struct AdminEvaluator;

impl Evaluator for AdminEvaluator {
    fn name(&self) -> &'static str {
        "AdminEvaluator"
    }

    fn evaluate(&self, subject: &Subject<'_>, _: Requirement, _: &ResourceContext) -> Result<Vote, EvaluatorError> {
        Ok(Vote::from_bool(subject.principal.is_admin()))
    }
}

pub struct NamedPermissionEvaluator;

impl Evaluator for NamedPermissionEvaluator {
    fn name(&self) -> &'static str {
        "NamedPermissionEvaluator"
    }

    fn evaluate(
        &self,
        subject: &Subject<'_>,
        requirement: Requirement,
        _: &ResourceContext,
    ) -> Result<Vote, EvaluatorError> {
        Ok(Vote::from_bool(
            subject.permissions.contains(&requirement.permission_name()),
        ))
    }
}

/// Relationship of the caller, or `None` for an anonymous caller
fn relationship(subject: &Subject<'_>, context: &ResourceContext) -> Option<Relationship> {
    subject.principal.user_id().map(|id| context.relationship(id))
}

pub struct TeamEvaluator;

impl Evaluator for TeamEvaluator {
    fn name(&self) -> &'static str {
        "TeamEvaluator"
    }

    fn evaluate(
        &self,
        subject: &Subject<'_>,
        requirement: Requirement,
        context: &ResourceContext,
    ) -> Result<Vote, EvaluatorError> {
        let Requirement::Team(operation) = requirement else {
            return Err(EvaluatorError::Unsupported {
                evaluator: self.name(),
                requirement,
            });
        };
        let ResourceContext::Team(_) = context else {
            return Ok(Vote::Deny);
        };
        let Some(rel) = relationship(subject, context) else {
            return Ok(Vote::Deny);
        };
        let manager = subject.principal.is_manager();

        let allowed = match operation {
            TeamOperation::Read => rel.team_leader || rel.team_member || manager,
            TeamOperation::Create => manager,
            TeamOperation::Update | TeamOperation::Delete | TeamOperation::ManageMembers => {
                rel.team_leader || manager
            }
        };

        Ok(Vote::from_bool(allowed))
    }
}

pub struct ProjectEvaluator;

impl Evaluator for ProjectEvaluator {
    fn name(&self) -> &'static str {
        "ProjectEvaluator"
    }

    fn evaluate(
        &self,
        subject: &Subject<'_>,
        requirement: Requirement,
        context: &ResourceContext,
    ) -> Result<Vote, EvaluatorError> {
        let Requirement::Project(operation) = requirement else {
            return Err(EvaluatorError::Unsupported {
                evaluator: self.name(),
                requirement,
            });
        };
        let ResourceContext::Project(_) = context else {
            return Ok(Vote::Deny);
        };
        let Some(rel) = relationship(subject, context) else {
            return Ok(Vote::Deny);
        };
        let manager = subject.principal.is_manager();

        let allowed = match operation {
            ProjectOperation::Read => {
                rel.team_member || rel.team_leader || rel.project_manager || manager
            }
            ProjectOperation::Create => rel.team_leader || manager,
            ProjectOperation::Update | ProjectOperation::Delete | ProjectOperation::ManageTasks => {
                rel.project_manager || rel.team_leader || manager
            }
        };

        Ok(Vote::from_bool(allowed))
    }
}

pub struct TaskEvaluator;

impl Evaluator for TaskEvaluator {
    fn name(&self) -> &'static str {
        "TaskEvaluator"
    }

    fn evaluate(
        &self,
        subject: &Subject<'_>,
        requirement: Requirement,
        context: &ResourceContext,
    ) -> Result<Vote, EvaluatorError> {
        let Requirement::Task(operation) = requirement else {
            return Err(EvaluatorError::Unsupported {
                evaluator: self.name(),
                requirement,
            });
        };
        let ResourceContext::Task(task) = context else {
            return Ok(Vote::Deny);
        };
        // Only creation may target a task that does not exist yet
        if task.task_id.is_none() && operation != TaskOperation::Create {
            return Ok(Vote::Deny);
        }
        let Some(rel) = relationship(subject, context) else {
            return Ok(Vote::Deny);
        };
        let supervisor = rel.project_manager || rel.team_leader;

        let allowed = match operation {
            TaskOperation::Read | TaskOperation::AddComment => {
                rel.team_member || rel.task_owner || rel.task_assignee || supervisor
            }
            TaskOperation::Create => rel.team_member || supervisor,
            TaskOperation::Update | TaskOperation::UpdateStatus => {
                rel.task_owner || rel.task_assignee || supervisor
            }
            TaskOperation::Delete => rel.task_owner || supervisor,
            TaskOperation::Assign => supervisor,
        };

        Ok(Vote::from_bool(allowed))
    }
}
