/// Authorization aggregator
///
/// The [`Authorizer`] answers one requirement for one caller against one
/// resource context:
///
/// 1. every required assertion must hold (AND)
/// 2. the caller's effective permissions are resolved
/// 3. every registered evaluator votes; one `Allow` grants (OR)
///
/// Anything else is a deny: no evaluators registered, no `Allow` vote, an
/// evaluator that returns an error, or an evaluator that panics. Each call
/// produces an [`AuthorizationDecision`] listing every vote, logged at debug
/// level; denials are logged at warn level.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhub_shared::auth::authorization::Authorizer;
/// use taskhub_shared::auth::context::{ResourceContext, TeamContext};
/// use taskhub_shared::auth::principal::{Principal, SystemRole};
/// use taskhub_shared::auth::registry::PolicyRegistry;
/// use taskhub_shared::auth::requirement::{Requirement, TeamOperation};
/// use taskhub_shared::auth::resolver::PermissionResolver;
/// use taskhub_shared::store::identity::RepositoryIdentityStore;
/// use taskhub_shared::store::memory::InMemoryStore;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(InMemoryStore::new());
/// let resolver = PermissionResolver::new(Arc::new(RepositoryIdentityStore::new(store)));
/// let authorizer = Authorizer::new(Arc::new(PolicyRegistry::standard()), resolver);
///
/// let principal = Principal::user(Uuid::new_v4(), SystemRole::Manager);
/// let context = ResourceContext::Team(TeamContext::default());
/// authorizer
///     .authorize(&principal, Requirement::Team(TeamOperation::Create), &context)
///     .await?;
/// # Ok(())
/// # }
/// ```

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::context::ResourceContext;
use super::evaluators::{Subject, Vote};
use super::principal::Principal;
use super::registry::PolicyRegistry;
use super::requirement::{Requirement, UnknownPolicy};
use super::resolver::PermissionResolver;
use crate::panic_message;
use crate::store::StoreError;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The caller does not hold the requirement or policy
    #[error("Access denied: {policy}")]
    Denied { policy: String },

    #[error(transparent)]
    UnknownPolicy(#[from] UnknownPolicy),

    /// Effective permissions could not be read
    #[error("Permission resolution failed: {0}")]
    Resolution(#[from] StoreError),
}

/// One evaluator's contribution to a decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Allow,
    Deny,
    /// The evaluator failed or panicked; counted as a deny
    Errored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorVote {
    pub evaluator: &'static str,
    pub outcome: VoteOutcome,
}

/// Outcome of one authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub requirement: Requirement,

    pub user_id: Option<Uuid>,

    pub resource_id: Option<Uuid>,

    pub allowed: bool,

    /// Set when a required assertion failed before any evaluator ran
    pub failed_assertion: Option<&'static str>,

    pub votes: Vec<EvaluatorVote>,
}

impl AuthorizationDecision {
    fn denied_by_assertion(
        requirement: Requirement,
        principal: &Principal,
        context: &ResourceContext,
        assertion: &'static str,
    ) -> Self {
        Self {
            requirement,
            user_id: principal.user_id(),
            resource_id: context.resource_id(),
            allowed: false,
            failed_assertion: Some(assertion),
            votes: Vec::new(),
        }
    }
}

/// Combines evaluator votes into decisions
#[derive(Clone)]
pub struct Authorizer {
    registry: Arc<PolicyRegistry>,
    resolver: PermissionResolver,
}

impl Authorizer {
    pub fn new(registry: Arc<PolicyRegistry>, resolver: PermissionResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Evaluates `requirement` and reports every vote
    pub async fn decide(
        &self,
        principal: &Principal,
        requirement: Requirement,
        context: &ResourceContext,
    ) -> Result<AuthorizationDecision, AuthzError> {
        for assertion in self.registry.required_assertions()? {
            if !assertion.holds(principal) {
                let decision =
                    AuthorizationDecision::denied_by_assertion(requirement, principal, context, assertion.name());
                log_decision(&decision);
                return Ok(decision);
            }
        }

        let permissions = match principal.user_id() {
            Some(user_id) => self.resolver.effective_permission_names(user_id).await?,
            None => HashSet::new(),
        };
        let subject = Subject {
            principal,
            permissions: &permissions,
        };

        let votes: Vec<EvaluatorVote> = self
            .registry
            .evaluators_for(requirement)
            .iter()
            .map(|evaluator| {
                let outcome = match catch_unwind(AssertUnwindSafe(|| {
                    evaluator.evaluate(&subject, requirement, context)
                })) {
                    Ok(Ok(Vote::Allow)) => VoteOutcome::Allow,
                    Ok(Ok(Vote::Deny)) => VoteOutcome::Deny,
                    Ok(Err(e)) => VoteOutcome::Errored(e.to_string()),
                    Err(panic) => VoteOutcome::Errored(panic_message(panic.as_ref())),
                };

                if let VoteOutcome::Errored(reason) = &outcome {
                    error!(
                        evaluator = evaluator.name(),
                        requirement = %requirement,
                        error = %reason,
                        "Evaluator failed, counting as deny"
                    );
                }

                EvaluatorVote {
                    evaluator: evaluator.name(),
                    outcome,
                }
            })
            .collect();

        let decision = AuthorizationDecision {
            requirement,
            user_id: principal.user_id(),
            resource_id: context.resource_id(),
            allowed: votes.iter().any(|v| v.outcome == VoteOutcome::Allow),
            failed_assertion: None,
            votes,
        };

        log_decision(&decision);
        Ok(decision)
    }

    /// Like [`Authorizer::decide`], but a deny becomes [`AuthzError::Denied`]
    pub async fn authorize(
        &self,
        principal: &Principal,
        requirement: Requirement,
        context: &ResourceContext,
    ) -> Result<AuthorizationDecision, AuthzError> {
        let decision = self.decide(principal, requirement, context).await?;

        if !decision.allowed {
            return Err(AuthzError::Denied {
                policy: requirement.policy_name(),
            });
        }
        Ok(decision)
    }

    /// Checks a standalone assertion policy by name, e.g. `"Administrator"`
    pub fn assert_policy(&self, principal: &Principal, policy: &str) -> Result<(), AuthzError> {
        let assertion = self.registry.assertion(policy)?;

        if !assertion.holds(principal) {
            warn!(
                user_id = ?principal.user_id(),
                policy = policy,
                "Authorization denied"
            );
            return Err(AuthzError::Denied {
                policy: policy.to_string(),
            });
        }
        Ok(())
    }
}

fn log_decision(decision: &AuthorizationDecision) {
    debug!(
        requirement = %decision.requirement,
        user_id = ?decision.user_id,
        resource_id = ?decision.resource_id,
        allowed = decision.allowed,
        votes = ?decision.votes,
        "Authorization decision"
    );

    if !decision.allowed {
        warn!(
            requirement = %decision.requirement,
            user_id = ?decision.user_id,
            resource_id = ?decision.resource_id,
            failed_assertion = ?decision.failed_assertion,
            "Authorization denied"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::{ProjectContext, TaskContext, TeamContext};
    use crate::auth::evaluators::{Evaluator, EvaluatorError};
    use crate::auth::principal::SystemRole;
    use crate::auth::requirement::TaskOperation;
    use crate::store::identity::RepositoryIdentityStore;
    use crate::store::memory::InMemoryStore;

    struct Failing;

    impl Evaluator for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn evaluate(&self, _: &Subject<'_>, _: Requirement, _: &ResourceContext) -> Result<Vote, EvaluatorError> {
            Err(EvaluatorError::Failed("lookup exploded".to_string()))
        }
    }

    struct Panicking;

    impl Evaluator for Panicking {
        fn name(&self) -> &'static str {
            "Panicking"
        }

        fn evaluate(&self, _: &Subject<'_>, _: Requirement, _: &ResourceContext) -> Result<Vote, EvaluatorError> {
            panic!("evaluator bug")
        }
    }

    fn authorizer(registry: PolicyRegistry) -> Authorizer {
        let store = Arc::new(InMemoryStore::new());
        let resolver = PermissionResolver::new(Arc::new(RepositoryIdentityStore::new(store)));
        Authorizer::new(Arc::new(registry), resolver)
    }

    fn task_context(owner: Uuid) -> ResourceContext {
        ResourceContext::Task(TaskContext {
            task_id: Some(Uuid::new_v4()),
            owner_id: Some(owner),
            assignee_id: None,
            project: ProjectContext {
                project_id: Some(Uuid::new_v4()),
                manager_id: Some(Uuid::new_v4()),
                team: TeamContext {
                    team_id: Some(Uuid::new_v4()),
                    leader_id: Some(Uuid::new_v4()),
                    member_ids: HashSet::new(),
                },
            },
        })
    }

    const DELETE: Requirement = Requirement::Task(TaskOperation::Delete);

    #[tokio::test]
    async fn test_unrelated_member_denied_without_veto() {
        let authorizer = authorizer(PolicyRegistry::standard());
        let principal = Principal::user(Uuid::new_v4(), SystemRole::Member);

        let decision = authorizer.decide(&principal, DELETE, &task_context(Uuid::new_v4())).await.unwrap();

        assert!(!decision.allowed);
        assert_eq!(decision.votes.len(), 3);
        assert!(decision.votes.iter().all(|v| v.outcome == VoteOutcome::Deny));
    }

    #[tokio::test]
    async fn test_admin_allowed_everything() {
        let authorizer = authorizer(PolicyRegistry::standard());
        let principal = Principal::user(Uuid::new_v4(), SystemRole::Admin);

        let decision = authorizer.authorize(&principal, DELETE, &task_context(Uuid::new_v4())).await.unwrap();
        assert_eq!(decision.votes[0].outcome, VoteOutcome::Allow);
    }

    #[tokio::test]
    async fn test_owner_allowed_by_relationship() {
        let authorizer = authorizer(PolicyRegistry::standard());
        let owner = Uuid::new_v4();
        let principal = Principal::user(owner, SystemRole::Member);

        let decision = authorizer.decide(&principal, DELETE, &task_context(owner)).await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_no_evaluators_is_deny() {
        let authorizer = authorizer(PolicyRegistry::empty());
        let principal = Principal::user(Uuid::new_v4(), SystemRole::Admin);

        let err = authorizer.authorize(&principal, DELETE, &task_context(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AuthzError::Denied { ref policy } if policy == "TaskDelete"));
    }

    #[tokio::test]
    async fn test_failing_and_panicking_evaluators_deny() {
        let registry = PolicyRegistry::empty()
            .with_evaluator(DELETE, Arc::new(Failing))
            .with_evaluator(DELETE, Arc::new(Panicking));
        let authorizer = authorizer(registry);
        let principal = Principal::user(Uuid::new_v4(), SystemRole::Admin);

        let decision = authorizer.decide(&principal, DELETE, &task_context(Uuid::new_v4())).await.unwrap();

        assert!(!decision.allowed);
        assert!(matches!(decision.votes[0].outcome, VoteOutcome::Errored(ref m) if m.contains("lookup exploded")));
        assert!(matches!(decision.votes[1].outcome, VoteOutcome::Errored(ref m) if m.contains("evaluator bug")));
    }

    #[tokio::test]
    async fn test_erroring_evaluator_does_not_block_other_allow() {
        let registry = PolicyRegistry::empty()
            .with_evaluator(DELETE, Arc::new(Panicking))
            .with_evaluator(DELETE, Arc::new(crate::auth::evaluators::AdminEvaluator));
        let authorizer = authorizer(registry);
        let principal = Principal::user(Uuid::new_v4(), SystemRole::Admin);

        assert!(authorizer.decide(&principal, DELETE, &task_context(Uuid::new_v4())).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_anonymous_fails_authenticated_assertion() {
        let authorizer = authorizer(PolicyRegistry::standard());

        let decision = authorizer
            .decide(&Principal::anonymous(), DELETE, &task_context(Uuid::new_v4()))
            .await
            .unwrap();

        assert!(!decision.allowed);
        assert_eq!(decision.failed_assertion, Some("Authenticated"));
        assert!(decision.votes.is_empty());
    }

    #[test]
    fn test_assert_policy() {
        let authorizer = authorizer(PolicyRegistry::standard());
        let admin = Principal::user(Uuid::new_v4(), SystemRole::Admin);
        let member = Principal::user(Uuid::new_v4(), SystemRole::Member);

        assert!(authorizer.assert_policy(&admin, "Administrator").is_ok());
        assert!(matches!(
            authorizer.assert_policy(&member, "Administrator"),
            Err(AuthzError::Denied { .. })
        ));
        assert!(matches!(
            authorizer.assert_policy(&admin, "Superuser"),
            Err(AuthzError::UnknownPolicy(_))
        ));
    }
}
