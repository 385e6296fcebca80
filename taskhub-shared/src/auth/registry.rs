/// Policy registry
///
/// Maps every [`Requirement`] to the fixed list of evaluators whose votes are
/// OR-ed, and holds the named standalone assertions. The standard registry
/// gives each requirement three evaluators:
///
/// 1. [`AdminEvaluator`]
/// 2. the relationship evaluator for the requirement's resource type
/// 3. [`NamedPermissionEvaluator`]
///
/// Resource requirements additionally demand the `Authenticated` assertion.

use std::collections::HashMap;
use std::sync::Arc;

use super::evaluators::{
    AdminEvaluator, Administrator, Assertion, Authenticated, Evaluator, NamedPermissionEvaluator,
    ProjectEvaluator, TaskEvaluator, TeamEvaluator,
};
use super::requirement::{Requirement, ResourceType, UnknownPolicy};

/// Requirement to evaluator mapping
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    evaluators: HashMap<Requirement, Vec<Arc<dyn Evaluator>>>,
    assertions: HashMap<&'static str, Arc<dyn Assertion>>,
    required_assertions: Vec<&'static str>,
}

impl PolicyRegistry {
    /// Registry with no evaluators; every requirement is denied
    pub fn empty() -> Self {
        Self::default()
    }

    /// The production policy set
    pub fn standard() -> Self {
        let admin: Arc<dyn Evaluator> = Arc::new(AdminEvaluator);
        let named: Arc<dyn Evaluator> = Arc::new(NamedPermissionEvaluator);
        let team: Arc<dyn Evaluator> = Arc::new(TeamEvaluator);
        let project: Arc<dyn Evaluator> = Arc::new(ProjectEvaluator);
        let task: Arc<dyn Evaluator> = Arc::new(TaskEvaluator);

        let mut registry = Self::empty()
            .with_assertion(Arc::new(Authenticated))
            .with_assertion(Arc::new(Administrator))
            .require_assertion("Authenticated");

        for requirement in Requirement::all() {
            let relationship = match requirement.resource_type() {
                ResourceType::Team => team.clone(),
                ResourceType::Project => project.clone(),
                ResourceType::Task => task.clone(),
            };
            registry = registry
                .with_evaluator(requirement, admin.clone())
                .with_evaluator(requirement, relationship)
                .with_evaluator(requirement, named.clone());
        }

        registry
    }

    pub fn with_evaluator(mut self, requirement: Requirement, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluators.entry(requirement).or_default().push(evaluator);
        self
    }

    pub fn with_assertion(mut self, assertion: Arc<dyn Assertion>) -> Self {
        self.assertions.insert(assertion.name(), assertion);
        self
    }

    /// Makes a registered assertion mandatory for every resource requirement
    pub fn require_assertion(mut self, name: &'static str) -> Self {
        self.required_assertions.push(name);
        self
    }

    pub fn evaluators_for(&self, requirement: Requirement) -> &[Arc<dyn Evaluator>] {
        self.evaluators
            .get(&requirement)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn assertion(&self, name: &str) -> Result<&Arc<dyn Assertion>, UnknownPolicy> {
        self.assertions
            .get(name)
            .ok_or_else(|| UnknownPolicy(name.to_string()))
    }

    /// Assertions that gate every resource requirement
    pub fn required_assertions(&self) -> Result<Vec<&Arc<dyn Assertion>>, UnknownPolicy> {
        self.required_assertions
            .iter()
            .map(|name| self.assertion(name))
            .collect()
    }

    /// Resolves a requirement policy name such as `"TaskAssign"`
    pub fn requirement(&self, policy: &str) -> Result<Requirement, UnknownPolicy> {
        policy.parse()
    }
}
