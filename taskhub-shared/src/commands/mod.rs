/// Commands and queries
///
/// Each module defines its request types, their validators and one handler
/// struct implementing [`Handler`](crate::pipeline::Handler) for each of them,
/// plus a `register` function that installs their pipelines.
///
/// # Modules
///
/// - `users`: sign-up, sign-in and effective permission queries
/// - `roles`: roles, permissions, assignments and grants (administrators only)
/// - `teams`: teams and membership
/// - `projects`: projects within a team
/// - `tasks`: tasks, assignment, status and comments
/// - `seed`: bootstrap administrator

pub mod projects;
pub mod roles;
pub mod seed;
pub mod tasks;
pub mod teams;
pub mod users;

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::authorization::Authorizer;
use crate::auth::registry::PolicyRegistry;
use crate::auth::resolver::PermissionResolver;
use crate::pipeline::authorize::Authorization;
use crate::pipeline::mediator::Mediator;
use crate::pipeline::{PipelineError, PipelineResult, RequestContext};
use crate::store::identity::{IdentityStore, RepositoryIdentityStore};
use crate::store::memory::InMemoryStore;
use crate::store::StoreBackend;

/// Collaborators shared by every handler
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn StoreBackend>,
    /// Targeted identity lookups
    pub identity: Arc<dyn IdentityStore>,
    pub resolver: PermissionResolver,
    pub authorizer: Authorizer,
    /// Secret used to sign access tokens
    pub jwt_secret: String,
}

impl Services {
    pub fn new(store: Arc<dyn StoreBackend>, identity: Arc<dyn IdentityStore>, jwt_secret: impl Into<String>) -> Self {
        let resolver = PermissionResolver::new(identity.clone());
        let authorizer = Authorizer::new(Arc::new(PolicyRegistry::standard()), resolver.clone());
        Self {
            store,
            identity,
            resolver,
            authorizer,
            jwt_secret: jwt_secret.into(),
        }
    }

    /// Services over a fresh in-memory store
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        let store: Arc<dyn StoreBackend> = Arc::new(InMemoryStore::new());
        let identity = Arc::new(RepositoryIdentityStore::new(store.clone()));
        Self::new(store, identity, jwt_secret)
    }

    /// Authorization behavior over these services
    pub fn authorization(&self) -> Authorization {
        Authorization::new(self.authorizer.clone(), self.store.clone())
    }
}

/// Mediator with every command and query registered
pub fn build_mediator(services: &Services) -> Mediator {
    let mut mediator = Mediator::new();
    users::register(&mut mediator, services);
    roles::register(&mut mediator, services);
    teams::register(&mut mediator, services);
    projects::register(&mut mediator, services);
    tasks::register(&mut mediator, services);
    mediator
}

/// User id of the caller, required by every handler that records authorship
pub(crate) fn caller_id(ctx: &RequestContext) -> PipelineResult<Uuid> {
    ctx.principal()
        .user_id()
        .ok_or_else(|| PipelineError::Unauthenticated("An identity is required".to_string()))
}
