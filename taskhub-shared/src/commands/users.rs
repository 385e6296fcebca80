/// User commands
///
/// - [`CreateUser`]: self-service sign-up; open to anonymous callers
/// - [`Login`]: exchanges credentials for an access token, with lockout after
///   repeated failures
/// - [`GetEffectivePermissions`]: a user's permission names; visible to the
///   user themself and to administrators
///
/// Passwords are exempt from sanitization so the bytes a user typed are the
/// bytes that get hashed. Hashing and verification run on the blocking pool.
/// Every store call and every hash runs under the request's cancellation, so
/// a request cancelled mid-handler stages nothing that gets committed.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{caller_id, Services};
use crate::auth::jwt::{create_token, Claims, ACCESS_TOKEN_HOURS};
use crate::auth::password::{hash_password, password_strength_failures, verify_password};
use crate::auth::principal::SystemRole;
use crate::auth::resolver::PermissionResolver;
use crate::models::user::User;
use crate::models::user_role::UserRole;
use crate::pipeline::mediator::Mediator;
use crate::pipeline::validation::{Check, FieldRules, Validator};
use crate::pipeline::{
    Handler, Pipeline, PipelineError, PipelineResult, Request, RequestContext, SanitizationRules,
    ValidationFailures,
};
use crate::store::identity::IdentityStore;
use crate::store::{StoreBackend, UnitOfWork};

const BAD_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

impl Request for CreateUser {
    type Response = User;
    const NAME: &'static str = "CreateUser";

    fn sanitization() -> SanitizationRules {
        SanitizationRules::none().skip("password", "hashed verbatim, never rendered")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Login {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl Request for Login {
    type Response = LoginResponse;
    const NAME: &'static str = "Login";

    fn sanitization() -> SanitizationRules {
        SanitizationRules::none().skip("password", "compared against the stored hash, never rendered")
    }
}

/// Issued access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    pub user_id: Uuid,
    pub role: SystemRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEffectivePermissions {
    pub user_id: Uuid,
}

impl Request for GetEffectivePermissions {
    /// Permission names, sorted
    type Response = Vec<String>;
    const NAME: &'static str = "GetEffectivePermissions";
}

pub struct UserHandlers {
    store: Arc<dyn StoreBackend>,
    identity: Arc<dyn IdentityStore>,
    resolver: PermissionResolver,
    jwt_secret: String,
}

impl UserHandlers {
    pub fn new(services: &Services) -> Self {
        Self {
            store: services.store.clone(),
            identity: services.identity.clone(),
            resolver: services.resolver.clone(),
            jwt_secret: services.jwt_secret.clone(),
        }
    }
}

/// Hashes on the blocking pool
pub(crate) async fn hash_blocking(password: String) -> PipelineResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(PipelineError::unhandled)?
        .map_err(PipelineError::unhandled)
}

/// System role derived from the names of the user's assigned roles
async fn system_role_of(uow: &UnitOfWork, user_id: Uuid) -> PipelineResult<SystemRole> {
    let assignments = uow.user_roles.get_where(&|ur: &UserRole| ur.user_id == user_id).await?;

    let mut names = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        if let Some(role) = uow.roles.get_by_id(assignment.role_id).await? {
            names.push(role.name);
        }
    }

    Ok(SystemRole::from_role_names(names.iter().map(String::as_str)))
}

#[async_trait]
impl Handler<CreateUser> for UserHandlers {
    async fn handle(&self, request: &CreateUser, ctx: &RequestContext) -> PipelineResult<User> {
        let password_hash = ctx.cancellable(hash_blocking(request.password.clone())).await??;
        let user = User::new(&request.name, &request.email, password_hash);

        let uow = self.store.begin();
        ctx.cancellable(uow.users.insert(user.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }
}

#[async_trait]
impl Handler<Login> for UserHandlers {
    async fn handle(&self, request: &Login, ctx: &RequestContext) -> PipelineResult<LoginResponse> {
        let uow = self.store.begin();
        let now = Utc::now();

        let Some(mut user) = ctx.cancellable(self.identity.user_by_email(&request.email)).await?? else {
            return Err(PipelineError::Unauthenticated(BAD_CREDENTIALS.to_string()));
        };

        if !user.is_active {
            return Err(PipelineError::Unauthenticated("Account is disabled".to_string()));
        }
        if user.is_locked_out(now) {
            return Err(PipelineError::Unauthenticated(
                "Account is temporarily locked".to_string(),
            ));
        }

        let password = request.password.clone();
        let hash = user.password_hash.clone();
        let verified = ctx
            .cancellable(tokio::task::spawn_blocking(move || verify_password(&password, &hash)))
            .await?
            .map_err(PipelineError::unhandled)?
            .map_err(PipelineError::unhandled)?;

        if !verified {
            let locked = user.record_failed_login(now);
            ctx.cancellable(uow.users.update(user.clone())).await??;
            ctx.cancellable(uow.save_changes()).await??;

            if locked {
                warn!(user_id = %user.id, "Account locked after repeated failed logins");
            }
            return Err(PipelineError::Unauthenticated(BAD_CREDENTIALS.to_string()));
        }

        user.record_successful_login(now);
        ctx.cancellable(uow.users.update(user.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        let role = ctx.cancellable(system_role_of(&uow, user.id)).await??;
        let claims = Claims::new(user.id, role);
        let access_token = create_token(&claims, &self.jwt_secret).map_err(PipelineError::unhandled)?;

        info!(user_id = %user.id, role = %role, "User signed in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: ACCESS_TOKEN_HOURS * 3600,
            user_id: user.id,
            role,
        })
    }
}

#[async_trait]
impl Handler<GetEffectivePermissions> for UserHandlers {
    async fn handle(
        &self,
        request: &GetEffectivePermissions,
        ctx: &RequestContext,
    ) -> PipelineResult<Vec<String>> {
        let caller = caller_id(ctx)?;
        if caller != request.user_id && !ctx.principal().is_admin() {
            return Err(PipelineError::Forbidden(
                "Only administrators can inspect other users' permissions".to_string(),
            ));
        }

        let uow = self.store.begin();
        if ctx.cancellable(uow.users.get_by_id(request.user_id)).await??.is_none() {
            return Err(PipelineError::NotFound {
                entity: "User",
                id: request.user_id,
            });
        }

        let mut names: Vec<String> = ctx
            .cancellable(self.resolver.effective_permission_names(request.user_id))
            .await??
            .into_iter()
            .collect();
        names.sort();
        Ok(names)
    }
}

fn password_strength(request: &CreateUser) -> ValidationFailures {
    let mut failures = ValidationFailures::new();
    for message in password_strength_failures(&request.password) {
        failures.add("password", message);
    }
    failures
}

/// Rejects sign-ups whose email is already registered, in any letter case
pub struct EmailAvailable {
    identity: Arc<dyn IdentityStore>,
}

impl EmailAvailable {
    pub fn new(identity: Arc<dyn IdentityStore>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl Validator<CreateUser> for EmailAvailable {
    async fn validate(&self, request: &CreateUser) -> PipelineResult<ValidationFailures> {
        match self.identity.user_by_email(&request.email).await? {
            Some(_) => Ok(ValidationFailures::single("email", "Email is already registered")),
            None => Ok(ValidationFailures::new()),
        }
    }
}

pub fn register(mediator: &mut Mediator, services: &Services) {
    let handlers = Arc::new(UserHandlers::new(services));

    let create_user: Vec<Arc<dyn Validator<CreateUser>>> = vec![
        Arc::new(FieldRules),
        Arc::new(Check::new(password_strength)),
        Arc::new(EmailAvailable::new(services.identity.clone())),
    ];

    let login: Vec<Arc<dyn Validator<Login>>> = vec![Arc::new(FieldRules)];

    mediator
        .register(Pipeline::<CreateUser>::new(handlers.clone(), create_user))
        .register(Pipeline::<Login>::new(handlers.clone(), login))
        .register(Pipeline::<GetEffectivePermissions>::new(handlers, Vec::new()));
}
