/// Identity administration
///
/// Roles, permissions, role assignments and permission grants. Every command
/// here is gated on the `"Administrator"` policy.
///
/// Role parents form a forest: [`SetRoleParent`] rejects any parent that would
/// close a cycle, reported as a validation failure on `parent_role_id`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::Services;
use crate::models::permission::Permission;
use crate::models::role::{Role, RoleHierarchy};
use crate::models::role_permission::RolePermission;
use crate::models::user::User;
use crate::models::user_role::UserRole;
use crate::pipeline::authorize::{Gate, Gated};
use crate::pipeline::mediator::Mediator;
use crate::pipeline::validation::{FieldRules, MustBeUnique, MustExist, Validator};
use crate::pipeline::{
    Handler, Pipeline, PipelineError, PipelineResult, Request, RequestContext, ValidationFailures,
};
use crate::store::StoreBackend;

/// Assertion every command in this module requires
pub const ADMINISTRATOR: &str = "Administrator";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRole {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub parent_role_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRoleParent {
    pub role_id: Uuid,
    /// `None` detaches the role from its parent
    pub parent_role_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePermission {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

macro_rules! admin_request {
    ($($request:ty => $response:ty),* $(,)?) => {
        $(
            impl Request for $request {
                type Response = $response;
                const NAME: &'static str = stringify!($request);
            }

            impl Gated for $request {
                fn gate(&self) -> Gate {
                    Gate::Policy(ADMINISTRATOR)
                }
            }
        )*
    };
}

admin_request! {
    CreateRole => Role,
    SetRoleParent => Role,
    CreatePermission => Permission,
    AssignRole => UserRole,
    GrantPermission => RolePermission,
}

/// Rejects a parent that is the role itself or one of its descendants
pub struct AcyclicParent {
    store: Arc<dyn StoreBackend>,
}

impl AcyclicParent {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Validator<SetRoleParent> for AcyclicParent {
    async fn validate(&self, request: &SetRoleParent) -> PipelineResult<ValidationFailures> {
        let Some(parent) = request.parent_role_id else {
            return Ok(ValidationFailures::new());
        };

        let uow = self.store.begin();
        let roles = uow.roles.get_where(&|_: &Role| true).await?;
        let hierarchy = RoleHierarchy::new(&roles);

        if hierarchy.would_cycle(request.role_id, parent) {
            return Ok(ValidationFailures::single(
                "parent_role_id",
                "Parent role would create a cycle in the role hierarchy",
            ));
        }
        Ok(ValidationFailures::new())
    }
}

pub struct RoleHandlers {
    store: Arc<dyn StoreBackend>,
}

impl RoleHandlers {
    pub fn new(services: &Services) -> Self {
        Self {
            store: services.store.clone(),
        }
    }
}

#[async_trait]
impl Handler<CreateRole> for RoleHandlers {
    async fn handle(&self, request: &CreateRole, ctx: &RequestContext) -> PipelineResult<Role> {
        let mut role = Role::new(&request.name, request.description.clone());
        role.set_parent(request.parent_role_id);

        let uow = self.store.begin();
        ctx.cancellable(uow.roles.insert(role.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }
}

#[async_trait]
impl Handler<SetRoleParent> for RoleHandlers {
    async fn handle(&self, request: &SetRoleParent, ctx: &RequestContext) -> PipelineResult<Role> {
        let uow = self.store.begin();
        let mut role = ctx
            .cancellable(uow.roles.get_by_id(request.role_id))
            .await??
            .ok_or(PipelineError::NotFound {
                entity: "Role",
                id: request.role_id,
            })?;

        role.set_parent(request.parent_role_id);
        ctx.cancellable(uow.roles.update(role.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(role_id = %role.id, parent_role_id = ?role.parent_role_id, "Role parent changed");
        Ok(role)
    }
}

#[async_trait]
impl Handler<CreatePermission> for RoleHandlers {
    async fn handle(&self, request: &CreatePermission, ctx: &RequestContext) -> PipelineResult<Permission> {
        let permission = Permission::new(&request.name, request.description.clone());

        let uow = self.store.begin();
        ctx.cancellable(uow.permissions.insert(permission.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(permission_id = %permission.id, name = %permission.name, "Permission created");
        Ok(permission)
    }
}

#[async_trait]
impl Handler<AssignRole> for RoleHandlers {
    async fn handle(&self, request: &AssignRole, ctx: &RequestContext) -> PipelineResult<UserRole> {
        let assignment = UserRole::new(request.user_id, request.role_id);

        let uow = self.store.begin();
        ctx.cancellable(uow.user_roles.insert(assignment.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(user_id = %request.user_id, role_id = %request.role_id, "Role assigned");
        Ok(assignment)
    }
}

#[async_trait]
impl Handler<GrantPermission> for RoleHandlers {
    async fn handle(&self, request: &GrantPermission, ctx: &RequestContext) -> PipelineResult<RolePermission> {
        let grant = RolePermission::new(request.role_id, request.permission_id);

        let uow = self.store.begin();
        ctx.cancellable(uow.role_permissions.insert(grant.clone())).await??;
        ctx.cancellable(uow.save_changes()).await??;

        info!(
            role_id = %request.role_id,
            permission_id = %request.permission_id,
            "Permission granted"
        );
        Ok(grant)
    }
}

pub fn register(mediator: &mut Mediator, services: &Services) {
    let handlers = Arc::new(RoleHandlers::new(services));
    let store = &services.store;

    let create_role: Vec<Arc<dyn Validator<CreateRole>>> = vec![
        Arc::new(FieldRules),
        Arc::new(MustBeUnique::<CreateRole, Role>::new(
            "name",
            "Role name is already taken",
            store.clone(),
            |r, role| role.name.eq_ignore_ascii_case(&r.name),
        )),
        Arc::new(MustExist::<CreateRole, Role>::new("parent_role_id", store.clone(), |r| r.parent_role_id)),
    ];

    let set_parent: Vec<Arc<dyn Validator<SetRoleParent>>> = vec![
        Arc::new(MustExist::<SetRoleParent, Role>::new("parent_role_id", store.clone(), |r| r.parent_role_id)),
        Arc::new(AcyclicParent::new(store.clone())),
    ];

    let create_permission: Vec<Arc<dyn Validator<CreatePermission>>> = vec![
        Arc::new(FieldRules),
        Arc::new(MustBeUnique::<CreatePermission, Permission>::new(
            "name",
            "Permission name is already taken",
            store.clone(),
            |r, p| p.name.eq_ignore_ascii_case(&r.name),
        )),
    ];

    let assign_role: Vec<Arc<dyn Validator<AssignRole>>> = vec![
        Arc::new(MustExist::<AssignRole, User>::new("user_id", store.clone(), |r| Some(r.user_id))),
        Arc::new(MustExist::<AssignRole, Role>::new("role_id", store.clone(), |r| Some(r.role_id))),
        Arc::new(MustBeUnique::<AssignRole, UserRole>::new(
            "role_id",
            "User already has this role",
            store.clone(),
            |r, ur| ur.user_id == r.user_id && ur.role_id == r.role_id,
        )),
    ];

    let grant_permission: Vec<Arc<dyn Validator<GrantPermission>>> = vec![
        Arc::new(MustExist::<GrantPermission, Role>::new("role_id", store.clone(), |r| Some(r.role_id))),
        Arc::new(MustExist::<GrantPermission, Permission>::new(
            "permission_id",
            store.clone(),
            |r| Some(r.permission_id),
        )),
        Arc::new(MustBeUnique::<GrantPermission, RolePermission>::new(
            "permission_id",
            "Role already has this permission",
            store.clone(),
            |r, rp| rp.role_id == r.role_id && rp.permission_id == r.permission_id,
        )),
    ];

    mediator
        .register(Pipeline::<CreateRole>::gated(handlers.clone(), create_role, services.authorization()))
        .register(Pipeline::<SetRoleParent>::gated(handlers.clone(), set_parent, services.authorization()))
        .register(Pipeline::<CreatePermission>::gated(handlers.clone(), create_permission, services.authorization()))
        .register(Pipeline::<AssignRole>::gated(handlers.clone(), assign_role, services.authorization()))
        .register(Pipeline::<GrantPermission>::gated(handlers, grant_permission, services.authorization()));
}
