/// Persistence contracts for TaskHub
///
/// Every entity is reached through the [`Repository`] contract: point reads by
/// id, predicate scans, and staged writes that only become visible once the
/// unit of work is saved. A [`UnitOfWork`] bundles one repository per entity
/// around a single [`ChangeSet`] and is created fresh for every request by a
/// [`StoreBackend`], so staged work never leaks between concurrent requests.
///
/// Saving is context-wide: [`UnitOfWork::save_changes`] (or `save_changes` on
/// any of its repositories) commits every change staged through any
/// repository of that unit of work, all or nothing.
///
/// # Backends
///
/// - `memory`: process-local tables, used by tests and by the API when no
///   database is configured
/// - `postgres`: sqlx-backed tables with unique constraints on join rows
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::user::User;
/// use taskhub_shared::store::{memory::InMemoryStore, StoreBackend};
///
/// # async fn example() -> Result<(), taskhub_shared::store::StoreError> {
/// let store = InMemoryStore::new();
/// let uow = store.begin();
///
/// uow.users.insert(User::new("Ada", "ada@example.com", "$argon2id$...")).await?;
/// let affected = uow.save_changes().await?;
/// assert_eq!(affected, 1);
/// # Ok(())
/// # }
/// ```

pub mod identity;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    permission::Permission,
    project::Project,
    role::Role,
    role_permission::RolePermission,
    task::{Task, TaskComment},
    team::{Team, TeamMember},
    user::User,
    user_role::UserRole,
};

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A staged insert collided with an existing row
    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: Uuid },

    /// A staged update or delete targeted a row that does not exist
    #[error("{entity} {id} not found")]
    Missing { entity: &'static str, id: Uuid },

    /// A uniqueness or foreign key constraint rejected the write
    #[error("Constraint violation: {0}")]
    Conflict(String),

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Predicate accepted by [`Repository::get_where`]
pub type Predicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// An addressable, persistable entity
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human-readable entity name used in errors and logs
    const NAME: &'static str;

    /// Stable identifier
    fn id(&self) -> Uuid;
}

/// Generic repository contract
///
/// Reads observe committed state only. `insert`, `update` and `delete` stage a
/// change in the owning unit of work; `save_changes` commits that whole unit
/// of work atomically and returns the number of affected rows. A failed commit
/// discards every staged change.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<T>>;

    async fn get_where(&self, predicate: Predicate<'_, T>) -> StoreResult<Vec<T>>;

    async fn insert(&self, entity: T) -> StoreResult<()>;

    async fn update(&self, entity: T) -> StoreResult<()>;

    async fn delete(&self, entity: T) -> StoreResult<()>;

    async fn save_changes(&self) -> StoreResult<u64>;
}

/// A staged write
#[derive(Debug, Clone)]
pub(crate) enum Change<T> {
    Insert(T),
    Update(T),
    Delete(T),
}

/// Every change staged in one unit of work
#[async_trait]
pub trait ChangeSet: Send + Sync {
    /// Number of staged changes not yet committed
    fn pending(&self) -> usize;

    /// Applies every staged change in one transaction
    async fn commit(&self) -> StoreResult<u64>;
}

/// One repository per entity, staging into a shared [`ChangeSet`]
#[derive(Clone)]
pub struct UnitOfWork {
    pub changes: Arc<dyn ChangeSet>,
    pub users: Arc<dyn Repository<User>>,
    pub roles: Arc<dyn Repository<Role>>,
    pub permissions: Arc<dyn Repository<Permission>>,
    pub user_roles: Arc<dyn Repository<UserRole>>,
    pub role_permissions: Arc<dyn Repository<RolePermission>>,
    pub teams: Arc<dyn Repository<Team>>,
    pub team_members: Arc<dyn Repository<TeamMember>>,
    pub projects: Arc<dyn Repository<Project>>,
    pub tasks: Arc<dyn Repository<Task>>,
    pub comments: Arc<dyn Repository<TaskComment>>,
}

/// Source of request-scoped units of work
pub trait StoreBackend: Send + Sync {
    /// Opens a fresh unit of work with no staged changes
    fn begin(&self) -> UnitOfWork;
}

/// Entities reachable through a [`UnitOfWork`]
pub trait Stored: Entity {
    fn repository(uow: &UnitOfWork) -> &Arc<dyn Repository<Self>>;
}

macro_rules! stored {
    ($($entity:ty => $field:ident),* $(,)?) => {
        $(
            impl Stored for $entity {
                fn repository(uow: &UnitOfWork) -> &Arc<dyn Repository<Self>> {
                    &uow.$field
                }
            }
        )*
    };
}

stored! {
    User => users,
    Role => roles,
    Permission => permissions,
    UserRole => user_roles,
    RolePermission => role_permissions,
    Team => teams,
    TeamMember => team_members,
    Project => projects,
    Task => tasks,
    TaskComment => comments,
}

impl UnitOfWork {
    /// Commits everything staged through any repository of this unit of work
    pub async fn save_changes(&self) -> StoreResult<u64> {
        self.changes.commit().await
    }

    /// Repository for `T`
    pub fn repository<T: Stored>(&self) -> &Arc<dyn Repository<T>> {
        T::repository(self)
    }
}
