/// In-memory store backend
///
/// Every table lives in one [`Database`] behind a single `RwLock`, shared by
/// all units of work opened from the same [`InMemoryStore`]. Staged changes
/// are collected by the unit of work's [`MemoryChangeSet`]; committing applies
/// them to a copy of the database and swaps the copy in only when every change
/// succeeds, so a unit of work lands whole or not at all.
///
/// No uniqueness is enforced beyond primary keys. Duplicate join rows are
/// prevented by the command validators alone.

use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{Change, ChangeSet, Entity, Predicate, Repository, StoreBackend, StoreError, StoreResult, UnitOfWork};
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

/// Every table of the in-memory store
#[derive(Clone, Default)]
pub struct Database {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    user_roles: HashMap<Uuid, UserRole>,
    role_permissions: HashMap<Uuid, RolePermission>,
    teams: HashMap<Uuid, Team>,
    team_members: HashMap<Uuid, TeamMember>,
    projects: HashMap<Uuid, Project>,
    tasks: HashMap<Uuid, Task>,
    comments: HashMap<Uuid, TaskComment>,
}

type Shared = Arc<RwLock<Database>>;

/// Entity with a table in [`Database`]
pub trait MemoryEntity: Entity {
    fn table(db: &Database) -> &HashMap<Uuid, Self>;

    fn table_mut(db: &mut Database) -> &mut HashMap<Uuid, Self>;
}

macro_rules! memory_tables {
    ($($entity:ty => $field:ident),* $(,)?) => {
        $(
            impl MemoryEntity for $entity {
                fn table(db: &Database) -> &HashMap<Uuid, Self> {
                    &db.$field
                }

                fn table_mut(db: &mut Database) -> &mut HashMap<Uuid, Self> {
                    &mut db.$field
                }
            }
        )*
    };
}

memory_tables! {
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

fn apply<T: MemoryEntity>(change: Change<T>, db: &mut Database) -> StoreResult<()> {
    let table = T::table_mut(db);
    match change {
        Change::Insert(entity) => {
            if table.contains_key(&entity.id()) {
                return Err(StoreError::Duplicate {
                    entity: T::NAME,
                    id: entity.id(),
                });
            }
            table.insert(entity.id(), entity);
        }
        Change::Update(entity) => match table.get_mut(&entity.id()) {
            Some(row) => *row = entity,
            None => {
                return Err(StoreError::Missing {
                    entity: T::NAME,
                    id: entity.id(),
                })
            }
        },
        Change::Delete(entity) => {
            if table.remove(&entity.id()).is_none() {
                return Err(StoreError::Missing {
                    entity: T::NAME,
                    id: entity.id(),
                });
            }
        }
    }
    Ok(())
}

type StagedChange = Box<dyn FnOnce(&mut Database) -> StoreResult<()> + Send>;

/// Changes staged by one unit of work
pub struct MemoryChangeSet {
    db: Shared,
    staged: Mutex<Vec<StagedChange>>,
}

impl MemoryChangeSet {
    fn new(db: Shared) -> Self {
        Self {
            db,
            staged: Mutex::new(Vec::new()),
        }
    }

    fn stage<T: MemoryEntity>(&self, change: Change<T>) {
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(move |db: &mut Database| apply(change, db)));
    }
}

#[async_trait]
impl ChangeSet for MemoryChangeSet {
    fn pending(&self) -> usize {
        self.staged.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn commit(&self) -> StoreResult<u64> {
        let staged = std::mem::take(&mut *self.staged.lock().unwrap_or_else(|e| e.into_inner()));
        if staged.is_empty() {
            return Ok(0);
        }

        let affected = staged.len();
        let mut db = self.db.write().unwrap_or_else(|e| e.into_inner());
        let mut next = db.clone();
        for change in staged {
            change(&mut next)?;
        }

        *db = next;
        debug!(affected, "Committed unit of work");
        Ok(affected as u64)
    }
}

/// Repository over one in-memory table
pub struct InMemoryRepository<T: MemoryEntity> {
    db: Shared,
    changes: Arc<MemoryChangeSet>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: MemoryEntity> InMemoryRepository<T> {
    /// Creates a repository over an empty, private database
    pub fn new() -> Self {
        let db: Shared = Arc::new(RwLock::new(Database::default()));
        let changes = Arc::new(MemoryChangeSet::new(db.clone()));
        Self::over(db, changes)
    }

    fn over(db: Shared, changes: Arc<MemoryChangeSet>) -> Self {
        Self {
            db,
            changes,
            _entity: PhantomData,
        }
    }

    /// Number of changes staged in the owning unit of work but not yet saved
    pub fn pending_changes(&self) -> usize {
        self.changes.pending()
    }
}

impl<T: MemoryEntity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: MemoryEntity> Repository<T> for InMemoryRepository<T> {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<T>> {
        let db = self.db.read().unwrap_or_else(|e| e.into_inner());
        Ok(T::table(&db).get(&id).cloned())
    }

    async fn get_where(&self, predicate: Predicate<'_, T>) -> StoreResult<Vec<T>> {
        let db = self.db.read().unwrap_or_else(|e| e.into_inner());
        Ok(T::table(&db).values().filter(|row| predicate(row)).cloned().collect())
    }

    async fn insert(&self, entity: T) -> StoreResult<()> {
        self.changes.stage(Change::Insert(entity));
        Ok(())
    }

    async fn update(&self, entity: T) -> StoreResult<()> {
        self.changes.stage(Change::Update(entity));
        Ok(())
    }

    async fn delete(&self, entity: T) -> StoreResult<()> {
        self.changes.stage(Change::Delete(entity));
        Ok(())
    }

    async fn save_changes(&self) -> StoreResult<u64> {
        self.changes.commit().await
    }
}

/// Process-local store backend
#[derive(Clone, Default)]
pub struct InMemoryStore {
    db: Shared,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for InMemoryStore {
    fn begin(&self) -> UnitOfWork {
        let changes = Arc::new(MemoryChangeSet::new(self.db.clone()));
        let repo = || changes.clone();

        UnitOfWork {
            users: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            roles: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            permissions: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            user_roles: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            role_permissions: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            teams: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            team_members: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            projects: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            tasks: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            comments: Arc::new(InMemoryRepository::over(self.db.clone(), repo())),
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_staged_insert_invisible_until_saved() {
        let repo = InMemoryRepository::<Permission>::new();
        let permission = Permission::new("Task.Delete", None);
        let id = permission.id;

        repo.insert(permission).await.unwrap();
        assert_eq!(repo.pending_changes(), 1);
        assert!(repo.get_by_id(id).await.unwrap().is_none());

        let affected = repo.save_changes().await.unwrap();
        assert_eq!(affected, 1);
        assert_eq!(repo.pending_changes(), 0);
        assert!(repo.get_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_without_changes_affects_nothing() {
        let repo = InMemoryRepository::<Permission>::new();
        assert_eq!(repo.save_changes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_where_filters_committed_rows() {
        let repo = InMemoryRepository::<Permission>::new();
        repo.insert(Permission::new("Task.Read", None)).await.unwrap();
        repo.insert(Permission::new("Task.Delete", None)).await.unwrap();
        repo.insert(Permission::new("Team.Read", None)).await.unwrap();
        repo.save_changes().await.unwrap();

        let task_permissions = repo
            .get_where(&|p: &Permission| p.name.starts_with("Task."))
            .await
            .unwrap();
        assert_eq!(task_permissions.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_save_applies_nothing() {
        let repo = InMemoryRepository::<Permission>::new();
        let kept = Permission::new("Team.Read", None);
        let ghost = Permission::new("Team.Delete", None);

        repo.insert(kept.clone()).await.unwrap();
        repo.delete(ghost).await.unwrap();

        let err = repo.save_changes().await.unwrap_err();
        assert!(matches!(err, StoreError::Missing { .. }));
        assert!(repo.get_by_id(kept.id).await.unwrap().is_none());
        assert_eq!(repo.pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let repo = InMemoryRepository::<Permission>::new();
        let permission = Permission::new("Task.Read", None);
        repo.insert(permission.clone()).await.unwrap();
        repo.save_changes().await.unwrap();

        repo.insert(permission).await.unwrap();
        let err = repo.save_changes().await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_units_of_work_share_tables_not_staging() {
        let store = InMemoryStore::new();
        let first = store.begin();
        let second = store.begin();

        let permission = Permission::new("Project.Read", None);
        let id = permission.id;
        first.permissions.insert(permission).await.unwrap();

        assert_eq!(second.permissions.save_changes().await.unwrap(), 0);
        assert!(second.permissions.get_by_id(id).await.unwrap().is_none());

        first.permissions.save_changes().await.unwrap();
        assert!(second.permissions.get_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_saving_one_repository_commits_the_whole_unit() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let team = Team::new("Core", Uuid::new_v4());
        let member = TeamMember::new(team.id, team.leader_id);

        uow.teams.insert(team.clone()).await.unwrap();
        uow.team_members.insert(member.clone()).await.unwrap();
        assert_eq!(uow.changes.pending(), 2);

        assert_eq!(uow.teams.save_changes().await.unwrap(), 2);
        assert_eq!(uow.team_members.save_changes().await.unwrap(), 0);

        let reader = store.begin();
        assert!(reader.teams.get_by_id(team.id).await.unwrap().is_some());
        assert!(reader.team_members.get_by_id(member.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failure_in_one_table_rolls_back_every_table() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let permission = Permission::new("Team.Read", None);
        let ghost = User::new("Ghost", "ghost@example.com", "unused");

        uow.permissions.insert(permission.clone()).await.unwrap();
        uow.users.delete(ghost).await.unwrap();

        let err = uow.save_changes().await.unwrap_err();
        assert!(matches!(err, StoreError::Missing { entity: "User", .. }));
        assert!(store.begin().permissions.get_by_id(permission.id).await.unwrap().is_none());
        assert_eq!(uow.changes.pending(), 0);
    }
}
