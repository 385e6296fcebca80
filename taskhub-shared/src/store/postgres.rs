/// PostgreSQL store backend
///
/// Each entity's table is described through [`PgEntity`] at the bottom of this
/// module; the generic [`PgRepository`] derives its SQL from that description.
/// Changes staged through any repository of a unit of work are collected by
/// its [`PgChangeSet`] and applied inside a single transaction.
///
/// Predicates are Rust closures, so `get_where` loads the table and filters in
/// process. Hot paths that need targeted SQL (permission resolution, sign-in
/// by email) go through [`super::identity::PgIdentityStore`] instead.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnection, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, Postgres};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
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

/// Query type the entity binds its columns onto
pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Table mapping for an entity
pub trait PgEntity: Entity + for<'r> FromRow<'r, PgRow> + Unpin {
    /// Table name
    const TABLE: &'static str;

    /// Column names, `id` first, in the order `bind_columns` binds them
    const COLUMNS: &'static [&'static str];

    /// Binds every column value in `COLUMNS` order
    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q>;
}

fn select_sql<T: PgEntity>() -> String {
    format!("SELECT {} FROM {}", T::COLUMNS.join(", "), T::TABLE)
}

fn insert_sql<T: PgEntity>() -> String {
    let placeholders: Vec<String> = (1..=T::COLUMNS.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::TABLE,
        T::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

fn update_sql<T: PgEntity>() -> String {
    let assignments: Vec<String> = T::COLUMNS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, column)| format!("{} = ${}", column, i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE id = $1",
        T::TABLE,
        assignments.join(", ")
    )
}

/// A staged change that knows its own SQL
#[async_trait]
trait PgChange: Send + Sync {
    async fn apply(&self, conn: &mut PgConnection) -> StoreResult<u64>;
}

#[async_trait]
impl<T: PgEntity> PgChange for Change<T> {
    async fn apply(&self, conn: &mut PgConnection) -> StoreResult<u64> {
        let (entity, result) = match self {
            Change::Insert(entity) => {
                let sql = insert_sql::<T>();
                let result = entity.bind_columns(sqlx::query(&sql)).execute(&mut *conn).await?;
                return Ok(result.rows_affected());
            }
            Change::Update(entity) => {
                let sql = update_sql::<T>();
                (entity, entity.bind_columns(sqlx::query(&sql)).execute(&mut *conn).await?)
            }
            Change::Delete(entity) => {
                let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
                (entity, sqlx::query(&sql).bind(entity.id()).execute(&mut *conn).await?)
            }
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing {
                entity: T::NAME,
                id: entity.id(),
            });
        }
        Ok(result.rows_affected())
    }
}

/// Changes staged by one unit of work
pub struct PgChangeSet {
    pool: PgPool,
    staged: Mutex<Vec<Box<dyn PgChange>>>,
}

impl PgChangeSet {
    fn new(pool: PgPool) -> Self {
        Self {
            pool,
            staged: Mutex::new(Vec::new()),
        }
    }

    fn stage<T: PgEntity>(&self, change: Change<T>) {
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(change));
    }
}

#[async_trait]
impl ChangeSet for PgChangeSet {
    fn pending(&self) -> usize {
        self.staged.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn commit(&self) -> StoreResult<u64> {
        let staged = std::mem::take(&mut *self.staged.lock().unwrap_or_else(|e| e.into_inner()));
        if staged.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0u64;
        for change in &staged {
            affected += change.apply(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(affected, "Committed unit of work");
        Ok(affected)
    }
}

/// Repository over one PostgreSQL table
pub struct PgRepository<T: PgEntity> {
    pool: PgPool,
    changes: Arc<PgChangeSet>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: PgEntity> PgRepository<T> {
    /// Repository with its own change set
    pub fn new(pool: PgPool) -> Self {
        let changes = Arc::new(PgChangeSet::new(pool.clone()));
        Self::over(pool, changes)
    }

    fn over(pool: PgPool, changes: Arc<PgChangeSet>) -> Self {
        Self {
            pool,
            changes,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T: PgEntity> Repository<T> for PgRepository<T> {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<T>> {
        let sql = format!("{} WHERE id = $1", select_sql::<T>());
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn get_where(&self, predicate: Predicate<'_, T>) -> StoreResult<Vec<T>> {
        let sql = select_sql::<T>();
        let rows = sqlx::query_as::<_, T>(&sql).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().filter(|row| predicate(row)).collect())
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

/// PostgreSQL store backend
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl StoreBackend for PgStore {
    fn begin(&self) -> UnitOfWork {
        let changes = Arc::new(PgChangeSet::new(self.pool.clone()));
        let repo = || changes.clone();

        UnitOfWork {
            users: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            roles: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            permissions: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            user_roles: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            role_permissions: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            teams: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            team_members: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            projects: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            tasks: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            comments: Arc::new(PgRepository::over(self.pool.clone(), repo())),
            changes,
        }
    }
}

impl PgEntity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "password_hash",
        "is_active",
        "failed_login_count",
        "lockout_end",
        "created_at",
        "updated_at",
    ];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.name.clone())
            .bind(self.email.clone())
            .bind(self.password_hash.clone())
            .bind(self.is_active)
            .bind(self.failed_login_count)
            .bind(self.lockout_end)
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}

impl PgEntity for Role {
    const TABLE: &'static str = "roles";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "description", "parent_role_id", "created_at"];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.parent_role_id)
            .bind(self.created_at)
    }
}

impl PgEntity for Permission {
    const TABLE: &'static str = "permissions";
    const COLUMNS: &'static [&'static str] = &["id", "name", "description", "created_at"];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.created_at)
    }
}

impl PgEntity for UserRole {
    const TABLE: &'static str = "user_roles";
    const COLUMNS: &'static [&'static str] = &["id", "user_id", "role_id", "assigned_at"];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.user_id)
            .bind(self.role_id)
            .bind(self.assigned_at)
    }
}

impl PgEntity for RolePermission {
    const TABLE: &'static str = "role_permissions";
    const COLUMNS: &'static [&'static str] = &["id", "role_id", "permission_id", "granted_at"];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.role_id)
            .bind(self.permission_id)
            .bind(self.granted_at)
    }
}

impl PgEntity for Team {
    const TABLE: &'static str = "teams";
    const COLUMNS: &'static [&'static str] = &["id", "name", "leader_id", "created_at"];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.name.clone())
            .bind(self.leader_id)
            .bind(self.created_at)
    }
}

impl PgEntity for TeamMember {
    const TABLE: &'static str = "team_members";
    const COLUMNS: &'static [&'static str] = &["id", "team_id", "user_id", "joined_at"];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.team_id)
            .bind(self.user_id)
            .bind(self.joined_at)
    }
}

impl PgEntity for Project {
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static [&'static str] =
        &["id", "team_id", "name", "description", "manager_id", "created_at"];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.team_id)
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.manager_id)
            .bind(self.created_at)
    }
}

impl PgEntity for Task {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "project_id",
        "title",
        "description",
        "status",
        "owner_id",
        "assignee_id",
        "created_at",
        "updated_at",
    ];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.project_id)
            .bind(self.title.clone())
            .bind(self.description.clone())
            .bind(self.status)
            .bind(self.owner_id)
            .bind(self.assignee_id)
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}

impl PgEntity for TaskComment {
    const TABLE: &'static str = "task_comments";
    const COLUMNS: &'static [&'static str] = &["id", "task_id", "author_id", "body", "created_at"];

    fn bind_columns<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.id)
            .bind(self.task_id)
            .bind(self.author_id)
            .bind(self.body.clone())
            .bind(self.created_at)
    }
}
