/// Identity reads used by permission resolution and sign-in
///
/// Narrow queries over the identity tables. [`RepositoryIdentityStore`]
/// answers them through the generic repositories of any backend;
/// [`PgIdentityStore`] issues targeted SQL instead of table scans.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::{StoreBackend, StoreResult};
use crate::models::{permission::Permission, role_permission::RolePermission, user::User, user_role::UserRole};

/// Read access to users' roles and roles' permissions
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Every role assignment held by `user_id`
    async fn user_roles_for(&self, user_id: Uuid) -> StoreResult<Vec<UserRole>>;

    /// Every grant held by any of `role_ids`
    async fn role_permissions_for(&self, role_ids: &HashSet<Uuid>) -> StoreResult<Vec<RolePermission>>;

    /// Permissions with the given ids; unknown ids are skipped
    async fn permissions_by_ids(&self, permission_ids: &HashSet<Uuid>) -> StoreResult<Vec<Permission>>;

    /// The user registered under `email`, compared case-insensitively
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
}

/// Identity reads over generic repositories
pub struct RepositoryIdentityStore {
    store: Arc<dyn StoreBackend>,
}

impl RepositoryIdentityStore {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityStore for RepositoryIdentityStore {
    async fn user_roles_for(&self, user_id: Uuid) -> StoreResult<Vec<UserRole>> {
        self.store
            .begin()
            .user_roles
            .get_where(&|ur: &UserRole| ur.user_id == user_id)
            .await
    }

    async fn role_permissions_for(&self, role_ids: &HashSet<Uuid>) -> StoreResult<Vec<RolePermission>> {
        self.store
            .begin()
            .role_permissions
            .get_where(&|rp: &RolePermission| role_ids.contains(&rp.role_id))
            .await
    }

    async fn permissions_by_ids(&self, permission_ids: &HashSet<Uuid>) -> StoreResult<Vec<Permission>> {
        self.store
            .begin()
            .permissions
            .get_where(&|p: &Permission| permission_ids.contains(&p.id))
            .await
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self
            .store
            .begin()
            .users
            .get_where(&|u: &User| u.email.eq_ignore_ascii_case(email))
            .await?;

        Ok(users.into_iter().next())
    }
}

/// Identity reads with targeted PostgreSQL queries
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn user_roles_for(&self, user_id: Uuid) -> StoreResult<Vec<UserRole>> {
        let rows = sqlx::query_as::<_, UserRole>(
            r#"
            SELECT id, user_id, role_id, assigned_at
            FROM user_roles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn role_permissions_for(&self, role_ids: &HashSet<Uuid>) -> StoreResult<Vec<RolePermission>> {
        let ids: Vec<Uuid> = role_ids.iter().copied().collect();
        let rows = sqlx::query_as::<_, RolePermission>(
            r#"
            SELECT id, role_id, permission_id, granted_at
            FROM role_permissions
            WHERE role_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn permissions_by_ids(&self, permission_ids: &HashSet<Uuid>) -> StoreResult<Vec<Permission>> {
        let ids: Vec<Uuid> = permission_ids.iter().copied().collect();
        let rows = sqlx::query_as::<_, Permission>(
            r#"
            SELECT id, name, description, created_at
            FROM permissions
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, is_active, failed_login_count,
                   lockout_end, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn test_user_by_email_ignores_case() {
        let store: Arc<dyn StoreBackend> = Arc::new(InMemoryStore::new());
        let identity = RepositoryIdentityStore::new(store.clone());

        let user = User::new("Ada", "ada@example.com", "hash");
        let uow = store.begin();
        uow.users.insert(user.clone()).await.unwrap();
        assert!(identity.user_by_email("ada@example.com").await.unwrap().is_none());

        uow.save_changes().await.unwrap();
        let found = identity.user_by_email("ADA@Example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(identity.user_by_email("bea@example.com").await.unwrap().is_none());
    }
}
