/// Effective permission resolution
///
/// A user's effective permissions are the union of the permissions granted to
/// the roles assigned directly to them. Parent roles contribute nothing.
///
/// Resolution is three reads, each skipped when the previous one produced no
/// ids:
///
/// 1. the user's role assignments → distinct role ids
/// 2. the grants of those roles → distinct permission ids
/// 3. the permissions themselves
///
/// Nothing is cached; each call observes the store as it is now. An unknown
/// user resolves to the empty set.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::permission::Permission;
use crate::store::identity::IdentityStore;
use crate::store::StoreResult;

/// Computes effective permission sets
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn IdentityStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Permissions granted to `user_id` through directly assigned roles
    pub async fn effective_permissions(&self, user_id: Uuid) -> StoreResult<HashSet<Permission>> {
        let role_ids: HashSet<Uuid> = self
            .store
            .user_roles_for(user_id)
            .await?
            .into_iter()
            .map(|ur| ur.role_id)
            .collect();

        if role_ids.is_empty() {
            debug!(user_id = %user_id, "User has no role assignments");
            return Ok(HashSet::new());
        }

        let permission_ids: HashSet<Uuid> = self
            .store
            .role_permissions_for(&role_ids)
            .await?
            .into_iter()
            .map(|rp| rp.permission_id)
            .collect();

        if permission_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let permissions: HashSet<Permission> = self
            .store
            .permissions_by_ids(&permission_ids)
            .await?
            .into_iter()
            .collect();

        debug!(
            user_id = %user_id,
            roles = role_ids.len(),
            permissions = permissions.len(),
            "Resolved effective permissions"
        );

        Ok(permissions)
    }

    /// Names of the effective permissions
    pub async fn effective_permission_names(&self, user_id: Uuid) -> StoreResult<HashSet<String>> {
        Ok(self
            .effective_permissions(user_id)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{role::Role, role_permission::RolePermission, user_role::UserRole};
    use crate::store::identity::RepositoryIdentityStore;
    use crate::store::{memory::InMemoryStore, StoreBackend};

    fn resolver(store: &InMemoryStore) -> PermissionResolver {
        PermissionResolver::new(Arc::new(RepositoryIdentityStore::new(Arc::new(store.clone()))))
    }

    #[tokio::test]
    async fn test_no_assignments_resolves_empty() {
        let store = InMemoryStore::new();
        let permissions = resolver(&store).effective_permissions(Uuid::new_v4()).await.unwrap();
        assert!(permissions.is_empty());
    }

    #[tokio::test]
    async fn test_only_direct_roles_contribute() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let user_id = Uuid::new_v4();

        let p = Permission::new("Task.Read", None);
        let q = Permission::new("Task.Delete", None);
        let parent = Role::new("B", None);
        let child = Role::new("A", None).with_parent(parent.id);

        uow.permissions.insert(p.clone()).await.unwrap();
        uow.permissions.insert(q.clone()).await.unwrap();
        uow.roles.insert(parent.clone()).await.unwrap();
        uow.roles.insert(child.clone()).await.unwrap();
        uow.role_permissions.insert(RolePermission::new(child.id, p.id)).await.unwrap();
        uow.role_permissions.insert(RolePermission::new(parent.id, q.id)).await.unwrap();
        uow.user_roles.insert(UserRole::new(user_id, child.id)).await.unwrap();
        uow.permissions.save_changes().await.unwrap();
        uow.roles.save_changes().await.unwrap();
        uow.role_permissions.save_changes().await.unwrap();
        uow.user_roles.save_changes().await.unwrap();

        let names = resolver(&store).effective_permission_names(user_id).await.unwrap();
        assert_eq!(names, HashSet::from(["Task.Read".to_string()]));
    }

    #[tokio::test]
    async fn test_shared_permission_deduplicated() {
        let store = InMemoryStore::new();
        let uow = store.begin();
        let user_id = Uuid::new_v4();

        let p = Permission::new("Team.Read", None);
        let first = Role::new("Reader", None);
        let second = Role::new("Viewer", None);

        uow.permissions.insert(p.clone()).await.unwrap();
        uow.role_permissions.insert(RolePermission::new(first.id, p.id)).await.unwrap();
        uow.role_permissions.insert(RolePermission::new(second.id, p.id)).await.unwrap();
        uow.user_roles.insert(UserRole::new(user_id, first.id)).await.unwrap();
        uow.user_roles.insert(UserRole::new(user_id, second.id)).await.unwrap();
        uow.permissions.save_changes().await.unwrap();
        uow.role_permissions.save_changes().await.unwrap();
        uow.user_roles.save_changes().await.unwrap();

        let permissions = resolver(&store).effective_permissions(user_id).await.unwrap();
        assert_eq!(permissions.len(), 1);
    }
}
