/// Bootstrap administrator
///
/// Role administration is itself gated on the `"Administrator"` policy, so the
/// first administrator has to be written directly. [`ensure_admin`] creates
/// the `Admin` role, the user and the assignment, skipping whichever already
/// exist, and commits whatever it created at once. Running it twice is
/// harmless.

use tracing::info;

use crate::auth::password::{hash_password, PasswordError};
use crate::models::role::Role;
use crate::models::user::User;
use crate::models::user_role::UserRole;
use crate::store::{StoreBackend, StoreError};

/// Name of the role that maps onto the admin system role
pub const ADMIN_ROLE: &str = "Admin";

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Makes sure `email` exists and holds the `Admin` role
pub async fn ensure_admin(
    store: &dyn StoreBackend,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, SeedError> {
    let uow = store.begin();

    let role = match uow
        .roles
        .get_where(&|r: &Role| r.name.eq_ignore_ascii_case(ADMIN_ROLE))
        .await?
        .into_iter()
        .next()
    {
        Some(role) => role,
        None => {
            let role = Role::new(ADMIN_ROLE, Some("Full administrative access".to_string()));
            uow.roles.insert(role.clone()).await?;
            info!(role_id = %role.id, "Created admin role");
            role
        }
    };

    let user = match uow
        .users
        .get_where(&|u: &User| u.email.eq_ignore_ascii_case(email))
        .await?
        .into_iter()
        .next()
    {
        Some(user) => user,
        None => {
            let user = User::new(name, email, hash_password(password)?);
            uow.users.insert(user.clone()).await?;
            info!(user_id = %user.id, "Created bootstrap administrator");
            user
        }
    };

    let assigned = uow
        .user_roles
        .get_where(&|ur: &UserRole| ur.user_id == user.id && ur.role_id == role.id)
        .await?;
    if assigned.is_empty() {
        uow.user_roles.insert(UserRole::new(user.id, role.id)).await?;
    }
    uow.save_changes().await?;

    Ok(user)
}
