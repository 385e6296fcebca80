/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: HS256 access tokens carrying the caller's system role
/// - [`principal`]: the authenticated caller
/// - [`resolver`]: effective permission resolution from role assignments
/// - [`requirement`]: the closed set of (resource, operation) requirements
/// - [`context`]: resource contexts and the caller's relationship to them
/// - [`evaluators`]: evaluators and standalone assertions
/// - [`registry`]: requirement to evaluator mapping
/// - [`authorization`]: the deny-by-default aggregator
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::auth::password::{hash_password, verify_password};
/// use taskhub_shared::auth::jwt::{create_token, Claims};
/// use taskhub_shared::auth::principal::SystemRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_Passw0rd!")?;
/// assert!(verify_password("user_Passw0rd!", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), SystemRole::Member);
/// let token = create_token(&claims, "secret-key-of-at-least-thirty-two-bytes")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod context;
pub mod evaluators;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod registry;
pub mod requirement;
pub mod resolver;
