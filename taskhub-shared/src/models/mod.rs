/// Domain models for TaskHub
///
/// Plain data structs with explicit setters. Persistence goes through the
/// repository contracts in [`crate::store`]; the table mappings live with each
/// backend.
///
/// # Models
///
/// - `user`: accounts, password hashes and lockout state
/// - `role`: named roles with an optional parent, plus the hierarchy view
/// - `permission`: named capabilities
/// - `user_role`: user to role assignments
/// - `role_permission`: role to permission grants
/// - `team`: teams and their members
/// - `project`: projects owned by a team
/// - `task`: tasks, their status and comments

pub mod permission;
pub mod project;
pub mod role;
pub mod role_permission;
pub mod task;
pub mod team;
pub mod user;
pub mod user_role;
