/// PostgreSQL connectivity
///
/// # Modules
///
/// - `pool`: connection pool creation with a health check
/// - `migrations`: embedded schema migrations from `taskhub-shared/migrations`

pub mod migrations;
pub mod pool;
