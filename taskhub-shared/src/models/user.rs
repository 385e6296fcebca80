/// User model
///
/// Users authenticate with an email and an Argon2id password hash. Repeated
/// failed logins lock the account for [`LOCKOUT_DURATION_MINUTES`]; an
/// inactive account can never sign in.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     failed_login_count INTEGER NOT NULL DEFAULT 0,
///     lockout_end TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::store::Entity;

/// Failed attempts tolerated before the account is locked
pub const MAX_FAILED_LOGINS: i32 = 5;

/// How long a lockout lasts
pub const LOCKOUT_DURATION_MINUTES: i64 = 15;

/// User account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    pub name: String,

    pub email: String,

    /// Argon2id hash, never the plaintext password
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub is_active: bool,

    pub failed_login_count: i32,

    /// Sign-in is refused until this instant
    pub lockout_end: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds a new, active user
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            is_active: true,
            failed_login_count: 0,
            lockout_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_end.map_or(false, |end| end > now)
    }

    /// Records a failed sign-in and locks the account once the limit is hit
    ///
    /// Returns `true` when this failure started a lockout.
    pub fn record_failed_login(&mut self, now: DateTime<Utc>) -> bool {
        self.failed_login_count += 1;
        self.updated_at = now;

        if self.failed_login_count >= MAX_FAILED_LOGINS {
            self.failed_login_count = 0;
            self.lockout_end = Some(now + Duration::minutes(LOCKOUT_DURATION_MINUTES));
            return true;
        }
        false
    }

    /// Clears failure tracking after a successful sign-in
    pub fn record_successful_login(&mut self, now: DateTime<Utc>) {
        self.failed_login_count = 0;
        self.lockout_end = None;
        self.updated_at = now;
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Utc::now();
    }
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }
}
