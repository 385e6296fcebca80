//! # TaskHub Shared Library
//!
//! Domain models, persistence, the authorization engine and the request
//! pipeline used by the TaskHub API server.
//!
//! ## Module Organization
//!
//! - `models`: domain entities
//! - `store`: repository contracts with in-memory and PostgreSQL backends
//! - `db`: PostgreSQL pool and migrations
//! - `auth`: passwords, tokens, permission resolution and policy evaluation
//! - `pipeline`: the ordered behavior chain every request passes through
//! - `commands`: requests, their validators and handlers

pub mod auth;
pub mod commands;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod store;

use std::any::Any;

/// Current version of the TaskHub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Readable message from a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "panicked: boom");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "panicked");
    }
}
