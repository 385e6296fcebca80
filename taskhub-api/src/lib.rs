//! # TaskHub API Server Library
//!
//! HTTP surface of TaskHub: routing, authentication, configuration and the
//! mapping of pipeline outcomes to responses.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
