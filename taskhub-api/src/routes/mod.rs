/// API route handlers
///
/// Handlers are thin: each extracts its request, sends it through the
/// mediator with the caller's [`Scope`](crate::app::Scope) and maps the reply.
///
/// - `health`: Health check endpoint
/// - `users`: sign-up, sign-in, effective permissions
/// - `roles`: identity administration
/// - `teams`, `projects`, `tasks`: work management

pub mod health;
pub mod projects;
pub mod roles;
pub mod tasks;
pub mod teams;
pub mod users;

use crate::error::ApiError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body whose rejection is an [`ApiError`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejection is an [`ApiError`]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);
