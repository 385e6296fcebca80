/// Pipeline failures
///
/// Every stage of the pipeline and every handler fails with a
/// [`PipelineError`]. The API boundary maps each variant to one HTTP status.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::auth::authorization::AuthzError;
use crate::auth::context::ContextError;
use crate::store::StoreError;

/// Field name to failure messages, ordered by field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationFailures(BTreeMap<String, Vec<String>>);

impl ValidationFailures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures holding a single message
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut failures = Self::new();
        failures.add(field, message);
        failures
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: ValidationFailures) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

impl fmt::Display for ValidationFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Error type for request processing
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// One or more validation rules failed
    #[error("Validation failed: {0}")]
    Validation(ValidationFailures),

    /// The target entity does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// The caller lacks an identity or presented bad credentials
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authorization denied the request
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request was cancelled before it finished
    #[error("Request cancelled")]
    Cancelled,

    /// Anything else; details are logged, not shown to callers
    #[error("Unhandled error: {0}")]
    Unhandled(String),
}

impl PipelineError {
    /// Stable short code for logs and response bodies
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation_failed",
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::Unauthenticated(_) => "unauthenticated",
            PipelineError::Forbidden(_) => "forbidden",
            PipelineError::Conflict(_) => "conflict",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Unhandled(_) => "unhandled",
        }
    }

    pub fn unhandled(err: impl fmt::Display) -> Self {
        PipelineError::Unhandled(err.to_string())
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { entity, id } => PipelineError::NotFound { entity, id },
            StoreError::Duplicate { .. } | StoreError::Conflict(_) => {
                PipelineError::Conflict(err.to_string())
            }
            StoreError::Database(e) => PipelineError::Unhandled(e.to_string()),
        }
    }
}

impl From<ContextError> for PipelineError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::NotFound { entity, id } => PipelineError::NotFound { entity, id },
            ContextError::Store(e) => e.into(),
        }
    }
}

impl From<AuthzError> for PipelineError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Denied { .. } => PipelineError::Forbidden(err.to_string()),
            AuthzError::UnknownPolicy(e) => PipelineError::Unhandled(e.to_string()),
            AuthzError::Resolution(e) => e.into(),
        }
    }
}

/// Result alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
