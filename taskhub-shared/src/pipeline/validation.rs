/// Validation behavior and reusable validators
///
/// All validators registered for a request run concurrently, field rules and
/// store-backed rules alike. Their failures are merged into one
/// field → messages map; any failure rejects the request before the handler.
/// A validator that itself errors (store unavailable) fails the request with
/// that error instead.
///
/// # Validators
///
/// - [`FieldRules`]: `validator` derive rules on the request struct
/// - [`Check`]: a plain function of the request
/// - [`MustExist`]: a referenced entity id must exist
/// - [`MustBeUnique`]: no stored entity may match the request

use async_trait::async_trait;
use futures::future::join_all;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use super::context::{RequestContext, RequestState};
use super::error::{PipelineError, PipelineResult, ValidationFailures};
use super::{Behavior, Next, Request};
use crate::store::{StoreBackend, Stored};

/// A validation rule set for `R`
#[async_trait]
pub trait Validator<R: Request>: Send + Sync {
    /// Failures found; empty when the request is valid
    async fn validate(&self, request: &R) -> PipelineResult<ValidationFailures>;
}

/// Converts `validator` crate errors into field failures
pub fn field_failures(errors: &validator::ValidationErrors) -> ValidationFailures {
    let mut failures = ValidationFailures::new();
    for (field, errors) in errors.field_errors() {
        for error in errors.iter() {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Validation failed".to_string());
            failures.add(field.to_string(), message);
        }
    }
    failures
}

/// Runs the `validator::Validate` derive rules of the request
pub struct FieldRules;

#[async_trait]
impl<R: Request + validator::Validate> Validator<R> for FieldRules {
    async fn validate(&self, request: &R) -> PipelineResult<ValidationFailures> {
        Ok(match request.validate() {
            Ok(()) => ValidationFailures::new(),
            Err(errors) => field_failures(&errors),
        })
    }
}

/// A synchronous rule written as a function
pub struct Check<R> {
    rule: fn(&R) -> ValidationFailures,
}

impl<R> Check<R> {
    pub fn new(rule: fn(&R) -> ValidationFailures) -> Self {
        Self { rule }
    }
}

#[async_trait]
impl<R: Request> Validator<R> for Check<R> {
    async fn validate(&self, request: &R) -> PipelineResult<ValidationFailures> {
        Ok((self.rule)(request))
    }
}

/// Requires the entity referenced by `field` to exist
///
/// A `None` reference is not checked.
pub struct MustExist<R, T> {
    field: &'static str,
    store: Arc<dyn StoreBackend>,
    select: fn(&R) -> Option<Uuid>,
    _entity: PhantomData<fn() -> T>,
}

impl<R, T> MustExist<R, T> {
    pub fn new(field: &'static str, store: Arc<dyn StoreBackend>, select: fn(&R) -> Option<Uuid>) -> Self {
        Self {
            field,
            store,
            select,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<R: Request, T: Stored> Validator<R> for MustExist<R, T> {
    async fn validate(&self, request: &R) -> PipelineResult<ValidationFailures> {
        let Some(id) = (self.select)(request) else {
            return Ok(ValidationFailures::new());
        };

        let uow = self.store.begin();
        if uow.repository::<T>().get_by_id(id).await?.is_none() {
            return Ok(ValidationFailures::single(
                self.field,
                format!("{} {} does not exist", T::NAME, id),
            ));
        }
        Ok(ValidationFailures::new())
    }
}

/// Requires that no stored entity matches the request
pub struct MustBeUnique<R, T> {
    field: &'static str,
    message: &'static str,
    store: Arc<dyn StoreBackend>,
    matches: fn(&R, &T) -> bool,
}

impl<R, T> MustBeUnique<R, T> {
    pub fn new(
        field: &'static str,
        message: &'static str,
        store: Arc<dyn StoreBackend>,
        matches: fn(&R, &T) -> bool,
    ) -> Self {
        Self {
            field,
            message,
            store,
            matches,
        }
    }
}

#[async_trait]
impl<R: Request, T: Stored> Validator<R> for MustBeUnique<R, T> {
    async fn validate(&self, request: &R) -> PipelineResult<ValidationFailures> {
        let matches = self.matches;
        let predicate = |entity: &T| matches(request, entity);

        let uow = self.store.begin();
        let existing = uow.repository::<T>().get_where(&predicate).await?;

        if existing.is_empty() {
            Ok(ValidationFailures::new())
        } else {
            Ok(ValidationFailures::single(self.field, self.message))
        }
    }
}

pub struct Validation<R: Request> {
    validators: Vec<Arc<dyn Validator<R>>>,
}

impl<R: Request> Validation<R> {
    pub fn new(validators: Vec<Arc<dyn Validator<R>>>) -> Self {
        Self { validators }
    }
}

#[async_trait]
impl<R: Request> Behavior<R> for Validation<R> {
    fn name(&self) -> &'static str {
        "Validation"
    }

    async fn handle(
        &self,
        request: &mut R,
        ctx: &RequestContext,
        next: Next<'_, R>,
    ) -> PipelineResult<R::Response> {
        ctx.transition(RequestState::Validating)?;

        let failures = {
            let snapshot: &R = request;
            let checks = self.validators.iter().map(|v| v.validate(snapshot));
            let results = ctx.cancellable(join_all(checks)).await?;

            let mut failures = ValidationFailures::new();
            for result in results {
                failures.merge(result?);
            }
            failures
        };

        if !failures.is_empty() {
            ctx.transition(RequestState::Rejected)?;
            return Err(PipelineError::Validation(failures));
        }

        ctx.transition(RequestState::Dispatching)?;
        next.run(request, ctx).await
    }
}
