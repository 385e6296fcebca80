/// Request pipeline
///
/// Every request reaches its handler through a fixed chain of behaviors,
/// outermost first:
///
/// 1. [`capture::ExceptionCapture`]: logs any failure with the request
///    snapshot and correlation id, converts panics, re-returns the failure
/// 2. [`sanitize::Sanitization`]: HTML-escapes string fields in place
/// 3. [`validation::Validation`]: runs every validator, short-circuits on any
///    failure
/// 4. [`authorize::Authorization`]: only for [`authorize::Gated`] requests
/// 5. the [`Handler`]
///
/// The order is fixed by [`Pipeline::new`] and [`Pipeline::gated`]; callers
/// only supply the handler and validators.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhub_shared::auth::principal::Principal;
/// use taskhub_shared::pipeline::{mediator::Mediator, Pipeline, RequestContext};
/// # use taskhub_shared::pipeline::{Handler, Request, PipelineResult};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Serialize, Deserialize)]
/// # struct Ping { message: String }
/// # impl Request for Ping { type Response = String; const NAME: &'static str = "Ping"; }
/// # struct PingHandler;
/// # #[async_trait::async_trait]
/// # impl Handler<Ping> for PingHandler {
/// #     async fn handle(&self, request: &Ping, _: &RequestContext) -> PipelineResult<String> {
/// #         Ok(request.message.clone())
/// #     }
/// # }
///
/// # async fn example() -> PipelineResult<()> {
/// let mut mediator = Mediator::new();
/// mediator.register(Pipeline::new(Arc::new(PingHandler), Vec::new()));
///
/// let ctx = RequestContext::new(Principal::anonymous());
/// let reply = mediator.send(Ping { message: "<hi>".into() }, &ctx).await?;
/// assert_eq!(reply, "&lt;hi&gt;");
/// # Ok(())
/// # }
/// ```

pub mod authorize;
pub mod capture;
pub mod context;
pub mod error;
pub mod mediator;
pub mod sanitize;
pub mod validation;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

pub use context::{RequestContext, RequestState};
pub use error::{PipelineError, PipelineResult, ValidationFailures};
pub use sanitize::SanitizationRules;

use authorize::{Authorization, Gated};
use capture::ExceptionCapture;
use sanitize::Sanitization;
use validation::{Validation, Validator};

/// A command or query
///
/// Requests travel through the pipeline as their serde representation:
/// sanitization rewrites string fields of the serialized form, and failure
/// logs include a snapshot of it.
pub trait Request: Serialize + DeserializeOwned + Send + Sync + 'static {
    type Response: Send + 'static;

    /// Name used in logs
    const NAME: &'static str;

    /// Fields left untouched by sanitization
    fn sanitization() -> SanitizationRules {
        SanitizationRules::none()
    }
}

/// Performs the business operation for `R`
#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: &R, ctx: &RequestContext) -> PipelineResult<R::Response>;
}

/// One stage wrapping the rest of the chain
#[async_trait]
pub trait Behavior<R: Request>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        request: &mut R,
        ctx: &RequestContext,
        next: Next<'_, R>,
    ) -> PipelineResult<R::Response>;
}

/// The remainder of the chain after the current behavior
pub struct Next<'a, R: Request> {
    behaviors: &'a [Arc<dyn Behavior<R>>],
    handler: &'a dyn Handler<R>,
}

impl<'a, R: Request> Next<'a, R> {
    /// Runs the next behavior, or the handler once none remain
    pub fn run<'b>(self, request: &'b mut R, ctx: &'b RequestContext) -> BoxFuture<'b, PipelineResult<R::Response>>
    where
        'a: 'b,
    {
        Box::pin(async move {
            match self.behaviors.split_first() {
                Some((behavior, rest)) => {
                    let next = Next {
                        behaviors: rest,
                        handler: self.handler,
                    };
                    behavior.handle(request, ctx, next).await
                }
                None => {
                    ctx.ensure_active()?;
                    self.handler.handle(request, ctx).await
                }
            }
        })
    }
}

/// The behavior chain and handler for one request type
pub struct Pipeline<R: Request> {
    behaviors: Vec<Arc<dyn Behavior<R>>>,
    handler: Arc<dyn Handler<R>>,
}

impl<R: Request> Pipeline<R> {
    /// Capture, sanitization and validation around `handler`
    pub fn new(handler: Arc<dyn Handler<R>>, validators: Vec<Arc<dyn Validator<R>>>) -> Self {
        let rules = R::sanitization();
        Self {
            behaviors: vec![
                Arc::new(ExceptionCapture::new(rules.clone())),
                Arc::new(Sanitization::new(rules)),
                Arc::new(Validation::new(validators)),
            ],
            handler,
        }
    }

    /// Like [`Pipeline::new`] with authorization between validation and handler
    pub fn gated(
        handler: Arc<dyn Handler<R>>,
        validators: Vec<Arc<dyn Validator<R>>>,
        authorization: Authorization,
    ) -> Self
    where
        R: Gated,
    {
        let mut pipeline = Self::new(handler, validators);
        pipeline.behaviors.push(Arc::new(authorization));
        pipeline
    }

    /// Behavior names, outermost first
    pub fn behavior_names(&self) -> Vec<&'static str> {
        self.behaviors.iter().map(|b| b.name()).collect()
    }

    /// Runs `request` through every behavior and the handler
    pub async fn send(&self, mut request: R, ctx: &RequestContext) -> PipelineResult<R::Response> {
        let next = Next {
            behaviors: &self.behaviors,
            handler: self.handler.as_ref(),
        };
        next.run(&mut request, ctx).await
    }
}
