/// Request dispatcher
///
/// Holds exactly one [`Pipeline`] per request type, keyed by type id.
/// Registering a second pipeline for a type replaces the first.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use tracing::{error, warn};

use super::context::RequestContext;
use super::error::{PipelineError, PipelineResult};
use super::{Pipeline, Request};

#[derive(Default)]
pub struct Mediator {
    pipelines: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Mediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R: Request>(&mut self, pipeline: Pipeline<R>) -> &mut Self {
        if self
            .pipelines
            .insert(TypeId::of::<R>(), Box::new(pipeline))
            .is_some()
        {
            warn!(request = R::NAME, "Replaced existing pipeline registration");
        }
        self
    }

    pub fn pipeline<R: Request>(&self) -> Option<&Pipeline<R>> {
        self.pipelines
            .get(&TypeId::of::<R>())
            .and_then(|p| p.downcast_ref::<Pipeline<R>>())
    }

    /// Sends `request` through its registered pipeline
    pub async fn send<R: Request>(&self, request: R, ctx: &RequestContext) -> PipelineResult<R::Response> {
        let Some(pipeline) = self.pipeline::<R>() else {
            error!(
                request = R::NAME,
                correlation_id = %ctx.correlation_id(),
                "No pipeline registered for request"
            );
            return Err(PipelineError::Unhandled(format!(
                "No pipeline registered for {}",
                R::NAME
            )));
        };

        pipeline.send(request, ctx).await
    }
}
