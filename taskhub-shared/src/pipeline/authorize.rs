/// Authorization behavior
///
/// Sits between validation and the handler for requests that implement
/// [`Gated`]. A resource gate loads the target's context (an absent target is
/// `NotFound`) and asks the [`Authorizer`]; a policy gate checks a standalone
/// assertion such as `"Administrator"`. Any deny is `Forbidden`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::context::RequestContext;
use super::error::PipelineResult;
use super::{Behavior, Next, Request};
use crate::auth::authorization::Authorizer;
use crate::auth::context::{ContextLoader, ResourceRef};
use crate::auth::requirement::Requirement;
use crate::store::StoreBackend;

/// What a gated request must satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// A requirement checked against the target resource
    Resource {
        requirement: Requirement,
        target: ResourceRef,
    },
    /// A named standalone assertion
    Policy(&'static str),
}

/// A request that must be authorized before its handler runs
pub trait Gated: Request {
    fn gate(&self) -> Gate;
}

pub struct Authorization {
    authorizer: Authorizer,
    store: Arc<dyn StoreBackend>,
}

impl Authorization {
    pub fn new(authorizer: Authorizer, store: Arc<dyn StoreBackend>) -> Self {
        Self { authorizer, store }
    }
}

#[async_trait]
impl<R: Gated> Behavior<R> for Authorization {
    fn name(&self) -> &'static str {
        "Authorization"
    }

    async fn handle(
        &self,
        request: &mut R,
        ctx: &RequestContext,
        next: Next<'_, R>,
    ) -> PipelineResult<R::Response> {
        match request.gate() {
            Gate::Resource { requirement, target } => {
                let uow = self.store.begin();
                let context = ctx.cancellable(ContextLoader::new(&uow).load(target)).await??;

                let decision = ctx
                    .cancellable(self.authorizer.authorize(ctx.principal(), requirement, &context))
                    .await??;

                debug!(
                    request = R::NAME,
                    requirement = %decision.requirement,
                    correlation_id = %ctx.correlation_id(),
                    "Request authorized"
                );
            }
            Gate::Policy(policy) => {
                self.authorizer.assert_policy(ctx.principal(), policy)?;
            }
        }

        next.run(request, ctx).await
    }
}
