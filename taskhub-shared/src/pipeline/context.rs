/// Per-request context
///
/// Carries the caller, a correlation id for log lines, the cancellation
/// token, and the request's position in its lifecycle:
///
/// ```text
/// Received → Sanitizing → Validating → Rejected
///                                    → Dispatching → Completed
///
/// any non-terminal state → Faulted
/// ```
///
/// No state is entered twice. An illegal transition is itself an
/// `Unhandled` failure.

use std::future::Future;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult};
use crate::auth::principal::Principal;

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Sanitizing,
    Validating,
    /// Validation failed; the handler never ran
    Rejected,
    Dispatching,
    Completed,
    Faulted,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Rejected | RequestState::Completed | RequestState::Faulted
        )
    }

    pub fn can_transition_to(&self, next: RequestState) -> bool {
        match (self, next) {
            (RequestState::Received, RequestState::Sanitizing) => true,
            (RequestState::Sanitizing, RequestState::Validating) => true,
            (RequestState::Validating, RequestState::Rejected) => true,
            (RequestState::Validating, RequestState::Dispatching) => true,
            (RequestState::Dispatching, RequestState::Completed) => true,
            (from, RequestState::Faulted) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Context shared by every stage of one request
#[derive(Debug)]
pub struct RequestContext {
    correlation_id: Uuid,
    principal: Principal,
    cancellation: CancellationToken,
    trail: Mutex<Vec<RequestState>>,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            principal,
            cancellation: CancellationToken::new(),
            trail: Mutex::new(vec![RequestState::Received]),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn state(&self) -> RequestState {
        self.trail
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .copied()
            .unwrap_or(RequestState::Received)
    }

    /// Every state visited so far, oldest first
    pub fn trail(&self) -> Vec<RequestState> {
        self.trail.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn transition(&self, next: RequestState) -> PipelineResult<()> {
        let mut trail = self.trail.lock().unwrap_or_else(|e| e.into_inner());
        let current = trail.last().copied().unwrap_or(RequestState::Received);

        if !current.can_transition_to(next) {
            return Err(PipelineError::Unhandled(format!(
                "Illegal request state transition {:?} -> {:?}",
                current, next
            )));
        }

        trail.push(next);
        Ok(())
    }

    /// Moves to `Faulted` unless the request already finished
    pub(crate) fn fault(&self) {
        let _ = self.transition(RequestState::Faulted);
    }

    /// Fails with `Cancelled` if cancellation was requested
    pub fn ensure_active(&self) -> PipelineResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Awaits `future` unless cancellation wins first
    pub async fn cancellable<F: Future>(&self, future: F) -> PipelineResult<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(PipelineError::Cancelled),
            output = future => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let ctx = RequestContext::new(Principal::anonymous());
        ctx.transition(RequestState::Sanitizing).unwrap();
        ctx.transition(RequestState::Validating).unwrap();
        ctx.transition(RequestState::Dispatching).unwrap();
        ctx.transition(RequestState::Completed).unwrap();

        assert_eq!(ctx.state(), RequestState::Completed);
        assert_eq!(ctx.trail().len(), 5);
    }

    #[test]
    fn test_states_are_never_revisited() {
        let ctx = RequestContext::new(Principal::anonymous());
        ctx.transition(RequestState::Sanitizing).unwrap();

        let err = ctx.transition(RequestState::Sanitizing).unwrap_err();
        assert!(matches!(err, PipelineError::Unhandled(_)));
        assert!(ctx.transition(RequestState::Dispatching).is_err());
    }

    #[test]
    fn test_fault_only_from_non_terminal() {
        let ctx = RequestContext::new(Principal::anonymous());
        ctx.transition(RequestState::Sanitizing).unwrap();
        ctx.transition(RequestState::Validating).unwrap();
        ctx.transition(RequestState::Rejected).unwrap();

        ctx.fault();
        assert_eq!(ctx.state(), RequestState::Rejected);
    }

    #[tokio::test]
    async fn test_cancellable_observes_token() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new(Principal::anonymous()).with_cancellation(token.clone());

        assert_eq!(ctx.cancellable(async { 7 }).await.unwrap(), 7);

        token.cancel();
        assert!(matches!(ctx.cancellable(async { 7 }).await, Err(PipelineError::Cancelled)));
        assert!(matches!(ctx.ensure_active(), Err(PipelineError::Cancelled)));
    }
}
