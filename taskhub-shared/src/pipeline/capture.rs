/// Exception capture behavior
///
/// Outermost stage. Runs the rest of the chain, catching panics as
/// `Unhandled`, and finishes the request lifecycle: success moves to
/// `Completed`, any failure that is not a validation rejection moves to
/// `Faulted`. Every failure is logged with the request name, a snapshot of
/// the request and the correlation id, then returned unchanged.
///
/// Fields exempt from sanitization are credentials or other raw input, so the
/// snapshot redacts them.

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use tracing::{error, warn};

use super::context::{RequestContext, RequestState};
use super::error::{PipelineError, PipelineResult};
use super::sanitize::SanitizationRules;
use super::{Behavior, Next, Request};
use crate::panic_message;

/// Placeholder written over redacted snapshot fields
pub const REDACTED: &str = "[redacted]";

pub struct ExceptionCapture {
    redact: SanitizationRules,
}

impl ExceptionCapture {
    pub fn new(redact: SanitizationRules) -> Self {
        Self { redact }
    }

    /// Serialized request with exempt fields redacted
    pub fn snapshot<R: Request>(&self, request: &R) -> Value {
        let mut value = match serde_json::to_value(request) {
            Ok(value) => value,
            Err(e) => return Value::String(format!("<unserializable: {}>", e)),
        };

        if let Value::Object(fields) = &mut value {
            for (key, field) in fields.iter_mut() {
                if self.redact.is_exempt(key) {
                    *field = Value::String(REDACTED.to_string());
                } else if let Value::Object(nested) = field {
                    for (nested_key, nested_field) in nested.iter_mut() {
                        if self.redact.is_exempt(&format!("{}.{}", key, nested_key)) {
                            *nested_field = Value::String(REDACTED.to_string());
                        }
                    }
                }
            }
        }

        value
    }
}

#[async_trait]
impl<R: Request> Behavior<R> for ExceptionCapture {
    fn name(&self) -> &'static str {
        "ExceptionCapture"
    }

    async fn handle(
        &self,
        request: &mut R,
        ctx: &RequestContext,
        next: Next<'_, R>,
    ) -> PipelineResult<R::Response> {
        let outcome = AssertUnwindSafe(next.run(request, ctx)).catch_unwind().await;

        let result = match outcome {
            Ok(Ok(response)) => ctx.transition(RequestState::Completed).map(|()| response),
            Ok(Err(e)) => Err(e),
            Err(panic) => Err(PipelineError::Unhandled(panic_message(panic.as_ref()))),
        };

        let err = match result {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        ctx.fault();
        let snapshot = self.snapshot(&*request);

        match &err {
            PipelineError::Unhandled(detail) => error!(
                request = R::NAME,
                correlation_id = %ctx.correlation_id(),
                user_id = ?ctx.principal().user_id(),
                payload = %snapshot,
                error = %detail,
                "Unhandled failure while processing request"
            ),
            other => warn!(
                request = R::NAME,
                correlation_id = %ctx.correlation_id(),
                user_id = ?ctx.principal().user_id(),
                payload = %snapshot,
                kind = other.code(),
                error = %other,
                "Request failed"
            ),
        }

        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Login {
        email: String,
        password: String,
        profile: Profile,
    }

    #[derive(Serialize, Deserialize)]
    struct Profile {
        token: String,
        bio: String,
    }

    impl Request for Login {
        type Response = ();
        const NAME: &'static str = "Login";
    }

    #[test]
    fn test_snapshot_redacts_exempt_fields() {
        let capture = ExceptionCapture::new(
            SanitizationRules::none()
                .skip("password", "credential")
                .skip("profile.token", "opaque token"),
        );
        let request = Login {
            email: "ada@example.com".into(),
            password: "hunter2".into(),
            profile: Profile {
                token: "abc".into(),
                bio: "hi".into(),
            },
        };

        let snapshot = capture.snapshot(&request);
        assert_eq!(snapshot["email"], "ada@example.com");
        assert_eq!(snapshot["password"], REDACTED);
        assert_eq!(snapshot["profile"]["token"], REDACTED);
        assert_eq!(snapshot["profile"]["bio"], "hi");
    }
}
