/// Integration tests for the request pipeline
///
/// Drives small purpose-built requests through real pipelines and checks
/// ordering, short-circuiting, cancellation and failure capture.
///
/// Run with: cargo test --test pipeline_tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use taskhub_shared::auth::principal::{Principal, SystemRole};
use taskhub_shared::commands::Services;
use taskhub_shared::pipeline::authorize::{Gate, Gated};
use taskhub_shared::pipeline::mediator::Mediator;
use taskhub_shared::pipeline::validation::{Check, Validator};
use taskhub_shared::pipeline::{
    Handler, Pipeline, PipelineError, PipelineResult, Request, RequestContext, RequestState,
    SanitizationRules, ValidationFailures,
};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Note {
    title: String,
    body: String,
    secret: String,
    meta: Meta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Meta {
    tag: String,
    raw: String,
}

impl Request for Note {
    type Response = Note;
    const NAME: &'static str = "Note";

    fn sanitization() -> SanitizationRules {
        SanitizationRules::none()
            .skip("secret", "opaque value compared verbatim")
            .skip("meta.raw", "stored as markup on purpose")
    }
}

impl Gated for Note {
    fn gate(&self) -> Gate {
        Gate::Policy("Administrator")
    }
}

fn note(title: &str) -> Note {
    Note {
        title: title.to_string(),
        body: "body".to_string(),
        secret: "<k&y>".to_string(),
        meta: Meta {
            tag: "<b>".to_string(),
            raw: "<i>".to_string(),
        },
    }
}

/// What the handler should do once reached
#[derive(Clone, Copy)]
enum Outcome {
    Echo,
    Conflict,
    Panic,
}

struct Recording {
    calls: AtomicUsize,
    outcome: Outcome,
}

impl Recording {
    fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler<Note> for Recording {
    async fn handle(&self, request: &Note, _ctx: &RequestContext) -> PipelineResult<Note> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Echo => Ok(request.clone()),
            Outcome::Conflict => Err(PipelineError::Conflict("already there".to_string())),
            Outcome::Panic => panic!("handler exploded"),
        }
    }
}

fn title_required(note: &Note) -> ValidationFailures {
    if note.title.is_empty() {
        ValidationFailures::single("title", "Title is required")
    } else {
        ValidationFailures::new()
    }
}

fn pipeline(handler: Arc<Recording>) -> Pipeline<Note> {
    let validators: Vec<Arc<dyn Validator<Note>>> = vec![Arc::new(Check::new(title_required))];
    Pipeline::<Note>::new(handler, validators)
}

fn ctx() -> RequestContext {
    RequestContext::new(Principal::user(Uuid::new_v4(), SystemRole::Member))
}

#[tokio::test]
async fn test_successful_request_walks_every_state() {
    let handler = Recording::new(Outcome::Echo);
    let ctx = ctx();

    pipeline(handler.clone()).send(note("hello"), &ctx).await.unwrap();

    assert_eq!(handler.calls(), 1);
    assert_eq!(
        ctx.trail(),
        vec![
            RequestState::Received,
            RequestState::Sanitizing,
            RequestState::Validating,
            RequestState::Dispatching,
            RequestState::Completed,
        ]
    );
}

#[tokio::test]
async fn test_validation_failure_never_reaches_handler() {
    let handler = Recording::new(Outcome::Echo);
    let ctx = ctx();

    let err = pipeline(handler.clone()).send(note(""), &ctx).await.unwrap_err();

    let PipelineError::Validation(failures) = err else {
        panic!("expected validation failure, got {:?}", err);
    };
    assert_eq!(failures.field("title").unwrap(), ["Title is required"]);
    assert_eq!(handler.calls(), 0);
    assert_eq!(ctx.state(), RequestState::Rejected);
}

#[tokio::test]
async fn test_string_fields_escaped_before_handler() {
    let handler = Recording::new(Outcome::Echo);
    let ctx = ctx();

    let echoed = pipeline(handler)
        .send(note("<script>alert('x')</script>"), &ctx)
        .await
        .unwrap();

    assert_eq!(echoed.title, "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;");
    assert_eq!(echoed.meta.tag, "&lt;b&gt;");
}

#[tokio::test]
async fn test_exempt_fields_byte_identical() {
    let handler = Recording::new(Outcome::Echo);
    let ctx = ctx();

    let echoed = pipeline(handler).send(note("t"), &ctx).await.unwrap();

    assert_eq!(echoed.secret, "<k&y>");
    assert_eq!(echoed.meta.raw, "<i>");
}

#[tokio::test]
async fn test_already_escaped_input_is_escaped_again() {
    let handler = Recording::new(Outcome::Echo);
    let ctx = ctx();

    let echoed = pipeline(handler).send(note("&lt;b&gt;"), &ctx).await.unwrap();
    assert_eq!(echoed.title, "&amp;lt;b&amp;gt;");
}

#[tokio::test]
async fn test_cancelled_request_never_reaches_handler() {
    let handler = Recording::new(Outcome::Echo);
    let token = CancellationToken::new();
    let ctx = ctx().with_cancellation(token.clone());
    token.cancel();

    let err = pipeline(handler.clone()).send(note("t"), &ctx).await.unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(handler.calls(), 0);
    assert_eq!(ctx.state(), RequestState::Faulted);
}

/// Cancels the request from inside validation, then never finishes
struct CancelsMidway(CancellationToken);

#[async_trait]
impl Validator<Note> for CancelsMidway {
    async fn validate(&self, _: &Note) -> PipelineResult<ValidationFailures> {
        self.0.cancel();
        futures::future::pending::<()>().await;
        Ok(ValidationFailures::new())
    }
}

#[tokio::test]
async fn test_cancellation_interrupts_pending_validation() {
    let handler = Recording::new(Outcome::Echo);
    let token = CancellationToken::new();
    let ctx = ctx().with_cancellation(token.clone());

    let validators: Vec<Arc<dyn Validator<Note>>> = vec![Arc::new(CancelsMidway(token))];
    let err = Pipeline::<Note>::new(handler.clone(), validators)
        .send(note("t"), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(handler.calls(), 0);
}

#[tokio::test]
async fn test_handler_failure_returned_unchanged() {
    let handler = Recording::new(Outcome::Conflict);
    let ctx = ctx();

    let err = pipeline(handler.clone()).send(note("t"), &ctx).await.unwrap_err();

    assert!(matches!(err, PipelineError::Conflict(ref m) if m == "already there"));
    assert_eq!(handler.calls(), 1);
    assert_eq!(ctx.state(), RequestState::Faulted);
}

#[tokio::test]
async fn test_handler_panic_becomes_unhandled() {
    let handler = Recording::new(Outcome::Panic);
    let ctx = ctx();

    let err = pipeline(handler).send(note("t"), &ctx).await.unwrap_err();

    assert!(matches!(err, PipelineError::Unhandled(ref m) if m.contains("handler exploded")));
    assert_eq!(ctx.state(), RequestState::Faulted);
}

#[tokio::test]
async fn test_gated_pipeline_order_and_denial() {
    let services = Services::in_memory("pipeline-tests-secret-pipeline-tests");
    let handler = Recording::new(Outcome::Echo);
    let validators: Vec<Arc<dyn Validator<Note>>> = vec![Arc::new(Check::new(title_required))];
    let gated = Pipeline::<Note>::gated(handler.clone(), validators, services.authorization());

    assert_eq!(
        gated.behavior_names(),
        ["ExceptionCapture", "Sanitization", "Validation", "Authorization"]
    );

    let err = gated.send(note("t"), &ctx()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Forbidden(_)));
    assert_eq!(handler.calls(), 0);

    let admin = RequestContext::new(Principal::user(Uuid::new_v4(), SystemRole::Admin));
    gated.send(note("t"), &admin).await.unwrap();
    assert_eq!(handler.calls(), 1);
}

#[tokio::test]
async fn test_unregistered_request_is_unhandled() {
    let mediator = Mediator::new();
    let err = mediator.send(note("t"), &ctx()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Unhandled(_)));
}

#[tokio::test]
async fn test_mediator_dispatches_registered_pipeline() {
    let handler = Recording::new(Outcome::Echo);
    let mut mediator = Mediator::new();
    mediator.register(pipeline(handler.clone()));

    mediator.send(note("t"), &ctx()).await.unwrap();
    assert_eq!(handler.calls(), 1);
}
