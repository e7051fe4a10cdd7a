//! Integration tests for the repair loop with scripted providers and render clients

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use diagram_common::{
    ConnectionId, DraftResult, GenerationContext, RepairConfig, ValidationRequest, ValidationStatus,
    ValidationVerdict,
};
use diagram_repair::error::GenerationResult;
use diagram_repair::orchestrator::EMPTY_DIAGRAM_ERROR;
use diagram_repair::{
    ChannelError, ConnectionRegistry, GenerationClient, GenerationError, GenerationRequest, OutboundMessage,
    RemoteValidator, RenderChannel, RepairEvent, RepairOrchestrator, RepairRequest, ValidationCorrelator,
};

const VALID: &str = "graph TD\nLogin-->Home";
const BROKEN: &str = "graph TD\nLogin-->";

#[derive(Debug, Clone)]
struct RecordedRepair {
    prior_diagram: String,
    error: String,
    preserve_diagram_type: bool,
}

/// Provider that replays canned responses; exhausted repairs keep returning `BROKEN`
#[derive(Default)]
struct ScriptedGenerator {
    drafts: Mutex<VecDeque<GenerationResult<DraftResult>>>,
    repairs: Mutex<VecDeque<GenerationResult<DraftResult>>>,
    recorded: Mutex<Vec<RecordedRepair>>,
}

impl ScriptedGenerator {
    fn drafting(draft: GenerationResult<DraftResult>) -> Self {
        let generator = Self::default();
        generator.drafts.lock().unwrap().push_back(draft);
        generator
    }

    fn then_repair(self, repair: GenerationResult<DraftResult>) -> Self {
        self.repairs.lock().unwrap().push_back(repair);
        self
    }

    fn recorded(&self) -> Vec<RecordedRepair> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn draft(&self, _context: &GenerationContext) -> GenerationResult<DraftResult> {
        self.drafts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DraftResult::new(VALID, "A login flow.")))
    }

    async fn repair(&self, request: RepairRequest<'_>) -> GenerationResult<DraftResult> {
        self.recorded.lock().unwrap().push(RecordedRepair {
            prior_diagram: request.prior_diagram.to_string(),
            error: request.error.to_string(),
            preserve_diagram_type: request.preserve_diagram_type,
        });
        self.repairs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DraftResult::new(BROKEN, "still broken")))
    }
}

/// Provider that never answers
struct HangingGenerator;

#[async_trait]
impl GenerationClient for HangingGenerator {
    async fn draft(&self, _context: &GenerationContext) -> GenerationResult<DraftResult> {
        std::future::pending().await
    }

    async fn repair(&self, _request: RepairRequest<'_>) -> GenerationResult<DraftResult> {
        std::future::pending().await
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Pass,
    Fail(&'static str),
    Silent,
}

/// Render client stand-in: answers each validation from a script, defaulting to `Fail`
struct ScriptedChannel {
    correlator: ValidationCorrelator,
    connected: bool,
    replies: Mutex<VecDeque<Reply>>,
    validated: Mutex<Vec<String>>,
    events: Mutex<Vec<RepairEvent>>,
}

impl ScriptedChannel {
    fn new(correlator: ValidationCorrelator, replies: Vec<Reply>) -> Self {
        Self {
            correlator,
            connected: true,
            replies: Mutex::new(replies.into()),
            validated: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    fn disconnected(correlator: ValidationCorrelator) -> Self {
        Self {
            connected: false,
            ..Self::new(correlator, Vec::new())
        }
    }

    fn validated(&self) -> Vec<String> {
        self.validated.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<RepairEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderChannel for ScriptedChannel {
    async fn is_connected(&self, _connection: &ConnectionId) -> bool {
        self.connected
    }

    async fn send_validation(
        &self,
        connection: &ConnectionId,
        request: ValidationRequest,
    ) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::NotConnected(connection.clone()));
        }
        self.validated.lock().unwrap().push(request.diagram_source.clone());

        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Fail("Parse error"));
        match reply {
            Reply::Pass => {
                self.correlator.resolve(ValidationVerdict::passed(request.correlation_id));
            }
            Reply::Fail(error) => {
                self.correlator
                    .resolve(ValidationVerdict::failed(request.correlation_id, error));
            }
            Reply::Silent => {}
        }
        Ok(())
    }

    async fn send_event(&self, _connection: &ConnectionId, event: RepairEvent) -> Result<(), ChannelError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

struct Harness {
    orchestrator: RepairOrchestrator,
    generator: Arc<ScriptedGenerator>,
    channel: Arc<ScriptedChannel>,
    correlator: ValidationCorrelator,
}

fn repair_config(max_fix_attempts: u32) -> RepairConfig {
    RepairConfig {
        max_fix_attempts,
        ..RepairConfig::default()
    }
}

fn harness(generator: ScriptedGenerator, replies: Vec<Reply>, config: RepairConfig) -> Harness {
    let correlator = ValidationCorrelator::new(config.validation_timeout());
    let channel = Arc::new(ScriptedChannel::new(correlator.clone(), replies));
    build(generator, channel, correlator, config)
}

fn build(
    generator: ScriptedGenerator,
    channel: Arc<ScriptedChannel>,
    correlator: ValidationCorrelator,
    config: RepairConfig,
) -> Harness {
    let generator = Arc::new(generator);
    let validator = RemoteValidator::new(correlator.clone(), channel.clone());
    Harness {
        orchestrator: RepairOrchestrator::new(generator.clone(), validator, config),
        generator,
        channel,
        correlator,
    }
}

fn request(prompt: &str) -> GenerationRequest {
    GenerationRequest::new(GenerationContext::new(prompt)).with_connection(ConnectionId::new())
}

#[tokio::test]
async fn test_valid_first_draft_needs_one_round_trip() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(format!("```mermaid\n{VALID}\n```"), "A login flow."))),
        vec![Reply::Pass],
        repair_config(20),
    );

    let outcome = h.orchestrator.run(request("draw a login flow")).await;

    assert!(outcome.success);
    assert_eq!(outcome.diagram_source, VALID);
    assert_eq!(outcome.chat_answer, "A login flow.");
    assert_eq!(outcome.attempts, 0);
    assert_eq!(outcome.validation, ValidationStatus::Verified);
    assert_eq!(h.channel.validated(), vec![VALID.to_string()]);
    assert!(h.generator.recorded().is_empty());
    assert_eq!(h.correlator.pending_count(), 0);
}

#[tokio::test]
async fn test_failed_draft_is_repaired_with_render_error() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "A login flow.")))
            .then_repair(Ok(DraftResult::new(VALID, "ignored"))),
        vec![Reply::Fail("Parse error on line 2"), Reply::Pass],
        repair_config(20),
    );

    let outcome = h.orchestrator.run(request("draw a login flow")).await;

    assert!(outcome.success);
    assert_eq!(outcome.diagram_source, VALID);
    assert_eq!(outcome.chat_answer, "A login flow. (fixed after 1 attempt)");
    assert_eq!(outcome.attempts, 1);

    let repairs = h.generator.recorded();
    assert_eq!(repairs.len(), 1);
    assert_eq!(repairs[0].prior_diagram, BROKEN);
    assert_eq!(repairs[0].error, "Parse error on line 2");
    assert!(repairs[0].preserve_diagram_type);

    assert_eq!(
        h.channel.events(),
        vec![
            RepairEvent::Drafting,
            RepairEvent::Validating { attempt: 0 },
            RepairEvent::ValidationFailed {
                attempt: 0,
                error: "Parse error on line 2".to_string()
            },
            RepairEvent::Fixing { attempt: 1 },
            RepairEvent::Validating { attempt: 1 },
            RepairEvent::Completed {
                success: true,
                attempts: 1
            },
        ]
    );
}

#[tokio::test]
async fn test_answer_counts_multiple_fix_attempts() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "Done.")))
            .then_repair(Ok(DraftResult::new(BROKEN, "")))
            .then_repair(Ok(DraftResult::new(VALID, ""))),
        vec![Reply::Fail("a"), Reply::Fail("b"), Reply::Pass],
        repair_config(20),
    );

    let outcome = h.orchestrator.run(request("x")).await;
    assert!(outcome.success);
    assert_eq!(outcome.chat_answer, "Done. (fixed after 2 attempts)");
    assert_eq!(h.generator.recorded()[1].error, "b");
}

#[tokio::test]
async fn test_budget_exhaustion_returns_last_diagram_and_error() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "A login flow."))),
        Vec::new(),
        repair_config(3),
    );

    let outcome = h.orchestrator.run(request("draw a login flow")).await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.diagram_source, BROKEN);
    assert_eq!(outcome.error.as_deref(), Some("Parse error"));
    assert_eq!(outcome.validation, ValidationStatus::Failed);
    assert!(outcome.chat_answer.contains("Parse error"));
    assert_eq!(h.channel.validated().len(), 4);
}

#[tokio::test]
async fn test_round_trips_never_exceed_budget_plus_one() {
    for max in 0..=4 {
        let h = harness(
            ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "x"))),
            Vec::new(),
            repair_config(max),
        );

        let outcome = h.orchestrator.run(request("x")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, max);
        assert_eq!(h.channel.validated().len() as u32, max + 1);
        assert_eq!(h.generator.recorded().len() as u32, max);
    }
}

#[tokio::test]
async fn test_no_render_target_skips_validation() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "Unchecked."))),
        Vec::new(),
        repair_config(20),
    );

    let outcome = h
        .orchestrator
        .run(GenerationRequest::new(GenerationContext::new("x")))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.diagram_source, BROKEN);
    assert_eq!(outcome.validation, ValidationStatus::Skipped);
    assert!(h.channel.validated().is_empty());
}

#[tokio::test]
async fn test_opt_out_skips_validation() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "Unchecked."))),
        Vec::new(),
        repair_config(20),
    );

    let outcome = h.orchestrator.run(request("x").without_validation()).await;
    assert!(outcome.success);
    assert_eq!(outcome.validation, ValidationStatus::Skipped);
    assert!(h.channel.validated().is_empty());
    assert!(h.channel.events().is_empty());
}

#[tokio::test]
async fn test_disconnected_client_skips_validation() {
    let correlator = ValidationCorrelator::new(Duration::from_secs(5));
    let channel = Arc::new(ScriptedChannel::disconnected(correlator.clone()));
    let h = build(
        ScriptedGenerator::drafting(Ok(DraftResult::new(VALID, "ok"))),
        channel,
        correlator,
        repair_config(20),
    );

    let outcome = h.orchestrator.run(request("x")).await;
    assert!(outcome.success);
    assert_eq!(outcome.validation, ValidationStatus::Skipped);
    assert_eq!(outcome.attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_client_times_out_optimistically() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(VALID, "ok"))),
        vec![Reply::Silent],
        repair_config(20),
    );

    let started = tokio::time::Instant::now();
    let outcome = h.orchestrator.run(request("x")).await;

    assert!(outcome.success);
    assert_eq!(outcome.validation, ValidationStatus::Inconclusive);
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(h.correlator.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_inconclusive_can_be_treated_as_failure() {
    let config = RepairConfig {
        inconclusive_is_failure: true,
        ..RepairConfig::default()
    };
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(VALID, "ok"))),
        vec![Reply::Silent],
        config,
    );

    let outcome = h.orchestrator.run(request("x")).await;
    assert!(!outcome.success);
    assert_eq!(outcome.validation, ValidationStatus::Inconclusive);
    assert_eq!(outcome.diagram_source, VALID);
    assert!(h.generator.recorded().is_empty());
}

#[tokio::test]
async fn test_draft_provider_failure_keeps_current_diagram() {
    let h = harness(
        ScriptedGenerator::drafting(Err(GenerationError::transport("connection refused"))),
        Vec::new(),
        repair_config(20),
    );

    let context = GenerationContext::new("add a node").with_current_diagram(VALID);
    let outcome = h
        .orchestrator
        .run(GenerationRequest::new(context).with_connection(ConnectionId::new()))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.validation, ValidationStatus::NotReached);
    assert_eq!(outcome.diagram_source, VALID);
    assert!(outcome.chat_answer.contains("connection refused"));
    assert_eq!(outcome.error, Some(outcome.chat_answer.clone()));
    assert!(h.channel.validated().is_empty());
}

#[tokio::test]
async fn test_repair_provider_failure_stops_without_retry() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "x")))
            .then_repair(Err(GenerationError::transport("502 bad gateway"))),
        Vec::new(),
        repair_config(20),
    );

    let outcome = h.orchestrator.run(request("x")).await;
    assert!(!outcome.success);
    assert_eq!(outcome.diagram_source, BROKEN);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(h.generator.recorded().len(), 1);
    assert!(outcome.error.unwrap_or_default().contains("502 bad gateway"));
}

#[tokio::test]
async fn test_empty_repair_consumes_attempt_and_keeps_best_diagram() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "x")))
            .then_repair(Ok(DraftResult::empty("nothing")))
            .then_repair(Ok(DraftResult::new(VALID, ""))),
        vec![Reply::Fail("Parse error"), Reply::Pass],
        repair_config(20),
    );

    let outcome = h.orchestrator.run(request("x")).await;
    assert!(outcome.success);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.diagram_source, VALID);
    // The empty candidate never reached the render client
    assert_eq!(h.channel.validated(), vec![BROKEN.to_string(), VALID.to_string()]);

    let repairs = h.generator.recorded();
    assert_eq!(repairs[1].prior_diagram, BROKEN);
    assert_eq!(repairs[1].error, EMPTY_DIAGRAM_ERROR);
}

#[tokio::test]
async fn test_empty_repairs_until_budget_return_last_non_empty() {
    let h = harness(
        ScriptedGenerator::drafting(Ok(DraftResult::new(BROKEN, "x")))
            .then_repair(Ok(DraftResult::empty("")))
            .then_repair(Ok(DraftResult::empty(""))),
        Vec::new(),
        repair_config(2),
    );

    let outcome = h.orchestrator.run(request("x")).await;
    assert!(!outcome.success);
    assert_eq!(outcome.diagram_source, BROKEN);
    assert_eq!(outcome.error.as_deref(), Some(EMPTY_DIAGRAM_ERROR));
}

#[tokio::test(start_paused = true)]
async fn test_provider_timeout_is_a_provider_failure() {
    let correlator = ValidationCorrelator::new(Duration::from_secs(5));
    let channel = Arc::new(ScriptedChannel::new(correlator.clone(), Vec::new()));
    let validator = RemoteValidator::new(correlator, channel);
    let orchestrator = RepairOrchestrator::new(Arc::new(HangingGenerator), validator, RepairConfig::default())
        .with_provider_timeout(Duration::from_secs(30));

    let outcome = orchestrator.run(request("x")).await;
    assert!(!outcome.success);
    assert_eq!(outcome.validation, ValidationStatus::NotReached);
    assert!(outcome.error.unwrap_or_default().contains("timed out"));
}

/// Provider that draws the prompt into the diagram so results are traceable
struct EchoGenerator;

#[async_trait]
impl GenerationClient for EchoGenerator {
    async fn draft(&self, context: &GenerationContext) -> GenerationResult<DraftResult> {
        Ok(DraftResult::new(
            format!("graph TD\n{}", context.prompt),
            format!("Diagram for {}", context.prompt),
        ))
    }

    async fn repair(&self, request: RepairRequest<'_>) -> GenerationResult<DraftResult> {
        Ok(DraftResult::new(request.prior_diagram, ""))
    }
}

/// Answer every validation on this connection after `delay`, recording what was seen
fn spawn_render_client(
    registry: Arc<ConnectionRegistry>,
    connection: ConnectionId,
    mut frames: tokio::sync::mpsc::UnboundedReceiver<OutboundMessage>,
    delay: Duration,
    seen: Arc<Mutex<Vec<String>>>,
) {
    tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let OutboundMessage::Validate {
                correlation_id,
                diagram_source,
            } = frame
            {
                seen.lock().unwrap().push(diagram_source);
                tokio::time::sleep(delay).await;
                registry
                    .deliver_verdict(&connection, ValidationVerdict::passed(correlation_id))
                    .await;
            }
        }
    });
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_isolated_per_connection() {
    let correlator = ValidationCorrelator::new(Duration::from_secs(5));
    let registry = Arc::new(ConnectionRegistry::new(correlator.clone()));
    let validator = RemoteValidator::new(correlator.clone(), registry.clone());
    let orchestrator = Arc::new(RepairOrchestrator::new(
        Arc::new(EchoGenerator),
        validator,
        RepairConfig::default(),
    ));

    let (slow, slow_rx) = registry.connect().await;
    let (fast, fast_rx) = registry.connect().await;
    let slow_seen = Arc::new(Mutex::new(Vec::new()));
    let fast_seen = Arc::new(Mutex::new(Vec::new()));
    // Verdicts come back in the reverse order of the requests
    spawn_render_client(registry.clone(), slow.clone(), slow_rx, Duration::from_millis(500), slow_seen.clone());
    spawn_render_client(registry.clone(), fast.clone(), fast_rx, Duration::from_millis(10), fast_seen.clone());

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let request = GenerationRequest::new(GenerationContext::new("alpha")).with_connection(slow);
        async move { orchestrator.run(request).await }
    });
    let second = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let request = GenerationRequest::new(GenerationContext::new("beta")).with_connection(fast);
        async move { orchestrator.run(request).await }
    });

    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert!(first.success && second.success);
    assert_eq!(first.validation, ValidationStatus::Verified);
    assert_eq!(second.validation, ValidationStatus::Verified);
    assert_eq!(first.diagram_source, "graph TD\nalpha");
    assert_eq!(second.diagram_source, "graph TD\nbeta");
    assert_eq!(*slow_seen.lock().unwrap(), vec!["graph TD\nalpha".to_string()]);
    assert_eq!(*fast_seen.lock().unwrap(), vec!["graph TD\nbeta".to_string()]);
    assert_eq!(correlator.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_validation_resolves_without_waiting_for_timeout() {
    let correlator = ValidationCorrelator::new(Duration::from_secs(5));
    let registry = Arc::new(ConnectionRegistry::new(correlator.clone()));
    let validator = RemoteValidator::new(correlator, registry.clone());
    let orchestrator = RepairOrchestrator::new(Arc::new(EchoGenerator), validator, RepairConfig::default());

    let (connection, mut frames) = registry.connect().await;
    tokio::spawn({
        let registry = registry.clone();
        let connection = connection.clone();
        async move {
            while let Some(frame) = frames.recv().await {
                if matches!(frame, OutboundMessage::Validate { .. }) {
                    registry.disconnect(&connection).await;
                    break;
                }
            }
        }
    });

    let started = tokio::time::Instant::now();
    let outcome = orchestrator
        .run(GenerationRequest::new(GenerationContext::new("gamma")).with_connection(connection))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.validation, ValidationStatus::Inconclusive);
    assert!(started.elapsed() < Duration::from_secs(5));
}
