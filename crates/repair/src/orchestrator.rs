//! Repair Orchestrator - draft, validate, and fix until the diagram renders
//!
//! One call to [`RepairOrchestrator::run`] drives a single request through an
//! explicit state machine. Validation rounds are strictly sequential and the
//! number of repairs is bounded by `repair.max_fix_attempts`, so every run
//! terminates with a [`GenerationOutcome`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use diagram_common::{
    ConnectionId, DraftResult, GenerationContext, GenerationOutcome, RepairConfig, ValidationStatus,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{GenerationError, GenerationResult};
use crate::events::RepairEvent;
use crate::generation::{GenerationClient, RepairRequest};
use crate::sanitizer::sanitize_code;
use crate::validation::RemoteValidator;

pub const EMPTY_DIAGRAM_ERROR: &str = "Generated diagram is empty";
pub const INCONCLUSIVE_ERROR: &str = "render validation inconclusive";
const UNKNOWN_RENDER_ERROR: &str = "Unknown render error";

/// A top-level generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub context: GenerationContext,
    /// Render client that issued the request; validation only ever targets it
    pub connection: Option<ConnectionId>,
    /// Set to `false` to skip render validation entirely
    pub validate: bool,
}

impl GenerationRequest {
    pub fn new(context: GenerationContext) -> Self {
        Self {
            context,
            connection: None,
            validate: true,
        }
    }

    pub fn with_connection(mut self, connection: ConnectionId) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }
}

#[derive(Debug)]
enum RepairState {
    Drafting,
    Validating { connection: ConnectionId, candidate: String },
    Fixing { connection: ConnectionId, error: String },
    Done(GenerationOutcome),
}

/// Mutable bookkeeping carried across states of one run
#[derive(Debug, Default)]
struct RunProgress {
    /// Explanation from the first draft; what the user sees as the answer
    explanation: String,
    /// Most recent candidate, possibly empty
    candidate: String,
    /// Last non-empty candidate
    best_diagram: String,
    attempts: u32,
}

impl RunProgress {
    fn accept(&mut self, draft: DraftResult) {
        let diagram = sanitize_code(&draft.diagram_source);
        if !diagram.is_empty() {
            self.best_diagram = diagram.clone();
        }
        self.candidate = diagram;
    }

    fn answer(&self) -> String {
        match self.attempts {
            0 => self.explanation.clone(),
            1 => format!("{} (fixed after 1 attempt)", self.explanation),
            n => format!("{} (fixed after {n} attempts)", self.explanation),
        }
    }
}

pub struct RepairOrchestrator {
    generator: Arc<dyn GenerationClient>,
    validator: RemoteValidator,
    config: RepairConfig,
    provider_timeout: Option<Duration>,
}

impl RepairOrchestrator {
    pub fn new(generator: Arc<dyn GenerationClient>, validator: RemoteValidator, config: RepairConfig) -> Self {
        Self {
            generator,
            validator,
            config,
            provider_timeout: None,
        }
    }

    /// Bound every provider call; an elapsed call counts as a provider failure
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    #[instrument(
        skip(self, request),
        fields(
            connection_id = ?request.connection.as_ref().map(ConnectionId::as_str),
            prompt_len = request.context.prompt.len(),
            history_len = request.context.history.len(),
        )
    )]
    pub async fn run(&self, request: GenerationRequest) -> GenerationOutcome {
        let GenerationRequest {
            context,
            connection,
            validate,
        } = request;
        // Opted-out callers get no loop traffic at all
        let progress_target = connection.as_ref().filter(|_| validate);
        let mut progress = RunProgress::default();
        let mut state = RepairState::Drafting;

        let outcome = loop {
            state = match state {
                RepairState::Drafting => {
                    self.notify(progress_target, RepairEvent::Drafting).await;
                    match self.call_provider(self.generator.draft(&context)).await {
                        Ok(draft) => {
                            progress.explanation = draft.explanation.clone();
                            progress.accept(draft);
                            match self.render_target(connection.as_ref(), validate).await {
                                Some(connection) => RepairState::Validating {
                                    connection,
                                    candidate: progress.candidate.clone(),
                                },
                                None => {
                                    debug!("No render target, returning unvalidated draft");
                                    RepairState::Done(GenerationOutcome::succeeded(
                                        progress.answer(),
                                        progress.candidate.clone(),
                                        0,
                                        ValidationStatus::Skipped,
                                    ))
                                }
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Draft generation failed");
                            let message = e.to_string();
                            // Hand back whatever the user already had
                            RepairState::Done(GenerationOutcome::failed(
                                message.clone(),
                                context.current_diagram.clone(),
                                message,
                                0,
                                ValidationStatus::NotReached,
                            ))
                        }
                    }
                }

                RepairState::Validating { connection, candidate } => {
                    match self.check(&connection, candidate, &progress).await {
                        Ok(outcome) => RepairState::Done(outcome),
                        Err(error) => self.after_failure(connection, error, &progress, &context).await,
                    }
                }

                RepairState::Fixing { connection, error } => {
                    progress.attempts += 1;
                    let attempt = progress.attempts;
                    self.validator.notify(&connection, RepairEvent::Fixing { attempt }).await;

                    let prior = if progress.candidate.is_empty() {
                        progress.best_diagram.clone()
                    } else {
                        progress.candidate.clone()
                    };
                    let repair = RepairRequest::new(&context, &prior, &error);

                    match self.call_provider(self.generator.repair(repair)).await {
                        Ok(draft) => {
                            progress.accept(draft);
                            RepairState::Validating {
                                connection,
                                candidate: progress.candidate.clone(),
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, attempt, "Repair generation failed");
                            let message = e.to_string();
                            RepairState::Done(GenerationOutcome::failed(
                                message.clone(),
                                best_effort(&progress, &context),
                                message,
                                attempt,
                                ValidationStatus::Failed,
                            ))
                        }
                    }
                }

                RepairState::Done(outcome) => break outcome,
            };
        };

        self.notify(
            progress_target,
            RepairEvent::Completed {
                success: outcome.success,
                attempts: outcome.attempts,
            },
        )
        .await;
        outcome
    }

    /// One validation round. `Ok` ends the run, `Err` carries the render error.
    async fn check(
        &self,
        connection: &ConnectionId,
        candidate: String,
        progress: &RunProgress,
    ) -> Result<GenerationOutcome, String> {
        if candidate.is_empty() {
            return Err(EMPTY_DIAGRAM_ERROR.to_string());
        }

        let attempt = progress.attempts;
        self.validator
            .notify(connection, RepairEvent::Validating { attempt })
            .await;
        let verdict = self.validator.validate(connection, &candidate).await;

        if !verdict.success {
            return Err(verdict.error.unwrap_or_else(|| UNKNOWN_RENDER_ERROR.to_string()));
        }

        if !verdict.is_inconclusive() {
            info!(attempts = attempt, "Diagram verified by render client");
            return Ok(GenerationOutcome::succeeded(
                progress.answer(),
                candidate,
                attempt,
                ValidationStatus::Verified,
            ));
        }

        if self.config.inconclusive_is_failure {
            info!(origin = ?verdict.origin, attempts = attempt, "Validation inconclusive, reporting failure");
            return Ok(GenerationOutcome::failed(
                format!("{} ({INCONCLUSIVE_ERROR})", progress.explanation),
                candidate,
                INCONCLUSIVE_ERROR,
                attempt,
                ValidationStatus::Inconclusive,
            ));
        }

        info!(origin = ?verdict.origin, attempts = attempt, "Validation inconclusive, accepting optimistically");
        Ok(GenerationOutcome::succeeded(
            progress.answer(),
            candidate,
            attempt,
            ValidationStatus::Inconclusive,
        ))
    }

    /// Decide between another repair and giving up after a failed render
    async fn after_failure(
        &self,
        connection: ConnectionId,
        error: String,
        progress: &RunProgress,
        context: &GenerationContext,
    ) -> RepairState {
        let attempt = progress.attempts;
        info!(attempt, error = %error, "Diagram failed validation");
        self.validator
            .notify(
                &connection,
                RepairEvent::ValidationFailed {
                    attempt,
                    error: error.clone(),
                },
            )
            .await;

        if attempt < self.config.max_fix_attempts {
            return RepairState::Fixing { connection, error };
        }

        warn!(
            attempts = attempt,
            max_fix_attempts = self.config.max_fix_attempts,
            "Repair budget exhausted"
        );
        let answer = format!(
            "{}\n\nThe diagram still fails to render after {attempt} fix attempt{}: {error}",
            progress.explanation,
            if attempt == 1 { "" } else { "s" },
        );
        RepairState::Done(GenerationOutcome::failed(
            answer.trim_start(),
            best_effort(progress, context),
            error,
            attempt,
            ValidationStatus::Failed,
        ))
    }

    /// Validation target for this request, if any
    async fn render_target(&self, connection: Option<&ConnectionId>, validate: bool) -> Option<ConnectionId> {
        let connection = connection.filter(|_| validate)?;
        if self.validator.is_available(connection).await {
            Some(connection.clone())
        } else {
            debug!(connection_id = %connection, "Render connection not available");
            None
        }
    }

    async fn notify(&self, connection: Option<&ConnectionId>, event: RepairEvent) {
        if let Some(connection) = connection {
            self.validator.notify(connection, event).await;
        }
    }

    async fn call_provider<F>(&self, call: F) -> GenerationResult<DraftResult>
    where
        F: Future<Output = GenerationResult<DraftResult>>,
    {
        match self.provider_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| GenerationError::Timeout(limit))?,
            None => call.await,
        }
    }
}

/// Last non-empty candidate, else the diagram the user started from
fn best_effort(progress: &RunProgress, context: &GenerationContext) -> String {
    if progress.best_diagram.is_empty() {
        context.current_diagram.clone()
    } else {
        progress.best_diagram.clone()
    }
}
