use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use skyrchitect_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use skyrchitect_core::cloud::catalog::ServiceCatalog;
use skyrchitect_core::config::LlmConfig;
use skyrchitect_core::domain::request::RequestKind;
use skyrchitect_core::domain::session::{SessionId, Turn, TurnRole};
use skyrchitect_core::errors::ErrorKind;
use skyrchitect_core::flows::{LoopAction, LoopContext, LoopEvent, LoopState, LoopStateMachine};

use crate::errors::{LoopFailure, ModelError};
use crate::llm::{ContextEntry, ModelCapability, ModelTurn};
use crate::memory::SessionMemoryStore;
use crate::payload::{parse_terminal, ParsedPayload};
use crate::router::LoopConfig;
use crate::tools::{ToolCallRequest, ToolCallResult, ToolRegistry, ToolSchema};

/// Retry schedule for transient model failures at PLANNING.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            call_timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Exponential backoff: `backoff * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(250),
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInput {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct LoopRequest {
    pub config: LoopConfig,
    pub session_id: Option<SessionId>,
    pub system_prompt: String,
    pub user_message: String,
    pub image: Option<ImageInput>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub kind: RequestKind,
    pub tool_rounds: u32,
    pub tool_calls: usize,
    pub model_calls: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoopOutcome {
    pub payload: ParsedPayload,
    pub summary: RunSummary,
}

/// State of one loop instance; every transition goes through the flow table.
struct Run<'a> {
    machine: LoopStateMachine,
    sink: &'a dyn AuditSink,
    audit: AuditContext,
    state: LoopState,
    context: LoopContext,
    model_calls: u32,
    tool_calls: usize,
}

impl Run<'_> {
    fn correlation_id(&self) -> &str {
        &self.audit.correlation_id
    }

    fn advance(&mut self, event: LoopEvent) -> Result<Vec<LoopAction>, LoopFailure> {
        match self.machine.apply_with_audit(self.state, event, &self.context, self.sink, &self.audit)
        {
            Ok(outcome) => {
                info!(
                    event_name = "agent.loop.transition",
                    correlation_id = %self.audit.correlation_id,
                    from = outcome.from.as_str(),
                    to = outcome.to.as_str(),
                    event = outcome.event.as_str(),
                    completed_rounds = self.context.completed_rounds,
                    "loop transition applied"
                );
                self.state = outcome.to;
                Ok(outcome.actions)
            }
            Err(error) => Err(self.fail(LoopFailure::new(error.kind(), error.to_string()))),
        }
    }

    /// Moves the run to FAILED, recording the triggering error kind.
    fn fail(&mut self, failure: LoopFailure) -> LoopFailure {
        if !self.state.is_final() {
            let abort = LoopEvent::Abort { kind: failure.kind };
            if let Ok(outcome) = self.machine.apply_with_audit(
                self.state,
                abort,
                &self.context,
                self.sink,
                &self.audit,
            ) {
                self.state = outcome.to;
            }
        }
        warn!(
            event_name = "agent.loop.failed",
            correlation_id = %self.audit.correlation_id,
            error_kind = failure.kind.as_str(),
            cause = %failure.cause,
            completed_rounds = self.context.completed_rounds,
            "loop failed"
        );
        failure
    }

    fn cancelled(&mut self, at: &str) -> LoopFailure {
        self.fail(LoopFailure::new(ErrorKind::Cancelled, format!("run cancelled {at}")))
    }
}

/// The single PLANNING/TOOL_DISPATCH loop shared by every request kind.
pub struct OrchestrationLoop {
    model: Arc<dyn ModelCapability>,
    tools: Arc<ToolRegistry>,
    catalog: Arc<ServiceCatalog>,
    memory: Arc<SessionMemoryStore>,
    audit: Arc<dyn AuditSink>,
    retry: RetryPolicy,
}

impl OrchestrationLoop {
    pub fn new(
        model: Arc<dyn ModelCapability>,
        tools: Arc<ToolRegistry>,
        catalog: Arc<ServiceCatalog>,
    ) -> Self {
        Self {
            model,
            tools,
            catalog,
            memory: Arc::new(SessionMemoryStore::default()),
            audit: Arc::new(NoopAuditSink),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_memory(mut self, memory: Arc<SessionMemoryStore>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn memory(&self) -> &Arc<SessionMemoryStore> {
        &self.memory
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn run(
        &self,
        request: LoopRequest,
        cancel: &CancellationToken,
    ) -> Result<LoopOutcome, LoopFailure> {
        let run_id = Uuid::new_v4().to_string();
        let stateful = request.config.consult_memory && request.session_id.is_some();
        let mut run = Run {
            machine: LoopStateMachine,
            sink: self.audit.as_ref(),
            audit: AuditContext::new(request.session_id.clone(), run_id.clone(), "orchestration_loop"),
            state: LoopStateMachine.initial_state(),
            context: LoopContext::new(stateful, request.config.max_iterations),
            model_calls: 0,
            tool_calls: 0,
        };

        let wall_clock = request.config.wall_clock;
        let outcome = tokio::time::timeout(wall_clock, self.drive(&mut run, &request, cancel)).await;
        let payload = match outcome {
            Ok(result) => result?,
            Err(_) => {
                return Err(run.fail(LoopFailure::new(
                    ErrorKind::BudgetExhausted,
                    format!("wall-clock budget of {}ms exceeded", wall_clock.as_millis()),
                )));
            }
        };

        Ok(LoopOutcome {
            payload,
            summary: RunSummary {
                run_id,
                kind: request.config.kind,
                tool_rounds: run.context.completed_rounds,
                tool_calls: run.tool_calls,
                model_calls: run.model_calls,
            },
        })
    }

    async fn drive(
        &self,
        run: &mut Run<'_>,
        request: &LoopRequest,
        cancel: &CancellationToken,
    ) -> Result<ParsedPayload, LoopFailure> {
        let config = &request.config;
        if cancel.is_cancelled() {
            return Err(run.cancelled("before start"));
        }

        let mut context = self.assemble_context(request, run.context.stateful).await;
        run.advance(LoopEvent::ContextAssembled)?;
        let schemas = self.tools.schemas(&config.tools);

        loop {
            if cancel.is_cancelled() {
                return Err(run.cancelled("before planning"));
            }
            let budget_remaining = config.max_iterations.saturating_sub(run.context.completed_rounds);
            let turn = self.complete_with_retry(run, &context, &schemas, budget_remaining, cancel).await?;

            let calls = match turn {
                ModelTurn::Final(payload) => {
                    let parsed = match parse_terminal(config.payload_shape, &payload, &self.catalog) {
                        Ok(parsed) => parsed,
                        Err(failure) => return Err(run.fail(failure)),
                    };
                    let actions = run.advance(LoopEvent::FinalAccepted)?;
                    if actions.contains(&LoopAction::PersistSessionTurns) {
                        if let Some(session_id) = &request.session_id {
                            let user = Turn::user(request.user_message.clone());
                            let assistant = Turn::assistant(parsed.summary());
                            self.memory.append_exchange(session_id, user, assistant).await;
                        }
                    }
                    return Ok(parsed);
                }
                ModelTurn::ToolCalls(calls) => calls,
            };

            if calls.is_empty() {
                return Err(run.fail(LoopFailure::malformed("model requested an empty tool-call list")));
            }
            if config.is_single_shot() {
                return Err(run.fail(LoopFailure::malformed(format!(
                    "`{}` runs are single-shot and accept no tool calls",
                    config.kind
                ))));
            }

            run.advance(LoopEvent::ToolCallsRequested)?;
            let round = run.context.completed_rounds + 1;
            let requests = calls
                .into_iter()
                .enumerate()
                .map(|(index, call)| ToolCallRequest {
                    request_id: format!("call-{round}-{index}"),
                    name: call.name,
                    arguments: call.arguments,
                })
                .collect::<Vec<_>>();

            // Sequential dispatch keeps results in request order.
            let mut results = Vec::with_capacity(requests.len());
            for tool_request in &requests {
                let result = self.tools.invoke_exposed(tool_request, &config.tools).await;
                self.record_tool_call(run, &result);
                results.push(result);
            }
            if cancel.is_cancelled() {
                return Err(run.cancelled("during tool dispatch; results discarded"));
            }

            context.push(ContextEntry::ToolCalls { calls: requests });
            context.extend(results.into_iter().map(|result| ContextEntry::ToolResult { result }));
            run.context.completed_rounds += 1;
            run.advance(LoopEvent::ResultsFolded)?;
        }
    }

    async fn assemble_context(&self, request: &LoopRequest, stateful: bool) -> Vec<ContextEntry> {
        let mut context = vec![ContextEntry::system(request.system_prompt.clone())];
        if let (true, Some(session_id)) = (stateful, &request.session_id) {
            let history = self.memory.recent(session_id, request.config.history_turns).await;
            context.extend(history.into_iter().map(|turn| match turn.role {
                TurnRole::User => ContextEntry::user(turn.content),
                TurnRole::Assistant => ContextEntry::assistant(turn.content),
            }));
        }
        context.push(ContextEntry::user(request.user_message.clone()));
        if let Some(image) = &request.image {
            context.push(ContextEntry::Image {
                mime_type: image.mime_type.clone(),
                bytes: image.bytes.clone(),
            });
        }
        context
    }

    async fn complete_with_retry(
        &self,
        run: &mut Run<'_>,
        context: &[ContextEntry],
        schemas: &[ToolSchema],
        budget_remaining: u32,
        cancel: &CancellationToken,
    ) -> Result<ModelTurn, LoopFailure> {
        let mut attempt = 0u32;
        loop {
            run.model_calls += 1;
            let call = tokio::time::timeout(
                self.retry.call_timeout,
                self.model.complete(context, schemas, budget_remaining),
            );
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(run.cancelled("while waiting for the model")),
                outcome = call => outcome.unwrap_or(Err(ModelError::Timeout(self.retry.call_timeout))),
            };

            let error = match result {
                Ok(turn) => return Ok(turn),
                Err(error) => error,
            };

            if !error.is_retryable() || attempt >= self.retry.max_retries {
                run.sink.emit(
                    run.audit
                        .event("model.unavailable", AuditCategory::Model, AuditOutcome::Failed)
                        .with_metadata("attempts", (attempt + 1).to_string())
                        .with_metadata("error", error.to_string()),
                );
                return Err(run.fail(LoopFailure::new(
                    ErrorKind::ModelUnavailable,
                    format!("model call failed after {} attempt(s): {error}", attempt + 1),
                )));
            }

            let delay = self.retry.delay_for(attempt);
            attempt += 1;
            warn!(
                event_name = "agent.model.retry",
                correlation_id = %run.correlation_id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying model call"
            );
            run.sink.emit(
                run.audit
                    .event("model.retry", AuditCategory::Model, AuditOutcome::Failed)
                    .with_metadata("attempt", attempt.to_string())
                    .with_metadata("error", error.to_string()),
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(run.cancelled("during model retry backoff")),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn record_tool_call(&self, run: &mut Run<'_>, result: &ToolCallResult) {
        run.tool_calls += 1;
        let error_kind = result.error_kind().map(|kind| kind.as_str()).unwrap_or("none");
        info!(
            event_name = "agent.tool.invoked",
            correlation_id = %run.correlation_id(),
            tool = %result.tool,
            request_id = %result.request_id,
            success = result.success,
            error_kind,
            "tool invoked"
        );
        let outcome = if result.success { AuditOutcome::Success } else { AuditOutcome::Failed };
        run.sink.emit(
            run.audit
                .event("tool.invoked", AuditCategory::Tool, outcome)
                .with_metadata("tool", result.tool.clone())
                .with_metadata("request_id", result.request_id.clone())
                .with_metadata("error_kind", error_kind),
        );
    }
}
