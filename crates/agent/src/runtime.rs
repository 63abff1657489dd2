use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use skyrchitect_core::audit::AuditSink;
use skyrchitect_core::cloud::cost::CostBreakdown;
use skyrchitect_core::cloud::validator::ValidationReport;
use skyrchitect_core::cloud::CloudToolkit;
use skyrchitect_core::config::AppConfig;
use skyrchitect_core::domain::architecture::Architecture;
use skyrchitect_core::domain::budget::{BudgetAssessment, BudgetHint};
use skyrchitect_core::domain::request::{IacFormat, OptimizationGoal, RequestKind};
use skyrchitect_core::domain::service::Provider;
use skyrchitect_core::domain::session::SessionId;
use skyrchitect_core::errors::ErrorKind;

use crate::errors::LoopFailure;
use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::ModelCapability;
use crate::memory::SessionMemoryStore;
use crate::orchestrator::{ImageInput, LoopRequest, OrchestrationLoop, RetryPolicy, RunSummary};
use crate::payload::{ImageExtraction, ParsedPayload};
use crate::prompts;
use crate::router::ExecutionModeRouter;
use crate::tools::{ToolRegistry, ToolSchema};

pub const SUPPORTED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/webp", "image/gif"];

#[derive(Clone, Debug, PartialEq)]
pub enum AgentRequest {
    ArchitectureGeneration {
        session_id: SessionId,
        requirements: String,
        provider: Provider,
        budget: BudgetHint,
    },
    ArchitectureOptimization {
        session_id: SessionId,
        architecture: Architecture,
        goal: OptimizationGoal,
        provider: Provider,
        budget: BudgetHint,
    },
    CodeGeneration {
        architecture: Architecture,
        format: IacFormat,
    },
    ImageExtraction {
        bytes: Vec<u8>,
        mime_type: String,
    },
    Question {
        session_id: SessionId,
        question: String,
        context: Option<String>,
    },
}

impl AgentRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::ArchitectureGeneration { .. } => RequestKind::ArchitectureGeneration,
            Self::ArchitectureOptimization { .. } => RequestKind::ArchitectureOptimization,
            Self::CodeGeneration { .. } => RequestKind::CodeGeneration,
            Self::ImageExtraction { .. } => RequestKind::ImageExtraction,
            Self::Question { .. } => RequestKind::Question,
        }
    }
}

/// Architecture plus reasoning, enriched with deterministic cost and validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureProposal {
    pub architecture: Architecture,
    pub reasoning: String,
    pub provider: Provider,
    pub cost: CostBreakdown,
    pub validation: ValidationReport,
    pub budget: BudgetAssessment,
    pub guardrail: GuardrailDecision,
    pub run: RunSummary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub format: IacFormat,
    pub code: String,
    pub run: RunSummary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureAnswer {
    pub answer: String,
    pub run: RunSummary,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "result", rename_all = "snake_case")]
pub enum AgentResponse {
    Proposal(ArchitectureProposal),
    Code(GeneratedCode),
    Extraction(ImageExtraction),
    Answer(ArchitectureAnswer),
}

/// Caller-facing facade over the orchestration loop.
pub struct AgentRuntime {
    orchestrator: OrchestrationLoop,
    router: ExecutionModeRouter,
    toolkit: Arc<CloudToolkit>,
    guardrails: GuardrailPolicy,
}

impl AgentRuntime {
    pub fn new(model: Arc<dyn ModelCapability>) -> Self {
        Self::from_config(model, &AppConfig::default())
    }

    pub fn from_config(model: Arc<dyn ModelCapability>, config: &AppConfig) -> Self {
        let toolkit = Arc::new(CloudToolkit::default());
        let tools = Arc::new(ToolRegistry::standard(Arc::clone(&toolkit)));
        let orchestrator = OrchestrationLoop::new(model, tools, toolkit.shared_catalog())
            .with_memory(Arc::new(SessionMemoryStore::from_config(&config.memory)))
            .with_retry(RetryPolicy::from_config(&config.llm));
        Self {
            orchestrator,
            router: ExecutionModeRouter::from_config(&config.agent),
            toolkit,
            guardrails: GuardrailPolicy::default(),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.orchestrator = self.orchestrator.with_audit_sink(audit);
        self
    }

    pub fn with_memory(mut self, memory: Arc<SessionMemoryStore>) -> Self {
        self.orchestrator = self.orchestrator.with_memory(memory);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.orchestrator = self.orchestrator.with_retry(retry);
        self
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn memory(&self) -> &Arc<SessionMemoryStore> {
        self.orchestrator.memory()
    }

    pub fn list_tools(&self) -> Vec<ToolSchema> {
        self.orchestrator.tools().list()
    }

    pub async fn evict_stale_sessions(&self, now: DateTime<Utc>) -> usize {
        self.memory().evict_stale(now).await
    }

    pub async fn run_architecture_generation(
        &self,
        session_id: SessionId,
        requirements: impl Into<String>,
        provider: Provider,
        budget: BudgetHint,
    ) -> Result<ArchitectureProposal, LoopFailure> {
        let request = AgentRequest::ArchitectureGeneration {
            session_id,
            requirements: requirements.into(),
            provider,
            budget,
        };
        match self.run(request, &CancellationToken::new()).await? {
            AgentResponse::Proposal(proposal) => Ok(proposal),
            other => Err(unexpected_response(&other)),
        }
    }

    pub async fn run_architecture_optimization(
        &self,
        session_id: SessionId,
        architecture: Architecture,
        goal: OptimizationGoal,
        provider: Provider,
        budget: BudgetHint,
    ) -> Result<ArchitectureProposal, LoopFailure> {
        let request = AgentRequest::ArchitectureOptimization {
            session_id,
            architecture,
            goal,
            provider,
            budget,
        };
        match self.run(request, &CancellationToken::new()).await? {
            AgentResponse::Proposal(proposal) => Ok(proposal),
            other => Err(unexpected_response(&other)),
        }
    }

    pub async fn run_code_generation(
        &self,
        architecture: Architecture,
        format: IacFormat,
    ) -> Result<GeneratedCode, LoopFailure> {
        let request = AgentRequest::CodeGeneration { architecture, format };
        match self.run(request, &CancellationToken::new()).await? {
            AgentResponse::Code(code) => Ok(code),
            other => Err(unexpected_response(&other)),
        }
    }

    pub async fn run_image_extraction(
        &self,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Result<ImageExtraction, LoopFailure> {
        let request = AgentRequest::ImageExtraction { bytes, mime_type: mime_type.into() };
        match self.run(request, &CancellationToken::new()).await? {
            AgentResponse::Extraction(extraction) => Ok(extraction),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Answers a free-form architecture question within `session_id`.
    pub async fn run_question(
        &self,
        session_id: SessionId,
        question: impl Into<String>,
        context: Option<String>,
    ) -> Result<ArchitectureAnswer, LoopFailure> {
        let request = AgentRequest::Question { session_id, question: question.into(), context };
        match self.run(request, &CancellationToken::new()).await? {
            AgentResponse::Answer(answer) => Ok(answer),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Routes `request`, runs the loop and shapes its terminal payload.
    pub async fn run(
        &self,
        request: AgentRequest,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, LoopFailure> {
        let kind = request.kind();
        let config = self.router.route(kind)?;
        info!(event_name = "agent.request.received", request_kind = kind.as_str(), "running agent request");

        match request {
            AgentRequest::ArchitectureGeneration { session_id, requirements, provider, budget } => {
                let loop_request = LoopRequest {
                    config,
                    session_id: Some(session_id),
                    system_prompt: prompts::system_prompt(kind),
                    user_message: prompts::generation_request(&requirements, provider, budget),
                    image: None,
                };
                let outcome = self.orchestrator.run(loop_request, cancel).await?;
                self.proposal(outcome.payload, outcome.summary, provider, budget)
            }
            AgentRequest::ArchitectureOptimization {
                session_id,
                architecture,
                goal,
                provider,
                budget,
            } => {
                let loop_request = LoopRequest {
                    config,
                    session_id: Some(session_id),
                    system_prompt: prompts::system_prompt(kind),
                    user_message: prompts::optimization_request(&architecture, goal, provider, budget),
                    image: None,
                };
                let outcome = self.orchestrator.run(loop_request, cancel).await?;
                self.proposal(outcome.payload, outcome.summary, provider, budget)
            }
            AgentRequest::CodeGeneration { architecture, format } => {
                let loop_request = LoopRequest {
                    config,
                    session_id: None,
                    system_prompt: prompts::system_prompt(kind),
                    user_message: prompts::code_request(&architecture, format),
                    image: None,
                };
                let outcome = self.orchestrator.run(loop_request, cancel).await?;
                match outcome.payload {
                    ParsedPayload::Code(code) => {
                        Ok(AgentResponse::Code(GeneratedCode { format, code, run: outcome.summary }))
                    }
                    other => Err(shape_mismatch(kind, &other)),
                }
            }
            AgentRequest::ImageExtraction { bytes, mime_type } => {
                let mime_type = mime_type.trim().to_ascii_lowercase();
                if !SUPPORTED_IMAGE_TYPES.contains(&mime_type.as_str()) {
                    return Err(LoopFailure::unsupported_mode(format!(
                        "unsupported image type `{mime_type}` (expected png, jpeg, webp or gif)"
                    )));
                }
                if bytes.is_empty() {
                    return Err(LoopFailure::new(ErrorKind::InvariantViolation, "image is empty"));
                }
                let loop_request = LoopRequest {
                    config,
                    session_id: None,
                    system_prompt: prompts::system_prompt(kind),
                    user_message: prompts::image_request(&mime_type),
                    image: Some(ImageInput { mime_type, bytes }),
                };
                let outcome = self.orchestrator.run(loop_request, cancel).await?;
                match outcome.payload {
                    ParsedPayload::Extraction(record) => {
                        record.resolve(self.toolkit.catalog()).map(AgentResponse::Extraction)
                    }
                    other => Err(shape_mismatch(kind, &other)),
                }
            }
            AgentRequest::Question { session_id, question, context } => {
                if question.trim().is_empty() {
                    return Err(LoopFailure::new(ErrorKind::InvariantViolation, "question is empty"));
                }
                let loop_request = LoopRequest {
                    config,
                    session_id: Some(session_id),
                    system_prompt: prompts::system_prompt(kind),
                    user_message: prompts::question_request(&question, context.as_deref()),
                    image: None,
                };
                let outcome = self.orchestrator.run(loop_request, cancel).await?;
                match outcome.payload {
                    ParsedPayload::Answer(answer) => {
                        Ok(AgentResponse::Answer(ArchitectureAnswer { answer, run: outcome.summary }))
                    }
                    other => Err(shape_mismatch(kind, &other)),
                }
            }
        }
    }

    fn proposal(
        &self,
        payload: ParsedPayload,
        run: RunSummary,
        provider: Provider,
        budget: BudgetHint,
    ) -> Result<AgentResponse, LoopFailure> {
        let proposal = match payload {
            ParsedPayload::Proposal(proposal) => proposal,
            other => return Err(shape_mismatch(run.kind, &other)),
        };
        let evaluation = self
            .toolkit
            .evaluate(&proposal.architecture, budget)
            .map_err(|error| LoopFailure::new(error.kind(), error.to_string()))?;
        let guardrail = self.guardrails.evaluate(
            self.toolkit.catalog(),
            &proposal.architecture,
            provider,
            &evaluation.budget,
        );

        Ok(AgentResponse::Proposal(ArchitectureProposal {
            architecture: proposal.architecture,
            reasoning: proposal.reasoning,
            provider,
            cost: evaluation.cost,
            validation: evaluation.validation,
            budget: evaluation.budget,
            guardrail,
            run,
        }))
    }
}

fn shape_mismatch(kind: RequestKind, payload: &ParsedPayload) -> LoopFailure {
    LoopFailure::new(
        ErrorKind::InvariantViolation,
        format!("`{kind}` run produced a mismatched payload: {}", payload.summary()),
    )
}

fn unexpected_response(response: &AgentResponse) -> LoopFailure {
    let label = match response {
        AgentResponse::Proposal(_) => "proposal",
        AgentResponse::Code(_) => "code",
        AgentResponse::Extraction(_) => "extraction",
        AgentResponse::Answer(_) => "answer",
    };
    LoopFailure::new(ErrorKind::InvariantViolation, format!("unexpected `{label}` response"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use skyrchitect_core::domain::session::SessionId;
    use skyrchitect_core::errors::ErrorKind;

    use super::AgentRuntime;
    use crate::llm::ScriptedModel;

    #[test]
    fn list_tools_exposes_the_standard_registry() {
        let runtime = AgentRuntime::new(Arc::new(ScriptedModel::default()));
        let names = runtime.list_tools().into_iter().map(|schema| schema.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "get_aws_service_info",
                "calculate_architecture_cost",
                "suggest_cost_optimization",
                "get_service_alternatives",
                "validate_architecture",
            ]
        );
    }

    #[tokio::test]
    async fn unsupported_image_type_fails_before_the_model_is_called() {
        let model = Arc::new(ScriptedModel::default());
        let runtime = AgentRuntime::new(model.clone());

        let failure = runtime
            .run_image_extraction(vec![1, 2, 3], "image/tiff")
            .await
            .expect_err("tiff is unsupported");

        assert_eq!(failure.kind, ErrorKind::UnsupportedMode);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_the_model_is_called() {
        let model = Arc::new(ScriptedModel::default());
        let runtime = AgentRuntime::new(model.clone());

        let failure = runtime
            .run_question(SessionId::new("s-blank"), "   ", None)
            .await
            .expect_err("blank question");

        assert_eq!(failure.kind, ErrorKind::InvariantViolation);
        assert_eq!(model.call_count(), 0);
        assert!(runtime.memory().is_empty().await);
    }
}
