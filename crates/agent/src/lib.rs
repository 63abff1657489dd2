//! Agent runtime: the bounded orchestration loop around a model capability.
//!
//! A request is routed to a [`router::LoopConfig`], then driven through
//! `STARTED -> PLANNING -> (TOOL_DISPATCH -> PLANNING)* -> TERMINAL | FAILED`
//! by [`orchestrator::OrchestrationLoop`]. The model only plans and words the
//! answer. Prices, validation scores and service lookups always come from the
//! deterministic tools in `skyrchitect-core`.
//!
//! # Key Types
//!
//! - `AgentRuntime` - caller-facing facade (see `runtime`)
//! - `ModelCapability` - the one external collaborator (see `llm`)
//! - `ToolRegistry` - closed set of catalog-backed tools (see `tools`)
//! - `SessionMemoryStore` - bounded per-session history (see `memory`)

pub mod errors;
pub mod guardrails;
pub mod llm;
pub mod memory;
pub mod orchestrator;
pub mod payload;
pub mod prompts;
pub mod router;
pub mod runtime;
pub mod tools;

pub use errors::{LoopFailure, ModelError, ToolError};
pub use llm::{ContextEntry, ModelCapability, ModelTurn, ScriptedModel, TerminalPayload};
pub use memory::SessionMemoryStore;
pub use orchestrator::{OrchestrationLoop, RetryPolicy, RunSummary};
pub use router::{ExecutionMode, ExecutionModeRouter, LoopConfig};
pub use runtime::{
    AgentRequest, AgentResponse, AgentRuntime, ArchitectureAnswer, ArchitectureProposal, GeneratedCode,
};
pub use tools::{ToolCallRequest, ToolCallResult, ToolName, ToolRegistry, ToolSchema};
