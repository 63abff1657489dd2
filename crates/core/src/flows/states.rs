use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Started,
    Planning,
    ToolDispatch,
    Terminal,
    Failed,
}

impl LoopState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Terminal | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Planning => "planning",
            Self::ToolDispatch => "tool_dispatch",
            Self::Terminal => "terminal",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopEvent {
    ContextAssembled,
    ToolCallsRequested,
    FinalAccepted,
    ResultsFolded,
    Abort { kind: ErrorKind },
}

impl LoopEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextAssembled => "context_assembled",
            Self::ToolCallsRequested => "tool_calls_requested",
            Self::FinalAccepted => "final_accepted",
            Self::ResultsFolded => "results_folded",
            Self::Abort { .. } => "abort",
        }
    }
}

/// Run facts the transition table consults as guards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopContext {
    pub stateful: bool,
    pub completed_rounds: u32,
    pub max_rounds: u32,
}

impl LoopContext {
    pub fn new(stateful: bool, max_rounds: u32) -> Self {
        Self { stateful, completed_rounds: 0, max_rounds }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopAction {
    InvokeModel,
    DispatchTools,
    PersistSessionTurns,
    RecordFailure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: LoopState,
    pub to: LoopState,
    pub event: LoopEvent,
    pub actions: Vec<LoopAction>,
}
