use std::time::Duration;

use serde::{Deserialize, Serialize};

use skyrchitect_core::config::AgentConfig;
use skyrchitect_core::domain::request::RequestKind;

use crate::errors::LoopFailure;
use crate::payload::PayloadShape;
use crate::tools::ToolName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Stateful,
    Stateless,
    Vision,
}

/// Everything that differs between request kinds; the loop itself is shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopConfig {
    pub kind: RequestKind,
    pub mode: ExecutionMode,
    pub consult_memory: bool,
    pub tools: Vec<ToolName>,
    pub payload_shape: PayloadShape,
    pub max_iterations: u32,
    pub wall_clock: Duration,
    pub history_turns: usize,
}

impl LoopConfig {
    pub fn is_single_shot(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionModeRouter {
    enabled: Vec<RequestKind>,
    max_iterations: u32,
    wall_clock: Duration,
    history_turns: usize,
}

impl ExecutionModeRouter {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            enabled: config.enabled_modes.clone(),
            max_iterations: config.max_iterations,
            wall_clock: Duration::from_secs(config.wall_clock_secs),
            history_turns: config.history_turns,
        }
    }

    pub fn route(&self, kind: RequestKind) -> Result<LoopConfig, LoopFailure> {
        if !self.enabled.contains(&kind) {
            return Err(LoopFailure::unsupported_mode(format!(
                "request kind `{kind}` is not enabled"
            )));
        }

        let (mode, tools, payload_shape) = match kind {
            RequestKind::ArchitectureGeneration | RequestKind::ArchitectureOptimization => {
                (ExecutionMode::Stateful, ToolName::ALL.to_vec(), PayloadShape::ArchitectureProposal)
            }
            RequestKind::CodeGeneration => {
                (ExecutionMode::Stateless, Vec::new(), PayloadShape::CodeArtifact)
            }
            RequestKind::ImageExtraction => {
                (ExecutionMode::Vision, Vec::new(), PayloadShape::ExtractionRecord)
            }
            RequestKind::Question => {
                (ExecutionMode::Stateful, ToolName::ALL.to_vec(), PayloadShape::Answer)
            }
        };

        Ok(LoopConfig {
            kind,
            mode,
            consult_memory: mode == ExecutionMode::Stateful,
            tools,
            payload_shape,
            max_iterations: self.max_iterations,
            wall_clock: self.wall_clock,
            history_turns: self.history_turns,
        })
    }

    /// Routes a caller-supplied kind name; unknown names are unsupported modes.
    pub fn route_named(&self, kind: &str) -> Result<LoopConfig, LoopFailure> {
        let kind = kind.parse::<RequestKind>().map_err(LoopFailure::unsupported_mode)?;
        self.route(kind)
    }
}

impl Default for ExecutionModeRouter {
    fn default() -> Self {
        Self::from_config(&skyrchitect_core::config::AppConfig::default().agent)
    }
}
