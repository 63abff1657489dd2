use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ModelError;
use crate::tools::{ToolCallRequest, ToolCallResult, ToolName, ToolSchema};

/// One entry of the context handed to the model, oldest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextEntry {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    ToolCalls { calls: Vec<ToolCallRequest> },
    ToolResult { result: ToolCallResult },
    Image { mime_type: String, bytes: Vec<u8> },
}

impl ContextEntry {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into() }
    }
}

/// A tool call as the model asked for it, before the loop assigns an id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestedToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl RequestedToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self { name: name.into(), arguments }
    }
}

/// Final payload as produced by the model; shape checks happen in the loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalPayload {
    Structured(Value),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTurn {
    Final(TerminalPayload),
    ToolCalls(Vec<RequestedToolCall>),
}

impl ModelTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Final(TerminalPayload::Text(content.into()))
    }

    pub fn structured(value: Value) -> Self {
        Self::Final(TerminalPayload::Structured(value))
    }

    pub fn call(name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCalls(vec![RequestedToolCall::new(name, arguments)])
    }
}

/// The only collaborator the loop consumes: one completion per PLANNING step.
#[async_trait]
pub trait ModelCapability: Send + Sync {
    async fn complete(
        &self,
        context: &[ContextEntry],
        tools: &[ToolSchema],
        budget_remaining: u32,
    ) -> Result<ModelTurn, ModelError>;
}

/// Snapshot of one `complete` call seen by [`ScriptedModel`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub context: Vec<ContextEntry>,
    pub tools: Vec<ToolName>,
    pub budget_remaining: u32,
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Result<ModelTurn, ModelError>>,
    calls: Vec<RecordedCall>,
}

/// Deterministic model capability replaying canned turns in order.
///
/// Once the queue is drained it answers with the repeating turn if one is set,
/// otherwise with `ModelError::Rejected`.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<Script>,
    repeat: Option<ModelTurn>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new<I>(turns: I) -> Self
    where
        I: IntoIterator<Item = ModelTurn>,
    {
        Self::with_results(turns.into_iter().map(Ok))
    }

    pub fn with_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<ModelTurn, ModelError>>,
    {
        Self {
            script: Mutex::new(Script { queue: results.into_iter().collect(), calls: Vec::new() }),
            repeat: None,
            delay: None,
        }
    }

    /// Answers every call with `turn` once the queue is empty.
    pub fn repeating(mut self, turn: ModelTurn) -> Self {
        self.repeat = Some(turn);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        match self.script.lock() {
            Ok(script) => script.calls.clone(),
            Err(poisoned) => poisoned.into_inner().calls.clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    fn next(&self, call: RecordedCall) -> Result<ModelTurn, ModelError> {
        let mut script = match self.script.lock() {
            Ok(script) => script,
            Err(poisoned) => poisoned.into_inner(),
        };
        script.calls.push(call);
        match script.queue.pop_front() {
            Some(result) => result,
            None => self
                .repeat
                .clone()
                .ok_or_else(|| ModelError::Rejected("scripted model has no turns left".to_owned())),
        }
    }
}

#[async_trait]
impl ModelCapability for ScriptedModel {
    async fn complete(
        &self,
        context: &[ContextEntry],
        tools: &[ToolSchema],
        budget_remaining: u32,
    ) -> Result<ModelTurn, ModelError> {
        let call = RecordedCall {
            context: context.to_vec(),
            tools: tools.iter().map(|schema| schema.name).collect(),
            budget_remaining,
        };
        let result = self.next(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}
