use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::errors::ErrorKind;
use crate::flows::states::{LoopAction, LoopContext, LoopEvent, LoopState, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("iteration budget of {max_rounds} tool rounds exhausted")]
    IterationBudgetExceeded { max_rounds: u32 },
    #[error("invalid transition from {state} using event {event:?}")]
    InvalidTransition { state: LoopState, event: LoopEvent },
}

impl FlowTransitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IterationBudgetExceeded { .. } => ErrorKind::BudgetExhausted,
            Self::InvalidTransition { .. } => ErrorKind::InvariantViolation,
        }
    }
}

/// Transition table of the orchestration loop.
///
/// `Started -> Planning -> (ToolDispatch -> Planning)* -> Terminal`, with
/// `Abort` leading any non-final state to `Failed`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopStateMachine;

impl LoopStateMachine {
    pub fn initial_state(&self) -> LoopState {
        LoopState::Started
    }

    pub fn apply(
        &self,
        current: LoopState,
        event: LoopEvent,
        context: &LoopContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: LoopState,
        event: LoopEvent,
        context: &LoopContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                let (event_type, outcome_kind) = if outcome.to == LoopState::Failed {
                    ("loop.failed", AuditOutcome::Failed)
                } else {
                    ("loop.transition_applied", AuditOutcome::Success)
                };
                let mut audit_event = audit
                    .event(event_type, AuditCategory::Loop, outcome_kind)
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("event", outcome.event.as_str())
                    .with_metadata("completed_rounds", context.completed_rounds.to_string());
                if let LoopEvent::Abort { kind } = outcome.event {
                    audit_event = audit_event.with_metadata("error_kind", kind.as_str());
                }
                sink.emit(audit_event);
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event("loop.transition_rejected", AuditCategory::Loop, AuditOutcome::Rejected)
                        .with_metadata("from", current.as_str())
                        .with_metadata("event", event.as_str())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

fn transition(
    current: LoopState,
    event: LoopEvent,
    context: &LoopContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use LoopAction::{DispatchTools, InvokeModel, PersistSessionTurns, RecordFailure};
    use LoopEvent::{Abort, ContextAssembled, FinalAccepted, ResultsFolded, ToolCallsRequested};
    use LoopState::{Failed, Planning, Started, Terminal, ToolDispatch};

    let (to, actions) = match (current, event) {
        (Started, ContextAssembled) => (Planning, vec![InvokeModel]),
        (Planning, ToolCallsRequested) => {
            if context.completed_rounds >= context.max_rounds {
                return Err(FlowTransitionError::IterationBudgetExceeded {
                    max_rounds: context.max_rounds,
                });
            }
            (ToolDispatch, vec![DispatchTools])
        }
        (Planning, FinalAccepted) => {
            let actions = if context.stateful { vec![PersistSessionTurns] } else { Vec::new() };
            (Terminal, actions)
        }
        (ToolDispatch, ResultsFolded) => (Planning, vec![InvokeModel]),
        (Started | Planning | ToolDispatch, Abort { .. }) => (Failed, vec![RecordFailure]),
        _ => return Err(FlowTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
