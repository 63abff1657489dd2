pub mod engine;
pub mod states;

pub use engine::{FlowTransitionError, LoopStateMachine};
pub use states::{LoopAction, LoopContext, LoopEvent, LoopState, TransitionOutcome};
