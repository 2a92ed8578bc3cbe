pub mod engine;
pub mod states;

pub use engine::{CalculatorFlow, FlowDefinition, FlowEngine, FlowTransitionError};
pub use states::{CalculatorEvent, CalculatorState, FlowAction, FlowContext, TransitionOutcome};
