use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{
    CalculatorEvent, CalculatorState, FlowAction, FlowContext, TransitionOutcome,
};

pub trait FlowDefinition {
    fn initial_state(&self) -> CalculatorState;
    fn transition(
        &self,
        current: &CalculatorState,
        event: &CalculatorEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Slot-filling flow for material-quantity calculations:
/// `None -> AwaitingDimensions -> Complete`, returning to `AwaitingDimensions`
/// whenever a required dimension is missing and looping on `Complete` for
/// recalculation.
#[derive(Clone, Debug, Default)]
pub struct CalculatorFlow;

impl FlowDefinition for CalculatorFlow {
    fn initial_state(&self) -> CalculatorState {
        CalculatorState::None
    }

    fn transition(
        &self,
        current: &CalculatorState,
        event: &CalculatorEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_calculator(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> CalculatorState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &CalculatorState,
        event: &CalculatorEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &CalculatorState,
        event: &CalculatorEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.user_id.clone(),
                        audit.correlation_id.clone(),
                        "calculator.transition_applied",
                        AuditCategory::Calculator,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.user_id.clone(),
                        audit.correlation_id.clone(),
                        "calculator.transition_rejected",
                        AuditCategory::Calculator,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<CalculatorFlow> {
    fn default() -> Self {
        Self::new(CalculatorFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required dimensions before transition from {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: CalculatorState, missing_fields: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: CalculatorState, event: CalculatorEvent },
}

fn transition_calculator(
    current: &CalculatorState,
    event: &CalculatorEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use CalculatorEvent::{
        DimensionEdited, DimensionsComplete, DimensionsIncomplete, DimensionsRequested,
        NothingResolved,
    };
    use CalculatorState::{AwaitingDimensions, Complete, None};
    use FlowAction::{
        ComputeQuantities, MarkRecalculation, PromptForHelp, PromptForMissingDimensions,
    };

    let invalid =
        || FlowTransitionError::InvalidTransition { state: *current, event: event.clone() };
    let has_missing = !context.missing_required_fields.is_empty();

    let (to, actions) = match (current, event) {
        (None, NothingResolved) => (None, vec![PromptForHelp]),
        (_, DimensionsRequested) | (_, DimensionsIncomplete) => {
            if !has_missing {
                return Err(invalid());
            }
            (AwaitingDimensions, vec![PromptForMissingDimensions])
        }
        (_, DimensionsComplete) => {
            if has_missing {
                return Err(FlowTransitionError::MissingRequiredFields {
                    state: *current,
                    missing_fields: context.missing_required_fields.clone(),
                });
            }
            (Complete, vec![ComputeQuantities])
        }
        (AwaitingDimensions, DimensionEdited) | (Complete, DimensionEdited) => {
            if has_missing {
                (AwaitingDimensions, vec![PromptForMissingDimensions])
            } else {
                (Complete, vec![ComputeQuantities, MarkRecalculation])
            }
        }
        _ => return Err(invalid()),
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}
