use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorState {
    #[default]
    None,
    AwaitingDimensions,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorEvent {
    NothingResolved,
    DimensionsRequested,
    DimensionsIncomplete,
    DimensionsComplete,
    DimensionEdited,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub missing_required_fields: Vec<String>,
}

impl FlowContext {
    pub fn missing(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { missing_required_fields: fields.into_iter().map(Into::into).collect() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    PromptForHelp,
    PromptForMissingDimensions,
    ComputeQuantities,
    MarkRecalculation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: CalculatorState,
    pub to: CalculatorState,
    pub event: CalculatorEvent,
    pub actions: Vec<FlowAction>,
}

impl TransitionOutcome {
    pub fn is_recalculation(&self) -> bool {
        self.actions.contains(&FlowAction::MarkRecalculation)
    }
}
