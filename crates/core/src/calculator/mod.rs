//! Multi-turn slot filling for material-quantity calculations.
//!
//! [`CalculatorDialogue::advance`] takes the stored [`CalculatorSession`] and
//! one user message and returns the replacement session plus the reply. The
//! stored session is never mutated in place, so a failed computation leaves
//! the caller's copy untouched.

pub mod compute;
pub mod extract;

use crate::audit::{AuditContext, AuditSink};
use crate::config::CalculatorConfig;
use crate::domain::calculator::{
    CalculationReport, CalculatorSession, DimensionKey, Dimensions, MaterialType,
};
use crate::domain::product::ProductRecord;
use crate::flows::{
    CalculatorEvent, CalculatorFlow, CalculatorState, FlowContext, FlowEngine,
    FlowTransitionError, TransitionOutcome,
};
use crate::intent::normalize;

pub use compute::{compute, format_result, CalculationError, CalculationTarget};
pub use extract::{detect_material, extract_dimensions};

pub const HELP_PROMPT: &str = "I can help you calculate materials, but I need more information. \
Please provide dimensions like length, width, and for volume calculations, depth. \
For example: 'I need to paint a wall 5m long and 3m high' or \
'Calculate concrete for a slab 4m x 4m x 0.15m deep'.";

pub const MATERIAL_PROMPT: &str = "What are you calculating: an area (walls, floors, tiles), \
a volume (concrete, sand, gravel) or a length (pipe, cable, trim)?";

pub const APOLOGY: &str = "I'm sorry, I couldn't calculate the materials needed. \
Please check your dimensions and try again.";

const SUMMARY_LEAD: &str = "I've received your calculation from the calculator. ";

/// Result of one calculator turn.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculatorTurn {
    pub session: CalculatorSession,
    pub reply: String,
    pub transition: Option<TransitionOutcome>,
    pub report: Option<CalculationReport>,
    /// Set when the turn ended in the apology path.
    pub fault: Option<String>,
}

impl CalculatorTurn {
    pub fn is_recalculation(&self) -> bool {
        self.transition.as_ref().is_some_and(TransitionOutcome::is_recalculation)
    }

    fn unchanged(session: &CalculatorSession, reply: String) -> Self {
        Self { session: session.clone(), reply, transition: None, report: None, fault: None }
    }
}

pub struct CalculatorDialogue<'a> {
    config: &'a CalculatorConfig,
    engine: FlowEngine<CalculatorFlow>,
    audit: Option<(&'a dyn AuditSink, &'a AuditContext)>,
}

impl<'a> CalculatorDialogue<'a> {
    pub fn new(config: &'a CalculatorConfig) -> Self {
        Self { config, engine: FlowEngine::default(), audit: None }
    }

    /// Records every state transition on `sink`.
    pub fn with_audit(mut self, sink: &'a dyn AuditSink, context: &'a AuditContext) -> Self {
        self.audit = Some((sink, context));
        self
    }

    /// True when `message` carries dimensions, a bare number, an edit or a
    /// recalculation request.
    pub fn is_relevant(message: &str) -> bool {
        extract::has_calculator_content(&normalize(message))
    }

    /// Follow-up edit or explicit recalculation of a finished calculation.
    pub fn is_follow_up(message: &str) -> bool {
        let text = normalize(message);
        extract::dimension_edit(&text).is_some() || extract::is_recalculate(&text)
    }

    /// Advances the session by one message. `current_product` is the
    /// conversation's current product, used for bare "calculate" requests and
    /// for coverage and pricing when it is the session's product.
    pub fn advance(
        &self,
        session: &CalculatorSession,
        message: &str,
        current_product: Option<&ProductRecord>,
    ) -> CalculatorTurn {
        let text = normalize(message);

        if let Some(summary) = extract::calculator_summary(&text) {
            let dimensions = session.dimensions.merged_with(&summary.dimensions);
            let mut turn = self.settle(session, Some(summary.material), dimensions, current_product);
            if turn.report.is_some() {
                turn.reply = format!("{SUMMARY_LEAD}{}", turn.reply);
            }
            return turn;
        }

        let extracted = extract::extract_dimensions(&text);
        let mut dimensions = session.dimensions.merged_with(&extracted);
        let mut material = extract::detect_material(&text).or(session.material);

        if extract::is_bare_calculate(&text) {
            if let Some(product) = current_product {
                return self.request_for_product(session, product);
            }
            if session.state == CalculatorState::Complete {
                if let Some(last) = &session.last_result {
                    return CalculatorTurn::unchanged(session, format_result(last, false));
                }
            }
        }

        let edit = extract::dimension_edit(&text);
        if let Some((key, value)) = edit {
            dimensions.set(key, value);
        }
        let wants_recalculation = edit.is_some() || extract::is_recalculate(&text);

        if wants_recalculation && session.state == CalculatorState::Complete {
            if let Some(material) = material {
                return self.recalculate(session, material, dimensions, current_product);
            }
        }

        if extracted.is_empty() && edit.is_none() {
            if let Some(number) = extract::bare_number(&text) {
                let key =
                    if number.percent { DimensionKey::Wastage } else { next_slot(&dimensions, material) };
                dimensions.set(key, number.value);
            }
        }

        if material.is_none() {
            material = infer_material(&dimensions)
                .or_else(|| extract::suggests_linear(&text).then_some(MaterialType::Linear));
        }

        self.settle(session, material, dimensions, current_product)
    }

    fn request_for_product(
        &self,
        session: &CalculatorSession,
        product: &ProductRecord,
    ) -> CalculatorTurn {
        let material = product
            .attribute("material_type")
            .and_then(|value| MaterialType::parse(&value.as_text()))
            .unwrap_or(MaterialType::Area);
        let dimensions = Dimensions::new();
        let missing = dimensions.missing_for(material);

        match self.transition(session.state, CalculatorEvent::DimensionsRequested, &missing_context(&missing)) {
            Ok(outcome) => {
                let example = match material {
                    MaterialType::Area => "I need to build a wall 4m long and 2.5m high",
                    MaterialType::Volume => "a slab 4m x 3m x 0.15m deep",
                    MaterialType::Linear => "20m of pipe in 3m lengths",
                };
                CalculatorTurn {
                    session: CalculatorSession {
                        material: Some(material),
                        dimensions,
                        state: outcome.to,
                        product_id: Some(product.id),
                        last_result: session.last_result.clone(),
                    },
                    reply: format!(
                        "I can help you calculate how much {} you'll need for your project. Please provide the dimensions, for example: '{example}'.",
                        product.name
                    ),
                    transition: Some(outcome),
                    report: None,
                    fault: None,
                }
            }
            Err(error) => self.fault(session, dimensions, Some(material), error.to_string()),
        }
    }

    fn recalculate(
        &self,
        session: &CalculatorSession,
        material: MaterialType,
        dimensions: Dimensions,
        current_product: Option<&ProductRecord>,
    ) -> CalculatorTurn {
        let missing = dimensions.missing_for(material);
        match self.transition(session.state, CalculatorEvent::DimensionEdited, &missing_context(&missing)) {
            Ok(outcome) if outcome.to == CalculatorState::Complete => {
                self.computed(session, material, dimensions, current_product, outcome, true)
            }
            Ok(outcome) => self.prompted(session, material, dimensions, &missing, outcome),
            Err(error) => self.fault(session, dimensions, Some(material), error.to_string()),
        }
    }

    /// Help prompt, material or dimension prompt, or the computation itself.
    fn settle(
        &self,
        session: &CalculatorSession,
        material: Option<MaterialType>,
        dimensions: Dimensions,
        current_product: Option<&ProductRecord>,
    ) -> CalculatorTurn {
        let Some(material) = material else {
            if dimensions.is_empty() && session.state == CalculatorState::None {
                return match self.transition(
                    session.state,
                    CalculatorEvent::NothingResolved,
                    &FlowContext::default(),
                ) {
                    Ok(outcome) => CalculatorTurn {
                        transition: Some(outcome),
                        ..CalculatorTurn::unchanged(session, HELP_PROMPT.to_string())
                    },
                    Err(error) => self.fault(session, dimensions, None, error.to_string()),
                };
            }
            let event = match session.state {
                CalculatorState::None => CalculatorEvent::DimensionsRequested,
                _ => CalculatorEvent::DimensionsIncomplete,
            };
            return match self.transition(session.state, event, &FlowContext::missing(["material_type"])) {
                Ok(outcome) => CalculatorTurn {
                    session: CalculatorSession {
                        material: None,
                        dimensions,
                        state: outcome.to,
                        product_id: session.product_id,
                        last_result: session.last_result.clone(),
                    },
                    reply: MATERIAL_PROMPT.to_string(),
                    transition: Some(outcome),
                    report: None,
                    fault: None,
                },
                Err(error) => self.fault(session, dimensions, None, error.to_string()),
            };
        };

        let missing = dimensions.missing_for(material);
        if !missing.is_empty() {
            let event = match session.state {
                CalculatorState::None => CalculatorEvent::DimensionsRequested,
                _ => CalculatorEvent::DimensionsIncomplete,
            };
            return match self.transition(session.state, event, &missing_context(&missing)) {
                Ok(outcome) => self.prompted(session, material, dimensions, &missing, outcome),
                Err(error) => self.fault(session, dimensions, Some(material), error.to_string()),
            };
        }

        match self.transition(session.state, CalculatorEvent::DimensionsComplete, &FlowContext::default()) {
            Ok(outcome) => self.computed(session, material, dimensions, current_product, outcome, false),
            Err(error) => self.fault(session, dimensions, Some(material), error.to_string()),
        }
    }

    fn prompted(
        &self,
        session: &CalculatorSession,
        material: MaterialType,
        dimensions: Dimensions,
        missing: &[DimensionKey],
        outcome: TransitionOutcome,
    ) -> CalculatorTurn {
        let names = missing.iter().map(DimensionKey::as_str).collect::<Vec<_>>().join(", ");
        CalculatorTurn {
            session: CalculatorSession {
                material: Some(material),
                dimensions,
                state: outcome.to,
                product_id: session.product_id,
                last_result: session.last_result.clone(),
            },
            reply: format!(
                "I need more information to calculate the materials. Please provide the {names} of your project."
            ),
            transition: Some(outcome),
            report: None,
            fault: None,
        }
    }

    fn computed(
        &self,
        session: &CalculatorSession,
        material: MaterialType,
        dimensions: Dimensions,
        current_product: Option<&ProductRecord>,
        outcome: TransitionOutcome,
        recalculation: bool,
    ) -> CalculatorTurn {
        let target = CalculationTarget {
            product_id: session.product_id,
            record: current_product.filter(|product| Some(product.id) == session.product_id),
        };

        match compute(material, &dimensions, target, self.config) {
            Ok(report) => CalculatorTurn {
                reply: format_result(&report, recalculation || outcome.is_recalculation()),
                session: CalculatorSession {
                    material: Some(material),
                    dimensions,
                    state: outcome.to,
                    product_id: session.product_id,
                    last_result: Some(report.clone()),
                },
                transition: Some(outcome),
                report: Some(report),
                fault: None,
            },
            Err(error) => self.fault(session, dimensions, Some(material), error.to_string()),
        }
    }

    /// Apology path: keeps the merged dimensions, leaves the state alone.
    fn fault(
        &self,
        session: &CalculatorSession,
        dimensions: Dimensions,
        material: Option<MaterialType>,
        reason: String,
    ) -> CalculatorTurn {
        CalculatorTurn {
            session: CalculatorSession {
                material: material.or(session.material),
                dimensions,
                ..session.clone()
            },
            reply: APOLOGY.to_string(),
            transition: None,
            report: None,
            fault: Some(reason),
        }
    }

    fn transition(
        &self,
        current: CalculatorState,
        event: CalculatorEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        match self.audit {
            Some((sink, audit)) => self.engine.apply_with_audit(&current, &event, context, sink, audit),
            None => self.engine.apply(&current, &event, context),
        }
    }
}

fn missing_context(missing: &[DimensionKey]) -> FlowContext {
    FlowContext::missing(missing.iter().map(DimensionKey::as_str))
}

/// Which slot a bare number fills: the first missing required dimension when
/// the material is known, otherwise length, width, depth then height.
fn next_slot(dimensions: &Dimensions, material: Option<MaterialType>) -> DimensionKey {
    if let Some(key) = material.and_then(|material| dimensions.missing_for(material).first().copied()) {
        return key;
    }
    if !dimensions.contains(DimensionKey::Length) {
        DimensionKey::Length
    } else if !dimensions.contains(DimensionKey::Width) && !dimensions.contains(DimensionKey::Height) {
        DimensionKey::Width
    } else if material == Some(MaterialType::Volume) && !dimensions.contains(DimensionKey::Depth) {
        DimensionKey::Depth
    } else {
        DimensionKey::Height
    }
}

fn infer_material(dimensions: &Dimensions) -> Option<MaterialType> {
    if dimensions.contains(DimensionKey::Depth) {
        Some(MaterialType::Volume)
    } else if dimensions.contains(DimensionKey::Width) || dimensions.contains(DimensionKey::Height) {
        Some(MaterialType::Area)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{CalculatorDialogue, APOLOGY, HELP_PROMPT, MATERIAL_PROMPT};
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::catalog::fixtures::storefront;
    use crate::config::CalculatorConfig;
    use crate::domain::calculator::{CalculatorSession, DimensionKey, MaterialType};
    use crate::domain::product::ProductId;
    use crate::flows::CalculatorState;

    fn run(
        dialogue: &CalculatorDialogue<'_>,
        messages: &[&str],
    ) -> (CalculatorSession, Vec<super::CalculatorTurn>) {
        let mut session = CalculatorSession::default();
        let mut turns = Vec::new();
        for message in messages {
            let turn = dialogue.advance(&session, message, None);
            session = turn.session.clone();
            turns.push(turn);
        }
        (session, turns)
    }

    #[test]
    fn area_request_then_dimensions_completes() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);

        let (session, turns) = run(&dialogue, &["calculate area", "4m long and 3m wide"]);

        assert_eq!(turns[0].session.state, CalculatorState::AwaitingDimensions);
        assert!(turns[0].reply.contains("length, width"));
        assert_eq!(session.state, CalculatorState::Complete);
        let report = turns[1].report.as_ref().expect("second turn computes");
        assert_eq!(report.measure, 12.0);
        assert_eq!(report.rounded_quantity, 1.0);
        assert!(turns[1].reply.starts_with("Based on your dimensions"));
        assert!(!turns[1].is_recalculation());
    }

    #[test]
    fn width_edit_recalculates_completed_session() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);

        let (session, turns) =
            run(&dialogue, &["calculate area", "4m long and 3m wide", "what if the width is 5"]);

        let last = turns.last().expect("three turns");
        assert!(last.is_recalculation());
        assert_eq!(session.dimensions.get(DimensionKey::Width), Some(5.0));
        assert_eq!(last.report.as_ref().map(|report| report.measure), Some(20.0));
        assert!(last.reply.starts_with("With the updated dimensions"));
        assert_eq!(session.state, CalculatorState::Complete);
    }

    #[test]
    fn supplying_missing_dimensions_shrinks_the_missing_set() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);

        let (_, turns) = run(&dialogue, &["concrete slab", "4", "3", "0.15"]);

        let missing: Vec<usize> =
            turns.iter().map(|turn| turn.session.missing_dimensions().len()).collect();
        assert_eq!(missing, vec![3, 2, 1, 0]);
        let completions = turns
            .iter()
            .filter(|turn| turn.session.state == CalculatorState::Complete)
            .count();
        assert_eq!(completions, 1);
        let report = turns[3].report.as_ref().expect("volume computed");
        assert_eq!(report.material, MaterialType::Volume);
        assert_eq!(report.rounded_quantity, 2.07);
    }

    #[test]
    fn percentage_reply_sets_wastage() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);

        let (session, _) = run(&dialogue, &["paint a wall", "12%", "5m long and 2m high"]);

        assert_eq!(session.dimensions.get(DimensionKey::Wastage), Some(12.0));
        assert_eq!(session.last_result.as_ref().map(|report| report.wastage_pct), Some(12.0));
    }

    #[test]
    fn nothing_resolved_prompts_for_help_and_stays_idle() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);

        let turn = dialogue.advance(&CalculatorSession::default(), "can you calculate", None);

        assert_eq!(turn.reply, HELP_PROMPT);
        assert_eq!(turn.session.state, CalculatorState::None);
    }

    #[test]
    fn bare_length_asks_for_material() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);

        let (session, turns) = run(&dialogue, &["6", "pipe"]);

        assert_eq!(turns[0].reply, MATERIAL_PROMPT);
        assert_eq!(turns[0].session.state, CalculatorState::AwaitingDimensions);
        assert_eq!(session.state, CalculatorState::Complete);
        assert_eq!(session.material, Some(MaterialType::Linear));
    }

    #[test]
    fn bare_calculate_uses_current_product() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);
        let catalog = storefront();
        let tile = catalog.product(ProductId(10));

        let prompt = dialogue.advance(&CalculatorSession::default(), "calculate", tile);
        assert_eq!(prompt.session.product_id, Some(ProductId(10)));
        assert_eq!(prompt.session.material, Some(MaterialType::Area));
        assert!(prompt.reply.contains("Ceramic Floor Tile"));

        let done = dialogue.advance(&prompt.session, "4m by 3m", tile);
        let report = done.report.expect("computed with product");
        assert_eq!(report.coverage, Some(1.5));
        assert!(report.total_cost.is_some());
        assert!(done.reply.contains("Estimated cost"));
    }

    #[test]
    fn bare_calculate_without_product_restates_last_result() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);
        let (session, turns) = run(&dialogue, &["calculate area", "4m long and 3m wide"]);

        let restated = dialogue.advance(&session, "calculate", None);

        assert_eq!(restated.reply, turns[1].reply);
        assert_eq!(restated.session, session);
    }

    #[test]
    fn computation_fault_apologises_and_keeps_state() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);
        let (session, _) = run(&dialogue, &["calculate area", "4m long"]);

        let turn = dialogue.advance(&session, "3m wide with coverage of 0", None);

        assert_eq!(turn.reply, APOLOGY);
        assert!(turn.fault.is_some());
        assert_eq!(turn.session.state, CalculatorState::AwaitingDimensions);
        assert_eq!(turn.session.dimensions.get(DimensionKey::Width), Some(3.0));
        assert!(turn.session.last_result.is_none());
    }

    #[test]
    fn calculator_summary_is_acknowledged() {
        let config = CalculatorConfig::default();
        let dialogue = CalculatorDialogue::new(&config);

        let turn = dialogue.advance(
            &CalculatorSession::default(),
            "I calculated materials for an area of 4m x 3m",
            None,
        );

        assert!(turn.reply.starts_with("I've received your calculation from the calculator."));
        assert_eq!(turn.session.state, CalculatorState::Complete);
    }

    #[test]
    fn transitions_are_audited_when_a_sink_is_attached() {
        let config = CalculatorConfig::default();
        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new("u-audit", "corr-1", "calculator");
        let dialogue = CalculatorDialogue::new(&config).with_audit(&sink, &context);

        let _ = dialogue.advance(&CalculatorSession::default(), "calculate area", None);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "calculator.transition_applied");
        assert_eq!(events[0].correlation_id, "corr-1");
    }
}
