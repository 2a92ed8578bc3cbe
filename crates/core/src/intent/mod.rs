//! Intent routing for inbound customer messages.
//!
//! [`IntentRouter::classify`] is context free. [`IntentRouter::classify_in_context`]
//! also looks at the conversation's current product so that follow-ups such as
//! "yes, tell me more" or "how heavy is it" resolve against that product
//! instead of starting a new search.

pub mod rules;

use crate::catalog::matcher::{correct_typos, significant_words};
use crate::domain::conversation::ConversationMemory;
use crate::domain::intent::{Intent, IntentClassification};

use rules::{detect_attribute, is_affirmation, PRODUCT_NOUNS, PRONOUNS, RULES};

pub const KEYWORD_FALLBACK_CONFIDENCE: f64 = 0.6;
pub const CONTEXTUAL_CONFIDENCE: f64 = 0.85;
pub const FOLLOW_UP_CONFIDENCE: f64 = 0.9;

/// Intents a contextual reading may replace. Anything else (calculator,
/// comparison, greetings) keeps its pattern classification.
const CONTEXT_OVERRIDABLE: &[Intent] = &[
    Intent::Unknown,
    Intent::ProductSearch,
    Intent::AttributeQuestion,
    Intent::StockCheck,
    Intent::PriceInquiry,
];

#[derive(Clone, Copy, Debug, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> IntentClassification {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return IntentClassification::unknown();
        }

        for rule in RULES.iter() {
            if let Some(extracted) = rule.captures(&normalized) {
                let classification =
                    IntentClassification::new(rule.intent, rule.confidence).with_extracted(extracted);
                return match rule.intent {
                    Intent::AttributeQuestion => {
                        classification.with_attribute(detect_attribute(&normalized))
                    }
                    _ => classification,
                };
            }
        }

        if PRODUCT_NOUNS.is_match(&correct_typos(&normalized)) {
            return IntentClassification::new(Intent::ProductSearch, KEYWORD_FALLBACK_CONFIDENCE)
                .with_extracted(vec![normalized]);
        }

        IntentClassification::unknown()
    }

    pub fn classify_in_context(
        &self,
        text: &str,
        memory: &ConversationMemory,
    ) -> IntentClassification {
        let Some(current) = memory.current_product.as_ref() else {
            return self.classify(text);
        };

        let normalized = normalize(text);
        let current_name = correct_typos(&current.name);

        if is_affirmation(&normalized) && !names_other_product(&normalized, None, &current_name) {
            return IntentClassification::new(Intent::FollowUp, FOLLOW_UP_CONFIDENCE)
                .with_extracted(vec![current.name.clone()]);
        }

        let base = self.classify(text);
        if !CONTEXT_OVERRIDABLE.contains(&base.intent) {
            return base;
        }

        let attribute = detect_attribute(&normalized);
        let refers_back = PRONOUNS.is_match(&normalized) || attribute.is_some();
        if refers_back && !names_other_product(&normalized, base.primary_entity(), &current_name) {
            return IntentClassification::new(Intent::AttributeQuestion, CONTEXTUAL_CONFIDENCE)
                .with_extracted(vec![current.name.clone()])
                .with_attribute(attribute);
        }

        base
    }
}

/// Lowercases, collapses whitespace and drops trailing punctuation.
pub fn normalize(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    collapsed.trim_end_matches(['?', '!', '.']).trim().to_string()
}

/// True when the message explicitly names something other than the current
/// product: a catalog noun the current product's name lacks, or a captured
/// entity with words the name does not contain.
fn names_other_product(text: &str, entity: Option<&str>, current_name: &str) -> bool {
    let corrected = correct_typos(text);
    let foreign_noun = PRODUCT_NOUNS
        .find_iter(&corrected)
        .any(|noun| !current_name.contains(noun.as_str()));
    if foreign_noun {
        return true;
    }

    match entity {
        Some(entity) if !PRONOUNS.is_match(entity) => significant_words(&correct_typos(entity))
            .iter()
            .any(|word| !current_name.contains(word.as_str())),
        _ => false,
    }
}
