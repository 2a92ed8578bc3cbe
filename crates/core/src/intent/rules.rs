//! The ordered intent rule table.
//!
//! Rules are evaluated top to bottom and the first pattern that matches wins.
//! Order is load-bearing: anchored conversational rules come first, then the
//! calculator and store-info rules, then specific product intents, with the
//! broad search verbs last.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::intent::{AttributeTopic, Intent};

pub struct IntentRule {
    pub intent: Intent,
    pub confidence: f64,
    patterns: Vec<Regex>,
}

impl IntentRule {
    fn new(intent: Intent, confidence: f64, patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .map(|source| Regex::new(source).expect("intent rule pattern must compile"))
            .collect();
        Self { intent, confidence, patterns }
    }

    /// Captured entity phrases of the first matching pattern, or `None` when no
    /// pattern matches.
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        self.patterns.iter().find_map(|pattern| {
            pattern.captures(text).map(|captures| {
                captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|group| clean_entity(group.as_str()))
                    .filter(|entity| !entity.is_empty())
                    .collect()
            })
        })
    }
}

const ANCHORED: f64 = 0.95;
const PATTERN: f64 = 0.85;

pub static RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    vec![
        IntentRule::new(
            Intent::Greeting,
            ANCHORED,
            &[r"^(?:hi|hello|hey|hiya|good (?:morning|afternoon|evening))(?: there)?$"],
        ),
        IntentRule::new(
            Intent::Help,
            ANCHORED,
            &[r"^(?:help|what can you do|how do(?:es)? (?:this|it) work)$"],
        ),
        IntentRule::new(
            Intent::Categories,
            ANCHORED,
            &[
                r"^(?:categories|all categories|show categories|browse categories)$",
                r"\b(?:show|list|get|browse)\s+(?:me\s+)?(?:all\s+|your\s+)?categories\b",
            ],
        ),
        IntentRule::new(
            Intent::ClearContext,
            ANCHORED,
            &[r"^(?:reset|start over|start again|clear|clear context|new conversation|forget (?:it|that|everything))$"],
        ),
        IntentRule::new(
            Intent::StoreInfo,
            PATTERN,
            &[
                r"\b(?:opening|store|business|working|shop) hours\b",
                r"\bwhat time do you (?:open|close)\b",
                r"\bare you open\b",
                r"\bwhere (?:are you|is (?:the|your) (?:store|shop))\b",
                r"\b(?:your )?(?:address|location)\b",
                r"\b(?:deliver|delivery|shipping)\b",
                r"\b(?:contact|phone number|call you|email)\b",
                r"\b(?:payment|pay with|pay by|credit card)\b",
            ],
        ),
        IntentRule::new(
            Intent::CalculatorInquiry,
            PATTERN,
            &[
                r"\b(?:calculate|calculator|calc|recalculate|estimate)\b",
                r"\bhow (?:much|many)\b.*\b(?:do i need|will i need|would i need|needed)\b",
                r"\d+(?:\.\d+)?\s*(?:m2|m²|m3|m³|sq\.?\s*m|square met(?:er|re)s?|cubic met(?:er|re)s?)",
                r"\d+(?:\.\d+)?\s*(?:cm|mm|m|ft|feet|met(?:er|re)s?)\b.*(?:\b(?:long|wide|high|tall|deep|thick)\b|\b(?:by|x)\s*\d)",
            ],
        ),
        IntentRule::new(
            Intent::Comparison,
            PATTERN,
            &[
                r"\bcompare\s+(.+?)\s+(?:with|to|and|vs\.?|versus)\s+(.+)",
                r"\bdifferences?\s+between\s+(.+?)\s+and\s+(.+)",
                r"\bwhich is better[,:]?\s+(.+?)\s+or\s+(.+)",
                r"^(.+?)\s+(?:vs\.?|versus)\s+(.+)$",
                r"^compare(?: them| these| those)?$",
            ],
        ),
        IntentRule::new(
            Intent::StockCheck,
            PATTERN,
            &[
                r"\bdo you have\s+(.+?)\s+in stock\b",
                r"\b(?:is|are)\s+(.+?)\s+(?:in stock|available)\b",
                r"\b(?:stock|availability)\s+(?:of|for)\s+(.+)",
                r"^(?:in stock|available)$",
            ],
        ),
        IntentRule::new(
            Intent::QuantityPrice,
            PATTERN,
            &[
                r"\b(?:how much for|total for|price of|cost of)\s+(\d+)\s+(.+)",
                r"\b(\d+)\s+(?:packs?|pieces?|bags?|units?|boxes?)\s+(?:of\s+)?(.+)",
                r"\bi(?:'ll| will)?\s+take\s+(\d+)\s+(.+)",
            ],
        ),
        IntentRule::new(
            Intent::HowMuch,
            ANCHORED,
            &[r"^how much$", r"^how much (?:is|are|does|do) (?:it|this|that|they|these|those)(?: cost)?$", r"^(?:price|cost)$"],
        ),
        IntentRule::new(
            Intent::PriceInquiry,
            PATTERN,
            &[
                r"\b(?:what(?:'s| is) the price|cost of|price for|price of)\s+(?:the\s+)?(.+)",
                r"\bhow much (?:is|are|does|do)\s+(.+?)(?:\s+cost)?$",
            ],
        ),
        IntentRule::new(
            Intent::Alternatives,
            ANCHORED,
            &[
                r"^(?:any\s+)?alternatives?$",
                r"^(?:any\s+)?other options?$",
                r"^what else$",
                r"^similar products?$",
                r"\balternatives?\s+(?:to|for)\s+(.+)",
            ],
        ),
        IntentRule::new(
            Intent::Recommendation,
            PATTERN,
            &[
                r"\b(?:recommend|suggest)\s+(?:me\s+)?(.+)",
                r"\b(?:something like|similar to)\s+(.+)",
                r"\b(?:what else|anything else|other options)\b",
                r"^(?:recommend|suggest)(?: something)?$",
            ],
        ),
        IntentRule::new(
            Intent::AttributeQuestion,
            PATTERN,
            &[
                r"\b(?:what|which)\s+(?:is\s+)?(?:the\s+)?(?:material|size|colou?r|weight|dimensions?|length|height|width|coverage)\b",
                r"\bwhat'?s the\s+(?:material|size|colou?r|weight|dimensions?|length|height|width|coverage)\b",
                r"\bhow\s+(?:long|big|tall|wide|heavy)\s+(?:is|are)\b",
                r"\b(?:made of|consists of)\b",
                r"^(?:length|size|dimensions?|weight|material|colou?r)$",
            ],
        ),
        IntentRule::new(
            Intent::Cheapest,
            PATTERN,
            &[r"\bcheapest\b", r"\blowest price\b", r"\bleast expensive\b", r"\bbudget\b", r"\baffordable\b"],
        ),
        IntentRule::new(
            Intent::MostExpensive,
            PATTERN,
            &[r"\bmost expensive\b", r"\bhighest price\b", r"\bpremium\b", r"\btop quality\b", r"\bexpensive\b"],
        ),
        IntentRule::new(
            Intent::CategoryList,
            PATTERN,
            &[
                r"\b(?:how many|what|which)\s+(?:types?|kinds?)\s+(?:of\s+)?(.+?)(?:\s+(?:are there|do you have|do you sell|available))?$",
                r"\blist\s+(?:all\s+)?(?:the\s+)?(.+)",
                r"\bshow\s+(?:me\s+)?all\s+(?:the\s+)?(.+)",
                r"^all\s+(.+)",
            ],
        ),
        IntentRule::new(
            Intent::ProductSearch,
            PATTERN,
            &[
                r"\b(?:do you have|got any|do you sell|do you stock)\s+(.+)",
                r"\b(?:show|find|get|need|want|looking for|search for|search)\s+(?:me\s+)?(.+)",
            ],
        ),
    ]
});

/// Nouns that mark a message as being about catalog products.
pub static PRODUCT_NOUNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:nail|screw|bolt|fastener|cement|concrete|mortar|grout|brick|block|wood|lumber|timber|plywood|board|stud|paint|primer|tile|floor|laminate|ceramic|pipe|pvc|fitting|hammer|drill|saw|tool|sand|gravel|aggregate|drywall|plaster|insulation|roof|steel|rebar|glass)",
    )
    .expect("product noun pattern must compile")
});

pub static PRONOUNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:it|its|this|that|them|they|these|those|the same|same one|the product|the item|that one|this one)\b",
    )
    .expect("pronoun pattern must compile")
});

/// Attribute keywords in lookup order. Earlier topics win when a message names
/// several.
pub static ATTRIBUTE_TOPICS: Lazy<Vec<(AttributeTopic, Regex)>> = Lazy::new(|| {
    [
        (AttributeTopic::Coverage, r"\b(?:coverage|covers?|how much area)\b"),
        (AttributeTopic::Stock, r"\b(?:in stock|available|availability|how many left|stock)\b"),
        (AttributeTopic::Material, r"\b(?:what material|made of|made from|what is it made|composition|material)\b"),
        (AttributeTopic::Quantity, r"\b(?:how many|quantity|per pack|in (?:a|the) (?:package|box|pack)|per unit)\b"),
        (AttributeTopic::Size, r"\b(?:size|dimensions?|how big|how long|how wide|how tall|length|width|height|thick(?:ness)?)\b"),
        (AttributeTopic::Weight, r"\b(?:weight|weigh|weighs|how heavy)\b"),
        (AttributeTopic::Color, r"\b(?:colou?r|what colou?r|finish)\b"),
        (AttributeTopic::Supplier, r"\b(?:supplier|manufacturer|who makes|brand|made by)\b"),
        (AttributeTopic::Price, r"\b(?:price|cost|costs|how much)\b"),
    ]
    .into_iter()
    .map(|(topic, source)| (topic, Regex::new(source).expect("attribute pattern must compile")))
    .collect()
});

const AFFIRMATIONS: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "yup",
    "sure",
    "ok",
    "okay",
    "please",
    "go ahead",
    "tell me more",
    "more",
    "more info",
    "more information",
    "more details",
    "details",
    "yes please",
    "sounds good",
];

const AFFIRMATION_PHRASES: &[&str] =
    &["tell me more", "more info", "more details", "go ahead", "yes please"];

pub fn is_affirmation(text: &str) -> bool {
    let compact = text.replace(',', " ").split_whitespace().collect::<Vec<_>>().join(" ");
    AFFIRMATIONS.contains(&compact.as_str())
        || AFFIRMATION_PHRASES.iter().any(|phrase| compact.contains(phrase))
}

pub fn detect_attribute(text: &str) -> Option<AttributeTopic> {
    ATTRIBUTE_TOPICS.iter().find(|(_, pattern)| pattern.is_match(text)).map(|(topic, _)| *topic)
}

const ENTITY_FILLERS: &[&str] = &["of ", "for ", "me ", "the ", "some ", "any ", "a ", "an "];

fn clean_entity(raw: &str) -> String {
    let mut entity = raw.trim().trim_end_matches(['?', '!', '.', ',']).trim();
    while let Some(rest) = ENTITY_FILLERS.iter().find_map(|filler| entity.strip_prefix(filler)) {
        entity = rest.trim_start();
    }
    entity.strip_suffix(" please").unwrap_or(entity).trim().to_string()
}
