//! Pattern-based reading of dimensions, material hints and follow-up edits
//! from normalized (lowercase) calculator messages.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::domain::calculator::{DimensionKey, Dimensions, MaterialType};

const UNIT: &str = r"(?P<unit>cm|mm|meters?|metres?|m)?";

static DIMENSION_PATTERNS: Lazy<Vec<(DimensionKey, Vec<Regex>)>> = Lazy::new(|| {
    let number = r"(?P<value>\d+(?:\.\d+)?)";
    let table: Vec<(DimensionKey, Vec<String>)> = vec![
        (
            DimensionKey::Length,
            vec![
                format!(r"{number}\s*{UNIT}\s*(?:long|in length)\b"),
                format!(r"\blength\s*(?:of|is|:|=)?\s*{number}\s*{UNIT}"),
                format!(r"{number}\s*{UNIT}\s*(?:by|x)\s*\d"),
                format!(r"{number}\s*(?P<unit>cm|mm|meters?|metres?|m)\s+of\b"),
            ],
        ),
        (
            DimensionKey::Width,
            vec![
                format!(r"{number}\s*{UNIT}\s*(?:wide|in width)\b"),
                format!(r"\bwidth\s*(?:of|is|:|=)?\s*{number}\s*{UNIT}"),
                format!(r"(?:^|[^a-z]|\dm)(?:by|x)\s*{number}\s*{UNIT}"),
            ],
        ),
        (
            DimensionKey::Depth,
            vec![
                format!(r"{number}\s*{UNIT}\s*(?:deep|thick|in depth)\b"),
                format!(r"\b(?:depth|thickness)\s*(?:of|is|:|=)?\s*{number}\s*{UNIT}"),
                format!(
                    r"(?:by|x)\s*\d+(?:\.\d+)?\s*(?:cm|mm|meters?|metres?|m)?\s*(?:by|x)\s*{number}\s*{UNIT}"
                ),
            ],
        ),
        (
            DimensionKey::Height,
            vec![
                format!(r"{number}\s*{UNIT}\s*(?:high|tall|in height)\b"),
                format!(r"\bheight\s*(?:of|is|:|=)?\s*{number}\s*{UNIT}"),
            ],
        ),
        (
            DimensionKey::Coverage,
            vec![
                format!(r"\b(?:coverage|covers?)\s*(?:of|is|:|=)?\s*{number}"),
                format!(r"{number}\s*(?:m2|m²|sq\.?\s*m|square\s*met(?:er|re)s?)\s*(?:per|/|coverage)"),
            ],
        ),
        (
            DimensionKey::Wastage,
            vec![
                format!(r"\b(?:wastage|waste)\s*(?:of|is|:|=|at)?\s*{number}"),
                format!(r"{number}\s*(?:%|percent)"),
            ],
        ),
        (
            DimensionKey::PieceLength,
            vec![
                format!(r"\bin\s+{number}\s*{UNIT}\s*(?:lengths|pieces)\b"),
                format!(r"\bpiece length\s*(?:of|is|:|=)?\s*{number}\s*{UNIT}"),
            ],
        ),
    ];

    table
        .into_iter()
        .map(|(key, sources)| (key, sources.iter().map(|source| compile(source)).collect()))
        .collect()
});

static MATERIAL_PATTERNS: Lazy<Vec<(MaterialType, Regex)>> = Lazy::new(|| {
    [
        (MaterialType::Area, r"\b(?:area|surface|wall|floor|ceiling|paint|til(?:e|es|ing))"),
        (MaterialType::Area, r"\b(?:square|sq\.?)\s*(?:met(?:er|re)s?|m)\b"),
        (MaterialType::Area, r"\dm2\b|\d\s*m2\b|m²"),
        (MaterialType::Volume, r"\b(?:volume|concrete|cement|sand|gravel|slab)"),
        (MaterialType::Volume, r"\b(?:cubic|cu\.?)\s*(?:met(?:er|re)s?|m)\b"),
        (MaterialType::Volume, r"\d\s*m3\b|m³"),
        (MaterialType::Linear, r"\b(?:linear|pipe|cable|wire|trim|mou?lding|skirting)"),
        (MaterialType::Linear, r"\b(?:running|ln)\s*(?:met(?:er|re)s?|m)\b"),
    ]
    .into_iter()
    .map(|(material, source)| (material, compile(source)))
    .collect()
});

static WEAK_LINEAR: Lazy<Regex> = Lazy::new(|| compile(r"\blengths?\b"));

static DIMENSION_EDIT: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?:if|with|and|change|what about|how about|make|set)\s+(?:the\s+)?(?P<key>wastage|waste|length|width|height|depth|coverage)\s+(?:(?:is|to|of|at|be|was)\s+)?(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>%|cm|mm|meters?|metres?|m)?",
    )
});

static RECALCULATE: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:recalculate|re-calculate|calculate again|redo)\b"));

static BARE_CALCULATE: Lazy<Regex> = Lazy::new(|| {
    compile(r"^(?:calculate|calculator|calc|estimate|how much)(?: it| this| for (?:it|this|that))?$")
});

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    compile(r"^(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>%|percent|cm|mm|meters?|metres?|m)?$")
});

static CALCULATOR_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"i calculated materials for (?:an? )?(?P<kind>area|volume|length) of (?P<a>\d+(?:\.\d+)?)\s*m?(?:\s*x\s*(?P<b>\d+(?:\.\d+)?)\s*m?)?(?:\s*x\s*(?P<c>\d+(?:\.\d+)?)\s*m?)?",
    )
});

fn compile(source: &str) -> Regex {
    Regex::new(source).expect("calculator pattern must compile")
}

/// A number sent on its own, e.g. "3", "2.5m" or "12%".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BareNumber {
    pub value: f64,
    pub percent: bool,
}

/// Values read from a calculator widget summary message.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculatorSummary {
    pub material: MaterialType,
    pub dimensions: Dimensions,
}

/// Every dimension the message states. The first matching pattern per
/// dimension wins; centimetre and millimetre values are converted to metres.
pub fn extract_dimensions(text: &str) -> Dimensions {
    let mut dimensions = Dimensions::new();
    for (key, patterns) in DIMENSION_PATTERNS.iter() {
        let value = patterns.iter().find_map(|pattern| pattern.captures(text).and_then(|c| measure(&c)));
        if let Some(value) = value {
            dimensions.set(*key, value);
        }
    }
    dimensions
}

/// Material type named by keyword or unit. Only unambiguous cues count here;
/// see [`suggests_linear`] for the weak "length" hint.
pub fn detect_material(text: &str) -> Option<MaterialType> {
    MATERIAL_PATTERNS.iter().find(|(_, pattern)| pattern.is_match(text)).map(|(material, _)| *material)
}

pub fn suggests_linear(text: &str) -> bool {
    WEAK_LINEAR.is_match(text)
}

/// "what if the width is 5", "change the wastage to 12%".
pub fn dimension_edit(text: &str) -> Option<(DimensionKey, f64)> {
    let captures = DIMENSION_EDIT.captures(text)?;
    let key = DimensionKey::parse(captures.name("key")?.as_str())?;
    Some((key, measure(&captures)?))
}

pub fn is_recalculate(text: &str) -> bool {
    RECALCULATE.is_match(text)
}

pub fn is_bare_calculate(text: &str) -> bool {
    BARE_CALCULATE.is_match(text)
}

pub fn bare_number(text: &str) -> Option<BareNumber> {
    let captures = BARE_NUMBER.captures(text)?;
    let percent = captures
        .name("unit")
        .is_some_and(|unit| matches!(unit.as_str(), "%" | "percent"));
    Some(BareNumber { value: measure(&captures)?, percent })
}

pub fn calculator_summary(text: &str) -> Option<CalculatorSummary> {
    let captures = CALCULATOR_SUMMARY.captures(text)?;
    let material = match captures.name("kind")?.as_str() {
        "area" => MaterialType::Area,
        "volume" => MaterialType::Volume,
        _ => MaterialType::Linear,
    };

    let mut dimensions = Dimensions::new();
    let slots = [("a", DimensionKey::Length), ("b", DimensionKey::Width), ("c", DimensionKey::Depth)];
    for (group, key) in slots {
        if let Some(value) = captures.name(group).and_then(|m| m.as_str().parse::<f64>().ok()) {
            dimensions.set(key, value);
        }
    }
    Some(CalculatorSummary { material, dimensions })
}

/// True when the message carries anything the calculator can act on.
pub fn has_calculator_content(text: &str) -> bool {
    !extract_dimensions(text).is_empty()
        || bare_number(text).is_some()
        || dimension_edit(text).is_some()
        || is_recalculate(text)
        || calculator_summary(text).is_some()
}

fn measure(captures: &Captures<'_>) -> Option<f64> {
    let value = captures.name("value")?.as_str().parse::<f64>().ok()?;
    let divisor = match captures.name("unit").map(|unit| unit.as_str()) {
        Some("cm") => 100.0,
        Some("mm") => 1000.0,
        _ => 1.0,
    };
    let value = value / divisor;
    value.is_finite().then_some(value)
}
