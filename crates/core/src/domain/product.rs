use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single dimension attribute. Catalog rows store these as loose JSON, so
/// numbers may arrive as strings and are normalized on parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Number(value) => format_number(*value),
            Self::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// Parses a raw attribute document. Anything that is not a JSON object yields
/// an empty map; nested values are kept as their JSON text.
pub fn parse_attributes(raw: Option<&str>) -> Attributes {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Attributes::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(entries)) => entries
            .into_iter()
            .filter_map(|(key, value)| attribute_from_json(value).map(|value| (key, value)))
            .collect(),
        _ => Attributes::new(),
    }
}

fn attribute_from_json(value: Value) -> Option<AttributeValue> {
    match value {
        Value::Null => None,
        Value::Number(number) => number.as_f64().map(AttributeValue::Number),
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Some(AttributeValue::Number(number)),
            _ => Some(AttributeValue::Text(text)),
        },
        Value::Bool(flag) => Some(AttributeValue::Text(flag.to_string())),
        other => Some(AttributeValue::Text(other.to_string())),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub unit: String,
    pub stock_quantity: i64,
    pub category_id: CategoryId,
    pub category_name: String,
    pub supplier_id: Option<SupplierId>,
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ProductRecord {
    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn attribute_number(&self, key: &str) -> Option<f64> {
        self.attribute(key).and_then(AttributeValue::as_number)
    }

    pub fn price_label(&self) -> String {
        format!("${:.2}/{}", self.price, self.unit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub product_count: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub product_id: Option<ProductId>,
    pub search: Option<String>,
    pub in_stock_only: bool,
    pub limit: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Keyword,
}

/// Scored association between a query and a catalog entry. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductMatch {
    pub product: ProductRecord,
    pub score: f64,
    pub kind: MatchKind,
}

/// Renders a measurement without trailing zeros: `4.0` as `4`, `2.50` as `2.5`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let rendered = format!("{value:.2}");
    rendered.trim_end_matches('0').trim_end_matches('.').to_string()
}
