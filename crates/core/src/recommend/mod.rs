//! Alternatives, out-of-stock suggestions and side-by-side comparisons.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::matcher::{can_compare, ProductMatcher};
use crate::domain::conversation::ConversationMemory;
use crate::domain::product::{ProductId, ProductRecord};
use crate::errors::DomainError;

pub const RECOMMENDATION_LIMIT: usize = 5;
pub const OUT_OF_STOCK_ALTERNATIVES: usize = 3;

const SIZE_ATTRIBUTES: &[&str] = &["size", "dimensions", "length", "width", "thickness"];

static SIZE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*(inch(?:es)?|in|mm|cm|m|ft|feet|foot)\b")
        .expect("size token pattern must compile")
});

/// A size mentioned in free text, e.g. "3 inch" or "40mm".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeToken {
    value: String,
    unit: &'static str,
}

impl SizeToken {
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        let captures = SIZE_TOKEN.captures(&lowered)?;
        let value = captures.get(1)?.as_str().replace(',', ".");
        let unit = canonical_unit(captures.get(2)?.as_str());
        Some(Self { value, unit })
    }

    /// True when the product's name or size attributes carry the same size.
    pub fn matches(&self, product: &ProductRecord) -> bool {
        let attributes = SIZE_ATTRIBUTES
            .iter()
            .filter_map(|key| product.attribute(key).map(|value| value.as_text()));
        std::iter::once(product.name.clone()).chain(attributes).any(|text| {
            let lowered = text.to_lowercase();
            SIZE_TOKEN.captures_iter(&lowered).any(|captures| {
                captures.get(1).map(|value| value.as_str().replace(',', ".")).as_deref()
                    == Some(self.value.as_str())
                    && captures.get(2).map(|unit| canonical_unit(unit.as_str())) == Some(self.unit)
            })
        })
    }
}

fn canonical_unit(unit: &str) -> &'static str {
    match unit {
        "inch" | "inches" | "in" => "in",
        "ft" | "feet" | "foot" => "ft",
        "mm" => "mm",
        "cm" => "cm",
        _ => "m",
    }
}

/// Alternatives to the conversation's current product that have not been
/// shown yet. A size named in `query` narrows the list when anything matches
/// it. Products the user already saw are offered again only when nothing new
/// remains.
pub fn recommend(
    memory: &ConversationMemory,
    query: &str,
    matcher: &ProductMatcher<'_>,
) -> Vec<ProductRecord> {
    let Some(current) = memory.current_product.as_ref() else {
        return Vec::new();
    };

    let mut candidates = matcher.find_alternatives(current, &memory.mentioned_ids());
    if candidates.is_empty() {
        candidates = matcher.find_alternatives(current, &[]);
    }

    if let Some(size) = SizeToken::parse(query) {
        let sized: Vec<ProductRecord> =
            candidates.iter().filter(|candidate| size.matches(candidate)).cloned().collect();
        if !sized.is_empty() {
            candidates = sized;
        }
    }

    candidates.truncate(RECOMMENDATION_LIMIT);
    candidates
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StockSuggestion {
    pub alternatives: Vec<ProductRecord>,
    pub message: String,
}

/// Up to three in-stock, same-category replacements for a product that has
/// run out. In-stock products get an empty list and a confirmation.
pub fn suggest_for_out_of_stock(
    product: &ProductRecord,
    matcher: &ProductMatcher<'_>,
) -> StockSuggestion {
    if product.in_stock() {
        return StockSuggestion {
            alternatives: Vec::new(),
            message: format!("{} is in stock ({} available).", product.name, product.stock_quantity),
        };
    }

    let mut alternatives = matcher.find_alternatives(product, &[product.id]);
    alternatives.truncate(OUT_OF_STOCK_ALTERNATIVES);

    let message = if alternatives.is_empty() {
        format!("Sorry, {} is out of stock and no alternatives are available.", product.name)
    } else {
        let listed = alternatives
            .iter()
            .enumerate()
            .map(|(index, alternative)| {
                format!(
                    "{}. {} - {} ({} in stock)",
                    index + 1,
                    alternative.name,
                    alternative.price_label(),
                    alternative.stock_quantity
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("{} is currently out of stock. Here are similar alternatives:\n\n{listed}", product.name)
    };

    StockSuggestion { alternatives, message }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpecificationRow {
    pub key: String,
    pub first: Option<String>,
    pub second: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "product_id", rename_all = "snake_case")]
pub enum ComparisonVerdict {
    /// The other product is out of stock.
    OnlyInStock(ProductId),
    BetterValue(ProductId),
    /// Same price and availability; the specifications decide.
    Specifications,
}

/// Cheaper product of a pair and its per-unit saving.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceGap {
    pub product_id: ProductId,
    #[serde(with = "rust_decimal::serde::float")]
    pub saving: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub first: ProductRecord,
    pub second: ProductRecord,
    pub reason: String,
    /// Absent on equal prices.
    pub cheaper: Option<PriceGap>,
    pub specifications: Vec<SpecificationRow>,
    pub verdict: ComparisonVerdict,
}

impl ComparisonReport {
    pub fn product(&self, id: ProductId) -> Option<&ProductRecord> {
        [&self.first, &self.second].into_iter().find(|product| product.id == id)
    }
}

/// Structured comparison of two comparable products. Products from unrelated
/// categories are rejected with the reason from [`can_compare`].
pub fn compare(first: &ProductRecord, second: &ProductRecord) -> Result<ComparisonReport, DomainError> {
    let check = can_compare(first, second);
    if !check.comparable {
        return Err(DomainError::IncompatibleComparison(check.reason));
    }

    let cheaper = match first.price.cmp(&second.price) {
        std::cmp::Ordering::Less => {
            Some(PriceGap { product_id: first.id, saving: second.price - first.price })
        }
        std::cmp::Ordering::Greater => {
            Some(PriceGap { product_id: second.id, saving: first.price - second.price })
        }
        std::cmp::Ordering::Equal => None,
    };

    let keys: BTreeSet<&String> = first.attributes.keys().chain(second.attributes.keys()).collect();
    let specifications = keys
        .into_iter()
        .map(|key| SpecificationRow {
            key: key.clone(),
            first: first.attribute(key).map(|value| value.as_text()),
            second: second.attribute(key).map(|value| value.as_text()),
        })
        .collect();

    let verdict = match (first.in_stock(), second.in_stock(), cheaper) {
        (false, true, _) => ComparisonVerdict::OnlyInStock(second.id),
        (true, false, _) => ComparisonVerdict::OnlyInStock(first.id),
        (_, _, Some(gap)) => ComparisonVerdict::BetterValue(gap.product_id),
        (_, _, None) => ComparisonVerdict::Specifications,
    };

    Ok(ComparisonReport {
        first: first.clone(),
        second: second.clone(),
        reason: check.reason,
        cheaper,
        specifications,
        verdict,
    })
}
