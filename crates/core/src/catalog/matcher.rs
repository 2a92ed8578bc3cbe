//! Free-text to catalog resolution.
//!
//! Scoring tiers, best score per product wins:
//! exact substring (1.0), whole-name or per-word similarity ratio, name or
//! description keyword hits, and word-set overlap.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::catalog::CatalogSnapshot;
use crate::domain::product::{MatchKind, ProductId, ProductMatch, ProductRecord};

pub const FUZZY_THRESHOLD: f64 = 0.6;
pub const WORD_FUZZY_THRESHOLD: f64 = 0.8;
pub const OVERLAP_THRESHOLD: f64 = 0.5;
pub const NAME_KEYWORD_SCORE: f64 = 0.7;
pub const DESCRIPTION_KEYWORD_SCORE: f64 = 0.5;
pub const MAX_ALTERNATIVES: usize = 5;

const SUPPLIER_WEIGHT: f64 = 0.2;
const PRICE_WEIGHT: f64 = 0.3;
const PRICE_WINDOW: f64 = 0.3;
const NAME_WEIGHT: f64 = 0.5;

const TYPO_CORRECTIONS: &[(&str, &str)] = &[
    ("nailes", "nails"),
    ("nial", "nail"),
    ("nals", "nails"),
    ("ciment", "cement"),
    ("sement", "cement"),
    ("cemant", "cement"),
    ("brik", "brick"),
    ("bricks", "brick"),
    ("brich", "brick"),
    ("til", "tile"),
    ("tiles", "tile"),
    ("tiel", "tile"),
    ("concret", "concrete"),
    ("conrete", "concrete"),
    ("pant", "paint"),
    ("paont", "paint"),
    ("plywod", "plywood"),
    ("drywll", "drywall"),
    ("galvanised", "galvanized"),
    ("stainles", "stainless"),
    ("hammar", "hammer"),
    ("hamer", "hammer"),
    ("woood", "wood"),
    ("wod", "wood"),
    ("insulaton", "insulation"),
    ("roofin", "roofing"),
    ("scews", "screws"),
    ("screw", "screws"),
    ("srews", "screws"),
    ("bolt", "bolts"),
    ("bols", "bolts"),
];

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "are", "at", "be", "buy", "can", "cost", "do", "does",
    "for", "get", "got", "have", "how", "i", "in", "is", "it", "looking", "me", "much", "my",
    "need", "of", "on", "per", "please", "price", "search", "show", "some", "stock", "tell",
    "that", "the", "there", "this", "to", "want", "what", "with", "you", "your",
];

/// Related-category groups. Two categories are comparable when each name
/// contains a term from the same group.
const RELATED_CATEGORY_GROUPS: &[(&str, &[&str])] = &[
    ("fasteners and hardware", &["fastener", "hardware"]),
    ("lumber and plywood", &["lumber", "plywood"]),
    ("tile and flooring", &["tile", "flooring"]),
    ("concrete, brick and masonry", &["concrete", "cement", "brick", "masonry"]),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonCheck {
    pub comparable: bool,
    pub reason: String,
}

pub struct ProductMatcher<'a> {
    catalog: &'a CatalogSnapshot,
}

impl<'a> ProductMatcher<'a> {
    pub fn new(catalog: &'a CatalogSnapshot) -> Self {
        Self { catalog }
    }

    pub fn find(&self, query: &str, limit: usize) -> Vec<ProductMatch> {
        let corrected = correct_typos(query);
        if corrected.is_empty() || limit == 0 {
            return Vec::new();
        }
        let query_words = significant_words(&corrected);

        let mut seen = HashSet::new();
        let mut matches: Vec<ProductMatch> = self
            .catalog
            .products()
            .iter()
            .filter(|product| seen.insert(product.id))
            .filter_map(|product| {
                score_product(&corrected, &query_words, product).map(|(score, kind)| {
                    ProductMatch { product: product.clone(), score, kind }
                })
            })
            .collect();

        matches.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.product.id.cmp(&right.product.id))
        });
        matches.truncate(limit);
        matches
    }

    /// Same-category, in-stock products ranked by supplier, price proximity and
    /// name similarity.
    pub fn find_alternatives(
        &self,
        product: &ProductRecord,
        exclude_ids: &[ProductId],
    ) -> Vec<ProductRecord> {
        let base_price = product.price.to_f64().unwrap_or(0.0);
        let base_name = product.name.to_lowercase();

        let mut scored: Vec<(f64, &ProductRecord)> = self
            .catalog
            .products_in_category(product.category_id)
            .filter(|candidate| candidate.id != product.id)
            .filter(|candidate| candidate.in_stock())
            .filter(|candidate| !exclude_ids.contains(&candidate.id))
            .map(|candidate| {
                let mut score = 0.0;
                if product.supplier_id.is_some() && candidate.supplier_id == product.supplier_id {
                    score += SUPPLIER_WEIGHT;
                }

                if let Some(gap) = price_gap(base_price, candidate.price.to_f64().unwrap_or(0.0)) {
                    if gap <= PRICE_WINDOW {
                        score += PRICE_WEIGHT * (1.0 - gap);
                    }
                }

                score += similarity_ratio(&base_name, &candidate.name.to_lowercase()) * NAME_WEIGHT;
                (score, candidate)
            })
            .collect();

        scored.sort_by(|left, right| {
            right.0.partial_cmp(&left.0).unwrap_or(Ordering::Equal).then_with(|| left.1.id.cmp(&right.1.id))
        });
        scored.into_iter().take(MAX_ALTERNATIVES).map(|(_, product)| product.clone()).collect()
    }

    pub fn can_compare(&self, first: &ProductRecord, second: &ProductRecord) -> ComparisonCheck {
        can_compare(first, second)
    }
}

pub fn can_compare(first: &ProductRecord, second: &ProductRecord) -> ComparisonCheck {
    if first.category_id == second.category_id {
        return ComparisonCheck {
            comparable: true,
            reason: format!("Both products are in {}", first.category_name),
        };
    }

    let first_category = first.category_name.to_lowercase();
    let second_category = second.category_name.to_lowercase();
    let shared_group = RELATED_CATEGORY_GROUPS.iter().find(|(_, terms)| {
        terms.iter().any(|term| first_category.contains(term))
            && terms.iter().any(|term| second_category.contains(term))
    });

    match shared_group {
        Some((label, _)) => {
            ComparisonCheck { comparable: true, reason: format!("Both products are {label}") }
        }
        None => ComparisonCheck {
            comparable: false,
            reason: format!(
                "Cannot compare {} with {} - different product types",
                first.category_name, second.category_name
            ),
        },
    }
}

/// Lowercases, strips punctuation and rewrites known misspellings word by word.
pub fn correct_typos(text: &str) -> String {
    normalize_words(text)
        .into_iter()
        .map(|word| {
            TYPO_CORRECTIONS
                .iter()
                .find(|(typo, _)| *typo == word)
                .map(|(_, canonical)| (*canonical).to_string())
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Character-level similarity in `[0, 1]` derived from Levenshtein distance.
pub fn similarity_ratio(left: &str, right: &str) -> f64 {
    strsim::normalized_levenshtein(left, right)
}

pub fn significant_words(text: &str) -> Vec<String> {
    normalize_words(text)
        .into_iter()
        .filter(|word| word.chars().count() >= 3 && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

fn normalize_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '.'))
        .map(|word| word.trim_matches('.'))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn score_product(
    corrected_query: &str,
    query_words: &[String],
    product: &ProductRecord,
) -> Option<(f64, MatchKind)> {
    let name = correct_typos(&product.name);
    if name.contains(corrected_query)
        || (corrected_query.chars().count() >= 3 && corrected_query.contains(&name))
    {
        return Some((1.0, MatchKind::Exact));
    }

    let mut best: Option<(f64, MatchKind)> = None;
    let mut consider = |score: f64, kind: MatchKind| {
        if best.map_or(true, |(current, _)| score > current) {
            best = Some((score, kind));
        }
    };

    let ratio = similarity_ratio(corrected_query, &name);
    if ratio >= FUZZY_THRESHOLD {
        consider(ratio, MatchKind::Fuzzy);
    }

    let name_words = significant_words(&name);
    let description_words = significant_words(&correct_typos(&product.description));

    let word_ratio = query_words
        .iter()
        .filter(|word| word.chars().count() >= 4)
        .flat_map(|word| name_words.iter().map(move |candidate| similarity_ratio(word, candidate)))
        .fold(0.0_f64, f64::max);
    if word_ratio >= WORD_FUZZY_THRESHOLD && word_ratio < 1.0 {
        consider(word_ratio * NAME_KEYWORD_SCORE, MatchKind::Fuzzy);
    }

    if query_words.iter().any(|word| name_words.contains(word)) {
        consider(NAME_KEYWORD_SCORE, MatchKind::Keyword);
    } else if query_words.iter().any(|word| description_words.contains(word)) {
        consider(DESCRIPTION_KEYWORD_SCORE, MatchKind::Keyword);
    }

    let overlap = word_overlap(query_words, &name_words, &description_words);
    if overlap >= OVERLAP_THRESHOLD {
        consider(overlap, MatchKind::Keyword);
    }

    best
}

fn word_overlap(query: &[String], name: &[String], description: &[String]) -> f64 {
    let query: BTreeSet<&str> = query.iter().map(String::as_str).collect();
    let product: BTreeSet<&str> = name.iter().chain(description).map(String::as_str).collect();
    let union = query.union(&product).count();
    if union == 0 {
        return 0.0;
    }
    query.intersection(&product).count() as f64 / union as f64
}

/// Price difference relative to the dearer of the two; `None` unless both are priced.
fn price_gap(first: f64, second: f64) -> Option<f64> {
    if first <= 0.0 || second <= 0.0 {
        return None;
    }
    Some((first - second).abs() / first.max(second))
}
