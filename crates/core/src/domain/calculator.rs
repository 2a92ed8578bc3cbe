use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::flows::states::CalculatorState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialType {
    Area,
    Volume,
    Linear,
}

impl MaterialType {
    pub fn required_dimensions(&self) -> &'static [DimensionKey] {
        match self {
            Self::Area => &[DimensionKey::Length, DimensionKey::Width],
            Self::Volume => &[DimensionKey::Length, DimensionKey::Width, DimensionKey::Depth],
            Self::Linear => &[DimensionKey::Length],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Volume => "volume",
            Self::Linear => "linear",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "area" | "surface" => Some(Self::Area),
            "volume" => Some(Self::Volume),
            "linear" | "length" => Some(Self::Linear),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKey {
    Length,
    Width,
    Depth,
    Height,
    Coverage,
    Wastage,
    PieceLength,
}

impl DimensionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::Width => "width",
            Self::Depth => "depth",
            Self::Height => "height",
            Self::Coverage => "coverage",
            Self::Wastage => "wastage",
            Self::PieceLength => "piece_length",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "length" => Some(Self::Length),
            "width" => Some(Self::Width),
            "depth" => Some(Self::Depth),
            "height" => Some(Self::Height),
            "coverage" => Some(Self::Coverage),
            "wastage" | "waste" => Some(Self::Wastage),
            "piece_length" | "piece length" => Some(Self::PieceLength),
            _ => None,
        }
    }
}

/// Sparse set of dimensions collected so far. Only keys the user supplied are
/// present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimensions(BTreeMap<DimensionKey, f64>);

impl Dimensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: DimensionKey) -> Option<f64> {
        self.0.get(&key).copied()
    }

    pub fn contains(&self, key: DimensionKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn set(&mut self, key: DimensionKey, value: f64) {
        self.0.insert(key, value);
    }

    pub fn with(mut self, key: DimensionKey, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DimensionKey, f64)> + '_ {
        self.0.iter().map(|(key, value)| (*key, *value))
    }

    /// Merges `newer` over `self`; values from `newer` win on conflict.
    pub fn merged_with(&self, newer: &Dimensions) -> Dimensions {
        let mut merged = self.clone();
        for (key, value) in newer.iter() {
            merged.set(key, value);
        }
        merged
    }

    /// Required dimensions still absent for `material`. For area work a
    /// height stands in for a missing width.
    pub fn missing_for(&self, material: MaterialType) -> Vec<DimensionKey> {
        material
            .required_dimensions()
            .iter()
            .copied()
            .filter(|key| match key {
                DimensionKey::Width if material == MaterialType::Area => {
                    !self.contains(DimensionKey::Width) && !self.contains(DimensionKey::Height)
                }
                other => !self.contains(*other),
            })
            .collect()
    }
}

/// Calculator sub-state embedded in the conversation memory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculatorSession {
    pub material: Option<MaterialType>,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub state: CalculatorState,
    pub product_id: Option<ProductId>,
    pub last_result: Option<CalculationReport>,
}

impl CalculatorSession {
    pub fn missing_dimensions(&self) -> Vec<DimensionKey> {
        self.material.map(|material| self.dimensions.missing_for(material)).unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.state != CalculatorState::None
    }

    pub fn is_consistent(&self) -> bool {
        match self.state {
            CalculatorState::Complete => {
                self.material.is_some()
                    && self.missing_dimensions().is_empty()
                    && self.last_result.is_some()
            }
            CalculatorState::AwaitingDimensions | CalculatorState::None => true,
        }
    }
}

/// Outcome of a quantity computation. `base_quantity` excludes wastage,
/// `required_quantity` includes it; both are unrounded. `rounded_quantity` is
/// what the user is told to buy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculationReport {
    pub material: MaterialType,
    pub dimensions: Dimensions,
    pub measure: f64,
    pub coverage: Option<f64>,
    pub wastage_pct: f64,
    pub base_quantity: f64,
    pub required_quantity: f64,
    pub rounded_quantity: f64,
    pub pieces: Option<f64>,
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total_cost: Option<Decimal>,
}
