use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::CalculatorConfig;
use crate::domain::calculator::{CalculationReport, DimensionKey, Dimensions, MaterialType};
use crate::domain::product::{format_number, ProductId, ProductRecord};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CalculationError {
    #[error("missing required dimension `{0}`")]
    MissingDimension(&'static str),
    #[error("`{name}` must be a positive number, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("`{name}` did not produce a finite result")]
    NotFinite { name: &'static str },
}

/// Product the calculation is for. `record` is absent when the session still
/// names a product the conversation has since moved away from.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalculationTarget<'a> {
    pub product_id: Option<ProductId>,
    pub record: Option<&'a ProductRecord>,
}

pub fn compute(
    material: MaterialType,
    dimensions: &Dimensions,
    target: CalculationTarget<'_>,
    config: &CalculatorConfig,
) -> Result<CalculationReport, CalculationError> {
    let length = positive(dimensions, DimensionKey::Length)?;
    let wastage_pct = match dimensions.get(DimensionKey::Wastage) {
        Some(value) if value >= 0.0 && value.is_finite() => value,
        Some(value) => return Err(CalculationError::NonPositive { name: "wastage", value }),
        None => default_wastage(material, config),
    };
    let factor = 1.0 + wastage_pct / 100.0;

    let (measure, coverage, base_quantity) = match material {
        MaterialType::Area => {
            let width = match dimensions.get(DimensionKey::Width) {
                Some(_) => positive(dimensions, DimensionKey::Width)?,
                None => positive(dimensions, DimensionKey::Height)
                    .map_err(|_| CalculationError::MissingDimension("width"))?,
            };
            let area = length * width;
            let coverage = resolve_coverage(dimensions, target, config)?;
            (area, Some(coverage), area / coverage)
        }
        MaterialType::Volume => {
            let width = positive(dimensions, DimensionKey::Width)?;
            let depth = positive(dimensions, DimensionKey::Depth)?;
            let volume = length * width * depth;
            (volume, None, volume)
        }
        MaterialType::Linear => (length, None, length),
    };

    let required_quantity = base_quantity * factor;
    let rounded_quantity = match material {
        MaterialType::Area => required_quantity.round(),
        MaterialType::Volume | MaterialType::Linear => round2(required_quantity),
    };

    let pieces = match (material, dimensions.get(DimensionKey::PieceLength)) {
        (MaterialType::Linear, Some(_)) => {
            let piece_length = positive(dimensions, DimensionKey::PieceLength)?;
            Some((required_quantity / piece_length).round())
        }
        _ => None,
    };

    finite("quantity", required_quantity)?;
    finite("measure", measure)?;

    let total_cost = target.record.and_then(|product| {
        Decimal::from_f64(pieces.unwrap_or(rounded_quantity))
            .map(|quantity| (quantity * product.price).round_dp(2))
    });

    Ok(CalculationReport {
        material,
        dimensions: dimensions.clone(),
        measure,
        coverage,
        wastage_pct,
        base_quantity,
        required_quantity,
        rounded_quantity,
        pieces,
        product_id: target.product_id,
        product_name: target.record.map(|product| product.name.clone()),
        total_cost,
    })
}

/// Explicit coverage, then the product's own coverage attribute, then the
/// configured per-product override, then the default.
fn resolve_coverage(
    dimensions: &Dimensions,
    target: CalculationTarget<'_>,
    config: &CalculatorConfig,
) -> Result<f64, CalculationError> {
    let coverage = dimensions
        .get(DimensionKey::Coverage)
        .or_else(|| target.record.and_then(|product| product.attribute_number("coverage")))
        .or_else(|| {
            target.product_id.and_then(|id| config.coverage_overrides.get(&id.0).copied())
        })
        .unwrap_or(config.default_coverage);

    if coverage > 0.0 && coverage.is_finite() {
        Ok(coverage)
    } else {
        Err(CalculationError::NonPositive { name: "coverage", value: coverage })
    }
}

pub fn default_wastage(material: MaterialType, config: &CalculatorConfig) -> f64 {
    match material {
        MaterialType::Area => config.area_wastage_pct,
        MaterialType::Volume => config.volume_wastage_pct,
        MaterialType::Linear => config.linear_wastage_pct,
    }
}

/// Reply text for a computed report. Recalculations open with "With the
/// updated dimensions" so the user can tell the numbers changed.
pub fn format_result(report: &CalculationReport, recalculation: bool) -> String {
    let lead = if recalculation { "With the updated dimensions" } else { "Based on your dimensions" };
    let dims = &report.dimensions;
    let shown: &[DimensionKey] = match report.material {
        MaterialType::Area => &[DimensionKey::Length, DimensionKey::Width, DimensionKey::Height],
        MaterialType::Volume => &[DimensionKey::Length, DimensionKey::Width, DimensionKey::Depth],
        MaterialType::Linear => &[DimensionKey::Length],
    };
    let listed = shown
        .iter()
        .filter_map(|key| dims.get(*key).map(|value| format!("{}: {}m", key.as_str(), format_number(value))))
        .collect::<Vec<_>>()
        .join(", ");
    let wastage = format_number(report.wastage_pct);
    let material_label = report.product_name.as_deref().unwrap_or("material");

    let mut reply = match report.material {
        MaterialType::Area => format!(
            "{lead} ({listed}), the total area is {} m². You will need approximately {} units of {material_label} (including {wastage}% wastage).",
            format_number(report.measure),
            format_number(report.rounded_quantity),
        ),
        MaterialType::Volume => format!(
            "{lead} ({listed}), the total volume is {} m³. You will need approximately {} m³ of {material_label} (including {wastage}% wastage).",
            format_number(report.measure),
            format_number(report.rounded_quantity),
        ),
        MaterialType::Linear => format!(
            "{lead} ({listed}), you will need approximately {} m of {material_label} (including {wastage}% wastage).",
            format_number(report.rounded_quantity),
        ),
    };

    if let (Some(pieces), Some(piece_length)) = (report.pieces, dims.get(DimensionKey::PieceLength)) {
        reply.push_str(&format!(
            " This equals about {} pieces at {} m per piece.",
            format_number(pieces),
            format_number(piece_length)
        ));
    }
    if let Some(total_cost) = report.total_cost {
        reply.push_str(&format!(" Estimated cost: ${total_cost:.2}."));
    }
    reply
}

fn positive(dimensions: &Dimensions, key: DimensionKey) -> Result<f64, CalculationError> {
    match dimensions.get(key) {
        Some(value) if value > 0.0 && value.is_finite() => Ok(value),
        Some(value) => Err(CalculationError::NonPositive { name: key.as_str(), value }),
        None => Err(CalculationError::MissingDimension(key.as_str())),
    }
}

fn finite(name: &'static str, value: f64) -> Result<(), CalculationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CalculationError::NotFinite { name })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{compute, format_result, CalculationError, CalculationTarget};
    use crate::catalog::fixtures::storefront;
    use crate::config::CalculatorConfig;
    use crate::domain::calculator::{DimensionKey, Dimensions, MaterialType};
    use crate::domain::product::ProductId;

    fn area(length: f64, width: f64) -> Dimensions {
        Dimensions::new().with(DimensionKey::Length, length).with(DimensionKey::Width, width)
    }

    #[test]
    fn area_uses_default_coverage_and_wastage() {
        let report = compute(MaterialType::Area, &area(4.0, 3.0), CalculationTarget::default(), &CalculatorConfig::default())
            .expect("area computes");

        assert_eq!(report.measure, 12.0);
        assert_eq!(report.coverage, Some(10.0));
        assert_eq!(report.wastage_pct, 10.0);
        assert!((report.required_quantity - 1.32).abs() < 1e-9);
        assert_eq!(report.rounded_quantity, 1.0);
        assert_eq!(report.total_cost, None);
    }

    #[test]
    fn height_stands_in_for_width() {
        let dims = Dimensions::new().with(DimensionKey::Length, 5.0).with(DimensionKey::Height, 2.0);
        let report = compute(MaterialType::Area, &dims, CalculationTarget::default(), &CalculatorConfig::default())
            .expect("area computes");

        assert_eq!(report.measure, 10.0);
    }

    #[test]
    fn coverage_prefers_explicit_then_product_then_override() {
        let catalog = storefront();
        let config = CalculatorConfig::default();
        let tile = catalog.product(ProductId(10));
        let brick = catalog.product(ProductId(8));

        let explicit = area(4.0, 3.0).with(DimensionKey::Coverage, 2.0);
        let report = compute(
            MaterialType::Area,
            &explicit,
            CalculationTarget { product_id: Some(ProductId(10)), record: tile },
            &config,
        )
        .expect("explicit coverage");
        assert_eq!(report.coverage, Some(2.0));

        let report = compute(
            MaterialType::Area,
            &area(4.0, 3.0),
            CalculationTarget { product_id: Some(ProductId(10)), record: tile },
            &config,
        )
        .expect("product coverage");
        assert_eq!(report.coverage, Some(1.5));
        assert_eq!(report.rounded_quantity, 9.0);
        assert_eq!(report.total_cost, Some(Decimal::new(26991, 2)));

        let report = compute(
            MaterialType::Area,
            &area(4.0, 3.0),
            CalculationTarget { product_id: Some(ProductId(8)), record: brick },
            &config,
        )
        .expect("override coverage");
        assert_eq!(report.coverage, Some(0.02));
        assert_eq!(report.rounded_quantity, 660.0);
    }

    #[test]
    fn volume_and_linear_round_to_two_decimals() {
        let config = CalculatorConfig::default();
        let slab = area(4.0, 3.0).with(DimensionKey::Depth, 0.15);
        let report = compute(MaterialType::Volume, &slab, CalculationTarget::default(), &config)
            .expect("volume computes");
        assert!((report.measure - 1.8).abs() < 1e-9);
        assert_eq!(report.rounded_quantity, 2.07);

        let pipe = Dimensions::new().with(DimensionKey::Length, 20.0).with(DimensionKey::PieceLength, 3.0);
        let report = compute(MaterialType::Linear, &pipe, CalculationTarget::default(), &config)
            .expect("linear computes");
        assert_eq!(report.rounded_quantity, 21.0);
        assert_eq!(report.pieces, Some(7.0));
    }

    #[test]
    fn required_quantity_never_below_base() {
        let config = CalculatorConfig::default();
        for wastage in [0.0, 2.5, 10.0, 35.0] {
            for (length, width, depth) in [(0.4, 0.3, 0.1), (4.0, 3.0, 0.15), (12.5, 7.0, 1.0)] {
                let dims = Dimensions::new()
                    .with(DimensionKey::Length, length)
                    .with(DimensionKey::Width, width)
                    .with(DimensionKey::Depth, depth)
                    .with(DimensionKey::Wastage, wastage);
                for material in [MaterialType::Area, MaterialType::Volume, MaterialType::Linear] {
                    let report = compute(material, &dims, CalculationTarget::default(), &config)
                        .expect("positive dimensions compute");
                    assert!(report.required_quantity >= report.base_quantity);
                    assert_eq!(report.required_quantity == report.base_quantity, wastage == 0.0);
                }
            }
        }
    }

    #[test]
    fn invalid_values_are_reported_not_computed() {
        let config = CalculatorConfig::default();
        let zero_coverage = area(4.0, 3.0).with(DimensionKey::Coverage, 0.0);

        assert_eq!(
            compute(MaterialType::Area, &zero_coverage, CalculationTarget::default(), &config),
            Err(CalculationError::NonPositive { name: "coverage", value: 0.0 })
        );
        assert_eq!(
            compute(MaterialType::Volume, &area(4.0, 3.0), CalculationTarget::default(), &config),
            Err(CalculationError::MissingDimension("depth"))
        );
    }

    #[test]
    fn recalculation_changes_the_lead_phrase() {
        let report = compute(MaterialType::Area, &area(4.0, 5.0), CalculationTarget::default(), &CalculatorConfig::default())
            .expect("area computes");

        let first = format_result(&report, false);
        let again = format_result(&report, true);

        assert!(first.starts_with("Based on your dimensions (length: 4m, width: 5m), the total area is 20 m²."));
        assert!(again.starts_with("With the updated dimensions (length: 4m, width: 5m)"));
        assert!(again.contains("approximately 2 units of material (including 10% wastage)"));
    }
}
