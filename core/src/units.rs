use std::collections::HashMap;

use anyhow::{Result, bail};
use serde::Serialize;
use thiserror::Error;

use crate::models::{Dimension, Unit};

/// One row of the standard unit table. `factor` is `None` for a base unit.
#[derive(Debug, Clone, Copy)]
pub struct UnitSeed {
    pub name: &'static str,
    pub abbreviation: &'static str,
    pub dimension: Dimension,
    pub system: &'static str,
    pub factor: Option<f64>,
}

const fn seed(
    name: &'static str,
    abbreviation: &'static str,
    dimension: Dimension,
    system: &'static str,
    factor: Option<f64>,
) -> UnitSeed {
    UnitSeed {
        name,
        abbreviation,
        dimension,
        system,
        factor,
    }
}

/// Units created by schema setup. Base units come first in each dimension.
pub const STANDARD_UNITS: &[UnitSeed] = &[
    seed("gram", "g", Dimension::Mass, "metric", None),
    seed("kilogram", "kg", Dimension::Mass, "metric", Some(1000.0)),
    seed("milligram", "mg", Dimension::Mass, "metric", Some(0.001)),
    seed("ounce", "oz", Dimension::Mass, "imperial", Some(28.3495)),
    seed("pound", "lb", Dimension::Mass, "imperial", Some(453.592)),
    seed("milliliter", "ml", Dimension::Volume, "metric", None),
    seed("liter", "l", Dimension::Volume, "metric", Some(1000.0)),
    seed("deciliter", "dl", Dimension::Volume, "metric", Some(100.0)),
    seed("centiliter", "cl", Dimension::Volume, "metric", Some(10.0)),
    seed("teaspoon", "tsp", Dimension::Volume, "us", Some(4.92892)),
    seed("tablespoon", "tbsp", Dimension::Volume, "us", Some(14.7868)),
    seed("fluid ounce", "fl oz", Dimension::Volume, "us", Some(29.5735)),
    seed("cup", "cup", Dimension::Volume, "us", Some(236.588)),
    seed("pint", "pt", Dimension::Volume, "us", Some(473.176)),
    seed("quart", "qt", Dimension::Volume, "us", Some(946.353)),
    seed("gallon", "gal", Dimension::Volume, "us", Some(3785.41)),
    seed("piece", "pc", Dimension::Count, "metric", None),
    seed("dozen", "dz", Dimension::Count, "metric", Some(12.0)),
];

/// Build `Unit` values from the standard table with ids assigned in table order,
/// starting at 1. Used where no database is involved.
#[must_use]
pub fn standard_units() -> Vec<Unit> {
    let mut base_ids: HashMap<Dimension, i64> = HashMap::new();
    let mut units = Vec::with_capacity(STANDARD_UNITS.len());
    for (idx, s) in STANDARD_UNITS.iter().enumerate() {
        let id = idx as i64 + 1;
        if s.factor.is_none() {
            base_ids.insert(s.dimension, id);
        }
        units.push(Unit {
            id,
            name: s.name.to_string(),
            abbreviation: s.abbreviation.to_string(),
            dimension: s.dimension,
            system: s.system.to_string(),
            is_base_unit: s.factor.is_none(),
            base_unit_id: s.factor.and(base_ids.get(&s.dimension).copied()),
            conversion_factor: s.factor,
        });
    }
    units
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("duplicate unit name '{0}'")]
    DuplicateName(String),
    #[error("base unit '{0}' must not reference another unit")]
    BaseWithReference(String),
    #[error("unit '{0}' is not a base unit but has no base unit reference")]
    MissingBaseReference(String),
    #[error("unit '{0}' is not a base unit but has no conversion factor")]
    MissingFactor(String),
    #[error("unit '{unit}' has invalid conversion factor {factor}")]
    InvalidFactor { unit: String, factor: f64 },
    #[error("unit '{unit}' references unknown unit id {base_unit_id}")]
    DanglingReference { unit: String, base_unit_id: i64 },
    #[error("unit '{unit}' points at '{target}', which is not a base unit")]
    ChainedReference { unit: String, target: String },
    #[error("unit '{unit}' ({dimension}) points at '{target}' ({target_dimension})")]
    DimensionMismatch {
        unit: String,
        dimension: Dimension,
        target: String,
        target_dimension: Dimension,
    },
    #[error("dimension {0} has no base unit")]
    MissingBaseUnit(Dimension),
    #[error("dimension {dimension} has more than one base unit: '{first}' and '{second}'")]
    DuplicateBaseUnit {
        dimension: Dimension,
        first: String,
        second: String,
    },
    #[error("default unit '{0}' is not registered")]
    MissingDefaultUnit(String),
}

/// Unit systems a unit can belong to.
pub const UNIT_SYSTEMS: &[&str] = &["metric", "imperial", "us"];

/// Result of converting between two arbitrary units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub amount: f64,
    pub unit: String,
    pub original_amount: f64,
    pub original_unit: String,
    pub factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_g_per_ml: Option<f64>,
}

/// The conversion graph. Every non-base unit points directly at the base unit
/// of its dimension; `new` refuses anything else.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: Vec<Unit>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<i64, usize>,
    base_by_dimension: HashMap<Dimension, usize>,
}

impl UnitRegistry {
    pub fn new(units: Vec<Unit>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(units.len());
        let mut by_id = HashMap::with_capacity(units.len());
        let mut base_by_dimension: HashMap<Dimension, usize> = HashMap::new();

        for (idx, unit) in units.iter().enumerate() {
            if by_name.insert(unit.name.to_lowercase(), idx).is_some() {
                return Err(RegistryError::DuplicateName(unit.name.clone()));
            }
            by_id.insert(unit.id, idx);
            if unit.is_base_unit {
                if let Some(&first) = base_by_dimension.get(&unit.dimension) {
                    return Err(RegistryError::DuplicateBaseUnit {
                        dimension: unit.dimension,
                        first: units[first].name.clone(),
                        second: unit.name.clone(),
                    });
                }
                base_by_dimension.insert(unit.dimension, idx);
            }
        }

        for dimension in Dimension::ALL {
            if !base_by_dimension.contains_key(&dimension) {
                return Err(RegistryError::MissingBaseUnit(dimension));
            }
        }

        for unit in &units {
            if unit.is_base_unit {
                if unit.base_unit_id.is_some() {
                    return Err(RegistryError::BaseWithReference(unit.name.clone()));
                }
                continue;
            }
            let base_unit_id = unit
                .base_unit_id
                .ok_or_else(|| RegistryError::MissingBaseReference(unit.name.clone()))?;
            let factor = unit
                .conversion_factor
                .ok_or_else(|| RegistryError::MissingFactor(unit.name.clone()))?;
            if !factor.is_finite() || factor <= 0.0 {
                return Err(RegistryError::InvalidFactor {
                    unit: unit.name.clone(),
                    factor,
                });
            }
            let target = by_id
                .get(&base_unit_id)
                .map(|&i| &units[i])
                .ok_or_else(|| RegistryError::DanglingReference {
                    unit: unit.name.clone(),
                    base_unit_id,
                })?;
            if !target.is_base_unit {
                return Err(RegistryError::ChainedReference {
                    unit: unit.name.clone(),
                    target: target.name.clone(),
                });
            }
            if target.dimension != unit.dimension {
                return Err(RegistryError::DimensionMismatch {
                    unit: unit.name.clone(),
                    dimension: unit.dimension,
                    target: target.name.clone(),
                    target_dimension: target.dimension,
                });
            }
        }

        Ok(Self {
            units,
            by_name,
            by_id,
            base_by_dimension,
        })
    }

    pub fn standard() -> Result<Self, RegistryError> {
        Self::new(standard_units())
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Unit> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.units[i])
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Unit> {
        self.by_id.get(&id).map(|&i| &self.units[i])
    }

    #[must_use]
    pub fn base_unit(&self, dimension: Dimension) -> Option<&Unit> {
        self.base_by_dimension
            .get(&dimension)
            .map(|&i| &self.units[i])
    }

    #[must_use]
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Express `amount` of `unit` in its dimension's base unit. One hop, never more.
    #[must_use]
    pub fn to_canonical<'a>(&'a self, amount: f64, unit: &'a Unit) -> (f64, &'a Unit) {
        if unit.is_base_unit {
            return (amount, unit);
        }
        match (unit.base_unit_id.and_then(|id| self.get(id)), unit.conversion_factor) {
            (Some(base), Some(factor)) => (amount * factor, base),
            _ => (amount, unit),
        }
    }

    /// Convert between any two registered units. Mass and volume convert into
    /// each other only when a density in g/ml is supplied.
    pub fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        density_g_per_ml: Option<f64>,
    ) -> Result<Conversion> {
        let Some(from_unit) = self.lookup(from) else {
            bail!("Unknown unit: {from}");
        };
        let Some(to_unit) = self.lookup(to) else {
            bail!("Unknown unit: {to}");
        };

        if from_unit.id == to_unit.id {
            return Ok(Conversion {
                amount,
                unit: to_unit.name.clone(),
                original_amount: amount,
                original_unit: from_unit.name.clone(),
                factor: 1.0,
                density_g_per_ml: None,
            });
        }

        if from_unit.dimension == to_unit.dimension {
            let factor = from_unit.factor_to_base() / to_unit.factor_to_base();
            return Ok(Conversion {
                amount: amount * factor,
                unit: to_unit.name.clone(),
                original_amount: amount,
                original_unit: from_unit.name.clone(),
                factor,
                density_g_per_ml: None,
            });
        }

        let density = match (from_unit.dimension, to_unit.dimension, density_g_per_ml) {
            (Dimension::Mass, Dimension::Volume, Some(d))
            | (Dimension::Volume, Dimension::Mass, Some(d))
                if d > 0.0 =>
            {
                d
            }
            (Dimension::Mass, Dimension::Volume, _) | (Dimension::Volume, Dimension::Mass, _) => {
                bail!(
                    "Cannot convert {} to {} without ingredient density",
                    from_unit.name,
                    to_unit.name
                )
            }
            _ => bail!(
                "Cannot convert {} ({}) to {} ({})",
                from_unit.name,
                from_unit.dimension,
                to_unit.name,
                to_unit.dimension
            ),
        };

        // grams <-> milliliters through the density, then out of the target's base
        let factor = if from_unit.dimension == Dimension::Mass {
            from_unit.factor_to_base() / density / to_unit.factor_to_base()
        } else {
            from_unit.factor_to_base() * density / to_unit.factor_to_base()
        };

        Ok(Conversion {
            amount: amount * factor,
            unit: to_unit.name.clone(),
            original_amount: amount,
            original_unit: from_unit.name.clone(),
            factor,
            density_g_per_ml: Some(density),
        })
    }

    /// Re-express `amount` of `unit` in the unit system `system` ("metric",
    /// "imperial" or "us"). Amounts already in that system come back unchanged.
    ///
    /// Metric targets use the base unit below 1000 of it and the thousandfold
    /// unit (kilogram, liter) from there on. Other systems pick the unit whose
    /// size is closest to the amount, so 100 ml becomes about 0.42 cup rather
    /// than 3.4 fl oz.
    pub fn convert_to_system(&self, amount: f64, unit: &str, system: &str) -> Result<Conversion> {
        let system = system.trim().to_lowercase();
        if !UNIT_SYSTEMS.contains(&system.as_str()) {
            bail!(
                "Unknown unit system: {system} (expected one of {})",
                UNIT_SYSTEMS.join(", ")
            );
        }
        let Some(from_unit) = self.lookup(unit) else {
            bail!("Unknown unit: {unit}");
        };
        if from_unit.system == system {
            return self.convert(amount, &from_unit.name, &from_unit.name, None);
        }

        let base_amount = amount * from_unit.factor_to_base();
        let candidates: Vec<&Unit> = self
            .units
            .iter()
            .filter(|u| u.system == system && u.dimension == from_unit.dimension)
            .collect();

        let target = if system == "metric" {
            let base = candidates.iter().find(|u| u.is_base_unit);
            let thousandfold = candidates
                .iter()
                .find(|u| (u.factor_to_base() - 1000.0).abs() < f64::EPSILON);
            match (base, thousandfold) {
                (_, Some(big)) if base_amount.abs() >= 1000.0 => Some(*big),
                (Some(base), _) => Some(*base),
                (None, big) => big.copied(),
            }
        } else {
            candidates.iter().copied().min_by(|a, b| {
                let da = (base_amount / a.factor_to_base() - 1.0).abs();
                let db = (base_amount / b.factor_to_base() - 1.0).abs();
                da.total_cmp(&db)
            })
        };

        let Some(target) = target else {
            bail!("No {} units available in {system} system", from_unit.dimension);
        };
        self.convert(amount, &from_unit.name, &target.name, None)
    }

    /// Format an amount for display: trimmed decimals plus the unit abbreviation,
    /// or the raw unit string when it is not registered.
    #[must_use]
    pub fn format_amount(&self, amount: f64, unit: &str, precision: usize) -> String {
        let formatted = format!("{amount:.precision$}");
        let formatted = if formatted.contains('.') {
            formatted.trim_end_matches('0').trim_end_matches('.')
        } else {
            formatted.as_str()
        };
        let formatted = if formatted == "-0" { "0" } else { formatted };
        let abbreviation = self.lookup(unit).map_or(unit, |u| u.abbreviation.as_str());
        format!("{formatted} {abbreviation}")
    }
}

/// Reject scale factors that would not produce a meaningful recipe.
pub fn validate_scale_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor <= 0.0 {
        bail!("Scale factor must be a positive number, got {factor}");
    }
    Ok(())
}

/// Scale an amount and round it the way recipes are displayed: two decimals
/// below 1, one decimal below 10, whole numbers above.
#[must_use]
pub fn scale_amount(amount: f64, factor: f64) -> f64 {
    let scaled = amount * factor;
    let magnitude = scaled.abs();
    if magnitude < 1.0 {
        (scaled * 100.0).round() / 100.0
    } else if magnitude < 10.0 {
        (scaled * 10.0).round() / 10.0
    } else {
        scaled.round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn unit(id: i64, name: &str, dimension: Dimension, base: Option<(i64, f64)>) -> Unit {
        Unit {
            id,
            name: name.to_string(),
            abbreviation: name.to_string(),
            dimension,
            system: "metric".to_string(),
            is_base_unit: base.is_none(),
            base_unit_id: base.map(|(id, _)| id),
            conversion_factor: base.map(|(_, f)| f),
        }
    }

    fn minimal_units() -> Vec<Unit> {
        vec![
            unit(1, "gram", Dimension::Mass, None),
            unit(2, "milliliter", Dimension::Volume, None),
            unit(3, "piece", Dimension::Count, None),
        ]
    }

    #[test]
    fn test_standard_registry_is_valid() {
        let registry = UnitRegistry::standard().unwrap();
        assert_eq!(registry.units().len(), STANDARD_UNITS.len());
        assert_eq!(registry.base_unit(Dimension::Mass).unwrap().name, "gram");
        assert_eq!(
            registry.base_unit(Dimension::Volume).unwrap().name,
            "milliliter"
        );
        assert_eq!(registry.base_unit(Dimension::Count).unwrap().name, "piece");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = UnitRegistry::standard().unwrap();
        assert_eq!(registry.lookup("Cup").unwrap().name, "cup");
        assert_eq!(registry.lookup(" fluid ounce ").unwrap().name, "fluid ounce");
        assert!(registry.lookup("xyzzy").is_none());
    }

    #[test]
    fn test_to_canonical_base_unit_is_identity() {
        let registry = UnitRegistry::standard().unwrap();
        let gram = registry.lookup("gram").unwrap();
        let (amount, canonical) = registry.to_canonical(125.0, gram);
        assert!((amount - 125.0).abs() < EPS);
        assert_eq!(canonical.name, "gram");
    }

    #[test]
    fn test_to_canonical_every_non_base_unit_is_one_hop() {
        let registry = UnitRegistry::standard().unwrap();
        for u in registry.units().iter().filter(|u| !u.is_base_unit) {
            let (amount, base) = registry.to_canonical(1.0, u);
            assert!((amount - u.conversion_factor.unwrap()).abs() < EPS, "{}", u.name);
            assert!(base.is_base_unit);
            assert_eq!(base.dimension, u.dimension);
        }
    }

    #[test]
    fn test_missing_base_unit_rejected() {
        let units = vec![
            unit(1, "gram", Dimension::Mass, None),
            unit(2, "milliliter", Dimension::Volume, None),
        ];
        assert_eq!(
            UnitRegistry::new(units).unwrap_err(),
            RegistryError::MissingBaseUnit(Dimension::Count)
        );
    }

    #[test]
    fn test_duplicate_base_unit_rejected() {
        let mut units = minimal_units();
        units.push(unit(4, "liter", Dimension::Volume, None));
        assert!(matches!(
            UnitRegistry::new(units).unwrap_err(),
            RegistryError::DuplicateBaseUnit {
                dimension: Dimension::Volume,
                ..
            }
        ));
    }

    #[test]
    fn test_chained_reference_rejected() {
        let mut units = minimal_units();
        units.push(unit(4, "kilogram", Dimension::Mass, Some((1, 1000.0))));
        units.push(unit(5, "tonne", Dimension::Mass, Some((4, 1000.0))));
        assert_eq!(
            UnitRegistry::new(units).unwrap_err(),
            RegistryError::ChainedReference {
                unit: "tonne".to_string(),
                target: "kilogram".to_string(),
            }
        );
    }

    #[test]
    fn test_dangling_and_mismatched_references_rejected() {
        let mut dangling = minimal_units();
        dangling.push(unit(4, "kilogram", Dimension::Mass, Some((99, 1000.0))));
        assert!(matches!(
            UnitRegistry::new(dangling).unwrap_err(),
            RegistryError::DanglingReference { base_unit_id: 99, .. }
        ));

        let mut mismatched = minimal_units();
        mismatched.push(unit(4, "cup", Dimension::Volume, Some((1, 236.588))));
        assert!(matches!(
            UnitRegistry::new(mismatched).unwrap_err(),
            RegistryError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn test_missing_or_bad_factor_rejected() {
        let mut units = minimal_units();
        let mut kilo = unit(4, "kilogram", Dimension::Mass, Some((1, 1000.0)));
        kilo.conversion_factor = None;
        units.push(kilo);
        assert_eq!(
            UnitRegistry::new(units).unwrap_err(),
            RegistryError::MissingFactor("kilogram".to_string())
        );

        let mut units = minimal_units();
        units.push(unit(4, "kilogram", Dimension::Mass, Some((1, 0.0))));
        assert!(matches!(
            UnitRegistry::new(units).unwrap_err(),
            RegistryError::InvalidFactor { .. }
        ));
    }

    #[test]
    fn test_base_unit_with_reference_rejected() {
        let mut units = minimal_units();
        units[0].base_unit_id = Some(2);
        assert_eq!(
            UnitRegistry::new(units).unwrap_err(),
            RegistryError::BaseWithReference("gram".to_string())
        );
    }

    #[test]
    fn test_convert_same_dimension() {
        let registry = UnitRegistry::standard().unwrap();

        let c = registry.convert(1000.0, "gram", "kilogram", None).unwrap();
        assert!((c.amount - 1.0).abs() < EPS);
        assert_eq!(c.unit, "kilogram");

        let c = registry.convert(2.0, "deciliter", "milliliter", None).unwrap();
        assert!((c.amount - 200.0).abs() < EPS);

        let c = registry.convert(3.0, "teaspoon", "tablespoon", None).unwrap();
        assert!((c.amount - 1.0).abs() < 0.01);

        let c = registry.convert(16.0, "ounce", "pound", None).unwrap();
        assert!((c.amount - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_convert_same_unit() {
        let registry = UnitRegistry::standard().unwrap();
        let c = registry.convert(5.0, "gram", "gram", None).unwrap();
        assert!((c.amount - 5.0).abs() < EPS);
        assert!((c.factor - 1.0).abs() < EPS);
    }

    #[test]
    fn test_convert_volume_to_mass_with_density() {
        let registry = UnitRegistry::standard().unwrap();
        // 1 cup of flour at 0.593 g/ml
        let c = registry.convert(1.0, "cup", "gram", Some(0.593)).unwrap();
        assert!((c.amount - 236.588 * 0.593).abs() < 1e-6);
        assert_eq!(c.density_g_per_ml, Some(0.593));

        let back = registry.convert(c.amount, "gram", "cup", Some(0.593)).unwrap();
        assert!((back.amount - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_convert_requires_density_across_dimensions() {
        let registry = UnitRegistry::standard().unwrap();
        let err = registry.convert(1.0, "cup", "gram", None).unwrap_err();
        assert!(err.to_string().contains("density"));
        assert!(registry.convert(1.0, "piece", "gram", Some(1.0)).is_err());
        assert!(registry.convert(1.0, "xyzzy", "gram", None).is_err());
    }

    #[test]
    fn test_convert_to_system_picks_closest_unit() {
        let registry = UnitRegistry::standard().unwrap();

        let c = registry.convert_to_system(100.0, "milliliter", "us").unwrap();
        assert_eq!(c.unit, "cup");
        assert!((c.amount - 100.0 / 236.588).abs() < 1e-9);

        let c = registry.convert_to_system(500.0, "milliliter", "us").unwrap();
        assert_eq!(c.unit, "pint");
        assert!((c.amount - 500.0 / 473.176).abs() < 1e-9);

        let c = registry.convert_to_system(30.0, "gram", "imperial").unwrap();
        assert_eq!(c.unit, "ounce");

        let c = registry.convert_to_system(2000.0, "gram", "imperial").unwrap();
        assert_eq!(c.unit, "pound");
        assert!((c.amount - 2000.0 / 453.592).abs() < 1e-9);
    }

    #[test]
    fn test_convert_to_system_metric_uses_base_or_thousandfold() {
        let registry = UnitRegistry::standard().unwrap();

        let c = registry.convert_to_system(2.0, "cup", "metric").unwrap();
        assert_eq!(c.unit, "milliliter");
        assert!((c.amount - 473.176).abs() < 1e-9);

        let c = registry.convert_to_system(1.0, "gallon", "metric").unwrap();
        assert_eq!(c.unit, "liter");
        assert!((c.amount - 3.78541).abs() < 1e-9);

        let c = registry.convert_to_system(3.0, "pound", "metric").unwrap();
        assert_eq!(c.unit, "kilogram");

        let c = registry.convert_to_system(4.0, "ounce", "Metric").unwrap();
        assert_eq!(c.unit, "gram");
    }

    #[test]
    fn test_convert_to_system_same_system_is_identity() {
        let registry = UnitRegistry::standard().unwrap();
        let c = registry.convert_to_system(20.0, "teaspoon", "us").unwrap();
        assert_eq!(c.unit, "teaspoon");

        let c = registry.convert_to_system(250.0, "gram", "metric").unwrap();
        assert_eq!(c.unit, "gram");
        assert!((c.amount - 250.0).abs() < EPS);
        assert!((c.factor - 1.0).abs() < EPS);
    }

    #[test]
    fn test_convert_to_system_errors() {
        let registry = UnitRegistry::standard().unwrap();
        let err = registry.convert_to_system(3.0, "piece", "us").unwrap_err();
        assert_eq!(err.to_string(), "No count units available in us system");
        assert!(registry.convert_to_system(1.0, "cup", "klingon").is_err());
        assert!(registry.convert_to_system(1.0, "xyzzy", "us").is_err());
        // no us mass units are registered
        assert!(registry.convert_to_system(1.0, "gram", "us").is_err());
    }

    #[test]
    fn test_scale_amount_rounding() {
        assert!((scale_amount(0.333, 1.0) - 0.33).abs() < EPS);
        assert!((scale_amount(1.5, 1.5) - 2.3).abs() < EPS);
        assert!((scale_amount(200.0, 1.337) - 267.0).abs() < EPS);
    }

    #[test]
    fn test_validate_scale_factor() {
        assert!(validate_scale_factor(2.0).is_ok());
        assert!(validate_scale_factor(0.25).is_ok());
        assert!(validate_scale_factor(0.0).is_err());
        assert!(validate_scale_factor(-1.0).is_err());
        assert!(validate_scale_factor(f64::NAN).is_err());
        assert!(validate_scale_factor(f64::INFINITY).is_err());
    }

    #[test]
    fn test_format_amount() {
        let registry = UnitRegistry::standard().unwrap();
        assert_eq!(registry.format_amount(250.0, "milliliter", 2), "250 ml");
        assert_eq!(registry.format_amount(1.50, "cup", 2), "1.5 cup");
        assert_eq!(registry.format_amount(0.125, "teaspoon", 2), "0.13 tsp");
        assert_eq!(registry.format_amount(3.0, "handful", 1), "3 handful");
    }
}
