use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::models::Unit;
use crate::unit_normalizer::normalize_unit;
use crate::units::{RegistryError, UnitRegistry};

/// Canonical and display values for one raw amount/unit pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalAmount {
    pub canonical_amount: f64,
    pub canonical_unit_id: i64,
    pub canonical_unit: String,
    pub display_amount: f64,
    /// `None` when the unit string did not resolve to a registered unit.
    pub display_unit_id: Option<i64>,
    pub display_unit: String,
}

impl CanonicalAmount {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.display_unit_id.is_some()
    }
}

/// Converts raw amounts into each dimension's base unit. Unknown units fall back
/// to the default count unit with the amount left alone.
#[derive(Debug, Clone)]
pub struct AmountCanonicalizer {
    registry: UnitRegistry,
    default_unit: Unit,
}

impl AmountCanonicalizer {
    pub fn new(registry: UnitRegistry, default_unit: &str) -> Result<Self, RegistryError> {
        let default_unit = registry
            .lookup(default_unit)
            .cloned()
            .ok_or_else(|| RegistryError::MissingDefaultUnit(default_unit.to_string()))?;
        Ok(Self {
            registry,
            default_unit,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    #[must_use]
    pub fn default_unit(&self) -> &Unit {
        &self.default_unit
    }

    #[must_use]
    pub fn canonicalize(&self, amount: f64, raw_unit: &str) -> CanonicalAmount {
        let normalized = normalize_unit(raw_unit);
        match self.registry.lookup(&normalized) {
            Some(unit) => {
                let (canonical_amount, canonical_unit) = self.registry.to_canonical(amount, unit);
                CanonicalAmount {
                    canonical_amount,
                    canonical_unit_id: canonical_unit.id,
                    canonical_unit: canonical_unit.name.clone(),
                    display_amount: amount,
                    display_unit_id: Some(unit.id),
                    display_unit: unit.name.clone(),
                }
            }
            None => {
                debug!(unit = %normalized, "unit did not resolve, using default");
                let fallback = self.default_unit();
                CanonicalAmount {
                    canonical_amount: amount,
                    canonical_unit_id: fallback.id,
                    canonical_unit: fallback.name.clone(),
                    display_amount: amount,
                    display_unit_id: None,
                    display_unit: normalized,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountIssue {
    EmptyAmount,
    ParseError(String),
    CommaDecimalSeparator,
    CommaThousandsSeparator,
    EuropeanDecimalFormat,
    DivisionByZero,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedAmount {
    pub value: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<AmountIssue>,
}

impl ParsedAmount {
    fn clean(value: f64) -> Self {
        Self {
            value,
            issues: Vec::new(),
        }
    }

    fn failed(issue: AmountIssue) -> Self {
        Self {
            value: 0.0,
            issues: vec![issue],
        }
    }
}

static MIXED_FRACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(\d+)\s*/\s*(\d+)$").expect("mixed fraction pattern should be valid")
});

static SIMPLE_FRACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*/\s*(\d+)$").expect("fraction pattern should be valid")
});

fn vulgar_fraction(c: char) -> Option<f64> {
    let v = match c {
        '½' => 1.0 / 2.0,
        '⅓' => 1.0 / 3.0,
        '⅔' => 2.0 / 3.0,
        '¼' => 1.0 / 4.0,
        '¾' => 3.0 / 4.0,
        '⅕' => 1.0 / 5.0,
        '⅖' => 2.0 / 5.0,
        '⅗' => 3.0 / 5.0,
        '⅘' => 4.0 / 5.0,
        '⅙' => 1.0 / 6.0,
        '⅚' => 5.0 / 6.0,
        '⅛' => 1.0 / 8.0,
        '⅜' => 3.0 / 8.0,
        '⅝' => 5.0 / 8.0,
        '⅞' => 7.0 / 8.0,
        _ => return None,
    };
    Some(v)
}

fn ratio(numerator: &str, denominator: &str) -> Option<f64> {
    let n: f64 = numerator.parse().ok()?;
    let d: f64 = denominator.parse().ok()?;
    (d != 0.0).then(|| n / d)
}

/// Parse an amount as written in recipe text.
///
/// Never fails: input that cannot be read yields 0 plus an issue describing why.
#[must_use]
pub fn parse_amount(raw: &str) -> ParsedAmount {
    let input = raw.trim().to_lowercase();
    if input.is_empty() {
        return ParsedAmount::failed(AmountIssue::EmptyAmount);
    }

    let last = input.chars().last();
    if let Some((last, fraction)) = last.and_then(|c| vulgar_fraction(c).map(|f| (c, f))) {
        let whole = input[..input.len() - last.len_utf8()].trim();
        if whole.is_empty() {
            return ParsedAmount::clean(fraction);
        }
        return match whole.parse::<u32>() {
            Ok(w) => ParsedAmount::clean(f64::from(w) + fraction),
            Err(_) => ParsedAmount::failed(AmountIssue::ParseError(raw.trim().to_string())),
        };
    }

    if let Some(caps) = MIXED_FRACTION.captures(&input) {
        let Ok(whole) = caps[1].parse::<f64>() else {
            return ParsedAmount::failed(AmountIssue::ParseError(raw.trim().to_string()));
        };
        return match ratio(&caps[2], &caps[3]) {
            Some(fraction) => ParsedAmount::clean(whole + fraction),
            None => ParsedAmount::failed(AmountIssue::DivisionByZero),
        };
    }
    if let Some(caps) = SIMPLE_FRACTION.captures(&input) {
        return match ratio(&caps[1], &caps[2]) {
            Some(value) => ParsedAmount::clean(value),
            None => ParsedAmount::failed(AmountIssue::DivisionByZero),
        };
    }

    let mut cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    let mut issues = Vec::new();

    if cleaned.contains(',') && cleaned.contains('.') {
        cleaned = cleaned.replace('.', "").replace(',', ".");
        issues.push(AmountIssue::EuropeanDecimalFormat);
    } else if cleaned.contains(',') {
        let mut parts = cleaned.split(',');
        let decimal_like = cleaned.matches(',').count() == 1
            && parts.nth(1).is_some_and(|frac| frac.len() <= 2);
        if decimal_like {
            cleaned = cleaned.replace(',', ".");
            issues.push(AmountIssue::CommaDecimalSeparator);
        } else {
            cleaned = cleaned.replace(',', "");
            issues.push(AmountIssue::CommaThousandsSeparator);
        }
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            if value < 0.0 {
                issues.push(AmountIssue::Negative);
            }
            ParsedAmount { value, issues }
        }
        _ => ParsedAmount::failed(AmountIssue::ParseError(raw.trim().to_string())),
    }
}
