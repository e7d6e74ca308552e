use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

/// Unit used for lines that carry no unit at all ("2 eggs").
pub const EMPTY_UNIT: &str = "piece";

/// Alias → registry unit name. Keys are already lower-cased, period-free and
/// single-spaced, which is the form `clean` produces.
const ALIASES: &[(&str, &str)] = &[
    // mass
    ("g", "gram"),
    ("gr", "gram"),
    ("gm", "gram"),
    ("gram", "gram"),
    ("gramme", "gram"),
    ("kg", "kilogram"),
    ("kilo", "kilogram"),
    ("kilogram", "kilogram"),
    ("kilogramme", "kilogram"),
    ("mg", "milligram"),
    ("milligram", "milligram"),
    ("oz", "ounce"),
    ("ounce", "ounce"),
    ("lb", "pound"),
    ("pound", "pound"),
    // volume
    ("ml", "milliliter"),
    ("cc", "milliliter"),
    ("milliliter", "milliliter"),
    ("millilitre", "milliliter"),
    ("l", "liter"),
    ("lt", "liter"),
    ("ltr", "liter"),
    ("liter", "liter"),
    ("litre", "liter"),
    ("dl", "deciliter"),
    ("deciliter", "deciliter"),
    ("decilitre", "deciliter"),
    ("cl", "centiliter"),
    ("centiliter", "centiliter"),
    ("centilitre", "centiliter"),
    ("t", "teaspoon"),
    ("tsp", "teaspoon"),
    ("teaspoon", "teaspoon"),
    ("tbsp", "tablespoon"),
    ("tbs", "tablespoon"),
    ("tbl", "tablespoon"),
    ("tablespoon", "tablespoon"),
    ("c", "cup"),
    ("cup", "cup"),
    ("fl oz", "fluid ounce"),
    ("floz", "fluid ounce"),
    ("fluid ounce", "fluid ounce"),
    ("pt", "pint"),
    ("pint", "pint"),
    ("qt", "quart"),
    ("quart", "quart"),
    ("gal", "gallon"),
    ("gallon", "gallon"),
    // count
    ("pc", "piece"),
    ("pcs", "piece"),
    ("piece", "piece"),
    ("each", "piece"),
    ("ea", "piece"),
    ("item", "piece"),
    ("clove", "piece"),
    ("slice", "piece"),
    ("dozen", "dozen"),
    ("dz", "dozen"),
    ("doz", "dozen"),
    // amounts nobody measures
    ("qb", "piece"),
    ("to taste", "piece"),
    ("as needed", "piece"),
    ("pinch", "piece"),
    ("pinches", "piece"),
    ("dash", "piece"),
    ("dashes", "piece"),
    ("splash", "piece"),
    ("splashes", "piece"),
];

static ALIAS_MAP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| ALIASES.iter().copied().collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitMatch {
    /// The cleaned string is an alias.
    Alias,
    /// Matched after dropping one or more trailing "s".
    Plural,
    /// Not in the alias table; the cleaned string is passed through.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedUnit {
    pub unit: String,
    #[serde(rename = "match")]
    pub kind: UnitMatch,
}

/// Registry key for a raw unit string, or the cleaned string when no alias fits.
#[must_use]
pub fn normalize_unit(raw: &str) -> String {
    normalize_unit_detailed(raw).unit
}

#[must_use]
pub fn normalize_unit_detailed(raw: &str) -> NormalizedUnit {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return NormalizedUnit {
            unit: EMPTY_UNIT.to_string(),
            kind: UnitMatch::Alias,
        };
    }
    if let Some(unit) = ALIAS_MAP.get(cleaned.as_str()) {
        return NormalizedUnit {
            unit: (*unit).to_string(),
            kind: UnitMatch::Alias,
        };
    }

    // "cups" -> "cup", "lbs" -> "lb". Each step drops one byte.
    let mut candidate = cleaned.as_str();
    while let Some(rest) = candidate.strip_suffix('s') {
        if rest.is_empty() {
            break;
        }
        if let Some(unit) = ALIAS_MAP.get(rest) {
            return NormalizedUnit {
                unit: (*unit).to_string(),
                kind: UnitMatch::Plural,
            };
        }
        candidate = rest;
    }

    NormalizedUnit {
        unit: cleaned,
        kind: UnitMatch::Unknown,
    }
}

/// Lower-case, strip periods, collapse whitespace.
fn clean(raw: &str) -> String {
    raw.to_lowercase()
        .replace('.', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
