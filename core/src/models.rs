use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::units::scale_amount;

/// Measurement dimension. Every unit belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Mass,
    Volume,
    Count,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Mass, Dimension::Volume, Dimension::Count];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Mass => "mass",
            Dimension::Volume => "volume",
            Dimension::Count => "count",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mass" => Ok(Dimension::Mass),
            "volume" => Ok(Dimension::Volume),
            "count" => Ok(Dimension::Count),
            _ => bail!("Invalid dimension '{s}'. Must be one of: mass, volume, count"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    pub dimension: Dimension,
    pub system: String,
    pub is_base_unit: bool,
    pub base_unit_id: Option<i64>,
    pub conversion_factor: Option<f64>,
}

impl Unit {
    /// Quantity of the dimension's base unit equal to one of this unit.
    #[must_use]
    pub fn factor_to_base(&self) -> f64 {
        if self.is_base_unit {
            1.0
        } else {
            self.conversion_factor.unwrap_or(1.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientCategory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalIngredient {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    pub source_language: String,
    pub category_id: Option<i64>,
    pub density_g_per_ml: Option<f64>,
    pub default_unit_id: Option<i64>,
    pub is_active: bool,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    // Joined fields for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_unit_name: Option<String>,
}

/// A source ingredient line as the surrounding application stored it.
/// The engine only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIngredientRow {
    pub id: i64,
    pub recipe_id: String,
    pub raw_name: String,
    pub raw_amount: f64,
    pub raw_unit: String,
    pub notes: Option<String>,
    pub position: i64,
    pub is_optional: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRawIngredient {
    pub recipe_id: String,
    pub raw_name: String,
    pub raw_amount: f64,
    #[serde(default)]
    pub raw_unit: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub is_optional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredientLink {
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    pub recipe_id: String,
    pub raw_ingredient_id: i64,
    pub canonical_ingredient_id: i64,
    pub canonical_amount: f64,
    pub canonical_unit_id: i64,
    pub display_amount: f64,
    pub display_unit_id: Option<i64>,
    /// Normalized unit string, kept even when it did not resolve to a unit.
    pub display_unit_text: String,
    pub notes: Option<String>,
    pub position: i64,
    pub is_optional: bool,
    pub created_at: String,
    // Joined fields for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_unit_name: Option<String>,
    /// Set only on scaled copies, never on stored links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_factor: Option<f64>,
}

impl RecipeIngredientLink {
    /// Copy with display and canonical amounts multiplied by `factor` and
    /// rounded for display.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            canonical_amount: scale_amount(self.canonical_amount, factor),
            display_amount: scale_amount(self.display_amount, factor),
            scale_factor: Some(factor),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRecipeIngredientLink {
    pub recipe_id: String,
    pub raw_ingredient_id: i64,
    pub canonical_ingredient_id: i64,
    pub canonical_amount: f64,
    pub canonical_unit_id: i64,
    pub display_amount: f64,
    pub display_unit_id: Option<i64>,
    pub display_unit_text: String,
    pub notes: Option<String>,
    pub position: i64,
    pub is_optional: bool,
}

/// Category, density and default unit assigned to one canonical ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Classification {
    pub category_id: Option<i64>,
    pub density_g_per_ml: Option<f64>,
    pub default_unit_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedUnit {
    pub unit: String,
    pub count: usize,
}

/// Reconciliation report produced by a migration pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub source_rows: usize,
    pub canonical_ingredients_created: usize,
    pub links_created: usize,
    pub unresolved_display_units: usize,
    pub skipped_empty_names: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_units: Vec<UnresolvedUnit>,
}

impl MigrationReport {
    /// Every source row either produced a link or was skipped for an empty name.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.source_rows == self.links_created + self.skipped_empty_names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRun {
    pub id: i64,
    pub started_at: String,
    pub finished_at: String,
    pub source_rows: i64,
    pub canonical_ingredients_created: i64,
    pub links_created: i64,
    pub unresolved_display_units: i64,
    pub skipped_empty_names: i64,
    #[serde(default)]
    pub unresolved_units: Vec<UnresolvedUnit>,
}

/// Reject raw rows the storage layer cannot hold meaningfully.
pub fn validate_new_raw_ingredient(row: &NewRawIngredient) -> Result<()> {
    if row.recipe_id.trim().is_empty() {
        bail!("recipe_id must not be empty");
    }
    if row.raw_name.trim().is_empty() {
        bail!("Ingredient name must not be empty");
    }
    if !row.raw_amount.is_finite() {
        bail!("Amount must be a finite number");
    }
    if row.position < 0 {
        bail!("Position must not be negative");
    }
    Ok(())
}
