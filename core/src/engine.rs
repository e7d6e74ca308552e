use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::{AmountCanonicalizer, CanonicalAmount};
use crate::classifier::Classifier;
use crate::db::Database;
use crate::models::{Classification, IngredientCategory, Unit};
use crate::name_normalizer::normalize_name;
use crate::unit_normalizer::normalize_unit;
use crate::units::UnitRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Unit given to amounts whose unit string does not resolve.
    pub default_unit: String,
    /// Language tag stored on new canonical ingredients.
    pub source_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_unit: "piece".to_string(),
            source_language: "en".to_string(),
        }
    }
}

/// Immutable bundle of everything a row needs: registry, normalizers and
/// classifier. Built once at startup and shared.
#[derive(Debug, Clone)]
pub struct Engine {
    canonicalizer: AmountCanonicalizer,
    classifier: Classifier,
    config: EngineConfig,
}

impl Engine {
    /// Validates the unit graph before anything else runs. A broken registry is
    /// fatal here rather than halfway through a pass.
    pub fn new(
        units: Vec<Unit>,
        categories: &[IngredientCategory],
        config: EngineConfig,
    ) -> Result<Self> {
        let registry = UnitRegistry::new(units).context("Invalid unit registry")?;
        let classifier = Classifier::new(categories, &registry)?;
        let canonicalizer = AmountCanonicalizer::new(registry, &config.default_unit)
            .context("Invalid engine configuration")?;
        Ok(Self {
            canonicalizer,
            classifier,
            config,
        })
    }

    pub fn from_database(db: &Database, config: EngineConfig) -> Result<Self> {
        let units = db.list_units()?;
        let categories = db.list_categories()?;
        let engine = Self::new(units, &categories, config)?;
        debug!(
            units = engine.registry().units().len(),
            categories = categories.len(),
            "engine ready"
        );
        Ok(engine)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &UnitRegistry {
        self.canonicalizer.registry()
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    #[must_use]
    pub fn normalize_name(&self, raw: &str) -> String {
        normalize_name(raw)
    }

    #[must_use]
    pub fn normalize_unit(&self, raw: &str) -> String {
        normalize_unit(raw)
    }

    #[must_use]
    pub fn canonicalize(&self, amount: f64, raw_unit: &str) -> CanonicalAmount {
        self.canonicalizer.canonicalize(amount, raw_unit)
    }

    #[must_use]
    pub fn classify(&self, name: &str) -> Classification {
        self.classifier.classification(name)
    }
}
