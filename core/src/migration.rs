use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info, warn};

use crate::amount::CanonicalAmount;
use crate::db::Database;
use crate::engine::Engine;
use crate::models::{MigrationReport, NewRecipeIngredientLink, RawIngredientRow, UnresolvedUnit};

pub(crate) fn build_link(
    row: &RawIngredientRow,
    canonical_ingredient_id: i64,
    amount: &CanonicalAmount,
) -> NewRecipeIngredientLink {
    NewRecipeIngredientLink {
        recipe_id: row.recipe_id.clone(),
        raw_ingredient_id: row.id,
        canonical_ingredient_id,
        canonical_amount: amount.canonical_amount,
        canonical_unit_id: amount.canonical_unit_id,
        display_amount: amount.display_amount,
        display_unit_id: amount.display_unit_id,
        display_unit_text: amount.display_unit.clone(),
        notes: row.notes.clone(),
        position: row.position,
        is_optional: row.is_optional,
    }
}

/// Run a full canonicalization pass over every stored raw ingredient row.
///
/// The pass runs in one transaction: names are normalized, missing canonical
/// ingredients are created, every row gets a fresh link, and every canonical
/// ingredient is reclassified. With `dry_run` the report is computed and the
/// transaction rolled back. A committed pass is recorded in `migration_runs`.
/// Running it twice over the same rows creates no new ingredients.
pub fn run_migration(db: &Database, engine: &Engine, dry_run: bool) -> Result<MigrationReport> {
    let started_at = Local::now().to_rfc3339();
    let tx = db.begin()?;

    let rows = db.list_raw_ingredients()?;
    info!(rows = rows.len(), dry_run, "starting canonicalization pass");

    let mut report = MigrationReport {
        dry_run,
        source_rows: rows.len(),
        ..MigrationReport::default()
    };

    let normalized: Vec<(&RawIngredientRow, String)> = rows
        .iter()
        .map(|row| (row, engine.normalize_name(&row.raw_name)))
        .collect();

    let language = &engine.config().source_language;
    let mut ingredient_ids: HashMap<&str, i64> = HashMap::new();
    for (_, name) in &normalized {
        if name.is_empty() || ingredient_ids.contains_key(name.as_str()) {
            continue;
        }
        let (ingredient, created) = db.insert_canonical_ingredient_if_absent(name, language)?;
        if created {
            debug!(name = %ingredient.name, "created canonical ingredient");
            report.canonical_ingredients_created += 1;
        }
        ingredient_ids.insert(name.as_str(), ingredient.id);
    }

    let mut unresolved: BTreeMap<String, usize> = BTreeMap::new();
    for (row, name) in &normalized {
        if name.is_empty() {
            debug!(raw_id = row.id, raw_name = %row.raw_name, "skipping row with empty name");
            report.skipped_empty_names += 1;
            continue;
        }
        let ingredient_id = *ingredient_ids
            .get(name.as_str())
            .with_context(|| format!("No canonical ingredient for '{name}'"))?;

        let amount = engine.canonicalize(row.raw_amount, &row.raw_unit);
        if !amount.is_resolved() {
            report.unresolved_display_units += 1;
            *unresolved.entry(amount.display_unit.clone()).or_default() += 1;
        }
        db.replace_link(&build_link(row, ingredient_id, &amount))?;
        report.links_created += 1;
    }

    for ingredient in db.list_canonical_ingredients(None)? {
        let classification = engine.classify(&ingredient.name);
        db.set_classification(ingredient.id, &classification)?;
    }

    for (unit, count) in &unresolved {
        warn!(unit = %unit, count, "unit did not resolve");
    }
    report.unresolved_units = unresolved
        .into_iter()
        .map(|(unit, count)| UnresolvedUnit { unit, count })
        .collect();

    if dry_run {
        drop(tx);
        info!(
            links = report.links_created,
            created = report.canonical_ingredients_created,
            "dry run finished, changes rolled back"
        );
    } else {
        db.record_migration_run(&started_at, &report)?;
        tx.commit().context("Failed to commit migration")?;
        info!(
            links = report.links_created,
            created = report.canonical_ingredients_created,
            skipped = report.skipped_empty_names,
            unresolved = report.unresolved_display_units,
            "canonicalization pass committed"
        );
    }

    Ok(report)
}
