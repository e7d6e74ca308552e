use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, warn};

use crate::db::Database;
use crate::engine::Engine;
use crate::migration::build_link;
use crate::models::{
    CanonicalIngredient, NewRawIngredient, RawIngredientRow, RecipeIngredientLink,
    validate_new_raw_ingredient,
};

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub raw: RawIngredientRow,
    pub ingredient: CanonicalIngredient,
    pub ingredient_created: bool,
    pub link: RecipeIngredientLink,
    pub unit_resolved: bool,
}

/// Store one raw row and canonicalize it right away.
///
/// The raw row, its canonical ingredient and its link are written in one
/// transaction. Concurrent callers creating the same ingredient end up with a
/// single row because the name is UNIQUE in storage.
pub fn ingest_row(db: &Database, engine: &Engine, raw: &NewRawIngredient) -> Result<IngestOutcome> {
    validate_new_raw_ingredient(raw)?;
    let name = engine.normalize_name(&raw.raw_name);
    if name.is_empty() {
        bail!("Ingredient name '{}' is empty after normalization", raw.raw_name);
    }

    let tx = db.begin()?;
    let stored = db.insert_raw_ingredient(raw)?;
    let (ingredient, created) =
        db.insert_canonical_ingredient_if_absent(&name, &engine.config().source_language)?;
    if created {
        db.set_classification(ingredient.id, &engine.classify(&ingredient.name))?;
    }

    let amount = engine.canonicalize(stored.raw_amount, &stored.raw_unit);
    if !amount.is_resolved() {
        warn!(unit = %amount.display_unit, raw_id = stored.id, "unit did not resolve");
    }
    let link = db.replace_link(&build_link(&stored, ingredient.id, &amount))?;
    let ingredient = db.get_canonical_ingredient(ingredient.id)?;
    tx.commit().context("Failed to commit ingested row")?;

    debug!(raw_id = stored.id, name = %ingredient.name, created, "ingested row");
    Ok(IngestOutcome {
        raw: stored,
        ingredient,
        ingredient_created: created,
        link,
        unit_resolved: amount.is_resolved(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    fn setup() -> (Database, Engine) {
        let db = Database::open_in_memory().unwrap();
        let engine = Engine::from_database(&db, EngineConfig::default()).unwrap();
        (db, engine)
    }

    fn raw(name: &str, amount: f64, unit: &str) -> NewRawIngredient {
        NewRawIngredient {
            recipe_id: "carbonara".to_string(),
            raw_name: name.to_string(),
            raw_amount: amount,
            raw_unit: unit.to_string(),
            notes: None,
            position: 1,
            is_optional: false,
        }
    }

    #[test]
    fn test_ingest_creates_and_classifies() {
        let (db, engine) = setup();
        let outcome = ingest_row(&db, &engine, &raw("Diced Pancetta", 150.0, "g")).unwrap();
        assert!(outcome.ingredient_created);
        assert!(outcome.unit_resolved);
        assert_eq!(outcome.ingredient.name, "Pancetta");
        assert_eq!(outcome.ingredient.category_name.as_deref(), Some("Proteins"));
        assert_eq!(outcome.link.raw_ingredient_id, outcome.raw.id);
        assert_eq!(outcome.link.display_unit_text, "gram");
    }

    #[test]
    fn test_second_ingest_reuses_ingredient() {
        let (db, engine) = setup();
        let first = ingest_row(&db, &engine, &raw("Eggs", 3.0, "")).unwrap();
        let second = ingest_row(&db, &engine, &raw("large eggs", 2.0, "pcs")).unwrap();
        assert!(!second.ingredient_created);
        assert_eq!(first.ingredient.id, second.ingredient.id);
        assert_eq!(db.count_canonical_ingredients().unwrap(), 1);
        assert_eq!(db.get_links_for_recipe("carbonara").unwrap().len(), 2);
    }

    #[test]
    fn test_unresolved_unit_is_reported() {
        let (db, engine) = setup();
        let outcome = ingest_row(&db, &engine, &raw("Pecorino", 1.0, "xyzzy")).unwrap();
        assert!(!outcome.unit_resolved);
        assert_eq!(outcome.link.canonical_unit_name.as_deref(), Some("piece"));
        assert_eq!(outcome.link.display_unit_text, "xyzzy");
    }

    #[test]
    fn test_empty_name_is_rejected_without_writing() {
        let (db, engine) = setup();
        assert!(ingest_row(&db, &engine, &raw("Fresh", 1.0, "g")).is_err());
        assert!(ingest_row(&db, &engine, &raw("", 1.0, "g")).is_err());
        assert_eq!(db.count_raw_ingredients().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_ingest_of_name_variants_shares_one_ingredient() {
        use std::sync::{Arc, Mutex, PoisonError};
        use std::thread;

        const THREADS: i64 = 9;
        let (db, engine) = setup();
        let db = Arc::new(Mutex::new(db));
        let engine = Arc::new(engine);
        let names = ["tomatoes", "Fresh Tomatoes", "2 Tomatoes"];

        let handles: Vec<_> = (0..THREADS)
            .zip(names.iter().cycle())
            .map(|(i, name)| {
                let db = Arc::clone(&db);
                let engine = Arc::clone(&engine);
                let mut row = raw(name, 1.0, "pcs");
                row.recipe_id = format!("salad-{}", i % 3);
                row.position = i;
                thread::spawn(move || {
                    let db = db.lock().unwrap_or_else(PoisonError::into_inner);
                    ingest_row(&db, &engine, &row).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<IngestOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outcomes.iter().filter(|o| o.ingredient_created).count(), 1);
        assert!(outcomes.iter().all(|o| o.ingredient.name == "Tomatoes"));

        let db = db.lock().unwrap();
        assert_eq!(db.count_canonical_ingredients().unwrap(), 1);
        assert_eq!(db.count_raw_ingredients().unwrap(), THREADS);
        assert_eq!(db.count_links().unwrap(), THREADS);
        assert_eq!(
            db.count_links_for_ingredient(outcomes[0].ingredient.id).unwrap(),
            THREADS
        );
    }

    #[test]
    fn test_ingest_then_migrate_agrees() {
        let (db, engine) = setup();
        ingest_row(&db, &engine, &raw("Black Pepper", 1.0, "tsp")).unwrap();
        let report = crate::migration::run_migration(&db, &engine, false).unwrap();
        assert_eq!(report.canonical_ingredients_created, 0);
        assert_eq!(report.links_created, 1);
        assert_eq!(db.count_links().unwrap(), 1);
    }
}
