use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use uuid::Uuid;

use crate::classifier::CATEGORY_SEEDS;
use crate::models::{
    CanonicalIngredient, Classification, Dimension, IngredientCategory, MigrationReport,
    MigrationRun, NewRawIngredient, NewRecipeIngredientLink, RawIngredientRow,
    RecipeIngredientLink, Unit,
};
use crate::units::STANDARD_UNITS;

const CANONICAL_SELECT: &str = "SELECT ci.id, ci.uuid, ci.name, ci.source_language, ci.category_id,
        ci.density_g_per_ml, ci.default_unit_id, ci.is_active, ci.created_at, ci.updated_at,
        c.name, u.name
 FROM canonical_ingredients ci
 LEFT JOIN ingredient_categories c ON ci.category_id = c.id
 LEFT JOIN units u ON ci.default_unit_id = u.id";

const LINK_SELECT: &str = "SELECT l.id, l.uuid, l.recipe_id, l.raw_ingredient_id, l.canonical_ingredient_id,
        l.canonical_amount, l.canonical_unit_id, l.display_amount, l.display_unit_id,
        l.display_unit_text, l.notes, l.position, l.is_optional, l.created_at,
        ci.name, u.name
 FROM recipe_ingredient_links l
 JOIN canonical_ingredients ci ON l.canonical_ingredient_id = ci.id
 JOIN units u ON l.canonical_unit_id = u.id";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS units (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    abbreviation TEXT NOT NULL,
                    dimension TEXT NOT NULL CHECK (dimension IN ('mass', 'volume', 'count')),
                    system TEXT NOT NULL,
                    is_base_unit INTEGER NOT NULL DEFAULT 0,
                    base_unit_id INTEGER REFERENCES units(id),
                    conversion_factor REAL,
                    CHECK (
                        (is_base_unit = 1 AND base_unit_id IS NULL AND conversion_factor IS NULL)
                        OR (is_base_unit = 0 AND base_unit_id IS NOT NULL AND conversion_factor > 0)
                    )
                );

                CREATE TABLE IF NOT EXISTS ingredient_categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    description TEXT,
                    sort_order INTEGER NOT NULL DEFAULT 0
                );",
            )?;
            self.seed_units()?;
            self.seed_categories()?;
            self.conn.execute_batch("PRAGMA user_version = 1;")?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS raw_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id TEXT NOT NULL,
                    raw_name TEXT NOT NULL,
                    raw_amount REAL NOT NULL,
                    raw_unit TEXT NOT NULL DEFAULT '',
                    notes TEXT,
                    position INTEGER NOT NULL DEFAULT 0,
                    is_optional INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS canonical_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL UNIQUE,
                    source_language TEXT NOT NULL,
                    category_id INTEGER REFERENCES ingredient_categories(id),
                    density_g_per_ml REAL,
                    default_unit_id INTEGER REFERENCES units(id),
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_ingredient_links (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    recipe_id TEXT NOT NULL,
                    raw_ingredient_id INTEGER NOT NULL UNIQUE REFERENCES raw_ingredients(id),
                    canonical_ingredient_id INTEGER NOT NULL REFERENCES canonical_ingredients(id),
                    canonical_amount REAL NOT NULL,
                    canonical_unit_id INTEGER NOT NULL REFERENCES units(id),
                    display_amount REAL NOT NULL,
                    display_unit_id INTEGER REFERENCES units(id),
                    display_unit_text TEXT NOT NULL,
                    notes TEXT,
                    position INTEGER NOT NULL DEFAULT 0,
                    is_optional INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_raw_ingredients_recipe ON raw_ingredients(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_links_recipe ON recipe_ingredient_links(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_links_ingredient ON recipe_ingredient_links(canonical_ingredient_id);

                PRAGMA user_version = 2;",
            )?;
        }

        if version < 3 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS migration_runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    started_at TEXT NOT NULL,
                    finished_at TEXT NOT NULL,
                    source_rows INTEGER NOT NULL,
                    canonical_ingredients_created INTEGER NOT NULL,
                    links_created INTEGER NOT NULL,
                    unresolved_display_units INTEGER NOT NULL,
                    skipped_empty_names INTEGER NOT NULL,
                    unresolved_units TEXT NOT NULL DEFAULT '[]'
                );

                PRAGMA user_version = 3;",
            )?;
        }

        Ok(())
    }

    fn seed_units(&self) -> Result<()> {
        let mut base_ids: HashMap<Dimension, i64> = HashMap::new();
        for seed in STANDARD_UNITS {
            let base_unit_id = match seed.factor {
                Some(_) => Some(
                    *base_ids
                        .get(&seed.dimension)
                        .with_context(|| format!("No base unit seeded before '{}'", seed.name))?,
                ),
                None => None,
            };
            self.conn.execute(
                "INSERT OR IGNORE INTO units (name, abbreviation, dimension, system, is_base_unit, base_unit_id, conversion_factor)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    seed.name,
                    seed.abbreviation,
                    seed.dimension.as_str(),
                    seed.system,
                    seed.factor.is_none(),
                    base_unit_id,
                    seed.factor,
                ],
            )?;
            if seed.factor.is_none() {
                let id: i64 = self.conn.query_row(
                    "SELECT id FROM units WHERE name = ?1",
                    params![seed.name],
                    |row| row.get(0),
                )?;
                base_ids.insert(seed.dimension, id);
            }
        }
        Ok(())
    }

    fn seed_categories(&self) -> Result<()> {
        for (name, description, sort_order) in CATEGORY_SEEDS {
            self.conn.execute(
                "INSERT OR IGNORE INTO ingredient_categories (name, description, sort_order)
                 VALUES (?1, ?2, ?3)",
                params![name, description, sort_order],
            )?;
        }
        Ok(())
    }

    /// Start a transaction. Dropping it without `commit` rolls everything back.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .context("Failed to start transaction")
    }

    // --- Row mapping helpers ---

    fn unit_from_row(row: &rusqlite::Row) -> rusqlite::Result<Unit> {
        let dimension: String = row.get(3)?;
        let dimension = dimension.parse::<Dimension>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?;
        Ok(Unit {
            id: row.get(0)?,
            name: row.get(1)?,
            abbreviation: row.get(2)?,
            dimension,
            system: row.get(4)?,
            is_base_unit: row.get(5)?,
            base_unit_id: row.get(6)?,
            conversion_factor: row.get(7)?,
        })
    }

    fn raw_ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<RawIngredientRow> {
        Ok(RawIngredientRow {
            id: row.get(0)?,
            recipe_id: row.get(1)?,
            raw_name: row.get(2)?,
            raw_amount: row.get(3)?,
            raw_unit: row.get(4)?,
            notes: row.get(5)?,
            position: row.get(6)?,
            is_optional: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    // Expects CANONICAL_SELECT column order.
    fn canonical_from_row(row: &rusqlite::Row) -> rusqlite::Result<CanonicalIngredient> {
        Ok(CanonicalIngredient {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            source_language: row.get(3)?,
            category_id: row.get(4)?,
            density_g_per_ml: row.get(5)?,
            default_unit_id: row.get(6)?,
            is_active: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            category_name: row.get(10)?,
            default_unit_name: row.get(11)?,
        })
    }

    // Expects LINK_SELECT column order.
    fn link_from_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeIngredientLink> {
        Ok(RecipeIngredientLink {
            id: row.get(0)?,
            uuid: row.get(1)?,
            recipe_id: row.get(2)?,
            raw_ingredient_id: row.get(3)?,
            canonical_ingredient_id: row.get(4)?,
            canonical_amount: row.get(5)?,
            canonical_unit_id: row.get(6)?,
            display_amount: row.get(7)?,
            display_unit_id: row.get(8)?,
            display_unit_text: row.get(9)?,
            notes: row.get(10)?,
            position: row.get(11)?,
            is_optional: row.get(12)?,
            created_at: row.get(13)?,
            ingredient_name: Some(row.get(14)?),
            canonical_unit_name: Some(row.get(15)?),
            scale_factor: None,
        })
    }

    fn migration_run_from_row(row: &rusqlite::Row) -> rusqlite::Result<MigrationRun> {
        Ok(MigrationRun {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            source_rows: row.get(3)?,
            canonical_ingredients_created: row.get(4)?,
            links_created: row.get(5)?,
            unresolved_display_units: row.get(6)?,
            skipped_empty_names: row.get(7)?,
            unresolved_units: {
                let text: String = row.get(8)?;
                serde_json::from_str(&text).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        8,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?
            },
        })
    }

    // --- Units & Categories ---

    pub fn list_units(&self) -> Result<Vec<Unit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, abbreviation, dimension, system, is_base_unit, base_unit_id, conversion_factor
             FROM units ORDER BY dimension, is_base_unit DESC, conversion_factor, name",
        )?;
        let units = stmt
            .query_map([], Self::unit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(units)
    }

    pub fn list_categories(&self) -> Result<Vec<IngredientCategory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, sort_order FROM ingredient_categories ORDER BY sort_order, name",
        )?;
        let categories = stmt
            .query_map([], |row| {
                Ok(IngredientCategory {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    sort_order: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    // --- Raw ingredients ---

    pub fn insert_raw_ingredient(&self, raw: &NewRawIngredient) -> Result<RawIngredientRow> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO raw_ingredients (recipe_id, raw_name, raw_amount, raw_unit, notes, position, is_optional, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                raw.recipe_id,
                raw.raw_name,
                raw.raw_amount,
                raw.raw_unit,
                raw.notes,
                raw.position,
                raw.is_optional,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_raw_ingredient(id)
    }

    pub fn get_raw_ingredient(&self, id: i64) -> Result<RawIngredientRow> {
        self.conn
            .query_row(
                "SELECT * FROM raw_ingredients WHERE id = ?1",
                params![id],
                Self::raw_ingredient_from_row,
            )
            .context("Raw ingredient not found")
    }

    pub fn list_raw_ingredients(&self) -> Result<Vec<RawIngredientRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM raw_ingredients ORDER BY id")?;
        let rows = stmt
            .query_map([], Self::raw_ingredient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_raw_ingredients(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM raw_ingredients", [], |row| row.get(0))?;
        Ok(count)
    }

    // --- Canonical ingredients ---

    /// Insert a canonical ingredient unless one with this name exists. The
    /// UNIQUE constraint on `name` decides; the flag says whether a row was created.
    pub fn insert_canonical_ingredient_if_absent(
        &self,
        name: &str,
        source_language: &str,
    ) -> Result<(CanonicalIngredient, bool)> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO canonical_ingredients (uuid, name, source_language, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)",
            params![uuid, name, source_language, now, now],
        )?;
        let ingredient = self
            .get_canonical_ingredient_by_name(name)?
            .with_context(|| format!("Canonical ingredient '{name}' vanished after insert"))?;
        Ok((ingredient, inserted > 0))
    }

    pub fn get_canonical_ingredient(&self, id: i64) -> Result<CanonicalIngredient> {
        self.conn
            .query_row(
                &format!("{CANONICAL_SELECT} WHERE ci.id = ?1"),
                params![id],
                Self::canonical_from_row,
            )
            .context("Canonical ingredient not found")
    }

    pub fn get_canonical_ingredient_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CanonicalIngredient>> {
        let ingredient = self
            .conn
            .query_row(
                &format!("{CANONICAL_SELECT} WHERE ci.name = ?1"),
                params![name],
                Self::canonical_from_row,
            )
            .optional()?;
        Ok(ingredient)
    }

    pub fn list_canonical_ingredients(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<CanonicalIngredient>> {
        if let Some(query) = search {
            let escaped = query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            let pattern = format!("%{escaped}%");
            let mut stmt = self.conn.prepare(&format!(
                "{CANONICAL_SELECT} WHERE ci.name LIKE ?1 ESCAPE '\\' ORDER BY ci.name LIMIT 100"
            ))?;
            let ingredients = stmt
                .query_map(params![pattern], Self::canonical_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ingredients);
        }
        let mut stmt = self
            .conn
            .prepare(&format!("{CANONICAL_SELECT} ORDER BY ci.name"))?;
        let ingredients = stmt
            .query_map([], Self::canonical_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    pub fn count_canonical_ingredients(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM canonical_ingredients",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn set_classification(&self, id: i64, classification: &Classification) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE canonical_ingredients
             SET category_id = ?1, density_g_per_ml = ?2, default_unit_id = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                classification.category_id,
                classification.density_g_per_ml,
                classification.default_unit_id,
                now,
                id,
            ],
        )?;
        if rows == 0 {
            bail!("Canonical ingredient not found");
        }
        Ok(())
    }

    // --- Links ---

    /// Write the link for one raw row, replacing any link a previous pass made.
    pub fn replace_link(&self, link: &NewRecipeIngredientLink) -> Result<RecipeIngredientLink> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "DELETE FROM recipe_ingredient_links WHERE raw_ingredient_id = ?1",
            params![link.raw_ingredient_id],
        )?;
        self.conn.execute(
            "INSERT INTO recipe_ingredient_links (uuid, recipe_id, raw_ingredient_id, canonical_ingredient_id,
                 canonical_amount, canonical_unit_id, display_amount, display_unit_id, display_unit_text,
                 notes, position, is_optional, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                uuid,
                link.recipe_id,
                link.raw_ingredient_id,
                link.canonical_ingredient_id,
                link.canonical_amount,
                link.canonical_unit_id,
                link.display_amount,
                link.display_unit_id,
                link.display_unit_text,
                link.notes,
                link.position,
                link.is_optional,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                &format!("{LINK_SELECT} WHERE l.id = ?1"),
                params![id],
                Self::link_from_row,
            )
            .context("Link not found")
    }

    pub fn get_links_for_recipe(&self, recipe_id: &str) -> Result<Vec<RecipeIngredientLink>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LINK_SELECT} WHERE l.recipe_id = ?1 ORDER BY l.position, l.id"
        ))?;
        let links = stmt
            .query_map(params![recipe_id], Self::link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    pub fn count_links(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM recipe_ingredient_links",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_links_for_ingredient(&self, canonical_ingredient_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM recipe_ingredient_links WHERE canonical_ingredient_id = ?1",
            params![canonical_ingredient_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Migration history ---

    #[allow(clippy::cast_possible_wrap)]
    pub fn record_migration_run(
        &self,
        started_at: &str,
        report: &MigrationReport,
    ) -> Result<MigrationRun> {
        let finished_at = Local::now().to_rfc3339();
        let unresolved_units = serde_json::to_string(&report.unresolved_units)
            .context("Failed to serialize unresolved units")?;
        self.conn.execute(
            "INSERT INTO migration_runs (started_at, finished_at, source_rows, canonical_ingredients_created,
                 links_created, unresolved_display_units, skipped_empty_names, unresolved_units)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                started_at,
                finished_at,
                report.source_rows as i64,
                report.canonical_ingredients_created as i64,
                report.links_created as i64,
                report.unresolved_display_units as i64,
                report.skipped_empty_names as i64,
                unresolved_units,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT * FROM migration_runs WHERE id = ?1",
                params![id],
                Self::migration_run_from_row,
            )
            .context("Migration run not found")
    }

    pub fn list_migration_runs(&self) -> Result<Vec<MigrationRun>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM migration_runs ORDER BY id DESC")?;
        let runs = stmt
            .query_map([], Self::migration_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnresolvedUnit;
    use crate::units::UnitRegistry;

    fn sample_raw(name: &str) -> NewRawIngredient {
        NewRawIngredient {
            recipe_id: "pasta-al-pomodoro".to_string(),
            raw_name: name.to_string(),
            raw_amount: 2.0,
            raw_unit: "pcs".to_string(),
            notes: Some("ripe".to_string()),
            position: 1,
            is_optional: false,
        }
    }

    fn sample_link(
        db: &Database,
        raw: &RawIngredientRow,
        ingredient_id: i64,
    ) -> NewRecipeIngredientLink {
        let piece = db
            .list_units()
            .unwrap()
            .into_iter()
            .find(|u| u.name == "piece")
            .unwrap();
        NewRecipeIngredientLink {
            recipe_id: raw.recipe_id.clone(),
            raw_ingredient_id: raw.id,
            canonical_ingredient_id: ingredient_id,
            canonical_amount: raw.raw_amount,
            canonical_unit_id: piece.id,
            display_amount: raw.raw_amount,
            display_unit_id: Some(piece.id),
            display_unit_text: "piece".to_string(),
            notes: raw.notes.clone(),
            position: raw.position,
            is_optional: raw.is_optional,
        }
    }

    #[test]
    fn test_seeded_units_form_a_valid_registry() {
        let db = Database::open_in_memory().unwrap();
        let units = db.list_units().unwrap();
        assert_eq!(units.len(), STANDARD_UNITS.len());

        let registry = UnitRegistry::new(units).unwrap();
        let cup = registry.lookup("cup").unwrap();
        let ml = registry.lookup("milliliter").unwrap();
        assert_eq!(cup.base_unit_id, Some(ml.id));
        assert_eq!(cup.conversion_factor, Some(236.588));
        assert!(ml.is_base_unit);
    }

    #[test]
    fn test_seeded_categories() {
        let db = Database::open_in_memory().unwrap();
        let categories = db.list_categories().unwrap();
        assert_eq!(categories.len(), CATEGORY_SEEDS.len());
        assert_eq!(categories[0].name, "Vegetables");
        assert_eq!(categories.last().unwrap().name, "Other");
    }

    #[test]
    fn test_reopen_does_not_reseed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("larder.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_raw_ingredient(&sample_raw("Tomatoes")).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_units().unwrap().len(), STANDARD_UNITS.len());
        assert_eq!(db.list_categories().unwrap().len(), CATEGORY_SEEDS.len());
        assert_eq!(db.count_raw_ingredients().unwrap(), 1);
    }

    #[test]
    fn test_unit_check_constraint() {
        let db = Database::open_in_memory().unwrap();
        let result = db.conn.execute(
            "INSERT INTO units (name, abbreviation, dimension, system, is_base_unit) VALUES ('stone', 'st', 'mass', 'imperial', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_insert_and_get_raw_ingredient() {
        let db = Database::open_in_memory().unwrap();
        let raw = db.insert_raw_ingredient(&sample_raw("2 Fresh Tomatoes")).unwrap();
        assert_eq!(raw.raw_name, "2 Fresh Tomatoes");
        assert_eq!(raw.raw_unit, "pcs");
        assert_eq!(raw.notes.as_deref(), Some("ripe"));

        let all = db.list_raw_ingredients().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, raw.id);
    }

    #[test]
    fn test_insert_canonical_if_absent_is_a_noop_on_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let (first, created) = db.insert_canonical_ingredient_if_absent("Tomatoes", "en").unwrap();
        assert!(created);
        assert!(!first.uuid.is_empty());

        let (second, created) = db.insert_canonical_ingredient_if_absent("Tomatoes", "it").unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.source_language, "en");
        assert_eq!(db.count_canonical_ingredients().unwrap(), 1);
    }

    #[test]
    fn test_set_classification_and_joined_names() {
        let db = Database::open_in_memory().unwrap();
        let (ingredient, _) = db.insert_canonical_ingredient_if_absent("Milk", "en").unwrap();
        let dairy = db
            .list_categories()
            .unwrap()
            .into_iter()
            .find(|c| c.name == "Dairy & Eggs")
            .unwrap();
        let ml = db
            .list_units()
            .unwrap()
            .into_iter()
            .find(|u| u.name == "milliliter")
            .unwrap();

        db.set_classification(
            ingredient.id,
            &Classification {
                category_id: Some(dairy.id),
                density_g_per_ml: Some(1.03),
                default_unit_id: Some(ml.id),
            },
        )
        .unwrap();

        let fetched = db.get_canonical_ingredient(ingredient.id).unwrap();
        assert_eq!(fetched.category_name.as_deref(), Some("Dairy & Eggs"));
        assert_eq!(fetched.default_unit_name.as_deref(), Some("milliliter"));
        assert_eq!(fetched.density_g_per_ml, Some(1.03));

        assert!(db.set_classification(9999, &Classification::default()).is_err());
    }

    #[test]
    fn test_search_canonical_ingredients() {
        let db = Database::open_in_memory().unwrap();
        for name in ["Olive Oil", "Sunflower Oil", "Tomatoes", "50%_Cream"] {
            db.insert_canonical_ingredient_if_absent(name, "en").unwrap();
        }
        assert_eq!(db.list_canonical_ingredients(None).unwrap().len(), 4);

        let oils = db.list_canonical_ingredients(Some("oil")).unwrap();
        assert_eq!(oils.len(), 2);
        assert_eq!(oils[0].name, "Olive Oil");

        let literal = db.list_canonical_ingredients(Some("%_")).unwrap();
        assert_eq!(literal.len(), 1);
        assert!(db.get_canonical_ingredient_by_name("Basil").unwrap().is_none());
    }

    #[test]
    fn test_replace_link_keeps_one_link_per_raw_row() {
        let db = Database::open_in_memory().unwrap();
        let raw = db.insert_raw_ingredient(&sample_raw("Tomatoes")).unwrap();
        let (ingredient, _) = db.insert_canonical_ingredient_if_absent("Tomatoes", "en").unwrap();

        let first = db.replace_link(&sample_link(&db, &raw, ingredient.id)).unwrap();
        let second = db.replace_link(&sample_link(&db, &raw, ingredient.id)).unwrap();
        assert_ne!(first.uuid, second.uuid);
        assert_eq!(db.count_links().unwrap(), 1);
        assert_eq!(db.count_links_for_ingredient(ingredient.id).unwrap(), 1);

        let links = db.get_links_for_recipe("pasta-al-pomodoro").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].ingredient_name.as_deref(), Some("Tomatoes"));
        assert_eq!(links[0].canonical_unit_name.as_deref(), Some("piece"));
        assert!(db.get_links_for_recipe("other").unwrap().is_empty());
    }

    #[test]
    fn test_link_requires_existing_ingredient() {
        let db = Database::open_in_memory().unwrap();
        let raw = db.insert_raw_ingredient(&sample_raw("Tomatoes")).unwrap();
        assert!(db.replace_link(&sample_link(&db, &raw, 42)).is_err());
    }

    #[test]
    fn test_rolled_back_transaction_leaves_no_rows() {
        let db = Database::open_in_memory().unwrap();
        {
            let _tx = db.begin().unwrap();
            db.insert_canonical_ingredient_if_absent("Basil", "en").unwrap();
        }
        assert_eq!(db.count_canonical_ingredients().unwrap(), 0);

        let tx = db.begin().unwrap();
        db.insert_canonical_ingredient_if_absent("Basil", "en").unwrap();
        tx.commit().unwrap();
        assert_eq!(db.count_canonical_ingredients().unwrap(), 1);
    }

    #[test]
    fn test_record_and_list_migration_runs() {
        let db = Database::open_in_memory().unwrap();
        let report = MigrationReport {
            source_rows: 3,
            canonical_ingredients_created: 2,
            links_created: 2,
            unresolved_display_units: 1,
            skipped_empty_names: 1,
            unresolved_units: vec![UnresolvedUnit {
                unit: "handful".to_string(),
                count: 1,
            }],
            ..MigrationReport::default()
        };
        let started = Local::now().to_rfc3339();
        db.record_migration_run(&started, &MigrationReport::default()).unwrap();
        let run = db.record_migration_run(&started, &report).unwrap();

        let runs = db.list_migration_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, run.id);
        assert_eq!(runs[0].source_rows, 3);
        assert_eq!(runs[0].skipped_empty_names, 1);
        assert_eq!(runs[0].unresolved_units[0].unit, "handful");
        assert!(runs[1].unresolved_units.is_empty());
    }
}
