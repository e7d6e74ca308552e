use std::collections::{BTreeSet, HashMap};
use std::io::Read;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info};

use crate::amount::{AmountIssue, parse_amount};
use crate::db::Database;
use crate::models::{NewRawIngredient, validate_new_raw_ingredient};

/// A raw ingredient row read from a CSV file, with whatever the amount parser
/// had to say about it.
#[derive(Debug, Clone)]
pub struct ParsedRawRow {
    pub line: usize,
    pub row: NewRawIngredient,
    pub amount_issues: Vec<AmountIssue>,
}

/// Summary of what a raw-row import would do / did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawImportSummary {
    pub dry_run: bool,
    pub rows_parsed: usize,
    pub rows_imported: usize,
    pub recipes: usize,
    pub amount_issues: usize,
}

/// Parse raw ingredient rows from CSV.
///
/// Expected header: `recipe_id,name,amount,unit,notes,order,optional`.
/// Only `recipe_id` and `name` are required. Rows without an `order` get their
/// 1-based position within their recipe.
pub fn parse_raw_csv<R: Read>(reader: R) -> Result<Vec<ParsedRawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let required = ["recipe_id", "name"];
    for name in &required {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            bail!("Missing required column: {name}");
        }
    }

    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_recipe = col("recipe_id").context("Missing 'recipe_id' column")?;
    let idx_name = col("name").context("Missing 'name' column")?;
    let idx_amount = col("amount");
    let idx_unit = col("unit");
    let idx_notes = col("notes");
    let idx_order = col("order");
    let idx_optional = col("optional");

    let mut positions: HashMap<String, i64> = HashMap::new();
    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {line}"))?;

        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();

        let recipe_id = field(Some(idx_recipe)).to_string();
        let raw_name = field(Some(idx_name)).to_string();
        if recipe_id.is_empty() && raw_name.is_empty() {
            continue; // skip blank rows
        }
        if recipe_id.is_empty() {
            bail!("Row {line}: recipe_id is empty");
        }

        let next_position = positions.entry(recipe_id.clone()).or_insert(0);
        *next_position += 1;
        let position = match field(idx_order) {
            "" => *next_position,
            s => s
                .parse::<i64>()
                .with_context(|| format!("Row {line}: invalid order '{s}'"))?,
        };

        let parsed = parse_amount(field(idx_amount));
        let notes = Some(field(idx_notes))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let is_optional = matches!(
            field(idx_optional).to_lowercase().as_str(),
            "true" | "yes" | "y" | "1"
        );

        rows.push(ParsedRawRow {
            line,
            row: NewRawIngredient {
                recipe_id,
                raw_name,
                raw_amount: parsed.value,
                raw_unit: field(idx_unit).to_string(),
                notes,
                position,
                is_optional,
            },
            amount_issues: parsed.issues,
        });
    }

    Ok(rows)
}

/// Store raw rows. Nothing is canonicalized here; that is the migration pass's job.
///
/// When `dry_run` is true, rows are validated and counted but nothing is written.
pub fn import_raw_rows(
    db: &Database,
    rows: &[NewRawIngredient],
    dry_run: bool,
) -> Result<RawImportSummary> {
    for (i, row) in rows.iter().enumerate() {
        validate_new_raw_ingredient(row).with_context(|| format!("Row {}", i + 1))?;
    }

    let recipes: BTreeSet<&str> = rows.iter().map(|r| r.recipe_id.as_str()).collect();
    let mut summary = RawImportSummary {
        dry_run,
        rows_parsed: rows.len(),
        recipes: recipes.len(),
        ..RawImportSummary::default()
    };

    if dry_run {
        return Ok(summary);
    }

    let tx = db.begin()?;
    for row in rows {
        let stored = db.insert_raw_ingredient(row)?;
        debug!(
            id = stored.id,
            recipe = %stored.recipe_id,
            name = %stored.raw_name,
            "stored raw row"
        );
        summary.rows_imported += 1;
    }
    tx.commit().context("Failed to commit import")?;
    info!(rows = summary.rows_imported, recipes = summary.recipes, "imported raw rows");

    Ok(summary)
}

/// Parse and import a CSV file in one go, counting amount parser issues.
pub fn import_raw_csv<R: Read>(
    db: &Database,
    reader: R,
    dry_run: bool,
) -> Result<RawImportSummary> {
    let parsed = parse_raw_csv(reader)?;
    let amount_issues = parsed.iter().filter(|p| !p.amount_issues.is_empty()).count();
    for p in parsed.iter().filter(|p| !p.amount_issues.is_empty()) {
        debug!(line = p.line, issues = ?p.amount_issues, "amount needed interpretation");
    }
    let rows: Vec<NewRawIngredient> = parsed.into_iter().map(|p| p.row).collect();
    let mut summary = import_raw_rows(db, &rows, dry_run)?;
    summary.amount_issues = amount_issues;
    Ok(summary)
}
