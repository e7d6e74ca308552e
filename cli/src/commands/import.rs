use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::warn;

use larder_core::amount::parse_amount;
use larder_core::db::Database;
use larder_core::models::NewRawIngredient;
use larder_core::raw_import::{RawImportSummary, import_raw_csv, import_raw_rows};

pub(crate) fn cmd_import_csv(db: &Database, path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = import_raw_csv(db, file, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "No rows found in CSV file" })
            );
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    print_summary(&summary, json)
}

pub(crate) fn cmd_import_cook(
    db: &Database,
    file: &Path,
    recipe_override: Option<&str>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let stem = file.file_stem().and_then(|s| s.to_str());

    let (recipe_id, rows) = cook_to_raw_rows(&input, recipe_override, stem)?;
    if rows.is_empty() {
        bail!("No ingredients found in recipe");
    }

    let summary = import_raw_rows(db, &rows, dry_run)?;
    if !json {
        println!("Recipe: {recipe_id}");
    }
    print_summary(&summary, json)
}

/// Turn a Cooklang recipe into raw rows for one recipe id.
///
/// The recipe id is the override, else the metadata title, else the file stem.
/// Each grouped ingredient keeps its first quantity; ingredients without one
/// get amount 0 and an empty unit.
pub(crate) fn cook_to_raw_rows(
    input: &str,
    recipe_override: Option<&str>,
    file_stem: Option<&str>,
) -> Result<(String, Vec<NewRawIngredient>)> {
    let (recipe_data, _report) = cooklang::parse(input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    let recipe_id = recipe_override
        .map(String::from)
        .or_else(|| recipe_data.metadata.title().map(String::from))
        .or_else(|| file_stem.map(String::from))
        .context("Could not determine recipe id. Use --recipe to specify one")?;

    let converter = cooklang::Converter::default();
    let grouped = recipe_data.group_ingredients(&converter);

    let rows = grouped
        .iter()
        .enumerate()
        .map(|(i, gi)| {
            let (raw_amount, raw_unit) = first_quantity(gi);
            #[allow(clippy::cast_possible_wrap)]
            let position = i as i64 + 1;
            NewRawIngredient {
                recipe_id: recipe_id.clone(),
                raw_name: gi.ingredient.display_name().to_string(),
                raw_amount,
                raw_unit,
                notes: None,
                position,
                is_optional: false,
            }
        })
        .collect();

    Ok((recipe_id, rows))
}

fn first_quantity(gi: &cooklang::ingredient_list::GroupedIngredient<'_>) -> (f64, String) {
    gi.quantity
        .iter()
        .next()
        .map_or((0.0, String::new()), |qty: &cooklang::Quantity| {
            let amount = match qty.value() {
                cooklang::Value::Number(n) => n.value(),
                cooklang::Value::Range { start, .. } => start.value(),
                cooklang::Value::Text(t) => {
                    let parsed = parse_amount(t);
                    if !parsed.issues.is_empty() {
                        warn!(
                            text = %t,
                            issues = ?parsed.issues,
                            "quantity text needed interpretation"
                        );
                    }
                    parsed.value
                }
            };
            (amount, qty.unit().unwrap_or_default().to_string())
        })
}

fn print_summary(summary: &RawImportSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else if summary.dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Rows parsed:     {}", summary.rows_parsed);
        println!("  Rows to import:  {}", summary.rows_parsed);
        println!("  Recipes:         {}", summary.recipes);
        println!("  Amount warnings: {}", summary.amount_issues);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:     {}", summary.rows_parsed);
        println!("  Rows imported:   {}", summary.rows_imported);
        println!("  Recipes:         {}", summary.recipes);
        println!("  Amount warnings: {}", summary.amount_issues);
        println!("\nRun `larder migrate` to canonicalize the new rows.");
    }
    Ok(())
}
