use anyhow::Result;
use chrono::DateTime;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::db::Database;
use larder_core::engine::Engine;
use larder_core::migration::run_migration;
use larder_core::models::MigrationReport;

pub(crate) fn cmd_migrate(db: &Database, engine: &Engine, dry_run: bool, json: bool) -> Result<()> {
    let report = run_migration(db, engine, dry_run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &MigrationReport) {
    if report.dry_run {
        println!("Dry run, no changes made.\n");
    } else {
        println!("Migration complete.\n");
    }
    println!("  Source rows:                   {}", report.source_rows);
    println!(
        "  Canonical ingredients created: {}",
        report.canonical_ingredients_created
    );
    println!("  Links written:                 {}", report.links_created);
    println!(
        "  Unresolved display units:      {}",
        report.unresolved_display_units
    );
    println!("  Skipped (empty name):          {}", report.skipped_empty_names);

    if !report.unresolved_units.is_empty() {
        println!("\nUnits that fell back to the default unit:");
        for u in &report.unresolved_units {
            println!("  {:<20} {}", u.unit, u.count);
        }
    }

    if !report.is_balanced() {
        eprintln!("\nWarning: source rows do not match links plus skipped rows");
    }
}

pub(crate) fn cmd_runs(db: &Database, json: bool) -> Result<()> {
    let runs = db.list_migration_runs()?;

    if runs.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No migration runs recorded.");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Finished")]
        finished: String,
        #[tabled(rename = "Rows")]
        rows: i64,
        #[tabled(rename = "New ingredients")]
        created: i64,
        #[tabled(rename = "Links")]
        links: i64,
        #[tabled(rename = "Unresolved")]
        unresolved: i64,
        #[tabled(rename = "Skipped")]
        skipped: i64,
        #[tabled(rename = "Unresolved units")]
        unresolved_units: String,
    }

    let rows: Vec<Row> = runs
        .iter()
        .map(|r| Row {
            id: r.id,
            finished: DateTime::parse_from_rfc3339(&r.finished_at).map_or_else(
                |_| r.finished_at.clone(),
                |t| t.format("%Y-%m-%d %H:%M").to_string(),
            ),
            rows: r.source_rows,
            created: r.canonical_ingredients_created,
            links: r.links_created,
            unresolved: r.unresolved_display_units,
            skipped: r.skipped_empty_names,
            unresolved_units: r
                .unresolved_units
                .iter()
                .take(3)
                .map(|u| format!("{} ({})", u.unit, u.count))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::engine::EngineConfig;
    use larder_core::models::NewRawIngredient;

    #[test]
    fn test_migrate_records_a_run() {
        let db = Database::open_in_memory().unwrap();
        let engine = Engine::from_database(&db, EngineConfig::default()).unwrap();
        db.insert_raw_ingredient(&NewRawIngredient {
            recipe_id: "soup".to_string(),
            raw_name: "Carrots".to_string(),
            raw_amount: 2.0,
            raw_unit: "pcs".to_string(),
            notes: None,
            position: 1,
            is_optional: false,
        })
        .unwrap();

        cmd_migrate(&db, &engine, true, true).unwrap();
        assert!(db.list_migration_runs().unwrap().is_empty());

        cmd_migrate(&db, &engine, false, true).unwrap();
        let runs = db.list_migration_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].links_created, 1);
    }
}
