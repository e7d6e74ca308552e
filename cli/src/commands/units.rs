use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::classifier::estimate_density;
use larder_core::db::Database;
use larder_core::engine::Engine;
use larder_core::units::Conversion;

use super::helpers::{fmt_amount, fmt_optional};

pub(crate) fn cmd_units(engine: &Engine, json: bool) -> Result<()> {
    let registry = engine.registry();
    let units = registry.units();

    if json {
        println!("{}", serde_json::to_string_pretty(units)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Abbr")]
        abbreviation: String,
        #[tabled(rename = "Dimension")]
        dimension: String,
        #[tabled(rename = "System")]
        system: String,
        #[tabled(rename = "Base")]
        base: String,
        #[tabled(rename = "Factor")]
        factor: String,
    }

    let rows: Vec<Row> = units
        .iter()
        .map(|u| Row {
            id: u.id,
            name: u.name.clone(),
            abbreviation: u.abbreviation.clone(),
            dimension: u.dimension.to_string(),
            system: u.system.clone(),
            base: if u.is_base_unit {
                "yes".to_string()
            } else {
                u.base_unit_id
                    .and_then(|id| registry.get(id))
                    .map_or("?".into(), |b| b.name.clone())
            },
            factor: fmt_optional(u.conversion_factor),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(6..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_categories(db: &Database, json: bool) -> Result<()> {
    let categories = db.list_categories()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "Order")]
        sort_order: i64,
    }

    let rows: Vec<Row> = categories
        .iter()
        .map(|c| Row {
            id: c.id,
            name: c.name.clone(),
            description: c.description.clone().unwrap_or_default(),
            sort_order: c.sort_order,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

/// Where `larder convert` should land: a named unit, or the closest-sized
/// unit of a unit system.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ConvertTarget<'a> {
    Unit(&'a str),
    System(&'a str),
}

/// Convert between two units. Unit strings go through the unit normalizer, so
/// "cups" and "Tbsp." work. Mass/volume crossings need `--ingredient`: its
/// stored density is used, else the keyword estimate for the name.
pub(crate) fn cmd_convert(
    db: &Database,
    engine: &Engine,
    amount: f64,
    from: &str,
    target: ConvertTarget<'_>,
    ingredient: Option<&str>,
    json: bool,
) -> Result<()> {
    let conversion = convert(db, engine, amount, from, target, ingredient)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversion)?);
        return Ok(());
    }

    let registry = engine.registry();
    let line = format!(
        "{} = {}",
        registry.format_amount(conversion.original_amount, &conversion.original_unit, 3),
        registry.format_amount(conversion.amount, &conversion.unit, 3)
    );
    match conversion.density_g_per_ml {
        Some(d) => println!("{line}  (density {} g/ml)", fmt_amount(d, 3)),
        None => println!("{line}"),
    }
    Ok(())
}

fn convert(
    db: &Database,
    engine: &Engine,
    amount: f64,
    from: &str,
    target: ConvertTarget<'_>,
    ingredient: Option<&str>,
) -> Result<Conversion> {
    let from = engine.normalize_unit(from);
    let to = match target {
        ConvertTarget::Unit(to) => engine.normalize_unit(to),
        ConvertTarget::System(system) => {
            return engine.registry().convert_to_system(amount, &from, system);
        }
    };

    let density = match ingredient {
        Some(name) => {
            let canonical = engine.normalize_name(name);
            db.get_canonical_ingredient_by_name(&canonical)?
                .and_then(|i| i.density_g_per_ml)
                .or_else(|| estimate_density(&canonical))
        }
        None => None,
    };
    engine.registry().convert(amount, &from, &to, density)
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::engine::EngineConfig;

    fn setup() -> (Database, Engine) {
        let db = Database::open_in_memory().unwrap();
        let engine = Engine::from_database(&db, EngineConfig::default()).unwrap();
        (db, engine)
    }

    #[test]
    fn test_convert_normalizes_unit_strings() {
        let (db, engine) = setup();
        let c = convert(&db, &engine, 2.0, "cups", ConvertTarget::Unit("ml"), None).unwrap();
        assert_eq!(c.unit, "milliliter");
        assert!((c.amount - 473.176).abs() < 1e-9);
    }

    #[test]
    fn test_convert_across_dimensions_needs_ingredient() {
        let (db, engine) = setup();
        assert!(convert(&db, &engine, 1.0, "cup", ConvertTarget::Unit("g"), None).is_err());

        let c = convert(&db, &engine, 1.0, "cup", ConvertTarget::Unit("g"), Some("Milk")).unwrap();
        assert!(c.density_g_per_ml.is_some());
        assert!(c.amount > 200.0);
    }

    #[test]
    fn test_convert_rejects_count_to_mass() {
        let (db, engine) = setup();
        let err = convert(&db, &engine, 3.0, "pcs", ConvertTarget::Unit("g"), Some("Milk"))
            .unwrap_err();
        assert!(err.to_string().contains("Cannot convert"));
    }

    #[test]
    fn test_convert_to_system_normalizes_unit_strings() {
        let (db, engine) = setup();

        let metric = ConvertTarget::System("metric");
        let c = convert(&db, &engine, 16.0, "Tbsp.", metric, None).unwrap();
        assert_eq!(c.original_unit, "tablespoon");
        assert_eq!(c.unit, "milliliter");
        assert!((c.amount - 16.0 * 14.7868).abs() < 1e-9);

        let imperial = ConvertTarget::System("imperial");
        let c = convert(&db, &engine, 1.5, "kg", imperial, None).unwrap();
        assert_eq!(c.unit, "pound");

        let us = ConvertTarget::System("us");
        let err = convert(&db, &engine, 2.0, "pcs", us, None).unwrap_err();
        assert!(err.to_string().contains("No count units"));
    }

    #[test]
    fn test_units_and_categories_print() {
        let (db, engine) = setup();
        cmd_units(&engine, false).unwrap();
        cmd_categories(&db, true).unwrap();
    }
}
