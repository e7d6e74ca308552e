use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::db::Database;
use larder_core::engine::Engine;
use larder_core::models::{CanonicalIngredient, RecipeIngredientLink};
use larder_core::units::validate_scale_factor;

use super::helpers::{fmt_amount, fmt_optional, json_error, truncate};

pub(crate) fn cmd_ingredient_list(db: &Database, search: Option<&str>, json: bool) -> Result<()> {
    let ingredients = db.list_canonical_ingredients(search)?;

    if ingredients.is_empty() {
        if json {
            println!("[]");
        } else if let Some(q) = search {
            eprintln!("No canonical ingredients matching '{q}'.");
        } else {
            eprintln!("No canonical ingredients yet. Run `larder migrate` first.");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
        return Ok(());
    }

    print_ingredient_table(&ingredients);
    Ok(())
}

fn print_ingredient_table(ingredients: &[CanonicalIngredient]) {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Default unit")]
        unit: String,
        #[tabled(rename = "Density g/ml")]
        density: String,
    }

    let rows: Vec<Row> = ingredients
        .iter()
        .map(|i| Row {
            id: i.id,
            name: truncate(&i.name, 35),
            category: i.category_name.clone().unwrap_or_else(|| "-".into()),
            unit: i.default_unit_name.clone().unwrap_or_else(|| "-".into()),
            density: fmt_optional(i.density_g_per_ml),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Look an ingredient up by its canonical name. The input goes through the
/// name normalizer first, so "2 fresh tomatoes" finds "Tomatoes".
pub(crate) fn cmd_ingredient_show(
    db: &Database,
    engine: &Engine,
    name: &str,
    json: bool,
) -> Result<()> {
    let canonical = engine.normalize_name(name);
    let Some(ingredient) = db.get_canonical_ingredient_by_name(&canonical)? else {
        if json {
            println!(
                "{}",
                json_error(&format!("Ingredient '{canonical}' not found"))
            );
        } else {
            eprintln!("Ingredient '{canonical}' not found");
        }
        process::exit(2);
    };
    let links = db.count_links_for_ingredient(ingredient.id)?;

    if json {
        let mut value = serde_json::to_value(&ingredient)?;
        value["link_count"] = serde_json::json!(links);
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} (id: {})", ingredient.name, ingredient.id);
    println!("  UUID:         {}", ingredient.uuid);
    println!(
        "  Category:     {}",
        ingredient.category_name.as_deref().unwrap_or("-")
    );
    println!(
        "  Default unit: {}",
        ingredient.default_unit_name.as_deref().unwrap_or("-")
    );
    println!(
        "  Density:      {}",
        ingredient
            .density_g_per_ml
            .map_or("-".into(), |d| format!("{} g/ml", fmt_amount(d, 3)))
    );
    println!("  Language:     {}", ingredient.source_language);
    println!("  Used in:      {links} link(s)");
    Ok(())
}

/// Links of one recipe, optionally with every amount multiplied by `scale`.
pub(crate) fn cmd_links(
    db: &Database,
    recipe_id: &str,
    scale: Option<f64>,
    json: bool,
) -> Result<()> {
    let links = recipe_links(db, recipe_id, scale)?;

    if links.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No links for recipe '{recipe_id}'.");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&links)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "#")]
        position: i64,
        #[tabled(rename = "Ingredient")]
        ingredient: String,
        #[tabled(rename = "Amount")]
        display: String,
        #[tabled(rename = "Canonical")]
        canonical: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<Row> = links
        .iter()
        .map(|l| {
            let optional = if l.is_optional { " (optional)" } else { "" };
            Row {
                position: l.position,
                ingredient: format!(
                    "{}{optional}",
                    truncate(l.ingredient_name.as_deref().unwrap_or("?"), 30)
                ),
                display: format!(
                    "{} {}",
                    fmt_amount(l.display_amount, 3),
                    l.display_unit_text
                ),
                canonical: format!(
                    "{} {}",
                    fmt_amount(l.canonical_amount, 3),
                    l.canonical_unit_name.as_deref().unwrap_or("?")
                ),
                notes: l.notes.as_deref().map(|n| truncate(n, 30)).unwrap_or_default(),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    match scale {
        Some(factor) => {
            println!("Recipe: {recipe_id} (scaled x{})\n{table}", fmt_amount(factor, 3));
        }
        None => println!("Recipe: {recipe_id}\n{table}"),
    }
    Ok(())
}

fn recipe_links(
    db: &Database,
    recipe_id: &str,
    scale: Option<f64>,
) -> Result<Vec<RecipeIngredientLink>> {
    let links = db.get_links_for_recipe(recipe_id)?;
    let Some(factor) = scale else {
        return Ok(links);
    };
    validate_scale_factor(factor)?;
    Ok(links.iter().map(|l| l.scaled(factor)).collect())
}
