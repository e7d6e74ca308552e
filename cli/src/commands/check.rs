use anyhow::Result;
use serde::Serialize;

use larder_core::amount::{AmountIssue, CanonicalAmount, parse_amount};
use larder_core::engine::Engine;
use larder_core::name_normalizer::normalize_name_detailed;
use larder_core::unit_normalizer::{UnitMatch, normalize_unit_detailed};

use super::helpers::fmt_amount;

pub(crate) fn cmd_check_name(engine: &Engine, raw: &str, json: bool) -> Result<()> {
    let normalized = normalize_name_detailed(raw);
    let classification = engine.classify(&normalized.name);
    let category = engine.classifier().classify(&normalized.name);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "input": raw,
                "normalized": normalized,
                "category": category.map(|c| c.name.as_str()),
                "classification": classification,
            }))?
        );
        return Ok(());
    }

    if normalized.is_empty() {
        println!("'{raw}' normalizes to an empty name; such rows are skipped.");
        return Ok(());
    }
    println!("{raw} -> {}", normalized.name);
    if !normalized.removed_terms.is_empty() {
        println!("  Removed:      {}", normalized.removed_terms.join(", "));
    }
    if let Some(q) = &normalized.stripped_quantity {
        println!("  Quantity:     {q}");
    }
    println!(
        "  Category:     {}",
        category.map_or("-", |c| c.name.as_str())
    );
    println!(
        "  Default unit: {}",
        classification
            .default_unit_id
            .and_then(|id| engine.registry().get(id))
            .map_or("-", |u| u.name.as_str())
    );
    if let Some(d) = classification.density_g_per_ml {
        println!("  Density:      {} g/ml", fmt_amount(d, 3));
    }
    Ok(())
}

pub(crate) fn cmd_check_unit(engine: &Engine, raw: &str, json: bool) -> Result<()> {
    let normalized = normalize_unit_detailed(raw);
    let unit = engine.registry().lookup(&normalized.unit);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "input": raw,
                "normalized": normalized,
                "registered": unit.is_some(),
                "unit": unit,
            }))?
        );
        return Ok(());
    }

    let how = match normalized.kind {
        UnitMatch::Alias => "alias",
        UnitMatch::Plural => "plural",
        UnitMatch::Unknown => "no alias",
    };
    match unit {
        Some(u) => println!(
            "'{raw}' -> {} ({how}; {}, {})",
            u.name, u.dimension, u.abbreviation
        ),
        None => println!(
            "'{raw}' -> '{}' ({how}; not registered, falls back to '{}')",
            normalized.unit,
            engine.config().default_unit
        ),
    }
    Ok(())
}

#[derive(Serialize)]
struct AmountCheck<'a> {
    input_amount: &'a str,
    input_unit: &'a str,
    parsed_amount: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    amount_issues: Vec<AmountIssue>,
    #[serde(flatten)]
    canonical: CanonicalAmount,
    resolved: bool,
}

/// Parse a free-text amount ("1 1/2", "1,5", "¾") and canonicalize it.
pub(crate) fn cmd_check_amount(
    engine: &Engine,
    amount: &str,
    unit: &str,
    json: bool,
) -> Result<()> {
    let parsed = parse_amount(amount);
    let canonical = engine.canonicalize(parsed.value, unit);
    let check = AmountCheck {
        input_amount: amount,
        input_unit: unit,
        parsed_amount: parsed.value,
        amount_issues: parsed.issues,
        resolved: canonical.is_resolved(),
        canonical,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&check)?);
        return Ok(());
    }

    println!(
        "{amount} {unit} -> {} {}",
        fmt_amount(check.canonical.canonical_amount, 4),
        check.canonical.canonical_unit
    );
    println!(
        "  Display: {} {}",
        fmt_amount(check.canonical.display_amount, 4),
        check.canonical.display_unit
    );
    if !check.resolved {
        println!("  Unit not registered; fell back to the default unit.");
    }
    for issue in &check.amount_issues {
        println!("  Note: {}", describe_issue(issue));
    }
    Ok(())
}

fn describe_issue(issue: &AmountIssue) -> String {
    match issue {
        AmountIssue::EmptyAmount => "amount is empty, using 0".to_string(),
        AmountIssue::ParseError(s) => format!("could not read '{s}', using 0"),
        AmountIssue::CommaDecimalSeparator => "comma read as decimal separator".to_string(),
        AmountIssue::CommaThousandsSeparator => "comma read as thousands separator".to_string(),
        AmountIssue::EuropeanDecimalFormat => "read as European number format".to_string(),
        AmountIssue::DivisionByZero => "fraction divides by zero, using 0".to_string(),
        AmountIssue::Negative => "amount is negative".to_string(),
    }
}
