mod commands;
mod config;
mod logging;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    ConvertTarget, cmd_categories, cmd_check_amount, cmd_check_name, cmd_check_unit,
    cmd_convert, cmd_import_cook, cmd_import_csv, cmd_ingredient_list, cmd_ingredient_show,
    cmd_links, cmd_migrate, cmd_runs, cmd_units,
};
use crate::config::Config;
use larder_core::db::Database;
use larder_core::engine::Engine;

#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "Canonicalize recipe ingredients, amounts and units",
    long_about = "Canonicalize recipe ingredients, amounts and units.\n\n\
Raw ingredient rows are imported as written, then `larder migrate` turns them\n\
into deduplicated canonical ingredients and links with amounts in base units."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import raw ingredient rows
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Canonicalize every raw row into ingredients and recipe links
    Migrate {
        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the history of migration passes
    Runs {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Browse canonical ingredients
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Show the canonical links of one recipe
    Links {
        /// Recipe id as given in the raw rows
        recipe_id: String,
        /// Multiply every amount by this factor (e.g. 2 to double, 0.5 to halve)
        #[arg(long)]
        scale: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered units and their conversion factors
    Units {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List ingredient categories
    Categories {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Try the normalizers on a single value
    Check {
        #[command(subcommand)]
        command: CheckCommands,
    },
    /// Convert an amount between two units, or into a unit system
    Convert {
        /// Amount to convert
        amount: f64,
        /// Unit to convert from (e.g. "cups", "g", "Tbsp")
        from: String,
        /// Unit to convert to
        #[arg(required_unless_present = "system")]
        to: Option<String>,
        /// Convert to the best-fitting unit of a unit system instead
        #[arg(long, conflicts_with = "to", value_parser = ["metric", "imperial", "us"])]
        system: Option<String>,
        /// Ingredient whose density to use for mass <-> volume conversions
        #[arg(short, long)]
        ingredient: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the HTTP ingestion server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Import raw rows from CSV (recipe_id,name,amount,unit,notes,order,optional)
    Csv {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import the ingredients of a Cooklang (.cook) recipe as raw rows
    Cook {
        /// Path to the .cook file
        file: PathBuf,
        /// Recipe id (defaults to metadata title or filename)
        #[arg(long)]
        recipe: Option<String>,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// List/search canonical ingredients
    List {
        /// Search query to filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one canonical ingredient (the name is normalized first)
    Show {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CheckCommands {
    /// Normalize and classify an ingredient name
    Name {
        /// Raw ingredient name (e.g. "2 Fresh Large Diced Tomatoes")
        raw: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a unit string against the alias table and registry
    Unit {
        /// Raw unit (e.g. "Tbsp.", "cups", "pcs")
        raw: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse and canonicalize an amount with its unit
    Amount {
        /// Raw amount (e.g. "1 1/2", "1,5", "¾")
        amount: String,
        /// Raw unit
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing() {
        eprintln!("Warning: could not initialise logging: {e:#}");
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;
    let engine = Engine::from_database(&db, config.engine.clone())?;

    match cli.command {
        Commands::Import { command } => match command {
            ImportCommands::Csv {
                file,
                dry_run,
                json,
            } => cmd_import_csv(&db, &file, dry_run, json),
            ImportCommands::Cook {
                file,
                recipe,
                dry_run,
                json,
            } => cmd_import_cook(&db, &file, recipe.as_deref(), dry_run, json),
        },
        Commands::Migrate { dry_run, json } => cmd_migrate(&db, &engine, dry_run, json),
        Commands::Runs { json } => cmd_runs(&db, json),
        Commands::Ingredient { command } => match command {
            IngredientCommands::List { search, json } => {
                cmd_ingredient_list(&db, search.as_deref(), json)
            }
            IngredientCommands::Show { name, json } => {
                cmd_ingredient_show(&db, &engine, &name, json)
            }
        },
        Commands::Links {
            recipe_id,
            scale,
            json,
        } => cmd_links(&db, &recipe_id, scale, json),
        Commands::Units { json } => cmd_units(&engine, json),
        Commands::Categories { json } => cmd_categories(&db, json),
        Commands::Check { command } => match command {
            CheckCommands::Name { raw, json } => cmd_check_name(&engine, &raw, json),
            CheckCommands::Unit { raw, json } => cmd_check_unit(&engine, &raw, json),
            CheckCommands::Amount { amount, unit, json } => {
                cmd_check_amount(&engine, &amount, &unit, json)
            }
        },
        Commands::Convert {
            amount,
            from,
            to,
            system,
            ingredient,
            json,
        } => {
            let target = match (to.as_deref(), system.as_deref()) {
                (_, Some(system)) => ConvertTarget::System(system),
                (Some(to), None) => ConvertTarget::Unit(to),
                (None, None) => anyhow::bail!("Give a target unit or --system"),
            };
            cmd_convert(&db, &engine, amount, &from, target, ingredient.as_deref(), json)
        }
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let (api_key, new_api_key) = if no_auth {
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            server::start_server(db, engine, port, &bind, api_key, new_api_key).await
        }
    }
}
