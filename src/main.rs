//! Recipe Calculator
//!
//! Works out the raw materials needed to craft a target quantity of an item.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::info;

use recipe_calc::parser::{self, RecipeParser};
use recipe_calc::{db, import, Job, DEFAULT_MAX_PASSES};

#[derive(Parser)]
#[command(name = "recipe-calc")]
#[command(about = "Bill-of-materials calculator for crafting recipe chains")]
struct Cli {
    /// Path to the SQLite recipe catalog
    #[arg(short, long, env = "RECIPE_CALC_DB", default_value = "recipes.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every *.recipes file found under a directory
    Import {
        /// Directory to scan
        source_dir: PathBuf,

        /// Clear existing recipes before importing
        #[arg(long)]
        clear: bool,
    },

    /// Add one recipe, e.g. "2 Oak Planks (Minecraft) = 4 Sticks (Minecraft)"
    Add {
        recipe: String,
    },

    /// Calculate the raw materials for a target item
    Calc {
        /// Item to make, e.g. "Sticks (Minecraft)"
        item: String,

        /// Quantity of the item to make
        #[arg(short, long, default_value = "1.0")]
        quantity: f64,

        /// Print the materials after every expansion pass
        #[arg(short, long)]
        verbose: bool,

        /// Give up after this many passes (guards against cyclic recipes)
        #[arg(long, default_value_t = DEFAULT_MAX_PASSES)]
        max_passes: usize,
    },

    /// List all recipes in the catalog
    ListRecipes,

    /// List all items some recipe produces
    ListItems,

    /// Show the recipe that produces an item
    Recipe {
        /// Item key, e.g. "Sticks (Minecraft)"
        item: String,
    },

    /// Initialize empty catalog with schema
    Init,

    /// Load sample recipes for testing
    LoadSample,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Import { source_dir, clear } => {
            if clear {
                println!("Clearing existing recipes...");
                db::clear_catalog(&conn)?;
            }

            let stats = import::import_to_database(&conn, &source_dir)?;
            println!("{}", stats);
        }

        Commands::Add { recipe } => {
            let recipe = parser::parse_recipe(&recipe)?;
            match db::insert_recipe(&conn, &recipe)? {
                Some(id) => println!("Added recipe {}: {}", id, recipe),
                None => println!("Recipe already in catalog: {}", recipe),
            }
        }

        Commands::Calc {
            item,
            quantity,
            verbose,
            max_passes,
        } => {
            let item = parser::parse_item(&item)?;
            let Some(recipe) = db::get_producer(&conn, &item.key())? else {
                bail!("No recipe produces '{}'. Run 'list-items' to see what can be made.", item);
            };

            let database = db::load_recipe_database(&conn)?;
            info!(item = %item, quantity, recipes = database.len(), "calculating bill of materials");

            let mut job = Job::new(item, quantity, recipe)?.with_max_passes(max_passes);
            job.register_recipe_database(&database);

            if verbose {
                println!("{}\n", job.key());
                println!("Pass 0: {}", job.materials());
                job.calculate_bill_of_materials_with(|pass, materials| {
                    println!("Pass {}: {}", pass, materials);
                })?;
                println!();
            } else {
                job.calculate_bill_of_materials()?;
            }

            println!("{}", job.summarize());
        }

        Commands::ListRecipes => {
            let recipes = db::list_recipes(&conn)?;
            if recipes.is_empty() {
                println!("No recipes in catalog. Run 'import', 'add' or 'load-sample' first.");
            } else {
                for recipe in recipes {
                    println!("{}", recipe);
                }
            }
        }

        Commands::ListItems => {
            let items = db::list_producible_items(&conn)?;
            if items.is_empty() {
                println!("No recipes in catalog. Run 'import', 'add' or 'load-sample' first.");
            } else {
                println!("Producible items:");
                for item in items {
                    println!("  {}", item);
                }
            }
        }

        Commands::Recipe { item } => {
            let item = parser::parse_item(&item)?;
            match db::get_producer(&conn, &item.key())? {
                Some(recipe) => {
                    println!("{}", item.info());
                    println!("  Recipe: {}", recipe);
                    for component in recipe.reactants().iter().chain(recipe.products()) {
                        println!("    {}", component.info());
                    }
                }
                None => println!("No recipe produces '{}'", item),
            }
        }

        Commands::Init => {
            println!("Catalog initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let loaded = load_sample_data(&conn)?;
            println!("Loaded {} sample recipes", loaded);
        }
    }

    Ok(())
}

const SAMPLE_RECIPES: &str = "\
@source Minecraft
1 Cobblestone = 1 Button
2 Oak Planks = 4 Sticks
1 Oak Wood = 4 Oak Planks
1 Coal + 1 Sticks = 4 Torch
3 Oak Planks + 2 Sticks = 3 Oak Fence
1 Cobblestone + 320 Minecraft Joules (BuildCraft) + 1 (nc) Pulverizer (Thermal Foundation) = 1 Gravel + 0.1 (p) Sand
4 Sand = 1 Sandstone
";

/// Load a small Minecraft catalog for trying the calculator without import files
fn load_sample_data(conn: &Connection) -> Result<usize> {
    db::clear_catalog(conn)?;

    let mut parser = RecipeParser::new()?;
    let parsed = import::parse_recipe_text(&mut parser, SAMPLE_RECIPES);
    if let Some(error) = parsed.errors.first() {
        bail!("sample recipe line {}: {}", error.line, error.message);
    }

    let mut loaded = 0;
    for recipe in &parsed.recipes {
        if db::insert_recipe(conn, recipe)?.is_some() {
            loaded += 1;
        }
    }
    Ok(loaded)
}
