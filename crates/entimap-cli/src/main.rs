//! entimap CLI
//!
//! Command-line interface over the blog model

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use entimap_core::logging_facility::{self, Profile};

mod commands;
mod config;
mod model;

use config::CliConfig;

#[derive(Debug, Parser)]
#[command(name = "entimap")]
#[command(about = "entimap - Entity mapping and persistence", long_about = None)]
struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Logging profile: development or production
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Insert a category and print its generated id
    InsertCategory(commands::insert::InsertCategoryArgs),
    /// Print a stored category
    ShowCategory(commands::show::ShowCategoryArgs),
    /// Print resolved storage shapes or their DDL
    Describe(commands::describe::DescribeArgs),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    if let Some(profile) = cli.log.as_deref().or(config.logging.profile.as_deref()) {
        logging_facility::init(profile.parse::<Profile>()?);
    }

    let db = config.db_path(cli.db);
    tracing::debug!(db = %db.display(), "cli configured");

    match cli.command {
        Commands::InsertCategory(args) => commands::insert::execute(args, &db),
        Commands::ShowCategory(args) => commands::show::execute(args, &db),
        Commands::Describe(args) => commands::describe::execute(args),
    }
}
