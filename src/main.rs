use clap::{Parser, Subcommand};
use product_cache::Result;
use product_cache::commands::{init_config, save_product, search_cache, show_config, show_status};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "product-cache")]
#[command(about = "Local semantic cache for identified retail products")]
#[command(version)]
struct Cli {
    /// Override the data directory holding the config and cache files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file, or show the effective configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Search the cache by feature descriptions
    Search {
        /// Feature descriptions, e.g. "red aluminum can" "355ml"
        #[arg(required = true)]
        features: Vec<String>,
    },
    /// Save a verified product into the cache
    Save {
        /// Product name
        #[arg(long)]
        name: String,
        /// Brand name
        #[arg(long)]
        brand: String,
        /// Freeform category
        #[arg(long, default_value = "")]
        category: String,
        /// Feature description; repeat for multiple features
        #[arg(long = "feature", required = true)]
        features: Vec<String>,
        /// Provenance tag: image, local_db or google_search
        #[arg(long, default_value = "google_search")]
        source: String,
        /// Country code, e.g. KR, US, JP
        #[arg(long)]
        country: Option<String>,
        /// Language code, e.g. ko, en, ja
        #[arg(long)]
        lang: Option<String>,
    },
    /// Show cache contents and file locations
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(cli.data_dir)?;
            } else {
                init_config(cli.data_dir)?;
            }
        }
        Commands::Search { features } => {
            search_cache(cli.data_dir, features)?;
        }
        Commands::Save {
            name,
            brand,
            category,
            features,
            source,
            country,
            lang,
        } => {
            save_product(
                cli.data_dir,
                name,
                brand,
                category,
                features,
                source,
                country,
                lang,
            )?;
        }
        Commands::Status => {
            show_status(cli.data_dir)?;
        }
    }

    Ok(())
}
