use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cache::ProductCache;
use crate::config::Config;
use crate::embeddings::GeminiClient;
use crate::index::VectorIndex;
use crate::store::{MetadataStore, NewProduct, Source};

fn load_config(data_dir: Option<PathBuf>) -> Result<Config> {
    let base_dir = match data_dir {
        Some(dir) => dir,
        None => Config::default_base_dir().context("Failed to resolve the data directory")?,
    };
    Config::load(base_dir)
}

fn open_cache(config: &Config) -> Result<ProductCache> {
    let client = GeminiClient::new(&config.embedding)
        .context("Failed to initialize the embedding client")?;
    ProductCache::open(config, Box::new(client))
}

/// Write a default config file so it can be edited by hand.
#[inline]
pub fn init_config(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(data_dir)?;
    let config_path = config.config_file_path();

    if config_path.exists() {
        println!("Config file already exists: {}", config_path.display());
        return Ok(());
    }

    config.save()?;
    println!("Wrote default config to {}", config_path.display());
    Ok(())
}

/// Print the effective configuration.
#[inline]
pub fn show_config(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(data_dir)?;

    println!("Data directory: {}", config.get_base_dir().display());
    println!("Embedding API:  {}", config.embedding.base_url);
    println!("Model:          {}", config.embedding.model);
    println!("Dimension:      {}", config.embedding.dimension);
    println!("API key env:    {}", config.embedding.api_key_env);
    println!(
        "Retry policy:   {} retries, {}s delay",
        config.embedding.retry_attempts, config.embedding.retry_delay_seconds
    );
    Ok(())
}

/// Query the cache by feature descriptions and print the structured outcome.
#[inline]
pub fn search_cache(data_dir: Option<PathBuf>, features: Vec<String>) -> Result<()> {
    let config = load_config(data_dir)?;
    let cache = open_cache(&config)?;

    info!("Searching cache with {} features", features.len());
    let outcome = cache.search(&features)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialize search outcome")?
    );
    Ok(())
}

/// Insert a verified product into the cache.
#[inline]
#[expect(clippy::too_many_arguments, reason = "mirrors the record fields")]
pub fn save_product(
    data_dir: Option<PathBuf>,
    name: String,
    brand: String,
    category: String,
    features: Vec<String>,
    source: String,
    country: Option<String>,
    lang: Option<String>,
) -> Result<()> {
    let config = load_config(data_dir)?;
    let mut cache = open_cache(&config)?;

    let source: Source = source.parse()?;
    let outcome = cache.save(NewProduct {
        product_name: name,
        brand,
        category,
        key_features: features,
        source,
        country,
        lang,
    })?;

    println!("{}", outcome.message);
    Ok(())
}

/// Report cache contents and file locations without touching the network.
#[inline]
pub fn show_status(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(data_dir)?;

    println!("Data directory: {}", config.get_base_dir().display());

    let store = MetadataStore::load(config.metadata_path())?;
    println!("Products:       {}", store.len());
    println!("Next key:       {}", store.next_key());

    let index_path = config.index_path();
    if index_path.exists() {
        let index = VectorIndex::load(&index_path)?;
        println!(
            "Vector index:   {} entries (dimension {})",
            index.len(),
            index.dimension()
        );
    } else {
        println!("Vector index:   not created yet");
    }

    let legacy_path = config.legacy_db_path();
    if legacy_path.exists() {
        println!("Legacy file:    {} (imported on first use)", legacy_path.display());
    }

    Ok(())
}
