
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::legacy::LegacyDatabase;
use crate::store::{MetadataStore, NewProduct};

/// Candidates scoring below this similarity are never reported.
pub const SCORE_FLOOR: f32 = 0.3;

/// Maximum number of neighbors considered per query.
pub const SEARCH_LIMIT: usize = 3;

/// One match returned by a cache query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub product_name: String,
    pub brand: String,
    pub category: String,
    pub key_features: Vec<String>,
    /// Cosine similarity rounded to 2 decimal places.
    pub score: f32,
}

/// Structured result of a query. "Nothing matched" is a normal outcome, not
/// an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub found: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
}

impl SearchOutcome {
    fn not_found() -> Self {
        Self {
            found: false,
            candidates: Vec::new(),
        }
    }
}

/// Structured result of a save. A dedup hit is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub saved: bool,
    pub message: String,
}

/// The semantic product cache: a vector index and a metadata store kept in
/// lock-step, plus the embedding provider that vectorizes feature text.
///
/// Construct one per process via [`ProductCache::open`] and pass it to every
/// caller; it exclusively owns the in-memory state and the on-disk files.
pub struct ProductCache {
    provider: Box<dyn EmbeddingProvider>,
    index: VectorIndex,
    store: MetadataStore,
    index_path: PathBuf,
}

impl ProductCache {
    /// Load both structures from disk, reconcile them, and run the one-shot
    /// legacy migration when this is the first start with an empty cache.
    #[inline]
    pub fn open(config: &Config, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        let dimension = config.embedding.dimension as usize;
        if provider.dimension() != dimension {
            return Err(anyhow::anyhow!(
                "Embedding provider dimension {} does not match configured dimension {}",
                provider.dimension(),
                dimension
            ));
        }

        fs::create_dir_all(config.get_base_dir()).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                config.get_base_dir().display()
            )
        })?;

        // Metadata first: it is the source of truth for what exists.
        let store = MetadataStore::load(config.metadata_path())
            .context("Failed to load metadata store")?;

        let index_path = config.index_path();
        let index_exists = index_path.exists();
        let mut cache = if index_exists {
            let mut index =
                VectorIndex::load(&index_path).context("Failed to load vector index")?;
            if index.dimension() != dimension {
                return Err(anyhow::anyhow!(
                    "Index file dimension {} does not match configured dimension {}",
                    index.dimension(),
                    dimension
                ));
            }

            // The index is a rebuildable secondary structure: a key it holds
            // without a metadata counterpart is an orphan from a crash window
            // and gets dropped.
            let orphans = index.retain_keys(|key| store.contains_key(key));
            if orphans > 0 {
                warn!(
                    "Dropped {} orphaned index entries without metadata records",
                    orphans
                );
            }

            let unindexed = store.keys().filter(|&key| !index.contains_key(key)).count();
            if unindexed > 0 {
                warn!(
                    "{} metadata records have no index entry and will not be retrievable",
                    unindexed
                );
            }

            Self {
                provider,
                index,
                store,
                index_path,
            }
        } else {
            if !store.is_empty() {
                warn!(
                    "Metadata store has {} records but the index file is missing; \
                     existing records will not be retrievable",
                    store.len()
                );
            }

            Self {
                provider,
                index: VectorIndex::new(dimension),
                store,
                index_path,
            }
        };

        if !index_exists && cache.store.is_empty() {
            cache
                .migrate_legacy(&config.legacy_db_path())
                .context("Legacy database migration failed")?;
        }

        Ok(cache)
    }

    /// Number of records in the cache.
    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Query the cache by feature text.
    ///
    /// An empty index or an empty feature list short-circuits to "not found"
    /// without calling the embedding provider.
    #[inline]
    pub fn search(&self, key_features: &[String]) -> Result<SearchOutcome> {
        if self.index.is_empty() || key_features.is_empty() {
            debug!("Search short-circuited: empty index or no features");
            return Ok(SearchOutcome::not_found());
        }

        let query_text = key_features.join(" ");
        let vectors = self
            .provider
            .embed(&[query_text])
            .context("Failed to embed search query")?;
        let query = vectors
            .into_iter()
            .next()
            .context("Embedding provider returned no vector for the query")?;

        let limit = SEARCH_LIMIT.min(self.index.len());
        let neighbors = self.index.search(&query, limit)?;

        let mut candidates = Vec::with_capacity(neighbors.len());
        for (key, distance) in neighbors {
            // cosine metric: distance = 1 - similarity
            let score = round_score(1.0 - distance);
            if score < SCORE_FLOOR {
                continue;
            }

            let Some(record) = self.store.get(key) else {
                // index/store desynchronization; treat as no match
                warn!("Index key {} has no metadata record, skipping", key);
                continue;
            };

            candidates.push(Candidate {
                product_name: record.product_name.clone(),
                brand: record.brand.clone(),
                category: record.category.clone(),
                key_features: record.key_features.clone(),
                score,
            });
        }

        if candidates.is_empty() {
            debug!("No candidates above the similarity floor");
            return Ok(SearchOutcome::not_found());
        }

        Ok(SearchOutcome {
            found: true,
            candidates,
        })
    }

    /// Insert a verified product, enforcing the `(product_name, brand)` dedup
    /// rule. A duplicate is an idempotent no-op: no embedding call, no
    /// mutation.
    #[inline]
    pub fn save(&mut self, product: NewProduct) -> Result<SaveOutcome> {
        if self
            .store
            .contains_product(&product.product_name, &product.brand)
        {
            debug!(
                "Duplicate product '{}' ({}) rejected",
                product.product_name, product.brand
            );
            return Ok(SaveOutcome {
                saved: false,
                message: format!(
                    "'{}' by '{}' already exists in the cache",
                    product.product_name, product.brand
                ),
            });
        }

        let doc_text = product.key_features.join(" ");
        if doc_text.trim().is_empty() {
            return Ok(SaveOutcome {
                saved: false,
                message: format!(
                    "'{}' has no key features and cannot be indexed",
                    product.product_name
                ),
            });
        }

        let vectors = self
            .provider
            .embed(&[doc_text])
            .context("Failed to embed product features")?;
        let vector = vectors
            .into_iter()
            .next()
            .context("Embedding provider returned no vector for the product")?;

        let product_name = product.product_name.clone();
        let key = self.store.allocate_key();
        self.index.insert(key, &vector)?;
        self.store.insert(key, product.into_record())?;

        self.persist()?;

        info!("Saved product '{}' under key {}", product_name, key);
        Ok(SaveOutcome {
            saved: true,
            message: format!("'{}' saved to the cache", product_name),
        })
    }

    /// One-shot import of the legacy flat record collection. Returns how many
    /// records were migrated.
    fn migrate_legacy(&mut self, legacy_path: &std::path::Path) -> Result<usize> {
        let legacy = LegacyDatabase::load(legacy_path)?;
        if legacy.products.is_empty() {
            return Ok(0);
        }

        let mut texts = Vec::new();
        let mut records = Vec::new();
        for product in legacy.products {
            let text = product.feature_text();
            if text.trim().is_empty() {
                // no textual evidence, cannot be retrieved later
                debug!(
                    "Skipping legacy product '{}' with no features",
                    product.product_name
                );
                continue;
            }
            texts.push(text);
            records.push(product.into_record());
        }

        if texts.is_empty() {
            return Ok(0);
        }

        // One batch call for the whole file.
        let vectors = self
            .provider
            .embed(&texts)
            .context("Failed to embed legacy products")?;
        if vectors.len() != records.len() {
            return Err(anyhow::anyhow!(
                "Embedding provider returned {} vectors for {} legacy products",
                vectors.len(),
                records.len()
            ));
        }

        let migrated = records.len();
        for (record, vector) in records.into_iter().zip(vectors) {
            let key = self.store.allocate_key();
            self.index.insert(key, &vector)?;
            self.store.insert(key, record)?;
        }

        self.persist()?;

        info!(
            "Migrated {} products from legacy database {}",
            migrated,
            legacy_path.display()
        );
        Ok(migrated)
    }

    /// Flush both structures to disk, metadata first so that a crash between
    /// the two writes can only strand index entries (dropped on next open),
    /// never metadata.
    fn persist(&self) -> Result<()> {
        self.store.persist().context("Failed to persist metadata store")?;
        self.index
            .save(&self.index_path)
            .context("Failed to persist vector index")?;
        Ok(())
    }
}

fn round_score(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
