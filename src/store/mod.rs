
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::{CacheError, Result};

pub const DEFAULT_COUNTRY: &str = "KR";
pub const DEFAULT_LANG: &str = "ko";

/// Provenance of a stored record.
///
/// The cache itself never persists `Image` or `LocalDb` records; identification
/// results only enter the store after external verification. Legacy imports may
/// carry tags outside the known set, which collapse to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Image,
    LocalDb,
    GoogleSearch,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Source {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Source::Image => write!(f, "image"),
            Source::LocalDb => write!(f, "local_db"),
            Source::GoogleSearch => write!(f, "google_search"),
            Source::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = CacheError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(Source::Image),
            "local_db" => Ok(Source::LocalDb),
            "google_search" => Ok(Source::GoogleSearch),
            "unknown" => Ok(Source::Unknown),
            other => Err(CacheError::Store(format!("Unknown source tag: {}", other))),
        }
    }
}

/// A resolved product as stored in the cache. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub product_name: String,
    pub brand: String,
    pub category: String,
    pub key_features: Vec<String>,
    pub source: Source,
    pub country: String,
    pub lang: String,
    pub created_at: NaiveDateTime,
}

/// Caller-supplied fields for a save operation. The cache assigns `id`,
/// `created_at` and the surrogate key itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_name: String,
    pub brand: String,
    pub category: String,
    pub key_features: Vec<String>,
    pub source: Source,
    pub country: Option<String>,
    pub lang: Option<String>,
}

impl NewProduct {
    /// Materialize the record, filling in identity, timestamp and locale
    /// defaults.
    #[inline]
    pub fn into_record(self) -> ProductRecord {
        ProductRecord {
            id: Uuid::new_v4(),
            product_name: self.product_name,
            brand: self.brand,
            category: self.category,
            key_features: self.key_features,
            source: self.source,
            country: self.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            lang: self.lang.unwrap_or_else(|| DEFAULT_LANG.to_string()),
            created_at: Local::now().naive_local(),
        }
    }
}

/// Durable map from surrogate key to product record, backed by one JSON file:
/// `{ "products": { "<key>": { ... } }, "next_key": <int> }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataStore {
    #[serde(default)]
    products: BTreeMap<u64, ProductRecord>,
    #[serde(default)]
    next_key: u64,
    #[serde(skip)]
    path: PathBuf,
}

impl MetadataStore {
    /// Load the store from disk. A missing or blank file is a valid initial
    /// state and yields an empty store, never an error.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            debug!("Metadata file {} not found, starting empty", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self {
                path: path.to_path_buf(),
                ..Self::default()
            });
        }

        let mut store: Self = serde_json::from_str(&content).map_err(|e| {
            CacheError::Store(format!(
                "Failed to parse metadata file {}: {}",
                path.display(),
                e
            ))
        })?;
        store.path = path.to_path_buf();

        debug!(
            "Loaded metadata store with {} records (next_key {}) from {}",
            store.products.len(),
            store.next_key,
            path.display()
        );
        Ok(store)
    }

    /// Serialize the full store back to disk, atomically (write-temp-then-
    /// rename), overwriting the previous file.
    #[inline]
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|e| {
            CacheError::Store(format!("Failed to serialize metadata store: {}", e))
        })?;

        let tmp_path = tmp_sibling(&self.path);
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!(
            "Persisted metadata store with {} records to {}",
            self.products.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Hand out the next surrogate key. The counter is monotonic and persisted
    /// alongside the map; the caller is responsible for inserting the record.
    #[inline]
    pub fn allocate_key(&mut self) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    #[inline]
    pub fn insert(&mut self, key: u64, record: ProductRecord) -> Result<()> {
        if self.products.contains_key(&key) {
            return Err(CacheError::Store(format!(
                "Key {} already exists in the metadata store",
                key
            )));
        }
        self.products.insert(key, record);
        Ok(())
    }

    #[inline]
    pub fn get(&self, key: u64) -> Option<&ProductRecord> {
        self.products.get(&key)
    }

    #[inline]
    pub fn contains_key(&self, key: u64) -> bool {
        self.products.contains_key(&key)
    }

    /// Exact `(product_name, brand)` dedup check, independent of vector
    /// similarity.
    #[inline]
    pub fn contains_product(&self, product_name: &str, brand: &str) -> bool {
        self.products
            .values()
            .any(|record| record.product_name == product_name && record.brand == brand)
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.products.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    #[inline]
    pub fn next_key(&self) -> u64 {
        self.next_key
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
