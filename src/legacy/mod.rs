
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use crate::store::{DEFAULT_COUNTRY, DEFAULT_LANG, ProductRecord, Source};
use crate::{CacheError, Result};

/// The legacy flat record collection: `{ "products": [ ... ] }`.
/// Consumed once by the migration and never written back to.
#[derive(Debug, Default, Deserialize)]
pub struct LegacyDatabase {
    #[serde(default)]
    pub products: Vec<LegacyProduct>,
}

/// A record as found in the legacy file. Every field is optional in practice,
/// so everything defaults and conversion fills the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyProduct {
    pub id: String,
    pub product_name: String,
    pub brand: String,
    pub category: String,
    pub key_features: Vec<String>,
    pub source: Source,
    pub country: String,
    pub lang: String,
    pub created_at: String,
}

impl LegacyDatabase {
    /// Read the legacy file. Absent or blank files yield an empty database;
    /// only a present-but-unparseable file is an error.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let db: Self = serde_json::from_str(&content).map_err(|e| {
            CacheError::Migration(format!(
                "Failed to parse legacy database {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!(
            "Loaded legacy database with {} products from {}",
            db.products.len(),
            path.display()
        );
        Ok(db)
    }
}

impl LegacyProduct {
    /// Joined feature text used for embedding. A record whose text is blank
    /// carries no retrievable evidence and is skipped by the migration.
    #[inline]
    pub fn feature_text(&self) -> String {
        self.key_features.join(" ")
    }

    /// Convert into a typed record, repairing loose legacy fields: an
    /// unparseable id becomes a fresh one, a blank timestamp becomes now,
    /// missing locale tags get the defaults.
    #[inline]
    pub fn into_record(self) -> ProductRecord {
        let id = Uuid::parse_str(&self.id).unwrap_or_else(|_| Uuid::new_v4());
        let created_at = NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.f")
            .unwrap_or_else(|_| Local::now().naive_local());
        let country = if self.country.is_empty() {
            DEFAULT_COUNTRY.to_string()
        } else {
            self.country
        };
        let lang = if self.lang.is_empty() {
            DEFAULT_LANG.to_string()
        } else {
            self.lang
        };

        ProductRecord {
            id,
            product_name: self.product_name,
            brand: self.brand,
            category: self.category,
            key_features: self.key_features,
            source: self.source,
            country,
            lang,
            created_at,
        }
    }
}
