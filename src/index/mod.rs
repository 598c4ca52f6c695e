#[cfg(test)]
mod tests;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::{CacheError, Result};

const MAGIC: [u8; 4] = *b"PVIX";
const FORMAT_VERSION: u32 = 1;

/// Fixed-dimension cosine similarity index over `u64` surrogate keys.
///
/// The store is append-mostly and small, so an exact scan satisfies the
/// nearest-neighbor contract. Vectors are held in one flat buffer, row per key.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    keys: Vec<u64>,
    vectors: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index for vectors of the given dimensionality.
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            keys: Vec::new(),
            vectors: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    #[inline]
    pub fn contains_key(&self, key: u64) -> bool {
        self.keys.contains(&key)
    }

    /// Add a vector under a fresh key.
    ///
    /// Keys are allocated by the metadata store's counter and must not repeat;
    /// a duplicate insertion is rejected rather than silently overwriting.
    #[inline]
    pub fn insert(&mut self, key: u64, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(CacheError::Index(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        if self.contains_key(key) {
            return Err(CacheError::Index(format!(
                "Key {} already exists in the index",
                key
            )));
        }

        self.keys.push(key);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    /// Top-k nearest neighbors as `(key, cosine distance)` pairs, ascending
    /// distance (closest first). An empty index yields an empty result.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        if query.len() != self.dimension {
            return Err(CacheError::Index(format!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }
        if self.keys.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(u64, f32)> = self
            .keys
            .iter()
            .zip(self.vectors.chunks_exact(self.dimension))
            .map(|(&key, row)| (key, cosine_distance(query, row)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }

    /// Drop every entry whose key fails the predicate. Returns the number of
    /// removed entries. Used at startup to discard index rows that lost their
    /// metadata counterpart.
    #[inline]
    pub fn retain_keys<F>(&mut self, keep: F) -> usize
    where
        F: Fn(u64) -> bool,
    {
        let before = self.keys.len();
        let mut keys = Vec::with_capacity(before);
        let mut vectors = Vec::with_capacity(self.vectors.len());

        for (&key, row) in self.keys.iter().zip(self.vectors.chunks_exact(self.dimension)) {
            if keep(key) {
                keys.push(key);
                vectors.extend_from_slice(row);
            }
        }

        self.keys = keys;
        self.vectors = vectors;
        before - self.keys.len()
    }

    /// Serialize the full index to a single binary file, atomically.
    #[inline]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = tmp_sibling(path);

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        let dimension = u32::try_from(self.dimension)
            .map_err(|_| CacheError::Index(format!("Dimension too large: {}", self.dimension)))?;
        writer.write_all(&dimension.to_le_bytes())?;
        writer.write_all(&(self.keys.len() as u64).to_le_bytes())?;

        for (&key, row) in self.keys.iter().zip(self.vectors.chunks_exact(self.dimension)) {
            writer.write_all(&key.to_le_bytes())?;
            for &value in row {
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, path)?;

        debug!("Saved vector index with {} entries to {}", self.keys.len(), path.display());
        Ok(())
    }

    /// Deserialize an index from disk, validating format version and
    /// dimensionality. Mixing dimensions across an index file's lifetime is
    /// rejected by the caller comparing against its configured dimension.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(CacheError::Index(format!(
                "Not a vector index file: {}",
                path.display()
            )));
        }

        let version = read_u32(&mut reader)?;
        if version != FORMAT_VERSION {
            return Err(CacheError::Index(format!(
                "Unsupported index format version: {}",
                version
            )));
        }

        let dimension = read_u32(&mut reader)? as usize;
        let count = read_u64(&mut reader)? as usize;

        let mut index = Self {
            dimension,
            keys: Vec::with_capacity(count),
            vectors: Vec::with_capacity(count.saturating_mul(dimension)),
        };

        for _ in 0..count {
            let key = read_u64(&mut reader)?;
            if index.contains_key(key) {
                return Err(CacheError::Index(format!(
                    "Corrupt index file: duplicate key {}",
                    key
                )));
            }
            index.keys.push(key);
            for _ in 0..dimension {
                index.vectors.push(read_f32(&mut reader)?);
            }
        }

        info!(
            "Loaded vector index with {} entries (dimension {}) from {}",
            index.keys.len(),
            dimension,
            path.display()
        );
        Ok(index)
    }
}

/// Cosine distance in [0, 2]; lower is closer. Zero-norm vectors are treated
/// as maximally dissimilar rather than propagating a NaN.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}
