// Embedding provider abstraction
// The cache only depends on this trait; the Gemini client is the production impl

pub mod gemini;

use anyhow::Result;

pub use gemini::GeminiClient;

/// Converts free-text feature descriptions into fixed-length float vectors.
pub trait EmbeddingProvider {
    /// Embed a batch of texts. Returns one vector per input, order-preserving.
    ///
    /// A failure here is fatal for the invoking operation; no fallback vector
    /// is ever synthesized.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of every vector returned by `embed`.
    fn dimension(&self) -> usize;
}
