// Embeddings module
// Text-to-vector collaborator used by seeding and by query-time retrieval

pub mod ollama;

use anyhow::Result;
use async_trait::async_trait;

pub use ollama::{ModelInfo, OllamaClient, OllamaEmbedder};

/// Turns text into fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input, in input order,
/// and every vector must have [`Embedder::dimension`] entries.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
