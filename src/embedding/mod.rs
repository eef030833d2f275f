//! Embedding generation for semantic retrieval.
//!
//! Chunks and queries are embedded through an OpenAI-compatible API when
//! a key is configured, or through a deterministic hash-based fallback
//! otherwise. All vectors are L2-normalized before storage so cosine
//! similarity reduces to a dot product.

mod fallback;
mod remote;

pub use fallback::HashEmbedder;
pub use remote::ApiEmbedder;

use async_trait::async_trait;

use crate::chunking::Chunk;
use crate::config::Settings;
use crate::error::Result;

/// Embedding dimension of the default model.
///
/// This is the authoritative dimension across the index; vectors of any
/// other length are rejected at upsert time.
pub const EMBED_DIM: usize = 768;

/// Trait for embedding generators.
///
/// Implementations must be thread-safe to support concurrent sub-agents.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimension.
    fn dimensions(&self) -> usize;

    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails after retries.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds multiple texts. The default implementation embeds
    /// sequentially; implementations may batch.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails for any text.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Creates the default embedder for the given settings: the API-backed
/// embedder when a key is configured, the deterministic fallback
/// otherwise.
#[must_use]
pub fn create_embedder(settings: &Settings) -> Box<dyn Embedder> {
    if settings.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
        Box::new(ApiEmbedder::new(settings))
    } else {
        Box::new(HashEmbedder::new(EMBED_DIM))
    }
}

/// Normalizes a vector to unit length. Zero vectors pass through.
#[must_use]
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in &mut vector {
            *value /= magnitude;
        }
    }
    vector
}

/// Cosine similarity between two vectors. Returns 0.0 for mismatched
/// lengths or zero magnitudes.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Formats a chunk into its embedding input:
/// `[doc: name] [type: file_type] [section: a > b]\n<text>`.
#[must_use]
pub fn format_chunk_for_embedding(chunk: &Chunk) -> String {
    let mut parts = Vec::new();
    if !chunk.doc_name.is_empty() {
        parts.push(format!("[doc: {}]", chunk.doc_name));
    }
    if !chunk.file_type.is_empty() {
        parts.push(format!("[type: {}]", chunk.file_type));
    }
    if !chunk.heading_path.is_empty() {
        parts.push(format!("[section: {}]", chunk.heading_path.join(" > ")));
    }
    let header = parts.join(" ");
    if header.is_empty() {
        chunk.text.clone()
    } else {
        format!("{header}\n{}", chunk.text)
    }
}
