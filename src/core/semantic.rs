//! Embedding capability contract and the semantic comparator built on it.

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced while obtaining an embedding vector
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Embedding API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Malformed stored vector: {0}")]
    MalformedVector(String),
}

impl EmbeddingError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            EmbeddingError::ApiError { status, .. } => *status == 429 || *status >= 500,
            EmbeddingError::InvalidResponse(_) | EmbeddingError::MalformedVector(_) => false,
        }
    }
}

/// Text to vector capability
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Embed one side of a semantic comparison
///
/// Blank text yields `Ok(None)` without calling the embedder, which callers
/// score as 0.0. Failures are returned so they can be told apart from a
/// genuine zero.
pub async fn embed_text(embedder: &dyn Embedder, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    embedder.embed(text).await.map(Some)
}

/// Parse a persisted embedding payload
///
/// Accepts a JSON float array, which also covers the pgvector text form
/// `[0.1,0.2,...]`.
pub fn parse_stored_vector(raw: &str) -> Result<Vec<f32>, EmbeddingError> {
    let vector: Vec<f32> = serde_json::from_str(raw.trim())
        .map_err(|e| EmbeddingError::MalformedVector(e.to_string()))?;

    if vector.is_empty() {
        return Err(EmbeddingError::MalformedVector("empty vector".to_string()));
    }

    Ok(vector)
}
