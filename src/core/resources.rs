use crate::core::comparators::cosine_similarity;
use crate::core::semantic::parse_stored_vector;
use crate::models::{ScoredResource, StoredResource};

/// Score every resource that carries a usable stored embedding
///
/// Resources without an embedding, or whose payload does not parse, are
/// skipped. Output keeps resource order; scores are unrounded.
pub fn score_resources(query: &[f32], resources: &[StoredResource]) -> Vec<ScoredResource> {
    resources
        .iter()
        .filter_map(|stored| {
            let raw = stored.embedding.as_deref()?;
            match parse_stored_vector(raw) {
                Ok(vector) => Some(ScoredResource {
                    resource: stored.resource.clone(),
                    similarity_score: cosine_similarity(query, &vector),
                }),
                Err(e) => {
                    tracing::warn!(resource_id = %stored.resource.id, error = %e, "Skipping resource embedding");
                    None
                }
            }
        })
        .collect()
}

/// Top `k` resources by similarity, stable on ties
pub fn rank_resources(mut scored: Vec<ScoredResource>, k: usize) -> Vec<ScoredResource> {
    scored.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    scored.truncate(k);
    scored
}
