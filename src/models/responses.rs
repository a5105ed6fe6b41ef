use serde::{Deserialize, Serialize};
use crate::models::domain::{DetailedScore, RankedMatch, ScoredResource};

/// Response for the similar case studies endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarCaseStudiesResponse {
    pub similar_cases: Vec<RankedMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_file: Option<String>,
}

/// Response carrying the full score matrix
#[derive(Debug, Clone, Serialize)]
pub struct CaseScoresResponse {
    pub scores: Vec<DetailedScore>,
    pub total_candidates: usize,
}

/// Response for the similar resources endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarResourcesResponse {
    pub resources: Vec<ScoredResource>,
}

/// Response for export endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub csv_file: String,
    pub total_rows: usize,
}

/// Response for the embedding refresh endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshEmbeddingsResponse {
    pub updated: usize,
    pub failed: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
