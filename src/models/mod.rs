// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CaseField, CaseProfile, CaseStudy, ComparatorKind, DetailedScore, FieldScores, FieldValue,
    RankedMatch, Resource, ResourceScore, ScoredResource, StoredResource,
};
pub use requests::{ResourceExportRequest, SimilarCaseStudiesRequest, SimilarResourcesRequest};
pub use responses::{
    CaseScoresResponse, ErrorResponse, ExportResponse, HealthResponse, RefreshEmbeddingsResponse,
    SimilarCaseStudiesResponse, SimilarResourcesResponse,
};
