use actix_web::{web, HttpResponse, Responder};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use validator::Validate;

use crate::core::{
    rank_resources, round_to, score_resources, Embedder, ExportTable, Matcher,
};
use crate::models::{
    CaseProfile, CaseScoresResponse, ErrorResponse, ExportResponse, HealthResponse,
    RefreshEmbeddingsResponse, ResourceExportRequest, ResourceScore, SimilarCaseStudiesRequest,
    SimilarCaseStudiesResponse, SimilarResourcesRequest, SimilarResourcesResponse,
};
use crate::routes::auth::ApiKey;
use crate::services::{CaseStore, ExportSink, ResourceStore, StorageError};

/// File name prefix of case-study similarity exports
pub const CASE_EXPORT_PREFIX: &str = "case_similarity_scores";

/// File name prefix of resource similarity exports
pub const RESOURCE_EXPORT_PREFIX: &str = "resource_similarity_scores";

/// Decimal places of similarity scores returned by the resource endpoint
const RESOURCE_RESPONSE_DECIMALS: i32 = 3;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub cases: Arc<dyn CaseStore>,
    pub resources: Arc<dyn ResourceStore>,
    pub embedder: Arc<dyn Embedder>,
    pub exporter: Arc<dyn ExportSink>,
    pub matcher: Matcher,
    pub api_key: Arc<str>,
    pub request_timeout: Duration,
}

/// Configure all similarity routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/similar-case-studies/similar", web::post().to(similar_case_studies))
        .route("/similar-case-studies/scores", web::post().to(case_study_scores))
        .route("/similar-resources/similar", web::post().to(similar_resources))
        .route("/similar-resources/export", web::post().to(export_resource_scores))
        .route("/resources/embeddings/refresh", web::post().to(refresh_resource_embeddings));
}

fn error_response(status: u16, error: &str, message: impl ToString) -> HttpResponse {
    let body = ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
        status_code: status,
    };

    match status {
        400 => HttpResponse::BadRequest().json(body),
        404 => HttpResponse::NotFound().json(body),
        502 => HttpResponse::BadGateway().json(body),
        504 => HttpResponse::GatewayTimeout().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

fn storage_error(context: &str, e: StorageError) -> HttpResponse {
    tracing::error!("{}: {}", context, e);
    match e {
        StorageError::NotFound(_) => error_response(404, context, e),
        StorageError::SqlxError(_) => error_response(500, context, e),
    }
}

/// Write an export table on the blocking pool so file I/O stays off the
/// async workers
async fn persist_export(
    state: &AppState,
    table: ExportTable,
    prefix: &'static str,
) -> Result<PathBuf, HttpResponse> {
    let exporter = state.exporter.clone();

    match web::block(move || exporter.persist(&table, prefix)).await {
        Ok(Ok(path)) => Ok(path),
        Ok(Err(e)) => {
            tracing::error!("Failed to export {}: {}", prefix, e);
            Err(error_response(500, "Failed to export scores", e))
        }
        Err(e) => {
            tracing::error!("Export task for {} did not complete: {}", prefix, e);
            Err(error_response(500, "Failed to export scores", e))
        }
    }
}

/// Run a handler body under the configured request timeout
///
/// On expiry the in-flight scoring futures are dropped and 504 is returned.
async fn with_timeout<F>(state: &AppState, operation: &str, work: F) -> HttpResponse
where
    F: Future<Output = HttpResponse>,
{
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("request", %request_id, operation);

    match tokio::time::timeout(state.request_timeout, work.instrument(span)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(%request_id, "{} timed out after {:?}", operation, state.request_timeout);
            error_response(
                504,
                "Request timed out",
                format!("{} did not finish within {:?}", operation, state.request_timeout),
            )
        }
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = state.cases.health_check().await.unwrap_or(false);

    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Rank stored case studies against a family situation
///
/// POST /api/v1/similar-case-studies/similar
///
/// Request body:
/// ```json
/// {
///   "state": "Maine",
///   "current_challenges": ["School", "Behavior"],
///   "first_session_notes": "string",
///   "additional_info": "string",
///   "child_age": 9,
///   "child_diagnoses": ["ADHD"],
///   "child_stage": "string",
///   "child_notes": "string",
///   "export_csv": true,
///   "top_k": 5
/// }
/// ```
async fn similar_case_studies(
    _key: ApiKey,
    state: web::Data<AppState>,
    req: web::Json<SimilarCaseStudiesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for similar case studies request: {:?}", errors);
        return error_response(400, "Validation failed", errors);
    }

    let req = req.into_inner();
    let work = async {
        let candidates = match state.cases.fetch_case_studies().await {
            Ok(candidates) => candidates,
            Err(e) => return storage_error("Failed to fetch case studies", e),
        };

        tracing::info!("Scoring input against {} case studies", candidates.len());

        // Score once; ranking and export share the same DetailedScores
        let result = state
            .matcher
            .find_similar(&req.profile, &candidates, req.top_k)
            .await;

        let csv_file = if req.export_csv {
            let table = ExportTable::case_studies(&candidates, &result.scores);
            match persist_export(&state, table, CASE_EXPORT_PREFIX).await {
                Ok(path) => Some(path.display().to_string()),
                Err(response) => return response,
            }
        } else {
            None
        };

        tracing::info!(
            "Returning {} similar case studies (from {} candidates)",
            result.matches.len(),
            result.total_candidates
        );

        HttpResponse::Ok().json(SimilarCaseStudiesResponse {
            similar_cases: result.matches,
            csv_file,
        })
    };

    with_timeout(&state, "similar_case_studies", work).await
}

/// Per-field scores for every stored case study, in storage order
///
/// POST /api/v1/similar-case-studies/scores
async fn case_study_scores(
    _key: ApiKey,
    state: web::Data<AppState>,
    req: web::Json<CaseProfile>,
) -> impl Responder {
    let input = req.into_inner();
    let work = async {
        let candidates = match state.cases.fetch_case_studies().await {
            Ok(candidates) => candidates,
            Err(e) => return storage_error("Failed to fetch case studies", e),
        };

        let scores = state.matcher.scorer().score_all(&input, &candidates).await;

        tracing::info!("Returning {} case study scores", scores.len());

        HttpResponse::Ok().json(CaseScoresResponse {
            total_candidates: candidates.len(),
            scores,
        })
    };

    with_timeout(&state, "case_study_scores", work).await
}

/// Resources closest to a free-text need
///
/// POST /api/v1/similar-resources/similar
///
/// Request body:
/// ```json
/// { "text": "string", "top_k": 5 }
/// ```
async fn similar_resources(
    _key: ApiKey,
    state: web::Data<AppState>,
    req: web::Json<SimilarResourcesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for similar resources request: {:?}", errors);
        return error_response(400, "Validation failed", errors);
    }

    let req = req.into_inner();
    let work = async {
        let query = match state.embedder.embed(req.text.trim()).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::error!("Failed to embed resource query: {}", e);
                return error_response(502, "Embedding unavailable", e);
            }
        };

        let stored = match state.resources.fetch_resources_with_embeddings().await {
            Ok(stored) => stored,
            Err(e) => return storage_error("Failed to fetch resources", e),
        };

        let k = req.top_k.unwrap_or_else(|| state.matcher.top_k());
        let mut resources = rank_resources(score_resources(&query, &stored), k);
        for r in &mut resources {
            r.similarity_score = round_to(r.similarity_score, RESOURCE_RESPONSE_DECIMALS);
        }

        tracing::info!("Returning {} resources (from {} stored)", resources.len(), stored.len());

        HttpResponse::Ok().json(SimilarResourcesResponse { resources })
    };

    with_timeout(&state, "similar_resources", work).await
}

/// Score every (query, resource) pair and export them as CSV
///
/// POST /api/v1/similar-resources/export
///
/// Request body:
/// ```json
/// { "test_cases": ["string"], "user_ids": ["string"] }
/// ```
async fn export_resource_scores(
    _key: ApiKey,
    state: web::Data<AppState>,
    req: web::Json<ResourceExportRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for resource export request: {:?}", errors);
        return error_response(400, "Validation failed", errors);
    }

    let req = req.into_inner();

    let work = async {
        let mut queries: Vec<String> = req
            .test_cases
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        for user_id in &req.user_ids {
            match state.resources.user_query_text(user_id).await {
                Ok(text) => queries.push(text.trim().to_string()),
                Err(StorageError::NotFound(_)) => {
                    tracing::warn!("Skipping unknown user {}", user_id);
                }
                Err(e) => return storage_error("Failed to load user profile", e),
            }
        }

        let stored = match state.resources.fetch_resources_with_embeddings().await {
            Ok(stored) => stored,
            Err(e) => return storage_error("Failed to fetch resources", e),
        };

        let mut rows = Vec::new();
        for query in &queries {
            let vector = match state.embedder.embed(query).await {
                Ok(vector) => vector,
                Err(e) => {
                    tracing::warn!("Skipping export query after embedding failure: {}", e);
                    continue;
                }
            };

            rows.extend(score_resources(&vector, &stored).into_iter().map(|s| ResourceScore {
                test_case: query.clone(),
                resource: s.resource,
                similarity: s.similarity_score,
            }));
        }

        tracing::debug!("Scored {} queries into {} rows", queries.len(), rows.len());

        let table = ExportTable::resources(&rows);
        let total_rows = table.len();
        match persist_export(&state, table, RESOURCE_EXPORT_PREFIX).await {
            Ok(path) => HttpResponse::Ok().json(ExportResponse {
                csv_file: path.display().to_string(),
                total_rows,
            }),
            Err(response) => response,
        }
    };

    with_timeout(&state, "export_resource_scores", work).await
}

/// Re-embed every resource and persist the vectors
///
/// POST /api/v1/resources/embeddings/refresh
async fn refresh_resource_embeddings(
    _key: ApiKey,
    state: web::Data<AppState>,
) -> impl Responder {
    let work = async {
        let resources = match state.resources.fetch_resources().await {
            Ok(resources) => resources,
            Err(e) => return storage_error("Failed to fetch resources", e),
        };

        let mut updated = 0;
        let mut failed = 0;

        for resource in &resources {
            let stored = match state.embedder.embed(&resource.embedding_text()).await {
                Ok(vector) => state
                    .resources
                    .upsert_resource_embedding(&resource.id, &vector)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match stored {
                Ok(()) => updated += 1,
                Err(e) => {
                    tracing::warn!("Failed to refresh embedding for resource {}: {}", resource.id, e);
                    failed += 1;
                }
            }
        }

        tracing::info!("Refreshed {} resource embeddings ({} failed)", updated, failed);

        HttpResponse::Ok().json(RefreshEmbeddingsResponse { updated, failed })
    };

    with_timeout(&state, "refresh_resource_embeddings", work).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;

    #[actix_web::test]
    async fn test_error_response_shape() {
        let response = error_response(504, "Request timed out", "too slow");
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Request timed out");
        assert_eq!(json["status_code"], 504);
    }

    #[test]
    fn test_storage_not_found_maps_to_404() {
        let response = storage_error("Failed to load user profile", StorageError::NotFound("user 1".into()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
