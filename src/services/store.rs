use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CaseStudy, Resource, StoredResource};

/// Errors that can occur when reading or writing stored records
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Storage collaborator for case studies
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Every stored case study; no pagination
    async fn fetch_case_studies(&self) -> Result<Vec<CaseStudy>, StorageError>;

    async fn health_check(&self) -> Result<bool, StorageError>;
}

/// Storage collaborator for resources, their embeddings and user profiles
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn fetch_resources(&self) -> Result<Vec<Resource>, StorageError>;

    /// Every resource joined with its persisted embedding, if any
    async fn fetch_resources_with_embeddings(&self) -> Result<Vec<StoredResource>, StorageError>;

    async fn upsert_resource_embedding(
        &self,
        resource_id: &str,
        embedding: &[f32],
    ) -> Result<(), StorageError>;

    /// Free text describing a user's situation, used as a resource query
    async fn user_query_text(&self, user_id: &str) -> Result<String, StorageError>;
}

/// Query text for a user: challenges, notes, extra info, then child diagnoses
pub fn compose_user_query(
    current_challenges: &str,
    first_session_notes: &str,
    additional_info: &str,
    diagnoses: &[String],
) -> String {
    format!(
        "{} {} {} {}",
        current_challenges,
        first_session_notes,
        additional_info,
        diagnoses.join(" ")
    )
}
