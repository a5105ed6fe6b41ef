use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::models::{CaseStudy, Resource, StoredResource};
use crate::services::store::{compose_user_query, CaseStore, ResourceStore, StorageError};

/// PostgreSQL-backed store
///
/// Rows are read as `jsonb` documents and deserialized with serde, so array
/// columns may be either `text[]` or `jsonb` and nullable columns fall back to
/// empty values. Ids are always rendered as text.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StorageError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    async fn fetch_documents<T>(&self, query: &str, kind: &str) -> Result<Vec<T>, StorageError>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let docs: Vec<T> = rows
            .iter()
            .filter_map(|row| decode_doc(row.try_get("doc"), kind))
            .collect();

        tracing::debug!("Fetched {} {} rows", docs.len(), kind);

        Ok(docs)
    }
}

/// Render a loosely typed column as display text
fn json_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl CaseStore for PostgresClient {
    async fn fetch_case_studies(&self) -> Result<Vec<CaseStudy>, StorageError> {
        let query = r#"
            SELECT jsonb_build_object(
                'id', ns.id::text,
                'state', ns.state,
                'current_challenges', to_jsonb(ns.current_challenges),
                'first_session_notes', ns.first_session_notes,
                'additional_info', ns.additional_info,
                'child_age', ns.child_age,
                'child_diagnoses', to_jsonb(ns.child_diagnoses),
                'child_stage', ns.child_stage,
                'child_notes', ns.child_notes
            ) AS doc
            FROM navigator_simulations ns
            ORDER BY ns.id
        "#;

        self.fetch_documents(query, "case study").await
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StorageError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

#[async_trait]
impl ResourceStore for PostgresClient {
    async fn fetch_resources(&self) -> Result<Vec<Resource>, StorageError> {
        let query = r#"
            SELECT to_jsonb(r) || jsonb_build_object('id', r.id::text) AS doc
            FROM resources r
            ORDER BY r.id
        "#;

        self.fetch_documents(query, "resource").await
    }

    async fn fetch_resources_with_embeddings(&self) -> Result<Vec<StoredResource>, StorageError> {
        let query = r#"
            SELECT to_jsonb(r) || jsonb_build_object('id', r.id::text) AS doc,
                   e.embedding::text AS embedding
            FROM resources r
            LEFT JOIN resource_embeddings e ON e.resource_id::text = r.id::text
            ORDER BY r.id
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let resources: Vec<StoredResource> = rows
            .iter()
            .filter_map(|row| {
                let resource: Resource = decode_doc(row.try_get("doc"), "resource")?;
                let embedding: Option<String> = row.try_get("embedding").ok().flatten();
                Some(StoredResource { resource, embedding })
            })
            .collect();

        tracing::debug!("Fetched {} resources with embeddings", resources.len());

        Ok(resources)
    }

    /// Uses INSERT ... ON CONFLICT so refreshing twice overwrites the vector.
    async fn upsert_resource_embedding(
        &self,
        resource_id: &str,
        embedding: &[f32],
    ) -> Result<(), StorageError> {
        let query = r#"
            INSERT INTO resource_embeddings (resource_id, embedding)
            SELECT r.id, $2::vector
            FROM resources r
            WHERE r.id::text = $1
            ON CONFLICT (resource_id)
            DO UPDATE SET embedding = EXCLUDED.embedding
        "#;

        let payload = format!(
            "[{}]",
            embedding
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        );

        let result = sqlx::query(query)
            .bind(resource_id)
            .bind(payload)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("resource {}", resource_id)));
        }

        tracing::debug!("Stored embedding for resource {}", resource_id);

        Ok(())
    }

    async fn user_query_text(&self, user_id: &str) -> Result<String, StorageError> {
        let profile_row = sqlx::query("SELECT to_jsonb(u) AS doc FROM users u WHERE u.user_id::text = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("user {}", user_id)))?;

        let profile: Value = profile_row.try_get("doc")?;

        let child_rows = sqlx::query(
            "SELECT to_jsonb(c.diagnoses) AS diagnoses FROM user_childs c WHERE c.user_id::text = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let diagnoses: Vec<String> = child_rows
            .iter()
            .filter_map(|row| row.try_get::<Option<Value>, _>("diagnoses").ok().flatten())
            .filter_map(|v| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        Ok(compose_user_query(
            &json_text(profile.get("current_challenges")),
            &json_text(profile.get("first_session_notes")),
            &json_text(profile.get("additional_info")),
            &diagnoses,
        ))
    }
}

/// Deserialize a `doc` column, logging and skipping rows that cannot be read
fn decode_doc<T>(doc: Result<Value, sqlx::Error>, kind: &str) -> Option<T>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let doc = match doc {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("Skipping {} row without a readable doc column: {}", kind, e);
            return None;
        }
    };

    match serde_json::from_value(doc) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Skipping unparseable {} row: {}", kind, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_text_rendering() {
        assert_eq!(json_text(Some(&Value::String("notes".into()))), "notes");
        assert_eq!(
            json_text(Some(&serde_json::json!(["School", "Behavior", 3]))),
            "School, Behavior"
        );
        assert_eq!(json_text(Some(&Value::Null)), "");
        assert_eq!(json_text(None), "");
        assert_eq!(json_text(Some(&serde_json::json!(12))), "12");
    }

    #[test]
    fn test_decode_doc_skips_unreadable_rows() {
        let missing: Option<Resource> =
            decode_doc(Err(sqlx::Error::ColumnNotFound("doc".to_string())), "resource");
        assert!(missing.is_none());

        let malformed: Option<Resource> = decode_doc(Ok(serde_json::json!("not an object")), "resource");
        assert!(malformed.is_none());

        let parsed: Option<Resource> =
            decode_doc(Ok(serde_json::json!({ "id": "r1", "title": "Respite care" })), "resource");
        let parsed = parsed.unwrap();
        assert_eq!(parsed.id, "r1");
        assert_eq!(parsed.title, "Respite care");
    }
}
