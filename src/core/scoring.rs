use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::core::comparators::{cosine_similarity, exact_match, numeric_proximity, round_to, set_overlap};
use crate::core::semantic::{embed_text, Embedder, EmbeddingError};
use crate::models::{CaseField, CaseProfile, CaseStudy, ComparatorKind, DetailedScore, FieldScores, FieldValue};

/// Decimal digits kept in reported scores
pub const SCORE_DECIMALS: i32 = 3;

/// Misconfigured scoring table
#[derive(Debug, Error, PartialEq)]
pub enum ScoringConfigError {
    #[error("Unknown field in weights: {0}")]
    UnknownField(String),

    #[error("No weight configured for field: {0}")]
    MissingWeight(&'static str),

    #[error("Invalid weight {weight} for field {field}: must be finite and non-negative")]
    InvalidWeight { field: &'static str, weight: f64 },

    #[error("top_k must be at least 1")]
    InvalidTopK,
}

/// One row of the scoring table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub field: CaseField,
    pub comparator: ComparatorKind,
    pub weight: f64,
}

/// Declarative field → (comparator, weight) binding, complete by construction
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringTable {
    rules: [FieldRule; CaseField::COUNT],
}

impl ScoringTable {
    /// Build the table from a `field name → weight` map
    ///
    /// Every known field must be present exactly once and no unknown names
    /// are accepted.
    pub fn from_weights(weights: &HashMap<String, f64>) -> Result<Self, ScoringConfigError> {
        if let Some(unknown) = weights.keys().find(|name| CaseField::from_name(name).is_none()) {
            return Err(ScoringConfigError::UnknownField(unknown.clone()));
        }

        let mut rules = CaseField::ALL.map(|field| FieldRule {
            field,
            comparator: field.comparator(),
            weight: 0.0,
        });

        for rule in rules.iter_mut() {
            let name = rule.field.name();
            let weight = *weights
                .get(name)
                .ok_or(ScoringConfigError::MissingWeight(name))?;

            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoringConfigError::InvalidWeight { field: name, weight });
            }
            rule.weight = weight;
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn weight(&self, field: CaseField) -> f64 {
        self.rules[field.index()].weight
    }

    pub fn total_weight(&self) -> f64 {
        self.rules.iter().map(|r| r.weight).sum()
    }
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self::from_weights(&reference_weights())
            .unwrap_or_else(|e| unreachable!("reference weights are complete: {e}"))
    }
}

/// Reference weighting; sums to 1.0
pub fn reference_weights() -> HashMap<String, f64> {
    [
        (CaseField::State, 0.25),
        (CaseField::CurrentChallenges, 0.20),
        (CaseField::FirstSessionNotes, 0.15),
        (CaseField::AdditionalInfo, 0.10),
        (CaseField::ChildAge, 0.10),
        (CaseField::ChildDiagnoses, 0.10),
        (CaseField::ChildStage, 0.05),
        (CaseField::ChildNotes, 0.05),
    ]
    .into_iter()
    .map(|(field, weight)| (field.name().to_string(), weight))
    .collect()
}

/// Scores case studies against an input profile
///
/// Holds only shared read-only state, so clones are cheap and candidates can
/// be scored concurrently.
#[derive(Clone)]
pub struct CaseScorer {
    table: Arc<ScoringTable>,
    embedder: Arc<dyn Embedder>,
    max_concurrency: usize,
}

impl CaseScorer {
    pub fn new(table: ScoringTable, embedder: Arc<dyn Embedder>, max_concurrency: usize) -> Self {
        Self {
            table: Arc::new(table),
            embedder,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn table(&self) -> &ScoringTable {
        &self.table
    }

    /// Score a single candidate
    ///
    /// Fields are scored independently; an embedding failure zeroes only the
    /// affected field and is recorded in `degraded_fields`.
    pub async fn score_one(&self, input: &CaseProfile, candidate: &CaseStudy) -> DetailedScore {
        let embedded = self.embed_input(input).await;
        self.score_with(input, &embedded, candidate).await
    }

    /// Score every candidate, preserving candidate order
    ///
    /// The input's semantic fields are embedded once up front. A failed input
    /// embedding degrades that field for every candidate without further calls.
    pub async fn score_all(&self, input: &CaseProfile, candidates: &[CaseStudy]) -> Vec<DetailedScore> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let embedded = self.embed_input(input).await;
        let scores: Vec<DetailedScore> = stream::iter(candidates)
            .map(|candidate| self.score_with(input, &embedded, candidate))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let degraded = scores.iter().filter(|s| !s.degraded_fields.is_empty()).count();
        if degraded > 0 {
            tracing::warn!(
                "{} of {} candidates scored with unavailable embeddings",
                degraded,
                scores.len()
            );
        }

        scores
    }

    async fn embed_input(&self, input: &CaseProfile) -> InputEmbeddings {
        let mut vectors = Vec::new();

        for rule in self.table.rules() {
            if rule.comparator != ComparatorKind::SemanticSimilarity {
                continue;
            }
            if let FieldValue::Text(text) = input.value(rule.field) {
                let result = embed_text(self.embedder.as_ref(), text).await;
                if let Err(e) = &result {
                    tracing::warn!(
                        field = rule.field.name(),
                        error = %e,
                        "Input embedding unavailable, field degraded for every candidate"
                    );
                }
                vectors.push((rule.field, result));
            }
        }

        InputEmbeddings(vectors)
    }

    async fn score_with(
        &self,
        input: &CaseProfile,
        embedded: &InputEmbeddings,
        candidate: &CaseStudy,
    ) -> DetailedScore {
        let mut raw = FieldScores::default();
        let mut degraded_fields = Vec::new();

        for rule in self.table.rules() {
            let score = match (input.value(rule.field), candidate.profile.value(rule.field)) {
                (FieldValue::Text(a), FieldValue::Text(b)) => match rule.comparator {
                    ComparatorKind::SemanticSimilarity => {
                        match self.semantic_score(embedded, rule.field, &candidate.id, b).await {
                            Some(score) => score,
                            None => {
                                degraded_fields.push(rule.field);
                                0.0
                            }
                        }
                    }
                    _ => exact_match(a, b),
                },
                (FieldValue::List(a), FieldValue::List(b)) => set_overlap(a, b),
                (FieldValue::Number(a), FieldValue::Number(b)) => numeric_proximity(a, b),
                _ => 0.0,
            };
            raw.set(rule.field, score);
        }

        let weighted_total: f64 = self
            .table
            .rules()
            .iter()
            .map(|rule| raw.get(rule.field) * rule.weight)
            .sum();

        let mut field_scores = FieldScores::default();
        for (field, score) in raw.iter() {
            field_scores.set(field, round_to(score, SCORE_DECIMALS));
        }

        DetailedScore {
            case_id: candidate.id.clone(),
            field_scores,
            weighted_total: round_to(weighted_total, SCORE_DECIMALS),
            degraded_fields,
        }
    }

    /// Cosine of the candidate text against the precomputed input vector
    ///
    /// `None` means the field is degraded. Blank text on either side scores
    /// 0.0 without calling the embedder.
    async fn semantic_score(
        &self,
        embedded: &InputEmbeddings,
        field: CaseField,
        case_id: &str,
        text: &str,
    ) -> Option<f64> {
        if text.trim().is_empty() {
            return Some(0.0);
        }

        let input_vector = match embedded.get(field) {
            Some(Ok(Some(vector))) => vector,
            Some(Ok(None)) | None => return Some(0.0),
            Some(Err(_)) => return None,
        };

        match embed_text(self.embedder.as_ref(), text).await {
            Ok(Some(vector)) => Some(cosine_similarity(input_vector, &vector)),
            Ok(None) => Some(0.0),
            Err(e) => {
                tracing::warn!(
                    case_id = %case_id,
                    field = field.name(),
                    error = %e,
                    "Embedding unavailable, scoring field as 0"
                );
                None
            }
        }
    }
}

/// Input-side vectors of the semantic fields, one entry per field
struct InputEmbeddings(Vec<(CaseField, Result<Option<Vec<f32>>, EmbeddingError>)>);

impl InputEmbeddings {
    fn get(&self, field: CaseField) -> Option<&Result<Option<Vec<f32>>, EmbeddingError>> {
        self.0.iter().find(|(f, _)| *f == field).map(|(_, result)| result)
    }
}
