// Core algorithm exports
pub mod comparators;
pub mod export;
pub mod matcher;
pub mod resources;
pub mod scoring;
pub mod semantic;

pub use comparators::{cosine_similarity, exact_match, numeric_proximity, round_to, set_overlap};
pub use export::{ExportError, ExportRow, ExportTable, SortPolicy};
pub use matcher::{rank, MatchResult, Matcher};
pub use resources::{rank_resources, score_resources};
pub use scoring::{reference_weights, CaseScorer, FieldRule, ScoringConfigError, ScoringTable};
pub use semantic::{embed_text, parse_stored_vector, Embedder, EmbeddingError};
