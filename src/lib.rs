//! Navsim - similarity service for the family navigator
//!
//! This library scores stored case studies against a family's situation
//! field by field, ranks the closest ones and exports the full score matrix.
//! It also ranks support resources against free text by embedding cosine.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{rank, CaseScorer, Embedder, EmbeddingError, ExportTable, Matcher, ScoringTable, SortPolicy};
pub use crate::models::{CaseField, CaseProfile, CaseStudy, DetailedScore, RankedMatch};
