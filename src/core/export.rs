//! Tabular audit export of scored candidates.
//!
//! Rows are wide: the candidate's own values rendered as display strings next
//! to its scores. The header is always written, so an empty candidate set
//! still yields a header-only table.

use std::io;

use thiserror::Error;

use crate::core::comparators::round_to;
use crate::models::{CaseField, CaseStudy, DetailedScore, ResourceScore};

/// Decimal digits kept for resource similarity in exports
pub const RESOURCE_SCORE_DECIMALS: i32 = 4;

/// Separator used when rendering list-valued fields
const LIST_SEPARATOR: &str = ", ";

pub const CASE_STUDY_COLUMNS: [&str; 18] = [
    "case_id",
    "case_state",
    "case_current_challenges",
    "case_first_session_notes",
    "case_additional_info",
    "case_age",
    "case_child_diagnoses",
    "case_stage",
    "case_child_notes",
    "state_score",
    "challenges_score",
    "session_notes_score",
    "additional_info_score",
    "age_score",
    "diagnoses_score",
    "stage_score",
    "child_notes_score",
    "weighted_total",
];

pub const RESOURCE_COLUMNS: [&str; 13] = [
    "test_case",
    "resource_id",
    "resource_title",
    "resource_description",
    "resource_type",
    "resource_source",
    "resource_category",
    "resource_topics",
    "resource_recommend_if",
    "resource_state",
    "resource_organization",
    "resource_default_navigator_note",
    "similarity_score",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Row ordering applied when the table is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPolicy {
    /// Highest score first across the whole table
    ScoreDescending,
    /// Group key ascending, then highest score first within each group
    GroupThenScoreDescending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub group: String,
    pub score: f64,
    pub cells: Vec<String>,
}

/// Rows plus a fixed column order and sort policy
#[derive(Debug, Clone)]
pub struct ExportTable {
    columns: &'static [&'static str],
    policy: SortPolicy,
    rows: Vec<ExportRow>,
}

fn fmt_score(score: f64) -> String {
    format!("{:?}", score)
}

impl ExportTable {
    pub fn new(columns: &'static [&'static str], policy: SortPolicy) -> Self {
        Self {
            columns,
            policy,
            rows: Vec::new(),
        }
    }

    /// Case-study audit table, one row per scored candidate
    ///
    /// `scores` must be in candidate order, as produced by
    /// `CaseScorer::score_all`.
    pub fn case_studies(candidates: &[CaseStudy], scores: &[DetailedScore]) -> Self {
        debug_assert_eq!(candidates.len(), scores.len(), "one score per candidate");
        let mut table = Self::new(&CASE_STUDY_COLUMNS, SortPolicy::ScoreDescending);

        for (case, score) in candidates.iter().zip(scores) {
            debug_assert_eq!(case.id, score.case_id, "scores out of candidate order");
            let p = &case.profile;
            let mut cells = vec![
                score.case_id.clone(),
                p.state.clone(),
                p.current_challenges.join(LIST_SEPARATOR),
                p.first_session_notes.clone(),
                p.additional_info.clone(),
                p.child_age.map(|a| a.to_string()).unwrap_or_default(),
                p.child_diagnoses.join(LIST_SEPARATOR),
                p.child_stage.clone(),
                p.child_notes.clone(),
            ];
            cells.extend(CaseField::ALL.iter().map(|&f| fmt_score(score.field_scores.get(f))));
            cells.push(fmt_score(score.weighted_total));

            table.rows.push(ExportRow {
                group: String::new(),
                score: score.weighted_total,
                cells,
            });
        }

        table
    }

    /// Resource similarity table grouped by query text
    pub fn resources(scores: &[ResourceScore]) -> Self {
        let mut table = Self::new(&RESOURCE_COLUMNS, SortPolicy::GroupThenScoreDescending);

        for s in scores {
            let r = &s.resource;
            let similarity = round_to(s.similarity, RESOURCE_SCORE_DECIMALS);
            table.rows.push(ExportRow {
                group: s.test_case.clone(),
                score: similarity,
                cells: vec![
                    s.test_case.clone(),
                    r.id.clone(),
                    r.title.clone(),
                    r.description.clone(),
                    r.resource_type.clone(),
                    r.source.clone(),
                    r.category.clone(),
                    r.topics.join(LIST_SEPARATOR),
                    r.recommend_if.clone(),
                    r.state.clone(),
                    r.organization.clone(),
                    r.default_navigator_note.clone(),
                    fmt_score(similarity),
                ],
            });
        }

        table
    }

    pub fn with_policy(mut self, policy: SortPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn columns(&self) -> &[&'static str] {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in output order (stable)
    pub fn sorted_rows(&self) -> Vec<&ExportRow> {
        let mut rows: Vec<&ExportRow> = self.rows.iter().collect();
        match self.policy {
            SortPolicy::ScoreDescending => {
                rows.sort_by(|a, b| b.score.total_cmp(&a.score));
            }
            SortPolicy::GroupThenScoreDescending => {
                rows.sort_by(|a, b| a.group.cmp(&b.group).then(b.score.total_cmp(&a.score)));
            }
        }
        rows
    }

    /// Write header and sorted rows as CSV
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        csv_writer.write_record(self.columns)?;
        for row in self.sorted_rows() {
            csv_writer.write_record(&row.cells)?;
        }
        csv_writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseProfile, FieldScores, Resource};

    fn case(id: &str) -> CaseStudy {
        CaseStudy {
            id: id.to_string(),
            profile: CaseProfile {
                state: "Maine".to_string(),
                current_challenges: vec!["School".to_string(), "Behavior".to_string()],
                child_age: Some(9),
                ..Default::default()
            },
        }
    }

    fn score(id: &str, total: f64) -> DetailedScore {
        let mut field_scores = FieldScores::default();
        field_scores.set(CaseField::State, 1.0);
        DetailedScore {
            case_id: id.to_string(),
            field_scores,
            weighted_total: total,
            degraded_fields: vec![],
        }
    }

    fn to_string(table: &ExportTable) -> String {
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_empty_case_export_is_header_only() {
        let table = ExportTable::case_studies(&[], &[]);
        let csv = to_string(&table);

        assert_eq!(csv, format!("{}\n", CASE_STUDY_COLUMNS.join(",")));
        assert!(table.is_empty());
    }

    #[test]
    fn test_case_export_sorted_by_total() {
        let cases = vec![case("low"), case("high"), case("mid")];
        let scores = vec![score("low", 0.1), score("high", 0.9), score("mid", 0.5)];

        let csv = to_string(&ExportTable::case_studies(&cases, &scores));
        let ids: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();

        assert_eq!(ids, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_case_export_row_layout() {
        let table = ExportTable::case_studies(&[case("c1")], &[score("c1", 0.25)]);
        let rows = table.sorted_rows();
        let row = &rows[0].cells;

        assert_eq!(row.len(), CASE_STUDY_COLUMNS.len());
        assert_eq!(row[2], "School, Behavior");
        assert_eq!(row[5], "9");
        assert_eq!(row[9], "1.0");
        assert_eq!(row[17], "0.25");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "one score per candidate")]
    fn test_case_export_rejects_missing_scores() {
        ExportTable::case_studies(&[case("c1"), case("c2")], &[score("c1", 0.25)]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "scores out of candidate order")]
    fn test_case_export_rejects_reordered_scores() {
        ExportTable::case_studies(
            &[case("c1"), case("c2")],
            &[score("c2", 0.9), score("c1", 0.25)],
        );
    }

    #[test]
    fn test_resource_export_grouped_then_score() {
        let resource = |id: &str| Resource {
            id: id.to_string(),
            ..Default::default()
        };
        let scores = vec![
            ResourceScore { test_case: "b query".into(), resource: resource("r1"), similarity: 0.2 },
            ResourceScore { test_case: "a query".into(), resource: resource("r2"), similarity: 0.1 },
            ResourceScore { test_case: "b query".into(), resource: resource("r3"), similarity: 0.7 },
            ResourceScore { test_case: "a query".into(), resource: resource("r4"), similarity: 0.123456 },
        ];

        let table = ExportTable::resources(&scores);
        let rows = table.sorted_rows();
        let order: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.cells[0].as_str(), r.cells[1].as_str()))
            .collect();

        assert_eq!(
            order,
            vec![("a query", "r4"), ("a query", "r2"), ("b query", "r3"), ("b query", "r1")]
        );
        assert_eq!(rows[0].cells[12], "0.1235");
    }

    #[test]
    fn test_policy_override() {
        let resource = Resource::default();
        let scores = vec![
            ResourceScore { test_case: "a".into(), resource: resource.clone(), similarity: 0.1 },
            ResourceScore { test_case: "b".into(), resource, similarity: 0.9 },
        ];

        let table = ExportTable::resources(&scores).with_policy(SortPolicy::ScoreDescending);
        assert_eq!(table.sorted_rows()[0].group, "b");
    }
}
