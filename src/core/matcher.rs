use crate::core::scoring::CaseScorer;
use crate::models::{CaseProfile, CaseStudy, DetailedScore, RankedMatch};

/// Result of the matching process
#[derive(Debug)]
pub struct MatchResult {
    pub matches: Vec<RankedMatch>,
    pub scores: Vec<DetailedScore>,
    pub total_candidates: usize,
}

/// Rank scored candidates by weighted total, highest first
///
/// The sort is stable: candidates with equal totals keep their input order.
/// Returns at most `k` entries.
pub fn rank(scores: &[DetailedScore], k: usize) -> Vec<RankedMatch> {
    let mut ordered: Vec<&DetailedScore> = scores.iter().collect();
    ordered.sort_by(|a, b| b.weighted_total.total_cmp(&a.weighted_total));

    ordered
        .into_iter()
        .take(k)
        .map(|s| RankedMatch {
            id: s.case_id.clone(),
            similarity_score: s.weighted_total,
        })
        .collect()
}

/// Main matching orchestrator: score every candidate, then rank
#[derive(Clone)]
pub struct Matcher {
    scorer: CaseScorer,
    top_k: usize,
}

impl Matcher {
    pub fn new(scorer: CaseScorer, top_k: usize) -> Self {
        Self { scorer, top_k }
    }

    pub fn scorer(&self) -> &CaseScorer {
        &self.scorer
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Find the case studies most similar to `input`
    ///
    /// # Arguments
    /// * `input` - The family situation to compare against
    /// * `candidates` - All stored case studies
    /// * `top_k` - Overrides the configured result count when set
    ///
    /// # Returns
    /// MatchResult with the ranked top entries and the full score list in
    /// candidate order
    pub async fn find_similar(
        &self,
        input: &CaseProfile,
        candidates: &[CaseStudy],
        top_k: Option<usize>,
    ) -> MatchResult {
        let scores = self.scorer.score_all(input, candidates).await;
        let matches = rank(&scores, top_k.unwrap_or(self.top_k));

        MatchResult {
            matches,
            scores,
            total_candidates: candidates.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldScores;

    fn score(id: &str, total: f64) -> DetailedScore {
        DetailedScore {
            case_id: id.to_string(),
            field_scores: FieldScores::default(),
            weighted_total: total,
            degraded_fields: vec![],
        }
    }

    #[test]
    fn test_rank_sorted_descending() {
        let scores = vec![score("a", 0.2), score("b", 0.9), score("c", 0.5)];
        let ranked = rank(&scores, 5);

        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(ranked[0].similarity_score, 0.9);
    }

    #[test]
    fn test_rank_stable_on_ties() {
        let scores = vec![
            score("first", 0.5),
            score("top", 0.8),
            score("second", 0.5),
            score("third", 0.5),
        ];
        let ranked = rank(&scores, 4);

        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn test_rank_truncates_to_k() {
        let scores: Vec<DetailedScore> = (0..20).map(|i| score(&i.to_string(), i as f64 / 20.0)).collect();

        assert_eq!(rank(&scores, 5).len(), 5);
        assert_eq!(rank(&scores[..3], 5).len(), 3);
        assert_eq!(rank(&scores, 0).len(), 0);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(&[], 5).is_empty());
    }
}
