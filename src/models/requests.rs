use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use crate::models::domain::CaseProfile;

/// Request to rank stored case studies against a family situation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimilarCaseStudiesRequest {
    #[serde(flatten)]
    pub profile: CaseProfile,
    #[serde(default = "default_export_csv")]
    pub export_csv: bool,
    /// Overrides the configured result count
    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub top_k: Option<usize>,
}

fn default_export_csv() -> bool {
    true
}

/// Request for the resources closest to a free-text need
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimilarResourcesRequest {
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Request to export resource similarity for a batch of queries
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_has_queries"))]
pub struct ResourceExportRequest {
    #[serde(default)]
    pub test_cases: Vec<String>,
    /// Users whose profile and child diagnoses become additional queries
    #[serde(default)]
    pub user_ids: Vec<String>,
}

fn validate_has_queries(req: &ResourceExportRequest) -> Result<(), ValidationError> {
    if req.test_cases.is_empty() && req.user_ids.is_empty() {
        let mut error = ValidationError::new("no_queries");
        error.message = Some("Provide test_cases or user_ids".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similar_case_studies_defaults() {
        let req: SimilarCaseStudiesRequest = serde_json::from_value(serde_json::json!({
            "state": "Maine",
            "child_age": 9
        }))
        .unwrap();

        assert!(req.export_csv);
        assert_eq!(req.top_k, None);
        assert_eq!(req.profile.state, "Maine");
        assert_eq!(req.profile.child_age, Some(9));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_top_k_out_of_range_rejected() {
        let req = SimilarResourcesRequest {
            text: "Find a family therapist".to_string(),
            top_k: Some(0),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_empty_resource_text_rejected() {
        let req = SimilarResourcesRequest {
            text: String::new(),
            top_k: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_resource_export_needs_a_query_source() {
        assert!(ResourceExportRequest::default().validate().is_err());

        let by_text = ResourceExportRequest {
            test_cases: vec!["school support".to_string()],
            ..Default::default()
        };
        let by_user = ResourceExportRequest {
            user_ids: vec!["u1".to_string()],
            ..Default::default()
        };
        assert!(by_text.validate().is_ok());
        assert!(by_user.validate().is_ok());
    }
}
