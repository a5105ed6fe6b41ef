use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` the same as a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// The comparable fields of a family situation.
///
/// Shared by the incoming request and every stored case study. Any field may
/// be absent; absent values fall back to the empty value of their type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseProfile {
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub current_challenges: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub first_session_notes: String,
    #[serde(default, deserialize_with = "nullable")]
    pub additional_info: String,
    #[serde(default)]
    pub child_age: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub child_diagnoses: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub child_stage: String,
    #[serde(default, deserialize_with = "nullable")]
    pub child_notes: String,
}

impl CaseProfile {
    /// Borrow the value of a single field
    pub fn value(&self, field: CaseField) -> FieldValue<'_> {
        match field {
            CaseField::State => FieldValue::Text(&self.state),
            CaseField::CurrentChallenges => FieldValue::List(&self.current_challenges),
            CaseField::FirstSessionNotes => FieldValue::Text(&self.first_session_notes),
            CaseField::AdditionalInfo => FieldValue::Text(&self.additional_info),
            CaseField::ChildAge => FieldValue::Number(self.child_age),
            CaseField::ChildDiagnoses => FieldValue::List(&self.child_diagnoses),
            CaseField::ChildStage => FieldValue::Text(&self.child_stage),
            CaseField::ChildNotes => FieldValue::Text(&self.child_notes),
        }
    }
}

/// Stored navigator case study
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseStudy {
    pub id: String,
    #[serde(flatten)]
    pub profile: CaseProfile,
}

/// A borrowed field value, typed by the comparator family it feeds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    List(&'a [String]),
    Number(Option<i64>),
}

/// Comparator families available to the scoring table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorKind {
    ExactMatch,
    SetOverlap,
    NumericProximity,
    SemanticSimilarity,
}

/// Scored case-study fields.
///
/// Declaration order is the column order of score breakdowns and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseField {
    State,
    CurrentChallenges,
    FirstSessionNotes,
    AdditionalInfo,
    ChildAge,
    ChildDiagnoses,
    ChildStage,
    ChildNotes,
}

impl CaseField {
    pub const COUNT: usize = 8;

    pub const ALL: [CaseField; Self::COUNT] = [
        CaseField::State,
        CaseField::CurrentChallenges,
        CaseField::FirstSessionNotes,
        CaseField::AdditionalInfo,
        CaseField::ChildAge,
        CaseField::ChildDiagnoses,
        CaseField::ChildStage,
        CaseField::ChildNotes,
    ];

    /// Configuration name of the field
    pub fn name(self) -> &'static str {
        match self {
            CaseField::State => "state",
            CaseField::CurrentChallenges => "current_challenges",
            CaseField::FirstSessionNotes => "first_session_notes",
            CaseField::AdditionalInfo => "additional_info",
            CaseField::ChildAge => "child_age",
            CaseField::ChildDiagnoses => "child_diagnoses",
            CaseField::ChildStage => "child_stage",
            CaseField::ChildNotes => "child_notes",
        }
    }

    /// Key used for this field in score breakdowns and CSV headers
    pub fn score_key(self) -> &'static str {
        match self {
            CaseField::State => "state_score",
            CaseField::CurrentChallenges => "challenges_score",
            CaseField::FirstSessionNotes => "session_notes_score",
            CaseField::AdditionalInfo => "additional_info_score",
            CaseField::ChildAge => "age_score",
            CaseField::ChildDiagnoses => "diagnoses_score",
            CaseField::ChildStage => "stage_score",
            CaseField::ChildNotes => "child_notes_score",
        }
    }

    /// Comparator bound to this field
    pub fn comparator(self) -> ComparatorKind {
        match self {
            CaseField::State | CaseField::ChildStage => ComparatorKind::ExactMatch,
            CaseField::CurrentChallenges | CaseField::ChildDiagnoses => ComparatorKind::SetOverlap,
            CaseField::FirstSessionNotes | CaseField::AdditionalInfo | CaseField::ChildNotes => {
                ComparatorKind::SemanticSimilarity
            }
            CaseField::ChildAge => ComparatorKind::NumericProximity,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Stored resource (article, program, provider...) that can be recommended
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub resource_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub source: String,
    #[serde(default, deserialize_with = "nullable")]
    pub category: String,
    #[serde(default, deserialize_with = "nullable")]
    pub topics: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub recommend_if: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub organization: String,
    #[serde(default, deserialize_with = "nullable")]
    pub default_navigator_note: String,
}

impl Resource {
    /// Text submitted to the embedding model for this resource
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {} {} {} {} {}",
            self.title,
            self.description,
            self.category,
            self.topics.join(", "),
            self.recommend_if,
            self.organization,
            self.default_navigator_note
        )
    }
}

/// Resource joined with its persisted embedding payload, unparsed
#[derive(Debug, Clone, Default)]
pub struct StoredResource {
    pub resource: Resource,
    pub embedding: Option<String>,
}

/// Per-field similarity scores, indexed by [`CaseField`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldScores([f64; CaseField::COUNT]);

impl FieldScores {
    pub fn get(&self, field: CaseField) -> f64 {
        self.0[field.index()]
    }

    pub fn set(&mut self, field: CaseField, score: f64) {
        self.0[field.index()] = score;
    }

    pub fn iter(&self) -> impl Iterator<Item = (CaseField, f64)> + '_ {
        CaseField::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

impl Serialize for FieldScores {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(CaseField::COUNT))?;
        for (field, score) in self.iter() {
            map.serialize_entry(field.score_key(), &score)?;
        }
        map.end()
    }
}

/// Full score breakdown of one case study against the input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedScore {
    pub case_id: String,
    #[serde(flatten)]
    pub field_scores: FieldScores,
    pub weighted_total: f64,
    /// Fields scored as zero because an embedding could not be produced
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded_fields: Vec<CaseField>,
}

/// One entry of a ranked result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub id: String,
    pub similarity_score: f64,
}

/// Resource paired with its cosine similarity to a query text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResource {
    #[serde(flatten)]
    pub resource: Resource,
    pub similarity_score: f64,
}

/// Resource score produced for one query text during an export run
#[derive(Debug, Clone)]
pub struct ResourceScore {
    pub test_case: String,
    pub resource: Resource,
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_study_tolerates_missing_and_null_fields() {
        let json = serde_json::json!({
            "id": "case-1",
            "state": null,
            "current_challenges": ["School"],
            "child_age": null
        });

        let case: CaseStudy = serde_json::from_value(json).unwrap();

        assert_eq!(case.id, "case-1");
        assert_eq!(case.profile.state, "");
        assert_eq!(case.profile.current_challenges, vec!["School"]);
        assert_eq!(case.profile.child_age, None);
        assert!(case.profile.child_diagnoses.is_empty());
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in CaseField::ALL {
            assert_eq!(CaseField::from_name(field.name()), Some(field));
        }
        assert_eq!(CaseField::from_name("zip_code"), None);
    }

    #[test]
    fn test_field_index_matches_declaration_order() {
        for (i, field) in CaseField::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
    }

    #[test]
    fn test_detailed_score_serializes_flat_score_keys() {
        let mut field_scores = FieldScores::default();
        field_scores.set(CaseField::State, 1.0);
        let score = DetailedScore {
            case_id: "c1".to_string(),
            field_scores,
            weighted_total: 0.25,
            degraded_fields: vec![],
        };

        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["case_id"], "c1");
        assert_eq!(json["state_score"], 1.0);
        assert_eq!(json["child_notes_score"], 0.0);
        assert_eq!(json["weighted_total"], 0.25);
        assert!(json.get("degraded_fields").is_none());
    }

    #[test]
    fn test_resource_embedding_text() {
        let resource = Resource {
            id: "r1".to_string(),
            title: "IEP Guide".to_string(),
            topics: vec!["school".to_string(), "advocacy".to_string()],
            ..Default::default()
        };

        let text = resource.embedding_text();
        assert!(text.starts_with("IEP Guide"));
        assert!(text.contains("school, advocacy"));
    }
}
