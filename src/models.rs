use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type IncidentId = i64;
pub type ReportNumber = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f64>,
}

/// One entry of a similarity relation: either a bare incident id (editor lists)
/// or an id object, optionally carrying an NLP similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimilarRef {
    Scored {
        incident_id: IncidentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        similarity: Option<f64>,
    },
    Id(IncidentId),
}

impl SimilarRef {
    pub fn incident_id(&self) -> IncidentId {
        match self {
            SimilarRef::Scored { incident_id, .. } => *incident_id,
            SimilarRef::Id(id) => *id,
        }
    }

    pub fn similarity(&self) -> Option<f64> {
        match self {
            SimilarRef::Scored { similarity, .. } => *similarity,
            SimilarRef::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: IncidentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "reports")]
    pub report_numbers: Vec<ReportNumber>,
    pub editors: Vec<String>,
    pub embedding: Option<Embedding>,
    pub editor_similar_incidents: Vec<SimilarRef>,
    pub editor_dissimilar_incidents: Vec<SimilarRef>,
    pub flagged_dissimilar_incidents: Vec<SimilarRef>,
    pub nlp_similar_incidents: Vec<SimilarRef>,
}

/// Publication date as the store exports it: epoch seconds, or a date string
/// from older exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublishedDate {
    Epoch(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_number: ReportNumber,
    pub title: String,
    pub text: String,
    pub url: String,
    pub image_url: Option<String>,
    pub cloudinary_id: Option<String>,
    pub source_domain: Option<String>,
    pub date_published: Option<PublishedDate>,
    pub epoch_date_submitted: Option<i64>,
    pub authors: Vec<String>,
    pub submitters: Vec<String>,
    pub language: String,
}

/// A slot in an incident's ordered report list. A report number that did not
/// join against the report collection stays in place as an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Found(Report),
    Missing {},
}

impl ReportEntry {
    pub fn report(&self) -> Option<&Report> {
        match self {
            ReportEntry::Found(r) => Some(r),
            ReportEntry::Missing {} => None,
        }
    }
}

/// Raw classification value as stored upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<String>),
    Other(serde_json::Value),
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) if items.iter().all(Value::is_string) => FieldValue::List(
                items
                    .into_iter()
                    .filter_map(|i| match i {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            other => FieldValue::Other(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub incident_id: IncidentId,
    pub namespace: String,
    pub notes: Option<String>,
    pub field_values: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyField {
    pub short_name: String,
    pub long_name: Option<String>,
    pub long_description: Option<String>,
    pub short_description: Option<String>,
    pub weight: f64,
    pub public: Option<bool>,
    pub display_type: Option<String>,
    pub render_as: Option<String>,
}

impl TaxonomyField {
    /// Only an explicit `false` hides a field.
    pub fn is_public(&self) -> bool {
        self.public != Some(false)
    }

    /// Key under which the field's value is stored in a classification record.
    pub fn value_key(&self) -> String {
        self.short_name.replace(' ', "_")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    pub namespace: String,
    pub weight: Option<f64>,
    pub description: Option<String>,
    pub field_list: Vec<TaxonomyField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub report_number: ReportNumber,
    pub title: String,
    pub text: String,
}

/// Display-ready projection of one taxonomy field for one incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayField {
    pub name: String,
    pub value: String,
    pub weight: f64,
    pub long_description: Option<String>,
    pub short_description: Option<String>,
    pub render_as: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyEntry {
    pub notes: Option<String>,
    pub namespace: String,
    pub classifications_array: Vec<DisplayField>,
    pub taxonomy_fields: Vec<TaxonomyField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSimilar {
    pub title: Option<String>,
    pub date: Option<String>,
    pub incident_id: IncidentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub reports: Option<Arc<Vec<ReportEntry>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialPoint {
    pub incident_id: IncidentId,
    pub x: f64,
    pub y: f64,
    pub classifications: Option<IndexMap<String, FieldValue>>,
}

/// Everything the citation page template needs for one incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub incident: Incident,
    pub incident_reports: Arc<Vec<ReportEntry>>,
    pub taxonomies: Vec<TaxonomyEntry>,
    pub next_incident: Option<IncidentId>,
    pub prev_incident: Option<IncidentId>,
    pub spatial_incidents: Arc<Vec<SpatialPoint>>,
    #[serde(rename = "nlp_similar_incidents")]
    pub nlp_similar_incidents: Vec<ResolvedSimilar>,
    #[serde(rename = "editor_similar_incidents")]
    pub editor_similar_incidents: Vec<ResolvedSimilar>,
    #[serde(rename = "editor_dissimilar_incidents")]
    pub editor_dissimilar_incidents: Vec<ResolvedSimilar>,
    #[serde(
        rename = "flagged_dissimilar_incidents",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub flagged_dissimilar_incidents: Option<Vec<ResolvedSimilar>>,
}
