use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{PublishedDate, SimilarRef};

/// Every content-store query answers with a `{"nodes": [...]}` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiNodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEmbedding {
    #[serde(default)]
    pub vector: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIncident {
    pub incident_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub reports: Option<Vec<i64>>,
    #[serde(default)]
    pub editors: Option<Vec<String>>,
    #[serde(default)]
    pub embedding: Option<ApiEmbedding>,
    #[serde(default)]
    pub editor_similar_incidents: Option<Vec<SimilarRef>>,
    #[serde(default)]
    pub editor_dissimilar_incidents: Option<Vec<SimilarRef>>,
    #[serde(default)]
    pub flagged_dissimilar_incidents: Option<Vec<SimilarRef>>,
    #[serde(default)]
    pub nlp_similar_incidents: Option<Vec<SimilarRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiReport {
    pub report_number: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub cloudinary_id: Option<String>,
    #[serde(default)]
    pub source_domain: Option<String>,
    #[serde(default)]
    pub date_published: Option<PublishedDate>,
    #[serde(default)]
    pub epoch_date_submitted: Option<i64>,
    #[serde(default)]
    pub authors: Option<Vec<String>>,
    #[serde(default)]
    pub submitters: Option<Vec<String>>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Shared shape of taxonomy classification and resource annotation nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClassification {
    pub incident_id: i64,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub classifications: Map<String, Value>,
}

impl ApiClassification {
    pub fn is_published(&self) -> bool {
        matches!(self.classifications.get("Publish"), Some(Value::Bool(true)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTaxonomyField {
    pub short_name: String,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub display_type: Option<String>,
    #[serde(default)]
    pub render_as: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTaxonomy {
    pub namespace: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub field_list: Option<Vec<ApiTaxonomyField>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTranslation {
    pub report_number: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}
