use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

use crate::api_types::*;
use crate::models::*;

/// Read-only query interface of the content store.
///
/// `fetch_nodes` returns `Ok(None)` when the named collection does not exist,
/// which is only tolerated for translation collections.
pub trait ContentSource: Sync {
    fn fetch_nodes<T: DeserializeOwned + Send>(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Vec<T>>>> + Send;
}

/// Content store export served over HTTP as `<base>/<name>.json`.
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    pub fn new(client: Client, base: &str) -> Result<Self> {
        // Url::join drops the last path segment unless the base ends with '/'
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };
        let base = Url::parse(&base).with_context(|| format!("invalid source url {}", base))?;
        Ok(Self { client, base })
    }
}

impl ContentSource for HttpSource {
    async fn fetch_nodes<T: DeserializeOwned + Send>(&self, name: &str) -> Result<Option<Vec<T>>> {
        let url = self
            .base
            .join(&format!("{}.json", name))
            .with_context(|| format!("building url for {}", name))?;
        let start = std::time::Instant::now();

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request failed for {}", url))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            warn!("Collection not found (404) - {}", name);
            return Ok(None);
        }

        let resp = resp
            .error_for_status()
            .with_context(|| format!("HTTP error for {}", url))?;

        let doc: ApiNodes<T> = resp
            .json()
            .await
            .with_context(|| format!("Decoding JSON for {}", url))?;

        debug!(
            "Collection fetched - name={}, nodes={}, duration={:.2}s",
            name,
            doc.nodes.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(Some(doc.nodes))
    }
}

/// Content store export on disk as `<root>/<name>.json`.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentSource for DirSource {
    async fn fetch_nodes<T: DeserializeOwned + Send>(&self, name: &str) -> Result<Option<Vec<T>>> {
        let path = self.root.join(format!("{}.json", name));
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Collection not found - {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let doc: ApiNodes<T> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Decoding JSON for {}", path.display()))?;
        debug!("Collection loaded - name={}, nodes={}", name, doc.nodes.len());
        Ok(Some(doc.nodes))
    }
}

/// The five collections one build works from, already converted to domain records.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub incidents: Vec<Incident>,
    pub reports: Vec<Report>,
    /// Published taxonomy classifications, namespace as stored.
    pub classifications: Vec<ClassificationRecord>,
    /// Published resource annotations, namespace not yet forced.
    pub resources: Vec<ClassificationRecord>,
    pub taxonomies: Vec<Taxonomy>,
}

async fn required<S: ContentSource, T: DeserializeOwned + Send>(
    source: &S,
    name: &str,
) -> Result<Vec<T>> {
    source
        .fetch_nodes(name)
        .await?
        .with_context(|| format!("required collection '{}' is missing", name))
}

/// Fetch all five collections concurrently.
pub async fn fetch_collections<S: ContentSource>(source: &S) -> Result<Collections> {
    let start = std::time::Instant::now();

    let (incidents, reports, classifications, resources, taxa) = futures::try_join!(
        required::<_, ApiIncident>(source, "incidents"),
        required::<_, ApiReport>(source, "reports"),
        required::<_, ApiClassification>(source, "classifications"),
        required::<_, ApiClassification>(source, "resources"),
        required::<_, ApiTaxonomy>(source, "taxa"),
    )?;

    let raw_classifications = classifications.len();
    let raw_resources = resources.len();

    let collections = Collections {
        incidents: incidents.into_iter().map(convert_incident).collect(),
        reports: reports.into_iter().map(convert_report).collect(),
        classifications: published(classifications, "CSET"),
        resources: published(resources, "resources"),
        taxonomies: taxa.into_iter().map(convert_taxonomy).collect(),
    };

    info!(
        "Collections fetched - duration={:.2}s, incidents={}, reports={}, classifications={}/{}, resources={}/{}, taxa={}",
        start.elapsed().as_secs_f32(),
        collections.incidents.len(),
        collections.reports.len(),
        collections.classifications.len(),
        raw_classifications,
        collections.resources.len(),
        raw_resources,
        collections.taxonomies.len()
    );
    Ok(collections)
}

/// Name of the translation collection for a locale.
pub fn translation_collection(locale: &str) -> String {
    format!("translations_{}", locale)
}

/// Translations for one locale; a missing collection is an empty one.
pub async fn fetch_translations<S: ContentSource>(
    source: &S,
    locale: &str,
) -> Result<Vec<Translation>> {
    let nodes: Vec<ApiTranslation> = source
        .fetch_nodes(&translation_collection(locale))
        .await?
        .unwrap_or_default();
    debug!("Translations fetched - locale={}, count={}", locale, nodes.len());
    Ok(nodes
        .into_iter()
        .map(|t| Translation {
            report_number: t.report_number,
            title: t.title.unwrap_or_default(),
            text: t.text.unwrap_or_default(),
        })
        .collect())
}

fn published(nodes: Vec<ApiClassification>, default_namespace: &str) -> Vec<ClassificationRecord> {
    nodes
        .into_iter()
        .filter(ApiClassification::is_published)
        .map(|c| ClassificationRecord {
            incident_id: c.incident_id,
            namespace: c.namespace.unwrap_or_else(|| default_namespace.to_string()),
            notes: c.notes,
            field_values: c
                .classifications
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from(v)))
                .collect(),
        })
        .collect()
}

fn convert_incident(a: ApiIncident) -> Incident {
    Incident {
        incident_id: a.incident_id,
        title: a.title,
        date: a.date,
        report_numbers: a.reports.unwrap_or_default(),
        editors: a.editors.unwrap_or_default(),
        embedding: a
            .embedding
            .and_then(|e| e.vector)
            .map(|vector| Embedding { vector }),
        editor_similar_incidents: a.editor_similar_incidents.unwrap_or_default(),
        editor_dissimilar_incidents: a.editor_dissimilar_incidents.unwrap_or_default(),
        flagged_dissimilar_incidents: a.flagged_dissimilar_incidents.unwrap_or_default(),
        nlp_similar_incidents: a.nlp_similar_incidents.unwrap_or_default(),
    }
}

fn convert_report(a: ApiReport) -> Report {
    Report {
        report_number: a.report_number,
        title: a.title.unwrap_or_default(),
        text: a.text.unwrap_or_default(),
        url: a.url.unwrap_or_default(),
        image_url: a.image_url,
        cloudinary_id: a.cloudinary_id,
        source_domain: a.source_domain,
        date_published: a.date_published,
        epoch_date_submitted: a.epoch_date_submitted,
        authors: a.authors.unwrap_or_default(),
        submitters: a.submitters.unwrap_or_default(),
        language: a.language.unwrap_or_default(),
    }
}

fn convert_taxonomy(a: ApiTaxonomy) -> Taxonomy {
    Taxonomy {
        namespace: a.namespace,
        weight: a.weight,
        description: a.description,
        field_list: a
            .field_list
            .unwrap_or_default()
            .into_iter()
            .map(|f| TaxonomyField {
                short_name: f.short_name,
                long_name: f.long_name,
                long_description: f.long_description,
                short_description: f.short_description,
                weight: f.weight.unwrap_or(0.0),
                public: f.public,
                display_type: f.display_type,
                render_as: f.render_as,
            })
            .collect(),
    }
}
