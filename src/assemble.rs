use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::classify::{project_fields, sorted_fields};
use crate::join::Lookups;
use crate::models::{
    ClassificationRecord, IncidentId, PageContext, SpatialPoint, Taxonomy, TaxonomyEntry,
};
use crate::similarity::{resolve, SimilarityRelation};

#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleOptions {
    /// Also resolve `flagged_dissimilar_incidents` into page data.
    pub resolve_flagged_dissimilar: bool,
}

/// Build one page context per incident key of the report map, in key order.
pub fn assemble(
    lookups: &Lookups<'_>,
    classifications: &[ClassificationRecord],
    taxonomies: &[Taxonomy],
    spatial: Arc<Vec<SpatialPoint>>,
    options: AssembleOptions,
) -> Vec<PageContext> {
    let mut by_incident: HashMap<IncidentId, Vec<&ClassificationRecord>> = HashMap::new();
    for c in classifications {
        by_incident.entry(c.incident_id).or_default().push(c);
    }

    // sort each taxonomy's fields once; every page shows the same order
    let taxonomies: Vec<Taxonomy> = taxonomies
        .iter()
        .map(|t| Taxonomy {
            field_list: sorted_fields(&t.field_list),
            ..t.clone()
        })
        .collect();

    let keys: Vec<IncidentId> = lookups.reports.keys().copied().collect();

    let contexts: Vec<PageContext> = keys
        .par_iter()
        .enumerate()
        .filter_map(|(i, &incident_id)| {
            let Some(incident) = lookups.incident(incident_id) else {
                warn!("Joined incident vanished from lookup - incident_id={}", incident_id);
                return None;
            };
            let records = by_incident
                .get(&incident_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let taxonomy_entries = taxonomies
                .iter()
                .map(|t| TaxonomyEntry {
                    notes: records
                        .iter()
                        .find(|c| c.namespace == t.namespace)
                        .and_then(|c| c.notes.clone()),
                    namespace: t.namespace.clone(),
                    classifications_array: project_fields(records, t),
                    taxonomy_fields: t.field_list.clone(),
                })
                .collect();

            let incident_reports = lookups
                .reports_for(incident_id)
                .cloned()
                .unwrap_or_default();

            Some(PageContext {
                incident: incident.clone(),
                incident_reports,
                taxonomies: taxonomy_entries,
                next_incident: keys.get(i + 1).copied(),
                prev_incident: i.checked_sub(1).and_then(|p| keys.get(p)).copied(),
                spatial_incidents: Arc::clone(&spatial),
                nlp_similar_incidents: resolve(incident, SimilarityRelation::NlpSimilar, lookups),
                editor_similar_incidents: resolve(
                    incident,
                    SimilarityRelation::EditorSimilar,
                    lookups,
                ),
                editor_dissimilar_incidents: resolve(
                    incident,
                    SimilarityRelation::EditorDissimilar,
                    lookups,
                ),
                flagged_dissimilar_incidents: options.resolve_flagged_dissimilar.then(|| {
                    resolve(incident, SimilarityRelation::FlaggedDissimilar, lookups)
                }),
            })
        })
        .collect();

    debug!(
        "Contexts assembled - contexts={}, taxonomies={}, spatial_points={}",
        contexts.len(),
        taxonomies.len(),
        spatial.len()
    );
    contexts
}
