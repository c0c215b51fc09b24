use crate::join::Lookups;
use crate::models::{Incident, ResolvedSimilar, SimilarRef};

/// The similarity relations an incident carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimilarityRelation {
    NlpSimilar,
    EditorSimilar,
    EditorDissimilar,
    FlaggedDissimilar,
}

impl SimilarityRelation {
    pub fn entries(self, incident: &Incident) -> &[SimilarRef] {
        match self {
            SimilarityRelation::NlpSimilar => &incident.nlp_similar_incidents,
            SimilarityRelation::EditorSimilar => &incident.editor_similar_incidents,
            SimilarityRelation::EditorDissimilar => &incident.editor_dissimilar_incidents,
            SimilarityRelation::FlaggedDissimilar => &incident.flagged_dissimilar_incidents,
        }
    }
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// Materialize one relation of `incident` against the full incident set.
///
/// Entries keep their source order. An id that is not in the incident set is
/// kept with a null title and date; an id that was never joined has no reports.
pub fn resolve(
    incident: &Incident,
    relation: SimilarityRelation,
    lookups: &Lookups<'_>,
) -> Vec<ResolvedSimilar> {
    relation
        .entries(incident)
        .iter()
        .map(|entry| {
            let id = entry.incident_id();
            let found = lookups.incident(id);
            ResolvedSimilar {
                title: found.and_then(|i| non_empty(&i.title)),
                date: found.and_then(|i| non_empty(&i.date)),
                incident_id: id,
                similarity: entry.similarity(),
                reports: lookups.reports_for(id).cloned(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::build_report_map;
    use crate::join::tests::{incident, report};
    use std::sync::Arc;

    #[test]
    fn unknown_incident_degrades_but_is_kept() {
        let mut seven = incident(7, vec![]);
        seven.nlp_similar_incidents = vec![SimilarRef::Scored {
            incident_id: 99,
            similarity: Some(0.8),
        }];
        let incidents = vec![seven];
        let lookups = Lookups::new(&incidents, build_report_map(&incidents, &[]));

        let resolved = resolve(&incidents[0], SimilarityRelation::NlpSimilar, &lookups);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].incident_id, 99);
        assert_eq!(resolved[0].title, None);
        assert_eq!(resolved[0].date, None);
        assert_eq!(resolved[0].reports, None);
        assert_eq!(resolved[0].similarity, Some(0.8));
    }

    #[test]
    fn resolves_in_source_order_with_reports() {
        let mut a = incident(1, vec![]);
        a.editor_similar_incidents = vec![SimilarRef::Id(3), SimilarRef::Id(2)];
        let mut b = incident(2, vec![20]);
        b.title = Some("Second".into());
        b.date = Some("2021-05-01".into());
        let mut c = incident(3, vec![]);
        c.title = Some(String::new());
        let incidents = vec![a, b, c];
        let lookups = Lookups::new(&incidents, build_report_map(&incidents, &[report(20, "en")]));

        let resolved = resolve(&incidents[0], SimilarityRelation::EditorSimilar, &lookups);
        assert_eq!(
            resolved.iter().map(|r| r.incident_id).collect::<Vec<_>>(),
            vec![3, 2]
        );
        assert_eq!(resolved[0].title, None);
        assert_eq!(resolved[0].reports.as_ref().map(|r| r.len()), Some(0));
        assert_eq!(resolved[1].title.as_deref(), Some("Second"));
        assert_eq!(resolved[1].date.as_deref(), Some("2021-05-01"));
        assert!(Arc::ptr_eq(
            resolved[1].reports.as_ref().unwrap(),
            lookups.reports_for(2).unwrap()
        ));
        assert_eq!(resolved[1].similarity, None);
    }
}
