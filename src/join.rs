use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::models::{Incident, IncidentId, Report, ReportEntry, ReportNumber};

/// incident id -> that incident's reports, in `report_numbers` order.
///
/// Keys iterate in ascending incident id; prev/next navigation follows this order.
pub type IncidentReportsMap = BTreeMap<IncidentId, Arc<Vec<ReportEntry>>>;

/// Build the incident -> ordered reports lookup.
///
/// A report number without a matching report keeps its slot as
/// [`ReportEntry::Missing`]. When several incidents share an id the last one wins.
pub fn build_report_map(incidents: &[Incident], reports: &[Report]) -> IncidentReportsMap {
    // first report wins on duplicate numbers
    let mut by_number: HashMap<ReportNumber, &Report> = HashMap::with_capacity(reports.len());
    for r in reports {
        by_number.entry(r.report_number).or_insert(r);
    }

    let mut map = IncidentReportsMap::new();
    let mut missing = 0usize;
    for incident in incidents {
        let entries: Vec<ReportEntry> = incident
            .report_numbers
            .iter()
            .map(|n| match by_number.get(n) {
                Some(r) => ReportEntry::Found((*r).clone()),
                None => {
                    missing += 1;
                    ReportEntry::Missing {}
                }
            })
            .collect();
        map.insert(incident.incident_id, Arc::new(entries));
    }

    debug!(
        "Report join completed - incidents={}, unmatched_report_numbers={}",
        map.len(),
        missing
    );
    map
}

/// Immutable lookup tables shared by every stage of one build.
pub struct Lookups<'a> {
    pub incidents: &'a [Incident],
    pub incidents_by_id: HashMap<IncidentId, &'a Incident>,
    pub reports: IncidentReportsMap,
}

impl<'a> Lookups<'a> {
    pub fn new(incidents: &'a [Incident], reports: IncidentReportsMap) -> Self {
        let mut incidents_by_id = HashMap::with_capacity(incidents.len());
        for i in incidents {
            incidents_by_id.entry(i.incident_id).or_insert(i);
        }
        Self {
            incidents,
            incidents_by_id,
            reports,
        }
    }

    pub fn incident(&self, id: IncidentId) -> Option<&'a Incident> {
        self.incidents_by_id.get(&id).copied()
    }

    pub fn reports_for(&self, id: IncidentId) -> Option<&Arc<Vec<ReportEntry>>> {
        self.reports.get(&id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn incident(id: IncidentId, reports: Vec<ReportNumber>) -> Incident {
        Incident {
            incident_id: id,
            title: None,
            date: None,
            report_numbers: reports,
            editors: vec![],
            embedding: None,
            editor_similar_incidents: vec![],
            editor_dissimilar_incidents: vec![],
            flagged_dissimilar_incidents: vec![],
            nlp_similar_incidents: vec![],
        }
    }

    pub(crate) fn report(n: ReportNumber, language: &str) -> Report {
        Report {
            report_number: n,
            title: format!("title {}", n),
            text: format!("text {}", n),
            url: format!("https://example.com/{}", n),
            image_url: None,
            cloudinary_id: None,
            source_domain: Some("example.com".into()),
            date_published: None,
            epoch_date_submitted: None,
            authors: vec![],
            submitters: vec![],
            language: language.into(),
        }
    }

    #[test]
    fn missing_report_keeps_its_slot() {
        let map = build_report_map(&[incident(42, vec![101, 102])], &[report(101, "en")]);
        let entries = &map[&42];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ReportEntry::Found(report(101, "en")));
        assert_eq!(entries[1], ReportEntry::Missing {});
        assert_eq!(serde_json::to_string(&entries[1]).unwrap(), "{}");
    }

    #[test]
    fn preserves_report_order_and_shared_reports() {
        let reports = vec![report(1, "en"), report(2, "en"), report(3, "en")];
        let map = build_report_map(
            &[incident(5, vec![3, 1, 2]), incident(6, vec![1])],
            &reports,
        );
        let order: Vec<_> = map[&5]
            .iter()
            .map(|e| e.report().unwrap().report_number)
            .collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(map[&6][0].report().unwrap().report_number, 1);
    }

    #[test]
    fn keys_iterate_in_ascending_id_order() {
        let map = build_report_map(&[incident(9, vec![]), incident(2, vec![]), incident(5, vec![])], &[]);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![2, 5, 9]);
    }
}
