use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::models::{IncidentId, PageContext, ReportEntry, ReportNumber, Translation};

/// Translations of one locale, keyed by report number (first entry wins).
#[derive(Debug, Clone, Default)]
pub struct TranslationIndex {
    by_report: HashMap<ReportNumber, Translation>,
}

impl TranslationIndex {
    pub fn new(translations: Vec<Translation>) -> Self {
        let mut by_report = HashMap::with_capacity(translations.len());
        for t in translations {
            by_report.entry(t.report_number).or_insert(t);
        }
        Self { by_report }
    }

    pub fn get(&self, report_number: ReportNumber) -> Option<&Translation> {
        self.by_report.get(&report_number)
    }

    pub fn len(&self) -> usize {
        self.by_report.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_report.is_empty()
    }
}

/// Route of an incident's citation page. The default locale is unprefixed.
pub fn citation_path(locale: &str, default_locale: &str, incident_id: IncidentId) -> String {
    if locale == default_locale {
        format!("/cite/{}", incident_id)
    } else {
        format!("/{}/cite/{}", locale, incident_id)
    }
}

/// Localize a context, also returning the report numbers that had no translation.
pub fn localize_with_missing(
    context: &PageContext,
    locale: &str,
    translations: &TranslationIndex,
) -> (PageContext, Vec<ReportNumber>) {
    let mut missing = Vec::new();
    let reports: Vec<ReportEntry> = context
        .incident_reports
        .iter()
        .map(|entry| {
            let ReportEntry::Found(report) = entry else {
                // an unjoined slot has no language or number; it stays `{}` and is not counted
                warn!("Missing translation - report_number=<missing>, locale={}", locale);
                return entry.clone();
            };
            if report.language == locale {
                return entry.clone();
            }
            match translations.get(report.report_number) {
                Some(t) => {
                    let mut translated = report.clone();
                    translated.title = t.title.clone();
                    translated.text = t.text.clone();
                    ReportEntry::Found(translated)
                }
                None => {
                    warn!(
                        "Missing translation - report_number={}, locale={}",
                        report.report_number, locale
                    );
                    missing.push(report.report_number);
                    entry.clone()
                }
            }
        })
        .collect();

    let localized = PageContext {
        incident_reports: Arc::new(reports),
        ..context.clone()
    };
    (localized, missing)
}

/// Overlay translated title/text onto every report not written in `locale`.
///
/// A report without a translation keeps its original content; this never fails.
pub fn localize(context: &PageContext, locale: &str, translations: &TranslationIndex) -> PageContext {
    localize_with_missing(context, locale, translations).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::tests::{incident, report};

    fn context(reports: Vec<ReportEntry>) -> PageContext {
        PageContext {
            incident: incident(42, vec![101, 102, 103]),
            incident_reports: Arc::new(reports),
            taxonomies: vec![],
            next_incident: None,
            prev_incident: None,
            spatial_incidents: Arc::new(vec![]),
            nlp_similar_incidents: vec![],
            editor_similar_incidents: vec![],
            editor_dissimilar_incidents: vec![],
            flagged_dissimilar_incidents: None,
        }
    }

    fn translation(n: ReportNumber) -> Translation {
        Translation {
            report_number: n,
            title: format!("título {}", n),
            text: format!("texto {}", n),
        }
    }

    #[test]
    fn overlays_translations_and_falls_back() {
        let ctx = context(vec![
            ReportEntry::Found(report(101, "en")),
            ReportEntry::Found(report(102, "en")),
            ReportEntry::Found(report(103, "es")),
            ReportEntry::Missing {},
        ]);
        let index = TranslationIndex::new(vec![translation(101), translation(103)]);

        let (out, missing) = localize_with_missing(&ctx, "es", &index);

        assert_eq!(missing, vec![102]);
        let r: Vec<_> = out.incident_reports.iter().collect();
        let first = r[0].report().unwrap();
        assert_eq!(first.title, "título 101");
        assert_eq!(first.text, "texto 101");
        assert_eq!(first.language, "en");
        assert_eq!(r[1].report().unwrap().title, "title 102");
        assert_eq!(r[2].report().unwrap().title, "title 103");
        assert_eq!(r[3], &ReportEntry::Missing {});
        // the source context is untouched
        assert_eq!(ctx.incident_reports[0].report().unwrap().title, "title 101");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unjoined_slot_warns_and_passes_through() {
        let ctx = context(vec![ReportEntry::Missing {}]);
        let index = TranslationIndex::new(vec![]);
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let (out, missing) =
            tracing::subscriber::with_default(subscriber, || localize_with_missing(&ctx, "es", &index));

        assert_eq!(out.incident_reports[0], ReportEntry::Missing {});
        assert!(missing.is_empty());
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Missing translation - report_number=<missing>, locale=es"));
    }

    #[test]
    fn localizing_twice_is_stable() {
        let ctx = context(vec![
            ReportEntry::Found(report(101, "en")),
            ReportEntry::Found(report(102, "fr")),
        ]);
        let index = TranslationIndex::new(vec![translation(101), translation(102)]);
        let once = localize(&ctx, "es", &index);
        let twice = localize(&once, "es", &index);
        assert_eq!(once.incident_reports, twice.incident_reports);
    }

    #[test]
    fn first_translation_wins() {
        let mut other = translation(101);
        other.title = "otro".into();
        let index = TranslationIndex::new(vec![translation(101), other]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(101).unwrap().title, "título 101");
    }

    #[test]
    fn paths_are_locale_qualified() {
        assert_eq!(citation_path("en", "en", 7), "/cite/7");
        assert_eq!(citation_path("es", "en", 7), "/es/cite/7");
    }
}
