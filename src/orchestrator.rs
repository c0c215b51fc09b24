use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assemble::{assemble, AssembleOptions};
use crate::classify::normalize;
use crate::config::BuildConfig;
use crate::emit::PageEmitter;
use crate::fetch::{fetch_collections, fetch_translations, Collections, ContentSource};
use crate::join::{build_report_map, Lookups};
use crate::layout::{layout, LayoutDiagnostics, Reducer};
use crate::locale::{citation_path, localize_with_missing, TranslationIndex};
use crate::models::{PageContext, ReportNumber};
use crate::viz_export::{write_layout_bundle, BuildCounts};

#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub counts: BuildCounts,
    pub layout: LayoutDiagnostics,
    /// locale -> report numbers that fell back to their original language
    pub missing_translations: BTreeMap<String, Vec<ReportNumber>>,
}

struct Aggregated {
    contexts: Vec<PageContext>,
    layout: LayoutDiagnostics,
    counts: BuildCounts,
}

/// Join, classify, lay out and assemble. CPU-bound; runs on a blocking thread.
fn aggregate(collections: Collections, reducer: &dyn Reducer, cfg: &BuildConfig) -> Aggregated {
    let Collections {
        incidents,
        reports,
        classifications,
        resources,
        taxonomies,
    } = collections;

    let classifications = normalize(classifications, resources);

    // the layout only needs incidents + classifications, so it overlaps the join
    let (spatial, report_map) = rayon::join(
        || layout(&incidents, &classifications, reducer, &cfg.layout),
        || build_report_map(&incidents, &reports),
    );

    let lookups = Lookups::new(&incidents, report_map);
    let contexts = assemble(
        &lookups,
        &classifications,
        &taxonomies,
        Arc::new(spatial.points),
        AssembleOptions {
            resolve_flagged_dissimilar: cfg.resolve_flagged_dissimilar,
        },
    );

    Aggregated {
        counts: BuildCounts {
            incidents: incidents.len(),
            reports: reports.len(),
            classifications: classifications.len(),
            taxonomies: taxonomies.len(),
            ..Default::default()
        },
        layout: spatial.diagnostics,
        contexts,
    }
}

async fn fetch_all_translations<S: ContentSource>(
    source: &S,
    locales: &[String],
) -> Result<Vec<TranslationIndex>> {
    let fetches = locales.iter().map(|l| fetch_translations(source, l));
    let all = futures::future::try_join_all(fetches).await?;
    Ok(all.into_iter().map(TranslationIndex::new).collect())
}

/// Run one full build: fetch, aggregate, then localize and emit every page.
pub async fn run_build<S: ContentSource, E: PageEmitter>(
    cfg: &BuildConfig,
    source: &S,
    reducer: Arc<dyn Reducer>,
    emitter: &mut E,
) -> Result<BuildSummary> {
    let pipeline_start = std::time::Instant::now();
    info!(
        "Build started - locales={:?}, default_locale={}",
        cfg.locales, cfg.default_locale
    );

    // 1) fetch
    let collections = fetch_collections(source).await?;

    // 2) aggregate on a blocking worker while translations download
    let aggregate_start = std::time::Instant::now();
    let worker_cfg = cfg.clone();
    let aggregation = tokio::task::spawn_blocking(move || {
        aggregate(collections, reducer.as_ref(), &worker_cfg)
    });
    let (aggregated, translations) = tokio::try_join!(
        async { aggregation.await.context("aggregation worker panicked") },
        fetch_all_translations(source, &cfg.locales),
    )?;
    let Aggregated {
        contexts,
        layout,
        mut counts,
    } = aggregated;
    info!(
        "Aggregation completed - duration={:.2}s, contexts={}, layout_points={}",
        aggregate_start.elapsed().as_secs_f32(),
        contexts.len(),
        layout.points
    );

    // 3) localize + emit per locale
    let mut missing_translations = BTreeMap::new();
    for (locale, index) in cfg.locales.iter().zip(&translations) {
        let locale_start = std::time::Instant::now();
        debug!("Localizing - locale={}, translations={}", locale, index.len());

        let localized: Vec<(PageContext, Vec<ReportNumber>)> = contexts
            .par_iter()
            .map(|c| localize_with_missing(c, locale, index))
            .collect();

        let mut missing = Vec::new();
        for (context, mut gaps) in localized {
            let path = citation_path(locale, &cfg.default_locale, context.incident.incident_id);
            emitter
                .emit(&path, &context)
                .with_context(|| format!("emitting {}", path))?;
            missing.append(&mut gaps);
            counts.pages += 1;
        }

        if !missing.is_empty() {
            warn!(
                "Locale fell back to original content - locale={}, reports={}",
                locale,
                missing.len()
            );
        }
        info!(
            "Locale emitted - locale={}, pages={}, duration={:.2}s",
            locale,
            contexts.len(),
            locale_start.elapsed().as_secs_f32()
        );
        counts.missing_translations += missing.len();
        missing_translations.insert(locale.clone(), missing);
    }
    emitter.finish()?;

    // 4) shared layout bundle
    let shared = contexts
        .first()
        .map(|c| c.spatial_incidents.clone())
        .unwrap_or_default();
    write_layout_bundle(&cfg.output_dir, &shared, &layout, &counts, &cfg.locales)?;

    info!(
        "Build completed - total_duration={:.2}s, pages={}, missing_translations={}",
        pipeline_start.elapsed().as_secs_f32(),
        counts.pages,
        counts.missing_translations
    );

    Ok(BuildSummary {
        counts,
        layout,
        missing_translations,
    })
}
