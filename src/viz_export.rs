// src/viz_export.rs
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::{fs, path::Path};

use crate::emit::write_json;
use crate::layout::LayoutDiagnostics;
use crate::models::SpatialPoint;

/* -------------------------------------------------------------------------- */
/* Entry point                                                                */
/* -------------------------------------------------------------------------- */

/// Counts reported in `build.index.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildCounts {
    pub incidents: usize,
    pub reports: usize,
    pub classifications: usize,
    pub taxonomies: usize,
    pub pages: usize,
    pub missing_translations: usize,
}

/// Write the shared layout (`spatial.json`) and the per-build index into `out_dir`.
///
/// Pages already carry the full layout; this copy lets the global
/// visualization load it without a citation page.
pub fn write_layout_bundle(
    out_dir: &Path,
    points: &[SpatialPoint],
    diagnostics: &LayoutDiagnostics,
    counts: &BuildCounts,
    locales: &[String],
) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {:?}", out_dir))?;

    // 1) Spatial points
    let bounds = bounds(points);
    write_json(
        out_dir.join("spatial.json"),
        &json!({
            "version": 1,
            "bounds": bounds,
            "points": points,
        }),
    )?;

    // 2) Per-build index
    let idx = json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "version": 1,
        "counts": counts,
        "locales": locales,
        "layout": diagnostics,
        "files": ["spatial.json", "pages.manifest.json"],
    });
    write_json(out_dir.join("build.index.json"), &idx)?;

    Ok(())
}

/* -------------------------------------------------------------------------- */
/* Helpers                                                                    */
/* -------------------------------------------------------------------------- */

#[derive(Serialize, Debug, PartialEq)]
struct VBounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

fn bounds(points: &[SpatialPoint]) -> Option<VBounds> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().fold(
        VBounds {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        },
        |b, p| VBounds {
            min_x: b.min_x.min(p.x),
            max_x: b.max_x.max(p.x),
            min_y: b.min_y.min(p.y),
            max_y: b.max_y.max(p.y),
        },
    ))
}
