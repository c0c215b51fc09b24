//! Spatial layout of all incidents from their embeddings.
//!
//! The reduction itself sits behind [`Reducer`] so the aggregation stages can
//! be exercised without running the (slow, stochastic) numerical routine.
//! Everything after the reducer returns is deterministic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::models::{ClassificationRecord, FieldValue, Incident, IncidentId, SpatialPoint};

pub mod tsne;

pub use tsne::TsneReducer;

/// Classification axes copied onto every spatial point for visual encoding.
pub const CLASSIFICATION_AXES: [&str; 8] = [
    "Harm_Distribution_Basis",
    "System_Developer",
    "Problem_Nature",
    "Sector_of_Deployment",
    "Harm_Type",
    "Intent",
    "Near_Miss",
    "Severity",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Euclidean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TsneConfig {
    pub output_dims: usize,
    pub perplexity: f64,
    pub early_exaggeration: f64,
    pub learning_rate: f64,
    pub max_iterations: usize,
    pub metric: Metric,
    /// Optimisation stops once the gradient norm drops below this.
    pub min_gradient_norm: f64,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            output_dims: 2,
            perplexity: 30.0,
            early_exaggeration: 3.0,
            learning_rate: 100.0,
            max_iterations: 10_000,
            metric: Metric::Euclidean,
            min_gradient_norm: 1e-7,
        }
    }
}

/// Output of one reduction run.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    /// One row of `output_dims` coordinates per input vector, same order.
    pub coordinates: Vec<Vec<f64>>,
    /// Final approximation error (KL divergence for t-SNE).
    pub error: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Dimensionality reduction from equal-length vectors to low-dimensional coordinates.
pub trait Reducer: Send + Sync {
    fn reduce(&self, data: &[Vec<f64>], config: &TsneConfig) -> Reduction;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutDiagnostics {
    pub points: usize,
    /// Incidents whose embedding was empty or of a different dimension, or that
    /// the reducer returned no row for.
    pub skipped: usize,
    pub error: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub points: Vec<SpatialPoint>,
    pub diagnostics: LayoutDiagnostics,
}

/// Min-max rescale into [-1, 1]. A constant axis maps to 0.
pub fn rescale_axis(values: &mut [f64]) {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    for v in values.iter_mut() {
        *v = if range > 0.0 && range.is_finite() {
            2.0 * (*v - min) / range - 1.0
        } else {
            0.0
        };
    }
}

/// Project the fixed axis subset of a classification record.
pub fn axis_subset(record: &ClassificationRecord) -> IndexMap<String, FieldValue> {
    CLASSIFICATION_AXES
        .iter()
        .map(|axis| {
            (
                format!("{}:{}", record.namespace, axis),
                record
                    .field_values
                    .get(*axis)
                    .cloned()
                    .unwrap_or(FieldValue::Null),
            )
        })
        .collect()
}

/// Compute the global 2D layout of every incident with an embedding.
pub fn layout(
    incidents: &[Incident],
    classifications: &[ClassificationRecord],
    reducer: &dyn Reducer,
    config: &TsneConfig,
) -> Layout {
    let start = std::time::Instant::now();

    let mut ids: Vec<IncidentId> = Vec::new();
    let mut vectors: Vec<Vec<f64>> = Vec::new();
    let mut dimension: Option<usize> = None;
    let mut skipped = 0usize;

    for incident in incidents {
        let Some(embedding) = &incident.embedding else {
            continue;
        };
        let len = embedding.vector.len();
        let expected = if len == 0 {
            dimension.unwrap_or(0)
        } else {
            *dimension.get_or_insert(len)
        };
        if len == 0 || len != expected {
            warn!(
                "Skipping embedding - incident_id={}, dimension={}, expected={}",
                incident.incident_id, len, expected
            );
            skipped += 1;
            continue;
        }
        ids.push(incident.incident_id);
        vectors.push(embedding.vector.clone());
    }

    if vectors.is_empty() {
        info!("Layout skipped - no incidents with embeddings");
        return Layout {
            points: Vec::new(),
            diagnostics: LayoutDiagnostics {
                skipped,
                converged: true,
                ..Default::default()
            },
        };
    }

    debug!(
        "Layout starting - points={}, dimension={}, perplexity={}, max_iterations={}",
        vectors.len(),
        dimension.unwrap_or(0),
        config.perplexity,
        config.max_iterations
    );

    let reduction = reducer.reduce(&vectors, config);
    if !reduction.converged {
        warn!(
            "Layout did not converge - error={:.6}, iterations={}",
            reduction.error, reduction.iterations
        );
    }

    if reduction.coordinates.len() != ids.len() {
        warn!(
            "Reducer row count mismatch - inputs={}, rows={}",
            ids.len(),
            reduction.coordinates.len()
        );
        if reduction.coordinates.len() < ids.len() {
            skipped += ids.len() - reduction.coordinates.len();
        }
    }

    let coord = |row: &Vec<f64>, axis: usize| row.get(axis).copied().unwrap_or(0.0);
    let mut xs: Vec<f64> = reduction.coordinates.iter().map(|r| coord(r, 0)).collect();
    let mut ys: Vec<f64> = reduction.coordinates.iter().map(|r| coord(r, 1)).collect();
    rescale_axis(&mut xs);
    rescale_axis(&mut ys);

    let mut first_record: HashMap<IncidentId, &ClassificationRecord> = HashMap::new();
    for c in classifications {
        first_record.entry(c.incident_id).or_insert(c);
    }

    let points: Vec<SpatialPoint> = ids
        .iter()
        .zip(xs.into_iter().zip(ys))
        .map(|(&incident_id, (x, y))| SpatialPoint {
            incident_id,
            x,
            y,
            classifications: first_record.get(&incident_id).map(|c| axis_subset(c)),
        })
        .collect();

    info!(
        "Layout completed - duration={:.2}s, points={}, skipped={}, error={:.6}, iterations={}",
        start.elapsed().as_secs_f32(),
        points.len(),
        skipped,
        reduction.error,
        reduction.iterations
    );

    Layout {
        diagnostics: LayoutDiagnostics {
            points: points.len(),
            skipped,
            error: reduction.error,
            iterations: reduction.iterations,
            converged: reduction.converged,
        },
        points,
    }
}
