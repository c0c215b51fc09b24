//! Exact t-SNE (van der Maaten & Hinton, 2008).
//!
//! Quadratic in the number of points for both memory and time per iteration.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::{Metric, Reducer, Reduction, TsneConfig};

/// Iterations run with exaggerated attractive forces.
const EXAGGERATION_ITERATIONS: usize = 100;
/// Momentum switches from initial to final after this many iterations.
const MOMENTUM_SWITCH: usize = 250;
const INITIAL_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const MIN_GAIN: f64 = 0.01;
const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const PERPLEXITY_STEPS: usize = 50;
const MIN_PROBABILITY: f64 = 1e-12;

/// Exact t-SNE reducer.
///
/// The initial embedding is random. [`TsneReducer::new`] draws it from OS
/// entropy, so two runs over the same data differ; [`TsneReducer::seeded`]
/// makes a run reproducible.
#[derive(Debug, Clone, Default)]
pub struct TsneReducer {
    seed: Option<u64>,
}

impl TsneReducer {
    pub fn new() -> Self {
        Self { seed: None }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }
}

impl Reducer for TsneReducer {
    fn reduce(&self, data: &[Vec<f64>], config: &TsneConfig) -> Reduction {
        let n = data.len();
        let dims = config.output_dims.max(1);
        if n < 2 {
            return Reduction {
                coordinates: vec![vec![0.0; dims]; n],
                error: 0.0,
                iterations: 0,
                converged: true,
            };
        }

        let p = joint_probabilities(data, config);
        let mut rng = self.rng();
        let mut y: Vec<f64> = (0..n * dims).map(|_| 1e-4 * gaussian(&mut rng)).collect();
        let mut update = vec![0.0; n * dims];
        let mut gains: Vec<f64> = vec![1.0; n * dims];
        let mut grad = vec![0.0; n * dims];
        let mut num = vec![0.0; n * n];

        let mut iterations = 0;
        let mut converged = false;

        for iter in 0..config.max_iterations {
            let exaggeration = if iter < EXAGGERATION_ITERATIONS {
                config.early_exaggeration
            } else {
                1.0
            };
            let momentum = if iter < MOMENTUM_SWITCH {
                INITIAL_MOMENTUM
            } else {
                FINAL_MOMENTUM
            };

            let sum_num = student_t(&y, dims, &mut num);
            gradient(&p, &num, sum_num, &y, dims, exaggeration, &mut grad);

            let mut grad_norm = 0.0;
            for k in 0..n * dims {
                let g = grad[k];
                grad_norm += g * g;
                let gain = if (g > 0.0) != (update[k] > 0.0) {
                    gains[k] + 0.2
                } else {
                    gains[k] * 0.8
                };
                gains[k] = gain.max(MIN_GAIN);
                update[k] = momentum * update[k] - config.learning_rate * gains[k] * g;
                y[k] += update[k];
            }
            center(&mut y, dims);

            iterations = iter + 1;
            if iter >= EXAGGERATION_ITERATIONS && grad_norm.sqrt() < config.min_gradient_norm {
                converged = true;
                break;
            }
            if iter % 1000 == 0 && iter > 0 {
                debug!("t-SNE progress - iteration={}, grad_norm={:.3e}", iter, grad_norm.sqrt());
            }
        }

        let sum_num = student_t(&y, dims, &mut num);
        let error = kl_divergence(&p, &num, sum_num);

        Reduction {
            coordinates: y.chunks(dims).map(|r| r.to_vec()).collect(),
            error,
            iterations,
            converged,
        }
    }
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Symmetric joint probabilities P, row-major n x n.
fn joint_probabilities(data: &[Vec<f64>], config: &TsneConfig) -> Vec<f64> {
    let n = data.len();
    let target_entropy = config.perplexity.ln();

    let mut conditional = vec![0.0; n * n];
    conditional
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| {
            let distances: Vec<f64> = match config.metric {
                Metric::Euclidean => data.iter().map(|d| squared_distance(&data[i], d)).collect(),
            };
            conditional_row(&distances, i, target_entropy, row);
        });

    let denom = 2.0 * n as f64;
    let mut joint = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                joint[i * n + j] =
                    ((conditional[i * n + j] + conditional[j * n + i]) / denom).max(MIN_PROBABILITY);
            }
        }
    }
    joint
}

/// Binary search for the Gaussian precision that gives row `i` the target entropy.
fn conditional_row(distances: &[f64], i: usize, target_entropy: f64, row: &mut [f64]) {
    let mut beta = 1.0;
    let mut beta_min = 0.0;
    let mut beta_max = f64::INFINITY;

    let fill = |beta: f64, row: &mut [f64]| -> (f64, f64) {
        let mut sum = 0.0;
        let mut weighted = 0.0;
        for (j, (&d, p)) in distances.iter().zip(row.iter_mut()).enumerate() {
            *p = if j == i { 0.0 } else { (-d * beta).exp() };
            sum += *p;
            weighted += d * *p;
        }
        (sum, weighted)
    };

    for _ in 0..PERPLEXITY_STEPS {
        let (sum, weighted) = fill(beta, row);
        if sum <= f64::MIN_POSITIVE {
            // every neighbour underflowed: precision far too high
            beta_max = beta;
            beta = (beta + beta_min) / 2.0;
            continue;
        }
        let entropy = sum.ln() + beta * weighted / sum;
        let diff = entropy - target_entropy;
        if diff.abs() < PERPLEXITY_TOLERANCE {
            break;
        }
        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = (beta + beta_min) / 2.0;
        }
    }

    let (sum, _) = fill(beta, row);
    let others = (row.len() - 1).max(1) as f64;
    for (j, p) in row.iter_mut().enumerate() {
        *p = if j == i {
            0.0
        } else if sum > f64::MIN_POSITIVE {
            *p / sum
        } else {
            1.0 / others
        };
    }
}

/// Fill the Student-t kernel matrix and return its off-diagonal sum.
fn student_t(y: &[f64], dims: usize, num: &mut [f64]) -> f64 {
    let n = y.len() / dims;
    // row sums are added sequentially so seeded runs stay bit-identical
    let row_sums: Vec<f64> = num
        .par_chunks_mut(n)
        .enumerate()
        .map(|(i, row)| {
            let yi = &y[i * dims..(i + 1) * dims];
            let mut s = 0.0;
            for (j, q) in row.iter_mut().enumerate() {
                *q = if i == j {
                    0.0
                } else {
                    1.0 / (1.0 + squared_distance(yi, &y[j * dims..(j + 1) * dims]))
                };
                s += *q;
            }
            s
        })
        .collect();
    row_sums.iter().sum::<f64>().max(f64::MIN_POSITIVE)
}

fn gradient(
    p: &[f64],
    num: &[f64],
    sum_num: f64,
    y: &[f64],
    dims: usize,
    exaggeration: f64,
    grad: &mut [f64],
) {
    let n = y.len() / dims;
    grad.par_chunks_mut(dims).enumerate().for_each(|(i, g)| {
        g.iter_mut().for_each(|v| *v = 0.0);
        let yi = &y[i * dims..(i + 1) * dims];
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = num[i * n + j] / sum_num;
            let mult = (exaggeration * p[i * n + j] - q) * num[i * n + j];
            let yj = &y[j * dims..(j + 1) * dims];
            for d in 0..dims {
                g[d] += 4.0 * mult * (yi[d] - yj[d]);
            }
        }
    });
}

fn kl_divergence(p: &[f64], num: &[f64], sum_num: f64) -> f64 {
    p.iter()
        .zip(num)
        .filter(|(pij, _)| **pij > 0.0)
        .map(|(pij, nij)| {
            let q = (nij / sum_num).max(MIN_PROBABILITY);
            pij * (pij / q).ln()
        })
        .sum()
}

fn center(y: &mut [f64], dims: usize) {
    let n = (y.len() / dims) as f64;
    for d in 0..dims {
        let mean = y.iter().skip(d).step_by(dims).sum::<f64>() / n;
        y.iter_mut().skip(d).step_by(dims).for_each(|v| *v -= mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(max_iterations: usize) -> TsneConfig {
        TsneConfig {
            perplexity: 2.0,
            max_iterations,
            ..TsneConfig::default()
        }
    }

    fn two_clusters() -> Vec<Vec<f64>> {
        let mut data = Vec::new();
        for i in 0..6 {
            let jitter = i as f64 * 0.01;
            data.push(vec![jitter, 0.0, 0.0]);
            data.push(vec![10.0 + jitter, 10.0, 10.0]);
        }
        data
    }

    #[test]
    fn conditional_rows_are_distributions() {
        let data = two_clusters();
        let config = small_config(1);
        let n = data.len();
        let p = joint_probabilities(&data, &config);
        let total: f64 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "joint sums to {}", total);
        for i in 0..n {
            for j in 0..n {
                assert!((p[i * n + j] - p[j * n + i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn separates_distant_clusters() {
        let data = two_clusters();
        let out = TsneReducer::seeded(7).reduce(&data, &small_config(500));
        assert_eq!(out.coordinates.len(), data.len());
        assert!(out.coordinates.iter().all(|r| r.len() == 2));
        assert!(out.error.is_finite());

        let centroid = |parity: usize| -> Vec<f64> {
            let rows: Vec<&Vec<f64>> = out
                .coordinates
                .iter()
                .enumerate()
                .filter(|(i, _)| i % 2 == parity)
                .map(|(_, r)| r)
                .collect();
            (0..2)
                .map(|d| rows.iter().map(|r| r[d]).sum::<f64>() / rows.len() as f64)
                .collect()
        };
        let spread = |parity: usize, c: &[f64]| -> f64 {
            out.coordinates
                .iter()
                .enumerate()
                .filter(|(i, _)| i % 2 == parity)
                .map(|(_, r)| squared_distance(r, c).sqrt())
                .fold(0.0, f64::max)
        };
        let a = centroid(0);
        let b = centroid(1);
        let between = squared_distance(&a, &b).sqrt();
        assert!(between > spread(0, &a));
        assert!(between > spread(1, &b));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let data = two_clusters();
        let a = TsneReducer::seeded(11).reduce(&data, &small_config(50));
        let b = TsneReducer::seeded(11).reduce(&data, &small_config(50));
        assert_eq!(a, b);
    }

    #[test]
    fn stops_at_max_iterations() {
        let out = TsneReducer::seeded(1).reduce(&two_clusters(), &small_config(20));
        assert_eq!(out.iterations, 20);
        assert!(!out.converged);
    }

    #[test]
    fn single_point_sits_at_origin() {
        let out = TsneReducer::new().reduce(&[vec![1.0, 2.0, 3.0]], &TsneConfig::default());
        assert_eq!(out.coordinates, vec![vec![0.0, 0.0]]);
        assert!(out.converged);
    }
}
