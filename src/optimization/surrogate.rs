//! One-dimensional Gaussian-process surrogate and expected improvement
//!
//! Inputs are normalised to `[0, 1]` over the coefficient range and targets
//! are standardised before fitting, so the kernel hyperparameters below are
//! unitless.
//!
//! ## Model
//! - RBF kernel: k(a, b) = exp(-(a - b)^2 / (2 l^2))
//! - Diagonal noise term added before factorisation
//! - Length scale `l` picked from `LENGTH_SCALES` by log marginal likelihood

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use super::OptimizerError;

/// Candidate length scales in normalised input units.
pub const LENGTH_SCALES: [f64; 5] = [0.05, 0.1, 0.2, 0.4, 0.8];

/// Added to the diagonal on top of the noise term to keep factorisation
/// stable for repeated inputs.
const JITTER: f64 = 1e-9;

/// A fitted GP posterior.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    xs: Vec<f64>,
    chol: Vec<Vec<f64>>,
    alpha: Vec<f64>,
    y_mean: f64,
    y_std: f64,
    length_scale: f64,
    log_marginal_likelihood: f64,
}

impl GaussianProcess {
    /// Fit on normalised inputs `xs` and raw targets `ys`, selecting the
    /// length scale with the highest marginal likelihood.
    pub fn fit(xs: &[f64], ys: &[f64], noise_variance: f64) -> Result<Self, OptimizerError> {
        if xs.is_empty() || xs.len() != ys.len() {
            return Err(OptimizerError::InsufficientHistory);
        }

        let n = ys.len() as f64;
        let y_mean = ys.iter().sum::<f64>() / n;
        let var = ys.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n;
        // Flat history: keep unit scale so the posterior is still defined
        let y_std = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        let targets: Vec<f64> = ys.iter().map(|y| (y - y_mean) / y_std).collect();

        let mut best: Option<Self> = None;
        for &length_scale in &LENGTH_SCALES {
            let Some(candidate) = Self::fit_with(xs, &targets, length_scale, noise_variance, y_mean, y_std) else {
                continue;
            };
            let better = best
                .as_ref()
                .map_or(true, |b| candidate.log_marginal_likelihood > b.log_marginal_likelihood);
            if better {
                best = Some(candidate);
            }
        }

        best.ok_or(OptimizerError::Factorization)
    }

    fn fit_with(
        xs: &[f64],
        targets: &[f64],
        length_scale: f64,
        noise_variance: f64,
        y_mean: f64,
        y_std: f64,
    ) -> Option<Self> {
        let n = xs.len();
        let mut k = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                k[i][j] = rbf(xs[i], xs[j], length_scale);
            }
            k[i][i] += noise_variance + JITTER;
        }

        let chol = cholesky(&k)?;
        let z = solve_lower(&chol, targets);
        let alpha = solve_upper_transposed(&chol, &z);

        let data_fit: f64 = targets.iter().zip(&alpha).map(|(y, a)| y * a).sum();
        let log_det: f64 = (0..n).map(|i| chol[i][i].ln()).sum();
        let lml = -0.5 * data_fit - log_det - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();
        if !lml.is_finite() {
            return None;
        }

        Some(Self {
            xs: xs.to_vec(),
            chol,
            alpha,
            y_mean,
            y_std,
            length_scale,
            log_marginal_likelihood: lml,
        })
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// Posterior mean and standard deviation at `x`, in raw target units.
    pub fn predict(&self, x: f64) -> (f64, f64) {
        let k_star: Vec<f64> = self.xs.iter().map(|&xi| rbf(x, xi, self.length_scale)).collect();
        let mean: f64 = k_star.iter().zip(&self.alpha).map(|(k, a)| k * a).sum();
        let v = solve_lower(&self.chol, &k_star);
        let var = (1.0 - v.iter().map(|vi| vi * vi).sum::<f64>()).max(0.0);
        (
            self.y_mean + mean * self.y_std,
            var.sqrt() * self.y_std,
        )
    }
}

fn rbf(a: f64, b: f64, length_scale: f64) -> f64 {
    let d = a - b;
    (-(d * d) / (2.0 * length_scale * length_scale)).exp()
}

/// Lower-triangular Cholesky factor of a symmetric matrix, or `None` if it
/// is not positive definite.
pub fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let d = a[i][i] - sum;
                if !d.is_finite() || d <= 0.0 {
                    return None;
                }
                l[i][j] = d.sqrt();
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }
    Some(l)
}

/// Solve `L z = b` for lower-triangular `L`.
fn solve_lower(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut z = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|k| l[i][k] * z[k]).sum();
        z[i] = (b[i] - sum) / l[i][i];
    }
    z
}

/// Solve `L^T x = z` for lower-triangular `L`.
fn solve_upper_transposed(l: &[Vec<f64>], z: &[f64]) -> Vec<f64> {
    let n = z.len();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| l[k][i] * x[k]).sum();
        x[i] = (z[i] - sum) / l[i][i];
    }
    x
}

/// Expected improvement over `best` for a maximisation problem.
///
/// `xi` trades exploitation for exploration. Zero variance yields the plain
/// improvement (never negative).
pub fn expected_improvement(mean: f64, std_dev: f64, best: f64, xi: f64) -> f64 {
    let improvement = mean - best - xi;
    if std_dev <= 1e-12 {
        return improvement.max(0.0);
    }
    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return improvement.max(0.0);
    };
    let z = improvement / std_dev;
    improvement * normal.cdf(z) + std_dev * normal.pdf(z)
}
