//! Gaussian-process surrogate over the unit cube with an RBF kernel.
//!
//! Targets are standardized before fitting; predictions come back in the same
//! standardized units, which is all the acquisition functions need.

const LENGTH_SCALES: [f64; 7] = [0.05, 0.1, 0.2, 0.3, 0.5, 1.0, 2.0];
const NOISE: f64 = 1e-6;
const MAX_JITTER_STEPS: usize = 6;

#[derive(Debug, Clone)]
pub(crate) struct GaussianProcess {
    xs: Vec<Vec<f64>>,
    length_scale: f64,
    /// Lower Cholesky factor of K + noise I, row-major n x n.
    chol: Vec<f64>,
    alpha: Vec<f64>,
    y_mean: f64,
    y_std: f64,
    best_standardized: f64,
}

impl GaussianProcess {
    /// Fits on `(xs, ys)` and picks the length scale with the highest log
    /// marginal likelihood. `None` when there is nothing to fit.
    pub(crate) fn fit(xs: &[Vec<f64>], ys: &[f64]) -> Option<Self> {
        if xs.is_empty() || xs.len() != ys.len() {
            return None;
        }
        let n = ys.len() as f64;
        let y_mean = ys.iter().sum::<f64>() / n;
        let var = ys.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n;
        let y_std = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        let standardized: Vec<f64> = ys.iter().map(|y| (y - y_mean) / y_std).collect();

        let dims = xs[0].len().max(1) as f64;
        let mut best: Option<(f64, Self)> = None;
        for scale in LENGTH_SCALES {
            let length_scale = scale * dims.sqrt();
            let Some((gp, lml)) = Self::fit_with(xs, &standardized, length_scale, y_mean, y_std) else {
                continue;
            };
            if best.as_ref().map_or(true, |(best_lml, _)| lml > *best_lml) {
                best = Some((lml, gp));
            }
        }
        best.map(|(_, gp)| gp)
    }

    fn fit_with(
        xs: &[Vec<f64>],
        ys: &[f64],
        length_scale: f64,
        y_mean: f64,
        y_std: f64,
    ) -> Option<(Self, f64)> {
        let n = xs.len();
        let mut kernel = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..=i {
                let k = rbf(&xs[i], &xs[j], length_scale);
                kernel[i * n + j] = k;
                kernel[j * n + i] = k;
            }
        }

        let mut jitter = NOISE;
        let mut chol = None;
        for _ in 0..MAX_JITTER_STEPS {
            let mut a = kernel.clone();
            for i in 0..n {
                a[i * n + i] += jitter;
            }
            if cholesky(&mut a, n) {
                chol = Some(a);
                break;
            }
            jitter *= 10.0;
        }
        let chol = chol?;

        let alpha = solve_upper_transposed(&chol, &solve_lower(&chol, ys, n), n);
        let data_fit: f64 = ys.iter().zip(&alpha).map(|(y, a)| y * a).sum();
        let log_det: f64 = (0..n).map(|i| chol[i * n + i].ln()).sum();
        let lml = -0.5 * data_fit - log_det - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();
        if !lml.is_finite() {
            return None;
        }

        let best_standardized = ys.iter().copied().fold(f64::INFINITY, f64::min);
        Some((
            Self {
                xs: xs.to_vec(),
                length_scale,
                chol,
                alpha,
                y_mean,
                y_std,
                best_standardized,
            },
            lml,
        ))
    }

    pub(crate) fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// Lowest observed target, standardized.
    pub(crate) fn best_standardized(&self) -> f64 {
        self.best_standardized
    }

    /// Posterior mean and standard deviation, standardized.
    pub(crate) fn predict(&self, x: &[f64]) -> (f64, f64) {
        let n = self.xs.len();
        let k_star: Vec<f64> = self
            .xs
            .iter()
            .map(|xi| rbf(x, xi, self.length_scale))
            .collect();
        let mean: f64 = k_star.iter().zip(&self.alpha).map(|(k, a)| k * a).sum();
        let v = solve_lower(&self.chol, &k_star, n);
        let var = (1.0 - v.iter().map(|vi| vi * vi).sum::<f64>()).max(1e-12);
        (mean, var.sqrt())
    }

    /// Posterior mean in the original target units.
    pub(crate) fn predict_raw(&self, x: &[f64]) -> f64 {
        self.predict(x).0 * self.y_std + self.y_mean
    }
}

fn rbf(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let sq_dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (-sq_dist / (2.0 * length_scale * length_scale)).exp()
}

/// In-place lower Cholesky factorization; the strict upper triangle is zeroed.
/// Returns false when the matrix is not positive definite.
fn cholesky(a: &mut [f64], n: usize) -> bool {
    for j in 0..n {
        let mut diag = a[j * n + j];
        for k in 0..j {
            diag -= a[j * n + k] * a[j * n + k];
        }
        if !(diag > 0.0) || !diag.is_finite() {
            return false;
        }
        let diag = diag.sqrt();
        a[j * n + j] = diag;
        for i in (j + 1)..n {
            let mut value = a[i * n + j];
            for k in 0..j {
                value -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = value / diag;
        }
        for k in (j + 1)..n {
            a[j * n + k] = 0.0;
        }
    }
    true
}

/// Solves L x = b.
fn solve_lower(l: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut x = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

/// Solves L^T x = b.
fn solve_upper_transposed(l: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for k in (i + 1)..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}
