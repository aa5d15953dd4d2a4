use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionKind {
    /// GP-Hedge portfolio over EI, LCB and PI.
    Auto,
    Ei,
    Lcb,
    Pi,
}

impl AcquisitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AcquisitionKind::Auto => "auto",
            AcquisitionKind::Ei => "ei",
            AcquisitionKind::Lcb => "lcb",
            AcquisitionKind::Pi => "pi",
        }
    }
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acquisition functions for a minimized target. `utility` is larger for
/// more promising points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcquisitionFunction {
    ExpectedImprovement,
    LowerConfidenceBound,
    ProbabilityOfImprovement,
}

impl AcquisitionFunction {
    pub(crate) const ALL: [AcquisitionFunction; 3] = [
        AcquisitionFunction::ExpectedImprovement,
        AcquisitionFunction::LowerConfidenceBound,
        AcquisitionFunction::ProbabilityOfImprovement,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AcquisitionFunction::ExpectedImprovement => "ei",
            AcquisitionFunction::LowerConfidenceBound => "lcb",
            AcquisitionFunction::ProbabilityOfImprovement => "pi",
        }
    }

    pub(crate) fn utility(self, mean: f64, std: f64, best: f64, xi: f64, kappa: f64) -> f64 {
        match self {
            AcquisitionFunction::ExpectedImprovement => {
                if std < 1e-10 {
                    return 0.0;
                }
                let improvement = best - mean - xi;
                let z = improvement / std;
                improvement * normal_cdf(z) + std * normal_pdf(z)
            }
            AcquisitionFunction::LowerConfidenceBound => -(mean - kappa * std),
            AcquisitionFunction::ProbabilityOfImprovement => {
                if std < 1e-10 {
                    return if mean < best - xi { 1.0 } else { 0.0 };
                }
                normal_cdf((best - mean - xi) / std)
            }
        }
    }
}

/// Picks an acquisition function with probability proportional to
/// `exp(eta * gain)`; gains fall by the surrogate's predicted value at each
/// function's last proposal.
#[derive(Debug, Clone)]
pub(crate) struct GpHedge {
    gains: [f64; 3],
    eta: f64,
}

impl GpHedge {
    pub(crate) fn new(eta: f64) -> Self {
        Self {
            gains: [0.0; 3],
            eta,
        }
    }

    pub(crate) fn probabilities(&self) -> [f64; 3] {
        let max = self.gains.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights = self.gains.map(|gain| (self.eta * (gain - max)).exp());
        let total: f64 = weights.iter().sum();
        weights.map(|w| w / total)
    }

    pub(crate) fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let probs = self.probabilities();
        let draw: f64 = rng.gen();
        let mut acc = 0.0;
        for (idx, p) in probs.iter().enumerate() {
            acc += p;
            if draw < acc {
                return idx;
            }
        }
        probs.len() - 1
    }

    pub(crate) fn update(&mut self, predicted: [f64; 3]) {
        for (gain, value) in self.gains.iter_mut().zip(predicted) {
            *gain -= value;
        }
    }
}

pub(crate) fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

pub(crate) fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Abramowitz-Stegun 7.1.26, absolute error below 1.5e-7.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}
