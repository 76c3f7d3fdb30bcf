use statrs::function::gamma::ln_gamma;

use super::config::Uncertainty;
use super::constants::CONFIDENCE_LEVEL;
use super::series::SeriesPoint;

/// A ratio with (possibly asymmetric) uncertainties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioPoint {
    pub value: f64,
    pub err_low: f64,
    pub err_high: f64,
}

impl RatioPoint {
    pub fn symmetric(value: f64, error: f64) -> Self {
        Self {
            value,
            err_low: error,
            err_high: error,
        }
    }

    pub fn low(&self) -> f64 {
        self.value - self.err_low
    }

    pub fn high(&self) -> f64 {
        self.value + self.err_high
    }
}

/// Strategy for turning a numerator/denominator pair into a ratio with uncertainty.
///
/// One estimator is used for every bin of a derivation pass.
pub trait RatioEstimator {
    fn name(&self) -> &'static str;

    /// Estimate numerator / denominator. Returns None where the ratio is undefined,
    /// which always includes a zero denominator.
    fn estimate(&self, numerator: &SeriesPoint, denominator: &SeriesPoint)
        -> Option<RatioPoint>;
}

/// Build the estimator selected in the config
pub fn make_estimator(kind: Uncertainty) -> Box<dyn RatioEstimator> {
    match kind {
        Uncertainty::Propagation => Box::new(PoissonPropagation),
        Uncertainty::Bayesian => Box::new(BayesianBinomial::default()),
    }
}

/// Plain division with first-order error propagation of the per-point errors
/// (sqrt(N) for raw counts). The two inputs are treated as uncorrelated.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonPropagation;

impl RatioEstimator for PoissonPropagation {
    fn name(&self) -> &'static str {
        "propagation"
    }

    fn estimate(
        &self,
        numerator: &SeriesPoint,
        denominator: &SeriesPoint,
    ) -> Option<RatioPoint> {
        let d = denominator.value;
        if d == 0.0 {
            return None;
        }
        let n = numerator.value;
        let d2 = d * d;
        let variance = (numerator.error.powi(2) * d2 + denominator.error.powi(2) * n * n)
            / (d2 * d2);
        Some(RatioPoint::symmetric(n / d, variance.sqrt()))
    }
}

// Lentz's method needs of order sqrt(max(a, b)) terms near the posterior mean
const CF_MAX_ITERATIONS: usize = 100_000;
const CF_EPSILON: f64 = f64::EPSILON;
const CF_FPMIN: f64 = f64::MIN_POSITIVE / f64::EPSILON;
const QUANTILE_MAX_STEPS: usize = 200;

fn clamp_away_from_zero(v: f64) -> f64 {
    if v.abs() < CF_FPMIN {
        CF_FPMIN
    } else {
        v
    }
}

/// Continued fraction of the incomplete beta function, evaluated until it converges
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / clamp_away_from_zero(1.0 - qab * x / qap);
    let mut h = d;
    for m in 1..=CF_MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / clamp_away_from_zero(1.0 + aa * d);
        c = clamp_away_from_zero(1.0 + aa / c);
        h *= d * c;
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / clamp_away_from_zero(1.0 + aa * d);
        c = clamp_away_from_zero(1.0 + aa / c);
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() <= CF_EPSILON {
            break;
        }
    }
    h
}

/// Regularized incomplete beta I_x(a, b), the CDF of Beta(a, b).
///
/// statrs' `beta_reg` stops after a fixed number of terms, which is too few once the
/// shape parameters reach the 1e5 range.
pub fn beta_cdf(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (-x).ln_1p();
    if x < (a + 1.0) / (a + b + 2.0) {
        ln_front.exp() * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - ln_front.exp() * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Quantile of Beta(a, b), bisected down to the resolution of f64
pub fn beta_quantile(a: f64, b: f64, p: f64) -> f64 {
    let mut low = 0.0;
    let mut high = 1.0;
    for _ in 0..QUANTILE_MAX_STEPS {
        let mid = 0.5 * (low + high);
        if mid <= low || mid >= high {
            break;
        }
        if beta_cdf(a, b, mid) < p {
            low = mid;
        } else {
            high = mid;
        }
    }
    0.5 * (low + high)
}

/// Bayesian efficiency with a uniform prior.
///
/// Uses the mode of the Beta(k+1, n-k+1) posterior as the estimate and the central
/// interval at the configured level as the uncertainty. At k = 0 or k = n the central
/// interval would exclude the mode, so the one-sided interval is used instead.
/// Passing counts above the total are undefined here.
#[derive(Debug, Clone, Copy)]
pub struct BayesianBinomial {
    confidence_level: f64,
}

impl Default for BayesianBinomial {
    fn default() -> Self {
        Self::new(CONFIDENCE_LEVEL)
    }
}

impl BayesianBinomial {
    pub fn new(confidence_level: f64) -> Self {
        Self { confidence_level }
    }
}

impl RatioEstimator for BayesianBinomial {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn estimate(
        &self,
        numerator: &SeriesPoint,
        denominator: &SeriesPoint,
    ) -> Option<RatioPoint> {
        let total = denominator.value.trunc();
        let passed = numerator.value.trunc();
        if total <= 0.0 || passed < 0.0 || passed > total {
            return None;
        }
        let a = passed + 1.0;
        let b = total - passed + 1.0;
        let mode = passed / total;
        let level = self.confidence_level;
        let (low, high) = if passed == 0.0 {
            (0.0, beta_quantile(a, b, level))
        } else if passed == total {
            (beta_quantile(a, b, 1.0 - level), 1.0)
        } else {
            (
                beta_quantile(a, b, 0.5 * (1.0 - level)),
                beta_quantile(a, b, 0.5 * (1.0 + level)),
            )
        };
        Some(RatioPoint {
            value: mode,
            err_low: (mode - low).max(0.0),
            err_high: (high - mode).max(0.0),
        })
    }
}
