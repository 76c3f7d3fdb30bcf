use std::collections::BTreeMap;

use super::constants::{TREND_TOLERANCE, TREND_WINDOW};
use super::estimator::RatioPoint;

/// Coarse drift tag for an efficiency curve, shown in plot legends for human review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Up => " (up)",
            Self::Down => " (down)",
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Tag a change in mean efficiency. The tolerance bounds are exclusive.
pub fn classify_delta(delta: f64) -> Option<Trend> {
    if delta > TREND_TOLERANCE {
        Some(Trend::Up)
    } else if delta < -TREND_TOLERANCE {
        Some(Trend::Down)
    } else {
        None
    }
}

/// Compare the mean of the first and last few non-zero points of a curve.
///
/// Returns None when the curve has no non-zero points or has not drifted.
pub fn classify(points: &BTreeMap<u32, RatioPoint>) -> Option<Trend> {
    let valid: Vec<f64> = points
        .values()
        .map(|p| p.value)
        .filter(|v| *v > 0.0)
        .collect();
    if valid.is_empty() {
        return None;
    }
    let n = valid.len().min(TREND_WINDOW);
    let delta = mean(&valid[valid.len() - n..]) - mean(&valid[..n]);
    classify_delta(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(values: &[f64]) -> BTreeMap<u32, RatioPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (100000 + i as u32, RatioPoint::symmetric(*v, 0.01)))
            .collect()
    }

    #[test]
    fn test_rising_curve_is_up() {
        let points = curve(&[0.90, 0.90, 0.90, 0.90, 0.90, 0.92, 0.95, 0.95, 0.95, 0.95, 0.95]);
        assert_eq!(classify(&points), Some(Trend::Up));
    }

    #[test]
    fn test_falling_curve_is_down() {
        let points = curve(&[0.95, 0.95, 0.95, 0.95, 0.95, 0.90, 0.90, 0.90, 0.90, 0.90]);
        assert_eq!(classify(&points), Some(Trend::Down));
    }

    #[test]
    fn test_zero_points_are_ignored() {
        // Zeros at the edges would drag the means; only non-zero points count
        let points = curve(&[0.0, 0.0, 0.9, 0.9, 0.9, 0.9, 0.9, 0.9, 0.0]);
        assert_eq!(classify(&points), None);
        assert_eq!(classify(&curve(&[0.0, 0.0])), None);
    }

    #[test]
    fn test_boundary_is_exclusive() {
        assert_eq!(classify_delta(TREND_TOLERANCE), None);
        assert_eq!(classify_delta(-TREND_TOLERANCE), None);
        assert_eq!(classify_delta(0.0100001), Some(Trend::Up));
        assert_eq!(classify_delta(-0.0100001), Some(Trend::Down));
    }

    #[test]
    fn test_suffix() {
        assert_eq!(Trend::Up.suffix(), " (up)");
        assert_eq!(Trend::Down.suffix(), " (down)");
    }
}
