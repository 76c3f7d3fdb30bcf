use std::collections::BTreeMap;

use super::chain::FilterChain;
use super::estimator::{RatioEstimator, RatioPoint};
use super::series::{Series, SeriesPoint, SeriesSet};
use super::trend::{classify, Trend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Counter i over counter i-1
    Step(usize),
    /// Last counter over first counter
    Total,
}

/// Run-indexed efficiency of one counter relative to another
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyCurve {
    pub label: String,
    pub kind: CurveKind,
    pub points: BTreeMap<u32, RatioPoint>,
    pub trend: Option<Trend>,
}

impl EfficiencyCurve {
    /// Label with the trend tag appended, as shown in legends
    pub fn display_label(&self) -> String {
        match self.trend {
            Some(trend) => format!("{}{}", self.label, trend.suffix()),
            None => self.label.clone(),
        }
    }

    pub fn get(&self, run_number: u32) -> Option<&RatioPoint> {
        self.points.get(&run_number)
    }

    /// Smallest non-zero value, if any
    pub fn min_positive(&self) -> Option<f64> {
        self.points
            .values()
            .map(|p| p.value)
            .filter(|v| *v > 0.0)
            .reduce(f64::min)
    }
}

/// Divide two series bin by bin.
///
/// Only runs present in the denominator with a non-zero value produce a point; a run
/// missing from the numerator counts as zero there.
pub fn divide(
    numerator: &Series,
    denominator: &Series,
    estimator: &dyn RatioEstimator,
) -> BTreeMap<u32, RatioPoint> {
    let zero = SeriesPoint::default();
    denominator
        .iter()
        .filter(|(_, den)| den.value != 0.0)
        .filter_map(|(run, den)| {
            let num = numerator.get(run).unwrap_or(&zero);
            estimator.estimate(num, den).map(|ratio| (run, ratio))
        })
        .collect()
}

/// EfficiencyDeriver forms the step and total efficiency curves of each region.
///
/// A single estimator is used for every curve it derives.
pub struct EfficiencyDeriver<'a> {
    chain: &'a FilterChain,
    estimator: &'a dyn RatioEstimator,
}

impl<'a> EfficiencyDeriver<'a> {
    pub fn new(chain: &'a FilterChain, estimator: &'a dyn RatioEstimator) -> Self {
        Self { chain, estimator }
    }

    /// Derive the curves of one region, in chain order with the total last.
    ///
    /// A pair with either series missing is left out rather than failing the region.
    pub fn derive_region(&self, region: &str, series: &SeriesSet) -> Vec<EfficiencyCurve> {
        let counters = &self.chain.counters;
        let mut curves: Vec<EfficiencyCurve> = Vec::with_capacity(counters.len());
        for idx in 1..counters.len() {
            let (num, den) = match (
                series.get(region, &counters[idx]),
                series.get(region, &counters[idx - 1]),
            ) {
                (Some(n), Some(d)) => (n, d),
                _ => {
                    log::debug!(
                        "{region}: missing series for {} / {}, skipping step",
                        counters[idx],
                        counters[idx - 1]
                    );
                    continue;
                }
            };
            let points = divide(num, den, self.estimator);
            let trend = classify(&points);
            curves.push(EfficiencyCurve {
                label: self.chain.short_label(&counters[idx]),
                kind: CurveKind::Step(idx),
                points,
                trend,
            });
        }

        if let (Some(first), Some(last)) = (counters.first(), counters.last()) {
            match (series.get(region, last), series.get(region, first)) {
                (Some(num), Some(den)) => curves.push(EfficiencyCurve {
                    label: String::from("Total"),
                    kind: CurveKind::Total,
                    points: divide(num, den, self.estimator),
                    trend: None,
                }),
                _ => log::debug!("{region}: missing series for the total efficiency"),
            }
        }
        curves
    }
}
