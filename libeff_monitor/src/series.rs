use fxhash::FxHashMap;
use std::collections::BTreeMap;

use super::constants::RUN_RANGE_GRANULARITY;
use super::error::SeriesError;

/// The [floor, ceiling) window of runs covered by a batch, padded to whole thousands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRange {
    pub floor: u32,
    pub ceiling: u32,
}

impl RunRange {
    /// Smallest padded window holding every run given. None if there are no runs.
    pub fn from_runs<I: IntoIterator<Item = u32>>(runs: I) -> Option<Self> {
        let mut min_max: Option<(u32, u32)> = None;
        for run in runs {
            min_max = match min_max {
                Some((lo, hi)) => Some((lo.min(run), hi.max(run))),
                None => Some((run, run)),
            };
        }
        min_max.map(|(lo, hi)| Self {
            floor: (lo / RUN_RANGE_GRANULARITY) * RUN_RANGE_GRANULARITY,
            ceiling: (hi / RUN_RANGE_GRANULARITY + 1) * RUN_RANGE_GRANULARITY,
        })
    }

    pub fn contains(&self, run: u32) -> bool {
        run >= self.floor && run < self.ceiling
    }

    /// Number of single-run bins in the window
    pub fn width(&self) -> u32 {
        self.ceiling - self.floor
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeriesPoint {
    pub value: f64,
    pub error: f64,
}

impl SeriesPoint {
    /// A raw count, carrying sqrt(N) as its uncertainty
    pub fn from_count(count: u64) -> Self {
        let value = count as f64;
        Self {
            value,
            error: value.sqrt(),
        }
    }
}

/// Run-indexed values for one (region, counter) pair. Runs are only ever added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    name: String,
    points: BTreeMap<u32, SeriesPoint>,
}

impl Series {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            points: BTreeMap::new(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Insert a point for a run which is not yet part of the series
    pub fn insert(&mut self, run_number: u32, point: SeriesPoint) -> Result<(), SeriesError> {
        if self.points.contains_key(&run_number) {
            return Err(SeriesError::DuplicateRun(run_number, self.name.clone()));
        }
        self.points.insert(run_number, point);
        Ok(())
    }

    pub fn insert_count(&mut self, run_number: u32, count: u64) -> Result<(), SeriesError> {
        self.insert(run_number, SeriesPoint::from_count(count))
    }

    pub fn get(&self, run_number: u32) -> Option<&SeriesPoint> {
        self.points.get(&run_number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &SeriesPoint)> {
        self.points.iter().map(|(run, point)| (*run, point))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Name of the series for a region and counter, shared by the writer and every reader
pub fn series_name(region: &str, counter: &str) -> String {
    format!("{region}_{counter}")
}

/// Every series produced by one batch, with the run window they span
#[derive(Debug, Clone)]
pub struct SeriesSet {
    range: RunRange,
    runs: Vec<u32>,
    series: FxHashMap<String, Series>,
}

impl SeriesSet {
    pub fn new(range: RunRange, runs: Vec<u32>) -> Self {
        Self {
            range,
            runs,
            series: FxHashMap::default(),
        }
    }

    pub fn get_range(&self) -> &RunRange {
        &self.range
    }

    /// The admitted runs, ascending
    pub fn get_runs(&self) -> &[u32] {
        &self.runs
    }

    pub fn insert(&mut self, series: Series) {
        self.series.insert(series.get_name().to_string(), series);
    }

    pub fn get(&self, region: &str, counter: &str) -> Option<&Series> {
        self.series.get(&series_name(region, counter))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
