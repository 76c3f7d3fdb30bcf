use fxhash::FxHashSet;
use std::path::Path;

use super::archive::{discover_archives, ArchiveSource, RunFile};
use super::chain::FilterChain;
use super::config::Config;
use super::error::{AccumulatorError, ArchiveError};
use super::histogram::BinRange;
use super::series::{series_name, RunRange, Series, SeriesSet};

/// Filter counts read from a single run, indexed [region][counter] in chain order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCounts {
    pub run_number: u32,
    pub counts: Vec<Vec<u64>>,
}

impl RunCounts {
    pub fn get(&self, region_idx: usize, counter_idx: usize) -> u64 {
        self.counts[region_idx][counter_idx]
    }
}

/// Outcome of offering a run to the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Carries the admission count that failed the threshold
    Rejected(u64),
}

/// Accumulator reads per-run archives and deposits their counts into run-indexed series.
///
/// Runs are offered one at a time with `add_run`; once every file has been offered, `finish`
/// hands back the completed SeriesSet. A run is only kept if the first counter in the
/// admission region clears the threshold.
pub struct Accumulator<'a, S: ArchiveSource> {
    config: &'a Config,
    source: S,
    admission_region: usize,
    selection: BinRange,
    accepted: Vec<RunCounts>,
    accepted_runs: FxHashSet<u32>,
    n_offered: usize,
}

impl<'a, S: ArchiveSource> Accumulator<'a, S> {
    /// Create a new Accumulator.
    ///
    /// Requires a validated config; the admission region must be part of the chain.
    pub fn new(config: &'a Config, source: S) -> Result<Self, AccumulatorError> {
        config.validate()?;
        let admission_region = config
            .chain
            .region_index(&config.admission.region)
            .unwrap_or_default();
        Ok(Self {
            config,
            source,
            admission_region,
            selection: config.selection.window(),
            accepted: Vec::new(),
            accepted_runs: FxHashSet::default(),
            n_offered: 0,
        })
    }

    /// List the archives of the configured epoch, sorted by run
    pub fn discover(&self) -> Result<Vec<RunFile>, AccumulatorError> {
        let archive_dir = self.config.get_archive_directory();
        self.discover_in(&archive_dir)
    }

    pub fn discover_in(&self, archive_dir: &Path) -> Result<Vec<RunFile>, AccumulatorError> {
        let files = discover_archives(
            archive_dir,
            &self.config.file_prefix,
            &self.config.file_extension,
        )?;
        if files.is_empty() {
            return Err(AccumulatorError::NoMatchingFiles(archive_dir.to_path_buf()));
        }
        Ok(files)
    }

    /// Read every counter of every region from one archive.
    ///
    /// A counter whose histogram is missing from the archive counts zero everywhere.
    pub fn read_run(&self, file: &RunFile) -> Result<RunCounts, ArchiveError> {
        let chain: &FilterChain = &self.config.chain;
        let archive = self.source.open(&file.path)?;
        let mut counts = vec![vec![0u64; chain.n_counters()]; chain.regions.len()];
        for (counter_idx, counter) in chain.counters.iter().enumerate() {
            let object_path = self.config.get_object_path(file.run_number, counter);
            let hist = match archive.get(&object_path)? {
                Some(h) => h,
                None => {
                    log::debug!("Run {}: {} not found", file.run_number, object_path);
                    continue;
                }
            };
            for (region_idx, region) in chain.regions.iter().enumerate() {
                // Each range is truncated on its own before summing
                counts[region_idx][counter_idx] = region
                    .eta_bins
                    .iter()
                    .map(|eta| hist.integral(*eta, self.selection) as u64)
                    .sum();
            }
        }
        Ok(RunCounts {
            run_number: file.run_number,
            counts,
        })
    }

    /// Apply the admission policy to a set of counts
    pub fn admit(&self, counts: &RunCounts) -> Admission {
        let count = counts.get(self.admission_region, 0);
        if count > self.config.admission.threshold {
            Admission::Accepted
        } else {
            Admission::Rejected(count)
        }
    }

    /// Offer a run to the accumulator.
    ///
    /// Returns Err if the archive could not be read; the run is then left out, same as a
    /// rejected run, and the caller may carry on with the next file.
    pub fn add_run(&mut self, file: &RunFile) -> Result<Admission, ArchiveError> {
        self.n_offered += 1;
        let counts = self.read_run(file)?;
        let admission = self.admit(&counts);
        if admission == Admission::Accepted {
            self.add_counts(counts);
        }
        Ok(admission)
    }

    /// Deposit counts that have already passed admission
    fn add_counts(&mut self, counts: RunCounts) {
        if !self.accepted_runs.insert(counts.run_number) {
            log::warn!(
                "Run {} was offered twice; keeping the first",
                counts.run_number
            );
            return;
        }
        self.accepted.push(counts);
    }

    pub fn n_accepted(&self) -> usize {
        self.accepted.len()
    }

    pub fn n_offered(&self) -> usize {
        self.n_offered
    }

    /// Build one series per (region, counter) from the admitted runs, consuming the accumulator
    pub fn finish(mut self) -> Result<SeriesSet, AccumulatorError> {
        let range = match RunRange::from_runs(self.accepted.iter().map(|c| c.run_number)) {
            Some(r) => r,
            None => return Err(AccumulatorError::NoAdmittedRuns(self.n_offered)),
        };
        self.accepted.sort_by_key(|c| c.run_number);
        let runs: Vec<u32> = self.accepted.iter().map(|c| c.run_number).collect();

        let chain = &self.config.chain;
        let mut set = SeriesSet::new(range, runs);
        for (region_idx, region) in chain.regions.iter().enumerate() {
            for (counter_idx, counter) in chain.counters.iter().enumerate() {
                let mut series = Series::new(&series_name(&region.name, counter));
                for counts in self.accepted.iter() {
                    series.insert_count(counts.run_number, counts.get(region_idx, counter_idx))?;
                }
                set.insert(series);
            }
        }
        Ok(set)
    }
}
