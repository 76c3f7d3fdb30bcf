use hdf5::types::VarLenUnicode;
use hdf5::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::chain::FilterChain;
use super::error::ContainerError;
use super::series::{series_name, RunRange, Series, SeriesPoint, SeriesSet};

const RUNS_NAME: &str = "runs";
const VALUES_NAME: &str = "values";
const ERRORS_NAME: &str = "errors";

/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

// Structure
// counts_vs_run.h5 - min_run, max_run, n_runs, epoch, version
// |---- <region>_<counter>
// |    |---- runs(dset)
// |    |---- values(dset)
// |    |---- errors(dset)

/// A simple struct which wraps around the hdf5-rust library.
///
/// Writes one group per series so that readers can look a series up by
/// rebuilding its `<region>_<counter>` name.
#[derive(Debug)]
pub struct ContainerWriter {
    file_handle: File,
    path: PathBuf,
    n_series: usize,
}

impl ContainerWriter {
    /// Create the writer, truncating any container already at path
    pub fn new(path: &Path) -> Result<Self, ContainerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file_handle = File::create(path)?;
        Ok(Self {
            file_handle,
            path: path.to_path_buf(),
            n_series: 0,
        })
    }

    /// Write a single series as parallel run/value/error datasets
    pub fn write_series(&mut self, series: &Series) -> Result<(), ContainerError> {
        let mut runs: Vec<u32> = Vec::with_capacity(series.len());
        let mut values: Vec<f64> = Vec::with_capacity(series.len());
        let mut errors: Vec<f64> = Vec::with_capacity(series.len());
        for (run, point) in series.iter() {
            runs.push(run);
            values.push(point.value);
            errors.push(point.error);
        }

        let group = self.file_handle.create_group(series.get_name())?;
        group
            .new_dataset_builder()
            .with_data(runs.as_slice())
            .create(RUNS_NAME)?;
        group
            .new_dataset_builder()
            .with_data(values.as_slice())
            .create(VALUES_NAME)?;
        group
            .new_dataset_builder()
            .with_data(errors.as_slice())
            .create(ERRORS_NAME)?;
        self.n_series += 1;
        Ok(())
    }

    /// Write every series of the set in chain order
    pub fn write_set(&mut self, set: &SeriesSet, chain: &FilterChain) -> Result<(), ContainerError> {
        for region in chain.regions.iter() {
            for counter in chain.counters.iter() {
                if let Some(series) = set.get(&region.name, counter) {
                    self.write_series(series)?;
                }
            }
        }
        Ok(())
    }

    /// Write the run-range meta information, consume the writer
    pub fn close(self, set: &SeriesSet, epoch: &str) -> Result<(), ContainerError> {
        let range = set.get_range();
        self.file_handle
            .new_attr::<u32>()
            .create("min_run")?
            .write_scalar(&range.floor)?;
        self.file_handle
            .new_attr::<u32>()
            .create("max_run")?
            .write_scalar(&range.ceiling)?;
        self.file_handle
            .new_attr::<u64>()
            .create("n_runs")?
            .write_scalar(&(set.get_runs().len() as u64))?;

        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);
        self.file_handle
            .new_attr::<VarLenUnicode>()
            .create("version")?
            .write_scalar(&VarLenUnicode::from_str(&version)?)?;
        self.file_handle
            .new_attr::<VarLenUnicode>()
            .create("epoch")?
            .write_scalar(&VarLenUnicode::from_str(epoch)?)?;

        log::info!(
            "{} series over runs [{}, {}) written to {}",
            self.n_series,
            range.floor,
            range.ceiling,
            self.path.to_string_lossy()
        );
        Ok(())
    }
}

/// Reads a container back into a SeriesSet
#[derive(Debug)]
pub struct ContainerReader {
    file_handle: File,
}

impl ContainerReader {
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        if !path.exists() {
            return Err(ContainerError::BadFilePath(path.to_path_buf()));
        }
        Ok(Self {
            file_handle: File::open(path)?,
        })
    }

    pub fn read_range(&self) -> Result<RunRange, ContainerError> {
        Ok(RunRange {
            floor: self.file_handle.attr("min_run")?.read_scalar::<u32>()?,
            ceiling: self.file_handle.attr("max_run")?.read_scalar::<u32>()?,
        })
    }

    /// Read one series by name. Returns None if the container has no such series.
    pub fn read_series(&self, name: &str) -> Result<Option<Series>, ContainerError> {
        if !self.file_handle.link_exists(name) {
            return Ok(None);
        }
        let group = self.file_handle.group(name)?;
        let runs = group.dataset(RUNS_NAME)?.read_raw::<u32>()?;
        let values = group.dataset(VALUES_NAME)?.read_raw::<f64>()?;
        let errors = group.dataset(ERRORS_NAME)?.read_raw::<f64>()?;
        if runs.len() != values.len() || runs.len() != errors.len() {
            return Err(ContainerError::MismatchedLengths(name.to_string()));
        }
        let mut series = Series::new(name);
        for ((run, value), error) in runs.into_iter().zip(values).zip(errors) {
            series.insert(run, SeriesPoint { value, error })?;
        }
        Ok(Some(series))
    }

    /// Read every series the chain names. Series missing from the container are skipped.
    pub fn read_set(&self, chain: &FilterChain) -> Result<SeriesSet, ContainerError> {
        let range = self.read_range()?;
        let mut found: Vec<Series> = Vec::new();
        for region in chain.regions.iter() {
            for counter in chain.counters.iter() {
                let name = series_name(&region.name, counter);
                match self.read_series(&name)? {
                    Some(series) => found.push(series),
                    None => log::warn!("Container has no series {name}"),
                }
            }
        }
        let mut runs: Vec<u32> = found
            .iter()
            .flat_map(|s| s.iter().map(|(run, _)| run))
            .collect();
        runs.sort_unstable();
        runs.dedup();

        let mut set = SeriesSet::new(range, runs);
        for series in found {
            set.insert(series);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_round_trip_and_missing_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2025").join("counts_vs_run.h5");

        let mut chain = FilterChain::default();
        chain.counters.truncate(2);
        let runs = vec![100001, 100002];
        let mut set = SeriesSet::new(RunRange::from_runs(runs.clone()).unwrap(), runs);
        let mut first = Series::new(&series_name("EB", &chain.counters[0]));
        first.insert_count(100001, 50000).unwrap();
        first.insert_count(100002, 60000).unwrap();
        set.insert(first);

        let mut writer = ContainerWriter::new(&path).unwrap();
        writer.write_set(&set, &chain).unwrap();
        writer.close(&set, "2025").unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        let read = reader.read_set(&chain).unwrap();
        assert_eq!(read.get_range(), set.get_range());
        assert_eq!(read.get_runs(), &[100001, 100002]);
        let series = read.get("EB", &chain.counters[0]).unwrap();
        assert_eq!(series.get(100002).unwrap().value, 60000.0);
        assert_eq!(series.get(100001).unwrap().error, 50000f64.sqrt());
        assert!(read.get("EB", &chain.counters[1]).is_none());
    }

    #[test]
    fn test_reader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ContainerReader::open(&dir.path().join("none.h5")),
            Err(ContainerError::BadFilePath(_))
        ));
    }
}
