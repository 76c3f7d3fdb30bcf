use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error)]
pub enum HistogramError {
    #[error("Hist2D {0} has shape {1}x{2}; expected at least 3x3 including flow bins")]
    BadShape(String, usize, usize),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not open archive because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Archive failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Archive object {0} is not a 2-D histogram")]
    BadObjectRank(String),
    #[error("Archive held a malformed histogram: {0}")]
    BadHistogram(#[from] HistogramError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid filter chain: {0}")]
    InvalidChain(String),
    #[error("Unrecognized epoch {0}; expected one of 2024, 2025, 2024_25")]
    BadEpoch(String),
}

#[derive(Debug, Clone, Error)]
pub enum SeriesError {
    #[error("Run {0} is already present in series {1}")]
    DuplicateRun(u32, String),
}

#[derive(Debug, Error)]
pub enum AccumulatorError {
    #[error("Accumulator failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Accumulator did not find any archives with run numbers in {0:?}")]
    NoMatchingFiles(PathBuf),
    #[error("Accumulator admitted none of the {0} runs it was given; nothing to write")]
    NoAdmittedRuns(usize),
    #[error("Accumulator failed due to series error: {0}")]
    SeriesError(#[from] SeriesError),
    #[error("Accumulator failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Container failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Container failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Container failed to encode a string attribute: {0}")]
    StringError(#[from] hdf5::types::StringError),
    #[error("Could not open container because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Container series {0} has mismatched dataset lengths")]
    MismatchedLengths(String),
    #[error("Container failed due to series error: {0}")]
    SeriesError(#[from] SeriesError),
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Plotter failed to draw: {0}")]
    DrawingError(#[from] plotters::drawing::DrawingAreaErrorKind<std::io::Error>),
    #[error("Plotter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Plotter was given an empty run range")]
    EmptyRange,
}

#[derive(Debug, Error)]
pub enum WebsiteError {
    #[error("Website generation failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Website root {0:?} does not exist")]
    BadFilePath(PathBuf),
}

#[derive(Debug, Error)]
pub enum FileCopierError {
    #[error("FileCopier failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("FileCopier has no copy source configured")]
    NoSource,
    #[error("FileCopier could not read source directory {0:?}")]
    BadFilePath(PathBuf),
}

#[derive(Debug, Error)]
pub enum UnpackerError {
    #[error("Unpacker failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Unpacker failed to read a ZIP archive: {0}")]
    ZipError(#[from] zip::result::ZipError),
    #[error("Unpacker has no unpack source configured")]
    NoSource,
    #[error("Unpacker could not read source directory {0:?}")]
    BadFilePath(PathBuf),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to FileCopier error: {0}")]
    FileCopier(#[from] FileCopierError),
    #[error("Processor failed due to Unpacker error: {0}")]
    Unpacker(#[from] UnpackerError),
    #[error("Processor failed due to Accumulator error: {0}")]
    AccumulatorError(#[from] AccumulatorError),
    #[error("Processor failed due to Container error: {0}")]
    ContainerError(#[from] ContainerError),
    #[error("Processor failed due to Plot error: {0}")]
    PlotError(#[from] PlotError),
    #[error("Processor failed due to Website error: {0}")]
    WebsiteError(#[from] WebsiteError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
