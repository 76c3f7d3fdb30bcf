// Run ranges are padded out to whole thousands
pub const RUN_RANGE_GRANULARITY: u32 = 1000;

/// Minimum first-counter barrel count for a run to be admitted
pub const DEFAULT_ADMISSION_THRESHOLD: u64 = 20_000;
pub const DEFAULT_ADMISSION_REGION: &str = "EB";

// Selection windows along the y-axis (inclusive, 1-based bins)
pub const TAG_FIRST_BIN: usize = 25;
pub const FAKES_FIRST_BIN: usize = 55;
pub const SELECTION_LAST_BIN: usize = 60;

/// Number of valid points averaged at each end of a curve for the trend tag
pub const TREND_WINDOW: usize = 5;
pub const TREND_TOLERANCE: f64 = 0.01;

/// One-sigma coverage used by the Bayesian interval
pub const CONFIDENCE_LEVEL: f64 = 0.682689492137;

pub const DEFAULT_FOLDER_TEMPLATE: &str = "DQMData/Run {run}/HLT/Run summary/EGM/TrigObjTnP";
pub const DEFAULT_OBJECT_PREFIX: &str = "stdTag_";
pub const DEFAULT_OBJECT_SUFFIX: &str = "_eta";
pub const DEFAULT_FILE_PREFIX: &str = "DQM";
pub const DEFAULT_COPY_PREFIX: &str = "DQM_V0001_HLTpb_";
pub const DEFAULT_FILE_EXTENSION: &str = "h5";
pub const DEFAULT_UNPACK_MIN_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_UNPACK_MIN_RUN: u32 = 392_000;
pub const ZIP_EXTENSION: &str = "zip";

pub const CONTAINER_FILE_NAME: &str = "counts_vs_run.h5";
pub const SINGLE_PLOT_DIR: &str = "single";
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "svg"];
