//! # eff_monitor
//!
//! eff_monitor tracks the step-by-step efficiency of the electron/photon HLT filter chain
//! as a function of run number. It reads per-run DQM archives holding tag-and-probe
//! histograms (η bin × selection bin), integrates the counts of every filter in every
//! detector region, and turns them into run-indexed efficiency curves that are drawn and
//! published to a static website for human review.
//!
//! ## Installation
//!
//! The only method of install is from source. eff_monitor is a cargo workspace with two
//! members: `libeff_monitor`, the library documented here, and `eff_monitor_cli`, the
//! command line front-end.
//!
//! ### HDF5
//!
//! Both the run archives and the output container are HDF5 files, so HDF5 must be
//! installed before building. Typically a package manager install (homebrew, apt, etc)
//! is auto detected. For a custom location, write the following snippet into
//! `.cargo/config.toml` at the top of the repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! Use `cargo install --path ./eff_monitor_cli` from the top level of the repository.
//!
//! ## Pipeline
//!
//! 1. Unpack and copy: new archives are extracted from the DQM GUI ZIP backups and copied
//!    from the shared store into `archive_path/<epoch>`. Both steps are optional.
//! 2. Compute: every archive is read; a run is admitted only if the first filter of the
//!    barrel region counted more than the admission threshold. Admitted counts are written
//!    to a container as one series per (region, filter).
//! 3. Plot: for each region the step efficiencies (filter i over filter i-1) and the total
//!    efficiency (last over first) are derived, tagged with a coarse trend, and drawn.
//! 4. Publish: every directory of the web tree gets an index page.
//!
//! ## Configuration
//!
//! The configuration is a YAML file. `eff_monitor_cli -p config.yml new` writes a
//! template:
//!
//! ```yml
//! epoch: '2025'
//! archive_path: None
//! output_path: None
//! web_path: None
//! web_url: ''
//! site_title: EGMDQM
//! copy_source: null
//! copy_prefix: DQM_V0001_HLTpb_
//! copy_min_run: null
//! unpack_source: null
//! unpack_min_size: 10485760
//! unpack_min_run: 392000
//! file_prefix: DQM
//! file_extension: h5
//! folder_template: DQMData/Run {run}/HLT/Run summary/EGM/TrigObjTnP
//! object_prefix: stdTag_
//! object_suffix: _eta
//! selection: tag
//! uncertainty: propagation
//! admission:
//!   region: EB
//!   threshold: 20000
//! chain:
//!   counters:
//!   - hltEG32L1SingleEGOrEtFilter
//!   - hltEle32WPTightClusterShapeFilter
//!   - ...
//!   regions:
//!   - name: EB
//!     eta_bins:
//!     - first: 2
//!       last: 3
//!   - ...
//!   label_rules:
//!   - pattern: hltEG32L1SingleEGOrEtFilter
//!     replacement: L1
//!   - ...
//! ```
//!
//! - `epoch` is one of `2024`, `2025` or `2024_25` and selects the sub-directory used for
//! archives, the container and the plots.
//! - `copy_source` is optional; when null, the copy stage is skipped.
//! - `unpack_source` is an optional directory of ZIP backups; when null, the unpack stage is
//! skipped. Only entries larger than `unpack_min_size` bytes with a run number of at least
//! `unpack_min_run` are extracted, flattened into the archive directory.
//! - `selection` is `tag` (y bins 25 to 60) or `fakes` (y bins 55 to 60).
//! - `uncertainty` is `propagation` (independent Poisson errors) or `bayesian` (a
//! Beta-posterior central interval).
//! - Region η ranges and selection ranges are 1-based and inclusive.
//!
//! ## Output
//!
//! The compute stage writes an HDF5 container:
//!
//! ```text
//! <output_path>/<epoch>/counts_vs_run.h5 - min_run, max_run, n_runs, epoch, version
//! |---- <region>_<counter>
//! |    |---- runs(dset)
//! |    |---- values(dset)
//! |    |---- errors(dset)
//! ```
//!
//! The plot stage writes SVG files:
//!
//! ```text
//! <web_path>/<epoch>/<region>/step_efficiency_<region>.svg
//! <web_path>/<epoch>/<region>/single/<region>_<label>.svg
//! ```
//!
//! Curves that drifted by more than 0.01 between the first and last five runs get an
//! `(up)` or `(down)` tag in the legend.
pub mod accumulator;
pub mod archive;
pub mod chain;
pub mod config;
pub mod constants;
pub mod container;
pub mod efficiency;
pub mod error;
pub mod estimator;
pub mod file_copier;
pub mod histogram;
pub mod plot;
pub mod process;
pub mod series;
pub mod trend;
pub mod unpacker;
pub mod website;
pub mod worker_status;
