use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::error::ArchiveError;
use super::histogram::Hist2D;

// DQM file names carry the run as R followed by a zero-padded number, e.g. R000392123
const RUN_PATTERN: &str = r"R0*([0-9]{6})";

fn run_regex() -> &'static Regex {
    static RUN_REGEX: OnceLock<Regex> = OnceLock::new();
    RUN_REGEX.get_or_init(|| Regex::new(RUN_PATTERN).expect("run number pattern is valid"))
}

/// Extract the run number from an archive file name
pub fn parse_run_number(file_name: &str) -> Option<u32> {
    run_regex()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// An archive file on disk and the run it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFile {
    pub run_number: u32,
    pub path: PathBuf,
}

/// Find all archives in a directory matching the prefix and extension.
///
/// Files whose names carry no run number are skipped with a warning. The result is sorted
/// by run number; when two files claim the same run, only the first (by path) is kept.
pub fn discover_archives(
    parent_path: &Path,
    prefix: &str,
    extension: &str,
) -> Result<Vec<RunFile>, std::io::Error> {
    let mut files: Vec<RunFile> = Vec::new();
    for item in parent_path.read_dir()? {
        let item_path = item?.path();
        if !item_path.is_file() {
            continue;
        }
        let file_name = match item_path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let matches_ext = item_path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy() == extension);
        if !file_name.starts_with(prefix) || !matches_ext {
            continue;
        }
        match parse_run_number(&file_name) {
            Some(run_number) => files.push(RunFile {
                run_number,
                path: item_path,
            }),
            None => log::warn!("Could not find a run number in {file_name}, skipping..."),
        }
    }

    files.sort_by(|a, b| (a.run_number, &a.path).cmp(&(b.run_number, &b.path)));
    let mut unique: Vec<RunFile> = Vec::with_capacity(files.len());
    for file in files {
        if let Some(prev) = unique.last() {
            if prev.run_number == file.run_number {
                log::warn!(
                    "Run {} already provided by {}, ignoring {}",
                    file.run_number,
                    prev.path.to_string_lossy(),
                    file.path.to_string_lossy()
                );
                continue;
            }
        }
        unique.push(file);
    }
    Ok(unique)
}

/// An opened per-run archive from which named histograms can be fetched
pub trait RunArchive {
    /// Fetch the 2-D histogram at a path within the archive.
    ///
    /// Returns None if no object lives at the path.
    fn get(&self, object_path: &str) -> Result<Option<Hist2D>, ArchiveError>;
}

/// Something which can open per-run archives
pub trait ArchiveSource {
    fn open(&self, path: &Path) -> Result<Box<dyn RunArchive>, ArchiveError>;
}

/// Archives stored as HDF5 files. Each histogram is a 2-D dataset holding the bin
/// contents with flow bins included.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Source;

impl ArchiveSource for Hdf5Source {
    fn open(&self, path: &Path) -> Result<Box<dyn RunArchive>, ArchiveError> {
        if !path.exists() {
            return Err(ArchiveError::BadFilePath(path.to_path_buf()));
        }
        Ok(Box::new(Hdf5Archive {
            file_handle: hdf5::File::open(path)?,
        }))
    }
}

#[derive(Debug)]
pub struct Hdf5Archive {
    file_handle: hdf5::File,
}

impl RunArchive for Hdf5Archive {
    fn get(&self, object_path: &str) -> Result<Option<Hist2D>, ArchiveError> {
        if !self.file_handle.link_exists(object_path) {
            return Ok(None);
        }
        let dataset = self.file_handle.dataset(object_path)?;
        if dataset.ndim() != 2 {
            return Err(ArchiveError::BadObjectRank(object_path.to_string()));
        }
        let bins = dataset.read_2d::<f64>()?;
        Ok(Some(Hist2D::new(object_path, bins)?))
    }
}

/// In-memory archives for exercising the accumulator without HDF5 files
#[cfg(test)]
pub(crate) mod memory {
    use fxhash::FxHashMap;
    use std::path::{Path, PathBuf};

    use super::{ArchiveSource, RunArchive};
    use crate::error::ArchiveError;
    use crate::histogram::Hist2D;

    #[derive(Debug, Clone, Default)]
    pub struct MemoryArchive {
        pub objects: FxHashMap<String, Hist2D>,
    }

    impl RunArchive for MemoryArchive {
        fn get(&self, object_path: &str) -> Result<Option<Hist2D>, ArchiveError> {
            Ok(self.objects.get(object_path).cloned())
        }
    }

    /// Paths without an archive behave like unreadable files
    #[derive(Debug, Clone, Default)]
    pub struct MemorySource {
        pub archives: FxHashMap<PathBuf, MemoryArchive>,
    }

    impl ArchiveSource for MemorySource {
        fn open(&self, path: &Path) -> Result<Box<dyn RunArchive>, ArchiveError> {
            match self.archives.get(path) {
                Some(archive) => Ok(Box::new(archive.clone())),
                None => Err(ArchiveError::BadFilePath(path.to_path_buf())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_parse_run_number() {
        assert_eq!(
            parse_run_number("DQM_V0001_HLTpb_R000392123.h5"),
            Some(392123)
        );
        assert_eq!(parse_run_number("DQM_V0001_R000100001__HLTpb.h5"), Some(100001));
        assert_eq!(parse_run_number("DQM_V0001_HLTpb.h5"), None);
        assert_eq!(parse_run_number("DQM_V0001_HLTpb_R123.h5"), None);
    }

    #[test]
    fn test_discover_sorts_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "DQM_V0001_HLTpb_R000392200.h5",
            "DQM_V0001_HLTpb_R000392100.h5",
            "DQM_V0001_HLTpb_norun.h5",
            "DQM_V0001_HLTpb_R000392150.root",
            "other_R000392300.h5",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = discover_archives(dir.path(), "DQM", "h5").unwrap();
        let runs: Vec<u32> = files.iter().map(|f| f.run_number).collect();
        assert_eq!(runs, vec![392100, 392200]);
    }

    #[test]
    fn test_discover_keeps_first_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("DQM_a_R000100001.h5"), b"").unwrap();
        std::fs::write(dir.path().join("DQM_b_R000100001.h5"), b"").unwrap();
        let files = discover_archives(dir.path(), "DQM", "h5").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("DQM_a_R000100001.h5"));
    }

    #[test]
    fn test_hdf5_archive_reads_histogram() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DQM_V0001_HLTpb_R000392123.h5");
        let folder = "DQMData/Run 392123/HLT/Run summary/EGM/TrigObjTnP";
        {
            let file = hdf5::File::create(&path).unwrap();
            let group = file.create_group(folder).unwrap();
            let bins = Array2::<f64>::from_elem((6, 62), 2.0);
            group
                .new_dataset_builder()
                .with_data(&bins)
                .create("stdTag_hltEle32WPTightHEFilter_eta")
                .unwrap();
        }

        let archive = Hdf5Source.open(&path).unwrap();
        let hist = archive
            .get(&format!("{folder}/stdTag_hltEle32WPTightHEFilter_eta"))
            .unwrap()
            .unwrap();
        assert_eq!(hist.n_bins_x(), 4);
        assert_eq!(hist.n_bins_y(), 60);
        assert_eq!(
            hist.integral(
                crate::histogram::BinRange::new(2, 3),
                crate::histogram::BinRange::new(25, 60)
            ),
            144.0
        );
        assert!(archive
            .get(&format!("{folder}/stdTag_missing_eta"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_hdf5_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Hdf5Source.open(&dir.path().join("nope.h5")),
            Err(ArchiveError::BadFilePath(_))
        ));
    }
}
