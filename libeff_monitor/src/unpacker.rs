use fxhash::FxHashSet;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::archive::parse_run_number;
use super::config::Config;
use super::constants::ZIP_EXTENSION;
use super::error::UnpackerError;

/// One archive inside a ZIP backup that is due for extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ZipEntry {
    pub zip_path: PathBuf,
    pub index: usize,
    pub destination: PathBuf,
    pub size: u64,
}

/// Unpacker pulls DQM archives out of the ZIP backups of the DQM GUI.
///
/// Entries are flattened into the archive directory: whatever folders they sit in inside
/// the ZIP, only the file name is kept.
pub struct Unpacker {
    entry_stack: Vec<ZipEntry>,
    total_data_size_bytes: u64,
    n_skipped: usize,
}

impl Unpacker {
    /// Create a new Unpacker from the unpack settings of the config.
    ///
    /// Fails if the config has no unpack source.
    pub fn new(config: &Config) -> Result<Self, UnpackerError> {
        let source = config
            .unpack_source
            .as_ref()
            .ok_or(UnpackerError::NoSource)?;
        Self::from_directories(
            source,
            &config.get_archive_directory(),
            &config.copy_prefix,
            &config.file_extension,
            config.unpack_min_size,
            config.unpack_min_run,
        )
    }

    /// Scan every ZIP in source for entries named `<prefix>...<extension>`.
    ///
    /// An entry is kept only if it is larger than min_size bytes, carries a run number not
    /// below min_run, and is not already in destination or planned from an earlier ZIP.
    /// ZIPs that cannot be read are skipped with a warning.
    pub fn from_directories(
        source: &Path,
        destination: &Path,
        prefix: &str,
        extension: &str,
        min_size: u64,
        min_run: Option<u32>,
    ) -> Result<Self, UnpackerError> {
        if !source.is_dir() {
            return Err(UnpackerError::BadFilePath(source.to_path_buf()));
        }
        let mut unpacker = Self {
            entry_stack: Vec::new(),
            total_data_size_bytes: 0,
            n_skipped: 0,
        };
        let mut planned: FxHashSet<OsString> = FxHashSet::default();
        for zip_path in Self::get_zip_stack(source)? {
            if let Err(e) = unpacker.scan_zip(
                &zip_path,
                destination,
                prefix,
                extension,
                min_size,
                min_run,
                &mut planned,
            ) {
                log::warn!("Failed to read {}: {e}", zip_path.to_string_lossy());
            }
        }
        Ok(unpacker)
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_zip(
        &mut self,
        zip_path: &Path,
        destination: &Path,
        prefix: &str,
        extension: &str,
        min_size: u64,
        min_run: Option<u32>,
        planned: &mut FxHashSet<OsString>,
    ) -> Result<(), UnpackerError> {
        let mut archive = ZipArchive::new(File::open(zip_path)?)?;
        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let flat_name = match entry
                .enclosed_name()
                .and_then(|p| p.file_name().map(|n| n.to_os_string()))
            {
                Some(name) => name,
                None => continue,
            };
            let name = flat_name.to_string_lossy();
            let matches_ext = Path::new(&flat_name)
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == extension);
            if !name.starts_with(prefix) || !matches_ext {
                continue;
            }
            let run_ok = match (parse_run_number(&name), min_run) {
                (Some(run), Some(min_run)) => run >= min_run,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if entry.size() <= min_size || !run_ok {
                self.n_skipped += 1;
                continue;
            }
            let dst = destination.join(&flat_name);
            if dst.exists() || planned.contains(&flat_name) {
                self.n_skipped += 1;
                continue;
            }
            self.total_data_size_bytes += entry.size();
            self.entry_stack.push(ZipEntry {
                zip_path: zip_path.to_path_buf(),
                index,
                destination: dst,
                size: entry.size(),
            });
            planned.insert(flat_name);
        }
        Ok(())
    }

    /// Get the `*.zip` files directly under parent_path, sorted
    fn get_zip_stack(parent_path: &Path) -> Result<Vec<PathBuf>, UnpackerError> {
        let mut zip_list: Vec<PathBuf> = Vec::new();
        for item in parent_path.read_dir()? {
            let item_path = item?.path();
            let is_zip = item_path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == ZIP_EXTENSION);
            if is_zip && item_path.is_file() {
                zip_list.push(item_path);
            }
        }
        zip_list.sort();
        Ok(zip_list)
    }

    /// Write one entry to its destination through a `.part` file that is renamed once complete.
    ///
    /// Returns the number of bytes written.
    pub fn extract(&self, entry: &ZipEntry) -> Result<u64, UnpackerError> {
        let mut archive = ZipArchive::new(File::open(&entry.zip_path)?)?;
        let mut zip_file = archive.by_index(entry.index)?;
        if let Some(parent) = entry.destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut part_name = entry
            .destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        part_name.push(".part");
        let part_path = entry.destination.with_file_name(part_name);
        let mut part_file = File::create(&part_path)?;
        let written = std::io::copy(&mut zip_file, &mut part_file)?;
        drop(part_file);
        std::fs::rename(&part_path, &entry.destination)?;
        Ok(written)
    }

    /// Get total uncompressed size of the planned entries.
    pub fn get_total_data_size(&self) -> u64 {
        self.total_data_size_bytes
    }

    /// Number of matching entries left out for size, run number or presence
    pub fn get_n_skipped(&self) -> usize {
        self.n_skipped
    }

    pub fn unpack_meta(&self) -> &Vec<ZipEntry> {
        &self.entry_stack
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub(crate) fn make_zip(path: &Path, entries: &[(&str, usize)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(&vec![7u8; *bytes]).unwrap();
        }
        writer.finish().unwrap();
    }

    fn unpacker(src: &Path, dst: &Path) -> Unpacker {
        Unpacker::from_directories(src, dst, "DQM_V0001_HLTpb_", "h5", 100, Some(392000)).unwrap()
    }

    #[test]
    fn test_unpacker_filters_size_and_run() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        make_zip(
            &src.path().join("backup_a.zip"),
            &[
                ("00039xxxx/DQM_V0001_HLTpb_R000392100.h5", 200),
                ("00039xxxx/DQM_V0001_HLTpb_R000392200.h5", 100),
                ("00039xxxx/DQM_V0001_HLTpb_R000391900.h5", 200),
                ("00039xxxx/DQM_V0001_HLTpb_R000392300.txt", 200),
                ("00039xxxx/DQM_V0001_Other_R000392400.h5", 200),
            ],
        );

        let unpacker = unpacker(src.path(), dst.path());
        let meta = unpacker.unpack_meta();
        assert_eq!(meta.len(), 1);
        assert_eq!(
            meta[0].destination,
            dst.path().join("DQM_V0001_HLTpb_R000392100.h5")
        );
        assert_eq!(meta[0].size, 200);
        assert_eq!(unpacker.get_total_data_size(), 200);
        // Exactly min_size is not enough, nor is an old run
        assert_eq!(unpacker.get_n_skipped(), 2);
    }

    #[test]
    fn test_unpacker_skips_present_and_repeated_names() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        make_zip(
            &src.path().join("backup_a.zip"),
            &[
                ("a/DQM_V0001_HLTpb_R000392100.h5", 200),
                ("a/DQM_V0001_HLTpb_R000392200.h5", 300),
            ],
        );
        make_zip(
            &src.path().join("backup_b.zip"),
            &[("b/DQM_V0001_HLTpb_R000392100.h5", 400)],
        );
        std::fs::write(dst.path().join("DQM_V0001_HLTpb_R000392200.h5"), b"old").unwrap();

        let unpacker = unpacker(src.path(), dst.path());
        let meta = unpacker.unpack_meta();
        assert_eq!(meta.len(), 1);
        assert!(meta[0].zip_path.ends_with("backup_a.zip"));
        assert_eq!(meta[0].size, 200);
        assert_eq!(unpacker.get_n_skipped(), 2);
    }

    #[test]
    fn test_unpacker_extracts_flat_and_survives_broken_zip() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("backup_0.zip"), b"not a zip").unwrap();
        make_zip(
            &src.path().join("backup_1.zip"),
            &[("deep/er/DQM_V0001_HLTpb_R000392500.h5", 150)],
        );

        let unpacker = unpacker(src.path(), &dst.path().join("2025"));
        assert_eq!(unpacker.unpack_meta().len(), 1);
        let written = unpacker.extract(&unpacker.unpack_meta()[0]).unwrap();
        assert_eq!(written, 150);

        let out = dst.path().join("2025/DQM_V0001_HLTpb_R000392500.h5");
        assert_eq!(std::fs::read(&out).unwrap(), vec![7u8; 150]);
        assert!(!dst.path().join("2025/deep").exists());
        assert!(!dst.path().join("2025/DQM_V0001_HLTpb_R000392500.h5.part").exists());

        // A second scan finds nothing new
        let again = Unpacker::from_directories(
            src.path(),
            &dst.path().join("2025"),
            "DQM_V0001_HLTpb_",
            "h5",
            100,
            Some(392000),
        )
        .unwrap();
        assert!(again.unpack_meta().is_empty());
        assert_eq!(again.get_n_skipped(), 1);
    }

    #[test]
    fn test_unpacker_requires_source() {
        let config = Config::default();
        assert!(matches!(Unpacker::new(&config), Err(UnpackerError::NoSource)));
        let mut config = Config::default();
        config.unpack_source = Some(PathBuf::from("/no/such/dir/for/unpacker"));
        assert!(matches!(
            Unpacker::new(&config),
            Err(UnpackerError::BadFilePath(_))
        ));
    }
}
