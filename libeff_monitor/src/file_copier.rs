use std::path::{Path, PathBuf};

use super::archive::parse_run_number;
use super::config::Config;
use super::error::FileCopierError;

/// FileCopier copies new DQM archives from the shared store into the local archive directory.
pub struct FileCopier {
    file_stack: Vec<(PathBuf, PathBuf, u64)>,
    total_data_size_bytes: u64,
    n_skipped: usize,
}

impl FileCopier {
    /// Create a new FileCopier.
    ///
    /// Files already present at the destination are not copied again, nor are runs below
    /// the configured minimum. Fails if the config has no copy source.
    pub fn new(config: &Config) -> Result<Self, FileCopierError> {
        let source = config.copy_source.as_ref().ok_or(FileCopierError::NoSource)?;
        Self::from_directories(
            source,
            &config.get_archive_directory(),
            &config.copy_prefix,
            &config.file_extension,
            config.copy_min_run,
        )
    }

    fn from_directories(
        source: &Path,
        destination: &Path,
        prefix: &str,
        extension: &str,
        min_run: Option<u32>,
    ) -> Result<Self, FileCopierError> {
        if !source.is_dir() {
            return Err(FileCopierError::BadFilePath(source.to_path_buf()));
        }
        let mut stack: Vec<(PathBuf, PathBuf, u64)> = Vec::new();
        let mut total_size: u64 = 0;
        let mut n_skipped = 0;
        for (path, bytes) in Self::get_file_stack(source, prefix, extension)? {
            let file_name = match path.file_name() {
                Some(name) => name.to_os_string(),
                None => continue,
            };
            if let Some(min_run) = min_run {
                match parse_run_number(&file_name.to_string_lossy()) {
                    Some(run) if run >= min_run => (),
                    _ => {
                        n_skipped += 1;
                        continue;
                    }
                }
            }
            let dst = destination.join(&file_name);
            if dst.exists() {
                n_skipped += 1;
                continue;
            }
            stack.push((path, dst, bytes));
            total_size += bytes;
        }
        Ok(Self {
            file_stack: stack,
            total_data_size_bytes: total_size,
            n_skipped,
        })
    }

    /// Get the files under parent_path named `<start_pattern>...<extension>`, with their sizes.
    fn get_file_stack(
        parent_path: &Path,
        start_pattern: &str,
        extension: &str,
    ) -> Result<Vec<(PathBuf, u64)>, FileCopierError> {
        let mut file_list: Vec<(PathBuf, u64)> = Vec::new();
        for item in parent_path.read_dir()? {
            let item_path = item?.path();
            let item_name = match item_path.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => continue,
            };
            let matches_ext = item_path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == extension);
            if item_name.starts_with(start_pattern) && matches_ext && item_path.is_file() {
                let bytes = item_path.metadata()?.len();
                file_list.push((item_path, bytes));
            }
        }
        file_list.sort();
        Ok(file_list)
    }

    /// Get total copy size of files.
    pub fn get_total_data_size(&self) -> u64 {
        self.total_data_size_bytes
    }

    /// Number of matching files left out because they were present or below the minimum run
    pub fn get_n_skipped(&self) -> usize {
        self.n_skipped
    }

    /// Get source, destination, size for copying process.
    ///
    /// This function retuns list of source path, destination path and size in bytes.
    /// Usually used in loop.
    pub fn copy_meta(&self) -> &Vec<(PathBuf, PathBuf, u64)> {
        &self.file_stack
    }
}
