use std::sync::mpsc::Sender;

use super::accumulator::{Accumulator, Admission};
use super::archive::{ArchiveSource, Hdf5Source};
use super::config::Config;
use super::container::{ContainerReader, ContainerWriter};
use super::efficiency::EfficiencyDeriver;
use super::error::ProcessorError;
use super::estimator::make_estimator;
use super::file_copier::FileCopier;
use super::plot::render_region;
use super::series::SeriesSet;
use super::unpacker::Unpacker;
use super::website::SiteIndexer;
use super::worker_status::{Stage, WorkerStatus};

/// The pieces of the pipeline that can be requested on their own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Unpack,
    Copy,
    Compute,
    Plot,
    Publish,
    /// Compute, plot and publish; unpack and copy first when their sources are configured
    All,
}

/// Copy archives that are new since the last call into the epoch's archive directory
pub fn copy_new_archives(config: &Config, tx: &Sender<WorkerStatus>) -> Result<(), ProcessorError> {
    let file_copier = FileCopier::new(config)?;
    let total_copy_size = file_copier.get_total_data_size();
    log::info!(
        "Copying {} new files with total size: {} ({} skipped)",
        file_copier.copy_meta().len(),
        human_bytes::human_bytes(total_copy_size as f64),
        file_copier.get_n_skipped()
    );
    let mut copy_count = 0;
    tx.send(WorkerStatus::new(0.0, Stage::Copy))?;
    for (src, dst, size) in file_copier.copy_meta() {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dst)?;
        copy_count += size;
        tx.send(WorkerStatus::new(
            copy_count as f32 / total_copy_size.max(1) as f32,
            Stage::Copy,
        ))?;
        log::info!(
            "Copied {} in {}",
            dst.to_string_lossy(),
            human_bytes::human_bytes(*size as f64),
        );
    }
    tx.send(WorkerStatus::new(1.0, Stage::Copy))?;
    log::info!("Done with copying files.");
    Ok(())
}

/// Extract new archives from the ZIP backups into the epoch's archive directory.
///
/// Returns the number of archives extracted.
pub fn unpack_backups(config: &Config, tx: &Sender<WorkerStatus>) -> Result<usize, ProcessorError> {
    let unpacker = Unpacker::new(config)?;
    let total_unpack_size = unpacker.get_total_data_size();
    log::info!(
        "Unpacking {} new files with total size: {} ({} skipped)",
        unpacker.unpack_meta().len(),
        human_bytes::human_bytes(total_unpack_size as f64),
        unpacker.get_n_skipped()
    );
    let mut unpack_count = 0;
    tx.send(WorkerStatus::new(0.0, Stage::Unpack))?;
    for entry in unpacker.unpack_meta() {
        let written = unpacker.extract(entry)?;
        unpack_count += entry.size;
        tx.send(WorkerStatus::new(
            unpack_count as f32 / total_unpack_size.max(1) as f32,
            Stage::Unpack,
        ))?;
        log::info!(
            "Extracted {} in {}",
            entry.destination.to_string_lossy(),
            human_bytes::human_bytes(written as f64),
        );
    }
    tx.send(WorkerStatus::new(1.0, Stage::Unpack))?;
    log::info!("Done with unpacking files.");
    Ok(unpacker.unpack_meta().len())
}

/// Accumulate every archive of the epoch into series and write the container.
///
/// Unreadable archives are skipped with a warning. If no run survives admission nothing is
/// written and the error is returned.
pub fn compute_series<S: ArchiveSource>(
    config: &Config,
    source: S,
    tx: &Sender<WorkerStatus>,
) -> Result<SeriesSet, ProcessorError> {
    let mut accumulator = Accumulator::new(config, source)?;
    let files = accumulator.discover()?;
    log::info!(
        "Found {} archives in {}",
        files.len(),
        config.get_archive_directory().to_string_lossy()
    );

    tx.send(WorkerStatus::new(0.0, Stage::Compute))?;
    let flush_frac: f32 = 0.01;
    let mut progress: f32 = 0.0;
    for (idx, file) in files.iter().enumerate() {
        match accumulator.add_run(file) {
            Ok(Admission::Accepted) => log::debug!("Run {} accepted", file.run_number),
            Ok(Admission::Rejected(count)) => log::info!(
                "Run {} rejected: {} count {} is not above {}",
                file.run_number,
                config.admission.region,
                count,
                config.admission.threshold
            ),
            Err(e) => log::warn!(
                "Skipping run {} ({}): {e}",
                file.run_number,
                file.path.to_string_lossy()
            ),
        }
        let done = (idx + 1) as f32 / files.len() as f32;
        if done - progress >= flush_frac {
            progress = done;
            tx.send(WorkerStatus::new(progress, Stage::Compute))?;
        }
    }
    log::info!(
        "Admitted {} of {} runs",
        accumulator.n_accepted(),
        accumulator.n_offered()
    );

    let set = accumulator.finish()?;
    let mut writer = ContainerWriter::new(&config.get_container_path())?;
    writer.write_set(&set, &config.chain)?;
    writer.close(&set, config.epoch.as_str())?;
    tx.send(WorkerStatus::new(1.0, Stage::Compute))?;
    Ok(set)
}

/// Read the container back, derive the efficiency curves of each region and draw them.
///
/// Returns the number of plots written.
pub fn render_plots(config: &Config, tx: &Sender<WorkerStatus>) -> Result<usize, ProcessorError> {
    let reader = ContainerReader::open(&config.get_container_path())?;
    let set = reader.read_set(&config.chain)?;
    let estimator = make_estimator(config.uncertainty);
    log::info!(
        "Deriving efficiencies over runs [{}, {}) with {} uncertainties",
        set.get_range().floor,
        set.get_range().ceiling,
        estimator.name()
    );
    let deriver = EfficiencyDeriver::new(&config.chain, estimator.as_ref());

    tx.send(WorkerStatus::new(0.0, Stage::Plot))?;
    let n_regions = config.chain.regions.len();
    let mut n_plots = 0;
    for (idx, region) in config.chain.regions.iter().enumerate() {
        let curves = deriver.derive_region(&region.name, &set);
        let written = render_region(
            &region.name,
            &curves,
            set.get_range(),
            &config.get_plot_directory(&region.name),
        )?;
        log::info!("{}: {} plots written", region.name, written.len());
        n_plots += written.len();
        tx.send(WorkerStatus::new(
            (idx + 1) as f32 / n_regions as f32,
            Stage::Plot,
        ))?;
    }
    Ok(n_plots)
}

/// Regenerate the index pages of the published tree
pub fn publish_site(config: &Config, tx: &Sender<WorkerStatus>) -> Result<usize, ProcessorError> {
    tx.send(WorkerStatus::new(0.0, Stage::Publish))?;
    let indexer = SiteIndexer::new(&config.web_path, &config.web_url, &config.site_title)?;
    let n_pages = indexer.publish()?;
    tx.send(WorkerStatus::new(1.0, Stage::Publish))?;
    Ok(n_pages)
}

/// Run one task of the pipeline against the HDF5 archives
pub fn run_task(config: &Config, task: Task, tx: &Sender<WorkerStatus>) -> Result<(), ProcessorError> {
    match task {
        Task::Unpack => {
            unpack_backups(config, tx)?;
        }
        Task::Copy => copy_new_archives(config, tx)?,
        Task::Compute => {
            compute_series(config, Hdf5Source, tx)?;
        }
        Task::Plot => {
            render_plots(config, tx)?;
        }
        Task::Publish => {
            publish_site(config, tx)?;
        }
        Task::All => {
            if config.need_unpack_files() {
                unpack_backups(config, tx)?;
            }
            if config.need_copy_files() {
                copy_new_archives(config, tx)?;
            }
            compute_series(config, Hdf5Source, tx)?;
            render_plots(config, tx)?;
            publish_site(config, tx)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::tests::make_archive;
    use crate::archive::memory::MemorySource;
    use crate::error::AccumulatorError;
    use crate::unpacker::tests::make_zip;
    use std::sync::mpsc::channel;

    fn counts(first: u64) -> Vec<u64> {
        (0..12).map(|i| first.saturating_sub(1000 * i)).collect()
    }

    fn setup(dir: &std::path::Path, runs: &[(u32, u64)]) -> (Config, MemorySource) {
        let mut config = Config::default();
        config.archive_path = dir.join("archives");
        config.output_path = dir.join("output");
        config.web_path = dir.join("www");
        config.web_url = String::from("https://example.org/EGMDQM");
        let archive_dir = config.get_archive_directory();
        std::fs::create_dir_all(&archive_dir).unwrap();

        let mut source = MemorySource::default();
        for (run, first) in runs {
            let path = archive_dir.join(format!("DQM_V0001_HLTpb_R000{run}.h5"));
            std::fs::write(&path, b"").unwrap();
            source
                .archives
                .insert(path, make_archive(&config, *run, &counts(*first)));
        }
        (config, source)
    }

    #[test]
    fn test_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = setup(
            dir.path(),
            &[(100001, 50000), (100002, 60000), (100003, 10000)],
        );
        let (tx, rx) = channel();

        let set = compute_series(&config, source, &tx).unwrap();
        assert_eq!(set.get_range().floor, 100000);
        assert_eq!(set.get_range().ceiling, 101000);
        assert_eq!(set.get_runs(), &[100001, 100002]);
        let first = set.get("EB", &config.chain.counters[0]).unwrap();
        assert!(first.get(100003).is_none());

        // The plots come from the container, not from the in-memory set
        let reader = ContainerReader::open(&config.get_container_path()).unwrap();
        let read = reader.read_set(&config.chain).unwrap();
        let estimator = make_estimator(config.uncertainty);
        let curves = EfficiencyDeriver::new(&config.chain, estimator.as_ref()).derive_region("EB", &read);
        assert_eq!(curves.len(), 12);
        assert_eq!(curves[0].get(100001).unwrap().value, 0.98);
        assert!(curves[0].get(100003).is_none());

        let n_plots = render_plots(&config, &tx).unwrap();
        // Per region: one overlay and eleven single-step plots
        assert_eq!(n_plots, 6 * 12);
        assert!(config
            .get_plot_directory("EB")
            .join("step_efficiency_EB.svg")
            .exists());

        let n_pages = publish_site(&config, &tx).unwrap();
        // www, 2025, six regions and their single/ directories
        assert_eq!(n_pages, 2 + 6 * 2);
        assert!(config.web_path.join("style.css").exists());

        drop(tx);
        let stages: Vec<Stage> = rx.iter().map(|s| s.stage).collect();
        assert!(stages.contains(&Stage::Compute));
        assert!(stages.contains(&Stage::Plot));
        assert_eq!(stages.last(), Some(&Stage::Publish));
    }

    #[test]
    fn test_no_admitted_runs_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = setup(dir.path(), &[(100001, 15000), (100002, 20000)]);
        let (tx, _rx) = channel();
        let result = compute_series(&config, source, &tx);
        assert!(matches!(
            result,
            Err(ProcessorError::AccumulatorError(
                AccumulatorError::NoAdmittedRuns(2)
            ))
        ));
        assert!(!config.get_container_path().exists());
    }

    #[test]
    fn test_empty_archive_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = setup(dir.path(), &[]);
        let (tx, _rx) = channel();
        assert!(matches!(
            compute_series(&config, source, &tx),
            Err(ProcessorError::AccumulatorError(
                AccumulatorError::NoMatchingFiles(_)
            ))
        ));
    }

    #[test]
    fn test_unpack_feeds_the_archive_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, _) = setup(dir.path(), &[]);
        let zip_dir = dir.path().join("backup");
        std::fs::create_dir_all(&zip_dir).unwrap();
        make_zip(
            &zip_dir.join("00039xxxx.zip"),
            &[
                ("x/DQM_V0001_HLTpb_R000392100.h5", 300),
                ("x/DQM_V0001_HLTpb_R000391999.h5", 300),
                ("x/DQM_V0001_HLTpb_R000392200.h5", 50),
            ],
        );
        config.unpack_source = Some(zip_dir);
        config.unpack_min_size = 100;
        let (tx, rx) = channel();

        assert_eq!(unpack_backups(&config, &tx).unwrap(), 1);
        let archive_dir = config.get_archive_directory();
        assert!(archive_dir.join("DQM_V0001_HLTpb_R000392100.h5").exists());
        assert!(!archive_dir.join("DQM_V0001_HLTpb_R000391999.h5").exists());
        assert!(!archive_dir.join("DQM_V0001_HLTpb_R000392200.h5").exists());
        // Nothing left to do on a second pass
        assert_eq!(unpack_backups(&config, &tx).unwrap(), 0);

        drop(tx);
        let last = rx.iter().last().unwrap();
        assert_eq!(last.stage, Stage::Unpack);
        assert_eq!(last.progress, 1.0);
    }
}
