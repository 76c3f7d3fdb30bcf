use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::mpsc::channel;

use libeff_monitor::config::{Config, Epoch};
use libeff_monitor::process::{run_task, Task};
use libeff_monitor::worker_status::{BarColor, Stage, WorkerStatus};

const LOG_FILE_NAME: &str = "eff_monitor.log";

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn bar_style(status: &WorkerStatus) -> ProgressStyle {
    let color = match status.color {
        BarColor::CYAN => "cyan",
        BarColor::MAGENTA => "magenta",
        BarColor::RED => "red",
        BarColor::GREEN => "green",
    };
    ProgressStyle::with_template(&format!(
        "{{msg:>8}} [{{bar:40.{color}/blue}}] {{percent:>3}}%"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn init_logging(level: simplelog::LevelFilter, pb_manager: &MultiProgress) -> Result<(), String> {
    let log_file = File::create(LOG_FILE_NAME).map_err(|e| e.to_string())?;
    let logger = simplelog::CombinedLogger::new(vec![
        simplelog::TermLogger::new(
            level,
            simplelog::Config::default(),
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        ),
        simplelog::WriteLogger::new(
            simplelog::LevelFilter::Debug,
            simplelog::Config::default(),
            log_file,
        ),
    ]);
    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    // Create a cli
    let matches = Command::new("eff_monitor_cli")
        .about("Track HLT filter efficiencies run by run")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("unpack").about("Extract new archives from the ZIP backups"))
        .subcommand(Command::new("copy").about("Copy new archives from the copy source"))
        .subcommand(Command::new("compute").about("Accumulate run counts into the container"))
        .subcommand(Command::new("plot").about("Derive efficiencies and draw them"))
        .subcommand(Command::new("publish").about("Regenerate the website index pages"))
        .subcommand(Command::new("all").about("Unpack and copy (if configured), compute, plot and publish"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("epoch")
                .short('e')
                .long("epoch")
                .value_parser(PossibleValuesParser::new(Epoch::ALL))
                .help("Override the epoch of the configuration"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .help("Only print warnings and errors"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Print debug messages"),
        )
        .get_matches();

    let level = if matches.get_flag("quiet") {
        simplelog::LevelFilter::Warn
    } else if matches.get_flag("verbose") {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    // Initialize feedback
    let pb_manager = MultiProgress::new();
    if let Err(e) = init_logging(level, &pb_manager) {
        eprintln!("Could not create logging/progress: {e}");
        return ExitCode::FAILURE;
    }

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            log::error!("A configuration path is required");
            return ExitCode::FAILURE;
        }
    };

    let task = match matches.subcommand_name() {
        Some("new") => {
            log::info!(
                "Making a template config at {}...",
                config_path.to_string_lossy()
            );
            return match make_template_config(&config_path) {
                Ok(()) => {
                    log::info!("Done.");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    log::error!("Could not write template config: {e}");
                    ExitCode::FAILURE
                }
            };
        }
        Some("unpack") => Task::Unpack,
        Some("copy") => Task::Copy,
        Some("compute") => Task::Compute,
        Some("plot") => Task::Plot,
        Some("publish") => Task::Publish,
        _ => Task::All,
    };

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let mut config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(epoch) = matches.get_one::<String>("epoch") {
        match Epoch::from_str(epoch) {
            Ok(e) => config.epoch = e,
            Err(e) => {
                log::error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }
    if let Err(e) = config.validate() {
        log::error!("{e}");
        return ExitCode::FAILURE;
    }
    log::info!("Config successfully loaded.");
    log::info!("Epoch: {}", config.epoch);
    log::info!(
        "Archive Path: {}",
        config.get_archive_directory().to_string_lossy()
    );
    log::info!(
        "Container Path: {}",
        config.get_container_path().to_string_lossy()
    );
    log::info!("Web Path: {}", config.web_path.to_string_lossy());
    if let Some(source) = &config.unpack_source {
        log::info!("Unpack Source: {}", source.to_string_lossy());
    }
    if let Some(source) = &config.copy_source {
        log::info!("Copy Source: {}", source.to_string_lossy());
    }

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    let (tx, rx) = channel::<WorkerStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || run_task(&config, task, &tx));

    // The channel closes once the worker returns
    let mut current_stage: Option<Stage> = None;
    for status in rx.iter() {
        if current_stage != Some(status.stage) {
            current_stage = Some(status.stage);
            pb.set_style(bar_style(&status));
            pb.set_message(status.stage.as_str());
        }
        pb.set_position((status.progress * 100.0) as u64);
    }
    pb.finish();

    match handle.join() {
        Ok(Ok(())) => {
            log::info!("Done.");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            log::error!("Processing failed with error: {e}");
            log::error!("See {LOG_FILE_NAME} for details");
            ExitCode::FAILURE
        }
        Err(_) => {
            log::error!("Failed to join processing task!");
            ExitCode::FAILURE
        }
    }
}
