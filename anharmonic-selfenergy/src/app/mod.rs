//! This module governs the high-level implementation of the calculation
mod calculations;
mod configuration;
mod error;
mod telemetry;

pub(crate) use configuration::Configuration;
pub(crate) use error::AnharmonicError;

use crate::{coupling::AnharmonicCoupling, crystal::SystemFile};
use clap::{ArgEnum, Parser};
use color_eyre::eyre::eyre;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct App {
    /// The system file holding the crystal, the phonon states and the force constants
    file_path: Option<PathBuf>,
    #[clap(arg_enum, short, long, default_value = "info")]
    log_level: LogLevel,
    /// Number of cooperating workers, ignored when running on several MPI processes
    #[clap(short, long, default_value = "1")]
    workers: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
pub(crate) enum LogLevel {
    Trace,
    Info,
    Debug,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Error => "error",
        };
        write!(f, "{}", level)
    }
}

pub fn run() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = App::parse();

    let config = Configuration::build()?;
    if !config.output.directory.exists() {
        std::fs::create_dir_all(&config.output.directory)?;
    }
    let (subscriber, _guard) = telemetry::get_subscriber(cli.log_level, &config.output.directory);
    telemetry::init_subscriber(subscriber);

    if cli.workers == 0 {
        return Err(eyre!("At least one worker is required."));
    }
    #[cfg(feature = "mpi-support")]
    let _universe = crate::parallel::MpiCommunicator::initialize()
        .map(|(universe, _)| universe)
        .ok_or(eyre!("MPI could not be initialised."))?;
    let path = cli
        .file_path
        .ok_or(eyre!("A file path needs to be passed."))?;
    tracing::info!("Reading system from {}", path.display());

    let system = SystemFile::build(path)?;
    let crystal = system.crystal()?;
    let grid = system.grid()?;
    let phonons = system.phonons(&grid, &crystal, config.tolerance.hermiticity)?;
    let force_constants = system.force_constants(&crystal)?;
    let coupling = AnharmonicCoupling::new(&crystal, &force_constants)?;

    let targets = calculations::resolve_targets(&config, &phonons)?;
    let term = console::Term::stdout();
    calculations::lifetimes(
        &config,
        &crystal,
        &phonons,
        &coupling,
        &targets,
        cli.workers,
        &term,
    )?;
    Ok(())
}
