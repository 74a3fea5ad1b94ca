//! # Calculations
//!
//! Delegated functions from `App` which resolve the target modes and sweep the self-energy engine
//! over them

use super::{AnharmonicError, Configuration};
use crate::{
    constants::in_kayser,
    coupling::AnharmonicCoupling,
    crystal::Crystal,
    parallel::{Communicator, SimulatedWorld, SingleProcess},
    phonons::{Mode, PhononStates},
    postprocessor::PostProcessorBuilder,
    self_energy::{
        Method, ModeSelfEnergy, SelfEnergyEngine, SelfEnergyEngineBuilder, TemperatureGrid,
    },
    spectral::DeltaFunction,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use nalgebra::Vector3;

/// The modes requested in the configuration, or every mode on the grid when none are given
pub(crate) fn resolve_targets<P: PhononStates>(
    config: &Configuration,
    phonons: &P,
) -> Result<Vec<Mode>, AnharmonicError> {
    let number_of_branches = phonons.number_of_branches();
    if config.targets.is_empty() {
        return Ok((0..phonons.number_of_kpoints())
            .flat_map(|k| (0..number_of_branches).map(move |s| Mode::new(k, s)))
            .collect());
    }

    config
        .targets
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let [x, y, z] = target.kpoint;
            let kpoint = phonons
                .grid()
                .try_grid_index(&Vector3::new(x, y, z))
                .map_err(|e| AnharmonicError::Target {
                    index,
                    reason: e.to_string(),
                })?;
            if target.branch >= number_of_branches {
                return Err(AnharmonicError::Target {
                    index,
                    reason: format!(
                        "branch {} does not exist, the crystal has {} branches",
                        target.branch, number_of_branches
                    ),
                });
            }
            Ok(Mode::new(kpoint, target.branch))
        })
        .collect()
}

/// The lowest frequency at the grid point nearest the zone centre
///
/// Energy differences between neighbouring grid points are of this order, so a smearing width much
/// below it resolves the grid rather than the dispersion. Ties go to the last point in grid order.
pub(crate) fn minimum_energy_difference<P: PhononStates>(crystal: &Crystal, phonons: &P) -> f64 {
    let grid = phonons.grid();
    let centred = |xk: &Vector3<f64>| xk.map(|x| if x > 0.5 { x - 1. } else { x });
    (1..grid.len())
        .map(|k| (k, crystal.wavevector_length(&centred(grid.kpoint(k).fractional()))))
        .fold(None, |nearest: Option<(usize, f64)>, (k, length)| match nearest {
            Some((_, shortest)) if shortest < length => nearest,
            _ => Some((k, length)),
        })
        .map(|(k, _)| {
            (0..phonons.number_of_branches())
                .map(|s| phonons.frequency(k, s))
                .fold(f64::INFINITY, f64::min)
        })
        .unwrap_or(0.)
}

/// Evaluates every target on `workers` cooperating workers and writes the results
#[tracing::instrument(name = "Lifetimes", level = "info", skip_all)]
pub(crate) fn lifetimes<P: PhononStates>(
    config: &Configuration,
    crystal: &Crystal,
    phonons: &P,
    coupling: &AnharmonicCoupling,
    targets: &[Mode],
    workers: usize,
    term: &console::Term,
) -> Result<(), AnharmonicError> {
    let temperatures = config.temperature.grid()?;
    let method = config.self_energy.method()?;
    let engine = SelfEnergyEngineBuilder::new()
        .with_phonons(phonons)
        .with_coupling(coupling)
        .with_method(method)
        .with_occupation(config.self_energy.occupation)
        .with_tolerances(config.tolerance)
        .with_four_phonon(config.self_energy.four_phonon)
        .build()?;
    let postprocessor = PostProcessorBuilder::new()
        .with_directory(&config.output.directory)
        .with_prefix(&config.output.prefix)
        .with_four_phonon(config.self_energy.four_phonon)
        .build()?;

    tracing::info!(
        "Estimated minimum energy difference {:.4} cm^-1",
        in_kayser(minimum_energy_difference(crystal, phonons))
    );
    match method {
        Method::Smearing(DeltaFunction::Lorentzian(_)) => tracing::info!(
            "Lorentzian broadening of {} cm^-1",
            config.self_energy.smearing_width
        ),
        Method::Smearing(DeltaFunction::Gaussian(_)) => tracing::info!(
            "Gaussian broadening of {} cm^-1",
            config.self_energy.smearing_width
        ),
        Method::Tetrahedron => tracing::info!("Tetrahedron integration"),
    }
    tracing::info!(
        "Evaluating {} modes at {} temperatures",
        targets.len(),
        temperatures.len()
    );
    let spinner_style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{prefix:.bold.dim} {spinner} {msg} [{wide_bar:.cyan/blue}] {percent}% ({eta})");
    let pb = ProgressBar::with_draw_target(
        targets.len() as u64,
        ProgressDrawTarget::term(term.clone(), 60),
    );
    pb.set_style(spinner_style);

    let results = sweep(&engine, targets, &temperatures, workers, &pb)?;
    pb.finish_with_message("complete");

    // Only the root holds results to write
    if let Some(results) = results {
        for result in results.iter() {
            postprocessor.write_mode(result, phonons.kpoint(result.mode.kpoint).fractional())?;
        }
        tracing::info!(
            "Wrote {} modes to {}",
            results.len(),
            postprocessor.lifetimes_path().display()
        );
    }
    Ok(())
}

/// Distributes the targets over MPI processes when there are several, and otherwise over
/// `workers` threads
fn sweep<P: PhononStates>(
    engine: &SelfEnergyEngine<'_, P>,
    targets: &[Mode],
    temperatures: &TemperatureGrid,
    workers: usize,
    pb: &ProgressBar,
) -> Result<Option<Vec<ModeSelfEnergy>>, AnharmonicError> {
    #[cfg(feature = "mpi-support")]
    {
        let world = crate::parallel::MpiCommunicator::world();
        if world.size() > 1 {
            if workers > 1 {
                tracing::warn!(
                    "Running on {} MPI processes, the {} requested workers are ignored",
                    world.size(),
                    workers
                );
            }
            if !world.is_root() {
                pb.set_draw_target(ProgressDrawTarget::hidden());
            }
            let results = evaluate_targets(engine, targets, temperatures, &world, pb)?;
            return Ok(world.is_root().then(|| results));
        }
    }

    tracing::info!("Running on {} workers", workers);
    match workers {
        1 => evaluate_targets(engine, targets, temperatures, &SingleProcess, pb).map(Some),
        _ => {
            // Every worker holds the reduced results, the root's copy is kept
            let mut outcomes = SimulatedWorld::run(workers, |rank| {
                evaluate_targets(engine, targets, temperatures, rank, pb)
            })
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(outcomes.swap_remove(0)))
        }
    }
}

fn evaluate_targets<P: PhononStates, C: Communicator>(
    engine: &SelfEnergyEngine<'_, P>,
    targets: &[Mode],
    temperatures: &TemperatureGrid,
    communicator: &C,
    pb: &ProgressBar,
) -> Result<Vec<ModeSelfEnergy>, AnharmonicError> {
    let mut results = Vec::with_capacity(targets.len());
    for &mode in targets {
        if let Some(result) = engine.calculate(mode, temperatures, communicator)? {
            results.push(result);
        }
        if communicator.is_root() {
            pb.inc(1);
        }
    }
    Ok(results)
}
