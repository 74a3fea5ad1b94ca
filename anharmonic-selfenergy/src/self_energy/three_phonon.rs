//! Lowest-order (bubble) contributions from the cubic coupling
//!
//! With `n+ = 1 + n1 + n2` and `n- = n1 - n2` the damping of the target mode `(q, s)` is
//!
//! ```text
//! Gamma = pi / (16 N) sum |V3(-q s, k1 s1, k2 s2)|^2 [ -n+ d(w + w1 + w2) + n+ d(w - w1 - w2)
//!                                                     - n- d(w - w1 + w2) + n- d(w + w1 - w2) ]
//! ```
//!
//! summed over `k1` and both branches, with `k2 = q - k1`.

use super::{SelfEnergyError, Tolerances};
use crate::{
    coupling::AnharmonicCoupling,
    parallel::Communicator,
    phonons::{Mode, PhononStates},
    spectral::{DeltaFunction, IsosurfaceIntegrator},
    thermodynamics::Occupation,
};
use itertools::iproduct;
use num_complex::Complex;
use rayon::prelude::*;
use std::f64::consts::PI;

/// A momentum-conserving pair of final-state modes and its squared coupling to the target
#[derive(Clone, Copy, Debug)]
pub(crate) struct Triplet {
    pub(crate) omega_1: f64,
    pub(crate) omega_2: f64,
    pub(crate) weight: f64,
}

/// Occupation factors `(n+, n-)` of a pair of final-state modes
fn occupation_factors(
    occupation: Occupation,
    omega_1: f64,
    omega_2: f64,
    temperature: f64,
) -> (f64, f64) {
    let n_1 = occupation.occupation(omega_1, temperature);
    let n_2 = occupation.occupation(omega_2, temperature);
    (1. + n_1 + n_2, n_1 - n_2)
}

/// Checks `-q + k1 + (q - k1)` for every `k1` on the grid
///
/// Every worker checks the whole grid so that a failure is raised on all of them before any
/// collective operation is entered.
fn check_conservation<P: PhononStates>(
    phonons: &P,
    mode: Mode,
    conjugate: Mode,
    tolerances: &Tolerances,
) -> Result<(), SelfEnergyError> {
    let grid = phonons.grid();
    for k1 in 0..grid.len() {
        let k2 = grid.fold_difference(mode.kpoint, k1);
        let residual = grid.conservation_residual(&[conjugate.kpoint, k1, k2]);
        if residual > tolerances.conservation {
            return Err(SelfEnergyError::MomentumNotConserved {
                mode,
                kpoints: vec![conjugate.kpoint, k1, k2],
                residual,
            });
        }
    }
    Ok(())
}

/// The final states of `mode` owned by this worker
///
/// The worker's share of `k1` is looped over sequentially and the branch pairs at each `k1` are
/// spread over threads.
pub(crate) fn collect_triplets<P: PhononStates, C: Communicator>(
    phonons: &P,
    coupling: &AnharmonicCoupling,
    mode: Mode,
    tolerances: &Tolerances,
    communicator: &C,
) -> Result<Vec<Triplet>, SelfEnergyError> {
    let grid = phonons.grid();
    let conjugate = Mode::new(phonons.negate(mode.kpoint), mode.branch);
    check_conservation(phonons, mode, conjugate, tolerances)?;
    let number_of_branches = phonons.number_of_branches();
    let pairs = iproduct!(0..number_of_branches, 0..number_of_branches).collect::<Vec<_>>();

    let mut triplets = Vec::new();
    for k1 in communicator.partition(grid.len()) {
        let k2 = grid.fold_difference(mode.kpoint, k1);
        triplets.par_extend(pairs.par_iter().filter_map(|&(s1, s2)| {
            let (omega_1, omega_2) = (phonons.frequency(k1, s1), phonons.frequency(k2, s2));
            if omega_1 < tolerances.frequency || omega_2 < tolerances.frequency {
                return None;
            }
            let weight = coupling
                .v3(phonons, [conjugate, Mode::new(k1, s1), Mode::new(k2, s2)])
                .norm_sqr();
            Some(Triplet {
                omega_1,
                omega_2,
                weight,
            })
        }));
    }
    Ok(triplets)
}

/// Sums per-temperature contributions over the triplets on threads, then over workers
fn reduce_over_triplets<C, F>(
    triplets: &[Triplet],
    number_of_values: usize,
    communicator: &C,
    contribution: F,
) -> Vec<f64>
where
    C: Communicator,
    F: Fn(&Triplet, &mut [f64]) + Sync,
{
    let partial = triplets
        .par_iter()
        .fold(
            || vec![0.; number_of_values],
            |mut sum, triplet| {
                contribution(triplet, &mut sum);
                sum
            },
        )
        .reduce(
            || vec![0.; number_of_values],
            |mut a, b| {
                a.iter_mut().zip(b.iter()).for_each(|(x, y)| *x += y);
                a
            },
        );
    communicator.reduce_sum(partial)
}

pub(crate) fn smeared_damping<C: Communicator>(
    triplets: &[Triplet],
    kernel: &DeltaFunction,
    occupation: Occupation,
    omega: f64,
    temperatures: &[f64],
    number_of_kpoints: usize,
    communicator: &C,
) -> Vec<f64> {
    let total = reduce_over_triplets(triplets, temperatures.len(), communicator, |triplet, sum| {
        let (omega_1, omega_2) = (triplet.omega_1, triplet.omega_2);
        let delta_sum = kernel.evaluate(omega + omega_1 + omega_2);
        let delta_difference = kernel.evaluate(omega - omega_1 - omega_2);
        let delta_forward = kernel.evaluate(omega - omega_1 + omega_2);
        let delta_backward = kernel.evaluate(omega + omega_1 - omega_2);
        for (value, &temperature) in sum.iter_mut().zip(temperatures.iter()) {
            let (n_plus, n_minus) = occupation_factors(occupation, omega_1, omega_2, temperature);
            *value += triplet.weight
                * (-n_plus * delta_sum + n_plus * delta_difference - n_minus * delta_forward
                    + n_minus * delta_backward);
        }
    });
    let prefactor = PI / (16. * number_of_kpoints as f64);
    total.into_iter().map(|value| value * prefactor).collect()
}

/// The complex bubble `1/(16 N) sum |V3|^2 [n+/(z + w1 + w2) - n+/(z - w1 - w2) + n-/(z - w1 + w2)
/// - n-/(z + w1 - w2)]`
pub(crate) fn bubble<C: Communicator>(
    triplets: &[Triplet],
    occupation: Occupation,
    z: Complex<f64>,
    temperatures: &[f64],
    number_of_kpoints: usize,
    communicator: &C,
) -> Vec<Complex<f64>> {
    let total = reduce_over_triplets(
        triplets,
        2 * temperatures.len(),
        communicator,
        |triplet, sum| {
            let (omega_1, omega_2) = (triplet.omega_1, triplet.omega_2);
            let poles = [
                (z + omega_1 + omega_2).inv(),
                (z - omega_1 - omega_2).inv(),
                (z - omega_1 + omega_2).inv(),
                (z + omega_1 - omega_2).inv(),
            ];
            for (value, &temperature) in sum.chunks_mut(2).zip(temperatures.iter()) {
                let (n_plus, n_minus) =
                    occupation_factors(occupation, omega_1, omega_2, temperature);
                let term = (poles[0] * n_plus - poles[1] * n_plus + poles[2] * n_minus
                    - poles[3] * n_minus)
                    * triplet.weight;
                value[0] += term.re;
                value[1] += term.im;
            }
        },
    );
    let prefactor = 1. / (16. * number_of_kpoints as f64);
    total
        .chunks(2)
        .map(|pair| Complex::new(pair[0], pair[1]) * prefactor)
        .collect()
}

/// Tetrahedron quadrature of the damping
///
/// Each branch pair contributes four sheets, one per delta function, whose energies and integrands
/// are tabulated over `k1` on threads and integrated at the target frequency. The branch pairs are
/// partitioned across workers.
#[allow(clippy::too_many_arguments)]
pub(crate) fn tetrahedron_damping<P: PhononStates, C: Communicator>(
    phonons: &P,
    coupling: &AnharmonicCoupling,
    integrator: &dyn IsosurfaceIntegrator,
    occupation: Occupation,
    tolerances: &Tolerances,
    mode: Mode,
    temperatures: &[f64],
    communicator: &C,
) -> Result<Vec<f64>, SelfEnergyError> {
    let grid = phonons.grid();
    let omega = phonons.mode_frequency(mode);
    let conjugate = Mode::new(phonons.negate(mode.kpoint), mode.branch);
    check_conservation(phonons, mode, conjugate, tolerances)?;
    let number_of_branches = phonons.number_of_branches();

    let mut partial = vec![0.; temperatures.len()];
    for pair in communicator.partition(number_of_branches * number_of_branches) {
        let (s1, s2) = (pair / number_of_branches, pair % number_of_branches);
        // (omega_1, omega_2, |V3|^2) at each k1
        let samples = (0..grid.len())
            .into_par_iter()
            .map(|k1| {
                let k2 = grid.fold_difference(mode.kpoint, k1);
                let (omega_1, omega_2) = (phonons.frequency(k1, s1), phonons.frequency(k2, s2));
                let weight = match omega_1 < tolerances.frequency || omega_2 < tolerances.frequency
                {
                    true => 0.,
                    false => coupling
                        .v3(phonons, [conjugate, Mode::new(k1, s1), Mode::new(k2, s2)])
                        .norm_sqr(),
                };
                (omega_1, omega_2, weight)
            })
            .collect::<Vec<_>>();

        let sheets: [Vec<f64>; 4] = [
            samples.iter().map(|(w1, w2, _)| -w1 - w2).collect(),
            samples.iter().map(|(w1, w2, _)| w1 + w2).collect(),
            samples.iter().map(|(w1, w2, _)| w1 - w2).collect(),
            samples.iter().map(|(w1, w2, _)| -w1 + w2).collect(),
        ];
        for (value, &temperature) in partial.iter_mut().zip(temperatures.iter()) {
            let factors = samples
                .iter()
                .map(|&(omega_1, omega_2, weight)| {
                    let (n_plus, n_minus) =
                        occupation_factors(occupation, omega_1, omega_2, temperature);
                    (n_plus * weight, n_minus * weight)
                })
                .collect::<Vec<_>>();
            let integrands: [Vec<f64>; 4] = [
                factors.iter().map(|(plus, _)| -plus).collect(),
                factors.iter().map(|(plus, _)| *plus).collect(),
                factors.iter().map(|(_, minus)| -minus).collect(),
                factors.iter().map(|(_, minus)| *minus).collect(),
            ];
            *value += sheets
                .iter()
                .zip(integrands.iter())
                .map(|(energies, integrand)| integrator.integrate(energies, integrand, omega))
                .sum::<f64>();
        }
    }

    Ok(communicator
        .reduce_sum(partial)
        .into_iter()
        .map(|value| value * PI / 16.)
        .collect())
}
