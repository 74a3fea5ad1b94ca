//! # Four-phonon self-energy
//!
//! The ten diagrams of fourth order in the atomic displacements, labelled `a` through `j`:
//!
//! | label | vertices | topology |
//! |---|---|---|
//! | a | V4 | quartic loop |
//! | b | V3 V3 | cubic tadpole through the zone centre |
//! | c | V4 V4 | sunset |
//! | d | V3 V4 V3 | two bubbles joined by a quartic vertex |
//! | e | V3 V4 V3 | bubble with a quartic loop on one line |
//! | f | V3 V3 V3 V3 | bubble with a tadpole on one line |
//! | g | V3 V3 V3 V3 | bubble with a bubble on one line |
//! | h | V4 V3 V3 | quartic loop with a bubble on its line |
//! | i | V3 V3 V3 V3 | tadpole with a tadpole on its loop |
//! | j | V3 V3 V3 V3 | tadpole with a bubble on its loop |
//!
//! `a` is first order in the quartic coupling and `b` second order in the cubic. Together they are
//! the leading static shift. Diagrams `a`, `b`, `h`, `i` and `j` are static and purely real, the
//! others are evaluated at `z = omega + i eps`.
//!
//! The outer wavevector `k_1` of every diagram is partitioned across workers and distributed over
//! threads. Each worker accumulates its share for every temperature and the shares are summed with a
//! single collective reduction.

mod diagrams;
pub(crate) mod kernels;

use super::{SelfEnergyError, Tolerances};
use crate::{
    coupling::AnharmonicCoupling,
    parallel::Communicator,
    phonons::{Mode, PhononStates},
    thermodynamics::Occupation,
};
use kernels::Statistics;
use num_complex::Complex;
use rayon::prelude::*;
use std::ops::{AddAssign, Index, IndexMut};

/// Number of fourth-order diagrams
pub const NUMBER_OF_DIAGRAMS: usize = 10;

/// The diagram labels in storage order
pub const DIAGRAM_LABELS: [char; NUMBER_OF_DIAGRAMS] =
    ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j'];

/// The contribution of every fourth-order diagram to the self-energy of one mode at one temperature,
/// in Rydberg
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FourPhononDiagrams(pub [Complex<f64>; NUMBER_OF_DIAGRAMS]);

impl FourPhononDiagrams {
    pub fn total(&self) -> Complex<f64> {
        self.0.iter().sum()
    }

    pub fn diagram(&self, label: char) -> Option<Complex<f64>> {
        DIAGRAM_LABELS
            .iter()
            .position(|&l| l == label)
            .map(|index| self.0[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Complex<f64>> {
        self.0.iter()
    }
}

impl Index<usize> for FourPhononDiagrams {
    type Output = Complex<f64>;
    fn index(&self, index: usize) -> &Complex<f64> {
        &self.0[index]
    }
}

impl IndexMut<usize> for FourPhononDiagrams {
    fn index_mut(&mut self, index: usize) -> &mut Complex<f64> {
        &mut self.0[index]
    }
}

impl AddAssign for FourPhononDiagrams {
    fn add_assign(&mut self, other: Self) {
        self.0
            .iter_mut()
            .zip(other.0.iter())
            .for_each(|(a, b)| *a += b);
    }
}

/// Storage offsets of the diagrams
pub(crate) mod label {
    pub(crate) const A: usize = 0;
    pub(crate) const B: usize = 1;
    pub(crate) const C: usize = 2;
    pub(crate) const D: usize = 3;
    pub(crate) const E: usize = 4;
    pub(crate) const F: usize = 5;
    pub(crate) const G: usize = 6;
    pub(crate) const H: usize = 7;
    pub(crate) const I: usize = 8;
    pub(crate) const J: usize = 9;
}

/// `sum_{k s} V3(Gamma t, k s, -k s) (2 n + 1)` for each zone-centre mode `t` and temperature
///
/// Each worker sums its share of the grid. The partial sums are reduced as interleaved real and
/// imaginary parts.
fn tadpole_sums<P: PhononStates, C: Communicator>(
    phonons: &P,
    coupling: &AnharmonicCoupling,
    gamma_index: usize,
    gamma: &[(usize, f64)],
    active: &[Vec<(usize, f64)>],
    statistics: &[Statistics],
    communicator: &C,
) -> Vec<Vec<Complex<f64>>> {
    let grid = phonons.grid();
    let local = communicator.partition(grid.len());
    let partial = gamma
        .iter()
        .flat_map(|&(t, _)| {
            let mut tadpole = vec![Complex::new(0., 0.); statistics.len()];
            for &k in local.iter() {
                let minus_k = grid.negate(k);
                for &(s, omega) in active[k].iter() {
                    let vertex = coupling.v3(
                        phonons,
                        [Mode::new(gamma_index, t), Mode::new(k, s), Mode::new(minus_k, s)],
                    );
                    tadpole
                        .iter_mut()
                        .zip(statistics.iter())
                        .for_each(|(sum, statistics)| *sum += vertex * statistics.loop_factor(omega));
                }
            }
            tadpole
        })
        .flat_map(|value| [value.re, value.im])
        .collect::<Vec<_>>();

    let total = communicator
        .reduce_sum(partial)
        .chunks_exact(2)
        .map(|pair| Complex::new(pair[0], pair[1]))
        .collect::<Vec<_>>();
    let n = statistics.len();
    (0..gamma.len())
        .map(|mode| total[mode * n..(mode + 1) * n].to_vec())
        .collect()
}

/// Everything the diagrams of one target mode share
pub(crate) struct DiagramContext<'a, P> {
    pub(crate) phonons: &'a P,
    pub(crate) coupling: &'a AnharmonicCoupling,
    pub(crate) target: Mode,
    /// The target with its wavevector negated
    pub(crate) conjugate: Mode,
    pub(crate) frequency: f64,
    pub(crate) z: Complex<f64>,
    pub(crate) statistics: Vec<Statistics>,
    pub(crate) conservation: f64,
    /// Branches above the frequency threshold at each wavevector, with their frequencies
    pub(crate) active: Vec<Vec<(usize, f64)>>,
    pub(crate) gamma_index: usize,
    /// Optical modes at the zone centre, with their frequencies
    pub(crate) gamma: Vec<(usize, f64)>,
    /// `V3(-q s, q s, Gamma t)` for each zone-centre mode in `gamma`
    pub(crate) target_to_gamma: Vec<Complex<f64>>,
    /// `sum_{k s} V3(Gamma t, k s, -k s) (2 n + 1)` for each zone-centre mode, per temperature
    pub(crate) tadpoles: Vec<Vec<Complex<f64>>>,
}

impl<'a, P: PhononStates> DiagramContext<'a, P> {
    pub(crate) fn new<C: Communicator>(
        phonons: &'a P,
        coupling: &'a AnharmonicCoupling,
        target: Mode,
        temperatures: &[f64],
        occupation: Occupation,
        tolerances: &Tolerances,
        broadening: f64,
        communicator: &C,
    ) -> Result<Self, SelfEnergyError> {
        let grid = phonons.grid();
        let gamma_index = phonons
            .nearest_grid_index(&nalgebra::Vector3::zeros())
            .ok_or(SelfEnergyError::MissingGamma)?;
        let frequency = phonons.mode_frequency(target);
        let active = (0..grid.len())
            .map(|k| {
                (0..phonons.number_of_branches())
                    .map(|s| (s, phonons.frequency(k, s)))
                    .filter(|&(_, omega)| omega >= tolerances.frequency)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let statistics = temperatures
            .iter()
            .map(|&temperature| Statistics {
                occupation,
                temperature,
                degeneracy: tolerances.degeneracy,
            })
            .collect::<Vec<_>>();
        let gamma = active[gamma_index].clone();
        let conjugate = Mode::new(phonons.negate(target.kpoint), target.branch);

        let target_to_gamma = gamma
            .iter()
            .map(|&(t, _)| coupling.v3(phonons, [conjugate, target, Mode::new(gamma_index, t)]))
            .collect();
        let tadpoles = tadpole_sums(
            phonons,
            coupling,
            gamma_index,
            &gamma,
            &active,
            &statistics,
            communicator,
        );

        Ok(Self {
            phonons,
            coupling,
            target,
            conjugate,
            frequency,
            z: Complex::new(frequency, broadening),
            statistics,
            conservation: tolerances.conservation,
            active,
            gamma_index,
            gamma,
            target_to_gamma,
            tadpoles,
        })
    }

    pub(crate) fn number_of_temperatures(&self) -> usize {
        self.statistics.len()
    }

    pub(crate) fn number_of_branches(&self) -> usize {
        self.phonons.number_of_branches()
    }

    pub(crate) fn negate(&self, k: usize) -> usize {
        self.phonons.negate(k)
    }

    pub(crate) fn v3(&self, modes: [Mode; 3]) -> Complex<f64> {
        self.coupling.v3(self.phonons, modes)
    }

    pub(crate) fn v4(&self, modes: [Mode; 4]) -> Complex<f64> {
        self.coupling.v4(self.phonons, modes)
    }

    /// Checks that the wavevectors in `kpoints` sum to a reciprocal lattice vector
    pub(crate) fn conserving(&self, kpoints: &[usize]) -> Result<(), SelfEnergyError> {
        let residual = self.phonons.grid().conservation_residual(kpoints);
        match residual > self.conservation {
            true => Err(SelfEnergyError::MomentumNotConserved {
                mode: self.target,
                kpoints: kpoints.to_vec(),
                residual,
            }),
            false => Ok(()),
        }
    }
}

/// Multiplies the diagram sums into self-energies on a grid of `number_of_kpoints` points
fn prefactors(number_of_kpoints: usize) -> [f64; NUMBER_OF_DIAGRAMS] {
    let n = number_of_kpoints as f64;
    let n2 = n * n;
    [
        -1. / (8. * n),
        1. / (8. * n),
        -1. / (96. * n2),
        -1. / (128. * n2),
        1. / (64. * n2),
        -1. / (64. * n2),
        -1. / (128. * n2),
        -1. / (128. * n2),
        -1. / (256. * n2),
        -1. / (256. * n2),
    ]
}

/// Evaluates all ten diagrams for the target of `context` at every temperature
pub(crate) fn four_phonon_self_energy<P: PhononStates, C: Communicator>(
    context: &DiagramContext<'_, P>,
    communicator: &C,
) -> Result<Vec<FourPhononDiagrams>, SelfEnergyError> {
    let number_of_kpoints = context.phonons.number_of_kpoints();
    let number_of_temperatures = context.number_of_temperatures();
    let empty = || vec![FourPhononDiagrams::default(); number_of_temperatures];

    let partial = communicator
        .partition(number_of_kpoints)
        .into_par_iter()
        .map(|k1| diagrams::accumulate(context, k1))
        .try_reduce(empty, |mut total, contribution| {
            total
                .iter_mut()
                .zip(contribution.into_iter())
                .for_each(|(sum, value)| *sum += value);
            Ok(total)
        });
    // A failed worker still enters the reduction, flagging the failure to the others
    let (partial, failure) = match partial {
        Ok(partial) => (partial, None),
        Err(error) => (empty(), Some(error)),
    };

    let mut flattened = partial
        .iter()
        .flat_map(|diagrams| diagrams.iter().flat_map(|value| [value.re, value.im]))
        .collect::<Vec<_>>();
    flattened.push(if failure.is_some() { 1. } else { 0. });
    let mut reduced = communicator.reduce_sum(flattened);
    if let Some(error) = failure {
        return Err(error);
    }
    if reduced.pop().unwrap_or_default() > 0. {
        return Err(SelfEnergyError::WorkerFailed);
    }

    let prefactors = prefactors(number_of_kpoints);
    Ok(reduced
        .chunks(2 * NUMBER_OF_DIAGRAMS)
        .map(|chunk| {
            let mut diagrams = FourPhononDiagrams::default();
            for (index, pair) in chunk.chunks(2).enumerate() {
                diagrams[index] = Complex::new(pair[0], pair[1]) * prefactors[index];
            }
            diagrams
        })
        .collect())
}
