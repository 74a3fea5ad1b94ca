//! Synthetic systems shared by the integration tests and the benches

use anharmonic_mesher::{create_monkhorst_pack_grid, KPointGrid};
use anharmonic_selfenergy::{
    constants::AMU_TO_RYDBERG_MASS,
    crystal::Crystal,
    force_constants::{AnharmonicForceConstants, AtomIndex, ForceConstantEntry},
    phonons::{PhononModes, PhononModesBuilder},
};
use itertools::Itertools;
use nalgebra::Vector3;
use ndarray::{Array2, Array3};
use num_complex::Complex;
use rand::Rng;
use std::{collections::HashMap, f64::consts::PI};

/// Lattice constant of the synthetic cubic crystals in Bohr
pub const LATTICE_CONSTANT: f64 = 10.26;

/// A crystal, its phonon states and force constants
pub struct System {
    pub crystal: Crystal,
    pub grid: KPointGrid,
    pub phonons: PhononModes,
    pub force_constants: AnharmonicForceConstants,
}

/// Parameters of the nearest-neighbour bond model
///
/// Each Cartesian displacement component couples only along the bonds parallel to it, with
/// potential `sum_bonds phi_3 / 6 (u_{l+1} - u_l)^3 + phi_4 / 24 (u_{l+1} - u_l)^4`. The branch
/// frequencies are `omega_s(k) = scale * (offset + 0.1 s + cos(2 pi k_s))`, where `k_s` is the
/// fractional wavevector along axis `s`.
#[derive(Clone, Copy, Debug)]
pub struct BondModel {
    pub cubic: f64,
    pub quartic: f64,
    /// Mass in amu
    pub mass: f64,
    /// Frequency scale in Rydberg
    pub scale: f64,
    pub offset: f64,
}

impl Default for BondModel {
    fn default() -> Self {
        Self {
            cubic: 0.05,
            quartic: 0.02,
            mass: 28.0855,
            scale: 0.002,
            offset: 1.2,
        }
    }
}

impl BondModel {
    pub fn frequency(&self, xk: &Vector3<f64>, branch: usize) -> f64 {
        self.scale * (self.offset + 0.1 * branch as f64 + (2. * PI * xk[branch]).cos())
    }

    /// Closed form of `V3` for three modes whose wavevectors sum to a reciprocal lattice vector
    pub fn v3(&self, kpoints: [&Vector3<f64>; 3], branches: [usize; 3]) -> Complex<f64> {
        self.coupling(self.cubic, &kpoints, &branches)
    }

    /// Closed form of `V4` for four modes whose wavevectors sum to a reciprocal lattice vector
    pub fn v4(&self, kpoints: [&Vector3<f64>; 4], branches: [usize; 4]) -> Complex<f64> {
        self.coupling(self.quartic, &kpoints, &branches)
    }

    fn coupling(&self, value: f64, kpoints: &[&Vector3<f64>], branches: &[usize]) -> Complex<f64> {
        let branch = branches[0];
        if branches.iter().any(|&s| s != branch) {
            return Complex::new(0., 0.);
        }
        let mass = self.mass * AMU_TO_RYDBERG_MASS;
        let numerator = kpoints.iter().fold(
            Complex::new(value * mass.powf(-(kpoints.len() as f64) / 2.), 0.),
            |product, xk| product * (Complex::from_polar(1., 2. * PI * xk[branch]) - 1.),
        );
        let omega_product = kpoints
            .iter()
            .map(|xk| self.frequency(xk, branch))
            .product::<f64>();
        numerator / omega_product.sqrt()
    }

    /// A one-atom simple cubic crystal on a `dimensions` grid, with a supercell of the same size
    pub fn system(&self, dimensions: [usize; 3]) -> System {
        let crystal = Crystal::new(
            cubic_lattice(),
            dimensions,
            vec![Vector3::zeros()],
            vec![self.mass * AMU_TO_RYDBERG_MASS],
        )
        .unwrap();
        let grid = create_monkhorst_pack_grid(dimensions).unwrap();

        let mut frequencies = Array2::zeros((grid.len(), 3));
        let mut eigenvectors = Array3::zeros((grid.len(), 3, 3));
        for (k, point) in grid.points().iter().enumerate() {
            for s in 0..3 {
                frequencies[[k, s]] = self.frequency(point.fractional(), s);
                eigenvectors[[k, s, s]] = Complex::new(1., 0.);
            }
        }
        let phonons = PhononModesBuilder::new()
            .with_grid(&grid)
            .with_frequencies(frequencies)
            .with_eigenvectors(eigenvectors)
            .build()
            .unwrap();

        let force_constants = AnharmonicForceConstants {
            cubic: bond_entries::<3>(self.cubic, dimensions),
            quartic: bond_entries::<4>(self.quartic, dimensions),
        };
        System {
            crystal,
            grid,
            phonons,
            force_constants,
        }
    }
}

fn cubic_lattice() -> [[f64; 3]; 3] {
    [
        [LATTICE_CONSTANT, 0., 0.],
        [0., LATTICE_CONSTANT, 0.],
        [0., 0., LATTICE_CONSTANT],
    ]
}

/// Flat supercell index of an integer cell offset
fn cell_index(offset: [i64; 3], dimensions: [usize; 3]) -> usize {
    let wrapped = [0, 1, 2].map(|axis| offset[axis].rem_euclid(dimensions[axis] as i64) as usize);
    (wrapped[0] * dimensions[1] + wrapped[1]) * dimensions[2] + wrapped[2]
}

/// The order-`N` derivatives of the bond potential with the first coordinate in cell zero
fn bond_entries<const N: usize>(value: f64, dimensions: [usize; 3]) -> Vec<ForceConstantEntry<N>> {
    let mut tensor: HashMap<[(usize, usize); N], f64> = HashMap::new();
    for axis in 0..3 {
        let mut step = [0_i64; 3];
        step[axis] = 1;
        let backward = step.map(|x| -x);
        // The two bonds holding the atom in cell zero, as (cell offset, sign) at each end
        for bond in [[(backward, -1.), ([0; 3], 1.)], [([0; 3], -1.), (step, 1.)]] {
            let anchor_sign = bond
                .iter()
                .find(|(offset, _)| *offset == [0; 3])
                .map(|&(_, sign)| sign)
                .unwrap();
            for others in (1..N).map(|_| bond.iter()).multi_cartesian_product() {
                let sign = others.iter().fold(anchor_sign, |product, (_, s)| product * s);
                let mut key = [(0, axis); N];
                for (slot, (offset, _)) in key.iter_mut().skip(1).zip(others.iter()) {
                    *slot = (cell_index(*offset, dimensions), axis);
                }
                *tensor.entry(key).or_default() += value * sign;
            }
        }
    }
    collect_entries(tensor, 1e-14 * value.abs())
}

fn collect_entries<const N: usize>(
    tensor: HashMap<[(usize, usize); N], f64>,
    threshold: f64,
) -> Vec<ForceConstantEntry<N>> {
    tensor
        .into_iter()
        .filter(|(_, value)| value.abs() > threshold)
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|(key, value)| ForceConstantEntry {
            value,
            indices: key.map(|(cell, flat)| AtomIndex::new(flat / 3, cell, flat % 3)),
        })
        .collect()
}

/// A fully permutation-symmetric, translation-invariant random tensor of order `N`
///
/// Each of `count` seeds couples random coordinates within the nearest cells. Every permutation of
/// every seed is translated so that its first coordinate sits in cell zero.
pub fn random_symmetric_entries<R: Rng, const N: usize>(
    rng: &mut R,
    number_of_atoms: usize,
    dimensions: [usize; 3],
    count: usize,
) -> Vec<ForceConstantEntry<N>> {
    let mut tensor: HashMap<[(usize, usize); N], f64> = HashMap::new();
    for _ in 0..count {
        let value = rng.gen_range(-0.1..0.1);
        let seed: [([i64; 3], usize); N] = [(); N].map(|_| {
            (
                [(); 3].map(|_| rng.gen_range(-1..=1)),
                3 * rng.gen_range(0..number_of_atoms) + rng.gen_range(0..3),
            )
        });
        for permutation in seed.iter().permutations(N) {
            let origin = permutation[0].0;
            let mut key = [(0, 0); N];
            for (slot, (offset, flat)) in key.iter_mut().zip(permutation.iter()) {
                let relative = [0, 1, 2].map(|axis| offset[axis] - origin[axis]);
                *slot = (cell_index(relative, dimensions), *flat);
            }
            *tensor.entry(key).or_default() += value;
        }
    }
    collect_entries(tensor, 0.)
}

/// Random normalised eigenvectors obeying `e(-k) = conj(e(k))`, real at self-conjugate points
pub fn random_eigenvectors<R: Rng>(
    rng: &mut R,
    grid: &KPointGrid,
    number_of_branches: usize,
) -> Array3<Complex<f64>> {
    let mut eigenvectors = Array3::zeros((grid.len(), number_of_branches, number_of_branches));
    for k in 0..grid.len() {
        let minus_k = grid.negate(k);
        if minus_k < k {
            continue;
        }
        for s in 0..number_of_branches {
            let mut vector = (0..number_of_branches)
                .map(|_| {
                    let imaginary = match minus_k == k {
                        true => 0.,
                        false => rng.gen_range(-1.0..1.0),
                    };
                    Complex::new(rng.gen_range(-1.0..1.0), imaginary)
                })
                .collect::<Vec<_>>();
            let norm = vector.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
            vector.iter_mut().for_each(|c| *c /= norm);
            for (i, c) in vector.into_iter().enumerate() {
                eigenvectors[[k, s, i]] = c;
                eigenvectors[[minus_k, s, i]] = c.conj();
            }
        }
    }
    eigenvectors
}

/// Random frequencies in Rydberg between `minimum` and `maximum`, equal at `k` and `-k`
pub fn random_frequencies<R: Rng>(
    rng: &mut R,
    grid: &KPointGrid,
    number_of_branches: usize,
    minimum: f64,
    maximum: f64,
) -> Array2<f64> {
    let mut frequencies = Array2::zeros((grid.len(), number_of_branches));
    for k in 0..grid.len() {
        let minus_k = grid.negate(k);
        if minus_k < k {
            continue;
        }
        for s in 0..number_of_branches {
            let omega = rng.gen_range(minimum..maximum);
            frequencies[[k, s]] = omega;
            frequencies[[minus_k, s]] = omega;
        }
    }
    frequencies
}

/// A crystal with random phonon states and random symmetric force constants
///
/// The atoms sit at `(0, 0, 0)` and `(1/4, 1/4, 1/4)` of a cubic cell, and the supercell matches
/// the grid.
pub fn random_system<R: Rng>(
    rng: &mut R,
    number_of_atoms: usize,
    dimensions: [usize; 3],
    number_of_seeds: usize,
) -> System {
    let positions = [Vector3::zeros(), Vector3::new(0.25, 0.25, 0.25)];
    let crystal = Crystal::new(
        cubic_lattice(),
        dimensions,
        positions[..number_of_atoms].to_vec(),
        vec![28.0855 * AMU_TO_RYDBERG_MASS; number_of_atoms],
    )
    .unwrap();
    let grid = create_monkhorst_pack_grid(dimensions).unwrap();
    let number_of_branches = 3 * number_of_atoms;
    let phonons = PhononModesBuilder::new()
        .with_grid(&grid)
        .with_frequencies(random_frequencies(
            rng,
            &grid,
            number_of_branches,
            0.001,
            0.004,
        ))
        .with_eigenvectors(random_eigenvectors(rng, &grid, number_of_branches))
        .build()
        .unwrap();
    let force_constants = AnharmonicForceConstants {
        cubic: random_symmetric_entries::<_, 3>(rng, number_of_atoms, dimensions, number_of_seeds),
        quartic: random_symmetric_entries::<_, 4>(rng, number_of_atoms, dimensions, number_of_seeds),
    };
    System {
        crystal,
        grid,
        phonons,
        force_constants,
    }
}
