// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Coupling
//!
//! Reciprocal-space anharmonic coupling elements. For modes `(k_j, s_j)` the order-`N` element is
//!
//! ```text
//! V(1..N) = sum_entries Phi / sqrt(prod m) * exp(i sum_{j>0} r_j . k_j) * prod e(k_j, s_j)
//!           / sqrt(prod omega_j)
//! ```
//!
//! where `r_j` is the shortest periodic image of coordinate `j` measured from coordinate `0` of the
//! same entry. The mass factors and image vectors are fixed by the crystal, so they are computed once
//! in `AnharmonicCoupling::new` and each call only accumulates phases and eigenvector products.
//!
//! The phases are exact only when the k-grid is commensurate with the supercell, meaning every grid
//! dimension divides the matching supercell multiplicity.

use crate::{
    crystal::Crystal,
    error::BuildError,
    force_constants::{AnharmonicForceConstants, ForceConstantEntry},
    phonons::{Mode, PhononStates},
};
use nalgebra::Vector3;
use num_complex::Complex;
use std::f64::consts::PI;

#[derive(Clone, Debug)]
struct PreparedEntry<const N: usize> {
    /// Force constant divided by the square root of the product of the masses
    prefactor: f64,
    /// Offset of each coordinate in the eigenvectors
    offsets: [usize; N],
    /// `2 pi r_j` in primitive fractional coordinates, with the anchor at the origin
    images: [Vector3<f64>; N],
}

impl<const N: usize> PreparedEntry<N> {
    fn new(entry: &ForceConstantEntry<N>, crystal: &Crystal) -> Self {
        let anchor = entry.indices[0];
        let prefactor = entry.indices.iter().fold(entry.value, |product, index| {
            product * crystal.inverse_sqrt_mass(index.atom)
        });
        Self {
            prefactor,
            offsets: entry.indices.map(|index| index.polarisation_offset()),
            images: entry.indices.map(|index| {
                crystal.minimum_image((anchor.atom, anchor.cell), (index.atom, index.cell))
                    * (2. * PI)
            }),
        }
    }
}

/// Evaluates cubic and quartic coupling elements between phonon modes
#[derive(Clone, Debug)]
pub struct AnharmonicCoupling {
    cubic: Vec<PreparedEntry<3>>,
    quartic: Vec<PreparedEntry<4>>,
}

impl AnharmonicCoupling {
    #[tracing::instrument(name = "Coupling", level = "info", skip_all)]
    pub fn new(
        crystal: &Crystal,
        force_constants: &AnharmonicForceConstants,
    ) -> Result<Self, BuildError> {
        force_constants.validate(crystal)?;
        let cubic = force_constants
            .cubic
            .iter()
            .map(|entry| PreparedEntry::new(entry, crystal))
            .collect::<Vec<_>>();
        let quartic = force_constants
            .quartic
            .iter()
            .map(|entry| PreparedEntry::new(entry, crystal))
            .collect::<Vec<_>>();
        tracing::info!(
            "Prepared {} cubic and {} quartic force constants",
            cubic.len(),
            quartic.len()
        );
        Ok(Self { cubic, quartic })
    }

    pub fn number_of_cubic_entries(&self) -> usize {
        self.cubic.len()
    }

    pub fn number_of_quartic_entries(&self) -> usize {
        self.quartic.len()
    }

    /// The three-phonon coupling. None of the modes may have zero frequency.
    pub fn v3<P: PhononStates>(&self, phonons: &P, modes: [Mode; 3]) -> Complex<f64> {
        evaluate(&self.cubic, phonons, modes)
    }

    /// The four-phonon coupling. None of the modes may have zero frequency.
    pub fn v4<P: PhononStates>(&self, phonons: &P, modes: [Mode; 4]) -> Complex<f64> {
        evaluate(&self.quartic, phonons, modes)
    }
}

fn evaluate<P: PhononStates, const N: usize>(
    entries: &[PreparedEntry<N>],
    phonons: &P,
    modes: [Mode; N],
) -> Complex<f64> {
    let wavevectors = modes.map(|mode| *phonons.kpoint(mode.kpoint).fractional());
    let eigenvectors = modes.map(|mode| phonons.eigenvector(mode.kpoint, mode.branch));

    let sum = entries
        .iter()
        .fold(Complex::new(0., 0.), |sum, entry| {
            let phase = entry
                .images
                .iter()
                .zip(wavevectors.iter())
                .skip(1)
                .map(|(image, k)| image.dot(k))
                .sum::<f64>();
            let polarisation = entry
                .offsets
                .iter()
                .zip(eigenvectors.iter())
                .fold(Complex::new(entry.prefactor, 0.), |product, (&offset, e)| {
                    product * e[offset]
                });
            sum + polarisation * Complex::from_polar(1., phase)
        });

    let omega_product = modes
        .iter()
        .map(|&mode| phonons.mode_frequency(mode))
        .product::<f64>();
    sum / omega_product.sqrt()
}
