// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Phonons
//!
//! Harmonic phonon states on a uniform k-point grid. The frequencies and eigenvectors are computed
//! elsewhere and handed to this module; the self-energy code only ever reads them through the
//! `PhononStates` trait.
//!
//! ```ignore
//! let phonons = PhononModesBuilder::new()
//!     .with_grid(&grid)
//!     .with_frequencies(frequencies)
//!     .with_eigenvectors(eigenvectors)
//!     .build()?;
//! ```

use crate::error::BuildError;
use anharmonic_mesher::{KPoint, KPointGrid};
use nalgebra::Vector3;
use ndarray::{Array2, Array3, ArrayView1};
use num_complex::Complex;

/// A phonon mode, labelled by the flat index of its wavevector and its branch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mode {
    pub kpoint: usize,
    pub branch: usize,
}

impl Mode {
    pub fn new(kpoint: usize, branch: usize) -> Self {
        Self { kpoint, branch }
    }
}

/// Read access to the harmonic phonon states on a grid
pub trait PhononStates: Send + Sync {
    /// Frequency of branch `s` at `k` in Rydberg
    fn frequency(&self, k: usize, s: usize) -> f64;
    /// Normalised polarisation vector of branch `s` at `k`, with components ordered as
    /// `3 * atom + cartesian`
    fn eigenvector(&self, k: usize, s: usize) -> ArrayView1<'_, Complex<f64>>;
    fn grid(&self) -> &KPointGrid;
    fn number_of_branches(&self) -> usize;

    fn number_of_kpoints(&self) -> usize {
        self.grid().len()
    }
    fn negate(&self, k: usize) -> usize {
        self.grid().negate(k)
    }
    fn kpoint(&self, k: usize) -> &KPoint {
        self.grid().kpoint(k)
    }
    fn nearest_grid_index(&self, xk: &Vector3<f64>) -> Option<usize> {
        self.grid().nearest_grid_index(xk)
    }
    fn mode_frequency(&self, mode: Mode) -> f64 {
        self.frequency(mode.kpoint, mode.branch)
    }
}

/// Phonon frequencies and eigenvectors held in dense tables
#[derive(Clone, Debug)]
pub struct PhononModes {
    grid: KPointGrid,
    /// `[kpoint, branch]`
    frequencies: Array2<f64>,
    /// `[kpoint, branch, 3 * atom + component]`
    eigenvectors: Array3<Complex<f64>>,
}

impl PhononStates for PhononModes {
    fn frequency(&self, k: usize, s: usize) -> f64 {
        self.frequencies[[k, s]]
    }

    fn eigenvector(&self, k: usize, s: usize) -> ArrayView1<'_, Complex<f64>> {
        self.eigenvectors.slice(ndarray::s![k, s, ..])
    }

    fn grid(&self) -> &KPointGrid {
        &self.grid
    }

    fn number_of_branches(&self) -> usize {
        self.frequencies.ncols()
    }
}

/// Builder for `PhononModes`
pub struct PhononModesBuilder<RefGrid, Frequencies, Eigenvectors> {
    grid: RefGrid,
    frequencies: Frequencies,
    eigenvectors: Eigenvectors,
    hermiticity_tolerance: f64,
}

impl PhononModesBuilder<(), (), ()> {
    pub fn new() -> Self {
        Self {
            grid: (),
            frequencies: (),
            eigenvectors: (),
            hermiticity_tolerance: 1e-12,
        }
    }
}

impl Default for PhononModesBuilder<(), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefGrid, Frequencies, Eigenvectors> PhononModesBuilder<RefGrid, Frequencies, Eigenvectors> {
    pub fn with_grid(
        self,
        grid: &KPointGrid,
    ) -> PhononModesBuilder<&KPointGrid, Frequencies, Eigenvectors> {
        PhononModesBuilder {
            grid,
            frequencies: self.frequencies,
            eigenvectors: self.eigenvectors,
            hermiticity_tolerance: self.hermiticity_tolerance,
        }
    }

    pub fn with_frequencies(
        self,
        frequencies: Array2<f64>,
    ) -> PhononModesBuilder<RefGrid, Array2<f64>, Eigenvectors> {
        PhononModesBuilder {
            grid: self.grid,
            frequencies,
            eigenvectors: self.eigenvectors,
            hermiticity_tolerance: self.hermiticity_tolerance,
        }
    }

    pub fn with_eigenvectors(
        self,
        eigenvectors: Array3<Complex<f64>>,
    ) -> PhononModesBuilder<RefGrid, Frequencies, Array3<Complex<f64>>> {
        PhononModesBuilder {
            grid: self.grid,
            frequencies: self.frequencies,
            eigenvectors,
            hermiticity_tolerance: self.hermiticity_tolerance,
        }
    }

    /// Residual `|e(-k) - conj(e(k))|` above which a warning is emitted
    pub fn with_hermiticity_tolerance(mut self, tolerance: f64) -> Self {
        self.hermiticity_tolerance = tolerance;
        self
    }
}

impl<'a> PhononModesBuilder<&'a KPointGrid, Array2<f64>, Array3<Complex<f64>>> {
    /// Checks the tables against the grid and imposes `e(-k, s) = conj(e(k, s))`
    ///
    /// For each pair `(k, -k)` the eigenvectors at the lower index are kept and those at the higher
    /// index replaced by their conjugates.
    #[tracing::instrument(name = "Phonon builder", level = "info", skip(self))]
    pub fn build(self) -> Result<PhononModes, BuildError> {
        let number_of_kpoints = self.grid.len();
        let (rows, number_of_branches) = self.frequencies.dim();
        if rows != number_of_kpoints {
            return Err(BuildError::GridMismatch(format!(
                "{} frequency rows were supplied for a grid of {} points",
                rows, number_of_kpoints
            )));
        }
        if self.eigenvectors.dim() != (number_of_kpoints, number_of_branches, number_of_branches) {
            return Err(BuildError::GridMismatch(format!(
                "eigenvector table has shape {:?}, expected {:?}",
                self.eigenvectors.dim(),
                (number_of_kpoints, number_of_branches, number_of_branches)
            )));
        }
        if number_of_branches == 0 || number_of_branches % 3 != 0 {
            return Err(BuildError::GridMismatch(format!(
                "the number of branches must be a positive multiple of three, got {}",
                number_of_branches
            )));
        }

        let mut eigenvectors = self.eigenvectors;
        let mut worst_residual = 0_f64;
        for k in 0..number_of_kpoints {
            let minus_k = self.grid.negate(k);
            if minus_k <= k {
                continue;
            }
            for s in 0..number_of_branches {
                for i in 0..number_of_branches {
                    let expected = eigenvectors[[k, s, i]].conj();
                    let residual = (eigenvectors[[minus_k, s, i]] - expected).norm();
                    worst_residual = worst_residual.max(residual);
                    eigenvectors[[minus_k, s, i]] = expected;
                }
            }
        }
        if worst_residual > self.hermiticity_tolerance {
            tracing::warn!(
                "Eigenvectors at -k differ from the conjugates at k by up to {:.3e}, using conjugates",
                worst_residual
            );
        }

        Ok(PhononModes {
            grid: self.grid.clone(),
            frequencies: self.frequencies,
            eigenvectors,
        })
    }
}
