use super::Crystal;
use crate::{
    constants::AMU_TO_RYDBERG_MASS,
    error::BuildError,
    force_constants::{AnharmonicForceConstants, RawForceConstant},
    phonons::{PhononModes, PhononModesBuilder},
};
use anharmonic_mesher::KPointGrid;
use color_eyre::eyre::eyre;
use config::{Config, File};
use nalgebra::Vector3;
use ndarray::{Array2, Array3};
use num_complex::Complex;
use serde::Deserialize;
use std::path::PathBuf;

/// The full description of a system as read from disk
#[derive(Debug, Deserialize)]
pub struct SystemFile {
    pub(crate) crystal: CrystalFile,
    pub(crate) phonons: PhononFile,
    #[serde(default)]
    pub(crate) cubic: Vec<RawForceConstant>,
    #[serde(default)]
    pub(crate) quartic: Vec<RawForceConstant>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CrystalFile {
    /// Rows are the primitive lattice vectors in Bohr
    pub(crate) lattice: [[f64; 3]; 3],
    pub(crate) supercell: [usize; 3],
    pub(crate) positions: Vec<[f64; 3]>,
    /// Masses in atomic mass units
    pub(crate) masses: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhononFile {
    pub(crate) grid: [usize; 3],
    /// Frequencies in Rydberg, indexed as `[kpoint][branch]`
    pub(crate) frequencies: Vec<Vec<f64>>,
    /// Eigenvectors as `[re, im]` pairs, indexed as `[kpoint][branch][3 * atom + component]`
    pub(crate) eigenvectors: Vec<Vec<Vec<[f64; 2]>>>,
}

impl SystemFile {
    pub fn build(path: PathBuf) -> color_eyre::Result<Self> {
        let s = Config::builder().add_source(File::from(path)).build()?;
        s.try_deserialize()
            .map_err(|e| eyre!("Failed to deserialize system: {:?}", e))
    }

    pub fn crystal(&self) -> Result<Crystal, BuildError> {
        Crystal::new(
            self.crystal.lattice,
            self.crystal.supercell,
            self.crystal
                .positions
                .iter()
                .map(|&[x, y, z]| Vector3::new(x, y, z))
                .collect(),
            self.crystal
                .masses
                .iter()
                .map(|mass| mass * AMU_TO_RYDBERG_MASS)
                .collect(),
        )
    }

    pub fn grid(&self) -> Result<KPointGrid, BuildError> {
        Ok(anharmonic_mesher::create_monkhorst_pack_grid(
            self.phonons.grid,
        )?)
    }

    /// Assembles the phonon states on `grid`, checking every table has the shape the grid and the
    /// crystal require
    pub fn phonons(
        &self,
        grid: &KPointGrid,
        crystal: &Crystal,
        hermiticity_tolerance: f64,
    ) -> Result<PhononModes, BuildError> {
        let number_of_kpoints = self.phonons.frequencies.len();
        let number_of_branches = crystal.number_of_branches();
        if number_of_kpoints != grid.len() || self.phonons.eigenvectors.len() != grid.len() {
            return Err(BuildError::GridMismatch(format!(
                "the phonon tables hold {} frequency and {} eigenvector rows for a grid of {} points",
                number_of_kpoints,
                self.phonons.eigenvectors.len(),
                grid.len()
            )));
        }

        let mut frequencies = Array2::zeros((number_of_kpoints, number_of_branches));
        let mut eigenvectors = Array3::zeros((
            number_of_kpoints,
            number_of_branches,
            number_of_branches,
        ));
        for (k, (row, vectors)) in self
            .phonons
            .frequencies
            .iter()
            .zip(self.phonons.eigenvectors.iter())
            .enumerate()
        {
            if row.len() != number_of_branches || vectors.len() != number_of_branches {
                return Err(BuildError::GridMismatch(format!(
                    "k-point {} carries {} frequencies and {} eigenvectors, expected {}",
                    k,
                    row.len(),
                    vectors.len(),
                    number_of_branches
                )));
            }
            for (s, (&omega, vector)) in row.iter().zip(vectors.iter()).enumerate() {
                if vector.len() != number_of_branches {
                    return Err(BuildError::GridMismatch(format!(
                        "eigenvector ({}, {}) has {} components, expected {}",
                        k,
                        s,
                        vector.len(),
                        number_of_branches
                    )));
                }
                frequencies[[k, s]] = omega;
                for (i, &[re, im]) in vector.iter().enumerate() {
                    eigenvectors[[k, s, i]] = Complex::new(re, im);
                }
            }
        }

        PhononModesBuilder::new()
            .with_grid(grid)
            .with_frequencies(frequencies)
            .with_eigenvectors(eigenvectors)
            .with_hermiticity_tolerance(hermiticity_tolerance)
            .build()
    }

    pub fn force_constants(&self, crystal: &Crystal) -> Result<AnharmonicForceConstants, BuildError> {
        AnharmonicForceConstants::from_raw(&self.cubic, &self.quartic, crystal)
    }
}
