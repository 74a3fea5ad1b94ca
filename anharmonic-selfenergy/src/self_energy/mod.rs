// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Self-energy
//!
//! The anharmonic self-energy `Sigma(omega) = Delta(omega) + i Gamma(omega)` of individual phonon
//! modes. The anharmonic frequency is `omega - Delta` and `Gamma` is the half linewidth, so the
//! scattering rate is `2 Gamma`.
//!
//! A `SelfEnergyEngine` is built once per calculation from the phonon states and the coupling
//! elements, and then queried mode by mode:
//!
//! ```ignore
//! let engine = SelfEnergyEngineBuilder::new()
//!     .with_phonons(&phonons)
//!     .with_coupling(&coupling)
//!     .with_method(Method::Smearing(DeltaFunction::Lorentzian(width)))
//!     .build()?;
//! let result = engine.calculate(mode, &temperatures, &SingleProcess)?;
//! ```
//!
//! Every sum over the Brillouin zone is split across the workers of a `Communicator` and reduced
//! before it is returned, so each worker receives the complete result.

pub(crate) mod four_phonon;
mod temperature;
mod three_phonon;

pub use four_phonon::{FourPhononDiagrams, DIAGRAM_LABELS, NUMBER_OF_DIAGRAMS};
pub use temperature::TemperatureGrid;

use crate::{
    coupling::AnharmonicCoupling,
    parallel::Communicator,
    phonons::{Mode, PhononStates},
    spectral::{DeltaFunction, IsosurfaceIntegrator, LinearTetrahedron},
    thermodynamics::Occupation,
};
use miette::Diagnostic;
use num_complex::Complex;
use serde::Deserialize;

#[derive(thiserror::Error, Debug, Diagnostic)]
/// Failures during the evaluation of a self-energy. All of them abort the calculation.
pub enum SelfEnergyError {
    #[error(
        "momentum is not conserved for mode {mode:?}: k-points {kpoints:?} leave a residual of {residual:e}"
    )]
    #[diagnostic(code(anharmonic::self_energy::momentum))]
    MomentumNotConserved {
        mode: Mode,
        kpoints: Vec<usize>,
        residual: f64,
    },
    #[error("unsupported configuration: {0}")]
    #[diagnostic(code(anharmonic::self_energy::unsupported))]
    UnsupportedConfiguration(String),
    #[error("the k-point grid does not contain the zone centre")]
    #[diagnostic(code(anharmonic::self_energy::gamma))]
    MissingGamma,
    #[error("the integrator samples {found} points but the grid holds {expected}")]
    #[diagnostic(code(anharmonic::self_energy::integrator))]
    IntegratorMismatch { expected: usize, found: usize },
    #[error("another worker aborted the calculation")]
    #[diagnostic(code(anharmonic::self_energy::worker))]
    WorkerFailed,
}

/// Thresholds used throughout the calculation
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tolerances {
    /// Modes with frequencies below this, in Rydberg, are excluded
    pub frequency: f64,
    /// Poles closer than this, in Rydberg, are treated as degenerate
    pub degeneracy: f64,
    /// Largest acceptable residual of a momentum-conservation check
    pub conservation: f64,
    /// Largest acceptable deviation of the eigenvectors from time-reversal symmetry
    pub hermiticity: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            frequency: 1e-8,
            degeneracy: 1e-8,
            conservation: 1e-15,
            hermiticity: 1e-12,
        }
    }
}

/// How the energy-conserving delta function is represented
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Method {
    /// Summation over the grid with a broadened kernel
    Smearing(DeltaFunction),
    /// Linear tetrahedron quadrature
    Tetrahedron,
}

enum Integration<'a> {
    Smearing(DeltaFunction),
    Tetrahedron(Box<dyn IsosurfaceIntegrator + 'a>),
}

/// The self-energy of a single mode over a temperature grid
#[derive(Clone, Debug)]
pub struct ModeSelfEnergy {
    pub mode: Mode,
    /// Harmonic frequency in Rydberg
    pub frequency: f64,
    pub temperatures: Vec<f64>,
    /// Three-phonon damping `Gamma` in Rydberg at each temperature
    pub damping: Vec<f64>,
    /// The complex three-phonon bubble at each temperature
    pub bubble: Option<Vec<Complex<f64>>>,
    /// The fourth-order diagrams at each temperature
    pub four_phonon: Option<Vec<FourPhononDiagrams>>,
}

impl ModeSelfEnergy {
    /// The damping from the fourth-order diagrams
    pub fn four_phonon_damping(&self) -> Option<Vec<f64>> {
        self.four_phonon
            .as_ref()
            .map(|diagrams| diagrams.iter().map(|d| d.total().im).collect())
    }
}

/// Computes phonon self-energies from a fixed set of phonon states and couplings
pub struct SelfEnergyEngine<'a, P> {
    phonons: &'a P,
    coupling: &'a AnharmonicCoupling,
    integration: Integration<'a>,
    occupation: Occupation,
    tolerances: Tolerances,
    four_phonon: bool,
}

/// Builder for a `SelfEnergyEngine`
pub struct SelfEnergyEngineBuilder<'a, RefPhonons, RefCoupling, M> {
    phonons: RefPhonons,
    coupling: RefCoupling,
    method: M,
    integrator: Option<Box<dyn IsosurfaceIntegrator + 'a>>,
    occupation: Occupation,
    tolerances: Tolerances,
    four_phonon: bool,
}

impl<'a> SelfEnergyEngineBuilder<'a, (), (), ()> {
    pub fn new() -> Self {
        Self {
            phonons: (),
            coupling: (),
            method: (),
            integrator: None,
            occupation: Occupation::Quantum,
            tolerances: Tolerances::default(),
            four_phonon: false,
        }
    }
}

impl<'a> Default for SelfEnergyEngineBuilder<'a, (), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, RefPhonons, RefCoupling, M> SelfEnergyEngineBuilder<'a, RefPhonons, RefCoupling, M> {
    pub fn with_phonons<P: PhononStates>(
        self,
        phonons: &'a P,
    ) -> SelfEnergyEngineBuilder<'a, &'a P, RefCoupling, M> {
        SelfEnergyEngineBuilder {
            phonons,
            coupling: self.coupling,
            method: self.method,
            integrator: self.integrator,
            occupation: self.occupation,
            tolerances: self.tolerances,
            four_phonon: self.four_phonon,
        }
    }

    pub fn with_coupling(
        self,
        coupling: &'a AnharmonicCoupling,
    ) -> SelfEnergyEngineBuilder<'a, RefPhonons, &'a AnharmonicCoupling, M> {
        SelfEnergyEngineBuilder {
            phonons: self.phonons,
            coupling,
            method: self.method,
            integrator: self.integrator,
            occupation: self.occupation,
            tolerances: self.tolerances,
            four_phonon: self.four_phonon,
        }
    }

    pub fn with_method(
        self,
        method: Method,
    ) -> SelfEnergyEngineBuilder<'a, RefPhonons, RefCoupling, Method> {
        SelfEnergyEngineBuilder {
            phonons: self.phonons,
            coupling: self.coupling,
            method,
            integrator: self.integrator,
            occupation: self.occupation,
            tolerances: self.tolerances,
            four_phonon: self.four_phonon,
        }
    }

    /// Replaces the linear tetrahedron integrator otherwise built from the phonon grid
    pub fn with_integrator(mut self, integrator: Box<dyn IsosurfaceIntegrator + 'a>) -> Self {
        self.integrator = Some(integrator);
        self
    }

    pub fn with_occupation(mut self, occupation: Occupation) -> Self {
        self.occupation = occupation;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Enables the fourth-order diagrams and the complex bubble
    pub fn with_four_phonon(mut self, four_phonon: bool) -> Self {
        self.four_phonon = four_phonon;
        self
    }
}

impl<'a, P: PhononStates> SelfEnergyEngineBuilder<'a, &'a P, &'a AnharmonicCoupling, Method> {
    #[tracing::instrument(name = "Self-energy engine builder", level = "info", skip(self))]
    pub fn build(self) -> Result<SelfEnergyEngine<'a, P>, SelfEnergyError> {
        let integration = match self.method {
            Method::Smearing(kernel) => {
                if kernel.width() <= 0. {
                    return Err(SelfEnergyError::UnsupportedConfiguration(format!(
                        "the smearing width must be positive, got {}",
                        kernel.width()
                    )));
                }
                Integration::Smearing(kernel)
            }
            Method::Tetrahedron => {
                if self.four_phonon {
                    return Err(SelfEnergyError::UnsupportedConfiguration(
                        "the fourth-order diagrams require a smearing method".into(),
                    ));
                }
                let integrator = self
                    .integrator
                    .unwrap_or_else(|| Box::new(LinearTetrahedron::new(self.phonons.grid())));
                if integrator.number_of_points() != self.phonons.number_of_kpoints() {
                    return Err(SelfEnergyError::IntegratorMismatch {
                        expected: self.phonons.number_of_kpoints(),
                        found: integrator.number_of_points(),
                    });
                }
                Integration::Tetrahedron(integrator)
            }
        };
        if self.four_phonon
            && self
                .phonons
                .nearest_grid_index(&nalgebra::Vector3::zeros())
                .is_none()
        {
            return Err(SelfEnergyError::MissingGamma);
        }

        Ok(SelfEnergyEngine {
            phonons: self.phonons,
            coupling: self.coupling,
            integration,
            occupation: self.occupation,
            tolerances: self.tolerances,
            four_phonon: self.four_phonon,
        })
    }
}

impl<'a, P: PhononStates> SelfEnergyEngine<'a, P> {
    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    pub fn four_phonon_enabled(&self) -> bool {
        self.four_phonon
    }

    /// Every enabled contribution to the self-energy of `mode`
    ///
    /// Returns `None` for modes whose frequency is below the frequency tolerance.
    #[tracing::instrument(name = "Mode", level = "debug", skip(self, temperatures, communicator))]
    pub fn calculate<C: Communicator>(
        &self,
        mode: Mode,
        temperatures: &TemperatureGrid,
        communicator: &C,
    ) -> Result<Option<ModeSelfEnergy>, SelfEnergyError> {
        let frequency = self.phonons.mode_frequency(mode);
        if frequency < self.tolerances.frequency {
            tracing::warn!(
                "Skipping mode {:?} with frequency {:.3e} Ry below the frequency tolerance",
                mode,
                frequency
            );
            return Ok(None);
        }
        let temperatures = temperatures.temperatures();
        let damping = self.three_phonon_damping(mode, &temperatures, communicator)?;
        let (bubble, four_phonon) = match self.four_phonon {
            true => (
                Some(self.bubble_self_energy(mode, &temperatures, communicator)?),
                Some(self.four_phonon_self_energy(mode, &temperatures, communicator)?),
            ),
            false => (None, None),
        };
        Ok(Some(ModeSelfEnergy {
            mode,
            frequency,
            temperatures,
            damping,
            bubble,
            four_phonon,
        }))
    }

    /// The three-phonon damping `Gamma` of `mode` at each temperature, in Rydberg
    pub fn three_phonon_damping<C: Communicator>(
        &self,
        mode: Mode,
        temperatures: &[f64],
        communicator: &C,
    ) -> Result<Vec<f64>, SelfEnergyError> {
        match &self.integration {
            Integration::Smearing(kernel) => {
                let triplets = three_phonon::collect_triplets(
                    self.phonons,
                    self.coupling,
                    mode,
                    &self.tolerances,
                    communicator,
                )?;
                Ok(three_phonon::smeared_damping(
                    &triplets,
                    kernel,
                    self.occupation,
                    self.phonons.mode_frequency(mode),
                    temperatures,
                    self.phonons.number_of_kpoints(),
                    communicator,
                ))
            }
            Integration::Tetrahedron(integrator) => three_phonon::tetrahedron_damping(
                self.phonons,
                self.coupling,
                integrator.as_ref(),
                self.occupation,
                &self.tolerances,
                mode,
                temperatures,
                communicator,
            ),
        }
    }

    /// The complex three-phonon bubble of `mode`, evaluated at `omega + i eps` with `eps` the
    /// smearing width
    pub fn bubble_self_energy<C: Communicator>(
        &self,
        mode: Mode,
        temperatures: &[f64],
        communicator: &C,
    ) -> Result<Vec<Complex<f64>>, SelfEnergyError> {
        let broadening = self.broadening()?;
        let triplets = three_phonon::collect_triplets(
            self.phonons,
            self.coupling,
            mode,
            &self.tolerances,
            communicator,
        )?;
        Ok(three_phonon::bubble(
            &triplets,
            self.occupation,
            Complex::new(self.phonons.mode_frequency(mode), broadening),
            temperatures,
            self.phonons.number_of_kpoints(),
            communicator,
        ))
    }

    /// The ten fourth-order diagrams of `mode` at each temperature
    pub fn four_phonon_self_energy<C: Communicator>(
        &self,
        mode: Mode,
        temperatures: &[f64],
        communicator: &C,
    ) -> Result<Vec<FourPhononDiagrams>, SelfEnergyError> {
        let context = four_phonon::DiagramContext::new(
            self.phonons,
            self.coupling,
            mode,
            temperatures,
            self.occupation,
            &self.tolerances,
            self.broadening()?,
            communicator,
        )?;
        four_phonon::four_phonon_self_energy(&context, communicator)
    }

    fn broadening(&self) -> Result<f64, SelfEnergyError> {
        match &self.integration {
            Integration::Smearing(kernel) => Ok(kernel.width()),
            Integration::Tetrahedron(_) => Err(SelfEnergyError::UnsupportedConfiguration(
                "complex self-energies require a smearing method".into(),
            )),
        }
    }
}
