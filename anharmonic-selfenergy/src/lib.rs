// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Anharmonic phonon self-energies and lifetimes
//!
//! # Overview
//! The harmonic approximation gives every phonon an infinite lifetime. Cubic and quartic terms in the
//! expansion of the crystal energy in the atomic displacements couple the harmonic modes, shifting
//! their frequencies and giving them a finite linewidth. This crate evaluates the resulting
//! self-energy `Sigma = Delta + i Gamma` of individual modes from the harmonic phonon states and the
//! real-space anharmonic force constants.
//!
//! The lowest-order damping follows from the three-phonon bubble, whose energy-conserving delta
//! functions are represented either by a broadened kernel or by linear tetrahedron quadrature over
//! the Brillouin zone. With smearing the ten fourth-order diagrams can also be evaluated, giving both
//! the frequency shift and the four-phonon damping.
//!
//! Every Brillouin-zone sum is split over cooperating workers through the `Communicator` trait and,
//! within each worker, over the `rayon` thread pool.
//!
//! # Usage
//! The binary reads its settings from `.config/default.toml` and a system file holding the crystal,
//! the phonon states on a Monkhorst-Pack grid and the force constants:
//!
//! ```toml
//! [crystal]
//! lattice = [[0.0, 5.13, 5.13], [5.13, 0.0, 5.13], [5.13, 5.13, 0.0]]
//! supercell = [4, 4, 4]
//! positions = [[0.0, 0.0, 0.0]]
//! masses = [28.0855]
//!
//! [phonons]
//! grid = [4, 4, 4]
//! frequencies = [...]
//! eigenvectors = [...]
//!
//! [[cubic]]
//! value = 0.01
//! indices = [
//!     { atom = 0, cell = 0, component = 0 },
//!     { atom = 0, cell = 1, component = 0 },
//!     { atom = 0, cell = 1, component = 0 },
//! ]
//! ```
//!
//! Scattering rates and lifetimes of every requested mode are written to `<prefix>.mode_tau` in the
//! output directory.

#![allow(clippy::type_complexity)]

/// The command line application, configuration and tracing
pub mod app;

/// Physical constants
pub mod constants;

/// Cubic and quartic coupling elements in the phonon basis
pub mod coupling;

/// The crystal structure and the system file
pub mod crystal;

/// Error handling
pub mod error;

/// Real-space anharmonic force constants
pub mod force_constants;

/// Cooperation between workers
pub mod parallel;

/// Harmonic phonon states
pub mod phonons;

/// Scattering rates, lifetimes and output
pub mod postprocessor;

/// Three- and four-phonon self-energies
pub mod self_energy;

/// Delta-function representations
pub mod spectral;

/// Phonon occupations
pub mod thermodynamics;
