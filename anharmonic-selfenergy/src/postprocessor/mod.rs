//! # Post-processing
//!
//! Converts self-energies into scattering rates and lifetimes and writes them to disk. Rates are
//! reported in cm^-1 and lifetimes in picoseconds.

mod writer;

pub use writer::{PostProcessor, PostProcessorBuilder};

use crate::constants::{in_kayser, TIME_RYDBERG};
use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum PostProcessorError {
    #[error("failed to write the results: {0}")]
    #[diagnostic(code(anharmonic::postprocessor::io))]
    Io(#[from] std::io::Error),
}

/// The scattering rate `2 Gamma` in cm^-1 of a mode with damping `Gamma` in Rydberg
pub fn scattering_rate(damping: f64) -> f64 {
    2. * in_kayser(damping)
}

/// The lifetime `1 / (2 Gamma)` in picoseconds of a mode with damping `Gamma` in Rydberg
///
/// Undamped modes have an infinite lifetime.
pub fn lifetime(damping: f64) -> f64 {
    match damping == 0. {
        true => f64::INFINITY,
        false => TIME_RYDBERG / (2. * damping) * 1e12,
    }
}

#[cfg(test)]
mod test {
    use super::{lifetime, scattering_rate};
    use crate::constants::{from_kayser, SPEED_OF_LIGHT};
    use approx::assert_relative_eq;

    #[test]
    fn rate_is_twice_the_damping() {
        let damping = from_kayser(1.5);
        assert_relative_eq!(scattering_rate(damping), 3., max_relative = 1e-12);
    }

    #[test]
    fn lifetime_and_rate_are_reciprocal() {
        // tau [ps] * rate [cm^-1] = 1e10 / (2 pi c) with c in m/s
        let expected = 1e10 / (2. * std::f64::consts::PI * SPEED_OF_LIGHT);
        for damping in [1e-7, 3.2e-6, 4e-5] {
            assert_relative_eq!(
                lifetime(damping) * scattering_rate(damping),
                expected,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn undamped_modes_live_forever() {
        assert!(lifetime(0.).is_infinite());
    }
}
