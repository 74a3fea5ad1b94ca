// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Constants
//!
//! Defines physical constants and unit conversions. Internally energies are held in Rydberg,
//! lengths in Bohr and masses in units where the Rydberg atomic unit of mass is one.

pub const BOLTZMANN: f64 = 1.380_648_8e-23; // The Boltzmann constant in J / K
pub const RYDBERG: f64 = 4.359_743_94e-18 / 2.; // One Rydberg in J
pub const PLANCK: f64 = 6.626_069_57e-34; // Planck constant in J s
pub const SPEED_OF_LIGHT: f64 = 2.997_924_58e8; // Speed of light in m / s
pub const AMU_TO_RYDBERG_MASS: f64 = 911.444_243_108_656_45; // Atomic mass unit in Rydberg mass units

/// Converts a temperature in Kelvin to an energy in Rydberg
pub const KELVIN_TO_RYDBERG: f64 = BOLTZMANN / RYDBERG;
/// The Rydberg unit of time, hbar / Ry, in seconds
pub const TIME_RYDBERG: f64 = PLANCK / (2. * std::f64::consts::PI * RYDBERG);
/// Converts an angular frequency in Hz to a wavenumber in cm^-1
pub const HZ_TO_KAYSER: f64 = 1.0e-2 / (2. * std::f64::consts::PI * SPEED_OF_LIGHT);

/// Converts a frequency in Rydberg to cm^-1
pub fn in_kayser(omega: f64) -> f64 {
    omega / TIME_RYDBERG * HZ_TO_KAYSER
}

/// Converts a wavenumber in cm^-1 to Rydberg
pub fn from_kayser(wavenumber: f64) -> f64 {
    wavenumber * TIME_RYDBERG / HZ_TO_KAYSER
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    #[test]
    fn kayser_conversion_round_trips() {
        let omega = 0.0023;
        assert_relative_eq!(super::from_kayser(super::in_kayser(omega)), omega);
    }

    #[test]
    fn one_rydberg_is_about_109737_wavenumbers() {
        assert_relative_eq!(super::in_kayser(1.), 109_737.3, max_relative = 1e-4);
    }
}
