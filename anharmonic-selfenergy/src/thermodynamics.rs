//! Phonon occupations and their derivatives
//!
//! Energies are in Rydberg and temperatures in Kelvin. Below `ZERO_TEMPERATURE` every occupation and
//! derivative of a positive frequency vanishes.

use crate::constants::KELVIN_TO_RYDBERG;
use serde::Deserialize;

/// Temperatures below this are treated as zero
pub const ZERO_TEMPERATURE: f64 = 1e-12;

/// The statistics used for the phonon occupations
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Occupation {
    /// Bose-Einstein
    Quantum,
    /// Equipartition, `n = k_B T / omega`
    Classical,
}

impl Default for Occupation {
    fn default() -> Self {
        Occupation::Quantum
    }
}

impl Occupation {
    /// Occupation of a physical mode. Vanishes for negative frequencies and at zero temperature.
    pub fn occupation(&self, omega: f64, temperature: f64) -> f64 {
        if temperature < ZERO_TEMPERATURE || omega <= 0. {
            return 0.;
        }
        let thermal = KELVIN_TO_RYDBERG * temperature;
        match self {
            Occupation::Quantum => 1. / (omega / thermal).exp_m1(),
            Occupation::Classical => thermal / omega,
        }
    }

    /// Occupation continued to negative arguments by `n(-x) = -1 - n(x)`
    pub fn signed(&self, x: f64, temperature: f64) -> f64 {
        match x < 0. {
            true => -1. - self.occupation(-x, temperature),
            false => self.occupation(x, temperature),
        }
    }

    /// First derivative with respect to the frequency of the signed occupation
    ///
    /// For Bose-Einstein statistics `n'(x) = -n (n + 1) / k_B T`, which equals `-(T / x) dn/dT`.
    pub fn signed_derivative(&self, x: f64, temperature: f64) -> f64 {
        if temperature < ZERO_TEMPERATURE {
            return 0.;
        }
        let thermal = KELVIN_TO_RYDBERG * temperature;
        match self {
            Occupation::Quantum => {
                let n = self.signed(x, temperature);
                -n * (n + 1.) / thermal
            }
            Occupation::Classical => -thermal / (x * x),
        }
    }

    /// Second derivative with respect to the frequency of the signed occupation
    pub fn signed_second_derivative(&self, x: f64, temperature: f64) -> f64 {
        if temperature < ZERO_TEMPERATURE {
            return 0.;
        }
        let thermal = KELVIN_TO_RYDBERG * temperature;
        match self {
            Occupation::Quantum => {
                let n = self.signed(x, temperature);
                n * (n + 1.) * (2. * n + 1.) / (thermal * thermal)
            }
            Occupation::Classical => 2. * thermal / (x * x * x),
        }
    }

    /// Temperature derivative of the occupation of a physical mode
    pub fn temperature_derivative(&self, omega: f64, temperature: f64) -> f64 {
        if temperature < ZERO_TEMPERATURE || omega <= 0. {
            return 0.;
        }
        -omega / temperature * self.signed_derivative(omega, temperature)
    }
}

#[cfg(test)]
mod test {
    use super::Occupation;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn zero_temperature_occupation_vanishes() {
        assert_eq!(Occupation::Quantum.occupation(0.01, 0.), 0.);
        assert_eq!(Occupation::Quantum.signed_derivative(0.01, 0.), 0.);
    }

    #[test]
    fn classical_limit_is_reached_at_high_temperature() {
        let omega = 1e-4;
        let temperature = 1e4;
        assert_relative_eq!(
            Occupation::Quantum.occupation(omega, temperature) + 0.5,
            Occupation::Classical.occupation(omega, temperature),
            max_relative = 1e-6
        );
    }

    proptest! {
        #[test]
        fn derivatives_match_finite_differences(x in 0.001_f64..0.02, temperature in 50_f64..1000.) {
            let h = 1e-7;
            for occupation in [Occupation::Quantum, Occupation::Classical] {
                let numerical = (occupation.signed(x + h, temperature)
                    - occupation.signed(x - h, temperature)) / (2. * h);
                prop_assert!((numerical - occupation.signed_derivative(x, temperature)).abs()
                    <= 1e-5 * numerical.abs());
                let numerical = (occupation.signed_derivative(x + h, temperature)
                    - occupation.signed_derivative(x - h, temperature)) / (2. * h);
                prop_assert!((numerical - occupation.signed_second_derivative(x, temperature)).abs()
                    <= 1e-4 * numerical.abs());
            }
        }

        #[test]
        fn frequency_and_temperature_derivatives_are_related(x in 0.001_f64..0.02, temperature in 50_f64..1000.) {
            let h = 1e-4;
            let occupation = Occupation::Quantum;
            let numerical = (occupation.occupation(x, temperature + h)
                - occupation.occupation(x, temperature - h)) / (2. * h);
            prop_assert!((numerical - occupation.temperature_derivative(x, temperature)).abs()
                <= 1e-5 * numerical.abs());
        }

        #[test]
        fn negative_arguments_reflect(x in 0.001_f64..0.02, temperature in 1_f64..1000.) {
            let occupation = Occupation::Quantum;
            prop_assert!((occupation.signed(-x, temperature) + 1. + occupation.signed(x, temperature)).abs() < 1e-12);
        }
    }
}
