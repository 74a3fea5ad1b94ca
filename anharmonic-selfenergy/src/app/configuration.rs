use crate::{
    constants::from_kayser,
    error::BuildError,
    self_energy::{Method, TemperatureGrid, Tolerances},
    spectral::DeltaFunction,
    thermodynamics::Occupation,
};
use color_eyre::eyre::eyre;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::{env, path::PathBuf};

#[derive(Debug, Deserialize)]
pub(crate) struct Configuration {
    pub(crate) self_energy: SelfEnergyConfiguration,
    pub(crate) temperature: TemperatureConfiguration,
    #[serde(default)]
    pub(crate) tolerance: Tolerances,
    pub(crate) output: OutputConfiguration,
    /// Modes to evaluate, all modes on the grid when empty
    #[serde(default)]
    pub(crate) targets: Vec<TargetConfiguration>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MethodKind {
    Lorentzian,
    Gaussian,
    Tetrahedron,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelfEnergyConfiguration {
    pub(crate) method: MethodKind,
    /// Width of the smearing kernel in cm^-1
    pub(crate) smearing_width: f64,
    #[serde(default)]
    pub(crate) four_phonon: bool,
    #[serde(default)]
    pub(crate) occupation: Occupation,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemperatureConfiguration {
    pub(crate) minimum: f64,
    pub(crate) maximum: f64,
    pub(crate) step: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OutputConfiguration {
    pub(crate) prefix: String,
    pub(crate) directory: PathBuf,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TargetConfiguration {
    /// Wavevector in fractional reciprocal coordinates
    pub(crate) kpoint: [f64; 3],
    pub(crate) branch: usize,
}

impl SelfEnergyConfiguration {
    /// The delta-function representation, with the width converted to Rydberg
    pub(crate) fn method(&self) -> Result<Method, BuildError> {
        if self.method != MethodKind::Tetrahedron && self.smearing_width <= 0. {
            return Err(BuildError::Configuration(format!(
                "the smearing width must be positive, got {} cm^-1",
                self.smearing_width
            )));
        }
        let width = from_kayser(self.smearing_width);
        Ok(match self.method {
            MethodKind::Lorentzian => Method::Smearing(DeltaFunction::Lorentzian(width)),
            MethodKind::Gaussian => Method::Smearing(DeltaFunction::Gaussian(width)),
            MethodKind::Tetrahedron => Method::Tetrahedron,
        })
    }
}

impl TemperatureConfiguration {
    pub(crate) fn grid(&self) -> Result<TemperatureGrid, BuildError> {
        TemperatureGrid::new(self.minimum, self.maximum, self.step)
    }
}

impl Configuration {
    pub(crate) fn build() -> color_eyre::Result<Self> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // The default settings for the calculation
            .add_source(File::with_name("../.config/default"))
            // Overrides for the run mode, optional
            .add_source(File::with_name(&format!("../.config/{}", run_mode)).required(false))
            .build()?;

        Self::deserialize_and_validate(s)
    }

    /// Builds the configuration from a TOML string
    pub(crate) fn from_toml(source: &str) -> color_eyre::Result<Self> {
        let s = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Self::deserialize_and_validate(s)
    }

    fn deserialize_and_validate(s: Config) -> color_eyre::Result<Self> {
        let configuration: Self = s
            .try_deserialize()
            .map_err(|e| eyre!(format!("Failed to deserialize the config file: {:?}", e)))?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Rejects values which cannot describe a calculation
    fn validate(&self) -> Result<(), BuildError> {
        self.self_energy.method()?;
        self.temperature.grid()?;
        let tolerance = &self.tolerance;
        if [
            tolerance.frequency,
            tolerance.degeneracy,
            tolerance.conservation,
            tolerance.hermiticity,
        ]
        .iter()
        .any(|&value| value < 0.)
        {
            return Err(BuildError::Configuration(
                "tolerances must be non-negative".into(),
            ));
        }
        if self.self_energy.method == MethodKind::Tetrahedron && self.self_energy.four_phonon {
            return Err(BuildError::Configuration(
                "the four-phonon diagrams require a smearing method".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Configuration, MethodKind};
    use crate::{self_energy::Method, spectral::DeltaFunction, thermodynamics::Occupation};

    const MINIMAL: &str = r#"
        [self_energy]
        method = "gaussian"
        smearing_width = 2.0

        [temperature]
        minimum = 0.0
        maximum = 1000.0
        step = 10.0

        [output]
        prefix = "silicon"
        directory = "results"
    "#;

    #[test]
    fn defaults_fill_optional_tables() {
        let configuration = Configuration::from_toml(MINIMAL).unwrap();
        assert_eq!(configuration.self_energy.method, MethodKind::Gaussian);
        assert!(!configuration.self_energy.four_phonon);
        assert_eq!(configuration.self_energy.occupation, Occupation::Quantum);
        assert_eq!(configuration.tolerance, Default::default());
        assert!(configuration.targets.is_empty());
        assert_eq!(configuration.temperature.grid().unwrap().len(), 100);
        assert!(matches!(
            configuration.self_energy.method().unwrap(),
            Method::Smearing(DeltaFunction::Gaussian(_))
        ));
    }

    #[test]
    fn targets_and_tolerances_are_read() {
        let source = format!(
            "{}\n{}",
            MINIMAL,
            r#"
            [tolerance]
            frequency = 1.0e-6

            [[targets]]
            kpoint = [0.5, 0.0, 0.0]
            branch = 2
            "#
        );
        let configuration = Configuration::from_toml(&source).unwrap();
        approx::assert_relative_eq!(configuration.tolerance.frequency, 1e-6);
        approx::assert_relative_eq!(configuration.tolerance.degeneracy, 1e-8);
        assert_eq!(configuration.targets.len(), 1);
        assert_eq!(configuration.targets[0].branch, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero_width = MINIMAL.replace("smearing_width = 2.0", "smearing_width = 0.0");
        assert!(Configuration::from_toml(&zero_width).is_err());
        let inverted = MINIMAL.replace("maximum = 1000.0", "maximum = -10.0");
        assert!(Configuration::from_toml(&inverted).is_err());
        let unknown = MINIMAL.replace("\"gaussian\"", "\"voigt\"");
        assert!(Configuration::from_toml(&unknown).is_err());
        let tetrahedron_with_diagrams = MINIMAL.replace(
            "method = \"gaussian\"",
            "method = \"tetrahedron\"\nfour_phonon = true",
        );
        assert!(Configuration::from_toml(&tetrahedron_with_diagrams).is_err());
    }
}
