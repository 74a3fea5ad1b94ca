use super::{lifetime, scattering_rate, PostProcessorError};
use crate::{
    constants::in_kayser,
    self_energy::{ModeSelfEnergy, DIAGRAM_LABELS},
};
use nalgebra::Vector3;
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

/// Builder for a `PostProcessor`
pub struct PostProcessorBuilder<RefDirectory> {
    directory: RefDirectory,
    prefix: String,
    four_phonon: bool,
}

impl PostProcessorBuilder<()> {
    pub fn new() -> Self {
        Self {
            directory: (),
            prefix: "anharmonic".into(),
            four_phonon: false,
        }
    }
}

impl Default for PostProcessorBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefDirectory> PostProcessorBuilder<RefDirectory> {
    pub fn with_directory(self, directory: &Path) -> PostProcessorBuilder<&Path> {
        PostProcessorBuilder {
            directory,
            prefix: self.prefix,
            four_phonon: self.four_phonon,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_four_phonon(mut self, four_phonon: bool) -> Self {
        self.four_phonon = four_phonon;
        self
    }
}

impl PostProcessorBuilder<&Path> {
    /// Creates the output directory if needed and truncates the output files
    pub fn build(self) -> Result<PostProcessor, PostProcessorError> {
        if !self.directory.exists() {
            std::fs::create_dir_all(self.directory)?;
        }
        let lifetimes = self.directory.join(format!("{}.mode_tau", self.prefix));
        let diagrams = match self.four_phonon {
            true => Some(self.directory.join(format!("{}.self_energy", self.prefix))),
            false => None,
        };

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = std::fs::File::create(&lifetimes)?;
        writeln!(file, "# Phonon lifetimes, created {}", timestamp)?;
        writeln!(
            file,
            "# Columns: temperature (K), scattering rate (cm^-1), lifetime (ps){}",
            match self.four_phonon {
                true => ", four-phonon scattering rate (cm^-1)",
                false => "",
            }
        )?;
        if let Some(path) = diagrams.as_ref() {
            let mut file = std::fs::File::create(path)?;
            writeln!(file, "# Phonon self-energies, created {}", timestamp)?;
            write!(file, "# Columns: temperature (K), bubble (Re, Im)")?;
            for label in DIAGRAM_LABELS {
                write!(file, ", {} (Re, Im)", label)?;
            }
            writeln!(file, " in cm^-1")?;
        }

        Ok(PostProcessor {
            lifetimes,
            diagrams,
        })
    }
}

/// Appends the results of each mode to the output files
pub struct PostProcessor {
    lifetimes: PathBuf,
    diagrams: Option<PathBuf>,
}

impl PostProcessor {
    /// Writes the results for one mode, whose wavevector in fractional coordinates is `xk`
    pub fn write_mode(
        &self,
        result: &ModeSelfEnergy,
        xk: &Vector3<f64>,
    ) -> Result<(), PostProcessorError> {
        let mut file = OpenOptions::new().append(true).open(&self.lifetimes)?;
        write_lifetimes(&mut file, result, xk)?;
        if let Some(path) = self.diagrams.as_ref() {
            let mut file = OpenOptions::new().append(true).open(path)?;
            write_diagrams(&mut file, result, xk)?;
        }
        Ok(())
    }

    pub fn lifetimes_path(&self) -> &Path {
        &self.lifetimes
    }
}

fn write_mode_header<W: Write>(
    writer: &mut W,
    result: &ModeSelfEnergy,
    xk: &Vector3<f64>,
) -> std::io::Result<()> {
    writeln!(writer, "# xk = {:12.8} {:12.8} {:12.8}", xk[0], xk[1], xk[2])?;
    writeln!(writer, "# branch = {}", result.mode.branch)?;
    writeln!(
        writer,
        "# frequency = {:.6} cm^-1",
        in_kayser(result.frequency)
    )
}

fn write_lifetimes<W: Write>(
    writer: &mut W,
    result: &ModeSelfEnergy,
    xk: &Vector3<f64>,
) -> std::io::Result<()> {
    write_mode_header(writer, result, xk)?;
    let four_phonon = result.four_phonon_damping();
    for (index, (temperature, &damping)) in result
        .temperatures
        .iter()
        .zip(result.damping.iter())
        .enumerate()
    {
        write!(
            writer,
            "{:10.3} {:18.10e} {:18.10e}",
            temperature,
            scattering_rate(damping),
            lifetime(damping)
        )?;
        if let Some(four_phonon) = four_phonon.as_ref() {
            write!(writer, " {:18.10e}", scattering_rate(four_phonon[index]))?;
        }
        writeln!(writer)?;
    }
    writeln!(writer)
}

fn write_diagrams<W: Write>(
    writer: &mut W,
    result: &ModeSelfEnergy,
    xk: &Vector3<f64>,
) -> std::io::Result<()> {
    let (bubble, diagrams) = match (result.bubble.as_ref(), result.four_phonon.as_ref()) {
        (Some(bubble), Some(diagrams)) => (bubble, diagrams),
        _ => return Ok(()),
    };
    write_mode_header(writer, result, xk)?;
    for ((temperature, bubble), diagrams) in result
        .temperatures
        .iter()
        .zip(bubble.iter())
        .zip(diagrams.iter())
    {
        write!(writer, "{:10.3}", temperature)?;
        for value in std::iter::once(bubble).chain(diagrams.iter()) {
            write!(
                writer,
                " {:16.8e} {:16.8e}",
                in_kayser(value.re),
                in_kayser(value.im)
            )?;
        }
        writeln!(writer)?;
    }
    writeln!(writer)
}

#[cfg(test)]
mod test {
    use super::{write_diagrams, write_lifetimes};
    use crate::{
        constants::from_kayser,
        phonons::Mode,
        self_energy::{FourPhononDiagrams, ModeSelfEnergy},
    };
    use nalgebra::Vector3;
    use num_complex::Complex;

    fn result(with_four_phonon: bool) -> ModeSelfEnergy {
        let four_phonon = with_four_phonon.then(|| {
            let mut diagrams = FourPhononDiagrams::default();
            diagrams[2] = Complex::new(0., from_kayser(0.25));
            vec![diagrams; 2]
        });
        ModeSelfEnergy {
            mode: Mode::new(3, 1),
            frequency: from_kayser(200.),
            temperatures: vec![100., 200.],
            damping: vec![from_kayser(0.5), 0.],
            bubble: with_four_phonon.then(|| vec![Complex::new(0.1, 0.2); 2]),
            four_phonon,
        }
    }

    #[test]
    fn lifetime_rows_follow_the_mode_header() {
        let mut buffer = Vec::new();
        write_lifetimes(&mut buffer, &result(false), &Vector3::new(0.5, 0., 0.)).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("# xk ="));
        assert_eq!(lines[1], "# branch = 1");
        assert!(lines[2].starts_with("# frequency = 200.0000"));

        let columns = lines[3]
            .split_whitespace()
            .map(|value| value.parse::<f64>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(columns.len(), 3);
        approx::assert_relative_eq!(columns[0], 100.);
        approx::assert_relative_eq!(columns[1], 1., max_relative = 1e-8);
        assert!(lines[4].ends_with("inf"));
    }

    #[test]
    fn four_phonon_rate_is_appended_when_present() {
        let mut buffer = Vec::new();
        write_lifetimes(&mut buffer, &result(true), &Vector3::zeros()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let row = text.lines().nth(3).unwrap();
        let columns = row
            .split_whitespace()
            .map(|value| value.parse::<f64>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(columns.len(), 4);
        approx::assert_relative_eq!(columns[3], 0.5, max_relative = 1e-8);
    }

    #[test]
    fn diagram_rows_hold_every_contribution() {
        let mut buffer = Vec::new();
        write_diagrams(&mut buffer, &result(true), &Vector3::zeros()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let row = text.lines().nth(3).unwrap();
        assert_eq!(row.split_whitespace().count(), 1 + 2 * 11);

        let mut empty = Vec::new();
        write_diagrams(&mut empty, &result(false), &Vector3::zeros()).unwrap();
        assert!(empty.is_empty());
    }
}
