use crate::error::BuildError;

/// Uniformly spaced temperatures `T_i = minimum + i * step` in Kelvin, for
/// `i < floor((maximum - minimum) / step)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemperatureGrid {
    minimum: f64,
    step: f64,
    count: usize,
}

impl TemperatureGrid {
    pub fn new(minimum: f64, maximum: f64, step: f64) -> Result<Self, BuildError> {
        if step <= 0. || minimum < 0. || maximum < minimum {
            return Err(BuildError::Configuration(format!(
                "invalid temperature range {} to {} K in steps of {} K",
                minimum, maximum, step
            )));
        }
        let count = ((maximum - minimum) / step) as usize;
        if count == 0 {
            return Err(BuildError::Configuration(format!(
                "the temperature range {} to {} K holds no steps of {} K",
                minimum, maximum, step
            )));
        }
        Ok(Self {
            minimum,
            step,
            count,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn temperatures(&self) -> Vec<f64> {
        (0..self.count)
            .map(|i| self.minimum + i as f64 * self.step)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::TemperatureGrid;

    #[test]
    fn the_maximum_is_excluded() {
        let grid = TemperatureGrid::new(0., 1000., 10.).unwrap();
        assert_eq!(grid.len(), 100);
        let temperatures = grid.temperatures();
        assert_eq!(temperatures[0], 0.);
        assert_eq!(temperatures[99], 990.);
    }

    #[test]
    fn a_single_temperature_can_be_requested() {
        let grid = TemperatureGrid::new(300., 301., 1.).unwrap();
        assert_eq!(grid.temperatures(), vec![300.]);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(TemperatureGrid::new(0., 100., 0.).is_err());
        assert!(TemperatureGrid::new(200., 100., 10.).is_err());
        assert!(TemperatureGrid::new(100., 105., 10.).is_err());
    }
}
