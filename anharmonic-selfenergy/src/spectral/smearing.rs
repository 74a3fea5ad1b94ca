use std::f64::consts::PI;

/// A normalised broadened representation of the Dirac delta function
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeltaFunction {
    /// `eps / (pi (x^2 + eps^2))`
    Lorentzian(f64),
    /// `exp(-x^2 / eps^2) / (eps sqrt(pi))`
    Gaussian(f64),
}

impl DeltaFunction {
    pub fn width(&self) -> f64 {
        match self {
            DeltaFunction::Lorentzian(width) | DeltaFunction::Gaussian(width) => *width,
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        match *self {
            DeltaFunction::Lorentzian(width) => width / (PI * (x * x + width * width)),
            DeltaFunction::Gaussian(width) => {
                (-(x * x) / (width * width)).exp() / (width * PI.sqrt())
            }
        }
    }
}
