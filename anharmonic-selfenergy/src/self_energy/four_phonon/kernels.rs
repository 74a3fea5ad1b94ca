//! Closed forms of the bosonic Matsubara sums appearing in the fourth-order diagrams
//!
//! A free propagator of frequency `omega` is written as a sum over its two poles,
//! `D(iv) = sum_s s / (iv - s omega)`, so every frequency sum reduces to sums over signed energies
//! `x = s omega` of products of simple poles. For poles `x_1 .. x_m` on the real axis
//!
//! ```text
//! T sum_v prod_i 1 / (iv - x_i) = -n[x_1, .., x_m]
//! ```
//!
//! where `n[..]` is the divided difference of the signed occupation. Coinciding poles are removable
//! singularities, handled by replacing difference quotients with derivatives of the occupation.

use crate::thermodynamics::Occupation;
use num_complex::Complex;
use std::ops::{Add, Div, Mul, Sub};

/// The signs of the two poles of a free propagator
pub(crate) const SIGNS: [f64; 2] = [1., -1.];

/// Thermal state and degeneracy threshold shared by every kernel at one temperature
#[derive(Clone, Copy, Debug)]
pub(crate) struct Statistics {
    pub(crate) occupation: Occupation,
    pub(crate) temperature: f64,
    /// Poles closer than this are treated as coincident
    pub(crate) degeneracy: f64,
}

impl Statistics {
    pub(crate) fn n(&self, x: f64) -> f64 {
        self.occupation.signed(x, self.temperature)
    }

    /// `2 n(omega) + 1`, the closed loop of a single propagator
    pub(crate) fn loop_factor(&self, omega: f64) -> f64 {
        2. * self.n(omega) + 1.
    }
}

/// A function of a real pole position which can be differentiated twice
pub(crate) trait Differentiable {
    type Output: Copy
        + Add<Output = Self::Output>
        + Sub<Output = Self::Output>
        + Mul<f64, Output = Self::Output>
        + Div<f64, Output = Self::Output>;

    fn value(&self, x: f64) -> Self::Output;
    fn first(&self, x: f64) -> Self::Output;
    fn second(&self, x: f64) -> Self::Output;
    /// The value at `x` given the occupation there, for poles where the occupation is only known
    /// through a product with a vanishing residue
    fn from_occupation(&self, occupation: f64, x: f64) -> Self::Output;
}

/// `f(x) = n(x)`
pub(crate) struct SignedOccupation<'a>(pub(crate) &'a Statistics);

impl<'a> Differentiable for SignedOccupation<'a> {
    type Output = f64;

    fn value(&self, x: f64) -> f64 {
        self.0.n(x)
    }

    fn first(&self, x: f64) -> f64 {
        self.0.occupation.signed_derivative(x, self.0.temperature)
    }

    fn second(&self, x: f64) -> f64 {
        self.0
            .occupation
            .signed_second_derivative(x, self.0.temperature)
    }

    fn from_occupation(&self, occupation: f64, _x: f64) -> f64 {
        occupation
    }
}

/// `g(x) = n(x) / (w - x)` with complex `w`
pub(crate) struct ShiftedOccupation<'a> {
    pub(crate) statistics: &'a Statistics,
    pub(crate) w: Complex<f64>,
}

impl<'a> Differentiable for ShiftedOccupation<'a> {
    type Output = Complex<f64>;

    fn value(&self, x: f64) -> Complex<f64> {
        self.from_occupation(self.statistics.n(x), x)
    }

    fn first(&self, x: f64) -> Complex<f64> {
        let inverse = (self.w - x).inv();
        let n = self.statistics.n(x);
        let dn = SignedOccupation(self.statistics).first(x);
        inverse * dn + inverse * inverse * n
    }

    fn second(&self, x: f64) -> Complex<f64> {
        let inverse = (self.w - x).inv();
        let occupation = SignedOccupation(self.statistics);
        let (n, dn, d2n) = (
            occupation.value(x),
            occupation.first(x),
            occupation.second(x),
        );
        inverse * d2n + inverse * inverse * (2. * dn) + inverse * inverse * inverse * (2. * n)
    }

    fn from_occupation(&self, occupation: f64, x: f64) -> Complex<f64> {
        (self.w - x).inv() * occupation
    }
}

fn two_point<F: Differentiable>(f: &F, a: f64, b: f64, tolerance: f64) -> F::Output {
    match (b - a).abs() < tolerance {
        true => f.first(0.5 * (a + b)),
        false => (f.value(b) - f.value(a)) / (b - a),
    }
}

/// The divided difference `f[x_1, .., x_m]` for up to three points
pub(crate) fn divided_difference<F: Differentiable>(
    f: &F,
    points: &[f64],
    tolerance: f64,
) -> F::Output {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    match sorted.as_slice() {
        [a] => f.value(*a),
        [a, b] => two_point(f, *a, *b, tolerance),
        [a, b, c] => match c - a < tolerance {
            true => f.second(*b) * 0.5,
            false => (two_point(f, *b, *c, tolerance) - two_point(f, *a, *b, tolerance)) / (c - a),
        },
        _ => unreachable!("divided differences are only formed over one to three poles"),
    }
}

/// A pole of the closed two-propagator bubble `-T sum D_3 D_4`, which as a function of the external
/// frequency is `sum_t residue_t / (iv - position_t)`
#[derive(Clone, Copy, Debug)]
pub(crate) struct BubblePole {
    pub(crate) position: f64,
    pub(crate) residue: f64,
    /// `residue * n(position)`, finite even when the pole sits at zero
    pub(crate) occupied_residue: f64,
}

/// The four poles of the bubble formed by modes of frequency `omega_3` and `omega_4`
pub(crate) fn bubble_poles(statistics: &Statistics, omega_3: f64, omega_4: f64) -> [BubblePole; 4] {
    let pole = |sigma_3: f64, sigma_4: f64| {
        let (x_3, x_4) = (sigma_3 * omega_3, sigma_4 * omega_4);
        let (n_3, n_4) = (statistics.n(x_3), statistics.n(x_4));
        BubblePole {
            position: x_3 + x_4,
            residue: sigma_3 * sigma_4 * (1. + n_3 + n_4),
            // (1 + n(a) + n(b)) n(a + b) = n(a) n(b)
            occupied_residue: sigma_3 * sigma_4 * n_3 * n_4,
        }
    };
    [pole(1., 1.), pole(1., -1.), pole(-1., 1.), pole(-1., -1.)]
}

/// `residue * f[x_1, x_2, p]` for a bubble pole `p`
///
/// When `p` is separated from both `x_1` and `x_2` the term in `f(p)` is formed from the occupied
/// residue, so a pole at zero frequency contributes its finite limit.
pub(crate) fn pole_weighted_difference<F: Differentiable>(
    f: &F,
    x_1: f64,
    x_2: f64,
    pole: &BubblePole,
    tolerance: f64,
) -> F::Output {
    let p = pole.position;
    if (p - x_1).abs() < tolerance || (p - x_2).abs() < tolerance {
        return divided_difference(f, &[x_1, x_2, p], tolerance) * pole.residue;
    }
    let leading = divided_difference(f, &[x_1, x_2], tolerance) * pole.residue / (x_1 - p);
    let trailing = (f.from_occupation(pole.occupied_residue, p) - f.value(x_2) * pole.residue)
        / ((x_2 - p) * (x_1 - p));
    leading + trailing
}

/// The closed bubble `K_2(z) = sum_{s_1 s_2} s_1 s_2 (1 + n(x_1) + n(x_2)) / (z - x_1 - x_2)`, equal
/// to minus the frequency sum of two propagators
pub(crate) fn bubble(statistics: &Statistics, z: Complex<f64>, omega_1: f64, omega_2: f64) -> Complex<f64> {
    let mut total = Complex::new(0., 0.);
    for sigma_1 in SIGNS {
        for sigma_2 in SIGNS {
            let (x_1, x_2) = (sigma_1 * omega_1, sigma_2 * omega_2);
            let weight = sigma_1 * sigma_2 * (1. + statistics.n(x_1) + statistics.n(x_2));
            total += (z - x_1 - x_2).inv() * weight;
        }
    }
    total
}

/// The sunset `K_3(z) = sum s_1 s_2 s_3 [prod (1 + n(x_i)) - prod n(x_i)] / (z - x_1 - x_2 - x_3)`,
/// equal to the double frequency sum of three propagators
pub(crate) fn sunset(
    statistics: &Statistics,
    z: Complex<f64>,
    omegas: [f64; 3],
) -> Complex<f64> {
    let mut total = Complex::new(0., 0.);
    for sigma_1 in SIGNS {
        for sigma_2 in SIGNS {
            for sigma_3 in SIGNS {
                let x = [sigma_1 * omegas[0], sigma_2 * omegas[1], sigma_3 * omegas[2]];
                let n = x.map(|x| statistics.n(x));
                let weight = sigma_1
                    * sigma_2
                    * sigma_3
                    * ((1. + n[0]) * (1. + n[1]) * (1. + n[2]) - n[0] * n[1] * n[2]);
                total += (z - x[0] - x[1] - x[2]).inv() * weight;
            }
        }
    }
    total
}

/// `sum s_1 s_1' n[x_1, x_1']`, the static chain of two propagators at one wavevector
pub(crate) fn static_chain(statistics: &Statistics, omega_1: f64, omega_1p: f64) -> f64 {
    let occupation = SignedOccupation(statistics);
    let mut total = 0.;
    for sigma_1 in SIGNS {
        for sigma_1p in SIGNS {
            total += sigma_1
                * sigma_1p
                * divided_difference(
                    &occupation,
                    &[sigma_1 * omega_1, sigma_1p * omega_1p],
                    statistics.degeneracy,
                );
        }
    }
    total
}

/// `sum_t A_t sum s_1 s_1' n[x_1, x_1', p_t]`, the static chain of two propagators closed through
/// a bubble
pub(crate) fn static_chain_with_bubble(
    statistics: &Statistics,
    omega_1: f64,
    omega_1p: f64,
    poles: &[BubblePole; 4],
) -> f64 {
    let occupation = SignedOccupation(statistics);
    let mut total = 0.;
    for pole in poles {
        for sigma_1 in SIGNS {
            for sigma_1p in SIGNS {
                total += sigma_1
                    * sigma_1p
                    * pole_weighted_difference(
                        &occupation,
                        sigma_1 * omega_1,
                        sigma_1p * omega_1p,
                        pole,
                        statistics.degeneracy,
                    );
            }
        }
    }
    total
}

/// `S(x_1, x_1'; c) = T sum_v 1 / ((iv - x_1)(iv - x_1')(z - iv - c))` continued to `z`
fn insertion_term(
    statistics: &Statistics,
    z: Complex<f64>,
    x_1: f64,
    x_1p: f64,
    c: f64,
) -> Complex<f64> {
    let w = z - c;
    let shifted = ShiftedOccupation { statistics, w };
    let closing = ((w - x_1) * (w - x_1p)).inv() * (1. + statistics.n(c));
    -divided_difference(&shifted, &[x_1, x_1p], statistics.degeneracy) - closing
}

/// `J_2(z) = sum s_1 s_1' s_2 S(x_1, x_1'; x_2)`: a bubble of lines 1 and 2 in which line 1 carries a
/// static insertion changing its branch
pub(crate) fn insertion(
    statistics: &Statistics,
    z: Complex<f64>,
    omega_1: f64,
    omega_1p: f64,
    omega_2: f64,
) -> Complex<f64> {
    let mut total = Complex::new(0., 0.);
    for sigma_1 in SIGNS {
        for sigma_1p in SIGNS {
            for sigma_2 in SIGNS {
                total += insertion_term(
                    statistics,
                    z,
                    sigma_1 * omega_1,
                    sigma_1p * omega_1p,
                    sigma_2 * omega_2,
                ) * (sigma_1 * sigma_1p * sigma_2);
            }
        }
    }
    total
}

/// `sum_t A_t sum s_1 s_1' s_2 S(x_1, x_1', p_t; x_2)`: as `insertion`, with line 1 dressed by a
/// bubble instead of a static vertex
pub(crate) fn insertion_with_bubble(
    statistics: &Statistics,
    z: Complex<f64>,
    omega_1: f64,
    omega_1p: f64,
    omega_2: f64,
    poles: &[BubblePole; 4],
) -> Complex<f64> {
    let mut total = Complex::new(0., 0.);
    for sigma_2 in SIGNS {
        let c = sigma_2 * omega_2;
        let w = z - c;
        let shifted = ShiftedOccupation { statistics, w };
        let occupied_c = 1. + statistics.n(c);
        for pole in poles {
            for sigma_1 in SIGNS {
                for sigma_1p in SIGNS {
                    let (x_1, x_1p) = (sigma_1 * omega_1, sigma_1p * omega_1p);
                    let difference = pole_weighted_difference(
                        &shifted,
                        x_1,
                        x_1p,
                        pole,
                        statistics.degeneracy,
                    );
                    let closing = ((w - x_1) * (w - x_1p) * (w - pole.position)).inv()
                        * (pole.residue * occupied_c);
                    total -= (difference + closing) * (sigma_1 * sigma_1p * sigma_2);
                }
            }
        }
    }
    total
}
