// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use anharmonic_mesher::{KPointGrid, TetrahedronConnectivity, REFERENCE_VOLUME};
use nalgebra::Vector3;

/// Integrates `f(k) delta(target - e(k))` over the Brillouin zone, normalised to unit measure, from
/// values of `e` and `f` sampled at the grid points
pub trait IsosurfaceIntegrator: Send + Sync {
    fn number_of_points(&self) -> usize;
    fn integrate(&self, energies: &[f64], integrand: &[f64], target: f64) -> f64;
}

/// Linear tetrahedron quadrature
///
/// Within each tetrahedron `e` and `f` are interpolated linearly between the corners, so the surface
/// `e = target` is a flat triangle or quadrilateral and the integral over it is exact for the
/// interpolants.
#[derive(Clone, Debug)]
pub struct LinearTetrahedron {
    tetrahedra: Vec<TetrahedronConnectivity>,
    number_of_points: usize,
    /// Zone measure of a single tetrahedron
    volume: f64,
}

impl LinearTetrahedron {
    pub fn new(grid: &KPointGrid) -> Self {
        let tetrahedra = grid.tetrahedra();
        Self {
            volume: 1. / tetrahedra.len() as f64,
            tetrahedra,
            number_of_points: grid.len(),
        }
    }
}

impl IsosurfaceIntegrator for LinearTetrahedron {
    fn number_of_points(&self) -> usize {
        self.number_of_points
    }

    fn integrate(&self, energies: &[f64], integrand: &[f64], target: f64) -> f64 {
        let scale = self.volume / REFERENCE_VOLUME;
        self.tetrahedra
            .iter()
            .map(|tetrahedron| {
                let corners = tetrahedron.corners();
                integrate_reference_tetrahedron(
                    corners.map(|corner| energies[corner]),
                    corners.map(|corner| integrand[corner]),
                    target,
                )
            })
            .sum::<f64>()
            * scale
    }
}

/// The cross-section integral on the unit tetrahedron with corners at the origin and the three unit
/// vectors
pub(crate) fn integrate_reference_tetrahedron(
    energies: [f64; 4],
    integrand: [f64; 4],
    target: f64,
) -> f64 {
    let gradient = Vector3::new(
        energies[1] - energies[0],
        energies[2] - energies[0],
        energies[3] - energies[0],
    )
    .norm();
    if gradient == 0. {
        return 0.;
    }

    let vertices = anharmonic_mesher::reference_vertices();
    let mut order = [0, 1, 2, 3];
    order.sort_by(|&a, &b| {
        energies[a]
            .partial_cmp(&energies[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let below = order.iter().filter(|&&i| energies[i] < target).count();

    // Point of the surface on the edge between a corner below and a corner above the target
    let crossing = |a: usize, b: usize| {
        let (a, b) = (order[a], order[b]);
        let t = (target - energies[a]) / (energies[b] - energies[a]);
        (
            vertices[a] + (vertices[b] - vertices[a]) * t,
            integrand[a] + (integrand[b] - integrand[a]) * t,
        )
    };
    let triangle = |p: [(Vector3<f64>, f64); 3]| {
        let area = 0.5 * (p[1].0 - p[0].0).cross(&(p[2].0 - p[0].0)).norm();
        area * (p[0].1 + p[1].1 + p[2].1) / 3.
    };

    let surface = match below {
        1 => triangle([crossing(0, 1), crossing(0, 2), crossing(0, 3)]),
        2 => {
            let quadrilateral = [crossing(0, 2), crossing(0, 3), crossing(1, 3), crossing(1, 2)];
            triangle([quadrilateral[0], quadrilateral[1], quadrilateral[2]])
                + triangle([quadrilateral[0], quadrilateral[2], quadrilateral[3]])
        }
        3 => triangle([crossing(0, 3), crossing(1, 3), crossing(2, 3)]),
        _ => 0.,
    };
    surface / gradient
}

#[cfg(test)]
mod test {
    use super::{integrate_reference_tetrahedron, IsosurfaceIntegrator, LinearTetrahedron};
    use anharmonic_mesher::create_monkhorst_pack_grid;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn cross_section_of_the_reference_tetrahedron() {
        // e = z, so the surface e = 1/2 is the triangle (0,0,1/2), (1/2,0,1/2), (0,1/2,1/2)
        let result = integrate_reference_tetrahedron([0., 0., 0., 1.], [1.; 4], 0.5);
        assert_relative_eq!(result, 0.125);
    }

    #[test]
    fn targets_outside_the_band_give_nothing() {
        let result = integrate_reference_tetrahedron([0., 0.2, 0.4, 1.], [1.; 4], 1.5);
        assert_eq!(result, 0.);
    }

    proptest! {
        #[test]
        fn constant_integrand_integrates_to_the_density_of_states(
            gaps in prop::array::uniform3(0.05_f64..0.6),
            order in Just(vec![0_usize, 1, 2, 3]).prop_shuffle(),
        ) {
            let mut energies = [-0.9; 4];
            for (i, gap) in gaps.iter().enumerate() {
                energies[order[i + 1]] = energies[order[i]] + gap;
            }
            // Integrating the density of states over all targets recovers the volume
            let number_of_targets = 4000;
            let (low, high) = (-1.01, 1.01);
            let step = (high - low) / number_of_targets as f64;
            let total = (0..number_of_targets)
                .map(|i| integrate_reference_tetrahedron(energies, [1.; 4], low + (i as f64 + 0.5) * step))
                .sum::<f64>() * step;
            prop_assert!((total - 1. / 6.).abs() < 2e-3);
        }
    }

    #[test]
    fn free_dispersion_density_of_states() {
        // e(k) = cos(2 pi k_x) on a dense line, the density of states at 0 is 1 / pi
        let grid = create_monkhorst_pack_grid([400, 1, 1]).unwrap();
        let energies = grid
            .points()
            .iter()
            .map(|point| (2. * std::f64::consts::PI * point.fractional()[0]).cos())
            .collect::<Vec<_>>();
        let integrator = LinearTetrahedron::new(&grid);
        let density = integrator.integrate(&energies, &vec![1.; grid.len()], 0.);
        assert_relative_eq!(density, 1. / std::f64::consts::PI, max_relative = 1e-3);
    }
}
