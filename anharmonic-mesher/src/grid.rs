use crate::{
    connectivity::{CELL_CORNERS, CELL_TETRAHEDRA},
    GridError, TetrahedronConnectivity, GRID_TOLERANCE,
};
use nalgebra::Vector3;

/// A single wavevector on a uniform grid
#[derive(Clone, Debug, PartialEq)]
pub struct KPoint {
    pub(crate) fractional: Vector3<f64>,
    pub(crate) index: usize,
    pub(crate) negation: usize,
}

impl KPoint {
    /// Coordinates in units of the reciprocal lattice vectors, each component in `[0, 1)`
    pub fn fractional(&self) -> &Vector3<f64> {
        &self.fractional
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Flat index of the point at `-k`
    pub fn negation(&self) -> usize {
        self.negation
    }
}

/// A uniform, Gamma-centred Monkhorst–Pack grid of wavevectors
///
/// Points are stored with the last axis running fastest, so the point `(i, j, l)` has flat index
/// `l + n_z * (j + n_y * i)`. The grid is immutable once constructed.
#[derive(Clone, Debug)]
pub struct KPointGrid {
    pub(crate) dimensions: [usize; 3],
    pub(crate) points: Vec<KPoint>,
}

impl KPointGrid {
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[KPoint] {
        &self.points
    }

    pub fn kpoint(&self, index: usize) -> &KPoint {
        &self.points[index]
    }

    pub fn negate(&self, index: usize) -> usize {
        self.points[index].negation
    }

    /// The flat index of the zone centre
    pub fn gamma(&self) -> usize {
        0
    }

    pub fn flat_index(&self, integer: [usize; 3]) -> usize {
        let [_, ny, nz] = self.dimensions;
        integer[2] + nz * (integer[1] + ny * integer[0])
    }

    /// Maps an arbitrary fractional vector onto the grid by rounding each scaled component to the
    /// nearest integer and wrapping it into the periodic cell.
    ///
    /// This is the grid round-off used to locate momentum-conserving partners. It does not check that
    /// the vector was on the grid to begin with.
    pub fn fold(&self, xk: &Vector3<f64>) -> usize {
        let mut integer = [0_usize; 3];
        for (axis, item) in integer.iter_mut().enumerate() {
            let n = self.dimensions[axis] as f64;
            let wrapped = (xk[axis] * n + 2. * n).round() as i64;
            *item = wrapped.rem_euclid(self.dimensions[axis] as i64) as usize;
        }
        self.flat_index(integer)
    }

    /// Index of `k_a - k_b`
    pub fn fold_difference(&self, a: usize, b: usize) -> usize {
        self.fold(&(self.points[a].fractional - self.points[b].fractional))
    }

    /// Index of `k_a - k_b - k_c`
    pub fn fold_difference3(&self, a: usize, b: usize, c: usize) -> usize {
        self.fold(
            &(self.points[a].fractional - self.points[b].fractional - self.points[c].fractional),
        )
    }

    /// Locates the grid point matching the fractional vector `xk`, returning `None` when `xk` is not
    /// within `GRID_TOLERANCE` of any grid point
    pub fn nearest_grid_index(&self, xk: &Vector3<f64>) -> Option<usize> {
        let candidate = self.fold(xk);
        let mut difference = xk - self.points[candidate].fractional;
        difference.iter_mut().for_each(|x| *x -= x.round());
        match difference.norm() < GRID_TOLERANCE {
            true => Some(candidate),
            false => None,
        }
    }

    /// As `nearest_grid_index`, but reporting off-grid vectors as an error
    pub fn try_grid_index(&self, xk: &Vector3<f64>) -> Result<usize, GridError> {
        self.nearest_grid_index(xk)
            .ok_or(GridError::OffGrid(xk[0], xk[1], xk[2]))
    }

    /// The norm of `sum(k) mod 1`, with each component wrapped into `[-1/2, 1/2]`
    pub fn conservation_residual(&self, indices: &[usize]) -> f64 {
        let mut total = indices
            .iter()
            .fold(Vector3::zeros(), |sum, &index| sum + self.points[index].fractional);
        total.iter_mut().for_each(|x| *x -= x.round());
        total.norm()
    }

    /// Every ordered triple of grid points whose wavevectors sum to a reciprocal lattice vector
    ///
    /// This is an explicit scan over all `N^3` triples and does not assume anything about the grid
    /// beyond the stored coordinates. Use `fold_difference` where the grid is known to be uniform.
    pub fn conserving_triplets(&self, tolerance: f64) -> Vec<[usize; 3]> {
        let n = self.len();
        let mut triplets = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for l in 0..n {
                    if self.conservation_residual(&[i, j, l]) <= tolerance {
                        triplets.push([i, j, l]);
                    }
                }
            }
        }
        triplets
    }

    /// Decomposes every grid cell into six tetrahedra sharing the cell diagonal
    pub fn tetrahedra(&self) -> Vec<TetrahedronConnectivity> {
        let [nx, ny, nz] = self.dimensions;
        let mut tetrahedra = Vec::with_capacity(6 * self.len());
        for i in 0..nx {
            for j in 0..ny {
                for l in 0..nz {
                    let corners = CELL_CORNERS.map(|[di, dj, dl]| {
                        self.flat_index([(i + di) % nx, (j + dj) % ny, (l + dl) % nz])
                    });
                    tetrahedra.extend(CELL_TETRAHEDRA.iter().map(|vertices| {
                        TetrahedronConnectivity(vertices.map(|vertex| corners[vertex]))
                    }));
                }
            }
        }
        tetrahedra
    }
}

#[cfg(test)]
mod test {
    use crate::create_monkhorst_pack_grid;
    use nalgebra::Vector3;
    use proptest::prelude::*;

    #[test]
    fn negation_is_an_involution() {
        let grid = create_monkhorst_pack_grid([3, 4, 5]).unwrap();
        for point in grid.points() {
            assert_eq!(grid.negate(point.negation()), point.index());
            let sum = point.fractional() + grid.kpoint(point.negation()).fractional();
            assert!(sum.iter().all(|x| (x - x.round()).abs() < 1e-12));
        }
    }

    #[test]
    fn gamma_is_its_own_negation() {
        let grid = create_monkhorst_pack_grid([4, 4, 4]).unwrap();
        assert_eq!(grid.negate(grid.gamma()), grid.gamma());
        assert_eq!(grid.kpoint(grid.gamma()).fractional(), &Vector3::zeros());
    }

    #[test]
    fn folded_partners_agree_with_explicit_triplet_search() {
        let grid = create_monkhorst_pack_grid([2, 3, 2]).unwrap();
        let triplets = grid.conserving_triplets(1e-12);
        // One partner per ordered pair
        assert_eq!(triplets.len(), grid.len() * grid.len());
        for [i, j, l] in triplets {
            // k_l = -(k_i + k_j) = -k_i - k_j
            let minus_i = grid.negate(i);
            assert_eq!(grid.fold_difference(minus_i, j), l);
        }
    }

    #[test]
    fn three_point_fold_conserves_momentum() {
        let grid = create_monkhorst_pack_grid([4, 2, 3]).unwrap();
        for a in 0..grid.len() {
            for b in 0..grid.len() {
                for c in (0..grid.len()).step_by(5) {
                    let d = grid.fold_difference3(a, b, c);
                    assert!(grid.conservation_residual(&[grid.negate(a), b, c, d]) < 1e-12);
                }
            }
        }
    }

    #[test]
    fn vectors_off_the_grid_are_not_found() {
        let grid = create_monkhorst_pack_grid([4, 4, 4]).unwrap();
        assert_eq!(
            grid.nearest_grid_index(&Vector3::new(0.25, -0.5, 1.0)),
            Some(grid.flat_index([1, 2, 0]))
        );
        assert!(grid.nearest_grid_index(&Vector3::new(0.1, 0., 0.)).is_none());
        assert!(grid.try_grid_index(&Vector3::new(0.3, 0., 0.)).is_err());
    }

    #[test]
    fn cells_are_tiled_by_six_tetrahedra() {
        let grid = create_monkhorst_pack_grid([3, 2, 2]).unwrap();
        let tetrahedra = grid.tetrahedra();
        assert_eq!(tetrahedra.len(), 6 * grid.len());
        // Every grid point is a corner of some tetrahedron
        let mut seen = vec![false; grid.len()];
        tetrahedra
            .iter()
            .flat_map(|tetrahedron| tetrahedron.corners())
            .for_each(|corner| seen[corner] = true);
        assert!(seen.into_iter().all(|x| x));
    }

    proptest! {
        #[test]
        fn folding_respects_negation_and_conservation(
            dimensions in prop::array::uniform3(1usize..7),
            seeds in prop::array::uniform3(any::<usize>()),
        ) {
            let grid = create_monkhorst_pack_grid(dimensions).unwrap();
            let [a, b, c] = seeds.map(|seed| seed % grid.len());

            let minus_a = grid.fold(&(-grid.kpoint(a).fractional()));
            prop_assert_eq!(minus_a, grid.fold_difference(grid.gamma(), a));
            prop_assert_eq!(minus_a, grid.negate(a));

            let d = grid.fold_difference3(a, b, c);
            prop_assert!(grid.conservation_residual(&[grid.negate(a), b, c, d]) < 1e-12);
            prop_assert_eq!(grid.fold_difference(grid.fold_difference(a, b), c), d);
        }
    }
}
