//! Controls the deserialization and storage of the crystal structure, the phonon states and the
//! anharmonic force constants which together define a calculation

/// The deserialization of the system file
pub(crate) mod reader;

pub use reader::SystemFile;

use crate::error::BuildError;
use nalgebra::{Matrix3, Vector3};

/// Tolerance below which a lattice determinant is considered singular
const SINGULAR_LATTICE: f64 = 1e-12;

/// The primitive crystal and the supercell on which the real-space force constants are defined
#[derive(Clone, Debug)]
pub struct Crystal {
    /// The primitive lattice vectors, stored as columns, in Bohr
    lattice: Matrix3<f64>,
    /// Maps fractional wavevectors to Cartesian ones in inverse Bohr
    reciprocal: Matrix3<f64>,
    /// Multiplicity of the supercell along each primitive lattice vector
    supercell: [usize; 3],
    /// Atomic positions in primitive fractional coordinates
    positions: Vec<Vector3<f64>>,
    /// Atomic masses in Rydberg mass units
    masses: Vec<f64>,
}

impl Crystal {
    /// Builds the crystal from lattice vectors given as rows, checking the lattice is not singular
    pub fn new(
        lattice_vectors: [[f64; 3]; 3],
        supercell: [usize; 3],
        positions: Vec<Vector3<f64>>,
        masses: Vec<f64>,
    ) -> Result<Self, BuildError> {
        let lattice = Matrix3::from_fn(|row, column| lattice_vectors[column][row]);
        let determinant = lattice.determinant();
        if determinant.abs() < SINGULAR_LATTICE {
            return Err(BuildError::SingularLattice("primitive", determinant));
        }
        let reciprocal = lattice
            .transpose()
            .try_inverse()
            .ok_or(BuildError::SingularLattice("primitive", determinant))?
            * (2. * std::f64::consts::PI);
        if supercell.iter().any(|&n| n == 0) {
            return Err(BuildError::Configuration(format!(
                "supercell multiplicities must be positive, got {:?}",
                supercell
            )));
        }
        if positions.is_empty() || positions.len() != masses.len() {
            return Err(BuildError::Configuration(format!(
                "{} atomic positions were given with {} masses",
                positions.len(),
                masses.len()
            )));
        }
        if let Some(mass) = masses.iter().find(|&&mass| mass <= 0.) {
            return Err(BuildError::Configuration(format!(
                "atomic masses must be positive, got {}",
                mass
            )));
        }
        Ok(Self {
            lattice,
            reciprocal,
            supercell,
            positions,
            masses,
        })
    }

    pub fn number_of_atoms(&self) -> usize {
        self.positions.len()
    }

    pub fn number_of_cells(&self) -> usize {
        self.supercell.iter().product()
    }

    pub fn number_of_branches(&self) -> usize {
        3 * self.number_of_atoms()
    }

    pub fn inverse_sqrt_mass(&self, atom: usize) -> f64 {
        1. / self.masses[atom].sqrt()
    }

    /// Cartesian length of the fractional wavevector `xk`
    pub fn wavevector_length(&self, xk: &Vector3<f64>) -> f64 {
        (self.reciprocal * xk).norm()
    }

    /// The lattice translation of supercell image `cell`, in primitive fractional coordinates
    pub fn translation(&self, cell: usize) -> Vector3<f64> {
        let [_, n2, n3] = self.supercell;
        Vector3::new(
            (cell / (n2 * n3)) as f64,
            ((cell / n3) % n2) as f64,
            (cell % n3) as f64,
        )
    }

    /// The vector from atom `from` to the periodic image of atom `to` nearest to it in the supercell,
    /// in primitive fractional coordinates.
    ///
    /// The difference is first wrapped into the supercell cube `[-1/2, 1/2]`, then the neighbouring
    /// images are compared by Cartesian length. Ties keep the wrapped image, so that the vector from
    /// `to` to `from` is always the negation of the vector from `from` to `to`.
    pub fn minimum_image(&self, from: (usize, usize), to: (usize, usize)) -> Vector3<f64> {
        let multiplicity = Vector3::new(
            self.supercell[0] as f64,
            self.supercell[1] as f64,
            self.supercell[2] as f64,
        );
        let difference = (self.positions[to.0] + self.translation(to.1))
            - (self.positions[from.0] + self.translation(from.1));
        let mut wrapped = difference.component_div(&multiplicity);
        wrapped.iter_mut().for_each(|x| *x -= x.round());

        let cartesian = |supercell_fractional: &Vector3<f64>| {
            self.lattice * supercell_fractional.component_mul(&multiplicity)
        };

        let mut nearest = wrapped;
        let mut shortest = cartesian(&wrapped).norm();
        for i in -1..=1 {
            for j in -1..=1 {
                for l in -1..=1 {
                    let candidate = wrapped + Vector3::new(i as f64, j as f64, l as f64);
                    let length = cartesian(&candidate).norm();
                    if length < shortest - 1e-10 {
                        nearest = candidate;
                        shortest = length;
                    }
                }
            }
        }
        nearest.component_mul(&multiplicity)
    }
}

#[cfg(test)]
mod test {
    use super::Crystal;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn cubic(supercell: [usize; 3]) -> Crystal {
        Crystal::new(
            [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
            supercell,
            vec![Vector3::zeros()],
            vec![1.],
        )
        .unwrap()
    }

    #[test]
    fn singular_lattices_are_rejected() {
        let result = Crystal::new(
            [[1., 0., 0.], [2., 0., 0.], [0., 0., 1.]],
            [2, 2, 2],
            vec![Vector3::zeros()],
            vec![1.],
        );
        assert!(result.is_err());
    }

    #[test]
    fn neighbouring_cells_are_one_lattice_vector_apart() {
        let crystal = cubic([4, 4, 4]);
        // cell 16 is the translation (1, 0, 0), cell 48 is (3, 0, 0) which wraps to (-1, 0, 0)
        assert_eq!(crystal.translation(16), Vector3::new(1., 0., 0.));
        assert_eq!(crystal.minimum_image((0, 0), (0, 16)), Vector3::new(1., 0., 0.));
        assert_eq!(crystal.minimum_image((0, 0), (0, 48)), Vector3::new(-1., 0., 0.));
    }

    #[test]
    fn wavevectors_are_measured_in_the_reciprocal_metric() {
        let crystal = Crystal::new(
            [[2., 0., 0.], [0., 4., 0.], [0., 0., 1.]],
            [1, 1, 1],
            vec![Vector3::zeros()],
            vec![1.],
        )
        .unwrap();
        let pi = std::f64::consts::PI;
        assert_relative_eq!(crystal.wavevector_length(&Vector3::new(0.5, 0., 0.)), pi / 2.);
        assert_relative_eq!(crystal.wavevector_length(&Vector3::new(0., 0.5, 0.)), pi / 4.);
        assert_relative_eq!(
            crystal.wavevector_length(&Vector3::new(0., 0.5, 0.5)),
            (pi * pi / 16. + pi * pi).sqrt()
        );
    }

    #[test]
    fn minimum_image_is_antisymmetric() {
        let crystal = Crystal::new(
            [[1., 0., 0.], [0.5, 0.8, 0.], [0., 0.2, 1.3]],
            [3, 2, 4],
            vec![Vector3::zeros(), Vector3::new(0.5, 0.25, 0.4)],
            vec![1., 2.],
        )
        .unwrap();
        for cell_a in 0..crystal.number_of_cells() {
            for cell_b in 0..crystal.number_of_cells() {
                let forward = crystal.minimum_image((0, cell_a), (1, cell_b));
                let backward = crystal.minimum_image((1, cell_b), (0, cell_a));
                assert_relative_eq!(forward, -backward, epsilon = 1e-12);
            }
        }
    }
}
