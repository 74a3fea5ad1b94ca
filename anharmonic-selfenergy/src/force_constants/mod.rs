//! Real-space cubic and quartic interatomic force constants
//!
//! Each tensor element is stored sparsely as a value and the `N` displacement coordinates it
//! couples. Values are in Ry / Bohr^N.

use crate::{crystal::Crystal, error::BuildError};
use serde::Deserialize;
use std::convert::TryFrom;

/// A displacement coordinate: cartesian `component` of `atom` in supercell image `cell`
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct AtomIndex {
    pub atom: usize,
    pub cell: usize,
    pub component: usize,
}

impl AtomIndex {
    pub fn new(atom: usize, cell: usize, component: usize) -> Self {
        Self {
            atom,
            cell,
            component,
        }
    }

    /// Offset of this coordinate in an eigenvector
    pub(crate) fn polarisation_offset(&self) -> usize {
        3 * self.atom + self.component
    }
}

/// One element of an order-`N` force-constant tensor
#[derive(Clone, Debug, PartialEq)]
pub struct ForceConstantEntry<const N: usize> {
    pub value: f64,
    pub indices: [AtomIndex; N],
}

/// A force-constant element as it appears on disk, before the tensor order is checked
#[derive(Clone, Debug, Deserialize)]
pub struct RawForceConstant {
    pub value: f64,
    pub indices: Vec<AtomIndex>,
}

impl<const N: usize> TryFrom<&RawForceConstant> for ForceConstantEntry<N> {
    type Error = BuildError;

    fn try_from(raw: &RawForceConstant) -> Result<Self, Self::Error> {
        let indices = <[AtomIndex; N]>::try_from(raw.indices.as_slice()).map_err(|_| {
            BuildError::ForceConstant(format!(
                "an order {} force constant needs {} indices, found {}",
                N,
                N,
                raw.indices.len()
            ))
        })?;
        Ok(Self {
            value: raw.value,
            indices,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct AnharmonicForceConstants {
    pub cubic: Vec<ForceConstantEntry<3>>,
    pub quartic: Vec<ForceConstantEntry<4>>,
}

impl AnharmonicForceConstants {
    /// Builds the tensors from raw entries, checking arity and that every index exists in `crystal`
    pub fn from_raw(
        cubic: &[RawForceConstant],
        quartic: &[RawForceConstant],
        crystal: &Crystal,
    ) -> Result<Self, BuildError> {
        let cubic = cubic
            .iter()
            .map(ForceConstantEntry::<3>::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let quartic = quartic
            .iter()
            .map(ForceConstantEntry::<4>::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let force_constants = Self { cubic, quartic };
        force_constants.validate(crystal)?;
        Ok(force_constants)
    }

    pub(crate) fn validate(&self, crystal: &Crystal) -> Result<(), BuildError> {
        let indices = self
            .cubic
            .iter()
            .flat_map(|entry| entry.indices.iter())
            .chain(self.quartic.iter().flat_map(|entry| entry.indices.iter()));
        for index in indices {
            if index.atom >= crystal.number_of_atoms()
                || index.cell >= crystal.number_of_cells()
                || index.component >= 3
            {
                return Err(BuildError::ForceConstant(format!(
                    "index {:?} lies outside a crystal of {} atoms in {} cells",
                    index,
                    crystal.number_of_atoms(),
                    crystal.number_of_cells()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{AnharmonicForceConstants, AtomIndex, RawForceConstant};
    use crate::crystal::Crystal;
    use nalgebra::Vector3;

    fn crystal() -> Crystal {
        Crystal::new(
            [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
            [2, 2, 2],
            vec![Vector3::zeros()],
            vec![1.],
        )
        .unwrap()
    }

    #[test]
    fn arity_is_checked() {
        let raw = RawForceConstant {
            value: 1.,
            indices: vec![AtomIndex::new(0, 0, 0); 4],
        };
        assert!(AnharmonicForceConstants::from_raw(&[raw.clone()], &[], &crystal()).is_err());
        assert!(AnharmonicForceConstants::from_raw(&[], &[raw], &crystal()).is_ok());
    }

    #[test]
    fn out_of_range_cells_are_rejected() {
        let raw = RawForceConstant {
            value: 1.,
            indices: vec![
                AtomIndex::new(0, 0, 0),
                AtomIndex::new(0, 8, 0),
                AtomIndex::new(0, 0, 0),
            ],
        };
        assert!(AnharmonicForceConstants::from_raw(&[raw], &[], &crystal()).is_err());
    }
}
