//! Workers as MPI processes
//!
//! Collectives are only ever issued from the main thread of each process. The `rayon` pool inside a
//! process never touches MPI, so funneled threading is sufficient.

use super::Communicator;
use ::mpi::{
    environment::Universe,
    topology::SystemCommunicator,
    traits::{Communicator as _, CommunicatorCollectives as _},
    Threading,
};

/// The world of processes started by the MPI launcher
#[derive(Clone, Copy, Debug)]
pub struct MpiCommunicator {
    rank: usize,
    size: usize,
}

impl MpiCommunicator {
    /// Initialises MPI, returning `None` when it was already initialised
    ///
    /// MPI is finalised when the returned `Universe` is dropped, so it must outlive every
    /// `MpiCommunicator`.
    pub fn initialize() -> Option<(Universe, Self)> {
        let (universe, _) = ::mpi::initialize_with_threading(Threading::Funneled)?;
        let communicator = Self::from_world(&universe.world());
        Some((universe, communicator))
    }

    /// The world communicator of an MPI environment which is already initialised
    pub fn world() -> Self {
        Self::from_world(&SystemCommunicator::world())
    }

    fn from_world(world: &SystemCommunicator) -> Self {
        Self {
            rank: world.rank() as usize,
            size: world.size() as usize,
        }
    }
}

impl Communicator for MpiCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn reduce_sum(&self, values: Vec<f64>) -> Vec<f64> {
        if values.is_empty() {
            return values;
        }
        // Gathering every contribution fixes the order of summation, which `MPI_SUM` does not
        let mut contributions = vec![0.; values.len() * self.size];
        SystemCommunicator::world().all_gather_into(&values[..], &mut contributions[..]);
        contributions.chunks_exact(values.len()).fold(
            vec![0.; values.len()],
            |mut total, contribution| {
                total
                    .iter_mut()
                    .zip(contribution.iter())
                    .for_each(|(sum, value)| *sum += value);
                total
            },
        )
    }
}

#[cfg(test)]
mod test {
    use super::{Communicator, MpiCommunicator};

    #[test]
    fn a_lone_process_owns_everything() {
        let (_universe, world) = MpiCommunicator::initialize().unwrap();
        assert_eq!(world.size(), 1);
        assert!(world.is_root());
        assert_eq!(world.partition(4), vec![0, 1, 2, 3]);
        assert_eq!(world.reduce_sum(vec![1.5, -2.]), vec![1.5, -2.]);
        assert_eq!(MpiCommunicator::world().rank(), 0);
    }
}
