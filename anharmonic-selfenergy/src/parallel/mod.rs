//! # Parallel
//!
//! Work is split at two levels. Across workers the outer loop of each sum is partitioned round-robin
//! and the partial results are combined with a collective sum; within a worker the inner loops run on
//! the `rayon` thread pool.
//!
//! Workers communicate only through the `Communicator` trait. `SingleProcess` is the trivial
//! one-worker case and `SimulatedWorld` runs several workers as threads in one process. With the
//! `mpi-support` feature `MpiCommunicator` places each worker in its own MPI process.

#[cfg(feature = "mpi-support")]
mod message_passing;
mod simulated;

#[cfg(feature = "mpi-support")]
pub use message_passing::MpiCommunicator;
pub use simulated::{SimulatedRank, SimulatedWorld};

/// Collective operations between cooperating workers
pub trait Communicator: Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// The worker responsible for output
    fn is_root(&self) -> bool {
        self.rank() == 0
    }

    /// Element-wise sum of `values` over all workers, returned to every worker
    ///
    /// Contributions are added in rank order, so the result does not depend on scheduling. Every
    /// worker must contribute the same number of values.
    fn reduce_sum(&self, values: Vec<f64>) -> Vec<f64>;

    /// The indices in `0..n` owned by this worker
    fn partition(&self, n: usize) -> Vec<usize> {
        (0..n).filter(|i| i % self.size() == self.rank()).collect()
    }
}

/// A run with a single worker
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn reduce_sum(&self, values: Vec<f64>) -> Vec<f64> {
        values
    }
}
