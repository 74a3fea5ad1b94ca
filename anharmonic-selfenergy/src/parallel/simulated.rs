use super::Communicator;
use std::sync::{Barrier, Mutex, MutexGuard};

struct Shared {
    size: usize,
    slots: Mutex<Vec<Vec<f64>>>,
    barrier: Barrier,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, Vec<Vec<f64>>> {
        // A poisoned lock means another worker panicked, which `run` propagates anyway
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Several workers sharing one process, each on its own thread
pub struct SimulatedWorld;

impl SimulatedWorld {
    /// Runs `f` once on each of `size` workers and returns the results in rank order
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&SimulatedRank<'_>) -> R + Sync,
    {
        let size = size.max(1);
        let shared = Shared {
            size,
            slots: Mutex::new(vec![Vec::new(); size]),
            barrier: Barrier::new(size),
        };
        std::thread::scope(|scope| {
            let handles = (0..size)
                .map(|rank| {
                    let shared = &shared;
                    let f = &f;
                    scope.spawn(move || f(&SimulatedRank { shared, rank }))
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

/// The view of a `SimulatedWorld` held by one worker
pub struct SimulatedRank<'a> {
    shared: &'a Shared,
    rank: usize,
}

impl<'a> Communicator for SimulatedRank<'a> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn reduce_sum(&self, values: Vec<f64>) -> Vec<f64> {
        self.shared.slots()[self.rank] = values;
        self.shared.barrier.wait();
        let total = {
            let slots = self.shared.slots();
            let length = slots.iter().map(Vec::len).max().unwrap_or(0);
            slots.iter().fold(vec![0.; length], |mut total, contribution| {
                total
                    .iter_mut()
                    .zip(contribution.iter())
                    .for_each(|(sum, value)| *sum += value);
                total
            })
        };
        // Nobody may overwrite a slot before every worker has read it
        self.shared.barrier.wait();
        total
    }
}
