use std::future::Future;

use futures::{stream::FuturesUnordered, StreamExt};
use tracing::trace;

use crate::{error::ZipError, Result};

/// Task scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum tasks in flight at once
    pub max_concurrent: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
        }
    }
}

/// Runs independent asynchronous tasks with a bound on how many are in flight.
///
/// A task is any `FnOnce() -> impl Future<Output = Result<T, E>>`; it may do
/// its work locally or hand it to a worker and wait for the answer. Results
/// come back in task order. A failing task only fills its own slot.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    /// Creates a scheduler, rejecting a zero concurrency bound
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        if config.max_concurrent < 1 {
            return Err(ZipError::InvalidConfiguration(
                "max_concurrent must be at least 1".into(),
            ));
        }
        Ok(Self { config })
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    /// Runs every task to completion and returns their outcomes by index
    pub async fn run<F, Fut, T, E>(&self, tasks: Vec<F>) -> Vec<std::result::Result<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let total = tasks.len();
        let mut slots: Vec<Option<std::result::Result<T, E>>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        let mut pending = tasks.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();

        for (index, task) in pending.by_ref().take(self.config.max_concurrent) {
            in_flight.push(tagged(index, task()));
        }

        while let Some((index, outcome)) = in_flight.next().await {
            slots[index] = Some(outcome);

            if let Some((next, task)) = pending.next() {
                trace!(finished = index, started = next, in_flight = in_flight.len() + 1, "refilling slot");
                in_flight.push(tagged(next, task()));
            }
        }

        slots.into_iter().flatten().collect()
    }
}

async fn tagged<Fut: Future>(index: usize, future: Fut) -> (usize, Fut::Output) {
    (index, future.await)
}

/// Runs `tasks` with at most `max_concurrency` in flight.
///
/// Fails with [`ZipError::InvalidConfiguration`] before starting anything if
/// `max_concurrency` is zero.
pub async fn run_tasks<F, Fut, T, E>(
    tasks: Vec<F>,
    max_concurrency: usize,
) -> Result<Vec<std::result::Result<T, E>>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let scheduler = Scheduler::new(SchedulerConfig {
        max_concurrent: max_concurrency,
    })?;
    Ok(scheduler.run(tasks).await)
}
