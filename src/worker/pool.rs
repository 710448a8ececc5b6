use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use rayon::ThreadPoolBuilder;
use tokio::sync::oneshot;
use tracing::error;

use crate::{error::ZipError, Result};

// Maximum number of threads to prevent resource exhaustion
const MAX_THREADS: usize = 64;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub thread_count: Option<usize>,
    pub stack_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_count: None,
            stack_size: 8 * 1024 * 1024, // 8MB stack
        }
    }
}

/// Runs blocking jobs on dedicated threads and hands results back to async callers.
///
/// Jobs never block the async runtime: each result travels back over a
/// oneshot channel. A job that panics, or is dropped before it runs,
/// resolves to [`ZipError::Worker`].
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.thread_count())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(config: WorkerConfig) -> Result<Self> {
        let thread_count = match config.thread_count {
            Some(0) => {
                return Err(ZipError::InvalidConfiguration(
                    "worker thread count must be at least 1".into(),
                ))
            }
            Some(count) => count.min(MAX_THREADS),
            None => num_cpus::get().min(MAX_THREADS),
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .stack_size(config.stack_size)
            .thread_name(|i| format!("zip-pack-worker-{}", i))
            .panic_handler(|payload| {
                error!(reason = %panic_message(payload.as_ref()), "worker thread panicked");
            })
            .build()
            .map_err(|e| ZipError::Worker(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Starts `job` on the pool and returns a future for its result.
    ///
    /// The job is queued immediately; awaiting the future only waits for it.
    pub fn dispatch<F, T>(&self, job: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            // the caller may have stopped waiting
            let _ = tx.send(outcome);
        });

        async move {
            match rx.await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => {
                    let reason = panic_message(payload.as_ref());
                    error!(%reason, "job panicked on worker");
                    Err(ZipError::Worker(format!("job panicked: {}", reason)))
                }
                Err(_) => Err(ZipError::Worker("job was dropped before completing".into())),
            }
        }
    }

    /// Returns the current thread count
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
