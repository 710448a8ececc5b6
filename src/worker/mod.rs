mod pool;
mod task;

pub use pool::{WorkerConfig, WorkerPool};
pub use task::CompressionTask;
