mod progress;

pub use progress::Progress;
