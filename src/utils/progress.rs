use crate::{error::ZipError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Byte progress shared between the packer and the terminal
pub struct Progress {
    bar: ProgressBar,
    processed: AtomicU64,
    start: Instant,
}

impl Progress {
    pub fn new(total: u64) -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] \
                     [{bar:40.cyan/blue}] \
                     {bytes}/{total_bytes} ({eta}) [{msg}]",
            )
            .map_err(|e| ZipError::InvalidConfiguration(format!("progress template: {}", e)))?
            .progress_chars("=>-");

        Ok(Self::with_bar(ProgressBar::new(total).with_style(style)))
    }

    /// Tracks progress without drawing anything
    pub fn hidden(total: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total);
        Self::with_bar(bar)
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            processed: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    pub fn update(&self, bytes: u64) {
        let processed = self.processed.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.bar.set_position(processed);

        let elapsed = self.start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let speed = processed as f64 / elapsed;
            self.bar
                .set_message(format!("{:.1} MB/s", speed / (1024.0 * 1024.0)));
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    pub fn finish(&self, message: &'static str) {
        self.bar.finish_with_message(message);
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("processed", &self.processed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_concurrent_updates() {
        let progress = Arc::new(Progress::hidden(4000));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let progress = Arc::clone(&progress);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        progress.update(10);
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(progress.processed(), 4000);
        progress.finish("done");
    }

    #[test]
    fn test_styled_bar_builds() {
        let progress = Progress::new(10).unwrap();
        progress.update(10);
        assert_eq!(progress.processed(), 10);
    }
}
