use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{
    scheduler::Scheduler,
    utils::Progress,
    worker::{CompressionTask, WorkerPool},
    zip::{Entry, ZipDecoder, ZipEncoder},
    Config, Result,
};

/// Packs and unpacks archives with per-entry work spread over a [`WorkerPool`].
///
/// Entry compression is fanned out through a [`Scheduler`], so at most
/// `max_concurrency` entries are in flight; the archive itself is laid out
/// afterwards in entry order and is identical to what [`ZipEncoder::encode`]
/// produces for the same input.
#[derive(Debug)]
pub struct ParallelPacker {
    encoder: Arc<ZipEncoder>,
    decoder: ZipDecoder,
    pool: Arc<WorkerPool>,
    scheduler: Scheduler,
    progress: Option<Arc<Progress>>,
}

impl ParallelPacker {
    pub fn new(config: &Config) -> Result<Self> {
        let encoder = ZipEncoder::new().compress_when_possible(config.compress_when_possible);
        Ok(Self::with_parts(
            encoder,
            ZipDecoder::new(),
            WorkerPool::new(config.worker_config())?,
            Scheduler::new(config.scheduler_config())?,
        ))
    }

    pub fn with_parts(
        encoder: ZipEncoder,
        decoder: ZipDecoder,
        pool: WorkerPool,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            encoder: Arc::new(encoder),
            decoder,
            pool: Arc::new(pool),
            scheduler,
            progress: None,
        }
    }

    /// Reports uncompressed bytes as each entry finishes
    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn pack(&self, entries: Vec<Entry>) -> Result<Bytes> {
        let tasks: Vec<_> = entries
            .iter()
            .map(|entry| {
                let task = CompressionTask::new(entry.clone(), Arc::clone(&self.encoder));
                let pool = Arc::clone(&self.pool);
                let progress = self.progress.clone();
                move || async move {
                    let size = task.size();
                    let result = pool.dispatch(move || task.run()).await;
                    if let Some(progress) = progress {
                        progress.update(size);
                    }
                    result
                }
            })
            .collect();

        debug!(
            entries = tasks.len(),
            max_concurrent = self.scheduler.max_concurrent(),
            "compressing entries"
        );
        let outcomes = self.scheduler.run(tasks).await;

        let mut compressed = Vec::with_capacity(entries.len());
        for (entry, outcome) in entries.iter().zip(outcomes) {
            match outcome {
                Ok(done) => compressed.push(done),
                Err(err) if err.is_environmental() => {
                    warn!(name = %entry.name, error = %err, "worker failed, storing entry locally");
                    compressed.push(ZipEncoder::store_entry(entry)?);
                }
                Err(err) => return Err(err),
            }
        }

        let archive = ZipEncoder::assemble(&compressed)?;
        info!(entries = compressed.len(), bytes = archive.len(), "archive packed");
        Ok(archive)
    }

    /// Decodes `archive` on a worker thread
    pub async fn unpack(&self, archive: Bytes) -> Result<Vec<Entry>> {
        let decoder = self.decoder.clone();
        let entries = self.pool.dispatch(move || decoder.decode(&archive)).await?;
        info!(entries = entries.len(), "archive unpacked");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compression::CompressionService, error::ZipError, worker::WorkerConfig, CompressionMethod,
        SchedulerConfig,
    };
    use chrono::NaiveDate;
    use rand::{Rng, SeedableRng};
    use std::io::{self, Read};

    fn sample_entries() -> Vec<Entry> {
        let stamp = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let noise: Vec<u8> = (0..2048).map(|_| rng.gen()).collect();

        vec![
            Entry::new("docs/readme.txt", "Some text. ".repeat(40)),
            Entry::new("noise.bin", noise),
            Entry::new("empty", Bytes::new()),
            Entry::new("docs/more.txt", "more more more ".repeat(30)),
        ]
        .into_iter()
        .map(|entry| entry.with_last_modified(stamp))
        .collect()
    }

    fn packer(encoder: ZipEncoder, max_concurrent: usize) -> ParallelPacker {
        ParallelPacker::with_parts(
            encoder,
            ZipDecoder::new(),
            WorkerPool::new(WorkerConfig {
                thread_count: Some(2),
                ..Default::default()
            })
            .unwrap(),
            Scheduler::new(SchedulerConfig { max_concurrent }).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_pack_matches_sequential_encode() {
        let entries = sample_entries();
        let expected = ZipEncoder::new().encode(&entries).unwrap();

        for k in [1, 2, 8] {
            let archive = packer(ZipEncoder::new(), k).pack(entries.clone()).await.unwrap();
            assert_eq!(archive, expected, "max_concurrent = {}", k);
        }
    }

    #[tokio::test]
    async fn test_pack_unpack_round_trip() {
        let entries = sample_entries();
        let packer = packer(ZipEncoder::new(), 3);

        let archive = packer.pack(entries.clone()).await.unwrap();
        let decoded = packer.unpack(archive).await.unwrap();
        assert_eq!(decoded, entries);
    }

    #[tokio::test]
    async fn test_progress_counts_every_entry() {
        let entries = sample_entries();
        let total: u64 = entries.iter().map(|e| e.size() as u64).sum();
        let progress = Arc::new(Progress::hidden(total));

        let packer = packer(ZipEncoder::new(), 2).with_progress(Arc::clone(&progress));
        packer.pack(entries).await.unwrap();
        assert_eq!(progress.processed(), total);
    }

    struct Panicking;

    impl CompressionService for Panicking {
        fn compress<'a>(&self, _input: &'a [u8]) -> io::Result<Box<dyn Read + Send + 'a>> {
            panic!("compressor crashed")
        }
    }

    #[tokio::test]
    async fn test_worker_failure_falls_back_to_stored() {
        let entries = sample_entries();
        let encoder = ZipEncoder::new().with_compressor(Arc::new(Panicking));

        let archive = packer(encoder, 2).pack(entries.clone()).await.unwrap();

        let decoder = ZipDecoder::new();
        for item in decoder.headers(&archive) {
            let (header, _) = item.unwrap();
            assert_eq!(header.compression_method, CompressionMethod::Stored as u16);
        }
        assert_eq!(decoder.decode(&archive).unwrap(), entries);
    }

    #[tokio::test]
    async fn test_entry_error_aborts_pack() {
        let mut entries = sample_entries();
        entries.push(Entry::new("n".repeat(70_000), &b"x"[..]));

        let result = packer(ZipEncoder::new(), 2).pack(entries).await;
        assert!(matches!(result, Err(ZipError::NameTooLong { len: 70_000, .. })));
    }

    #[tokio::test]
    async fn test_unpack_reports_corruption() {
        let entries = sample_entries();
        let packer = packer(ZipEncoder::stored(), 2);
        let mut archive = packer.pack(entries).await.unwrap().to_vec();

        // first payload byte of docs/readme.txt
        archive[30 + "docs/readme.txt".len()] ^= 0xFF;
        assert!(matches!(
            packer.unpack(Bytes::from(archive)).await,
            Err(ZipError::ChecksumMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_new_rejects_zero_concurrency() {
        let config = Config {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            ParallelPacker::new(&config),
            Err(ZipError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_pack() {
        let archive = packer(ZipEncoder::new(), 4).pack(Vec::new()).await.unwrap();
        assert_eq!(archive.len(), 22);
        assert!(packer(ZipEncoder::new(), 1).unpack(archive).await.unwrap().is_empty());
    }
}
