use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use zip_pack::{crc::crc32, Config, Entry, ParallelPacker, ZipDecoder, ZipEncoder};

fn sample_entries(count: usize, size: usize) -> Vec<Entry> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            // half text-like, half random
            let data: Vec<u8> = if i % 2 == 0 {
                b"the quick brown fox jumps over the lazy dog "
                    .iter()
                    .cycle()
                    .take(size)
                    .copied()
                    .collect()
            } else {
                (0..size).map(|_| rng.gen()).collect()
            };
            Entry::new(format!("file-{}.bin", i), data)
        })
        .collect()
}

pub fn crc_benchmark(c: &mut Criterion) {
    let data = vec![0xA5u8; 1024 * 1024];
    let mut group = c.benchmark_group("crc32");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("1mb", |b| b.iter(|| crc32(black_box(&data), 0)));
    group.finish();
}

pub fn zip_processing_benchmark(c: &mut Criterion) {
    let entries = sample_entries(16, 64 * 1024);
    let encoder = ZipEncoder::new();
    let archive = encoder.encode(&entries).unwrap();
    let decoder = ZipDecoder::new();

    c.bench_function("encode_16x64k", |b| {
        b.iter(|| encoder.encode(black_box(&entries)).unwrap())
    });

    c.bench_function("decode_16x64k", |b| {
        b.iter(|| decoder.decode(black_box(&archive)).unwrap())
    });

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let packer = ParallelPacker::new(&Config::default()).unwrap();
    let (packer, entries) = (&packer, &entries);
    c.bench_function("parallel_pack_16x64k", |b| {
        b.to_async(&runtime)
            .iter(|| async move { packer.pack(black_box(entries.clone())).await.unwrap() });
    });
}

criterion_group!(benches, crc_benchmark, zip_processing_benchmark);
criterion_main!(benches);
