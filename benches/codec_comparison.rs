use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logroll::common::SourceFile;
use logroll::compress::{compress_file, CompressOptions, CompressionAlgorithm};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;
use tempfile::NamedTempFile;

// Log-shaped text: repetitive structure with some random fields.
fn sample_log(lines: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(42);
    let levels = ["INFO", "WARNING", "ERROR", "DEBUG"];
    let mut out = Vec::new();
    for i in 0..lines {
        writeln!(
            out,
            "2024-05-02 {:02}:{:02}:{:02} | {} | worker {} finished task {} in {}ms",
            (i / 3600) % 24,
            (i / 60) % 60,
            i % 60,
            levels[rng.gen_range(0..levels.len())],
            rng.gen_range(0..16),
            rng.gen::<u32>(),
            rng.gen_range(1..5000)
        )
        .unwrap();
    }
    out
}

fn benchmark_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress_file");
    group.sample_size(10);

    for lines in [1_000usize, 20_000] {
        let mut temp = NamedTempFile::new().unwrap();
        let data = sample_log(lines);
        temp.write_all(&data).unwrap();
        temp.flush().unwrap();
        let source = SourceFile::snapshot(temp.path()).unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));

        for algorithm in [CompressionAlgorithm::Lzma, CompressionAlgorithm::Bzip2] {
            for level in [1u32, 9] {
                let options = CompressOptions { algorithm, level, chunk_size: 8192 };
                let id = BenchmarkId::new(format!("{}-{}", algorithm, level), lines);
                group.bench_with_input(id, &options, |b, options| {
                    b.iter(|| black_box(compress_file(&source, options).unwrap().compressed_size()));
                });
            }
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_codecs);
criterion_main!(benches);
