use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xet_core::chunker::chunk_all;
use xet_core::codec::{compress, CompressionType};

fn splitmix64_buffer(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut state = 0u64;
    while out.len() < len {
        state = state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^= z >> 31;
        out.extend_from_slice(&z.to_le_bytes());
    }
    out.truncate(len);
    out
}

fn bench_chunker(c: &mut Criterion) {
    let data = splitmix64_buffer(4 * 1024 * 1024);
    c.bench_function("chunk_all 4MiB", |b| {
        b.iter(|| chunk_all(black_box(&data)))
    });
}

fn bench_codecs(c: &mut Criterion) {
    let data = splitmix64_buffer(1024 * 1024);
    let mut group = c.benchmark_group("compress 1MiB");
    for ty in [CompressionType::Lz4, CompressionType::ByteGrouping4Lz4, CompressionType::FullBitsliceLz4] {
        group.bench_function(format!("{:?}", ty.tag()), |b| {
            b.iter(|| compress(black_box(&data), ty).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chunker, bench_codecs);
criterion_main!(benches);
