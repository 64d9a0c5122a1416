//! Shaper and filter throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use soundbed_core::filters::{SvfMode, SvfTpt};
use soundbed_core::noise::{NoiseKind, Shaper};

fn white_stream(n: usize) -> Vec<f32> {
    let mut x: u32 = 0x1234_5678;
    (0..n)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            (x as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

fn benchmark_shapers(c: &mut Criterion) {
    let white = white_stream(48_000 * 4);
    for kind in [NoiseKind::Pink, NoiseKind::Brown] {
        c.bench_function(&format!("shape_{}_4s_48k", kind.name()), |b| {
            b.iter(|| {
                let mut shaper = Shaper::new(kind);
                let mut acc = 0.0;
                for &w in &white {
                    acc += shaper.process(black_box(w));
                }
                acc
            })
        });
    }
}

fn benchmark_svf(c: &mut Criterion) {
    let white = white_stream(48_000);
    c.bench_function("svf_bandpass_1s_48k", |b| {
        b.iter(|| {
            let mut svf = SvfTpt::new(SvfMode::Bandpass, 3500.0, 3.0, 48_000.0);
            let mut acc = 0.0;
            for &w in &white {
                acc += svf.process(black_box(w));
            }
            acc
        })
    });
}

criterion_group!(benches, benchmark_shapers, benchmark_svf);
criterion_main!(benches);
