use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use melpipe::audio::sine_pcm;
use melpipe::constants::{FRAME_LENGTH, MIN_SAMPLES, N_FREQ};
use melpipe::spectrum::power_spectrum;
use melpipe::tables::FrontendTables;
use melpipe::{FeatureMaps, FeaturePipeline};

fn bench_run(c: &mut Criterion) {
    let pcm = sine_pcm(1000.0, 0.5, MIN_SAMPLES);
    let pipeline = FeaturePipeline::new();
    let mut maps = FeatureMaps::zeroed();
    c.bench_with_input(BenchmarkId::new("run", MIN_SAMPLES), &pcm, |b, pcm| {
        b.iter(|| {
            pipeline
                .run(black_box(pcm), &mut maps.mel, &mut maps.conv)
                .expect("run");
        });
    });
}

fn bench_power_spectrum(c: &mut Criterion) {
    let tables = FrontendTables::global();
    let mut frame = [0.0f64; FRAME_LENGTH];
    for (n, x) in frame.iter_mut().enumerate() {
        *x = ((n * 37) % 101) as f64 / 101.0 - 0.5;
    }
    let mut power = [0.0f64; N_FREQ];
    c.bench_function("power_spectrum", |b| {
        b.iter(|| power_spectrum(tables.dft(), black_box(&frame), &mut power));
    });
}

fn bench_tables(c: &mut Criterion) {
    c.bench_function("tables_build", |b| b.iter(FrontendTables::build));
}

criterion_group!(benches, bench_run, bench_power_spectrum, bench_tables);
criterion_main!(benches);
