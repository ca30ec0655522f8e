//! Known-signal check against committed reference outputs.
//!
//! `data/sine_440hz.json` holds mel and conv outputs for a 440 Hz, half-scale
//! tone of the minimum length, computed in double precision by an independent
//! implementation of the same frontend (librosa's Slaney filterbank, a direct
//! DFT, natural log with a 1e-10 floor, binomial 3x3 conv, ReLU).

use melpipe::FeaturePipeline;
use melpipe::constants::{LOG_FLOOR, MEL_BINS, MIN_SAMPLES};
use melpipe::golden::{GoldenFile, GoldenSignal, Tolerance};

const SINE_440: &str = include_str!("data/sine_440hz.json");

fn reference() -> GoldenFile {
    GoldenFile::from_json_str(SINE_440).expect("parse reference")
}

#[test]
fn sine_440_matches_reference_outputs() {
    let golden = reference();
    let signal = golden.signal.expect("reference records its signal");
    assert_eq!(
        signal,
        GoldenSignal::Sine {
            freq_hz: 440.0,
            amplitude: 0.5,
            n_samples: MIN_SAMPLES,
        }
    );

    let maps = FeaturePipeline::new()
        .extract(&signal.pcm())
        .expect("extract");
    let report = golden.check(&maps, Tolerance::default());
    assert!(
        report.passed(),
        "reference mismatch: mel {:?}, conv {:?}",
        report.mel,
        report.conv
    );
}

#[test]
fn first_frame_pins_individual_bands() {
    let signal = reference().signal.expect("signal");
    let maps = FeaturePipeline::new()
        .extract(&signal.pcm())
        .expect("extract");
    let row = maps.mel_row(0);
    assert_eq!(row.len(), MEL_BINS);

    for (m, expected) in [
        (0, -20.899_631_440_371_177),
        (10, 3.211_991_549_833_268),
        (30, -21.267_541_101_527_275),
        (79, -21.991_416_990_432_466),
    ] {
        let got = row[m];
        assert!(
            (got - expected).abs() <= 1e-6 * expected.abs(),
            "band {m}: got {got}, expected {expected}"
        );
    }
    // Band 13 spans roughly 485-560 Hz, past the tone and its window leakage.
    assert_eq!(row[13], LOG_FLOOR.ln());
}
