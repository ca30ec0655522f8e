use melpipe::audio::sine_pcm;
use melpipe::constants::{
    CONV_COLS, CONV_OUT_LEN, CONV_ROWS, LOG_FLOOR, MEL_BINS, MEL_OUT_LEN, MIN_PCM_BYTES,
    MIN_SAMPLES, N_FRAMES,
};
use melpipe::conv::{CONV_BIAS, CONV_KERNEL};
use melpipe::mel::band_center_hz;
use melpipe::{FeatureMaps, FeaturePipeline, PipelineError, run_pipeline};

fn noise_pcm(n_samples: usize, seed: u32) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(n_samples * 2);
    for _ in 0..n_samples {
        s = s.wrapping_mul(1664525).wrapping_add(1013904223);
        out.extend_from_slice(&((s >> 16) as u16 as i16).to_le_bytes());
    }
    out
}

fn argmax(row: &[f64]) -> usize {
    let mut best = 0usize;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

#[test]
fn shapes_and_finiteness_for_minimum_input() {
    let pcm = noise_pcm(MIN_SAMPLES, 42);
    assert_eq!(pcm.len(), 31_840);

    let mut mel = [0.0f64; MEL_OUT_LEN];
    let mut conv = [0.0f64; CONV_OUT_LEN];
    run_pipeline(&pcm, &mut mel, &mut conv).expect("run");

    assert_eq!(mel.len(), N_FRAMES * MEL_BINS);
    assert_eq!(conv.len(), CONV_ROWS * CONV_COLS);
    assert!(mel.iter().all(|v| v.is_finite()));
    assert!(conv.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn one_sample_short_is_rejected() {
    let pcm = noise_pcm(MIN_SAMPLES - 1, 1);
    let err = FeaturePipeline::new().extract(&pcm).expect_err("short");
    assert_eq!(
        err,
        PipelineError::InsufficientInput {
            needed: 15_920,
            got: 15_919
        }
    );
    assert!(err.to_string().contains("15920"));
}

#[test]
fn odd_byte_count_is_rejected() {
    let mut pcm = noise_pcm(MIN_SAMPLES + 10, 1);
    pcm.push(0x7f);
    let err = FeaturePipeline::new().extract(&pcm).expect_err("odd");
    assert_eq!(
        err,
        PipelineError::MalformedInput {
            len: MIN_PCM_BYTES + 21
        }
    );
}

#[test]
fn identical_input_gives_bit_identical_output() {
    let pcm = noise_pcm(MIN_SAMPLES + 777, 9);
    let copy = pcm.clone();
    let a = FeaturePipeline::new().extract(&pcm).expect("a");
    let b = FeaturePipeline::new().extract(&copy).expect("b");
    assert!(a.bit_identical(&b));
}

#[test]
fn silence_matches_floor_and_kernel_applied_to_constant() {
    let pcm = vec![0u8; MIN_PCM_BYTES];
    let maps = FeaturePipeline::new().extract(&pcm).expect("silence");

    let floor = LOG_FLOOR.ln();
    assert!(maps.mel.iter().all(|&v| v == floor));

    let mut expect = CONV_BIAS;
    for w in CONV_KERNEL {
        expect += w * floor;
    }
    let expect = expect.max(0.0);
    assert!(maps.conv.iter().all(|&v| v == expect));
}

#[test]
fn sine_energy_concentrates_near_its_band() {
    let freq = 1000.0;
    let pcm = sine_pcm(freq, 0.5, MIN_SAMPLES);
    let maps = FeaturePipeline::new().extract(&pcm).expect("sine");

    let nearest = (0..MEL_BINS)
        .min_by(|&a, &b| {
            let da = (band_center_hz(a) - freq).abs();
            let db = (band_center_hz(b) - freq).abs();
            da.total_cmp(&db)
        })
        .expect("bands");

    for t in 0..N_FRAMES {
        let row = maps.mel_row(t);
        let peak = argmax(row);
        assert!(
            peak.abs_diff(nearest) <= 1,
            "frame {t}: peak band {peak}, nearest band {nearest}"
        );
        // Bands far from the tone sit orders of magnitude lower.
        assert!(row[peak] - row[0] > 5.0);
        assert!(row[peak] - row[MEL_BINS - 1] > 5.0);
    }
}

#[test]
fn louder_signal_raises_log_mel_by_log_of_power_ratio() {
    let quiet = sine_pcm(2000.0, 0.1, MIN_SAMPLES);
    let loud = sine_pcm(2000.0, 0.4, MIN_SAMPLES);
    let p = FeaturePipeline::new();
    let q = p.extract(&quiet).expect("quiet");
    let l = p.extract(&loud).expect("loud");

    // 4x amplitude -> 16x power -> +ln(16) at the peak band, up to quantization.
    let t = N_FRAMES / 2;
    let peak = argmax(l.mel_row(t));
    let delta = l.mel_row(t)[peak] - q.mel_row(t)[peak];
    assert!((delta - 16.0f64.ln()).abs() < 1e-2, "delta {delta}");
}

#[test]
fn threads_share_tables_and_agree() {
    let pcm = noise_pcm(MIN_SAMPLES, 1234);
    let reference = FeaturePipeline::new().extract(&pcm).expect("reference");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pcm = pcm.clone();
            std::thread::spawn(move || {
                let mut maps = FeatureMaps::zeroed();
                FeaturePipeline::new()
                    .run(&pcm, &mut maps.mel, &mut maps.conv)
                    .expect("run");
                maps
            })
        })
        .collect();

    for h in handles {
        let maps = h.join().expect("join");
        assert!(maps.bit_identical(&reference));
    }
}
