//! Slaney-scale mel filterbank and log projection.
//!
//! - Slaney mel scale: linear below 1 kHz, logarithmic above
//! - Triangular filters with Slaney area normalization
//! - Natural log with a fixed floor

use crate::constants::{
    LOG_FLOOR, MEL_BINS, MEL_FMAX_HZ, MEL_FMIN_HZ, N_FFT, N_FREQ, SAMPLE_RATE_HZ,
};

const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = 15.0;

#[inline]
fn logstep() -> f64 {
    6.4f64.ln() / 27.0
}

#[must_use]
pub fn hertz_to_mel(freq: f64) -> f64 {
    if freq >= MIN_LOG_HZ {
        MIN_LOG_MEL + (freq / MIN_LOG_HZ).ln() / logstep()
    } else {
        3.0 * freq / 200.0
    }
}

#[must_use]
pub fn mel_to_hertz(mels: f64) -> f64 {
    if mels >= MIN_LOG_MEL {
        MIN_LOG_HZ * (logstep() * (mels - MIN_LOG_MEL)).exp()
    } else {
        200.0 * mels / 3.0
    }
}

/// Filter edge frequencies: `MEL_BINS + 2` points evenly spaced on the mel scale.
#[must_use]
pub fn filter_edges_hz() -> [f64; MEL_BINS + 2] {
    let mel_min = hertz_to_mel(MEL_FMIN_HZ);
    let mel_max = hertz_to_mel(MEL_FMAX_HZ);
    let mut edges = [0.0f64; MEL_BINS + 2];
    for (i, v) in edges.iter_mut().enumerate() {
        let mel = mel_min + (mel_max - mel_min) * (i as f64) / ((MEL_BINS + 1) as f64);
        *v = mel_to_hertz(mel);
    }
    edges
}

/// Peak frequency of band `m`.
#[must_use]
pub fn band_center_hz(m: usize) -> f64 {
    filter_edges_hz()[m + 1]
}

/// Build the filterbank, band-major: `filters[m * N_FREQ + k]`.
#[must_use]
pub fn build_mel_filters() -> Vec<f64> {
    let mut fft_freqs = [0.0f64; N_FREQ];
    for (k, v) in fft_freqs.iter_mut().enumerate() {
        *v = (k as f64) * f64::from(SAMPLE_RATE_HZ) / (N_FFT as f64);
    }

    let edges = filter_edges_hz();

    let mut filters = vec![0.0f64; MEL_BINS * N_FREQ];
    for m in 0..MEL_BINS {
        let lower = edges[m + 1] - edges[m];
        let upper = edges[m + 2] - edges[m + 1];
        let enorm = 2.0 / (edges[m + 2] - edges[m]);
        let row = &mut filters[m * N_FREQ..(m + 1) * N_FREQ];
        for (k, w) in row.iter_mut().enumerate() {
            let down = (fft_freqs[k] - edges[m]) / lower;
            let up = (edges[m + 2] - fft_freqs[k]) / upper;
            *w = down.min(up).max(0.0) * enorm;
        }
    }

    filters
}

/// Project one power spectrum onto the filterbank and write
/// `ln(max(energy, LOG_FLOOR))` into `out_row`.
pub fn project_log_mel(filters: &[f64], power: &[f64; N_FREQ], out_row: &mut [f64]) {
    debug_assert_eq!(filters.len(), MEL_BINS * N_FREQ);
    debug_assert_eq!(out_row.len(), MEL_BINS);

    for (out_m, filt) in out_row.iter_mut().zip(filters.chunks_exact(N_FREQ)) {
        let mut sum = 0.0f64;
        for k in 0..N_FREQ {
            sum += filt[k] * power[k];
        }
        *out_m = sum.max(LOG_FLOOR).ln();
    }
}
