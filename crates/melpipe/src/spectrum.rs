//! Power spectrum via a direct, table-driven DFT.
//!
//! A direct DFT (no FFT) keeps the summation order fixed: every bin is a
//! left-to-right sum over `n = 0..N_FFT`, so results are bit-reproducible
//! across runs and machines with the same float semantics.

use crate::constants::{N_FFT, N_FREQ};

/// Twiddle tables, `[N_FREQ * N_FFT]` row-major by bin.
#[derive(Debug)]
pub struct DftTables {
    cos: Vec<f64>,
    sin: Vec<f64>,
}

impl DftTables {
    #[must_use]
    pub fn build() -> Self {
        let mut cos = vec![0.0f64; N_FREQ * N_FFT];
        let mut sin = vec![0.0f64; N_FREQ * N_FFT];

        for k in 0..N_FREQ {
            for n in 0..N_FFT {
                // Reduce k*n mod N first so the angle stays in [0, 2*pi).
                let phase = (k * n) % N_FFT;
                let angle = 2.0 * std::f64::consts::PI * (phase as f64) / (N_FFT as f64);
                cos[k * N_FFT + n] = angle.cos();
                sin[k * N_FFT + n] = angle.sin();
            }
        }

        Self { cos, sin }
    }

    #[inline]
    fn cos_row(&self, k: usize) -> &[f64] {
        &self.cos[k * N_FFT..(k + 1) * N_FFT]
    }

    #[inline]
    fn sin_row(&self, k: usize) -> &[f64] {
        &self.sin[k * N_FFT..(k + 1) * N_FFT]
    }
}

/// Write `|X[k]|^2` for `k in 0..N_FREQ` of the windowed frame into `power`.
pub fn power_spectrum(tables: &DftTables, frame: &[f64; N_FFT], power: &mut [f64; N_FREQ]) {
    for (k, pk) in power.iter_mut().enumerate() {
        let cos_row = tables.cos_row(k);
        let sin_row = tables.sin_row(k);
        let mut re = 0.0f64;
        let mut im = 0.0f64;
        for n in 0..N_FFT {
            re += frame[n] * cos_row[n];
            im -= frame[n] * sin_row[n];
        }
        *pk = re * re + im * im;
    }
}
