//! Frontend geometry description, carried by golden files and tensor dumps.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONV_COLS, CONV_ROWS, FRAME_LENGTH, HOP_LENGTH, KERNEL_SIZE, LOG_FLOOR, MEL_BINS, N_FFT,
    N_FRAMES, SAMPLE_RATE_HZ,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendParams {
    pub sample_rate_hz: u32,
    pub frame_length: usize,
    pub hop_length: usize,
    pub n_fft: usize,
    pub n_frames: usize,
    pub mel_bins: usize,
    pub conv_rows: usize,
    pub conv_cols: usize,
    pub log_floor: f64,
}

impl Default for FrontendParams {
    fn default() -> Self {
        Self::current()
    }
}

impl FrontendParams {
    /// The geometry compiled into this build.
    #[must_use]
    pub fn current() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            frame_length: FRAME_LENGTH,
            hop_length: HOP_LENGTH,
            n_fft: N_FFT,
            n_frames: N_FRAMES,
            mel_bins: MEL_BINS,
            conv_rows: CONV_ROWS,
            conv_cols: CONV_COLS,
            log_floor: LOG_FLOOR,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json).context("parse frontend params")?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize frontend params")
    }

    /// Minimum PCM samples needed to produce `n_frames` frames.
    #[must_use]
    pub fn min_samples(&self) -> usize {
        self.n_frames.saturating_sub(1) * self.hop_length + self.frame_length
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.sample_rate_hz > 0, "sample_rate_hz must be > 0");
        anyhow::ensure!(self.hop_length > 0, "hop_length must be > 0");
        anyhow::ensure!(self.frame_length > 0, "frame_length must be > 0");
        anyhow::ensure!(
            self.n_fft >= self.frame_length,
            "n_fft ({}) must cover frame_length ({})",
            self.n_fft,
            self.frame_length
        );
        anyhow::ensure!(
            self.n_frames >= KERNEL_SIZE && self.mel_bins >= KERNEL_SIZE,
            "mel matrix smaller than the conv kernel"
        );
        anyhow::ensure!(
            self.conv_rows == self.n_frames - KERNEL_SIZE + 1
                && self.conv_cols == self.mel_bins - KERNEL_SIZE + 1,
            "conv shape {}x{} is not the valid-padding shape of {}x{}",
            self.conv_rows,
            self.conv_cols,
            self.n_frames,
            self.mel_bins
        );
        anyhow::ensure!(self.log_floor > 0.0, "log_floor must be > 0");
        Ok(())
    }

    /// Reject artifacts produced with a different geometry than this build.
    pub fn ensure_compatible(&self, other: &Self) -> Result<()> {
        anyhow::ensure!(
            self == other,
            "frontend params mismatch: this build {self:?}, artifact {other:?}"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FrontendParams;

    #[test]
    fn current_is_valid() {
        let p = FrontendParams::current();
        p.validate().expect("valid");
        assert_eq!(p.min_samples(), 15_920);
        assert_eq!((p.conv_rows, p.conv_cols), (96, 78));
    }

    #[test]
    fn parse_params_smoke() {
        let json = r#"
        {
          "sample_rate_hz": 16000,
          "frame_length": 400,
          "hop_length": 160,
          "n_fft": 400,
          "n_frames": 98,
          "mel_bins": 80,
          "conv_rows": 96,
          "conv_cols": 78,
          "log_floor": 1e-10
        }
        "#;
        let p = FrontendParams::from_json_str(json).expect("params parse");
        FrontendParams::current()
            .ensure_compatible(&p)
            .expect("compatible");
    }

    #[test]
    fn rejects_inconsistent_conv_shape() {
        let mut p = FrontendParams::current();
        p.conv_cols = 80;
        let err = p.validate().expect_err("bad shape");
        assert!(err.to_string().contains("valid-padding"));
    }

    #[test]
    fn mismatch_is_reported() {
        let mut other = FrontendParams::current();
        other.mel_bins = 128;
        other.conv_cols = 126;
        other.validate().expect("self-consistent");
        assert!(FrontendParams::current().ensure_compatible(&other).is_err());
    }

    #[test]
    fn json_round_trip_preserves_floor() {
        let p = FrontendParams::current();
        let json = p.to_json_string().expect("json");
        let back = FrontendParams::from_json_str(&json).expect("parse");
        assert_eq!(back.log_floor.to_bits(), p.log_floor.to_bits());
    }
}
