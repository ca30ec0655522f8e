//! Golden reference files and output divergence.
//!
//! A golden file is JSON: the frontend params it was produced with, a free-form
//! label, an optional description of the synthetic input signal, and both
//! flattened outputs.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::sine_pcm;
use crate::constants::{CONV_OUT_LEN, MEL_OUT_LEN};
use crate::params::FrontendParams;
use crate::pipeline::FeatureMaps;

/// Denominator floor for the reported relative error.
pub const REL_DENOM_FLOOR: f64 = 1e-12;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;
/// Absolute slack, in natural-log units, added to the relative bound.
/// ReLU outputs sit at or near zero where a purely relative bound is unusable.
pub const DEFAULT_ABS_TOLERANCE: f64 = 1e-6;

/// Elementwise acceptance bound: `|a - e| <= abs + rel * |e|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub rel: f64,
    pub abs: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE, DEFAULT_ABS_TOLERANCE)
    }
}

impl Tolerance {
    #[must_use]
    pub const fn new(rel: f64, abs: f64) -> Self {
        Self { rel, abs }
    }

    /// Bitwise-equal values always pass; NaN against anything else never does.
    #[must_use]
    pub fn admits(&self, actual: f64, expected: f64) -> bool {
        if actual.to_bits() == expected.to_bits() {
            return true;
        }
        if actual.is_nan() || expected.is_nan() {
            return false;
        }
        (actual - expected).abs() <= self.abs + self.rel * expected.abs()
    }
}

/// Worst-case elementwise difference between two equally shaped outputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Divergence {
    pub max_abs: f64,
    pub max_rel: f64,
    pub worst_index: usize,
    /// Elements outside the tolerance this divergence was measured with.
    pub failures: usize,
}

impl Divergence {
    #[must_use]
    pub fn between(actual: &[f64], expected: &[f64], tolerance: Tolerance) -> Self {
        debug_assert_eq!(actual.len(), expected.len());
        let mut out = Self {
            max_abs: 0.0,
            max_rel: 0.0,
            worst_index: 0,
            failures: 0,
        };
        for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
            let (abs, rel) = if a.to_bits() == e.to_bits() {
                (0.0, 0.0)
            } else if a.is_nan() || e.is_nan() {
                (f64::INFINITY, f64::INFINITY)
            } else {
                let abs = (a - e).abs();
                (abs, abs / e.abs().max(REL_DENOM_FLOOR))
            };
            if rel > out.max_rel {
                out.max_rel = rel;
                out.worst_index = i;
            }
            out.max_abs = out.max_abs.max(abs);
            if !tolerance.admits(a, e) {
                out.failures += 1;
            }
        }
        out
    }

    #[must_use]
    pub fn within(&self) -> bool {
        self.failures == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GoldenReport {
    pub tolerance: Tolerance,
    pub mel: Divergence,
    pub conv: Divergence,
}

impl GoldenReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.mel.within() && self.conv.within()
    }
}

/// Synthetic input a golden file was produced from, so it can be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoldenSignal {
    Sine {
        freq_hz: f64,
        amplitude: f32,
        n_samples: usize,
    },
}

impl GoldenSignal {
    /// Regenerate the s16le PCM bytes.
    #[must_use]
    pub fn pcm(&self) -> Vec<u8> {
        match *self {
            Self::Sine {
                freq_hz,
                amplitude,
                n_samples,
            } => sine_pcm(freq_hz, amplitude, n_samples),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenFile {
    pub params: FrontendParams,
    pub label: String,
    /// Absent for recorded audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<GoldenSignal>,
    pub mel: Vec<f64>,
    pub conv: Vec<f64>,
}

impl GoldenFile {
    #[must_use]
    pub fn from_maps(
        label: impl Into<String>,
        signal: Option<GoldenSignal>,
        maps: &FeatureMaps,
    ) -> Self {
        Self {
            params: FrontendParams::current(),
            label: label.into(),
            signal,
            mel: maps.mel.to_vec(),
            conv: maps.conv.to_vec(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let golden: Self = serde_json::from_str(json).context("parse golden file")?;
        golden.params.validate()?;
        FrontendParams::current().ensure_compatible(&golden.params)?;
        anyhow::ensure!(
            golden.mel.len() == MEL_OUT_LEN,
            "golden mel has {} values, expected {MEL_OUT_LEN}",
            golden.mel.len()
        );
        anyhow::ensure!(
            golden.conv.len() == CONV_OUT_LEN,
            "golden conv has {} values, expected {CONV_OUT_LEN}",
            golden.conv.len()
        );
        Ok(golden)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let json = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read {}", path_ref.display()))?;
        Self::from_json_str(&json).with_context(|| format!("load {}", path_ref.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ref = path.as_ref();
        let json = serde_json::to_vec_pretty(self).context("serialize golden file")?;
        std::fs::write(path_ref, json).with_context(|| format!("write {}", path_ref.display()))
    }

    #[must_use]
    pub fn check(&self, maps: &FeatureMaps, tolerance: Tolerance) -> GoldenReport {
        GoldenReport {
            tolerance,
            mel: Divergence::between(&maps.mel[..], &self.mel, tolerance),
            conv: Divergence::between(&maps.conv[..], &self.conv, tolerance),
        }
    }
}
