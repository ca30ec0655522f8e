//! Process-wide, read-only frontend tables.

use std::sync::OnceLock;

use crate::constants::{FRAME_LENGTH, MEL_BINS, N_FREQ};
use crate::frame::build_hann_window;
use crate::mel::build_mel_filters;
use crate::spectrum::DftTables;

static TABLES: OnceLock<FrontendTables> = OnceLock::new();

/// Window, DFT twiddles and mel filterbank. Built once, never mutated.
#[derive(Debug)]
pub struct FrontendTables {
    window: [f64; FRAME_LENGTH],
    dft: DftTables,
    mel_filters: Vec<f64>, // [MEL_BINS * N_FREQ]
}

impl FrontendTables {
    /// Shared instance, built on first access.
    pub fn global() -> &'static Self {
        TABLES.get_or_init(|| {
            let tables = Self::build();
            tracing::debug!(
                mel_bins = MEL_BINS,
                freq_bins = N_FREQ,
                "built frontend tables"
            );
            tables
        })
    }

    #[must_use]
    pub fn build() -> Self {
        Self {
            window: build_hann_window(),
            dft: DftTables::build(),
            mel_filters: build_mel_filters(),
        }
    }

    pub fn window(&self) -> &[f64; FRAME_LENGTH] {
        &self.window
    }

    pub fn dft(&self) -> &DftTables {
        &self.dft
    }

    pub fn mel_filters(&self) -> &[f64] {
        &self.mel_filters
    }
}

#[cfg(test)]
mod tests {
    use super::FrontendTables;

    #[test]
    fn global_is_a_single_instance() {
        let a = FrontendTables::global();
        let b = FrontendTables::global();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn rebuild_matches_global_bit_for_bit() {
        let fresh = FrontendTables::build();
        let global = FrontendTables::global();
        assert_eq!(fresh.window(), global.window());
        assert_eq!(fresh.mel_filters(), global.mel_filters());
    }
}
