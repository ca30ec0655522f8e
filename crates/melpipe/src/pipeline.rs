//! Pipeline driver: PCM bytes -> mel matrix -> conv matrix.
//!
//! The hot path touches only the caller's buffers, two stack scratch arrays
//! and the frozen [`FrontendTables`]. Nothing is allocated and no state
//! survives a call.

use crate::PipelineError;
use crate::constants::{
    CONV_COLS, CONV_OUT_LEN, ConvBuffer, FRAME_LENGTH, MEL_BINS, MEL_OUT_LEN, MelBuffer, N_FREQ,
};
use crate::conv::apply_conv_stage;
use crate::frame::{Framer, apply_window, decode_frame};
use crate::mel::project_log_mel;
use crate::spectrum::power_spectrum;
use crate::tables::FrontendTables;

/// Handle over the shared tables. Cheap to copy and safe to use from any
/// number of threads on independent buffers.
#[derive(Debug, Clone, Copy)]
pub struct FeaturePipeline {
    tables: &'static FrontendTables,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FeaturePipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: FrontendTables::global(),
        }
    }

    /// Compute both outputs for `pcm` into the caller's buffers.
    ///
    /// Input is validated before anything is written, so on `Err` both
    /// buffers are left as they were.
    pub fn run(
        &self,
        pcm: &[u8],
        mel_out: &mut MelBuffer,
        conv_out: &mut ConvBuffer,
    ) -> Result<(), PipelineError> {
        let framer = match Framer::new(pcm) {
            Ok(framer) => framer,
            Err(err) => {
                tracing::debug!(bytes = pcm.len(), %err, "rejected pcm buffer");
                return Err(err);
            }
        };

        let mut frame = [0.0f64; FRAME_LENGTH];
        let mut power = [0.0f64; N_FREQ];

        for (bytes, mel_row) in framer.frames().zip(mel_out.chunks_exact_mut(MEL_BINS)) {
            decode_frame(bytes, &mut frame);
            apply_window(&mut frame, self.tables.window());
            power_spectrum(self.tables.dft(), &frame, &mut power);
            project_log_mel(self.tables.mel_filters(), &power, mel_row);
        }

        apply_conv_stage(mel_out, conv_out);
        Ok(())
    }

    /// Like [`run`](Self::run) but allocates fresh output buffers.
    pub fn extract(&self, pcm: &[u8]) -> Result<FeatureMaps, PipelineError> {
        let mut maps = FeatureMaps::zeroed();
        self.run(pcm, &mut maps.mel, &mut maps.conv)?;
        Ok(maps)
    }
}

/// Run the pipeline against the process-wide tables.
pub fn run_pipeline(
    pcm: &[u8],
    mel_out: &mut MelBuffer,
    conv_out: &mut ConvBuffer,
) -> Result<(), PipelineError> {
    FeaturePipeline::new().run(pcm, mel_out, conv_out)
}

/// Owned output pair, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMaps {
    pub mel: Box<MelBuffer>,
    pub conv: Box<ConvBuffer>,
}

impl FeatureMaps {
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            mel: Box::new([0.0; MEL_OUT_LEN]),
            conv: Box::new([0.0; CONV_OUT_LEN]),
        }
    }

    #[must_use]
    pub fn mel_row(&self, t: usize) -> &[f64] {
        &self.mel[t * MEL_BINS..(t + 1) * MEL_BINS]
    }

    #[must_use]
    pub fn conv_row(&self, r: usize) -> &[f64] {
        &self.conv[r * CONV_COLS..(r + 1) * CONV_COLS]
    }

    #[must_use]
    pub fn all_finite(&self) -> bool {
        self.mel.iter().chain(self.conv.iter()).all(|v| v.is_finite())
    }

    /// Bitwise equality, so that `-0.0 != 0.0` and NaN payloads count.
    #[must_use]
    pub fn bit_identical(&self, other: &Self) -> bool {
        let same = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits());
        same(&self.mel[..], &other.mel[..]) && same(&self.conv[..], &other.conv[..])
    }
}
