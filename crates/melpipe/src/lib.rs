//! Fixed-shape audio frontend: 16 kHz PCM -> log-mel spectrogram -> conv feature map.
//!
//! The pipeline runs entirely in host memory and writes into caller-owned
//! buffers. The only long-lived state is the frozen [`tables::FrontendTables`],
//! built once per process.

pub mod audio;
pub mod constants;
pub mod conv;
pub mod frame;
pub mod golden;
pub mod mel;
pub mod params;
pub mod pipeline;
pub mod spectrum;
pub mod tables;
pub mod tensors;

pub use constants::{ConvBuffer, MelBuffer};
pub use pipeline::{FeatureMaps, FeaturePipeline, run_pipeline};

/// Build the process-wide tables now instead of on the first pipeline call.
pub fn init() {
    let _ = tables::FrontendTables::global();
}

/// Input precondition violations. The pipeline is a pure function of its
/// input, so every error is final.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("insufficient input: need at least {needed} samples, got {got}")]
    InsufficientInput { needed: usize, got: usize },
    #[error("malformed input: {len} bytes is not a whole number of 16-bit samples")]
    MalformedInput { len: usize },
}
