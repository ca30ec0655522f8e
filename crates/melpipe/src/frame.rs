//! Framing and windowing over borrowed PCM bytes.
//!
//! Frames are decoded straight from the caller's byte buffer into a scratch
//! array; the PCM is never copied as a whole.

use crate::PipelineError;
use crate::constants::{
    BYTES_PER_SAMPLE, FRAME_LENGTH, HOP_LENGTH, MIN_SAMPLES, N_FRAMES, PCM_SCALE,
};

/// Periodic Hann window: `0.5 * (1 - cos(2*pi*n/N))`.
pub fn build_hann_window() -> [f64; FRAME_LENGTH] {
    let mut w = [0.0f64; FRAME_LENGTH];
    for (n, wn) in w.iter_mut().enumerate() {
        let angle = 2.0 * std::f64::consts::PI * (n as f64) / (FRAME_LENGTH as f64);
        *wn = 0.5 * (1.0 - angle.cos());
    }
    w
}

/// Check the byte buffer against the pipeline's input contract and return its
/// sample count.
///
/// Odd byte lengths are rejected rather than truncated. Short buffers are
/// rejected rather than zero-padded.
pub fn validate_pcm(pcm: &[u8]) -> Result<usize, PipelineError> {
    if pcm.len() % BYTES_PER_SAMPLE != 0 {
        return Err(PipelineError::MalformedInput { len: pcm.len() });
    }
    let samples = pcm.len() / BYTES_PER_SAMPLE;
    if samples < MIN_SAMPLES {
        return Err(PipelineError::InsufficientInput {
            needed: MIN_SAMPLES,
            got: samples,
        });
    }
    Ok(samples)
}

/// Yields frames `0..N_FRAMES` of a validated PCM buffer. Samples past the
/// last frame are ignored.
#[derive(Debug, Clone, Copy)]
pub struct Framer<'a> {
    pcm: &'a [u8],
}

impl<'a> Framer<'a> {
    pub fn new(pcm: &'a [u8]) -> Result<Self, PipelineError> {
        validate_pcm(pcm)?;
        Ok(Self { pcm })
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        N_FRAMES
    }

    /// First sample index of frame `index`.
    #[must_use]
    pub fn frame_start(index: usize) -> usize {
        index * HOP_LENGTH
    }

    /// Raw bytes of frame `index`, or `None` past the last frame.
    #[must_use]
    pub fn frame_bytes(&self, index: usize) -> Option<&'a [u8]> {
        if index >= N_FRAMES {
            return None;
        }
        let start = Self::frame_start(index) * BYTES_PER_SAMPLE;
        self.pcm.get(start..start + FRAME_LENGTH * BYTES_PER_SAMPLE)
    }

    /// Decode frame `index` into `out`, scaled to `[-1, 1)`.
    ///
    /// Returns `None` and leaves `out` alone when `index >= frame_count()`.
    pub fn load(&self, index: usize, out: &mut [f64; FRAME_LENGTH]) -> Option<()> {
        decode_frame(self.frame_bytes(index)?, out);
        Some(())
    }

    /// Bytes of every frame, in order.
    pub fn frames(self) -> impl Iterator<Item = &'a [u8]> {
        (0..N_FRAMES).map_while(move |i| self.frame_bytes(i))
    }
}

/// Decode `FRAME_LENGTH` s16le samples into `out`, scaled to `[-1, 1)`.
#[inline]
pub fn decode_frame(bytes: &[u8], out: &mut [f64; FRAME_LENGTH]) {
    debug_assert_eq!(bytes.len(), FRAME_LENGTH * BYTES_PER_SAMPLE);
    for (o, b) in out.iter_mut().zip(bytes.chunks_exact(BYTES_PER_SAMPLE)) {
        *o = f64::from(i16::from_le_bytes([b[0], b[1]])) / PCM_SCALE;
    }
}

/// Elementwise multiply `frame` by `window` in place.
#[inline]
pub fn apply_window(frame: &mut [f64; FRAME_LENGTH], window: &[f64; FRAME_LENGTH]) {
    for (x, w) in frame.iter_mut().zip(window.iter()) {
        *x *= *w;
    }
}
