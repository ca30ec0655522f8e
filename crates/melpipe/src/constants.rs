//! Frontend geometry and signal-processing constants.

// Audio input: 16-bit signed little-endian mono PCM.
pub const SAMPLE_RATE_HZ: u32 = 16_000;
pub const BYTES_PER_SAMPLE: usize = 2;
pub const PCM_SCALE: f64 = 32_768.0;

// Framing.
pub const FRAME_LENGTH: usize = 400; // 25ms @ 16kHz
pub const HOP_LENGTH: usize = 160; // 10ms @ 16kHz
pub const N_FFT: usize = 400;
pub const N_FREQ: usize = N_FFT / 2 + 1; // 201

// Output #1: log-mel spectrogram, [N_FRAMES, MEL_BINS] row-major.
pub const N_FRAMES: usize = 98;
pub const MEL_BINS: usize = 80;
pub const MEL_FMIN_HZ: f64 = 0.0;
pub const MEL_FMAX_HZ: f64 = SAMPLE_RATE_HZ as f64 / 2.0;
pub const LOG_FLOOR: f64 = 1e-10;
pub const MEL_OUT_LEN: usize = N_FRAMES * MEL_BINS; // 7840

// Output #2: conv feature map, [CONV_ROWS, CONV_COLS] row-major.
pub const KERNEL_SIZE: usize = 3;
pub const CONV_ROWS: usize = N_FRAMES - KERNEL_SIZE + 1; // 96
pub const CONV_COLS: usize = MEL_BINS - KERNEL_SIZE + 1; // 78
pub const CONV_OUT_LEN: usize = CONV_ROWS * CONV_COLS; // 7488

/// Samples needed to fill every mel row: the last frame starts at
/// `(N_FRAMES - 1) * HOP_LENGTH`.
pub const MIN_SAMPLES: usize = (N_FRAMES - 1) * HOP_LENGTH + FRAME_LENGTH; // 15920
pub const MIN_PCM_BYTES: usize = MIN_SAMPLES * BYTES_PER_SAMPLE; // 31840

/// Caller-owned mel output storage.
pub type MelBuffer = [f64; MEL_OUT_LEN];
/// Caller-owned conv output storage.
pub type ConvBuffer = [f64; CONV_OUT_LEN];
