//! Valid-padding 2D convolution over the mel matrix.
//!
//! The stage mimics an early ASR frontend layer with pinned weights:
//! a 3x3 binomial smoothing kernel (time x mel), zero bias, and ReLU.
//! As in deep-learning frameworks this is a cross-correlation; the kernel
//! is not flipped.

use crate::constants::{
    CONV_COLS, CONV_ROWS, ConvBuffer, KERNEL_SIZE, MEL_BINS, MelBuffer, N_FRAMES,
};

/// Row-major `[KERNEL_SIZE, KERNEL_SIZE]`, rows index time.
pub const CONV_KERNEL: [f64; KERNEL_SIZE * KERNEL_SIZE] = [
    0.0625, 0.125, 0.0625, //
    0.125, 0.25, 0.125, //
    0.0625, 0.125, 0.0625,
];
pub const CONV_BIAS: f64 = 0.0;

#[inline]
pub fn relu_inplace(x: &mut [f64]) {
    for v in x {
        *v = v.max(0.0);
    }
}

/// Stride-1 valid convolution of a row-major `[rows, cols]` input with a
/// square `[kernel, kernel]` kernel.
///
/// `output` is row-major `[rows - kernel + 1, cols - kernel + 1]`. Each output
/// starts from `bias` and accumulates kernel taps in row-major order.
pub fn conv2d_valid(
    output: &mut [f64],
    input: &[f64],
    rows: usize,
    cols: usize,
    weight: &[f64],
    kernel: usize,
    bias: f64,
) {
    debug_assert!(kernel > 0 && kernel <= rows && kernel <= cols);
    let out_rows = rows - kernel + 1;
    let out_cols = cols - kernel + 1;
    debug_assert_eq!(input.len(), rows * cols);
    debug_assert_eq!(weight.len(), kernel * kernel);
    debug_assert_eq!(output.len(), out_rows * out_cols);

    for (r, out_row) in output.chunks_exact_mut(out_cols).enumerate() {
        for (c, out_elem) in out_row.iter_mut().enumerate() {
            let mut sum = bias;
            for i in 0..kernel {
                let in_row = &input[(r + i) * cols + c..(r + i) * cols + c + kernel];
                let w_row = &weight[i * kernel..(i + 1) * kernel];
                for j in 0..kernel {
                    sum += w_row[j] * in_row[j];
                }
            }
            *out_elem = sum;
        }
    }
}

/// Pinned conv stage: `[N_FRAMES, MEL_BINS]` -> `[CONV_ROWS, CONV_COLS]`.
pub fn apply_conv_stage(mel: &MelBuffer, out: &mut ConvBuffer) {
    conv2d_valid(
        out,
        mel,
        N_FRAMES,
        MEL_BINS,
        &CONV_KERNEL,
        KERNEL_SIZE,
        CONV_BIAS,
    );
    relu_inplace(out);
    debug_assert_eq!(out.len(), CONV_ROWS * CONV_COLS);
}
