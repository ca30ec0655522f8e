//! C-compatible API for hosts that load the pipeline as a shared library.
//!
//! `melpipe_run` return values:
//! - 0 = success
//! - 1 = insufficient input (fewer than 15920 samples)
//! - 2 = malformed input (odd byte length)
//! - -1 = invalid argument (null pointer, negative length)
//! - -2 = internal panic
//!
//! On any non-zero status `melpipe_last_error` returns a message for the
//! calling thread.
//!
//! `run_pipeline` keeps the original void signature for hosts that cannot
//! read a status. On failure it fills every non-null output buffer with NaN.

use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::panic::AssertUnwindSafe;

use melpipe::constants::{CONV_OUT_LEN, ConvBuffer, MEL_OUT_LEN, MelBuffer};
use melpipe::{FeaturePipeline, PipelineError};

pub const MELPIPE_OK: i32 = 0;
pub const MELPIPE_INSUFFICIENT_INPUT: i32 = 1;
pub const MELPIPE_MALFORMED_INPUT: i32 = 2;
pub const MELPIPE_INVALID_ARGUMENT: i32 = -1;
pub const MELPIPE_PANIC: i32 = -2;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        e.borrow_mut().take();
    });
}

fn status_for(err: &PipelineError) -> i32 {
    match err {
        PipelineError::InsufficientInput { .. } => MELPIPE_INSUFFICIENT_INPUT,
        PipelineError::MalformedInput { .. } => MELPIPE_MALFORMED_INPUT,
    }
}

/// # Safety
/// See [`melpipe_run`].
unsafe fn run_checked(
    pcm_ptr: *const u8,
    pcm_len: i32,
    mel_out_ptr: *mut f64,
    conv_out_ptr: *mut f64,
) -> i32 {
    if mel_out_ptr.is_null() || conv_out_ptr.is_null() {
        set_last_error("output pointer is null");
        return MELPIPE_INVALID_ARGUMENT;
    }
    let Ok(len) = usize::try_from(pcm_len) else {
        set_last_error(&format!("negative pcm length: {pcm_len}"));
        return MELPIPE_INVALID_ARGUMENT;
    };
    let pcm: &[u8] = if len == 0 {
        &[]
    } else if pcm_ptr.is_null() {
        set_last_error("pcm pointer is null");
        return MELPIPE_INVALID_ARGUMENT;
    } else {
        // SAFETY: caller guarantees `pcm_len` readable bytes at `pcm_ptr`.
        unsafe { std::slice::from_raw_parts(pcm_ptr, len) }
    };

    // SAFETY: caller guarantees exclusive, aligned storage of the fixed sizes.
    let mel_out = unsafe { &mut *mel_out_ptr.cast::<MelBuffer>() };
    let conv_out = unsafe { &mut *conv_out_ptr.cast::<ConvBuffer>() };

    match FeaturePipeline::new().run(pcm, mel_out, conv_out) {
        Ok(()) => {
            clear_last_error();
            MELPIPE_OK
        }
        Err(err) => {
            tracing::debug!(%err, "melpipe_run rejected input");
            set_last_error(&err.to_string());
            status_for(&err)
        }
    }
}

/// Build the process-wide tables eagerly, e.g. at library load time.
#[unsafe(no_mangle)]
pub extern "C" fn melpipe_init() -> i32 {
    std::panic::catch_unwind(|| {
        melpipe::init();
        clear_last_error();
        MELPIPE_OK
    })
    .unwrap_or_else(|_| {
        set_last_error("Panic in melpipe_init");
        MELPIPE_PANIC
    })
}

/// Run the pipeline and report the outcome as a status code.
///
/// # Safety
/// - `pcm_ptr` must point to `pcm_len` readable bytes (it may be NULL only
///   when `pcm_len` is 0).
/// - `mel_out_ptr` must point to 7840 writable, aligned `f64`s and
///   `conv_out_ptr` to 7488, neither aliasing the other nor the input.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn melpipe_run(
    pcm_ptr: *const u8,
    pcm_len: i32,
    mel_out_ptr: *mut f64,
    conv_out_ptr: *mut f64,
) -> i32 {
    std::panic::catch_unwind(AssertUnwindSafe(|| unsafe {
        run_checked(pcm_ptr, pcm_len, mel_out_ptr, conv_out_ptr)
    }))
    .unwrap_or_else(|_| {
        set_last_error("Panic in melpipe_run");
        MELPIPE_PANIC
    })
}

/// Original no-status entry point. Errors are signalled by NaN-filling the
/// outputs and can be inspected with `melpipe_last_error`.
///
/// # Safety
/// Same contract as [`melpipe_run`]; null output pointers are skipped.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn run_pipeline(
    pcm_ptr: *const u8,
    pcm_len: i32,
    mel_out_ptr: *mut f64,
    conv_out_ptr: *mut f64,
) {
    let status = unsafe { melpipe_run(pcm_ptr, pcm_len, mel_out_ptr, conv_out_ptr) };
    if status == MELPIPE_OK {
        return;
    }
    for (ptr, len) in [(mel_out_ptr, MEL_OUT_LEN), (conv_out_ptr, CONV_OUT_LEN)] {
        if !ptr.is_null() {
            // SAFETY: caller guarantees `len` writable f64s at `ptr`.
            unsafe { std::slice::from_raw_parts_mut(ptr, len) }.fill(f64::NAN);
        }
    }
}

/// Output lengths in `f64`s, for hosts sizing their buffers at runtime.
///
/// # Safety
/// Each pointer must be NULL or valid for writing one `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn melpipe_output_lens(mel_len: *mut usize, conv_len: *mut usize) {
    if !mel_len.is_null() {
        // SAFETY: caller guarantees the pointer is writable.
        unsafe { mel_len.write(MEL_OUT_LEN) };
    }
    if !conv_len.is_null() {
        // SAFETY: as above.
        unsafe { conv_len.write(CONV_OUT_LEN) };
    }
    clear_last_error();
}

/// Get the last error message for the calling thread.
///
/// Returns a pointer to a null-terminated C string, or NULL if the last
/// `melpipe_*` / `run_pipeline` call on this thread succeeded. The string is valid until the next API call from the same thread.
///
/// # Safety
/// The returned pointer must not be freed by the caller.
#[unsafe(no_mangle)]
pub extern "C" fn melpipe_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(std::ptr::null())
    })
}
