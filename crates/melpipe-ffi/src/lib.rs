//! melpipe FFI – C ABI over the fixed-shape frontend
//!
//! All entry points wrap Rust calls in `std::panic::catch_unwind` so a panic
//! never unwinds into the host process.

pub mod c_api;
