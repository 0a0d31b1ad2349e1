//! # lib-conv
//!
//! Segmented frequency-domain convolution.
//!
//! This crate convolves two sequences of arbitrary, possibly very different,
//! lengths by overlap-add over fixed-size transform blocks:
//!
//! - **Transform**: the forward/inverse DFT contract, with a rustfft engine
//!   and a naive O(n²) reference
//! - **Direct convolution**: the O(na·nb) baseline and correctness oracle
//! - **Overlap-add**: the block engine, sequential or parallel over Rayon
//! - **Config**: caller-specified or auto-derived block size, serde-backed
//! - **Verify**: maximum relative error between a result and a reference

pub mod config;
pub mod direct;
pub mod error;
pub mod fft;
pub mod overlap_add;
pub mod verify;

pub use config::{BlockSizePolicy, ConvolverConfig, SweepMode};
pub use direct::{convolve_direct, convolve_direct_alloc, convolve_direct_in_place};
pub use error::{ConfigError, ConvError, ConvResult, TransformError};
pub use fft::{FftEngine, NaiveDft, Transform};
pub use overlap_add::{
    convolve_block_fft, convolve_block_fft_parallel, convolve_block_fft_real, BlockConvolver,
};

/// Re-export num_complex for convenience
pub use num_complex::Complex64;
