//! Error types for convolution operations.

use thiserror::Error;

/// Errors reported by a transform primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Transform was asked to run on an empty buffer.
    #[error("Cannot execute a transform on a zero-length buffer")]
    ZeroLength,

    /// Input and output buffers disagree in length.
    #[error("Transform length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Errors that can occur during convolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvError {
    /// A required buffer reference is absent.
    #[error("Required buffer pointer is null")]
    NullPointer,

    /// A sequence has fewer than one sample.
    #[error("Sequence `{arg}` must contain at least one sample")]
    InvalidSize { arg: &'static str },

    /// Verification tolerance is zero, negative or NaN.
    #[error("Tolerance must be strictly positive")]
    InvalidTolerance,

    /// Block size does not exceed the shorter sequence, so aliasing is unavoidable.
    #[error("Block size {block_size} must be greater than the shorter sequence length {min_len}")]
    InvalidBlockSize { block_size: usize, min_len: usize },

    /// Caller output buffer cannot hold exactly `na + nb - 1` samples.
    #[error("Output length mismatch: expected {expected}, got {actual}")]
    OutputLength { expected: usize, actual: usize },

    /// The transform primitive failed for a block.
    #[error("Transform failed: {0}")]
    TransformFailure(#[from] TransformError),
}

/// Result type for convolution operations.
pub type ConvResult<T> = Result<T, ConvError>;

/// Errors raised while loading or validating a [`crate::config::ConvolverConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration document could not be parsed.
    #[error("Failed to parse convolver config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A caller-specified block size of zero can never exceed a sequence length.
    #[error("Caller-specified block size must be non-zero")]
    ZeroBlockSize,
}

/// Full linear convolution length for two non-empty sequences.
#[inline]
pub(crate) fn output_len(na: usize, nb: usize) -> usize {
    na + nb - 1
}

/// Both sequences must hold at least one sample.
pub(crate) fn check_sizes(na: usize, nb: usize) -> ConvResult<()> {
    if na < 1 {
        return Err(ConvError::InvalidSize { arg: "a" });
    }
    if nb < 1 {
        return Err(ConvError::InvalidSize { arg: "b" });
    }
    Ok(())
}

/// Validate sequence lengths and the caller output buffer, in that order.
pub(crate) fn check_lengths(na: usize, nb: usize, out_len: usize) -> ConvResult<()> {
    check_sizes(na, nb)?;
    let expected = output_len(na, nb);
    if out_len != expected {
        return Err(ConvError::OutputLength {
            expected,
            actual: out_len,
        });
    }
    Ok(())
}
