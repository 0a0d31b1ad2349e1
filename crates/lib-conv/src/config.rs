//! Convolver configuration.
//!
//! Block size is either chosen by the caller or derived from the shorter
//! sequence length.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Smallest block the auto-derived policy will choose.
pub const MIN_AUTO_BLOCK_SIZE: usize = 4;

/// How the transform block size is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BlockSizePolicy {
    /// Use the given size verbatim. It must exceed the shorter sequence length.
    CallerSpecified { size: usize },

    /// Smallest power of two that is at least twice the shorter sequence
    /// length (and at least [`MIN_AUTO_BLOCK_SIZE`]).
    ///
    /// Half of each block or more is then non-aliased output.
    #[default]
    AutoDerived,
}

impl BlockSizePolicy {
    /// Resolve the block size for a shorter sequence of length `min_len`.
    pub fn resolve(&self, min_len: usize) -> usize {
        match *self {
            BlockSizePolicy::CallerSpecified { size } => size,
            BlockSizePolicy::AutoDerived => (2 * min_len)
                .next_power_of_two()
                .max(MIN_AUTO_BLOCK_SIZE),
        }
    }
}

/// Sweep execution strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMode {
    /// Blocks are processed in order on the calling thread.
    #[default]
    Sequential,

    /// Blocks are distributed over the rayon thread pool.
    Parallel,
}

/// Top-level convolver configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvolverConfig {
    /// Block size selection.
    #[serde(default)]
    pub block_size: BlockSizePolicy,

    /// Sweep execution strategy.
    #[serde(default)]
    pub sweep: SweepMode,
}

impl ConvolverConfig {
    /// Configuration with a caller-specified block size.
    pub fn with_block_size(size: usize) -> Self {
        Self {
            block_size: BlockSizePolicy::CallerSpecified { size },
            ..Self::default()
        }
    }

    /// Return a copy using the given sweep mode.
    pub fn sweep(mut self, sweep: SweepMode) -> Self {
        self.sweep = sweep;
        self
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// ```
    /// use lib_conv::config::{BlockSizePolicy, ConvolverConfig, SweepMode};
    ///
    /// let config = ConvolverConfig::from_json(
    ///     r#"{"block_size": {"policy": "caller_specified", "size": 64}, "sweep": "parallel"}"#,
    /// ).unwrap();
    /// assert_eq!(config.block_size, BlockSizePolicy::CallerSpecified { size: 64 });
    /// assert_eq!(config.sweep, SweepMode::Parallel);
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that can never succeed.
    ///
    /// Whether a caller-specified size exceeds the shorter sequence can
    /// only be checked per call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let BlockSizePolicy::CallerSpecified { size: 0 } = self.block_size {
            return Err(ConfigError::ZeroBlockSize);
        }
        Ok(())
    }
}
