//! Error handling for the denoiser dispatch layer.
//!
//! Kernels never fail: they assume validated input. Every check happens before
//! launch, in [`crate::config`], [`crate::buffers`] and [`crate::dispatch`], and
//! is reported through [`DenoiseError`].

/// Errors raised while validating or launching denoiser work.
#[derive(thiserror::Error, Debug)]
pub enum DenoiseError {
    #[error("length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("shape mismatch for {what}[{index}]: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("frame has no pixels or no renderings")]
    EmptyFrame,

    #[error("invalid guide buffer {index}: {reason}")]
    InvalidGuide { index: usize, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid buffer descriptor: {0}")]
    Descriptor(String),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl DenoiseError {
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        DenoiseError::InvalidParameter(msg.to_string())
    }

    pub fn descriptor<T: ToString>(msg: T) -> Self {
        DenoiseError::Descriptor(msg.to_string())
    }

    pub fn invalid_guide<T: ToString>(index: usize, reason: T) -> Self {
        DenoiseError::InvalidGuide {
            index,
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for denoiser operations.
pub type DenoiseResult<T> = Result<T, DenoiseError>;
