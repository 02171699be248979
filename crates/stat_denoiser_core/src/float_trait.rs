//! Float trait abstraction for f32/f64 support.
//!
//! Every scalar quantity in the denoiser (pixel channels, guide features,
//! distance factors, weights) is generic over this trait so the same kernels
//! run in single or double precision.

use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::Debug;

/// Trait alias for floating point types supported by the denoiser.
///
/// Combines the bounds needed by the kernels:
/// - Basic float operations (Float, NumAssign)
/// - Conversion from primitive types (FromPrimitive)
/// - Thread-safe sharing across rayon workers (Send + Sync)
pub trait DenoiseFloat:
    Float + FromPrimitive + NumAssign + Debug + Send + Sync + 'static
{
    /// Two-sided z-value of the 95% confidence level.
    const Z_95: Self;

    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Create a value from a sample count.
    fn count_as(val: u32) -> Self;
}

impl DenoiseFloat for f32 {
    const Z_95: Self = 1.95996;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn count_as(val: u32) -> Self {
        val as f32
    }
}

impl DenoiseFloat for f64 {
    const Z_95: Self = 1.95996;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn count_as(val: u32) -> Self {
        val as f64
    }
}
