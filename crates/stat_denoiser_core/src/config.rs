//! Denoiser configuration.
//!
//! [`DenoiserConfig`] holds the user-facing parameters (standard deviations,
//! radius, confidence level). [`FilterParams`] is the precomputed form the
//! filter kernel consumes. Process-wide knobs are read from the environment.

use crate::error::{DenoiseError, DenoiseResult};
use crate::float_trait::DenoiseFloat;

// =============================================================================
// Constants
// =============================================================================

/// Default spatial standard deviation in pixels
const DEFAULT_SPATIAL_SD: f64 = 10.0;

/// Default filter radius in pixels
const DEFAULT_RADIUS: u8 = 20;

pub(crate) const NUM_THREADS_ENV: &str = "STAT_DENOISER_NUM_THREADS";
pub(crate) const PROFILE_TIMING_ENV: &str = "STAT_DENOISER_PROFILE_TIMING";

/// Gaussian exponent factor `-0.5 / sd²` for a standard deviation `sd`.
///
/// Used for the spatial term and for every guide buffer's range term.
#[inline]
pub fn distance_factor<F: DenoiseFloat>(sd: F) -> F {
    F::from_f64_c(-0.5) / (sd * sd)
}

// =============================================================================
// Types
// =============================================================================

/// Precomputed filter parameters shared by all renderings of one launch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams<F: DenoiseFloat> {
    /// Spatial distance factor, `-0.5 / sd²`. Must be <= 0.
    pub ds_factor: F,
    /// Half-width of the square filter window. 0 filters nothing.
    pub radius: u8,
    /// z-value of the confidence interval used by the statistical test.
    pub confidence_z: F,
}

impl<F: DenoiseFloat> FilterParams<F> {
    /// Parameters with the 95% confidence level.
    pub fn new(ds_factor: F, radius: u8) -> Self {
        Self {
            ds_factor,
            radius,
            confidence_z: F::Z_95,
        }
    }

    pub fn with_confidence_z(mut self, confidence_z: F) -> Self {
        self.confidence_z = confidence_z;
        self
    }

    pub fn validate(&self) -> DenoiseResult<()> {
        if !self.ds_factor.is_finite() || self.ds_factor > F::zero() {
            return Err(DenoiseError::invalid_parameter(format!(
                "ds_factor must be finite and <= 0, got {:?}",
                self.ds_factor
            )));
        }
        if !self.confidence_z.is_finite() || self.confidence_z <= F::zero() {
            return Err(DenoiseError::invalid_parameter(format!(
                "confidence_z must be finite and > 0, got {:?}",
                self.confidence_z
            )));
        }
        Ok(())
    }
}

/// User-facing denoiser configuration.
///
/// Use `Default::default()` for the standard settings.
#[derive(Debug, Clone)]
pub struct DenoiserConfig<F: DenoiseFloat> {
    /// Spatial filter standard deviation in pixels. Default: 10.0
    pub spatial_sd: F,
    /// Filter radius in pixels. Default: 20
    pub radius: u8,
    /// Confidence interval z-value. Default: 1.95996 (95%)
    pub confidence_z: F,
}

impl<F: DenoiseFloat> Default for DenoiserConfig<F> {
    fn default() -> Self {
        Self {
            spatial_sd: F::from_f64_c(DEFAULT_SPATIAL_SD),
            radius: DEFAULT_RADIUS,
            confidence_z: F::Z_95,
        }
    }
}

impl<F: DenoiseFloat> DenoiserConfig<F> {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> DenoiseResult<()> {
        if !self.spatial_sd.is_finite() || self.spatial_sd <= F::zero() {
            return Err(DenoiseError::invalid_parameter(
                "spatial_sd must be finite and > 0",
            ));
        }
        if !self.confidence_z.is_finite() || self.confidence_z <= F::zero() {
            return Err(DenoiseError::invalid_parameter(
                "confidence_z must be finite and > 0",
            ));
        }
        Ok(())
    }

    /// Precompute the kernel parameters.
    pub fn to_params(&self) -> DenoiseResult<FilterParams<F>> {
        self.validate()?;
        Ok(FilterParams {
            ds_factor: distance_factor(self.spatial_sd),
            radius: self.radius,
            confidence_z: self.confidence_z,
        })
    }
}

// =============================================================================
// Environment
// =============================================================================

fn parse_flag(value: &str) -> bool {
    let v = value.trim();
    v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
}

fn parse_thread_count(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok().filter(|&n| n > 0)
}

pub(crate) fn resolve_profile_timing() -> bool {
    std::env::var(PROFILE_TIMING_ENV)
        .ok()
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

pub(crate) fn resolve_num_threads() -> Option<usize> {
    std::env::var(NUM_THREADS_ENV)
        .ok()
        .and_then(|value| parse_thread_count(&value))
}
