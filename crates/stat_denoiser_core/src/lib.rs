//! Statistical Monte Carlo Denoiser
//!
//! Denoises rendered images from the per-pixel sample statistics a renderer
//! accumulates alongside them (sample count, mean, second and third central
//! moment sums). A neighbor contributes to a pixel only if its mean is a
//! plausible value of the pixel's sampled distribution, so edges survive
//! without hand-tuned range parameters. Several renderings of the same frame
//! share one set of guide buffers and are filtered in a single pass.

pub mod buffers;
pub mod config;
pub mod discriminator;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod float_trait;
pub mod moments;
pub mod pixel;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use buffers::{
    strided_view, strided_view_mut, FilmPass, FilterInputs, FilterOutputs, FrameDims,
    GuideBuffer, GuideBufferSet,
};
pub use config::{distance_factor, DenoiserConfig, FilterParams};
pub use discriminator::Discriminator;
pub use dispatch::{filter, filter_with_film, reduce_moments, setup, synchronize, Stream};
pub use error::{DenoiseError, DenoiseResult};
pub use float_trait::DenoiseFloat;
pub use moments::DerivedMoments;
pub use pixel::Pixel;
