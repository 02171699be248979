//! Buffer descriptors and buffer arrays.
//!
//! All pixel storage is owned by the caller. The denoiser only ever sees
//! `ndarray` views, which carry the base pointer, the row stride, the width and
//! the height of a 2D buffer. A "buffer array" is a plain slice of views, one
//! entry per rendering; index `r` of every array refers to rendering `r`.
//!
//! Views are indexed `[[y, x]]`: rows are the image height, columns the width.

use ndarray::{ArrayView2, ArrayView3, ArrayViewMut2, Axis, ShapeBuilder};

use crate::config::distance_factor;
use crate::error::{DenoiseError, DenoiseResult};
use crate::float_trait::DenoiseFloat;
use crate::pixel::Pixel;

/// Launch shape of one denoiser invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDims {
    /// Number of renderings filtered jointly.
    pub renderings: usize,
    pub width: usize,
    pub height: usize,
}

impl FrameDims {
    pub fn new(renderings: usize, width: usize, height: usize) -> Self {
        Self {
            renderings,
            width,
            height,
        }
    }

    /// `(rows, cols)` shape expected of every buffer.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.renderings == 0 || self.width == 0 || self.height == 0
    }
}

fn check_descriptor(
    len: usize,
    width: usize,
    height: usize,
    row_stride: usize,
) -> DenoiseResult<()> {
    if width == 0 || height == 0 {
        return Err(DenoiseError::descriptor(format!(
            "empty descriptor ({}x{})",
            width, height
        )));
    }
    if row_stride < width {
        return Err(DenoiseError::descriptor(format!(
            "row stride {} is smaller than width {}",
            row_stride, width
        )));
    }
    let required = (height - 1) * row_stride + width;
    if len < required {
        return Err(DenoiseError::descriptor(format!(
            "storage holds {} elements, descriptor needs {}",
            len, required
        )));
    }
    Ok(())
}

/// Describe a row-padded 2D buffer stored in `data`.
///
/// `row_stride` is measured in elements and must be at least `width`.
pub fn strided_view<T>(
    data: &[T],
    width: usize,
    height: usize,
    row_stride: usize,
) -> DenoiseResult<ArrayView2<'_, T>> {
    check_descriptor(data.len(), width, height, row_stride)?;
    ArrayView2::from_shape((height, width).strides((row_stride, 1)), data)
        .map_err(DenoiseError::descriptor)
}

/// Mutable counterpart of [`strided_view`].
pub fn strided_view_mut<T>(
    data: &mut [T],
    width: usize,
    height: usize,
    row_stride: usize,
) -> DenoiseResult<ArrayViewMut2<'_, T>> {
    check_descriptor(data.len(), width, height, row_stride)?;
    ArrayViewMut2::from_shape((height, width).strides((row_stride, 1)), data)
        .map_err(DenoiseError::descriptor)
}

/// Check that a buffer array has one entry per rendering and that every entry
/// matches the frame shape.
pub fn check_buffer_array<X>(
    what: &'static str,
    buffers: &[ArrayView2<'_, X>],
    dims: FrameDims,
) -> DenoiseResult<()> {
    if buffers.len() != dims.renderings {
        return Err(DenoiseError::LengthMismatch {
            what,
            expected: dims.renderings,
            found: buffers.len(),
        });
    }
    for (index, buffer) in buffers.iter().enumerate() {
        if buffer.dim() != dims.shape() {
            return Err(DenoiseError::ShapeMismatch {
                what,
                index,
                expected: dims.shape(),
                found: buffer.dim(),
            });
        }
    }
    Ok(())
}

/// Mutable counterpart of [`check_buffer_array`].
pub fn check_buffer_array_mut<X>(
    what: &'static str,
    buffers: &[ArrayViewMut2<'_, X>],
    dims: FrameDims,
) -> DenoiseResult<()> {
    if buffers.len() != dims.renderings {
        return Err(DenoiseError::LengthMismatch {
            what,
            expected: dims.renderings,
            found: buffers.len(),
        });
    }
    for (index, buffer) in buffers.iter().enumerate() {
        if buffer.dim() != dims.shape() {
            return Err(DenoiseError::ShapeMismatch {
                what,
                index,
                expected: dims.shape(),
                found: buffer.dim(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Guide buffers
// =============================================================================

/// One auxiliary feature image (normals, albedo, depth, ...).
///
/// `data` is indexed `[[y, x, channel]]`; the channel count is the length of
/// the last axis.
#[derive(Debug, Clone)]
pub struct GuideBuffer<'a, F: DenoiseFloat> {
    pub data: ArrayView3<'a, F>,
    /// Multiplier of the squared feature distance, `-0.5 / sd²`.
    pub range_factor: F,
}

impl<'a, F: DenoiseFloat> GuideBuffer<'a, F> {
    pub fn new(data: ArrayView3<'a, F>, range_factor: F) -> Self {
        Self { data, range_factor }
    }

    /// Build a guide from the assumed standard deviation of its feature.
    pub fn from_sd(data: ArrayView3<'a, F>, sd: F) -> Self {
        Self::new(data, distance_factor(sd))
    }

    /// Single-channel guide (depth, roughness, ...).
    pub fn from_scalar(data: ArrayView2<'a, F>, range_factor: F) -> Self {
        Self::new(data.insert_axis(Axis(2)), range_factor)
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.data.dim().2
    }

    /// Squared L2 distance between the features at `p` and `q` (`(y, x)`).
    #[inline]
    pub fn squared_distance(&self, p: (usize, usize), q: (usize, usize)) -> F {
        let fp = self.data.slice(ndarray::s![p.0, p.1, ..]);
        let fq = self.data.slice(ndarray::s![q.0, q.1, ..]);
        fp.iter().zip(fq.iter()).fold(F::zero(), |acc, (&a, &b)| {
            let d = a - b;
            acc + d * d
        })
    }
}

/// Guide buffers shared by every rendering of one invocation.
#[derive(Debug, Clone)]
pub struct GuideBufferSet<'a, F: DenoiseFloat> {
    buffers: Vec<GuideBuffer<'a, F>>,
}

impl<'a, F: DenoiseFloat> Default for GuideBufferSet<'a, F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, F: DenoiseFloat> GuideBufferSet<'a, F> {
    pub fn new(buffers: Vec<GuideBuffer<'a, F>>) -> Self {
        Self { buffers }
    }

    /// No guides: the range term is always 1.
    pub fn empty() -> Self {
        Self {
            buffers: Vec::new(),
        }
    }

    /// Assemble a guide set from parallel arrays.
    ///
    /// The four lengths must agree and every declared channel count must match
    /// the channel axis of the corresponding view.
    pub fn from_parts(
        buffers: &[ArrayView3<'a, F>],
        channel_counts: &[u8],
        range_factors: &[F],
        guide_count: usize,
    ) -> DenoiseResult<Self> {
        for (what, found) in [
            ("guide buffers", buffers.len()),
            ("guide channel counts", channel_counts.len()),
            ("guide range factors", range_factors.len()),
        ] {
            if found != guide_count {
                return Err(DenoiseError::LengthMismatch {
                    what,
                    expected: guide_count,
                    found,
                });
            }
        }

        let mut set = Vec::with_capacity(guide_count);
        for (index, ((data, &channels), &factor)) in buffers
            .iter()
            .zip(channel_counts)
            .zip(range_factors)
            .enumerate()
        {
            if data.dim().2 != channels as usize {
                return Err(DenoiseError::invalid_guide(
                    index,
                    format!(
                        "declared {} channels, buffer has {}",
                        channels,
                        data.dim().2
                    ),
                ));
            }
            set.push(GuideBuffer::new(data.clone(), factor));
        }
        Ok(Self::new(set))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn range_factors(&self) -> Vec<F> {
        self.buffers.iter().map(|b| b.range_factor).collect()
    }

    /// Write the squared feature distance of every guide into `out`.
    #[inline]
    pub fn squared_distances_into(&self, p: (usize, usize), q: (usize, usize), out: &mut [F]) {
        for (slot, buffer) in out.iter_mut().zip(&self.buffers) {
            *slot = buffer.squared_distance(p, q);
        }
    }

    /// Check every guide against the frame shape.
    pub fn validate(&self, dims: FrameDims) -> DenoiseResult<()> {
        for (index, buffer) in self.buffers.iter().enumerate() {
            let (rows, cols, _) = buffer.data.dim();
            if (rows, cols) != dims.shape() {
                return Err(DenoiseError::invalid_guide(
                    index,
                    format!("shape {:?} does not match frame {:?}", (rows, cols), dims.shape()),
                ));
            }
            if buffer.channel_count() == 0 {
                return Err(DenoiseError::invalid_guide(index, "no channels"));
            }
            if !buffer.range_factor.is_finite() || buffer.range_factor > F::zero() {
                return Err(DenoiseError::invalid_guide(
                    index,
                    format!("range factor {:?} must be finite and <= 0", buffer.range_factor),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Kernel argument groups
// =============================================================================

/// Per-rendering statistics and films. Every slice has one view per rendering.
#[derive(Debug, Clone, Copy)]
pub struct FilterInputs<'s, 'a, T: Pixel> {
    /// Sample counts `n`.
    pub counts: &'s [ArrayView2<'a, u32>],
    /// Running sample means.
    pub means: &'s [ArrayView2<'a, T>],
    /// Sums of squared deviations.
    pub m2s: &'s [ArrayView2<'a, T>],
    /// Sums of cubed deviations.
    pub m3s: &'s [ArrayView2<'a, T>],
    /// Noisy images filtered with the statistics' weights.
    pub films: &'s [ArrayView2<'a, T>],
}

impl<'s, 'a, T: Pixel> FilterInputs<'s, 'a, T> {
    pub fn validate(&self, dims: FrameDims) -> DenoiseResult<()> {
        check_buffer_array("count buffers", self.counts, dims)?;
        check_buffer_array("mean buffers", self.means, dims)?;
        check_buffer_array("m2 buffers", self.m2s, dims)?;
        check_buffer_array("m3 buffers", self.m3s, dims)?;
        check_buffer_array("film buffers", self.films, dims)
    }

    /// Views of rendering `r`.
    #[inline]
    pub fn rendering(&self, r: usize) -> RenderingInputs<'a, T> {
        RenderingInputs {
            count: self.counts[r].clone(),
            mean: self.means[r].clone(),
            m2: self.m2s[r].clone(),
            m3: self.m3s[r].clone(),
            film: self.films[r].clone(),
        }
    }
}

/// Input views of a single rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderingInputs<'a, T: Pixel> {
    pub count: ArrayView2<'a, u32>,
    pub mean: ArrayView2<'a, T>,
    pub m2: ArrayView2<'a, T>,
    pub m3: ArrayView2<'a, T>,
    pub film: ArrayView2<'a, T>,
}

/// Per-rendering output buffers.
#[derive(Debug)]
pub struct FilterOutputs<'s, 'a, T: Pixel> {
    /// Filtered, Johnson-corrected means.
    pub mean_corr: &'s mut [ArrayViewMut2<'a, T>],
    /// Mean per-channel acceptance over the filter window.
    pub discriminator: &'s mut [ArrayViewMut2<'a, T>],
    /// Films filtered with each rendering's weights.
    pub film_filtered: &'s mut [ArrayViewMut2<'a, T>],
}

impl<'s, 'a, T: Pixel> FilterOutputs<'s, 'a, T> {
    pub fn validate(&self, dims: FrameDims) -> DenoiseResult<()> {
        check_buffer_array_mut("mean corr outputs", self.mean_corr, dims)?;
        check_buffer_array_mut("discriminator outputs", self.discriminator, dims)?;
        check_buffer_array_mut("film filtered outputs", self.film_filtered, dims)
    }
}

/// Optional pass over one combined film that rides on the renderings' weights.
#[derive(Debug)]
pub enum FilmPass<'a, T: Pixel> {
    Disabled,
    Enabled {
        film: ArrayView2<'a, T>,
        out: ArrayViewMut2<'a, T>,
    },
}

impl<'a, T: Pixel> FilmPass<'a, T> {
    pub fn is_enabled(&self) -> bool {
        matches!(self, FilmPass::Enabled { .. })
    }

    pub fn validate(&self, dims: FrameDims) -> DenoiseResult<()> {
        if let FilmPass::Enabled { film, out } = self {
            if film.dim() != dims.shape() {
                return Err(DenoiseError::ShapeMismatch {
                    what: "film",
                    index: 0,
                    expected: dims.shape(),
                    found: film.dim(),
                });
            }
            if out.dim() != dims.shape() {
                return Err(DenoiseError::ShapeMismatch {
                    what: "film output",
                    index: 0,
                    expected: dims.shape(),
                    found: out.dim(),
                });
            }
        }
        Ok(())
    }
}
