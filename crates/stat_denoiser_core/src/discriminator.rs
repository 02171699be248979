//! Statistical discriminator.
//!
//! Decides how much a neighbor `q` may contribute to the estimate of a center
//! pixel `p`. The weight is the product of three terms:
//!
//! - spatial: `exp(|p - q|² · ds_factor)`
//! - range: `exp(Σ_k range_factor_k · |g_k(p) - g_k(q)|²)` over the guide buffers
//! - statistical: a confidence test of whether the neighbor's mean is a
//!   plausible value for the center's sampled distribution
//!
//! The statistical test compares `mean_p - mean_q + johnson_p` against the
//! confidence interval `z · sqrt(var_mean_p + var_mean_q)`. The Johnson offset
//! of the center shifts the comparison to account for skewed per-pixel sample
//! distributions, which makes the test asymmetric when the two pixels'
//! skewness differs. Pixels with few samples or high variance have wide
//! intervals and are therefore compared leniently.

use crate::buffers::GuideBufferSet;
use crate::config::FilterParams;
use crate::float_trait::DenoiseFloat;
use crate::moments::DerivedMoments;
use crate::pixel::Pixel;

/// Per-neighbor acceptance weights for one launch.
#[derive(Debug, Clone)]
pub struct Discriminator<F: DenoiseFloat> {
    ds_factor: F,
    inv_z_sq: F,
    range_factors: Vec<F>,
}

impl<F: DenoiseFloat> Discriminator<F> {
    pub fn new(params: &FilterParams<F>, range_factors: Vec<F>) -> Self {
        Self {
            ds_factor: params.ds_factor,
            inv_z_sq: F::one() / (params.confidence_z * params.confidence_z),
            range_factors,
        }
    }

    pub fn from_guides(params: &FilterParams<F>, guides: &GuideBufferSet<'_, F>) -> Self {
        Self::new(params, guides.range_factors())
    }

    /// Number of guide buffers the range term expects.
    pub fn guide_count(&self) -> usize {
        self.range_factors.len()
    }

    /// Gaussian decay of the squared pixel distance.
    #[inline]
    pub fn spatial_term(&self, distance_sq: F) -> F {
        (distance_sq * self.ds_factor).exp()
    }

    /// Gaussian decay of the squared feature distances, one per guide buffer.
    #[inline]
    pub fn range_term(&self, guide_distances_sq: &[F]) -> F {
        let exponent = self
            .range_factors
            .iter()
            .zip(guide_distances_sq)
            .fold(F::zero(), |acc, (&factor, &d)| acc + factor * d);
        exponent.exp()
    }

    /// Spatial and range terms together. Shared by every rendering.
    #[inline]
    pub fn geometric_weight(&self, distance_sq: F, guide_distances_sq: &[F]) -> F {
        self.spatial_term(distance_sq) * self.range_term(guide_distances_sq)
    }

    /// Per-channel acceptance in `[0, 1]` of `neighbor` as seen from `center`.
    ///
    /// Channels whose combined standard error is zero carry no confidence
    /// information and are accepted.
    #[inline]
    pub fn statistical_term<T: Pixel<Scalar = F>>(
        &self,
        center: &DerivedMoments<T>,
        neighbor: &DerivedMoments<T>,
    ) -> T {
        let zero = F::zero();
        let one = F::one();
        let inv_z_sq = self.inv_z_sq;
        let shift = center.mean - neighbor.mean + center.johnson_offset;
        let se_sq = center.mean_variance + neighbor.mean_variance;
        shift.zip_map(se_sq, |d, s| {
            if s > zero {
                (one - d * d * inv_z_sq / s).max(zero)
            } else {
                one
            }
        })
    }

    /// Fold a geometric weight and per-channel acceptances into one weight.
    ///
    /// The least accepting channel decides, so an edge in any channel stops
    /// the filter.
    #[inline]
    pub fn combine<T: Pixel<Scalar = F>>(geometric: F, acceptance: T) -> F {
        (geometric * acceptance.min_element())
            .max(F::zero())
            .min(F::one())
    }

    /// Weight and per-channel acceptance of `neighbor` for `center`, given the
    /// neighbor's geometric weight.
    ///
    /// `None` for a neighbor without samples. A center without samples has no
    /// distribution to test against, so only the geometric weight applies.
    #[inline]
    pub fn assess<T: Pixel<Scalar = F>>(
        &self,
        center: &DerivedMoments<T>,
        neighbor: &DerivedMoments<T>,
        geometric: F,
    ) -> Option<(F, T)> {
        if neighbor.count == 0 {
            return None;
        }
        if center.count == 0 {
            return Some((geometric, T::splat(F::one())));
        }
        let acceptance = self.statistical_term(center, neighbor);
        Some((Self::combine(geometric, acceptance), acceptance))
    }

    /// Full weight of `neighbor` for `center`. Neighbors without samples get 0.
    pub fn weight<T: Pixel<Scalar = F>>(
        &self,
        center: &DerivedMoments<T>,
        neighbor: &DerivedMoments<T>,
        distance_sq: F,
        guide_distances_sq: &[F],
    ) -> F {
        let geometric = self.geometric_weight(distance_sq, guide_distances_sq);
        self.assess(center, neighbor, geometric)
            .map_or(F::zero(), |(weight, _)| weight)
    }
}
