//! Moment reduction.
//!
//! Turns the running statistics accumulated by a renderer (sample count `n`,
//! mean, `m2` = sum of squared deviations, `m3` = sum of cubed deviations) into
//! the quantities the discriminator works with: sample variance, variance of
//! the mean, skewness, and the Johnson bias offset.
//!
//! All functions are channel-wise. A count below 2 carries no spread
//! information and yields zero variance, zero skewness and zero offset.

use ndarray::{ArrayView2, ArrayViewMut2, Zip};
use num_traits::{Float, One, Zero};
use rayon::prelude::*;

use crate::float_trait::DenoiseFloat;
use crate::pixel::Pixel;

/// Unbiased sample variance `m2 / (n - 1)`; zero for `n < 2`.
///
/// Negative `m2` channels (accumulation round-off) are clamped to zero.
#[inline]
pub fn sample_variance<T: Pixel>(count: u32, m2: T) -> T {
    if count < 2 {
        return T::zero();
    }
    let zero = T::Scalar::zero();
    let denom = T::Scalar::count_as(count - 1);
    m2.map(|v| v.max(zero) / denom)
}

/// Variance of the sample mean, `variance / n`; zero for `n < 2`.
///
/// This is the squared standard error that sets the width of a pixel's
/// confidence interval.
#[inline]
pub fn mean_variance<T: Pixel>(count: u32, m2: T) -> T {
    if count < 2 {
        return T::zero();
    }
    sample_variance(count, m2).scale(T::Scalar::one() / T::Scalar::count_as(count))
}

/// Sample skewness `(m3 / n) / variance^1.5`; zero where the variance is zero.
#[inline]
pub fn skewness<T: Pixel>(count: u32, m2: T, m3: T) -> T {
    if count < 2 {
        return T::zero();
    }
    let zero = T::Scalar::zero();
    let third = m3.scale(T::Scalar::one() / T::Scalar::count_as(count));
    third.zip_map(sample_variance(count, m2), |mu3, var| {
        let denom = var * var.sqrt();
        if denom > zero {
            let s = mu3 / denom;
            if s.is_finite() {
                s
            } else {
                zero
            }
        } else {
            zero
        }
    })
}

/// Johnson's bias term `mu3 / (6 · variance · n)`, with `mu3 = m3 / n`.
///
/// Added to a sampled mean it compensates the first-order effect of a skewed
/// sample distribution. Equal to `skewness · sd / (6 n)`.
#[inline]
pub fn johnson_offset<T: Pixel>(count: u32, m2: T, m3: T) -> T {
    if count < 2 {
        return T::zero();
    }
    let zero = T::Scalar::zero();
    let n = T::Scalar::count_as(count);
    let six_n = T::Scalar::from_f64_c(6.0) * n;
    let third = m3.scale(T::Scalar::one() / n);
    third.zip_map(sample_variance(count, m2), |mu3, var| {
        if var > zero {
            let offset = mu3 / (six_n * var);
            if offset.is_finite() {
                offset
            } else {
                zero
            }
        } else {
            zero
        }
    })
}

/// Statistics of one pixel of one rendering, ready for the discriminator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMoments<T: Pixel> {
    pub count: u32,
    pub mean: T,
    pub variance: T,
    pub skewness: T,
    /// Variance of the mean, `variance / count`.
    pub mean_variance: T,
    /// Johnson bias offset of the mean.
    pub johnson_offset: T,
}

impl<T: Pixel> DerivedMoments<T> {
    pub fn from_raw(count: u32, mean: T, m2: T, m3: T) -> Self {
        let variance = sample_variance(count, m2);
        let (mean_variance, skew, offset) = if count < 2 {
            (T::zero(), T::zero(), T::zero())
        } else {
            (
                variance.scale(T::Scalar::one() / T::Scalar::count_as(count)),
                skewness(count, m2, m3),
                johnson_offset(count, m2, m3),
            )
        };
        Self {
            count,
            mean,
            variance,
            skewness: skew,
            mean_variance,
            johnson_offset: offset,
        }
    }

    /// Mean shifted by the Johnson offset.
    #[inline]
    pub fn corrected_mean(&self) -> T {
        self.mean + self.johnson_offset
    }
}

/// Compute the variance of the mean for every pixel of every rendering.
///
/// `counts`, `m2s` and `out` are parallel arrays indexed by rendering and must
/// share one shape; the caller validates that.
pub fn reduce_moments_kernel<T: Pixel>(
    counts: &[ArrayView2<'_, u32>],
    m2s: &[ArrayView2<'_, T>],
    out: &mut [ArrayViewMut2<'_, T>],
) {
    out.par_iter_mut()
        .zip(counts.par_iter())
        .zip(m2s.par_iter())
        .for_each(|((out, count), m2)| {
            Zip::from(out)
                .and(count)
                .and(m2)
                .par_for_each(|o, &n, &m2| *o = mean_variance(n, m2));
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::accumulate;
    use glam::Vec3;
    use ndarray::Array2;
    use rand::prelude::*;
    use rand_distr::{Distribution, Exp, Normal};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn test_variance_of_known_samples() {
        let (n, mean, m2, m3) = accumulate(&[1.0, 2.0, 3.0, 10.0]);
        assert_eq!(n, 4);
        assert!(approx_eq(mean, 4.0, 1e-12));

        // Deviations: -3, -2, -1, 6
        assert!(approx_eq(m2, 50.0, 1e-12));
        assert!(approx_eq(m3, 180.0, 1e-12));

        let var = sample_variance(n, m2);
        assert!(approx_eq(var, 50.0 / 3.0, 1e-12));
        assert!(approx_eq(mean_variance(n, m2), 50.0 / 12.0, 1e-12));

        let skew = skewness(n, m2, m3);
        assert!(approx_eq(skew, 45.0 / var.powf(1.5), 1e-12));

        let offset = johnson_offset(n, m2, m3);
        assert!(approx_eq(offset, 45.0 / (6.0 * var * 4.0), 1e-12));
        assert!(approx_eq(offset, skew * var.sqrt() / 24.0, 1e-12));
    }

    #[test]
    fn test_low_counts_have_no_spread() {
        for n in [0u32, 1] {
            assert_eq!(sample_variance(n, 5.0f32), 0.0);
            assert_eq!(mean_variance(n, 5.0f32), 0.0);
            assert_eq!(skewness(n, 5.0f32, 3.0), 0.0);
            assert_eq!(johnson_offset(n, 5.0f32, 3.0), 0.0);
        }
        let m = DerivedMoments::from_raw(1, 0.5f32, 0.0, 0.0);
        assert_eq!(m.corrected_mean(), 0.5);
        assert_eq!(m.mean_variance, 0.0);
    }

    #[test]
    fn test_zero_variance_has_zero_skewness() {
        assert_eq!(skewness(16, 0.0f64, 0.0), 0.0);
        assert_eq!(johnson_offset(16, 0.0f64, 1e-3), 0.0);
    }

    #[test]
    fn test_negative_m2_is_clamped() {
        assert_eq!(sample_variance(8, -1e-7f32), 0.0);
        assert_eq!(skewness(8, -1e-7f32, 1e-9), 0.0);
    }

    #[test]
    fn test_vec3_channels_are_independent() {
        let samples = [
            Vec3::new(1.0, 0.5, 0.0),
            Vec3::new(2.0, 0.5, 0.0),
            Vec3::new(3.0, 0.5, 4.0),
        ];
        let (n, mean, m2, m3) = accumulate(&samples);
        let m = DerivedMoments::from_raw(n, mean, m2, m3);

        assert!((m.variance.x - 1.0).abs() < 1e-6);
        assert_eq!(m.variance.y, 0.0);
        assert!(m.variance.z > 0.0);
        assert!(m.skewness.x.abs() < 1e-6);
        assert_eq!(m.skewness.y, 0.0);
        assert!(m.skewness.z > 0.0, "one large sample skews right");
        assert!(m.johnson_offset.z > 0.0);
    }

    #[test]
    fn test_variance_nonnegative_and_skewness_finite() {
        let mut rng = StdRng::seed_from_u64(7);
        let exp = Exp::new(2.0).unwrap();
        for _ in 0..500 {
            let count = rng.gen_range(2..64);
            let samples: Vec<f64> = (0..count).map(|_| exp.sample(&mut rng)).collect();
            let (n, mean, m2, m3) = accumulate(&samples);
            let m = DerivedMoments::from_raw(n, mean, m2, m3);
            assert!(m.variance >= 0.0);
            assert!(m.mean_variance >= 0.0);
            assert!(m.skewness.is_finite());
            assert!(m.johnson_offset.is_finite());
        }
    }

    #[test]
    fn test_reduce_moments_kernel() {
        let counts_a = Array2::from_shape_vec((1, 3), vec![0u32, 1, 5]).unwrap();
        let m2_a = Array2::from_shape_vec((1, 3), vec![1.0f32, 1.0, 8.0]).unwrap();
        let counts_b = Array2::from_elem((1, 3), 9u32);
        let m2_b = Array2::from_elem((1, 3), 72.0f32);

        let mut out_a = Array2::<f32>::zeros((1, 3));
        let mut out_b = Array2::<f32>::zeros((1, 3));
        {
            let mut outs = [out_a.view_mut(), out_b.view_mut()];
            reduce_moments_kernel(
                &[counts_a.view(), counts_b.view()],
                &[m2_a.view(), m2_b.view()],
                &mut outs,
            );
        }

        assert_eq!(out_a[[0, 0]], 0.0);
        assert_eq!(out_a[[0, 1]], 0.0);
        assert!((out_a[[0, 2]] - 8.0 / 4.0 / 5.0).abs() < 1e-6);
        assert!(out_b.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_mean_variance_matches_spread_of_means() {
        // The reduced value should predict how much per-pixel means scatter.
        let mut rng = StdRng::seed_from_u64(42);
        let normal = Normal::new(0.5, 0.1).unwrap();
        let pixels = 4096;
        let spp = 16;

        let mut means = Vec::with_capacity(pixels);
        let mut predicted = 0.0;
        for _ in 0..pixels {
            let samples: Vec<f64> = (0..spp).map(|_| normal.sample(&mut rng)).collect();
            let (n, mean, m2, _) = accumulate(&samples);
            means.push(mean);
            predicted += mean_variance(n, m2);
        }
        predicted /= pixels as f64;

        let grand = means.iter().sum::<f64>() / pixels as f64;
        let observed =
            means.iter().map(|m| (m - grand).powi(2)).sum::<f64>() / (pixels as f64 - 1.0);

        let expected = 0.1 * 0.1 / spp as f64;
        assert!((predicted - expected).abs() / expected < 0.05);
        assert!((observed - expected).abs() / expected < 0.1);
    }
}
