//! Shared helpers for unit tests.

use ndarray::Array2;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};

use crate::float_trait::DenoiseFloat;
use crate::pixel::Pixel;

/// Two-pass statistics of a sample set: `(n, mean, m2, m3)`.
pub fn accumulate<T: Pixel>(samples: &[T]) -> (u32, T, T, T) {
    let n = T::Scalar::usize_as(samples.len());
    let sum = samples.iter().fold(T::zero(), |acc, &s| acc + s);
    let mean = sum.map(|c| c / n);
    let (m2, m3) = samples.iter().fold((T::zero(), T::zero()), |(m2, m3), &s| {
        let d = s - mean;
        (m2 + d * d, m3 + d * d * d)
    });
    (samples.len() as u32, mean, m2, m3)
}

/// Per-pixel statistics of one synthetic rendering.
pub struct SyntheticStats<T: Pixel> {
    pub counts: Array2<u32>,
    pub means: Array2<T>,
    pub m2s: Array2<T>,
    pub m3s: Array2<T>,
}

/// Draw `spp` Gaussian samples around `truth[[y, x]]` for every pixel.
pub fn gaussian_stats(truth: &Array2<f32>, sd: f32, spp: usize, seed: u64) -> SyntheticStats<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, sd).unwrap();
    let dim = truth.dim();

    let mut counts = Array2::zeros(dim);
    let mut means = Array2::zeros(dim);
    let mut m2s = Array2::zeros(dim);
    let mut m3s = Array2::zeros(dim);

    for ((y, x), &mu) in truth.indexed_iter() {
        let samples: Vec<f32> = (0..spp).map(|_| mu + normal.sample(&mut rng)).collect();
        let (n, mean, m2, m3) = accumulate(&samples);
        counts[[y, x]] = n;
        means[[y, x]] = mean;
        m2s[[y, x]] = m2;
        m3s[[y, x]] = m3;
    }

    SyntheticStats {
        counts,
        means,
        m2s,
        m3s,
    }
}

/// Spatial variance of all values in `a`.
pub fn variance(a: &Array2<f32>) -> f64 {
    let n = a.len() as f64;
    let mean = a.iter().map(|&v| v as f64).sum::<f64>() / n;
    a.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

pub fn mean(a: &Array2<f32>) -> f64 {
    a.iter().map(|&v| v as f64).sum::<f64>() / a.len() as f64
}
