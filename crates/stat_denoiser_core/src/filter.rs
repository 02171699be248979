//! Joint filter kernel.
//!
//! For every pixel `p` and every rendering `r` the kernel scans the square
//! window of half-width `radius` around `p` (clamped to the image), weights
//! each neighbor with the [`Discriminator`], and accumulates
//!
//! - the weighted neighbor means, normalised and shifted by the center's
//!   Johnson offset (`mean_corr`),
//! - the mean per-channel statistical acceptance over the window
//!   (`discriminator`),
//! - the weighted film values of rendering `r` (`film_filtered`).
//!
//! All renderings share the guide buffers, so the spatial and range terms of a
//! neighbor are evaluated once and reused for every rendering. An optional
//! combined film rides on the mean of the renderings' weights.
//!
//! Work is split into one rayon task per output row. Every task runs the same
//! fixed-order loops, so results do not depend on the number of threads.

use ndarray::{Array2, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, Zip};
use num_traits::{One, Zero};
use rayon::prelude::*;

use crate::buffers::{FilmPass, FilterInputs, FilterOutputs, GuideBufferSet, RenderingInputs};
use crate::config::FilterParams;
use crate::discriminator::Discriminator;
use crate::float_trait::DenoiseFloat;
use crate::moments::DerivedMoments;
use crate::pixel::Pixel;

/// Derive the moments of every pixel of one rendering.
pub fn derive_moments<T: Pixel>(rendering: RenderingInputs<'_, T>) -> Array2<DerivedMoments<T>> {
    Zip::from(&rendering.count)
        .and(&rendering.mean)
        .and(&rendering.m2)
        .and(&rendering.m3)
        .par_map_collect(|&n, &mean, &m2, &m3| DerivedMoments::from_raw(n, mean, m2, m3))
}

/// Filter all renderings of one frame.
///
/// The caller guarantees that every buffer array has one entry per rendering,
/// that all buffers share one shape, and that the guides match that shape.
pub fn filter_kernel<T: Pixel>(
    params: &FilterParams<T::Scalar>,
    inputs: &FilterInputs<'_, '_, T>,
    guides: &GuideBufferSet<'_, T::Scalar>,
    outputs: &mut FilterOutputs<'_, '_, T>,
    film: FilmPass<'_, T>,
) {
    let renderings = inputs.counts.len();
    if renderings == 0 {
        return;
    }
    let (height, width) = inputs.counts[0].dim();

    let per_rendering: Vec<RenderingInputs<'_, T>> =
        (0..renderings).map(|r| inputs.rendering(r)).collect();
    let stats: Vec<Array2<DerivedMoments<T>>> =
        per_rendering.iter().map(|&r| derive_moments(r)).collect();
    let films: Vec<ArrayView2<'_, T>> = per_rendering.into_iter().map(|r| r.film).collect();

    let (film_in, mut film_out) = match film {
        FilmPass::Disabled => (None, None),
        FilmPass::Enabled { film, out } => (Some(film), Some(out)),
    };

    let ctx = KernelContext {
        discriminator: Discriminator::from_guides(params, guides),
        guides,
        stats: &stats,
        films,
        film_in,
        radius: params.radius as usize,
        width,
        height,
    };

    let rows = split_rows(outputs, film_out.as_mut(), height);
    rows.into_par_iter()
        .enumerate()
        .for_each(|(y, row)| ctx.filter_row(y, row));
}

// =============================================================================
// Row decomposition
// =============================================================================

struct RenderingRow<'o, T: Pixel> {
    mean_corr: ArrayViewMut1<'o, T>,
    discriminator: ArrayViewMut1<'o, T>,
    film_filtered: ArrayViewMut1<'o, T>,
}

/// Every output row `y` of every buffer, so rows can be written in parallel.
struct RowOutputs<'o, T: Pixel> {
    renderings: Vec<RenderingRow<'o, T>>,
    film: Option<ArrayViewMut1<'o, T>>,
}

fn split_rows<'o, T: Pixel>(
    outputs: &'o mut FilterOutputs<'_, '_, T>,
    film_out: Option<&'o mut ArrayViewMut2<'_, T>>,
    height: usize,
) -> Vec<RowOutputs<'o, T>> {
    let mut per_rendering: Vec<std::vec::IntoIter<RenderingRow<'o, T>>> = outputs
        .mean_corr
        .iter_mut()
        .zip(outputs.discriminator.iter_mut())
        .zip(outputs.film_filtered.iter_mut())
        .map(|((mean_corr, discriminator), film_filtered)| {
            mean_corr
                .axis_iter_mut(Axis(0))
                .zip(discriminator.axis_iter_mut(Axis(0)))
                .zip(film_filtered.axis_iter_mut(Axis(0)))
                .map(|((mean_corr, discriminator), film_filtered)| RenderingRow {
                    mean_corr,
                    discriminator,
                    film_filtered,
                })
                .collect::<Vec<_>>()
                .into_iter()
        })
        .collect();
    let mut film_rows = film_out.map(|out| out.axis_iter_mut(Axis(0)));

    (0..height)
        .map(|_| RowOutputs {
            renderings: per_rendering.iter_mut().filter_map(Iterator::next).collect(),
            film: film_rows.as_mut().and_then(Iterator::next),
        })
        .collect()
}

// =============================================================================
// Accumulation
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Accumulator<T: Pixel> {
    weighted_mean: T,
    weighted_film: T,
    weight_total: T::Scalar,
    acceptance_sum: T,
    valid: usize,
}

/// Final values of one pixel of one rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PixelEstimate<T: Pixel> {
    mean_corr: T,
    discriminator: T,
    film_filtered: T,
}

impl<T: Pixel> Accumulator<T> {
    fn new() -> Self {
        Self {
            weighted_mean: T::zero(),
            weighted_film: T::zero(),
            weight_total: T::Scalar::zero(),
            acceptance_sum: T::zero(),
            valid: 0,
        }
    }

    #[inline]
    fn push(&mut self, weight: T::Scalar, mean: T, film: T, acceptance: T) {
        self.weighted_mean = self.weighted_mean + mean.scale(weight);
        self.weighted_film = self.weighted_film + film.scale(weight);
        self.weight_total += weight;
        self.acceptance_sum = self.acceptance_sum + acceptance;
        self.valid += 1;
    }

    fn resolve(&self, center: &DerivedMoments<T>, film_center: T) -> PixelEstimate<T> {
        let zero = T::Scalar::zero();
        let one = T::Scalar::one();
        let normalised = if self.weight_total > zero {
            let inv = one / self.weight_total;
            Some((self.weighted_mean.scale(inv), self.weighted_film.scale(inv)))
        } else {
            None
        };

        if center.count == 0 {
            // No distribution at the center: neighbors only, no correction.
            let (mean, film) = normalised.unwrap_or((T::zero(), film_center));
            return PixelEstimate {
                mean_corr: mean,
                discriminator: T::zero(),
                film_filtered: film,
            };
        }

        let (mean, film) = normalised.unwrap_or((center.mean, film_center));
        let discriminator = if self.valid > 0 {
            self.acceptance_sum
                .scale(one / T::Scalar::usize_as(self.valid))
        } else {
            T::zero()
        };
        PixelEstimate {
            mean_corr: mean + center.johnson_offset,
            discriminator,
            film_filtered: film,
        }
    }
}

// =============================================================================
// Kernel
// =============================================================================

struct KernelContext<'k, 'g, 'f, 'c, T: Pixel> {
    discriminator: Discriminator<T::Scalar>,
    guides: &'k GuideBufferSet<'g, T::Scalar>,
    stats: &'k [Array2<DerivedMoments<T>>],
    films: Vec<ArrayView2<'f, T>>,
    film_in: Option<ArrayView2<'c, T>>,
    radius: usize,
    width: usize,
    height: usize,
}

impl<T: Pixel> KernelContext<'_, '_, '_, '_, T> {
    fn filter_row(&self, y: usize, mut row: RowOutputs<'_, T>) {
        let zero = T::Scalar::zero();
        let one = T::Scalar::one();
        let renderings = self.stats.len();
        let rendering_scale = one / T::Scalar::usize_as(renderings);

        let mut guide_distances = vec![zero; self.guides.len()];
        let mut accumulators = vec![Accumulator::<T>::new(); renderings];

        let y0 = y.saturating_sub(self.radius);
        let y1 = (y + self.radius).min(self.height - 1);

        for x in 0..self.width {
            let x0 = x.saturating_sub(self.radius);
            let x1 = (x + self.radius).min(self.width - 1);

            accumulators.fill(Accumulator::new());
            let mut film_sum = T::zero();
            let mut film_weight = zero;

            for qy in y0..=y1 {
                for qx in x0..=x1 {
                    let is_center = qy == y && qx == x;
                    let geometric = if is_center {
                        one
                    } else {
                        self.guides
                            .squared_distances_into((y, x), (qy, qx), &mut guide_distances);
                        let dy = T::Scalar::usize_as(qy.abs_diff(y));
                        let dx = T::Scalar::usize_as(qx.abs_diff(x));
                        self.discriminator
                            .geometric_weight(dy * dy + dx * dx, &guide_distances)
                    };

                    let mut joint_weight = zero;
                    for (r, acc) in accumulators.iter_mut().enumerate() {
                        let neighbor = &self.stats[r][[qy, qx]];
                        let assessed = if is_center {
                            (neighbor.count > 0).then(|| (one, T::splat(one)))
                        } else {
                            let center = &self.stats[r][[y, x]];
                            self.discriminator.assess(center, neighbor, geometric)
                        };
                        let Some((weight, acceptance)) = assessed else {
                            continue;
                        };
                        acc.push(weight, neighbor.mean, self.films[r][[qy, qx]], acceptance);
                        joint_weight += weight;
                    }

                    if let Some(film) = &self.film_in {
                        let weight = joint_weight * rendering_scale;
                        film_sum = film_sum + film[[qy, qx]].scale(weight);
                        film_weight += weight;
                    }
                }
            }

            for (r, (acc, out)) in accumulators
                .iter()
                .zip(row.renderings.iter_mut())
                .enumerate()
            {
                let estimate = acc.resolve(&self.stats[r][[y, x]], self.films[r][[y, x]]);
                out.mean_corr[x] = estimate.mean_corr;
                out.discriminator[x] = estimate.discriminator;
                out.film_filtered[x] = estimate.film_filtered;
            }

            if let (Some(film), Some(out)) = (&self.film_in, row.film.as_mut()) {
                out[x] = if film_weight > zero {
                    film_sum.scale(one / film_weight)
                } else {
                    film[[y, x]]
                };
            }
        }
    }
}
