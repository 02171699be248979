//! Launch surface.
//!
//! A [`Stream`] is an ordered execution context backed by its own rayon pool.
//! Entry points validate every buffer against the launch shape, then run the
//! kernel inside the stream's pool. Launches are eager: once an entry point
//! returns, its outputs are written.

use std::sync::OnceLock;
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::{ArrayView2, ArrayViewMut2};

use crate::buffers::{
    check_buffer_array, check_buffer_array_mut, FilmPass, FilterInputs, FilterOutputs, FrameDims,
    GuideBufferSet,
};
use crate::config::{resolve_num_threads, resolve_profile_timing, FilterParams};
use crate::error::{DenoiseError, DenoiseResult};
use crate::filter::filter_kernel;
use crate::moments::reduce_moments_kernel;
use crate::pixel::Pixel;

/// Thread count requested for the global pool (`None`: rayon default).
static GLOBAL_POOL: OnceLock<Option<usize>> = OnceLock::new();

/// One-time process initialisation.
///
/// Configures rayon's global pool from `STAT_DENOISER_NUM_THREADS`. Without
/// that variable the pool is left to rayon. If the pool already exists
/// (any earlier rayon work creates it), the request is logged and the
/// existing pool is kept. Every call returns the same result; a later call
/// asking for a different thread count is logged and ignored.
pub fn setup() -> DenoiseResult<()> {
    let requested = resolve_num_threads();
    let configured = *GLOBAL_POOL.get_or_init(|| {
        if let Some(n) = requested {
            build_global_pool(n);
        }
        requested
    });
    if configured != requested {
        warn!(
            "setup already ran with threads={:?}; ignoring threads={:?}",
            configured, requested
        );
    }
    Ok(())
}

fn build_global_pool(num_threads: usize) {
    let built = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("stat-denoiser-{}", i))
        .build_global();
    match built {
        Ok(()) => debug!("stat_denoiser global pool ready threads={}", num_threads),
        Err(err) => warn!(
            "keeping existing global pool threads={} instead of threads={}: {}",
            rayon::current_num_threads(),
            num_threads,
            err
        ),
    }
}

/// Ordered execution context. Work submitted to one stream runs in its pool.
#[derive(Debug)]
pub struct Stream {
    pool: rayon::ThreadPool,
}

impl Stream {
    /// Stream with rayon's default thread count.
    pub fn new() -> DenoiseResult<Self> {
        Self::build(None)
    }

    pub fn with_threads(num_threads: usize) -> DenoiseResult<Self> {
        if num_threads == 0 {
            return Err(DenoiseError::invalid_parameter(
                "a stream needs at least one thread",
            ));
        }
        Self::build(Some(num_threads))
    }

    fn build(num_threads: Option<usize>) -> DenoiseResult<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        Ok(Self {
            pool: builder.build()?,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn run<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }
}

/// Block until all work submitted to `stream` has completed.
pub fn synchronize(stream: &Stream) {
    stream.run(|| ());
}

fn check_frame(dims: FrameDims) -> DenoiseResult<()> {
    if dims.is_empty() {
        return Err(DenoiseError::EmptyFrame);
    }
    Ok(())
}

fn log_timing(stage: &str, dims: FrameDims, started: Option<Instant>) {
    if let Some(t) = started {
        info!(
            "stat_denoiser_profile stage={} renderings={} size={}x{} wall_ms={:.3}",
            stage,
            dims.renderings,
            dims.width,
            dims.height,
            t.elapsed().as_secs_f64() * 1000.0
        );
    }
}

/// Compute the variance of the mean of every pixel of every rendering.
///
/// `counts`, `m2s` and `out` hold one view per rendering, each of shape
/// `dims.shape()`.
pub fn reduce_moments<T: Pixel>(
    stream: &Stream,
    dims: FrameDims,
    counts: &[ArrayView2<'_, u32>],
    m2s: &[ArrayView2<'_, T>],
    out: &mut [ArrayViewMut2<'_, T>],
) -> DenoiseResult<()> {
    check_frame(dims)?;
    check_buffer_array("count buffers", counts, dims)?;
    check_buffer_array("m2 buffers", m2s, dims)?;
    check_buffer_array_mut("variance outputs", out, dims)?;

    debug!(
        "reduce_moments renderings={} size={}x{} channels={}",
        dims.renderings,
        dims.width,
        dims.height,
        T::CHANNELS
    );
    let started = resolve_profile_timing().then(Instant::now);
    stream.run(|| reduce_moments_kernel(counts, m2s, out));
    log_timing("reduce_moments", dims, started);
    Ok(())
}

/// Jointly filter all renderings of a frame.
pub fn filter<T: Pixel>(
    stream: &Stream,
    params: &FilterParams<T::Scalar>,
    dims: FrameDims,
    inputs: &FilterInputs<'_, '_, T>,
    guides: &GuideBufferSet<'_, T::Scalar>,
    outputs: &mut FilterOutputs<'_, '_, T>,
) -> DenoiseResult<()> {
    filter_with_film(
        stream,
        params,
        dims,
        inputs,
        guides,
        outputs,
        FilmPass::Disabled,
    )
}

/// [`filter`], plus one combined film filtered with the mean of the
/// renderings' weights.
pub fn filter_with_film<T: Pixel>(
    stream: &Stream,
    params: &FilterParams<T::Scalar>,
    dims: FrameDims,
    inputs: &FilterInputs<'_, '_, T>,
    guides: &GuideBufferSet<'_, T::Scalar>,
    outputs: &mut FilterOutputs<'_, '_, T>,
    film: FilmPass<'_, T>,
) -> DenoiseResult<()> {
    check_frame(dims)?;
    params.validate()?;
    inputs.validate(dims)?;
    outputs.validate(dims)?;
    guides.validate(dims)?;
    film.validate(dims)?;

    debug!(
        "filter renderings={} size={}x{} channels={} radius={} guides={} film={}",
        dims.renderings,
        dims.width,
        dims.height,
        T::CHANNELS,
        params.radius,
        guides.len(),
        film.is_enabled()
    );
    let started = resolve_profile_timing().then(Instant::now);
    stream.run(|| filter_kernel(params, inputs, guides, outputs, film));
    log_timing("filter", dims, started);
    Ok(())
}
