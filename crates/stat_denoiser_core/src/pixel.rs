//! Pixel element types.
//!
//! A rendering stores either one scalar channel or three channels per pixel.
//! The choice is made at compile time through the [`Pixel`] trait, so the
//! kernels are monomorphised for `f32`, `f64`, [`glam::Vec3`] and
//! [`glam::DVec3`] without any runtime type tag.

use glam::{DVec3, Vec3};
use num_traits::Zero;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Sub};

use crate::float_trait::DenoiseFloat;

/// Per-pixel value with component-wise arithmetic.
///
/// `+ - * /` operate channel by channel. `min_element` reduces to a single
/// scalar where one weight has to combine all channels.
pub trait Pixel:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    /// Channel scalar type.
    type Scalar: DenoiseFloat;

    /// Number of channels per pixel.
    const CHANNELS: usize;

    /// Value with every channel set to `value`.
    fn splat(value: Self::Scalar) -> Self;

    /// Apply `f` to every channel.
    fn map<M: Fn(Self::Scalar) -> Self::Scalar>(self, f: M) -> Self;

    /// Combine two values channel by channel.
    fn zip_map<M: Fn(Self::Scalar, Self::Scalar) -> Self::Scalar>(self, other: Self, f: M)
        -> Self;

    /// Smallest channel.
    fn min_element(self) -> Self::Scalar;

    #[inline]
    fn zero() -> Self {
        Self::splat(Self::Scalar::zero())
    }

    /// Multiply every channel by a scalar.
    #[inline]
    fn scale(self, factor: Self::Scalar) -> Self {
        self.map(|c| c * factor)
    }
}

macro_rules! impl_scalar_pixel {
    ($t:ty) => {
        impl Pixel for $t {
            type Scalar = $t;
            const CHANNELS: usize = 1;

            #[inline]
            fn splat(value: $t) -> Self {
                value
            }

            #[inline]
            fn map<M: Fn($t) -> $t>(self, f: M) -> Self {
                f(self)
            }

            #[inline]
            fn zip_map<M: Fn($t, $t) -> $t>(self, other: Self, f: M) -> Self {
                f(self, other)
            }

            #[inline]
            fn min_element(self) -> $t {
                self
            }

        }
    };
}

macro_rules! impl_vec3_pixel {
    ($t:ty, $s:ty) => {
        impl Pixel for $t {
            type Scalar = $s;
            const CHANNELS: usize = 3;

            #[inline]
            fn splat(value: $s) -> Self {
                <$t>::new(value, value, value)
            }

            #[inline]
            fn map<M: Fn($s) -> $s>(self, f: M) -> Self {
                <$t>::new(f(self.x), f(self.y), f(self.z))
            }

            #[inline]
            fn zip_map<M: Fn($s, $s) -> $s>(self, other: Self, f: M) -> Self {
                <$t>::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
            }

            #[inline]
            fn min_element(self) -> $s {
                self.x.min(self.y).min(self.z)
            }
        }
    };
}

impl_scalar_pixel!(f32);
impl_scalar_pixel!(f64);
impl_vec3_pixel!(Vec3, f32);
impl_vec3_pixel!(DVec3, f64);
