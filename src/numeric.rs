//! Numeric abstractions over pixel samples and mixture statistics.
//!
//! The detector is instantiated per (sample type, statistic type) pair:
//! frames arrive as `u8`, `f32`, or `f64` samples, while the per-component
//! means, variances, and weights are accumulated in `f32` or `f64`. The
//! supported pairings are u8/f32, f32/f32, and f64/f64 (see the aliases in
//! [`crate::detector`]).

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub, SubAssign};

/// A raw pixel sample as stored in a frame buffer.
///
/// Samples are widened to `f64` exactly once per pixel per step, at the
/// frame-view boundary; all supported sample types convert to `f64` without
/// loss.
pub trait Sample: Copy + Send + Sync + 'static {
    /// Widens the sample to `f64`, the interchange precision used when
    /// converting into the statistic type.
    fn widen(self) -> f64;
}

impl Sample for u8 {
    #[inline]
    fn widen(self) -> f64 {
        f64::from(self)
    }
}

impl Sample for f32 {
    #[inline]
    fn widen(self) -> f64 {
        f64::from(self)
    }
}

impl Sample for f64 {
    #[inline]
    fn widen(self) -> f64 {
        self
    }
}

/// The floating-point precision carrying all mixture statistics.
///
/// Implemented for `f32` and `f64`. The trait surface is exactly what the
/// update equations and ranking need; configuration values enter through
/// [`Statistic::from_f64`].
pub trait Statistic:
    Copy
    + PartialOrd
    + Debug
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
{
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// Converts a configuration value into this precision.
    fn from_f64(value: f64) -> Self;

    /// Converts to `f64` for logging and error reporting.
    fn to_f64(self) -> f64;

    /// Square root, used by the ranking score.
    fn sqrt(self) -> Self;

    /// Machine epsilon at 1.0, the tolerance of the background-ratio
    /// comparison.
    fn epsilon() -> Self;
}

impl Statistic for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    #[inline]
    fn epsilon() -> Self {
        f32::EPSILON
    }
}

impl Statistic for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn epsilon() -> Self {
        f64::EPSILON
    }
}
