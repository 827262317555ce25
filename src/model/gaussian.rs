//! A single weighted Gaussian mixture component.
//!
//! Each component models one mode of a pixel's intensity history: a
//! per-channel mean and variance plus a mixing weight. Matching applies
//! the threshold to the summed squared channel distance against the
//! summed channel variance, not per-channel Mahalanobis distances; the
//! update is the Kaewtrakulpong–Bowden exponential-forgetting estimator.

use crate::config::MAX_CHANNELS;
use crate::numeric::Statistic;

/// One mixture component: weight, per-channel mean, per-channel variance.
///
/// Channels beyond the frame's channel count stay zero, so whole-array
/// sums equal active-channel sums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedGaussian<S> {
    weight: S,
    mean: [S; MAX_CHANNELS],
    variance: [S; MAX_CHANNELS],
}

impl<S: Statistic> WeightedGaussian<S> {
    /// Creates a component centered on a fresh observation, with uniform
    /// variance across the observed channels.
    pub fn from_observation(weight: S, pixel: &[S], variance: S) -> Self {
        debug_assert!(variance > S::ZERO);
        debug_assert!(pixel.len() <= MAX_CHANNELS);
        let mut mean = [S::ZERO; MAX_CHANNELS];
        let mut var = [S::ZERO; MAX_CHANNELS];
        for (channel, value) in pixel.iter().enumerate() {
            mean[channel] = *value;
            var[channel] = variance;
        }
        Self {
            weight,
            mean,
            variance: var,
        }
    }

    /// Rebuilds a component from exported state.
    pub fn from_state(weight: S, mean: &[S], variance: &[S]) -> Self {
        debug_assert_eq!(mean.len(), variance.len());
        debug_assert!(mean.len() <= MAX_CHANNELS);
        let mut m = [S::ZERO; MAX_CHANNELS];
        let mut v = [S::ZERO; MAX_CHANNELS];
        m[..mean.len()].copy_from_slice(mean);
        v[..variance.len()].copy_from_slice(variance);
        Self {
            weight,
            mean: m,
            variance: v,
        }
    }

    /// True when the pixel falls inside this component's acceptance
    /// region: summed squared channel distance strictly below
    /// `threshold × summed channel variance`.
    #[inline]
    pub fn is_match(&self, pixel: &[S], threshold: S) -> bool {
        let mut sum_distance = S::ZERO;
        let mut sum_variance = S::ZERO;
        for (value, (mean, variance)) in pixel
            .iter()
            .zip(self.mean.iter().zip(self.variance.iter()))
        {
            let d = *value - *mean;
            sum_distance += d * d;
            sum_variance += *variance;
        }
        sum_distance < threshold * sum_variance
    }

    /// Folds a matching observation in: per channel
    /// `mean += α·d`, `variance += α·(d² − variance)`, then
    /// `weight += α·(1 − weight)`.
    #[inline]
    pub fn update(&mut self, pixel: &[S], learning_rate: S) {
        for (value, (mean, variance)) in pixel
            .iter()
            .zip(self.mean.iter_mut().zip(self.variance.iter_mut()))
        {
            let d = *value - *mean;
            *mean += learning_rate * d;
            *variance += learning_rate * (d * d - *variance);
        }
        self.weight += learning_rate * (S::ONE - self.weight);
    }

    /// Multiplies the weight in place, returning the updated weight.
    #[inline]
    pub fn scale_weight(&mut self, factor: S) -> S {
        self.weight *= factor;
        self.weight
    }

    /// The ordering score `weight / sqrt(Σ variance)`; higher ranks are
    /// more background-like.
    #[inline]
    pub fn rank(&self) -> S {
        let mut sum_variance = S::ZERO;
        for variance in &self.variance {
            sum_variance += *variance;
        }
        self.weight / sum_variance.sqrt()
    }

    /// True when this component outranks `other`.
    #[inline]
    pub fn outranks(&self, other: &Self) -> bool {
        self.rank() > other.rank()
    }

    /// Mixing weight.
    #[inline]
    pub fn weight(&self) -> S {
        self.weight
    }

    /// Per-channel means (tail channels zero).
    pub fn mean(&self) -> &[S; MAX_CHANNELS] {
        &self.mean
    }

    /// Per-channel variances (tail channels zero).
    pub fn variance(&self) -> &[S; MAX_CHANNELS] {
        &self.variance
    }
}
