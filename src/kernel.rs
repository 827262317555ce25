//! The per-pixel detection algorithm.
//!
//! One kernel invocation per pixel per frame, in two phases. Match and
//! update: the first component accepting the pixel is updated with
//! exponential forgetting and percolated up the ranking; if none accepts,
//! a fresh component is appended, evicting the lowest-ranked one at
//! capacity. Either branch derives a weight renormalization factor in
//! closed form from the invariant that weights summed to 1 beforehand, so
//! no pass over the mixture is needed to resum. Classification then
//! applies the Stauffer-Grimson rule: the top-ranked components whose
//! cumulative weight first reaches the background ratio define
//! background, everything below is foreground.

use crate::config::DetectorConfig;
use crate::model::{GaussianMixture, WeightedGaussian};
use crate::numeric::Statistic;

/// Raised when a pixel's cumulative weight never reaches the background
/// ratio. Weights drifting out of [0, 1] sum indicates corrupted model
/// state, so the step carrying this pixel is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("mixture weights at pixel {pixel} sum to {weight_sum}, below the background ratio")]
pub struct WeightDriftError {
    /// Linear index of the failing pixel.
    pub pixel: usize,
    /// The cumulative weight observed over the full mixture.
    pub weight_sum: f64,
}

/// Detector parameters converted to statistic precision, read by every
/// kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams<S> {
    /// Maximum components per pixel (K).
    pub num_gaussians: usize,
    /// Variance of a freshly created component.
    pub initial_variance: S,
    /// Weight of a freshly created component.
    pub initial_weight: S,
    /// Match acceptance threshold.
    pub variance_threshold: S,
    /// Cumulative weight defining the background prefix.
    pub min_background_ratio: S,
}

impl<S: Statistic> ModelParams<S> {
    /// Converts validated configuration into statistic precision.
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            num_gaussians: config.num_gaussians,
            initial_variance: S::from_f64(config.initial_variance),
            initial_weight: S::from_f64(config.initial_weight),
            variance_threshold: S::from_f64(config.variance_threshold),
            min_background_ratio: S::from_f64(config.min_background_ratio),
        }
    }
}

/// The stateless per-pixel algorithm. Copies of one kernel run
/// concurrently across pixels; all mutable state lives in the mixtures.
#[derive(Debug, Clone, Copy)]
pub struct DetectionKernel<S> {
    params: ModelParams<S>,
    learning_rate: S,
}

impl<S: Statistic> DetectionKernel<S> {
    /// Creates a kernel for one step with the given learning rate.
    pub fn new(params: ModelParams<S>, learning_rate: S) -> Self {
        Self {
            params,
            learning_rate,
        }
    }

    /// Runs match-update-classify for one pixel. `pixel` holds the
    /// channel values in statistic precision; `pixel_index` is carried
    /// for diagnostics. Returns true for foreground.
    pub fn process(
        &self,
        mixture: &mut GaussianMixture<S>,
        pixel: &[S],
        pixel_index: usize,
    ) -> Result<bool, WeightDriftError> {
        let matched = self.find_match_and_update(mixture, pixel);
        self.classify(mixture, matched, pixel_index)
    }

    /// Phase one: locate or create the component owning this pixel,
    /// update it, restore the ranking, renormalize weights. Returns the
    /// matched component's position after re-ranking.
    fn find_match_and_update(&self, mixture: &mut GaussianMixture<S>, pixel: &[S]) -> usize {
        let alpha = self.learning_rate;
        let matched = mixture
            .components()
            .iter()
            .position(|component| component.is_match(pixel, self.params.variance_threshold));

        let (position, scale_factor) = match matched {
            Some(index) => {
                // Weights summed to 1 before the update and only the
                // matched weight changes, so the new total is
                // 1 + α·(1 − w) and its reciprocal renormalizes.
                let weight = mixture.components()[index].weight();
                let scale_factor = S::ONE / (S::ONE + alpha * (S::ONE - weight));
                mixture.component_mut(index).update(pixel, alpha);
                (self.percolate_up(mixture, index), scale_factor)
            }
            None => {
                let mut weight = self.params.initial_weight;
                if mixture.len() == self.params.num_gaussians {
                    if let Some(evicted) = mixture.pop_lowest() {
                        // The popped weight leaves the total, the new
                        // component's enters it.
                        weight -= evicted.weight();
                    }
                }
                mixture.push(WeightedGaussian::from_observation(
                    self.params.initial_weight,
                    pixel,
                    self.params.initial_variance,
                ));
                let scale_factor = if mixture.len() == 1 {
                    S::ONE / weight
                } else {
                    S::ONE / (S::ONE + weight)
                };
                (mixture.len() - 1, scale_factor)
            }
        };

        mixture.scale_weights(scale_factor);
        position
    }

    /// Moves the component at `index` toward the front while it outranks
    /// its neighbor. Re-sorting only happens upward; a rank-decreasing
    /// update leaves the mixture as-is until a later swap corrects it.
    fn percolate_up(&self, mixture: &mut GaussianMixture<S>, index: usize) -> usize {
        let mut position = index;
        while position > 0 {
            let components = mixture.components();
            if components[position].outranks(&components[position - 1]) {
                mixture.swap(position, position - 1);
                position -= 1;
            } else {
                break;
            }
        }
        position
    }

    /// Phase two: the Stauffer-Grimson decision for the component at
    /// `matched`. Returns true for foreground.
    fn classify(
        &self,
        mixture: &GaussianMixture<S>,
        matched: usize,
        pixel_index: usize,
    ) -> Result<bool, WeightDriftError> {
        // The top-ranked component is always background.
        if matched == 0 {
            return Ok(false);
        }
        debug_assert!(!mixture.is_empty());

        let epsilon = S::epsilon();
        let mut weight_sum = S::ZERO;
        for (index, component) in mixture.components().iter().enumerate() {
            weight_sum += component.weight();
            if (self.params.min_background_ratio - weight_sum) <= epsilon {
                // The scanned prefix is the background set.
                return Ok(matched != index);
            }
            if matched == index {
                // Reached before the ratio crossed: still inside the
                // background-defining prefix.
                return Ok(false);
            }
        }

        Err(WeightDriftError {
            pixel: pixel_index,
            weight_sum: weight_sum.to_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(num_gaussians: usize) -> ModelParams<f64> {
        ModelParams::from_config(&DetectorConfig {
            num_gaussians,
            initial_variance: 36.0,
            initial_weight: 0.05,
            variance_threshold: 6.25,
            min_background_ratio: 0.7,
        })
    }

    fn mixture_from(weights_means_vars: &[(f64, f64, f64)]) -> GaussianMixture<f64> {
        let mut mixture = GaussianMixture::with_capacity(weights_means_vars.len());
        for (weight, mean, variance) in weights_means_vars {
            mixture.push(WeightedGaussian::from_state(*weight, &[*mean], &[*variance]));
        }
        mixture
    }

    #[test]
    fn test_first_observation_is_background_with_unit_weight() {
        let kernel = DetectionKernel::new(params(3), 0.05);
        let mut mixture = GaussianMixture::with_capacity(3);
        let foreground = kernel.process(&mut mixture, &[128.0], 0).unwrap();
        assert!(!foreground);
        assert_eq!(mixture.len(), 1);
        // initialWeight scaled by 1/initialWeight.
        assert_eq!(mixture.components()[0].weight(), 1.0);
        assert_eq!(mixture.components()[0].mean()[0], 128.0);
    }

    #[test]
    fn test_unmatched_observation_is_foreground() {
        let kernel = DetectionKernel::new(params(3), 0.05);
        let mut mixture = GaussianMixture::with_capacity(3);
        kernel.process(&mut mixture, &[128.0], 0).unwrap();
        let foreground = kernel.process(&mut mixture, &[255.0], 0).unwrap();
        assert!(foreground);
        assert_eq!(mixture.len(), 2);
    }

    #[test]
    fn test_matched_update_conserves_weight_sum() {
        let kernel = DetectionKernel::new(params(3), 0.1);
        let mut mixture = mixture_from(&[(0.7, 10.0, 4.0), (0.3, 200.0, 4.0)]);
        kernel.process(&mut mixture, &[10.0], 0).unwrap();
        let sum: f64 = mixture.components().iter().map(|c| c.weight()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_insertion_conserves_weight_sum() {
        let kernel = DetectionKernel::new(params(3), 0.05);
        let mut mixture = mixture_from(&[(1.0, 10.0, 4.0)]);
        kernel.process(&mut mixture, &[200.0], 0).unwrap();
        let sum: f64 = mixture.components().iter().map(|c| c.weight()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(mixture.len(), 2);
    }

    #[test]
    fn test_eviction_conserves_weight_sum() {
        let kernel = DetectionKernel::new(params(2), 0.05);
        let mut mixture = mixture_from(&[(0.9, 10.0, 4.0), (0.1, 80.0, 4.0)]);
        kernel.process(&mut mixture, &[200.0], 0).unwrap();
        assert_eq!(mixture.len(), 2);
        // The evicted component's weight left the total before the new
        // one entered.
        let sum: f64 = mixture.components().iter().map(|c| c.weight()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        // Replacement carries the new observation.
        assert_eq!(mixture.components()[1].mean()[0], 200.0);
    }

    #[test]
    fn test_matched_component_percolates_up() {
        // The second component matches and its weight grows past the
        // first's under repeated hits; it must end up on top.
        let kernel = DetectionKernel::new(params(3), 0.3);
        let mut mixture = mixture_from(&[(0.55, 10.0, 4.0), (0.45, 80.0, 4.0)]);
        for _ in 0..4 {
            kernel.process(&mut mixture, &[80.0], 0).unwrap();
        }
        assert_eq!(mixture.components()[0].mean()[0], 80.0);
        let ranks: Vec<f64> = mixture.components().iter().map(|c| c.rank()).collect();
        assert!(ranks[0] >= ranks[1]);
    }

    #[test]
    fn test_percolate_stops_at_correct_position() {
        let kernel = DetectionKernel::new(params(3), 0.05);
        let mut mixture = mixture_from(&[(0.6, 0.0, 1.0), (0.3, 50.0, 1.0), (0.1, 90.0, 1.0)]);
        // A gentle match on the middle component should not unseat the
        // leader.
        kernel.process(&mut mixture, &[50.0], 0).unwrap();
        assert_eq!(mixture.components()[0].mean()[0], 0.0);
        assert_eq!(mixture.components()[1].mean()[0], 50.0);
    }

    #[test]
    fn test_quick_exit_top_component_is_background() {
        let kernel = DetectionKernel::new(params(3), 0.05);
        // Ratio can never be met by a prefix, yet a top-ranked match is
        // still background.
        let mut mixture = mixture_from(&[(0.5, 10.0, 4.0), (0.2, 90.0, 4.0)]);
        let foreground = kernel.process(&mut mixture, &[10.0], 0).unwrap();
        assert!(!foreground);
    }

    #[test]
    fn test_match_inside_background_prefix_is_background() {
        let kernel = DetectionKernel::new(params(3), 0.0001);
        // Prefix [0.4, 0.35] crosses 0.7 at index 1; a match landing at
        // index 1 is background, at index 2 foreground.
        let mut mixture = mixture_from(&[(0.4, 0.0, 1.0), (0.35, 50.0, 1.0), (0.25, 90.0, 1.0)]);
        let at_edge = kernel.process(&mut mixture, &[50.0], 0).unwrap();
        assert!(!at_edge);
        let mut mixture = mixture_from(&[(0.4, 0.0, 1.0), (0.35, 50.0, 1.0), (0.25, 90.0, 1.0)]);
        let below = kernel.process(&mut mixture, &[90.0], 0).unwrap();
        assert!(below);
    }

    #[test]
    fn test_drift_error_when_ratio_unreachable() {
        let kernel = DetectionKernel::new(params(3), 0.05);
        // Corrupted bookkeeping: total weight far below the ratio and a
        // matched position past the scan.
        let mixture = mixture_from(&[(0.2, 0.0, 1.0), (0.1, 50.0, 1.0)]);
        let err = kernel.classify(&mixture, 5, 17).unwrap_err();
        assert_eq!(err.pixel, 17);
        assert!((err.weight_sum - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_capacity_one_replaces_without_growth() {
        let kernel = DetectionKernel::new(params(1), 0.005);
        let mut mixture = GaussianMixture::with_capacity(1);
        kernel.process(&mut mixture, &[10.0], 0).unwrap();
        for frame in 0..6 {
            let value = if frame % 2 == 0 { 200.0 } else { 10.0 };
            kernel.process(&mut mixture, &[value], 0).unwrap();
            assert_eq!(mixture.len(), 1);
            assert_eq!(mixture.components()[0].mean()[0], value);
        }
    }

    #[test]
    fn test_convergence_on_static_value() {
        let kernel = DetectionKernel::new(params(3), 0.05);
        let mut mixture = GaussianMixture::with_capacity(3);
        for _ in 0..50 {
            let foreground = kernel.process(&mut mixture, &[128.0], 0).unwrap();
            assert!(!foreground);
        }
        assert_eq!(mixture.len(), 1);
        let component = &mixture.components()[0];
        assert!((component.weight() - 1.0).abs() < 1e-6);
        assert_eq!(component.mean()[0], 128.0);
        // Variance contracts by (1 − α) per matching frame.
        assert!(component.variance()[0] < 36.0);
    }

    proptest! {
        // Any observation sequence keeps the mixture bounded and its
        // weights normalized (capacity one is exempt: an eviction there
        // removes more weight than the replacement brings in).
        #[test]
        fn prop_weight_sum_stays_normalized(
            values in prop::collection::vec(any::<u8>(), 1..60),
            k in 2usize..=5,
        ) {
            let kernel = DetectionKernel::new(params(k), 0.05);
            let mut mixture = GaussianMixture::with_capacity(k);
            for value in &values {
                kernel.process(&mut mixture, &[f64::from(*value)], 0).unwrap();
                prop_assert!(mixture.len() <= k);
                let sum: f64 = mixture.components().iter().map(|c| c.weight()).sum();
                prop_assert!((sum - 1.0).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_variances_stay_positive(
            values in prop::collection::vec(any::<u8>(), 1..60),
        ) {
            let kernel = DetectionKernel::new(params(3), 0.2);
            let mut mixture = GaussianMixture::with_capacity(3);
            for value in &values {
                kernel.process(&mut mixture, &[f64::from(*value)], 0).unwrap();
                prop_assert!(mixture
                    .components()
                    .iter()
                    .all(|c| c.variance()[0] > 0.0));
            }
        }
    }
}
