//! Per-pixel model storage and flat state snapshots.
//!
//! The store owns one mixture per pixel for the detector's lifetime.
//! Snapshots marshal every pixel's components into flat column-major
//! arrays: pixel index has stride 1, channel stride equals the pixel
//! count, and the component index is outermost. Inactive slots are
//! zero-filled on export and ignored on import.

use serde::{Deserialize, Serialize};

use crate::model::{GaussianMixture, WeightedGaussian};
use crate::numeric::Statistic;

/// State snapshot errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StateError {
    #[error("state snapshot covers {got} pixels, detector holds {expected}")]
    PixelCount { expected: usize, got: usize },
    #[error("state snapshot has {got} channels, detector expects {expected}")]
    ChannelCount { expected: usize, got: usize },
    #[error("state snapshot holds {got} components per pixel, detector holds {expected}")]
    ComponentCapacity { expected: usize, got: usize },
    #[error("state array `{name}` holds {got} entries, expected {expected}")]
    ArrayLength {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("pixel {pixel} reports {got} active components, capacity is {capacity}")]
    ActiveCount {
        pixel: usize,
        got: usize,
        capacity: usize,
    },
    #[error("nonpositive variance in state at pixel {pixel}, component {component}")]
    NonPositiveVariance { pixel: usize, component: usize },
}

/// A full snapshot of detector state in flat column-major arrays.
///
/// `weights[pixel + k·pixels]`, `means`/`variances`
/// `[pixel + c·pixels + k·pixels·channels]`, `num_active[pixel]`.
/// Components appear in rank order; import trusts that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState<S> {
    /// Pixels covered by the snapshot.
    pub pixels: usize,
    /// Channels per pixel at capture time.
    pub channels: usize,
    /// Component capacity (K) at capture time.
    pub num_gaussians: usize,
    /// Mixing weights, `pixels × num_gaussians`.
    pub weights: Vec<S>,
    /// Per-channel means, `pixels × channels × num_gaussians`.
    pub means: Vec<S>,
    /// Per-channel variances, same shape as `means`.
    pub variances: Vec<S>,
    /// Active component count per pixel.
    pub num_active: Vec<u32>,
}

impl<S: Statistic> ModelState<S> {
    /// Validates the snapshot's internal array lengths against its own
    /// header fields.
    pub fn validate_lengths(&self) -> Result<(), StateError> {
        let weight_len = self.pixels * self.num_gaussians;
        let stat_len = weight_len * self.channels;
        let checks = [
            ("weights", weight_len, self.weights.len()),
            ("means", stat_len, self.means.len()),
            ("variances", stat_len, self.variances.len()),
            ("num_active", self.pixels, self.num_active.len()),
        ];
        for (name, expected, got) in checks {
            if expected != got {
                return Err(StateError::ArrayLength {
                    name,
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }
}

/// All per-pixel mixtures, addressed by linear pixel index.
#[derive(Debug)]
pub struct ModelStore<S> {
    models: Vec<GaussianMixture<S>>,
    num_gaussians: usize,
}

impl<S: Statistic> ModelStore<S> {
    /// Allocates one empty mixture per pixel, each with capacity for
    /// `num_gaussians` components.
    pub fn new(pixels: usize, num_gaussians: usize) -> Self {
        let models = (0..pixels)
            .map(|_| GaussianMixture::with_capacity(num_gaussians))
            .collect();
        Self {
            models,
            num_gaussians,
        }
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True when the store covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Component capacity per pixel.
    pub fn num_gaussians(&self) -> usize {
        self.num_gaussians
    }

    /// The mixtures in pixel order.
    pub fn models(&self) -> &[GaussianMixture<S>] {
        &self.models
    }

    /// Mutable mixtures in pixel order, the parallel step's work items.
    pub fn models_mut(&mut self) -> &mut [GaussianMixture<S>] {
        &mut self.models
    }

    /// Mean active component count across all pixels.
    pub fn mean_active(&self) -> f64 {
        if self.models.is_empty() {
            return 0.0;
        }
        let total: usize = self.models.iter().map(|m| m.len()).sum();
        total as f64 / self.models.len() as f64
    }

    /// Clears every mixture without touching the outer allocation.
    pub fn reset(&mut self) {
        for model in &mut self.models {
            model.clear();
        }
    }

    /// Exports every pixel's components into a flat snapshot.
    pub fn export_states(&self, channels: usize) -> ModelState<S> {
        let pixels = self.models.len();
        let k = self.num_gaussians;
        let mut state = ModelState {
            pixels,
            channels,
            num_gaussians: k,
            weights: vec![S::ZERO; pixels * k],
            means: vec![S::ZERO; pixels * channels * k],
            variances: vec![S::ZERO; pixels * channels * k],
            num_active: vec![0u32; pixels],
        };
        let stat_stride = pixels * channels;
        for (pixel, model) in self.models.iter().enumerate() {
            state.num_active[pixel] = model.len() as u32;
            for (index, component) in model.components().iter().enumerate() {
                state.weights[pixel + index * pixels] = component.weight();
                let base = pixel + index * stat_stride;
                for channel in 0..channels {
                    state.means[base + channel * pixels] = component.mean()[channel];
                    state.variances[base + channel * pixels] = component.variance()[channel];
                }
            }
        }
        state
    }

    /// Replaces every pixel's components from a snapshot captured on a
    /// store of identical geometry.
    pub fn import_states(&mut self, state: &ModelState<S>, channels: usize) -> Result<(), StateError> {
        if state.pixels != self.models.len() {
            return Err(StateError::PixelCount {
                expected: self.models.len(),
                got: state.pixels,
            });
        }
        if state.channels != channels {
            return Err(StateError::ChannelCount {
                expected: channels,
                got: state.channels,
            });
        }
        if state.num_gaussians != self.num_gaussians {
            return Err(StateError::ComponentCapacity {
                expected: self.num_gaussians,
                got: state.num_gaussians,
            });
        }
        state.validate_lengths()?;

        let pixels = state.pixels;
        let stat_stride = pixels * channels;
        // Validate before mutating so a bad snapshot leaves the store
        // untouched.
        for pixel in 0..pixels {
            let active = state.num_active[pixel] as usize;
            if active > self.num_gaussians {
                return Err(StateError::ActiveCount {
                    pixel,
                    got: active,
                    capacity: self.num_gaussians,
                });
            }
            for index in 0..active {
                let base = pixel + index * stat_stride;
                for channel in 0..channels {
                    if !(state.variances[base + channel * pixels] > S::ZERO) {
                        return Err(StateError::NonPositiveVariance {
                            pixel,
                            component: index,
                        });
                    }
                }
            }
        }

        let mut mean = [S::ZERO; crate::config::MAX_CHANNELS];
        let mut variance = [S::ZERO; crate::config::MAX_CHANNELS];
        for (pixel, model) in self.models.iter_mut().enumerate() {
            model.clear();
            let active = state.num_active[pixel] as usize;
            for index in 0..active {
                let base = pixel + index * stat_stride;
                for channel in 0..channels {
                    mean[channel] = state.means[base + channel * pixels];
                    variance[channel] = state.variances[base + channel * pixels];
                }
                model.push(WeightedGaussian::from_state(
                    state.weights[pixel + index * pixels],
                    &mean[..channels],
                    &variance[..channels],
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled_store() -> ModelStore<f64> {
        let mut store = ModelStore::new(2, 2);
        store.models_mut()[0].push(WeightedGaussian::from_state(
            0.6,
            &[1.0, 2.0, 3.0],
            &[4.0, 5.0, 6.0],
        ));
        store.models_mut()[1].push(WeightedGaussian::from_state(
            0.9,
            &[7.0, 8.0, 9.0],
            &[1.0, 1.0, 1.0],
        ));
        store.models_mut()[1].push(WeightedGaussian::from_state(
            0.1,
            &[20.0, 21.0, 22.0],
            &[2.0, 2.0, 2.0],
        ));
        store
    }

    #[test]
    fn test_export_layout_strides() {
        let store = filled_store();
        let state = store.export_states(3);

        // weights: [pixel + k·pixels] with pixels = 2.
        assert_eq!(state.weights, vec![0.6, 0.9, 0.0, 0.1]);
        assert_eq!(state.num_active, vec![1, 2]);

        // means: [pixel + c·pixels + k·pixels·channels], stride 6 per
        // component. Pixel 0 component 0 occupies offsets 0, 2, 4.
        assert_eq!(state.means[0], 1.0);
        assert_eq!(state.means[2], 2.0);
        assert_eq!(state.means[4], 3.0);
        // Pixel 1 component 0 at offsets 1, 3, 5.
        assert_eq!(state.means[1], 7.0);
        assert_eq!(state.means[3], 8.0);
        assert_eq!(state.means[5], 9.0);
        // Pixel 1 component 1 at offsets 7, 9, 11.
        assert_eq!(state.means[7], 20.0);
        assert_eq!(state.means[9], 21.0);
        assert_eq!(state.means[11], 22.0);
        // Pixel 0 component 1 is inactive and zero-filled.
        assert_eq!(state.means[6], 0.0);
        assert_eq!(state.variances[6], 0.0);
    }

    #[test]
    fn test_round_trip_preserves_components() {
        let store = filled_store();
        let state = store.export_states(3);

        let mut restored = ModelStore::new(2, 2);
        restored.import_states(&state, 3).unwrap();
        assert_eq!(restored.export_states(3), state);
        assert_eq!(
            restored.models()[1].components(),
            store.models()[1].components()
        );
    }

    #[test]
    fn test_import_rejects_pixel_mismatch() {
        let state = filled_store().export_states(3);
        let mut other = ModelStore::<f64>::new(3, 2);
        assert!(matches!(
            other.import_states(&state, 3),
            Err(StateError::PixelCount {
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn test_import_rejects_capacity_mismatch() {
        let state = filled_store().export_states(3);
        let mut other = ModelStore::<f64>::new(2, 4);
        assert!(matches!(
            other.import_states(&state, 3),
            Err(StateError::ComponentCapacity { .. })
        ));
    }

    #[test]
    fn test_import_rejects_overfull_pixel() {
        let mut state = filled_store().export_states(3);
        state.num_active[0] = 3;
        let mut other = ModelStore::<f64>::new(2, 2);
        assert!(matches!(
            other.import_states(&state, 3),
            Err(StateError::ActiveCount { pixel: 0, .. })
        ));
    }

    #[test]
    fn test_import_rejects_zero_variance() {
        let mut state = filled_store().export_states(3);
        state.variances[0] = 0.0;
        let mut other = ModelStore::<f64>::new(2, 2);
        assert!(matches!(
            other.import_states(&state, 3),
            Err(StateError::NonPositiveVariance {
                pixel: 0,
                component: 0
            })
        ));
    }

    #[test]
    fn test_bad_import_leaves_store_untouched() {
        let mut store = filled_store();
        let mut state = store.export_states(3);
        state.variances[1] = -1.0;
        let before = store.export_states(3);
        assert!(store.import_states(&state, 3).is_err());
        assert_eq!(store.export_states(3), before);
    }

    #[test]
    fn test_reset_clears_all_pixels() {
        let mut store = filled_store();
        store.reset();
        assert_eq!(store.mean_active(), 0.0);
        let state = store.export_states(3);
        assert_eq!(state.num_active, vec![0, 0]);
        assert!(state.weights.iter().all(|w| *w == 0.0));
    }

    #[test]
    fn test_array_length_validation() {
        let mut state = filled_store().export_states(3);
        state.weights.pop();
        let mut other = ModelStore::<f64>::new(2, 2);
        assert!(matches!(
            other.import_states(&state, 3),
            Err(StateError::ArrayLength {
                name: "weights",
                ..
            })
        ));
    }

    proptest! {
        #[test]
        fn prop_export_import_round_trips(
            per_pixel in prop::collection::vec(
                prop::collection::vec(
                    (0.01f64..1.5, -50.0f64..300.0, 0.01f64..900.0),
                    0..=3,
                ),
                3,
            )
        ) {
            let mut store = ModelStore::new(3, 3);
            for (pixel, components) in per_pixel.iter().enumerate() {
                for (weight, mean, variance) in components {
                    store.models_mut()[pixel].push(WeightedGaussian::from_state(
                        *weight,
                        &[*mean; 3],
                        &[*variance; 3],
                    ));
                }
            }
            let state = store.export_states(3);
            let mut restored = ModelStore::new(3, 3);
            restored.import_states(&state, 3).unwrap();
            prop_assert_eq!(restored.export_states(3), state);
        }
    }
}
