//! The per-pixel mixture: an ordered, bounded list of components.
//!
//! Components are kept sorted by descending rank. The mixture itself is
//! plain storage; capacity enforcement and re-ranking belong to the
//! detection kernel, which owns the algorithm.

use crate::model::WeightedGaussian;
use crate::numeric::Statistic;

/// One pixel's Gaussian mixture, ordered by descending rank.
#[derive(Debug, Clone)]
pub struct GaussianMixture<S> {
    components: Vec<WeightedGaussian<S>>,
}

impl<S: Statistic> GaussianMixture<S> {
    /// Creates an empty mixture with room for `capacity` components, so
    /// steps never reallocate.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            components: Vec::with_capacity(capacity),
        }
    }

    /// Number of active components.
    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True when no component is active.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The components in rank order.
    #[inline]
    pub fn components(&self) -> &[WeightedGaussian<S>] {
        &self.components
    }

    /// Mutable access to one component.
    #[inline]
    pub fn component_mut(&mut self, index: usize) -> &mut WeightedGaussian<S> {
        &mut self.components[index]
    }

    /// Appends a component at the bottom of the ranking.
    #[inline]
    pub fn push(&mut self, component: WeightedGaussian<S>) {
        self.components.push(component);
    }

    /// Removes and returns the lowest-ranked (last) component.
    #[inline]
    pub fn pop_lowest(&mut self) -> Option<WeightedGaussian<S>> {
        self.components.pop()
    }

    /// Swaps two components, used by the percolate-up re-sort.
    #[inline]
    pub fn swap(&mut self, a: usize, b: usize) {
        self.components.swap(a, b);
    }

    /// Multiplies every component weight by `factor`.
    #[inline]
    pub fn scale_weights(&mut self, factor: S) {
        for component in &mut self.components {
            component.scale_weight(factor);
        }
    }

    /// Drops all components, keeping the allocation.
    pub fn clear(&mut self) {
        self.components.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(weight: f64, mean: f64, variance: f64) -> WeightedGaussian<f64> {
        WeightedGaussian::from_state(weight, &[mean], &[variance])
    }

    #[test]
    fn test_push_and_pop_order() {
        let mut mixture = GaussianMixture::with_capacity(3);
        mixture.push(component(0.6, 10.0, 4.0));
        mixture.push(component(0.3, 50.0, 4.0));
        assert_eq!(mixture.len(), 2);
        let popped = mixture.pop_lowest().unwrap();
        assert_eq!(popped.weight(), 0.3);
        assert_eq!(mixture.len(), 1);
    }

    #[test]
    fn test_scale_weights_applies_to_all() {
        let mut mixture = GaussianMixture::with_capacity(2);
        mixture.push(component(0.8, 0.0, 1.0));
        mixture.push(component(0.4, 0.0, 1.0));
        mixture.scale_weights(0.5);
        let weights: Vec<f64> = mixture.components().iter().map(|c| c.weight()).collect();
        assert_eq!(weights, vec![0.4, 0.2]);
    }

    #[test]
    fn test_swap_reorders() {
        let mut mixture = GaussianMixture::with_capacity(2);
        mixture.push(component(0.1, 1.0, 1.0));
        mixture.push(component(0.9, 2.0, 1.0));
        mixture.swap(0, 1);
        assert_eq!(mixture.components()[0].mean()[0], 2.0);
        assert_eq!(mixture.components()[1].mean()[0], 1.0);
    }

    #[test]
    fn test_clear_empties() {
        let mut mixture = GaussianMixture::with_capacity(2);
        mixture.push(component(1.0, 0.0, 1.0));
        mixture.clear();
        assert!(mixture.is_empty());
        assert_eq!(mixture.pop_lowest(), None);
    }
}
