//! Per-pixel Gaussian mixture state.
//!
//! This module holds the data a detector accumulates over a video
//! stream: individual weighted Gaussian components, the ranked per-pixel
//! mixture, and the store addressing one mixture per pixel with flat
//! state snapshots for persistence. The algorithm that mutates these
//! lives in [`crate::kernel`].

mod gaussian;
mod mixture;
mod store;

pub use gaussian::WeightedGaussian;
pub use mixture::GaussianMixture;
pub use store::{ModelState, ModelStore, StateError};
