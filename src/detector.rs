//! Detector lifecycle and the parallel per-frame step.
//!
//! The detector owns all per-pixel state behind a simple state machine:
//! uninitialized until `initialize`, then stepped once per frame. Each
//! step runs the detection kernel over every pixel in parallel; pixels
//! are independent, so the work splits over disjoint mutable slices of
//! the model store zipped with the output mask and needs no locks.

use rayon::prelude::*;
use std::marker::PhantomData;

use crate::config::{ConfigError, DetectorConfig, FrameDims, FrameLayout, MAX_CHANNELS};
use crate::kernel::{DetectionKernel, ModelParams, WeightDriftError};
use crate::model::{ModelState, ModelStore, StateError};
use crate::numeric::{Sample, Statistic};
use crate::view::{FrameError, FrameView};

/// Errors returned by detector operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DetectorError {
    #[error("detector has not been initialized")]
    NotInitialized,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("mask buffer holds {got} entries, expected {expected}")]
    MaskSize { expected: usize, got: usize },
    #[error("detector was initialized for {expected:?} frames, entry point expects {requested:?}")]
    LayoutMismatch {
        expected: FrameLayout,
        requested: FrameLayout,
    },
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Drift(#[from] WeightDriftError),
}

/// Everything a live detector owns.
#[derive(Debug)]
struct Engine<S> {
    dims: FrameDims,
    layout: FrameLayout,
    config: DetectorConfig,
    params: ModelParams<S>,
    store: ModelStore<S>,
    frames_processed: u64,
}

/// An adaptive Gaussian-mixture foreground detector.
///
/// Generic over the frame sample type `P` and the statistic precision
/// `S`; the supported pairings are available as the aliases
/// [`ForegroundDetectorU8`], [`ForegroundDetectorF32`], and
/// [`ForegroundDetectorF64`].
#[derive(Debug)]
pub struct ForegroundDetector<P, S> {
    engine: Option<Engine<S>>,
    _sample: PhantomData<fn() -> P>,
}

/// 8-bit frames with f32 statistics.
pub type ForegroundDetectorU8 = ForegroundDetector<u8, f32>;
/// f32 frames with f32 statistics.
pub type ForegroundDetectorF32 = ForegroundDetector<f32, f32>;
/// f64 frames with f64 statistics.
pub type ForegroundDetectorF64 = ForegroundDetector<f64, f64>;

impl<P, S> Default for ForegroundDetector<P, S> {
    fn default() -> Self {
        Self {
            engine: None,
            _sample: PhantomData,
        }
    }
}

impl<P: Sample, S: Statistic> ForegroundDetector<P, S> {
    /// Creates an uninitialized detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates per-pixel state for the given geometry and freezes the
    /// configuration. Initializing a live detector discards its state.
    pub fn initialize(
        &mut self,
        dims: FrameDims,
        layout: FrameLayout,
        config: DetectorConfig,
    ) -> Result<(), DetectorError> {
        config.validate()?;
        dims.validate()?;
        if self.engine.is_some() {
            tracing::info!("Reinitializing a live detector, discarding its state");
        }
        let store = ModelStore::new(dims.pixel_count(), config.num_gaussians);
        let params = ModelParams::from_config(&config);
        tracing::info!(
            rows = dims.rows,
            cols = dims.cols,
            channels = dims.channels,
            num_gaussians = config.num_gaussians,
            layout = ?layout,
            threads = rayon::current_num_threads(),
            "Detector initialized"
        );
        self.engine = Some(Engine {
            dims,
            layout,
            config,
            params,
            store,
            frames_processed: 0,
        });
        Ok(())
    }

    /// True once `initialize` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Frame geometry, if initialized.
    pub fn dims(&self) -> Option<FrameDims> {
        self.engine.as_ref().map(|e| e.dims)
    }

    /// Configured frame layout, if initialized.
    pub fn layout(&self) -> Option<FrameLayout> {
        self.engine.as_ref().map(|e| e.layout)
    }

    /// The frozen configuration, if initialized.
    pub fn config(&self) -> Option<&DetectorConfig> {
        self.engine.as_ref().map(|e| &e.config)
    }

    /// Frames stepped since initialization (or the last reinitialize).
    pub fn frames_processed(&self) -> u64 {
        self.engine.as_ref().map_or(0, |e| e.frames_processed)
    }

    /// Mean active component count across all pixels.
    pub fn mean_active_components(&self) -> f64 {
        self.engine.as_ref().map_or(0.0, |e| e.store.mean_active())
    }

    /// Processes one frame, writing one boolean per pixel into `mask`
    /// (true = foreground).
    ///
    /// `frame` must hold `rows × cols × channels` samples in the layout
    /// chosen at initialization, and `mask` one entry per pixel; mask
    /// index order follows the frame's pixel order. On a weight-drift
    /// error the frame is dropped mid-update and the mask and model
    /// contents are unspecified; recover with `reset` or `set_states`.
    pub fn step(
        &mut self,
        frame: &[P],
        mask: &mut [bool],
        learning_rate: S,
    ) -> Result<(), DetectorError> {
        let engine = self.engine.as_mut().ok_or(DetectorError::NotInitialized)?;
        if !(learning_rate > S::ZERO && learning_rate <= S::ONE) {
            return Err(ConfigError::InvalidLearningRate(learning_rate.to_f64()).into());
        }
        let view = FrameView::new(frame, engine.dims, engine.layout)?;
        let pixels = engine.dims.pixel_count();
        if mask.len() != pixels {
            return Err(DetectorError::MaskSize {
                expected: pixels,
                got: mask.len(),
            });
        }

        let channels = engine.dims.channels;
        let kernel = DetectionKernel::new(engine.params, learning_rate);
        let result = engine
            .store
            .models_mut()
            .par_iter_mut()
            .zip(mask.par_iter_mut())
            .enumerate()
            .try_for_each(|(pixel, (mixture, flag))| {
                let mut channel_buf = [S::ZERO; MAX_CHANNELS];
                view.read_pixel(pixel, &mut channel_buf);
                *flag = kernel.process(mixture, &channel_buf[..channels], pixel)?;
                Ok::<(), DetectorError>(())
            });
        if let Err(error) = &result {
            tracing::warn!(%error, "Step aborted");
        }
        result?;

        engine.frames_processed += 1;
        tracing::trace!(frame = engine.frames_processed, "Step complete");
        Ok(())
    }

    /// Snapshots every pixel's components into flat arrays.
    pub fn get_states(&self) -> Result<ModelState<S>, DetectorError> {
        let engine = self.engine.as_ref().ok_or(DetectorError::NotInitialized)?;
        let state = engine.store.export_states(engine.dims.channels);
        tracing::debug!(pixels = state.pixels, "Exported detector state");
        Ok(state)
    }

    /// Restores every pixel's components from a snapshot captured on a
    /// detector of identical geometry.
    pub fn set_states(&mut self, state: &ModelState<S>) -> Result<(), DetectorError> {
        let engine = self.engine.as_mut().ok_or(DetectorError::NotInitialized)?;
        engine.store.import_states(state, engine.dims.channels)?;
        tracing::debug!(pixels = state.pixels, "Imported detector state");
        Ok(())
    }

    /// Clears every pixel's mixture, keeping the allocation.
    pub fn reset(&mut self) -> Result<(), DetectorError> {
        let engine = self.engine.as_mut().ok_or(DetectorError::NotInitialized)?;
        engine.store.reset();
        engine.frames_processed = 0;
        tracing::info!("Detector reset");
        Ok(())
    }

    /// Frees all per-pixel state, returning to uninitialized. A no-op on
    /// an uninitialized detector.
    pub fn release(&mut self) {
        if self.engine.take().is_some() {
            tracing::info!("Detector released");
        }
    }
}
