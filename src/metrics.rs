//! Metrics collection and registry.
//!
//! The registry is transport-agnostic: the embedding process scrapes
//! [`MetricsRegistry::encode`] however it serves metrics. Snapshots are
//! assembled by the caller after a step, since the mask lives on the
//! caller's side.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

use crate::detector::ForegroundDetector;
use crate::numeric::{Sample, Statistic};

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of detector state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct DetectorSnapshot {
    /// Frames processed since initialization.
    pub frames_processed: u64,
    /// Foreground pixels in the last mask.
    pub foreground_pixels: u64,
    /// Total pixels per frame.
    pub total_pixels: u64,
    /// Mean active mixture components per pixel.
    pub mean_active_components: f64,
    /// Duration of the last step in seconds, if timed.
    pub step_seconds: Option<f64>,
}

impl DetectorSnapshot {
    /// Builds a snapshot from a detector and the mask its last step
    /// produced.
    pub fn from_step<P: Sample, S: Statistic>(
        detector: &ForegroundDetector<P, S>,
        mask: &[bool],
        step_seconds: Option<f64>,
    ) -> Self {
        let foreground_pixels = mask.iter().filter(|f| **f).count() as u64;
        Self {
            frames_processed: detector.frames_processed(),
            foreground_pixels,
            total_pixels: mask.len() as u64,
            mean_active_components: detector.mean_active_components(),
            step_seconds,
        }
    }
}

/// Prometheus metrics registry for detector monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    frames_total: IntCounter,
    foreground_pixels: IntGauge,
    foreground_ratio: Gauge,
    mean_active_components: Gauge,
    step_duration_seconds: Gauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all detector metrics
    /// registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_total = IntCounter::new(
            "foreground_gmm_frames_total",
            "Total frames processed by the detector",
        )?;
        let foreground_pixels = IntGauge::new(
            "foreground_gmm_foreground_pixels",
            "Foreground pixels in the last processed frame",
        )?;
        let foreground_ratio = Gauge::new(
            "foreground_gmm_foreground_ratio",
            "Fraction of the last frame classified foreground",
        )?;
        let mean_active_components = Gauge::new(
            "foreground_gmm_mean_active_components",
            "Mean active mixture components per pixel",
        )?;
        let step_duration_seconds = Gauge::new(
            "foreground_gmm_step_duration_seconds",
            "Duration of the last step in seconds",
        )?;

        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(foreground_pixels.clone()))?;
        registry.register(Box::new(foreground_ratio.clone()))?;
        registry.register(Box::new(mean_active_components.clone()))?;
        registry.register(Box::new(step_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            frames_total,
            foreground_pixels,
            foreground_ratio,
            mean_active_components,
            step_duration_seconds,
        })
    }

    /// Updates all metrics from a snapshot of detector state.
    pub fn update(&self, snapshot: &DetectorSnapshot) {
        // The frame counter only moves forward; reinitialization resets
        // the snapshot count, which the counter ignores.
        let current_frames = self.frames_total.get();
        if snapshot.frames_processed > current_frames {
            self.frames_total
                .inc_by(snapshot.frames_processed - current_frames);
        }

        self.foreground_pixels
            .set(snapshot.foreground_pixels as i64);
        let ratio = if snapshot.total_pixels > 0 {
            snapshot.foreground_pixels as f64 / snapshot.total_pixels as f64
        } else {
            0.0
        };
        self.foreground_ratio.set(ratio);
        self.mean_active_components
            .set(snapshot.mean_active_components);

        if let Some(seconds) = snapshot.step_seconds {
            self.step_duration_seconds.set(seconds);
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
