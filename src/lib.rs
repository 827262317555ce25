//! Foreground Detection via Gaussian Mixture Models
//!
//! An online background-subtraction engine: every pixel carries a small
//! mixture of weighted Gaussians that adapts one frame at a time, and each
//! incoming pixel is classified as background or foreground against the
//! dominant components of its own mixture.
//!
//! # Architecture
//!
//! The system follows an explicit per-frame data flow:
//!
//! ```text
//! frame → view → kernel (match → update → sort → classify) → mask
//!                   ↕
//!              model store ←→ state snapshots
//! ```
//!
//! # Design Principles
//!
//! - **Online**: each frame updates the model in a single pass; no frame
//!   history is retained
//! - **Per-pixel independence**: mixtures never share state, so frames
//!   parallelize cleanly across pixels
//! - **Deterministic**: identical frames and parameters yield bit-identical
//!   masks and state, regardless of worker thread count
//! - **Layout-aware**: planar (column-major) and interleaved (row-major)
//!   frames through the same detector
//!
//! # Example
//!
//! ```
//! use foreground_gmm::{DetectorConfig, ForegroundDetectorU8, FrameDims, FrameLayout};
//!
//! let mut detector = ForegroundDetectorU8::new();
//! detector
//!     .initialize(
//!         FrameDims::new(2, 2, 1),
//!         FrameLayout::Planar,
//!         DetectorConfig::default(),
//!     )
//!     .unwrap();
//!
//! // A static scene is absorbed into the background model.
//! let background = [128u8; 4];
//! let mut mask = [false; 4];
//! for _ in 0..20 {
//!     detector.step(&background, &mut mask, 0.05).unwrap();
//! }
//! assert!(mask.iter().all(|fg| !fg));
//!
//! // An object entering the scene shows up as foreground.
//! let intruder = [255u8; 4];
//! detector.step(&intruder, &mut mask, 0.05).unwrap();
//! assert!(mask.iter().all(|fg| *fg));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

#[cfg(feature = "capi")]
pub mod capi;
pub mod config;
pub mod detector;
pub mod kernel;
pub mod metrics;
pub mod model;
pub mod numeric;
pub mod view;

// Re-export commonly used types at crate root
pub use config::{ConfigError, DetectorConfig, FileConfig, FrameDims, FrameLayout};
pub use detector::{
    DetectorError, ForegroundDetector, ForegroundDetectorF32, ForegroundDetectorF64,
    ForegroundDetectorU8,
};
pub use kernel::{DetectionKernel, WeightDriftError};
pub use metrics::{DetectorSnapshot, MetricsRegistry};
pub use model::ModelState;
pub use numeric::{Sample, Statistic};
pub use view::FrameView;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
