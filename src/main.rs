//! Foreground Detection CLI
//!
//! Command-line interface for testing and demonstrating the GMM
//! foreground detector on a synthetic scene.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use foreground_gmm::{
    DetectorError, DetectorSnapshot, FileConfig, ForegroundDetectorU8, FrameDims, FrameLayout,
    MetricsRegistry,
};
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use tracing::{info, warn};

/// Foreground detection demo parameters
#[derive(Parser, Debug)]
#[command(author, version, about = "GMM foreground detection on a synthetic scene", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of frames to process
    #[arg(short, long)]
    frames: Option<u32>,

    /// Run until interrupted, ignoring the frame count
    #[arg(long)]
    continuous: bool,

    /// Override the synthetic scene seed
    #[arg(long)]
    seed: Option<u64>,
}

/// Deterministic test scene: a noisy static background crossed by a
/// bright moving square.
struct SyntheticScene {
    dims: FrameDims,
    layout: FrameLayout,
    rng: ChaCha20Rng,
    tick: usize,
}

impl SyntheticScene {
    fn new(dims: FrameDims, layout: FrameLayout, seed: u64) -> Self {
        Self {
            dims,
            layout,
            rng: ChaCha20Rng::seed_from_u64(seed),
            tick: 0,
        }
    }

    fn next_frame(&mut self) -> Vec<u8> {
        let rows = self.dims.rows;
        let cols = self.dims.cols;
        let channels = self.dims.channels;
        let pixels = self.dims.pixel_count();
        let mut frame = vec![0u8; self.dims.sample_count()];

        let side = (rows.min(cols) / 4).max(1);
        let top = (self.tick * 2) % rows.saturating_sub(side).max(1);
        let left = (self.tick * 3) % cols.saturating_sub(side).max(1);

        for row in 0..rows {
            for col in 0..cols {
                let inside =
                    row >= top && row < top + side && col >= left && col < left + side;
                for channel in 0..channels {
                    let base: i32 = if inside { 230 } else { 40 + 30 * channel as i32 };
                    let noise = (self.rng.next_u32() % 7) as i32 - 3;
                    let value = (base + noise).clamp(0, 255) as u8;
                    let index = match self.layout {
                        // Column-major pixel order with one plane per channel.
                        FrameLayout::Planar => (row + col * rows) + channel * pixels,
                        FrameLayout::Interleaved => (row * cols + col) * channels + channel,
                    };
                    frame[index] = value;
                }
            }
        }
        self.tick += 1;
        frame
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Foreground GMM detector v{}", foreground_gmm::VERSION);
    info!("This is a demonstration on a synthetic scene");

    let mut config = match args.config.as_deref() {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(frames) = args.frames {
        config.run.frame_count = frames;
    }
    if args.continuous {
        config.run.continuous = true;
    }
    if let Some(seed) = args.seed {
        config.run.seed = seed;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let dims = config.frame.dims();
    let layout = config.frame.layout;
    let learning_rate = config.run.learning_rate as f32;

    let mut detector = ForegroundDetectorU8::new();
    if let Err(e) = detector.initialize(dims, layout, config.detector.clone()) {
        eprintln!("Failed to initialize detector: {}", e);
        std::process::exit(1);
    }

    let metrics = match MetricsRegistry::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("Failed to set up metrics: {}", e);
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    if config.run.continuous {
        let flag = running.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
            warn!("Could not install Ctrl-C handler: {}", e);
        } else {
            info!("Running continuously, press Ctrl-C to stop");
        }
    }

    let mut scene = SyntheticScene::new(dims, layout, config.run.seed);
    let mut mask = vec![false; dims.pixel_count()];

    info!("Processing frames...");

    let mut processed: u64 = 0;
    let mut dropped: u64 = 0;
    while running.load(Ordering::SeqCst)
        && (config.run.continuous || processed < u64::from(config.run.frame_count))
    {
        let frame = scene.next_frame();
        let started = Instant::now();
        match detector.step(&frame, &mut mask, learning_rate) {
            Ok(()) => {
                let elapsed = started.elapsed().as_secs_f64();
                metrics.update(&DetectorSnapshot::from_step(&detector, &mask, Some(elapsed)));
                processed += 1;
            }
            Err(DetectorError::Drift(e)) => {
                // Drift drops the frame but the detector stays usable.
                warn!("Frame dropped: {}", e);
                dropped += 1;
                continue;
            }
            Err(e) => {
                eprintln!("Detector step failed: {}", e);
                std::process::exit(1);
            }
        }

        if processed % 30 == 0 {
            let foreground = mask.iter().filter(|f| **f).count();
            info!(
                "Frame {}: foreground ratio {:.3}",
                processed,
                foreground as f64 / mask.len() as f64
            );
        }
    }

    info!("Processed {} frames, dropped {}", processed, dropped);

    match metrics.encode() {
        Ok(text) => println!("{}", text),
        Err(e) => warn!("Metrics encoding failed: {}", e),
    }
}
