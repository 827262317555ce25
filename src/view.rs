//! Borrowed strided views over frame buffers.
//!
//! Planar (column-major) and interleaved (row-major) frames hold the same
//! samples at different offsets. The view reduces both to a pair of
//! strides so the per-pixel algorithm is written once and never branches
//! on layout.

use crate::config::{FrameDims, FrameLayout, MAX_CHANNELS};
use crate::numeric::{Sample, Statistic};

/// Frame buffer errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer holds {got} samples, expected {expected}")]
    SampleCount { expected: usize, got: usize },
}

/// A read-only view of one frame with layout-dependent strides.
///
/// The sample at (pixel, channel) lives at
/// `pixel * pixel_stride + channel * channel_stride`.
#[derive(Clone, Copy)]
pub struct FrameView<'a, P> {
    samples: &'a [P],
    pixels: usize,
    channels: usize,
    pixel_stride: usize,
    channel_stride: usize,
}

impl<'a, P: Sample> FrameView<'a, P> {
    /// Wraps a frame buffer, checking its length against the geometry.
    pub fn new(samples: &'a [P], dims: FrameDims, layout: FrameLayout) -> Result<Self, FrameError> {
        let expected = dims.sample_count();
        if samples.len() != expected {
            return Err(FrameError::SampleCount {
                expected,
                got: samples.len(),
            });
        }
        let pixels = dims.pixel_count();
        let (pixel_stride, channel_stride) = match layout {
            FrameLayout::Planar => (1, pixels),
            FrameLayout::Interleaved => (dims.channels, 1),
        };
        Ok(Self {
            samples,
            pixels,
            channels: dims.channels,
            pixel_stride,
            channel_stride,
        })
    }

    /// Number of pixels in the frame.
    pub fn pixels(&self) -> usize {
        self.pixels
    }

    /// Channels per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The raw sample at (pixel, channel).
    #[inline]
    pub fn sample(&self, pixel: usize, channel: usize) -> P {
        self.samples[pixel * self.pixel_stride + channel * self.channel_stride]
    }

    /// Reads one pixel's channels, converted to statistic precision, into
    /// the head of `out`.
    #[inline]
    pub fn read_pixel<S: Statistic>(&self, pixel: usize, out: &mut [S; MAX_CHANNELS]) {
        for channel in 0..self.channels {
            out[channel] = S::from_f64(self.sample(pixel, channel).widen());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2x2 RGB frame: pixel p carries channel values (p, p+10, p+20).
    fn planar_samples() -> Vec<u8> {
        vec![0, 1, 2, 3, 10, 11, 12, 13, 20, 21, 22, 23]
    }

    fn interleaved_samples() -> Vec<u8> {
        vec![0, 10, 20, 1, 11, 21, 2, 12, 22, 3, 13, 23]
    }

    #[test]
    fn test_planar_addressing() {
        let samples = planar_samples();
        let view = FrameView::new(&samples, FrameDims::new(2, 2, 3), FrameLayout::Planar).unwrap();
        for pixel in 0..4u8 {
            assert_eq!(view.sample(pixel as usize, 0), pixel);
            assert_eq!(view.sample(pixel as usize, 1), pixel + 10);
            assert_eq!(view.sample(pixel as usize, 2), pixel + 20);
        }
    }

    #[test]
    fn test_interleaved_addressing() {
        let samples = interleaved_samples();
        let view = FrameView::new(
            &samples,
            FrameDims::new(2, 2, 3),
            FrameLayout::Interleaved,
        )
        .unwrap();
        for pixel in 0..4u8 {
            assert_eq!(view.sample(pixel as usize, 0), pixel);
            assert_eq!(view.sample(pixel as usize, 1), pixel + 10);
            assert_eq!(view.sample(pixel as usize, 2), pixel + 20);
        }
    }

    #[test]
    fn test_layouts_agree_per_pixel() {
        let planar = planar_samples();
        let interleaved = interleaved_samples();
        let dims = FrameDims::new(2, 2, 3);
        let a = FrameView::new(&planar, dims, FrameLayout::Planar).unwrap();
        let b = FrameView::new(&interleaved, dims, FrameLayout::Interleaved).unwrap();
        for pixel in 0..4 {
            let mut pa = [0.0f32; MAX_CHANNELS];
            let mut pb = [0.0f32; MAX_CHANNELS];
            a.read_pixel(pixel, &mut pa);
            b.read_pixel(pixel, &mut pb);
            assert_eq!(pa, pb);
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let samples = vec![0u8; 11];
        let result = FrameView::new(&samples, FrameDims::new(2, 2, 3), FrameLayout::Planar);
        assert!(matches!(
            result,
            Err(FrameError::SampleCount {
                expected: 12,
                got: 11
            })
        ));
    }

    #[test]
    fn test_read_pixel_widens_samples() {
        let samples = vec![5u8, 250];
        let view = FrameView::new(&samples, FrameDims::new(1, 2, 1), FrameLayout::Planar).unwrap();
        let mut out = [0.0f32; MAX_CHANNELS];
        view.read_pixel(1, &mut out);
        assert_eq!(out[0], 250.0);
    }
}
