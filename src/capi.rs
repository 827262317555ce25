//! C-callable entry points, one family per supported instantiation.
//!
//! Handles are opaque pointers returned by `construct` and freed by
//! `destroy`. Fallible operations return a status code instead of
//! panicking across the boundary; buffer sizes follow the initialized
//! geometry and are the caller's responsibility, as is keeping each
//! handle on one thread at a time. Masks are written as u8 0/1. State
//! arrays use the column-major snapshot layout documented on
//! [`crate::model::ModelState`].
#![allow(unsafe_code)]

use std::ffi::c_void;

use crate::config::{DetectorConfig, FrameDims, FrameLayout};
use crate::detector::{DetectorError, ForegroundDetector};
use crate::model::ModelState;
use crate::numeric::{Sample, Statistic};

/// Operation completed.
pub const STATUS_OK: i32 = 0;
/// A required pointer was null.
pub const STATUS_NULL_POINTER: i32 = 1;
/// The detector has not been initialized.
pub const STATUS_NOT_INITIALIZED: i32 = 2;
/// Configuration or learning-rate validation failed.
pub const STATUS_INVALID_CONFIG: i32 = 3;
/// A buffer did not match the initialized geometry.
pub const STATUS_BAD_BUFFER: i32 = 4;
/// The step entry point does not match the initialized layout.
pub const STATUS_LAYOUT_MISMATCH: i32 = 5;
/// A state snapshot failed validation.
pub const STATUS_BAD_STATE: i32 = 6;
/// Mixture weights drifted; the frame was dropped.
pub const STATUS_MODEL_DRIFT: i32 = 7;

fn status_of(error: &DetectorError) -> i32 {
    match error {
        DetectorError::NotInitialized => STATUS_NOT_INITIALIZED,
        DetectorError::Config(_) => STATUS_INVALID_CONFIG,
        DetectorError::Frame(_) | DetectorError::MaskSize { .. } => STATUS_BAD_BUFFER,
        DetectorError::LayoutMismatch { .. } => STATUS_LAYOUT_MISMATCH,
        DetectorError::State(_) => STATUS_BAD_STATE,
        DetectorError::Drift(_) => STATUS_MODEL_DRIFT,
    }
}

unsafe fn parse_dims(dims_ptr: *const i32, num_dims: i32) -> Option<FrameDims> {
    if !(2..=3).contains(&num_dims) {
        return None;
    }
    let dims = std::slice::from_raw_parts(dims_ptr, num_dims as usize);
    let rows = usize::try_from(dims[0]).ok()?;
    let cols = usize::try_from(dims[1]).ok()?;
    let channels = if num_dims == 3 {
        usize::try_from(dims[2]).ok()?
    } else {
        1
    };
    Some(FrameDims::new(rows, cols, channels))
}

fn construct_impl<P: Sample, S: Statistic>() -> *mut c_void {
    Box::into_raw(Box::new(ForegroundDetector::<P, S>::new())) as *mut c_void
}

#[allow(clippy::too_many_arguments)]
unsafe fn initialize_impl<P: Sample, S: Statistic>(
    detector: *mut ForegroundDetector<P, S>,
    dims_ptr: *const i32,
    num_dims: i32,
    row_major: i32,
    num_gaussians: i32,
    initial_variance: S,
    initial_weight: S,
    variance_threshold: S,
    min_background_ratio: S,
) -> i32 {
    if detector.is_null() || dims_ptr.is_null() {
        return STATUS_NULL_POINTER;
    }
    let dims = match parse_dims(dims_ptr, num_dims) {
        Some(dims) => dims,
        None => return STATUS_INVALID_CONFIG,
    };
    let num_gaussians = match usize::try_from(num_gaussians) {
        Ok(k) => k,
        Err(_) => return STATUS_INVALID_CONFIG,
    };
    let config = DetectorConfig {
        num_gaussians,
        initial_variance: initial_variance.to_f64(),
        initial_weight: initial_weight.to_f64(),
        variance_threshold: variance_threshold.to_f64(),
        min_background_ratio: min_background_ratio.to_f64(),
    };
    let layout = if row_major != 0 {
        FrameLayout::Interleaved
    } else {
        FrameLayout::Planar
    };
    match (*detector).initialize(dims, layout, config) {
        Ok(()) => STATUS_OK,
        Err(error) => status_of(&error),
    }
}

unsafe fn step_impl<P: Sample, S: Statistic>(
    detector: *mut ForegroundDetector<P, S>,
    frame_ptr: *const P,
    mask_ptr: *mut u8,
    learning_rate: S,
    requested: FrameLayout,
) -> i32 {
    if detector.is_null() || frame_ptr.is_null() || mask_ptr.is_null() {
        return STATUS_NULL_POINTER;
    }
    let detector = &mut *detector;
    let dims = match detector.dims() {
        Some(dims) => dims,
        None => return STATUS_NOT_INITIALIZED,
    };
    if let Some(expected) = detector.layout() {
        if expected != requested {
            return status_of(&DetectorError::LayoutMismatch {
                expected,
                requested,
            });
        }
    }
    let frame = std::slice::from_raw_parts(frame_ptr, dims.sample_count());
    let pixels = dims.pixel_count();
    // Zero the caller's byte buffer first, making every entry a valid
    // bool; the mask can then be written in place without a staging
    // allocation.
    std::slice::from_raw_parts_mut(mask_ptr, pixels).fill(0);
    let mask = std::slice::from_raw_parts_mut(mask_ptr as *mut bool, pixels);
    match detector.step(frame, mask, learning_rate) {
        Ok(()) => STATUS_OK,
        Err(error) => status_of(&error),
    }
}

unsafe fn get_states_impl<P: Sample, S: Statistic>(
    detector: *const ForegroundDetector<P, S>,
    out_weights: *mut S,
    out_means: *mut S,
    out_variances: *mut S,
    out_num_active: *mut i32,
) -> i32 {
    if detector.is_null()
        || out_weights.is_null()
        || out_means.is_null()
        || out_variances.is_null()
        || out_num_active.is_null()
    {
        return STATUS_NULL_POINTER;
    }
    let state = match (*detector).get_states() {
        Ok(state) => state,
        Err(error) => return status_of(&error),
    };
    std::slice::from_raw_parts_mut(out_weights, state.weights.len())
        .copy_from_slice(&state.weights);
    std::slice::from_raw_parts_mut(out_means, state.means.len()).copy_from_slice(&state.means);
    std::slice::from_raw_parts_mut(out_variances, state.variances.len())
        .copy_from_slice(&state.variances);
    let num_active = std::slice::from_raw_parts_mut(out_num_active, state.num_active.len());
    for (dst, src) in num_active.iter_mut().zip(&state.num_active) {
        *dst = *src as i32;
    }
    STATUS_OK
}

unsafe fn set_states_impl<P: Sample, S: Statistic>(
    detector: *mut ForegroundDetector<P, S>,
    weights: *const S,
    means: *const S,
    variances: *const S,
    num_active: *const i32,
) -> i32 {
    if detector.is_null()
        || weights.is_null()
        || means.is_null()
        || variances.is_null()
        || num_active.is_null()
    {
        return STATUS_NULL_POINTER;
    }
    let detector = &mut *detector;
    let (dims, num_gaussians) = match (detector.dims(), detector.config()) {
        (Some(dims), Some(config)) => (dims, config.num_gaussians),
        _ => return STATUS_NOT_INITIALIZED,
    };
    let pixels = dims.pixel_count();
    let channels = dims.channels;
    let stat_len = pixels * channels * num_gaussians;
    let state = ModelState {
        pixels,
        channels,
        num_gaussians,
        weights: std::slice::from_raw_parts(weights, pixels * num_gaussians).to_vec(),
        means: std::slice::from_raw_parts(means, stat_len).to_vec(),
        variances: std::slice::from_raw_parts(variances, stat_len).to_vec(),
        num_active: std::slice::from_raw_parts(num_active, pixels)
            .iter()
            .map(|n| *n as u32)
            .collect(),
    };
    match detector.set_states(&state) {
        Ok(()) => STATUS_OK,
        Err(error) => status_of(&error),
    }
}

unsafe fn reset_impl<P: Sample, S: Statistic>(detector: *mut ForegroundDetector<P, S>) -> i32 {
    if detector.is_null() {
        return STATUS_NULL_POINTER;
    }
    match (*detector).reset() {
        Ok(()) => STATUS_OK,
        Err(error) => status_of(&error),
    }
}

unsafe fn release_impl<P: Sample, S: Statistic>(detector: *mut ForegroundDetector<P, S>) -> i32 {
    if detector.is_null() {
        return STATUS_NULL_POINTER;
    }
    (*detector).release();
    STATUS_OK
}

unsafe fn destroy_impl<P: Sample, S: Statistic>(detector: *mut ForegroundDetector<P, S>) {
    if !detector.is_null() {
        drop(Box::from_raw(detector));
    }
}

macro_rules! foreground_gmm_capi {
    ($pixel:ty, $stat:ty,
     $construct:ident, $initialize:ident, $step:ident, $step_row_major:ident,
     $get_states:ident, $set_states:ident, $reset:ident, $release:ident,
     $destroy:ident) => {
        /// Allocates a new uninitialized detector handle.
        #[no_mangle]
        pub extern "C" fn $construct() -> *mut c_void {
            construct_impl::<$pixel, $stat>()
        }

        /// Initializes the detector behind `handle`.
        ///
        /// # Safety
        /// `handle` must come from the matching `construct`; `dims_ptr`
        /// must point at `num_dims` (2 or 3) entries `[rows, cols,
        /// channels]`. `row_major` selects the frame layout (0 = planar).
        #[no_mangle]
        #[allow(clippy::too_many_arguments)]
        pub unsafe extern "C" fn $initialize(
            handle: *mut c_void,
            dims_ptr: *const i32,
            num_dims: i32,
            row_major: i32,
            num_gaussians: i32,
            initial_variance: $stat,
            initial_weight: $stat,
            variance_threshold: $stat,
            min_background_ratio: $stat,
        ) -> i32 {
            initialize_impl(
                handle as *mut ForegroundDetector<$pixel, $stat>,
                dims_ptr,
                num_dims,
                row_major,
                num_gaussians,
                initial_variance,
                initial_weight,
                variance_threshold,
                min_background_ratio,
            )
        }

        /// Steps one planar frame, writing u8 0/1 per pixel into
        /// `mask_ptr`.
        ///
        /// # Safety
        /// `frame_ptr` must hold `rows × cols × channels` samples and
        /// `mask_ptr` `rows × cols` bytes, per the initialized geometry.
        #[no_mangle]
        pub unsafe extern "C" fn $step(
            handle: *mut c_void,
            frame_ptr: *const $pixel,
            mask_ptr: *mut u8,
            learning_rate: $stat,
        ) -> i32 {
            step_impl(
                handle as *mut ForegroundDetector<$pixel, $stat>,
                frame_ptr,
                mask_ptr,
                learning_rate,
                FrameLayout::Planar,
            )
        }

        /// Steps one interleaved (row-major) frame.
        ///
        /// # Safety
        /// Same buffer contract as the planar step.
        #[no_mangle]
        pub unsafe extern "C" fn $step_row_major(
            handle: *mut c_void,
            frame_ptr: *const $pixel,
            mask_ptr: *mut u8,
            learning_rate: $stat,
        ) -> i32 {
            step_impl(
                handle as *mut ForegroundDetector<$pixel, $stat>,
                frame_ptr,
                mask_ptr,
                learning_rate,
                FrameLayout::Interleaved,
            )
        }

        /// Copies the detector state into caller arrays.
        ///
        /// # Safety
        /// Arrays must be sized for the initialized geometry: weights
        /// `pixels × K`, means/variances `pixels × channels × K`,
        /// num_active `pixels`.
        #[no_mangle]
        pub unsafe extern "C" fn $get_states(
            handle: *mut c_void,
            out_weights: *mut $stat,
            out_means: *mut $stat,
            out_variances: *mut $stat,
            out_num_active: *mut i32,
        ) -> i32 {
            get_states_impl(
                handle as *const ForegroundDetector<$pixel, $stat>,
                out_weights,
                out_means,
                out_variances,
                out_num_active,
            )
        }

        /// Restores detector state from caller arrays.
        ///
        /// # Safety
        /// Same array contract as `get_states`.
        #[no_mangle]
        pub unsafe extern "C" fn $set_states(
            handle: *mut c_void,
            weights: *const $stat,
            means: *const $stat,
            variances: *const $stat,
            num_active: *const i32,
        ) -> i32 {
            set_states_impl(
                handle as *mut ForegroundDetector<$pixel, $stat>,
                weights,
                means,
                variances,
                num_active,
            )
        }

        /// Clears every pixel's mixture.
        ///
        /// # Safety
        /// `handle` must come from the matching `construct`.
        #[no_mangle]
        pub unsafe extern "C" fn $reset(handle: *mut c_void) -> i32 {
            reset_impl(handle as *mut ForegroundDetector<$pixel, $stat>)
        }

        /// Frees per-pixel state, returning the handle to uninitialized.
        ///
        /// # Safety
        /// `handle` must come from the matching `construct`.
        #[no_mangle]
        pub unsafe extern "C" fn $release(handle: *mut c_void) -> i32 {
            release_impl(handle as *mut ForegroundDetector<$pixel, $stat>)
        }

        /// Frees the handle itself. The pointer is invalid afterwards.
        ///
        /// # Safety
        /// `handle` must come from the matching `construct` and must not
        /// be used again.
        #[no_mangle]
        pub unsafe extern "C" fn $destroy(handle: *mut c_void) {
            destroy_impl(handle as *mut ForegroundDetector<$pixel, $stat>)
        }
    };
}

foreground_gmm_capi!(
    u8,
    f32,
    foreground_gmm_construct_u8_f32,
    foreground_gmm_initialize_u8_f32,
    foreground_gmm_step_u8_f32,
    foreground_gmm_step_row_major_u8_f32,
    foreground_gmm_get_states_u8_f32,
    foreground_gmm_set_states_u8_f32,
    foreground_gmm_reset_u8_f32,
    foreground_gmm_release_u8_f32,
    foreground_gmm_destroy_u8_f32
);

foreground_gmm_capi!(
    f32,
    f32,
    foreground_gmm_construct_f32_f32,
    foreground_gmm_initialize_f32_f32,
    foreground_gmm_step_f32_f32,
    foreground_gmm_step_row_major_f32_f32,
    foreground_gmm_get_states_f32_f32,
    foreground_gmm_set_states_f32_f32,
    foreground_gmm_reset_f32_f32,
    foreground_gmm_release_f32_f32,
    foreground_gmm_destroy_f32_f32
);

foreground_gmm_capi!(
    f64,
    f64,
    foreground_gmm_construct_f64_f64,
    foreground_gmm_initialize_f64_f64,
    foreground_gmm_step_f64_f64,
    foreground_gmm_step_row_major_f64_f64,
    foreground_gmm_get_states_f64_f64,
    foreground_gmm_set_states_f64_f64,
    foreground_gmm_reset_f64_f64,
    foreground_gmm_release_f64_f64,
    foreground_gmm_destroy_f64_f64
);
