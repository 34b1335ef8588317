//! Per-frame rectification: undistortion followed by the bird's-eye warp.
//!
//! Stateless apart from precomputed inverse maps; one instance is freely
//! shareable across pipeline instances since the calibration artifacts are
//! immutable.

use crate::error::{Error, Result};
use crate::image::GrayImage;
use crate::types::{CalibrationData, PerspectiveCalibration};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

/// Warp `src` through the homography `h` (src → dst coordinates) into an
/// output of `out_w × out_h`, sampling bilinearly. `None` when `h` is not
/// invertible.
pub fn warp_perspective(
    src: &GrayImage,
    h: &Matrix3<f64>,
    out_w: usize,
    out_h: usize,
) -> Option<GrayImage> {
    let h_inv = h.try_inverse()?;
    let mut out = GrayImage::new(out_w, out_h);
    out.data
        .par_chunks_mut(out_w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                let p = h_inv * Vector3::new(x as f64, y as f64, 1.0);
                if !p[2].is_finite() || p[2].abs() < 1e-12 {
                    continue;
                }
                let sx = (p[0] / p[2]) as f32;
                let sy = (p[1] / p[2]) as f32;
                if let Some(v) = src.sample_bilinear(sx, sy) {
                    *px = v;
                }
            }
        });
    Some(out)
}

/// Undistort a frame with the pinhole model: for every output pixel the
/// ideal normalized coordinates are pushed through the forward distortion
/// model to find the source sample position.
pub fn undistort(frame: &GrayImage, calibration: &CalibrationData) -> GrayImage {
    let k = &calibration.camera_matrix;
    let fx = k[(0, 0)];
    let fy = k[(1, 1)];
    let cx = k[(0, 2)];
    let cy = k[(1, 2)];
    let d = &calibration.distortion_coeffs;
    let k1 = d.first().copied().unwrap_or(0.0);
    let k2 = d.get(1).copied().unwrap_or(0.0);
    let p1 = d.get(2).copied().unwrap_or(0.0);
    let p2 = d.get(3).copied().unwrap_or(0.0);
    let k3 = d.get(4).copied().unwrap_or(0.0);

    let w = frame.w;
    let mut out = GrayImage::new(frame.w, frame.h);
    out.data.par_chunks_mut(w).enumerate().for_each(|(v, row)| {
        let y = (v as f64 - cy) / fy;
        for (u, px) in row.iter_mut().enumerate() {
            let x = (u as f64 - cx) / fx;
            let r2 = x * x + y * y;
            let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
            let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            let sx = (fx * xd + cx) as f32;
            let sy = (fy * yd + cy) as f32;
            if let Some(value) = frame.sample_bilinear(sx, sy) {
                *px = value;
            }
        }
    });
    out
}

/// Undistorts and warps frames into the bird's-eye view.
#[derive(Clone, Debug)]
pub struct FrameRectifier {
    calibration: CalibrationData,
    perspective: PerspectiveCalibration,
    output_size: (usize, usize),
}

impl FrameRectifier {
    /// Fails with `CalibrationSingular` when the stored homography cannot be
    /// inverted for sampling.
    pub fn new(
        calibration: CalibrationData,
        perspective: PerspectiveCalibration,
        output_size: (usize, usize),
    ) -> Result<Self> {
        if perspective.homography.try_inverse().is_none() {
            return Err(Error::CalibrationSingular(
                "perspective homography not invertible",
            ));
        }
        Ok(Self {
            calibration,
            perspective,
            output_size,
        })
    }

    /// Produce the bird's-eye image for one frame.
    ///
    /// A frame whose dimensions disagree with the calibration is reported
    /// upward and skipped by the caller; no state is touched here.
    pub fn rectify(&self, frame: &GrayImage) -> Result<GrayImage> {
        let (cal_w, cal_h) = self.calibration.image_size;
        if frame.w != cal_w || frame.h != cal_h {
            return Err(Error::MaskDimensionMismatch {
                expected_w: cal_w,
                expected_h: cal_h,
                got_w: frame.w,
                got_h: frame.h,
            });
        }
        let undistorted = undistort(frame, &self.calibration);
        let (out_w, out_h) = self.output_size;
        // Invertibility was checked at construction.
        warp_perspective(&undistorted, &self.perspective.homography, out_w, out_h).ok_or(
            Error::CalibrationSingular("perspective homography not invertible"),
        )
    }
}
