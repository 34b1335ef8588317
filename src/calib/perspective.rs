//! Ground-plane perspective calibration from straight-road images.
//!
//! The vanishing point is the least-squares intersection of the detected
//! lane-edge line segments: every segment contributes the outer product of
//! its unit normal to a 2×2 normal-equation system, and the solution
//! minimizes the aggregate perpendicular distance to all lines. A source
//! trapezoid built around the vanishing point is mapped onto the output
//! rectangle, and the warped reference images calibrate the metric scale.

use crate::calib::camera::homography_dlt;
use crate::edges::{edge_map, sobel_gradients};
use crate::error::{Error, Result};
use crate::image::GrayImage;
use crate::rectify::warp_perspective;
use crate::segments::{extract_segments, Segment, SegmentOptions};
use crate::types::{CalibrationData, PerspectiveCalibration};
use log::{debug, warn};
use nalgebra::{Matrix2, Matrix3, Vector2};
use serde::{Deserialize, Serialize};

/// Options for the perspective calibration.
///
/// The trapezoid and masking defaults mirror the tuning the reference
/// straight-road footage was calibrated with.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PerspectiveOptions {
    /// Size (w, h) of the bird's-eye output rectangle.
    pub output_size: (usize, usize),
    /// Distance of the trapezoid top edge below the vanishing point, px.
    pub top_offset: f64,
    /// Width of the trapezoid top edge, px.
    pub top_width: f64,
    /// Margin above the image bottom for the trapezoid base, px.
    pub bottom_margin: f64,
    /// ROI band: rows below `h/2 + roi_center_margin` and above
    /// `h - roi_bottom_margin` participate in line detection.
    pub roi_center_margin: f64,
    pub roi_bottom_margin: f64,
    /// Luma threshold isolating lane-edge pixels in the warped image.
    pub lane_luma_threshold: u8,
    /// Border width zeroed on each side of the warped mask, px.
    pub mask_border: usize,
    /// Real-world lane width in meters (US standard 12 ft by default).
    pub lane_width_m: f64,
    /// Edge threshold feeding the segment extractor.
    pub edge_threshold: f32,
    pub segments: SegmentOptions,
}

impl Default for PerspectiveOptions {
    fn default() -> Self {
        Self {
            output_size: (500, 600),
            top_offset: 60.0,
            top_width: 530.0,
            bottom_margin: 35.0,
            roi_center_margin: 50.0,
            roi_bottom_margin: 50.0,
            lane_luma_threshold: 128,
            mask_border: 50,
            lane_width_m: 3.6576,
            edge_threshold: 0.4,
            segments: SegmentOptions {
                min_length_px: 60.0,
                ..SegmentOptions::default()
            },
        }
    }
}

/// Offline perspective calibration driver.
#[derive(Clone, Debug)]
pub struct PerspectiveCalibrator {
    pub calibration: CalibrationData,
    pub options: PerspectiveOptions,
}

impl PerspectiveCalibrator {
    pub fn new(calibration: CalibrationData, options: PerspectiveOptions) -> Self {
        Self {
            calibration,
            options,
        }
    }

    /// Calibrate from already-undistorted straight-road images.
    pub fn calibrate(&self, images: &[GrayImage]) -> Result<PerspectiveCalibration> {
        if images.len() < 2 {
            return Err(Error::CalibrationInsufficientData {
                required: 2,
                found: images.len(),
            });
        }
        let image_height = images[0].h as f64;

        let mut segments = Vec::new();
        for img in images {
            segments.extend(self.road_segments(img));
        }
        debug!("perspective: {} road segments accumulated", segments.len());
        let vp = estimate_vanishing_point(&segments)?;
        debug!("perspective: vanishing point at ({:.1}, {:.1})", vp[0], vp[1]);

        let source_quad = self.source_trapezoid(&vp, image_height);
        let homography = self.solve_homography(&source_quad)?;
        let ppm_x = self.calibrate_horizontal_scale(images, &homography)?;
        let ppm_y = self.vertical_scale(&homography, ppm_x)?;

        debug!(
            "perspective: scale {ppm_x:.2} x {ppm_y:.2} px/m over {}x{} output",
            self.options.output_size.0, self.options.output_size.1
        );

        Ok(PerspectiveCalibration {
            homography,
            pixels_per_meter: (ppm_x, ppm_y),
            source_quad,
        })
    }

    /// Detect line segments inside the road band (sky and hood excluded).
    fn road_segments(&self, img: &GrayImage) -> Vec<Segment> {
        let grad = sobel_gradients(&img.to_f32());
        let mut edges = edge_map(&grad, self.options.edge_threshold);
        let top = (img.h as f64 / 2.0 + self.options.roi_center_margin).max(0.0) as usize;
        let bottom = (img.h as f64 - self.options.roi_bottom_margin).max(0.0) as usize;
        for y in 0..img.h {
            if y < top || y >= bottom {
                edges.row_mut(y).fill(0);
            }
        }
        extract_segments(&grad, &edges, &self.options.segments)
    }

    /// Trapezoid around the vanishing point, corners in (tl, tr, br, bl)
    /// order.
    fn source_trapezoid(&self, vp: &Vector2<f64>, image_height: f64) -> [(f64, f64); 4] {
        let top = vp[1] + self.options.top_offset;
        let bottom = image_height - self.options.bottom_margin;
        let half = self.options.top_width / 2.0;
        let p1 = (vp[0] - half, top);
        let p2 = (vp[0] + half, top);
        let p3 = extend_through(p2, (vp[0], vp[1]), bottom);
        let p4 = extend_through(p1, (vp[0], vp[1]), bottom);
        [p1, p2, p3, p4]
    }

    fn solve_homography(&self, source_quad: &[(f64, f64); 4]) -> Result<Matrix3<f64>> {
        let (ow, oh) = self.options.output_size;
        let src: Vec<[f64; 2]> = source_quad.iter().map(|&(x, y)| [x, y]).collect();
        let dst = vec![
            [0.0, 0.0],
            [ow as f64, 0.0],
            [ow as f64, oh as f64],
            [0.0, oh as f64],
        ];
        homography_dlt(&src, &dst)
    }

    /// Warp each reference image, isolate the lane-edge mask and take the
    /// minimum observed lane width as the conservative scale estimate.
    fn calibrate_horizontal_scale(
        &self,
        images: &[GrayImage],
        homography: &Matrix3<f64>,
    ) -> Result<f64> {
        let (ow, oh) = self.options.output_size;
        let mut min_width = f64::MAX;

        for (i, img) in images.iter().enumerate() {
            let Some(warped) = warp_perspective(img, homography, ow, oh) else {
                return Err(Error::CalibrationSingular(
                    "perspective homography not invertible",
                ));
            };
            let mut mask = GrayImage::new(ow, oh);
            for (dst, &src) in mask.data.iter_mut().zip(warped.data.iter()) {
                *dst = u8::from(src > self.options.lane_luma_threshold) * 255;
            }
            let border = self.options.mask_border.min(ow / 2);
            for y in 0..oh {
                let row = mask.row_mut(y);
                row[..border].fill(0);
                row[ow - border..].fill(0);
            }

            let left = centroid_x(&mask, 0, ow / 2);
            let right = centroid_x(&mask, ow / 2, ow);
            match (left, right) {
                (Some(x1), Some(x2)) if x2 > x1 => {
                    min_width = min_width.min(x2 - x1);
                }
                _ => warn!("perspective: reference image {i} lacks two lane edges, skipping"),
            }
        }

        if min_width == f64::MAX {
            return Err(Error::CalibrationSingular(
                "no reference image produced a measurable lane width",
            ));
        }
        Ok(min_width / self.options.lane_width_m)
    }

    /// Vertical pixels-per-meter from the anisotropy of the warp: the ratio
    /// of the basis-column norms of `(H·K)⁻¹`.
    fn vertical_scale(&self, homography: &Matrix3<f64>, ppm_x: f64) -> Result<f64> {
        let lh = (homography * self.calibration.camera_matrix)
            .try_inverse()
            .ok_or(Error::CalibrationSingular(
                "homography-intrinsics product not invertible",
            ))?;
        let nx = lh.column(0).norm();
        let ny = lh.column(1).norm();
        if ny <= 0.0 {
            return Err(Error::CalibrationSingular("degenerate vertical scale"));
        }
        Ok(ppm_x * nx / ny)
    }
}

/// Solve the 2×2 normal-equation system accumulated from segment normals.
///
/// Fails with `CalibrationSingular` when the detected lines are
/// near-collinear and the system has no stable inverse.
pub fn estimate_vanishing_point(segments: &[Segment]) -> Result<Vector2<f64>> {
    if segments.is_empty() {
        return Err(Error::CalibrationSingular(
            "no line segments to intersect",
        ));
    }
    let mut lhs = Matrix2::<f64>::zeros();
    let mut rhs = Vector2::<f64>::zeros();
    for seg in segments {
        let n = seg.normal();
        let normal = Vector2::new(n[0] as f64, n[1] as f64);
        let point = Vector2::new(seg.p0[0] as f64, seg.p0[1] as f64);
        let weight = (seg.strength as f64).max(1.0);
        let outer = normal * normal.transpose() * weight;
        lhs += outer;
        rhs += outer * point;
    }
    let det = lhs.determinant();
    let trace = lhs.trace();
    if det.abs() <= 1e-9_f64.max(1e-9 * trace * trace) {
        return Err(Error::CalibrationSingular(
            "normal-equation system near-singular (collinear lines)",
        ));
    }
    Ok(lhs
        .try_inverse()
        .ok_or(Error::CalibrationSingular(
            "normal-equation system not invertible",
        ))?
        * rhs)
}

/// Mean x of foreground pixels within the column span `[x0, x1)`, `None`
/// when the span is empty.
fn centroid_x(mask: &GrayImage, x0: usize, x1: usize) -> Option<f64> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for y in 0..mask.h {
        let row = mask.row(y);
        for (x, &v) in row[x0..x1].iter().enumerate() {
            if v != 0 {
                sum += (x0 + x) as f64;
                count += 1;
            }
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Point on the line through `p` and `q` at the given y coordinate.
fn extend_through(p: (f64, f64), q: (f64, f64), y: f64) -> (f64, f64) {
    let slope = (q.0 - p.0) / (q.1 - p.1);
    (p.0 + slope * (y - p.1), y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::Segment;

    #[test]
    fn converging_lines_meet_at_vanishing_point() {
        // Two lines through (100, 50): x = y + 50 and x = -y + 150.
        let segments = vec![
            Segment::from_endpoints([150.0, 100.0], [250.0, 200.0], 30.0),
            Segment::from_endpoints([50.0, 100.0], [-50.0, 200.0], 30.0),
        ];
        let vp = estimate_vanishing_point(&segments).expect("solvable");
        assert!((vp[0] - 100.0).abs() < 1e-6, "vp.x = {}", vp[0]);
        assert!((vp[1] - 50.0).abs() < 1e-6, "vp.y = {}", vp[1]);
    }

    #[test]
    fn parallel_lines_are_singular() {
        let segments = vec![
            Segment::from_endpoints([10.0, 0.0], [10.0, 100.0], 5.0),
            Segment::from_endpoints([40.0, 0.0], [40.0, 100.0], 5.0),
        ];
        match estimate_vanishing_point(&segments) {
            Err(Error::CalibrationSingular(_)) => {}
            other => panic!("expected singular system, got {other:?}"),
        }
    }

    #[test]
    fn trapezoid_narrows_toward_vanishing_point() {
        let calibrator = PerspectiveCalibrator::new(
            CalibrationData {
                camera_matrix: Matrix3::identity(),
                distortion_coeffs: vec![0.0; 4],
                image_size: (1280, 720),
            },
            PerspectiveOptions::default(),
        );
        let vp = Vector2::new(640.0, 420.0);
        let quad = calibrator.source_trapezoid(&vp, 720.0);
        let top_width = quad[1].0 - quad[0].0;
        let bottom_width = quad[2].0 - quad[3].0;
        assert!((top_width - 530.0).abs() < 1e-9);
        assert!(bottom_width > top_width);
        // Symmetric about the vanishing point for a centered VP.
        assert!(((quad[0].0 + quad[1].0) / 2.0 - 640.0).abs() < 1e-9);
        assert!(((quad[2].0 + quad[3].0) / 2.0 - 640.0).abs() < 1e-6);
    }

    #[test]
    fn fewer_than_two_images_is_insufficient() {
        let calibrator = PerspectiveCalibrator::new(
            CalibrationData {
                camera_matrix: Matrix3::identity(),
                distortion_coeffs: vec![0.0; 4],
                image_size: (320, 240),
            },
            PerspectiveOptions::default(),
        );
        match calibrator.calibrate(&[GrayImage::new(320, 240)]) {
            Err(Error::CalibrationInsufficientData { required: 2, found: 1 }) => {}
            other => panic!("expected insufficient data, got {other:?}"),
        }
    }
}
