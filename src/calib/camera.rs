//! Chessboard-based intrinsic camera calibration.
//!
//! Zhang's planar method: every view with a fully detected corner grid
//! contributes a normalized-DLT homography between the canonical planar
//! object points and the detected image corners. Stacked homography
//! constraints yield the intrinsic matrix; per-view extrinsics follow, and
//! radial distortion (k1, k2) is estimated by linear least squares on the
//! reprojection residuals.

use crate::calib::chessboard::{find_chessboard_corners, ChessboardSpec};
use crate::error::{Error, Result};
use crate::image::GrayImage;
use crate::types::CalibrationData;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3, Vector2, Vector3};

/// Intrinsic calibration driver.
#[derive(Clone, Debug)]
pub struct CameraCalibrator {
    pub spec: ChessboardSpec,
    /// Minimum number of images with a fully detected grid; the solve is
    /// underdetermined below this.
    pub min_detections: usize,
}

/// Calibration result plus solve diagnostics.
#[derive(Clone, Debug)]
pub struct CalibrationOutcome {
    pub data: CalibrationData,
    pub views_used: usize,
    pub reprojection_rms: f64,
}

impl CameraCalibrator {
    pub fn new(spec: ChessboardSpec) -> Self {
        Self {
            spec,
            min_detections: 3,
        }
    }

    /// Detect corners in every image and solve for intrinsics + distortion.
    pub fn calibrate(&self, images: &[GrayImage]) -> Result<CalibrationOutcome> {
        let object_points = self.object_points();
        let mut image_points: Vec<Vec<[f64; 2]>> = Vec::new();
        let mut image_size = (0usize, 0usize);

        for (i, img) in images.iter().enumerate() {
            match find_chessboard_corners(img, &self.spec) {
                Some(corners) => {
                    image_size = (img.w, img.h);
                    image_points.push(corners);
                }
                None => {
                    warn!("calibration view {i}: no full corner grid, skipping");
                }
            }
        }

        if image_points.len() < self.min_detections {
            return Err(Error::CalibrationInsufficientData {
                required: self.min_detections,
                found: image_points.len(),
            });
        }
        debug!("calibrating from {} views", image_points.len());

        let homographies: Vec<Matrix3<f64>> = image_points
            .iter()
            .map(|pts| homography_dlt(&object_points, pts))
            .collect::<Result<_>>()?;

        let kmtx = intrinsics_from_homographies(&homographies)?;
        let extrinsics: Vec<(Matrix3<f64>, Vector3<f64>)> = homographies
            .iter()
            .map(|h| extrinsics_from_homography(&kmtx, h))
            .collect::<Result<_>>()?;

        let (k1, k2) = estimate_radial_distortion(&kmtx, &extrinsics, &object_points, &image_points);
        let distortion = vec![k1, k2, 0.0, 0.0];
        let rms = reprojection_rms(&kmtx, &distortion, &extrinsics, &object_points, &image_points);
        debug!("calibration reprojection RMS: {rms:.4} px");

        Ok(CalibrationOutcome {
            data: CalibrationData {
                camera_matrix: kmtx,
                distortion_coeffs: distortion,
                image_size,
            },
            views_used: image_points.len(),
            reprojection_rms: rms,
        })
    }

    /// Canonical planar object points (unit square spacing, z = 0),
    /// row-major to match the detector's corner ordering.
    fn object_points(&self) -> Vec<[f64; 2]> {
        let mut pts = Vec::with_capacity(self.spec.corner_count());
        for r in 0..self.spec.rows {
            for c in 0..self.spec.cols {
                pts.push([c as f64, r as f64]);
            }
        }
        pts
    }
}

/// Similarity normalization used by the DLT: centroid at origin, average
/// distance sqrt(2).
fn normalization_transform(pts: &[[f64; 2]]) -> Matrix3<f64> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Normalized DLT homography mapping `src` onto `dst`.
pub(crate) fn homography_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>> {
    assert_eq!(src.len(), dst.len());
    assert!(src.len() >= 4, "homography needs at least 4 point pairs");

    let t_src = normalization_transform(src);
    let t_dst = normalization_transform(dst);
    let apply = |t: &Matrix3<f64>, p: &[f64; 2]| {
        let v = t * Vector3::new(p[0], p[1], 1.0);
        [v[0] / v[2], v[1] / v[2]]
    };

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for i in 0..n {
        let p = apply(&t_src, &src[i]);
        let q = apply(&t_dst, &dst[i]);
        let (x, y) = (p[0], p[1]);
        let (u, v) = (q[0], q[1]);
        a.row_mut(2 * i).copy_from_slice(&[
            -x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u,
        ]);
        a.row_mut(2 * i + 1).copy_from_slice(&[
            0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v,
        ]);
    }

    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or(Error::CalibrationSingular("homography SVD failed"))?;
    let hvec = v_t.row(v_t.nrows() - 1);
    let hn = Matrix3::new(
        hvec[0], hvec[1], hvec[2], hvec[3], hvec[4], hvec[5], hvec[6], hvec[7], hvec[8],
    );

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or(Error::CalibrationSingular("degenerate normalization"))?;
    let mut h = t_dst_inv * hn * t_src;
    if h[(2, 2)].abs() < 1e-12 {
        return Err(Error::CalibrationSingular("homography scale vanished"));
    }
    h /= h[(2, 2)];
    Ok(h)
}

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> [f64; 6] {
    let hi = h.column(i);
    let hj = h.column(j);
    [
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ]
}

/// Closed-form intrinsics from ≥3 planar homographies (Zhang's B-matrix).
fn intrinsics_from_homographies(homographies: &[Matrix3<f64>]) -> Result<Matrix3<f64>> {
    let n = homographies.len();
    let mut v = DMatrix::<f64>::zeros(2 * n, 6);
    for (k, h) in homographies.iter().enumerate() {
        let v12 = v_ij(h, 0, 1);
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        for c in 0..6 {
            v[(2 * k, c)] = v12[c];
            v[(2 * k + 1, c)] = v11[c] - v22[c];
        }
    }
    let svd = v.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or(Error::CalibrationSingular("intrinsic SVD failed"))?;
    let b = v_t.row(v_t.nrows() - 1);
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    if denom.abs() < 1e-15 || b11.abs() < 1e-15 {
        return Err(Error::CalibrationSingular("degenerate intrinsic system"));
    }
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    let alpha_sq = lambda / b11;
    let beta_sq = lambda * b11 / denom;
    if alpha_sq <= 0.0 || beta_sq <= 0.0 {
        return Err(Error::CalibrationSingular("non-positive focal estimate"));
    }
    let alpha = alpha_sq.sqrt();
    let beta = beta_sq.sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    Ok(Matrix3::new(
        alpha, gamma, u0, 0.0, beta, v0, 0.0, 0.0, 1.0,
    ))
}

fn extrinsics_from_homography(
    kmtx: &Matrix3<f64>,
    h: &Matrix3<f64>,
) -> Result<(Matrix3<f64>, Vector3<f64>)> {
    let k_inv = kmtx
        .try_inverse()
        .ok_or(Error::CalibrationSingular("camera matrix not invertible"))?;
    let h1 = k_inv * h.column(0);
    let h2 = k_inv * h.column(1);
    let h3 = k_inv * h.column(2);
    let scale = 1.0 / h1.norm().max(1e-15);
    let r1 = h1 * scale;
    let r2 = h2 * scale;
    let r3 = r1.cross(&r2);
    let t = h3 * scale;
    let r = Matrix3::from_columns(&[r1, r2, r3]);
    Ok((r, t))
}

/// Normalized camera-plane coordinates of a planar object point under a
/// view's extrinsics.
fn normalized_coords(r: &Matrix3<f64>, t: &Vector3<f64>, obj: &[f64; 2]) -> Vector2<f64> {
    let p = r * Vector3::new(obj[0], obj[1], 0.0) + t;
    Vector2::new(p[0] / p[2], p[1] / p[2])
}

/// Linear least-squares estimate of the radial terms (k1, k2).
fn estimate_radial_distortion(
    kmtx: &Matrix3<f64>,
    extrinsics: &[(Matrix3<f64>, Vector3<f64>)],
    object_points: &[[f64; 2]],
    image_points: &[Vec<[f64; 2]>],
) -> (f64, f64) {
    let u0 = kmtx[(0, 2)];
    let v0 = kmtx[(1, 2)];
    let total = extrinsics.len() * object_points.len();
    let mut a = DMatrix::<f64>::zeros(2 * total, 2);
    let mut d = DVector::<f64>::zeros(2 * total);

    let mut row = 0usize;
    for (view, (r, t)) in extrinsics.iter().enumerate() {
        for (j, obj) in object_points.iter().enumerate() {
            let xn = normalized_coords(r, t, obj);
            let r2 = xn.norm_squared();
            let ideal = kmtx * Vector3::new(xn[0], xn[1], 1.0);
            let (u, v) = (ideal[0], ideal[1]);
            let observed = image_points[view][j];
            a[(2 * row, 0)] = (u - u0) * r2;
            a[(2 * row, 1)] = (u - u0) * r2 * r2;
            a[(2 * row + 1, 0)] = (v - v0) * r2;
            a[(2 * row + 1, 1)] = (v - v0) * r2 * r2;
            d[2 * row] = observed[0] - u;
            d[2 * row + 1] = observed[1] - v;
            row += 1;
        }
    }

    let ata = a.transpose() * &a;
    let atd = a.transpose() * d;
    match ata.try_inverse() {
        Some(inv) => {
            let k = inv * atd;
            (k[0], k[1])
        }
        None => {
            debug!("distortion system singular, assuming zero distortion");
            (0.0, 0.0)
        }
    }
}

/// Project a planar object point through the full distortion model.
pub(crate) fn project_point(
    kmtx: &Matrix3<f64>,
    distortion: &[f64],
    r: &Matrix3<f64>,
    t: &Vector3<f64>,
    obj: &[f64; 2],
) -> [f64; 2] {
    let xn = normalized_coords(r, t, obj);
    let r2 = xn.norm_squared();
    let k1 = distortion.first().copied().unwrap_or(0.0);
    let k2 = distortion.get(1).copied().unwrap_or(0.0);
    let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
    let p = kmtx * Vector3::new(xn[0] * radial, xn[1] * radial, 1.0);
    [p[0] / p[2], p[1] / p[2]]
}

fn reprojection_rms(
    kmtx: &Matrix3<f64>,
    distortion: &[f64],
    extrinsics: &[(Matrix3<f64>, Vector3<f64>)],
    object_points: &[[f64; 2]],
    image_points: &[Vec<[f64; 2]>],
) -> f64 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (view, (r, t)) in extrinsics.iter().enumerate() {
        for (j, obj) in object_points.iter().enumerate() {
            let proj = project_point(kmtx, distortion, r, t, obj);
            let observed = image_points[view][j];
            sum += (proj[0] - observed[0]).powi(2) + (proj[1] - observed[1]).powi(2);
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlt_recovers_known_homography() {
        let h_true = Matrix3::new(1.2, 0.1, 10.0, -0.05, 0.9, 20.0, 1e-4, -2e-4, 1.0);
        let src: Vec<[f64; 2]> = (0..6)
            .flat_map(|r| (0..8).map(move |c| [c as f64 * 30.0, r as f64 * 30.0]))
            .collect();
        let dst: Vec<[f64; 2]> = src
            .iter()
            .map(|p| {
                let v = h_true * Vector3::new(p[0], p[1], 1.0);
                [v[0] / v[2], v[1] / v[2]]
            })
            .collect();
        let h = homography_dlt(&src, &dst).expect("solvable");
        for (a, b) in h.iter().zip(h_true.iter()) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn too_few_views_is_insufficient_data() {
        let calibrator = CameraCalibrator::new(ChessboardSpec { cols: 9, rows: 6 });
        // Blank frames detect nothing.
        let images = vec![GrayImage::new(64, 48); 4];
        match calibrator.calibrate(&images) {
            Err(Error::CalibrationInsufficientData { required, found }) => {
                assert_eq!(required, 3);
                assert_eq!(found, 0);
            }
            other => panic!("expected insufficient data, got {other:?}"),
        }
    }

    #[test]
    fn synthetic_pinhole_views_recover_intrinsics() {
        // Three views of the unit-spaced grid through a known pinhole camera
        // at different poses; corners are fed in directly, bypassing the
        // detector, to exercise the solver alone.
        let k_true = Matrix3::new(420.0, 0.0, 320.0, 0.0, 410.0, 240.0, 0.0, 0.0, 1.0);
        let poses = [
            (0.0f64, 0.1f64, Vector3::new(-3.0, -2.0, 12.0)),
            (0.15, -0.05, Vector3::new(-2.5, -2.5, 14.0)),
            (-0.1, 0.2, Vector3::new(-3.5, -1.5, 11.0)),
        ];
        let mut homographies = Vec::new();
        for (ax, ay, t) in poses {
            let r = nalgebra::Rotation3::from_euler_angles(ax, ay, 0.03).into_inner();
            // Planar homography K [r1 r2 t].
            let h = k_true
                * Matrix3::from_columns(&[r.column(0).into_owned(), r.column(1).into_owned(), t]);
            homographies.push(h / h[(2, 2)]);
        }

        let k = intrinsics_from_homographies(&homographies).expect("solvable");
        assert!((k[(0, 0)] - 420.0).abs() < 1.0, "fx={}", k[(0, 0)]);
        assert!((k[(1, 1)] - 410.0).abs() < 1.0, "fy={}", k[(1, 1)]);
        assert!((k[(0, 2)] - 320.0).abs() < 1.0, "cx={}", k[(0, 2)]);
        assert!((k[(1, 2)] - 240.0).abs() < 1.0, "cy={}", k[(1, 2)]);
    }
}
