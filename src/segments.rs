//! Line-segment extraction from a thinned edge map.
//!
//! Region-growing extractor: edge pixels act as seeds in decreasing gradient
//! magnitude order; a region grows over 8-connected edge pixels whose
//! gradient orientation stays within a tolerance of the seed orientation
//! (π-periodic, so polarity does not split a line). Each region is fitted
//! with a principal-axis line and reduced to its endpoint span.

use crate::angle::angular_difference;
use crate::edges::Grad;
use crate::image::GrayImage;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Line segment in image coordinates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
    pub p0: [f32; 2],
    pub p1: [f32; 2],
    /// Unit direction from `p0` to `p1`.
    pub dir: [f32; 2],
    pub len: f32,
    /// Normal-form line `ax + by + c = 0` with `a² + b² = 1`.
    pub line: Vector3<f32>,
    /// Aggregate gradient support of the region behind the segment.
    pub strength: f32,
}

impl Segment {
    pub fn from_endpoints(p0: [f32; 2], p1: [f32; 2], strength: f32) -> Self {
        let dx = p1[0] - p0[0];
        let dy = p1[1] - p0[1];
        let len = (dx * dx + dy * dy).sqrt();
        let dir = if len > 0.0 {
            [dx / len, dy / len]
        } else {
            [0.0, 0.0]
        };
        // ax + by + c = 0 through both endpoints, unit normal (a, b).
        let a = dy;
        let b = -dx;
        let norm = (a * a + b * b).sqrt().max(1e-12);
        let c = -(a * p0[0] + b * p0[1]);
        Self {
            p0,
            p1,
            dir,
            len,
            line: Vector3::new(a / norm, b / norm, c / norm),
            strength,
        }
    }

    /// Unit normal `(a, b)` of the fitted line.
    pub fn normal(&self) -> [f32; 2] {
        [self.line[0], self.line[1]]
    }
}

/// Options controlling the region-growing extractor.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SegmentOptions {
    /// Minimum gradient magnitude for a pixel to participate (Sobel units
    /// on a [0, 1] image).
    pub magnitude_threshold: f32,
    /// Orientation tolerance around the seed orientation in degrees.
    pub angle_tolerance_deg: f32,
    /// Minimum accepted segment length in pixels.
    pub min_length_px: f32,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            magnitude_threshold: 0.1,
            angle_tolerance_deg: 22.5,
            min_length_px: 8.0,
        }
    }
}

/// Extract line segments from a thinned edge map and its gradients.
///
/// Pixels outside `edges` foreground are never visited, so restricting the
/// extraction to a region of interest is done by masking the edge map.
pub fn extract_segments(grad: &Grad, edges: &GrayImage, options: &SegmentOptions) -> Vec<Segment> {
    let w = edges.w;
    let h = edges.h;
    assert_eq!(grad.mag.w, w, "gradient/edge size mismatch");
    assert_eq!(grad.mag.h, h, "gradient/edge size mismatch");

    let tol = options.angle_tolerance_deg.to_radians();

    // Seeds in decreasing magnitude order so strong lines claim their
    // pixels first.
    let mut seeds: Vec<usize> = (0..w * h)
        .filter(|&i| edges.data[i] > 0 && grad.mag.data[i] >= options.magnitude_threshold)
        .collect();
    seeds.sort_by(|&a, &b| grad.mag.data[b].total_cmp(&grad.mag.data[a]));

    let mut used = vec![false; w * h];
    let mut segments = Vec::new();
    let mut stack = Vec::new();
    let mut region = Vec::new();

    for &seed in &seeds {
        if used[seed] {
            continue;
        }
        let sx = seed % w;
        let sy = seed / w;
        let seed_angle = grad.angle(sx, sy);

        region.clear();
        stack.clear();
        stack.push(seed);
        used[seed] = true;

        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            region.push(idx);
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if used[nidx]
                        || edges.data[nidx] == 0
                        || grad.mag.data[nidx] < options.magnitude_threshold
                    {
                        continue;
                    }
                    let na = grad.angle(nx as usize, ny as usize);
                    if angular_difference(na, seed_angle) > tol {
                        continue;
                    }
                    used[nidx] = true;
                    stack.push(nidx);
                }
            }
        }

        if let Some(segment) = fit_region(grad, &region, w, options.min_length_px) {
            segments.push(segment);
        }
    }

    segments
}

/// Weighted principal-axis fit of a grown region, reduced to its endpoint
/// span. Returns `None` when the span is below the minimum length.
fn fit_region(grad: &Grad, region: &[usize], w: usize, min_length: f32) -> Option<Segment> {
    if region.len() < 2 {
        return None;
    }
    let mut sum_w = 0.0f32;
    let mut mx = 0.0f32;
    let mut my = 0.0f32;
    for &idx in region {
        let weight = grad.mag.data[idx];
        mx += weight * (idx % w) as f32;
        my += weight * (idx / w) as f32;
        sum_w += weight;
    }
    if sum_w <= 0.0 {
        return None;
    }
    mx /= sum_w;
    my /= sum_w;

    let mut sxx = 0.0f32;
    let mut sxy = 0.0f32;
    let mut syy = 0.0f32;
    for &idx in region {
        let weight = grad.mag.data[idx];
        let dx = (idx % w) as f32 - mx;
        let dy = (idx / w) as f32 - my;
        sxx += weight * dx * dx;
        sxy += weight * dx * dy;
        syy += weight * dy * dy;
    }
    // Principal axis of the 2×2 scatter matrix.
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let dir = [theta.cos(), theta.sin()];

    let mut t_min = f32::MAX;
    let mut t_max = f32::MIN;
    for &idx in region {
        let dx = (idx % w) as f32 - mx;
        let dy = (idx / w) as f32 - my;
        let t = dx * dir[0] + dy * dir[1];
        t_min = t_min.min(t);
        t_max = t_max.max(t);
    }
    if t_max - t_min < min_length {
        return None;
    }

    let p0 = [mx + t_min * dir[0], my + t_min * dir[1]];
    let p1 = [mx + t_max * dir[0], my + t_max * dir[1]];
    Some(Segment::from_endpoints(p0, p1, sum_w))
}
