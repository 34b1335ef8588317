//! Chessboard inner-corner detection for intrinsic calibration.
//!
//! Ring-difference corner response: at a checkerboard corner, samples on a
//! small circle alternate dark/light every quarter turn, so points 90° apart
//! differ strongly while points 180° apart match. The response rewards the
//! former and penalizes the latter, which also suppresses plain edges.
//!
//! Detected maxima are refined to sub-pixel precision with a quadratic fit
//! and ordered into a row-major grid. Ordering assumes roughly upright
//! calibration shots, which is what the capture procedure produces.

use crate::image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Inner-corner grid of the calibration chessboard.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ChessboardSpec {
    /// Inner corners per row.
    pub cols: usize,
    /// Inner corners per column.
    pub rows: usize,
}

impl ChessboardSpec {
    pub fn corner_count(&self) -> usize {
        self.cols * self.rows
    }
}

const RING_RADIUS: i32 = 3;
const NMS_RADIUS: i32 = 5;

// Ring sample offsets at 45° steps, radius RING_RADIUS.
const RING: [(i32, i32); 8] = [
    (3, 0),
    (2, 2),
    (0, 3),
    (-2, 2),
    (-3, 0),
    (-2, -2),
    (0, -3),
    (2, -2),
];

fn corner_response(img: &GrayImage) -> Vec<f32> {
    let w = img.w as i32;
    let h = img.h as i32;
    let mut response = vec![0.0f32; img.w * img.h];
    let r = RING_RADIUS;
    for y in r..h - r {
        for x in r..w - r {
            let mut s = [0.0f32; 8];
            for (k, (dx, dy)) in RING.iter().enumerate() {
                s[k] = img.get((x + dx) as usize, (y + dy) as usize) as f32;
            }
            let mut quarter_diff = 0.0f32;
            let mut opposite_diff = 0.0f32;
            for k in 0..8 {
                quarter_diff += (s[k] - s[(k + 2) % 8]).abs();
                opposite_diff += (s[k] - s[(k + 4) % 8]).abs();
            }
            response[(y * w + x) as usize] = quarter_diff - opposite_diff;
        }
    }
    response
}

/// One merged response maximum. `plateau` counts the candidate pixels
/// collapsed into it; a plateau wider than one pixel already carries a
/// sub-pixel position from its centroid.
struct Maximum {
    x: f64,
    y: f64,
    response: f32,
    plateau: usize,
}

/// Local maxima of the response above `threshold`, merged within
/// `NMS_RADIUS`.
///
/// A symmetric corner produces a flat response plateau rather than a
/// single peak pixel, and every plateau pixel survives a strict
/// neighbor comparison. Survivors within the suppression radius are
/// therefore collapsed into one maximum at their response-weighted
/// centroid.
fn local_maxima(response: &[f32], w: usize, h: usize, threshold: f32) -> Vec<Maximum> {
    let r = NMS_RADIUS;
    let mut flat: Vec<(i32, i32, f32)> = Vec::new();
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let v = response[y as usize * w + x as usize];
            if v <= threshold {
                continue;
            }
            let mut is_max = true;
            'outer: for dy in -r..=r {
                for dx in -r..=r {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    if response[ny as usize * w + nx as usize] > v {
                        is_max = false;
                        break 'outer;
                    }
                }
            }
            if is_max {
                flat.push((x, y, v));
            }
        }
    }

    flat.sort_by(|a, b| b.2.total_cmp(&a.2));
    let mut used = vec![false; flat.len()];
    let mut maxima = Vec::new();
    for i in 0..flat.len() {
        if used[i] {
            continue;
        }
        let (cx, cy, peak) = flat[i];
        let mut sx = 0.0f64;
        let mut sy = 0.0f64;
        let mut sw = 0.0f64;
        let mut plateau = 0usize;
        for j in i..flat.len() {
            if used[j] {
                continue;
            }
            let (x, y, v) = flat[j];
            if (x - cx).abs() <= r && (y - cy).abs() <= r {
                used[j] = true;
                let wgt = v as f64;
                sx += x as f64 * wgt;
                sy += y as f64 * wgt;
                sw += wgt;
                plateau += 1;
            }
        }
        maxima.push(Maximum {
            x: sx / sw,
            y: sy / sw,
            response: peak,
            plateau,
        });
    }
    maxima
}

/// Quadratic sub-pixel refinement on the 3×3 response neighborhood.
fn refine_subpixel(response: &[f32], w: usize, h: usize, x: usize, y: usize) -> [f64; 2] {
    if x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
        return [x as f64, y as f64];
    }
    let at = |xx: usize, yy: usize| response[yy * w + xx] as f64;
    let gx = (at(x + 1, y) - at(x - 1, y)) * 0.5;
    let gy = (at(x, y + 1) - at(x, y - 1)) * 0.5;
    let hxx = at(x + 1, y) - 2.0 * at(x, y) + at(x - 1, y);
    let hyy = at(x, y + 1) - 2.0 * at(x, y) + at(x, y - 1);
    let hxy = (at(x + 1, y + 1) - at(x + 1, y - 1) - at(x - 1, y + 1) + at(x - 1, y - 1)) * 0.25;
    let det = hxx * hyy - hxy * hxy;
    if det.abs() < 1e-12 {
        return [x as f64, y as f64];
    }
    let ox = (-(hyy * gx - hxy * gy) / det).clamp(-1.0, 1.0);
    let oy = (-(hxx * gy - hxy * gx) / det).clamp(-1.0, 1.0);
    [x as f64 + ox, y as f64 + oy]
}

/// Detect and order the chessboard inner corners.
///
/// Returns `None` when fewer than `cols * rows` corner candidates are found
/// or the candidates do not form a consistent row structure.
pub fn find_chessboard_corners(img: &GrayImage, spec: &ChessboardSpec) -> Option<Vec<[f64; 2]>> {
    let needed = spec.corner_count();
    if needed == 0 || img.w < 2 * RING_RADIUS as usize || img.h < 2 * RING_RADIUS as usize {
        return None;
    }
    let response = corner_response(img);
    let peak = response.iter().cloned().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return None;
    }

    let mut maxima = local_maxima(&response, img.w, img.h, peak * 0.3);
    if maxima.len() < needed {
        debug!(
            "chessboard: only {} corner candidates for a {}x{} grid",
            maxima.len(),
            spec.cols,
            spec.rows
        );
        return None;
    }
    // Keep the strongest grid's worth of candidates.
    maxima.sort_by(|a, b| b.response.total_cmp(&a.response));
    maxima.truncate(needed);

    let mut corners: Vec<[f64; 2]> = maxima
        .iter()
        .map(|m| {
            if m.plateau > 1 {
                // The quadratic fit degenerates on a flat plateau; the
                // cluster centroid is the sub-pixel estimate there.
                [m.x, m.y]
            } else {
                refine_subpixel(&response, img.w, img.h, m.x as usize, m.y as usize)
            }
        })
        .collect();

    // Row-major ordering: split by y into `rows` bands, each sorted by x.
    corners.sort_by(|a, b| a[1].total_cmp(&b[1]));
    let mut ordered = Vec::with_capacity(needed);
    for row in corners.chunks(spec.cols) {
        let mut row: Vec<[f64; 2]> = row.to_vec();
        row.sort_by(|a, b| a[0].total_cmp(&b[0]));
        ordered.extend(row);
    }

    // Sanity: rows must not overlap vertically.
    for r in 1..spec.rows {
        let prev_max = ordered[(r - 1) * spec.cols..r * spec.cols]
            .iter()
            .map(|p| p[1])
            .fold(f64::MIN, f64::max);
        let cur_min = ordered[r * spec.cols..(r + 1) * spec.cols]
            .iter()
            .map(|p| p[1])
            .fold(f64::MAX, f64::min);
        if cur_min < prev_max - 1.0 {
            debug!("chessboard: rows overlap, rejecting detection");
            return None;
        }
    }

    Some(ordered)
}
