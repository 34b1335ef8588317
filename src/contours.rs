//! Blob/contour geometry over binary masks.
//!
//! - [`find_contours`]: ordered outer boundaries of 8-connected foreground
//!   components (Moore neighbor tracing).
//! - [`Contour::area`]: shoelace area of the traced boundary polygon.
//! - [`Contour::bounding_rect`]: axis-aligned bounding rectangle.
//! - [`Contour::min_area_rect`]: minimum-area oriented rectangle via convex
//!   hull and rotating calipers.

use crate::image::GrayImage;

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.w
    }
}

/// Minimum-area oriented rectangle.
///
/// `corners` are cyclically ordered and rotated so `corners[0]` is the
/// bottommost corner (largest y), matching the convention the tracker's
/// near/far midpoint pairing relies on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub corners: [[f32; 2]; 4],
}

impl OrientedBox {
    fn side(&self, a: usize, b: usize) -> f32 {
        let dx = self.corners[a][0] - self.corners[b][0];
        let dy = self.corners[a][1] - self.corners[b][1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Shorter side length.
    pub fn short_side(&self) -> f32 {
        self.side(0, 1).min(self.side(0, 3))
    }

    /// Longer side length.
    pub fn long_side(&self) -> f32 {
        self.side(0, 1).max(self.side(0, 3))
    }
}

/// Ordered outer boundary of one connected foreground component.
#[derive(Clone, Debug)]
pub struct Contour {
    /// Boundary pixels in tracing order.
    pub points: Vec<[i32; 2]>,
}

impl Contour {
    /// Shoelace area of the boundary polygon.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let mut acc = 0i64;
        for i in 0..self.points.len() {
            let p = self.points[i];
            let q = self.points[(i + 1) % self.points.len()];
            acc += p[0] as i64 * q[1] as i64 - q[0] as i64 * p[1] as i64;
        }
        (acc.abs() as f32) * 0.5
    }

    pub fn bounding_rect(&self) -> Rect {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in &self.points {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }
        Rect {
            x: min_x,
            y: min_y,
            w: max_x - min_x + 1,
            h: max_y - min_y + 1,
        }
    }

    /// Minimum-area oriented rectangle enclosing the contour.
    pub fn min_area_rect(&self) -> OrientedBox {
        let hull = convex_hull(&self.points);
        min_area_rect_of_hull(&hull)
    }
}

/// 8-connected component labeling. Returns per-pixel labels (0 = background)
/// and the number of components.
pub(crate) fn connected_components(mask: &GrayImage) -> (Vec<u32>, u32) {
    let w = mask.w;
    let h = mask.h;
    let mut labels = vec![0u32; w * h];
    let mut next = 0u32;
    let mut stack = Vec::new();

    for start in 0..w * h {
        if mask.data[start] == 0 || labels[start] != 0 {
            continue;
        }
        next += 1;
        labels[start] = next;
        stack.push(start);
        while let Some(idx) = stack.pop() {
            let x = (idx % w) as i32;
            let y = (idx / w) as i32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if mask.data[nidx] != 0 && labels[nidx] == 0 {
                        labels[nidx] = next;
                        stack.push(nidx);
                    }
                }
            }
        }
    }
    (labels, next)
}

// Moore neighborhood in clockwise order starting east.
const MOORE: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Trace the ordered outer boundaries of all foreground components.
pub fn find_contours(mask: &GrayImage) -> Vec<Contour> {
    let w = mask.w;
    let h = mask.h;
    let (labels, count) = connected_components(mask);
    let mut contours = Vec::with_capacity(count as usize);

    // Topmost-leftmost pixel of each component serves as the tracing start.
    let mut starts = vec![usize::MAX; count as usize];
    for idx in 0..w * h {
        let label = labels[idx];
        if label != 0 && starts[label as usize - 1] == usize::MAX {
            starts[label as usize - 1] = idx;
        }
    }

    for (component, &start) in starts.iter().enumerate() {
        let label = component as u32 + 1;
        let sx = (start % w) as i32;
        let sy = (start / w) as i32;
        let inside = |x: i32, y: i32| -> bool {
            x >= 0
                && y >= 0
                && x < w as i32
                && y < h as i32
                && labels[y as usize * w + x as usize] == label
        };

        let mut points = vec![[sx, sy]];
        // Entry direction: we arrived scanning from the west.
        let mut cx = sx;
        let mut cy = sy;
        let mut backtrack = 4usize; // index of (-1, 0)
        let limit = 4 * w * h;
        let mut steps = 0usize;
        loop {
            let mut found = None;
            for k in 1..=8 {
                let dir = (backtrack + k) % 8;
                let (dx, dy) = MOORE[dir];
                if inside(cx + dx, cy + dy) {
                    found = Some(dir);
                    break;
                }
            }
            let Some(dir) = found else {
                break; // isolated pixel
            };
            let (dx, dy) = MOORE[dir];
            cx += dx;
            cy += dy;
            steps += 1;
            if (cx == sx && cy == sy) || steps >= limit {
                break;
            }
            points.push([cx, cy]);
            // New backtrack points at the pixel we came from.
            backtrack = (dir + 4) % 8;
        }
        contours.push(Contour { points });
    }

    contours
}

/// Andrew monotone-chain convex hull, counter-clockwise in image
/// coordinates (y grows downward).
fn convex_hull(points: &[[i32; 2]]) -> Vec<[f32; 2]> {
    let mut pts: Vec<[i32; 2]> = points.to_vec();
    pts.sort_unstable();
    pts.dedup();
    if pts.len() <= 2 {
        return pts.iter().map(|p| [p[0] as f32, p[1] as f32]).collect();
    }

    let cross = |o: [i32; 2], a: [i32; 2], b: [i32; 2]| -> i64 {
        (a[0] - o[0]) as i64 * (b[1] - o[1]) as i64 - (a[1] - o[1]) as i64 * (b[0] - o[0]) as i64
    };

    let mut hull: Vec<[i32; 2]> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev() {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull.iter().map(|p| [p[0] as f32, p[1] as f32]).collect()
}

fn min_area_rect_of_hull(hull: &[[f32; 2]]) -> OrientedBox {
    if hull.is_empty() {
        return OrientedBox {
            corners: [[0.0, 0.0]; 4],
        };
    }
    if hull.len() == 1 {
        return OrientedBox {
            corners: [hull[0]; 4],
        };
    }

    let mut best_area = f32::MAX;
    let mut best: Option<OrientedBox> = None;

    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let ex = b[0] - a[0];
        let ey = b[1] - a[1];
        let norm = (ex * ex + ey * ey).sqrt();
        if norm <= 0.0 {
            continue;
        }
        let ux = ex / norm;
        let uy = ey / norm;
        // Normal direction of the caliper edge.
        let nx = -uy;
        let ny = ux;

        let mut t_min = f32::MAX;
        let mut t_max = f32::MIN;
        let mut s_min = f32::MAX;
        let mut s_max = f32::MIN;
        for p in hull {
            let t = p[0] * ux + p[1] * uy;
            let s = p[0] * nx + p[1] * ny;
            t_min = t_min.min(t);
            t_max = t_max.max(t);
            s_min = s_min.min(s);
            s_max = s_max.max(s);
        }
        let area = (t_max - t_min) * (s_max - s_min);
        if area < best_area {
            best_area = area;
            let corner = |t: f32, s: f32| [t * ux + s * nx, t * uy + s * ny];
            best = Some(OrientedBox {
                corners: [
                    corner(t_min, s_min),
                    corner(t_max, s_min),
                    corner(t_max, s_max),
                    corner(t_min, s_max),
                ],
            });
        }
    }

    let mut rect = best.unwrap_or(OrientedBox {
        corners: [hull[0]; 4],
    });

    // Rotate so corners[0] is the bottommost (ties broken by x), keeping the
    // cyclic order intact.
    let mut bottom = 0usize;
    for k in 1..4 {
        let c = rect.corners[k];
        let best_c = rect.corners[bottom];
        if c[1] > best_c[1] || (c[1] == best_c[1] && c[0] > best_c[0]) {
            bottom = k;
        }
    }
    rect.corners.rotate_left(bottom);
    rect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GrayImage;

    fn mask_with_rect(w: usize, h: usize, x0: usize, y0: usize, rw: usize, rh: usize) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in y0..y0 + rh {
            for x in x0..x0 + rw {
                mask.set(x, y, 255);
            }
        }
        mask
    }

    #[test]
    fn single_rect_yields_one_contour() {
        let mask = mask_with_rect(40, 30, 5, 6, 10, 12);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        let rect = contours[0].bounding_rect();
        assert_eq!(rect, Rect { x: 5, y: 6, w: 10, h: 12 });
        // Boundary polygon of a (10 × 12) block spans 9 × 11 pixel centers.
        assert!((contours[0].area() - 99.0).abs() < 1.0);
    }

    #[test]
    fn separate_blobs_yield_separate_contours() {
        let mut mask = mask_with_rect(40, 30, 2, 2, 5, 5);
        for y in 20..26 {
            for x in 30..34 {
                mask.set(x, y, 255);
            }
        }
        assert_eq!(find_contours(&mask).len(), 2);
    }

    #[test]
    fn min_area_rect_of_axis_aligned_block() {
        let mask = mask_with_rect(40, 40, 10, 5, 6, 20);
        let contours = find_contours(&mask);
        let rect = contours[0].min_area_rect();
        assert!((rect.short_side() - 5.0).abs() < 0.6);
        assert!((rect.long_side() - 19.0).abs() < 0.6);
        // corners[0] must be the bottommost corner.
        for k in 1..4 {
            assert!(rect.corners[0][1] >= rect.corners[k][1]);
        }
    }

    #[test]
    fn min_area_rect_tracks_rotation() {
        // Diagonal bar drawn as a thick 45° line.
        let mut mask = GrayImage::new(64, 64);
        for t in 0..40 {
            for o in 0..4i32 {
                let x = 10 + t + o as usize;
                let y = 10 + t;
                if x < 64 && y < 64 {
                    mask.set(x, y, 255);
                }
            }
        }
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        let rect = contours[0].min_area_rect();
        let long = rect.long_side();
        // The diagonal extent is ~39 * sqrt(2).
        assert!(long > 45.0, "long side {long}");
        assert!(rect.short_side() < 8.0);
    }
}
