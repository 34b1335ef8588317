//! Image gradients and a thinned binary edge map.
//!
//! - Convolves the 3×3 Sobel kernel pair with border clamping.
//! - Outputs per-pixel `gx`, `gy`, `mag = sqrt(gx^2+gy^2)` and the
//!   continuous gradient angle.
//! - `edge_map` suppresses non-maxima along the gradient direction and
//!   thresholds, producing the binary input for the segment extractor.
//!
//! Complexity: O(W·H) per pass.

use crate::image::{GrayImage, ImageF32};

type Kernel3 = [[f32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Per-pixel gradient buffers.
#[derive(Clone, Debug)]
pub struct Grad {
    /// Horizontal derivative.
    pub gx: ImageF32,
    /// Vertical derivative.
    pub gy: ImageF32,
    /// Euclidean magnitude per pixel.
    pub mag: ImageF32,
}

impl Grad {
    /// Gradient angle `atan2(gy, gx)` at (x, y).
    #[inline]
    pub fn angle(&self, x: usize, y: usize) -> f32 {
        self.gy.get(x, y).atan2(self.gx.get(x, y))
    }
}

/// Compute Sobel gradients on a single-channel float image.
pub fn sobel_gradients(l: &ImageF32) -> Grad {
    let w = l.w;
    let h = l.h;
    let mut gx = ImageF32::new(w, h);
    let mut gy = ImageF32::new(w, h);
    let mut mag = ImageF32::new(w, h);

    if w == 0 || h == 0 {
        return Grad { gx, gy, mag };
    }

    for y in 0..h {
        let y_idx = [y.saturating_sub(1), y, (y + 1).min(h - 1)];
        let rows = [l.row(y_idx[0]), l.row(y_idx[1]), l.row(y_idx[2])];
        let out_gx = gx.row_mut(y);
        let out_gy = gy.row_mut(y);
        let out_mag = mag.row_mut(y);
        for x in 0..w {
            let x_idx = [x.saturating_sub(1), x, (x + 1).min(w - 1)];

            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            for (ky, row) in rows.iter().enumerate() {
                let kx_row = &SOBEL_KERNEL_X[ky];
                let ky_row = &SOBEL_KERNEL_Y[ky];
                sum_x += row[x_idx[0]] * kx_row[0]
                    + row[x_idx[1]] * kx_row[1]
                    + row[x_idx[2]] * kx_row[2];
                sum_y += row[x_idx[0]] * ky_row[0]
                    + row[x_idx[1]] * ky_row[1]
                    + row[x_idx[2]] * ky_row[2];
            }

            out_gx[x] = sum_x;
            out_gy[x] = sum_y;
            out_mag[x] = (sum_x * sum_x + sum_y * sum_y).sqrt();
        }
    }

    Grad { gx, gy, mag }
}

/// Thin the gradient magnitude into a binary edge map.
///
/// A pixel survives when its magnitude exceeds `threshold` and is a local
/// maximum along the quantized gradient direction (4 directions).
pub fn edge_map(grad: &Grad, threshold: f32) -> GrayImage {
    let w = grad.mag.w;
    let h = grad.mag.h;
    let mut out = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = grad.mag.get(x, y);
            if m <= threshold {
                continue;
            }
            // Quantize the gradient direction into one of four neighbor axes.
            let angle = grad.angle(x, y);
            let octant =
                ((angle + std::f32::consts::PI) * (4.0 / std::f32::consts::PI)).round() as i32 & 3;
            let (dx, dy) = match octant {
                0 => (1isize, 0isize),
                1 => (1, 1),
                2 => (0, 1),
                _ => (1, -1),
            };
            let ax = (x as isize + dx) as usize;
            let ay = (y as isize + dy) as usize;
            let bx = (x as isize - dx) as usize;
            let by = (y as isize - dy) as usize;
            if m >= grad.mag.get(ax, ay) && m >= grad.mag.get(bx, by) {
                out.set(x, y, 255);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GrayImage;

    fn vertical_step(w: usize, h: usize) -> ImageF32 {
        let mut img = GrayImage::new(w, h);
        for y in 0..h {
            for x in w / 2..w {
                img.set(x, y, 255);
            }
        }
        img.to_f32()
    }

    #[test]
    fn sobel_finds_vertical_step() {
        let grad = sobel_gradients(&vertical_step(16, 8));
        // Strongest horizontal response sits on the step column.
        let step = 8usize;
        assert!(grad.gx.get(step, 4).abs() > 1.0);
        assert!(grad.gx.get(2, 4).abs() < 1e-3);
        assert!(grad.gy.get(step, 4).abs() < 1e-3);
    }

    #[test]
    fn edge_map_thins_the_step() {
        let grad = sobel_gradients(&vertical_step(16, 8));
        let edges = edge_map(&grad, 0.5);
        let row: Vec<usize> = (1..15).filter(|&x| edges.get(x, 4) > 0).collect();
        assert!(!row.is_empty());
        // Non-maximum suppression keeps the ridge narrow.
        assert!(row.len() <= 2, "edge too thick: {row:?}");
    }
}
