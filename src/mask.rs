//! Binary lane-mask extraction from grayscale frames.
//!
//! [`LaneMaskSource`] is the seam between mask production and tracking: the
//! tracker consumes any binary mask, whoever produced it. The built-in
//! [`ClassicalMaskSource`] combines a global brightness gate with a local
//! adaptive threshold, closes small gaps and keeps only components large
//! enough to be lane markings.

use crate::contours::connected_components;
use crate::image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Produces a binary lane mask (0 or 255) matching the input frame size.
pub trait LaneMaskSource {
    fn lane_mask(&self, frame: &GrayImage) -> GrayImage;
}

/// Tuning for [`ClassicalMaskSource`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MaskOptions {
    /// Rows above this index are ignored (sky and horizon clutter).
    pub crop_top: usize,
    /// Brightness gate: keep pixels above `mean + clamp(mean * gain, ..)`.
    pub white_gain: f32,
    pub white_margin_min: f32,
    pub white_margin_max: f32,
    /// Adaptive threshold window side, odd.
    pub adaptive_window: usize,
    /// Keep pixels exceeding their local mean by this much.
    pub adaptive_offset: f32,
    /// Half-width of the square closing kernel.
    pub closing_radius: usize,
    /// Components whose bounding-rect perimeter is at or below this are
    /// dropped as noise.
    pub min_perimeter: i32,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            crop_top: 100,
            white_gain: 0.7,
            white_margin_min: 20.0,
            white_margin_max: 80.0,
            adaptive_window: 201,
            adaptive_offset: 50.0,
            closing_radius: 2,
            min_perimeter: 280,
        }
    }
}

/// Threshold-based mask extractor for painted lane markings.
#[derive(Clone, Debug, Default)]
pub struct ClassicalMaskSource {
    pub options: MaskOptions,
}

impl ClassicalMaskSource {
    pub fn new(options: MaskOptions) -> Self {
        Self { options }
    }
}

impl LaneMaskSource for ClassicalMaskSource {
    fn lane_mask(&self, frame: &GrayImage) -> GrayImage {
        let opt = &self.options;
        let crop_top = opt.crop_top.min(frame.h);
        let band = frame.crop_rows(crop_top, frame.h);
        if band.h == 0 || band.w == 0 {
            return GrayImage::new(frame.w, frame.h);
        }

        let mean = band.data.iter().map(|&v| v as f64).sum::<f64>() / band.data.len() as f64;
        let margin = (mean as f32 * opt.white_gain)
            .clamp(opt.white_margin_min, opt.white_margin_max);
        let white_floor = mean as f32 + margin;

        let local = box_mean(&band, opt.adaptive_window);
        let mut binary = GrayImage::new(band.w, band.h);
        for (i, &v) in band.data.iter().enumerate() {
            let v = v as f32;
            if v >= white_floor || v > local[i] + opt.adaptive_offset {
                binary.data[i] = 255;
            }
        }

        let closed = close(&binary, opt.closing_radius);
        let kept = drop_small_components(&closed, opt.min_perimeter);
        debug!(
            "lane mask: mean {mean:.1}, white floor {white_floor:.1}, {} fg px",
            kept.data.iter().filter(|&&v| v != 0).count()
        );

        // Re-embed the band so the mask matches the frame dimensions.
        let mut out = GrayImage::new(frame.w, frame.h);
        for y in 0..kept.h {
            out.row_mut(crop_top + y).copy_from_slice(kept.row(y));
        }
        out
    }
}

/// Local mean over a clamped square window, via a summed-area table.
fn box_mean(image: &GrayImage, window: usize) -> Vec<f32> {
    let w = image.w;
    let h = image.h;
    let half = (window / 2) as i64;

    // Integral image with a zero top row and left column.
    let mut sat = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_acc = 0u64;
        for x in 0..w {
            row_acc += image.data[y * w + x] as u64;
            sat[(y + 1) * (w + 1) + x + 1] = sat[y * (w + 1) + x + 1] + row_acc;
        }
    }

    let mut means = vec![0.0f32; w * h];
    for y in 0..h {
        let y0 = (y as i64 - half).max(0) as usize;
        let y1 = ((y as i64 + half + 1).min(h as i64)) as usize;
        for x in 0..w {
            let x0 = (x as i64 - half).max(0) as usize;
            let x1 = ((x as i64 + half + 1).min(w as i64)) as usize;
            let sum = sat[y1 * (w + 1) + x1] + sat[y0 * (w + 1) + x0]
                - sat[y0 * (w + 1) + x1]
                - sat[y1 * (w + 1) + x0];
            let count = ((y1 - y0) * (x1 - x0)) as f32;
            means[y * w + x] = sum as f32 / count;
        }
    }
    means
}

fn dilate(image: &GrayImage, radius: usize) -> GrayImage {
    morph(image, radius, true)
}

fn erode(image: &GrayImage, radius: usize) -> GrayImage {
    morph(image, radius, false)
}

fn morph(image: &GrayImage, radius: usize, grow: bool) -> GrayImage {
    let r = radius as i64;
    let mut out = GrayImage::new(image.w, image.h);
    for y in 0..image.h as i64 {
        for x in 0..image.w as i64 {
            let mut acc = if grow { 0u8 } else { 255u8 };
            for dy in -r..=r {
                for dx in -r..=r {
                    let ny = y + dy;
                    let nx = x + dx;
                    // Pixels outside the image count as background.
                    let v = if ny < 0 || nx < 0 || ny >= image.h as i64 || nx >= image.w as i64 {
                        0
                    } else {
                        image.get(nx as usize, ny as usize)
                    };
                    acc = if grow { acc.max(v) } else { acc.min(v) };
                }
            }
            out.set(x as usize, y as usize, acc);
        }
    }
    out
}

/// Morphological closing: bridge gaps up to the kernel size.
fn close(image: &GrayImage, radius: usize) -> GrayImage {
    erode(&dilate(image, radius), radius)
}

/// Keep components whose bounding-rect perimeter exceeds the floor.
fn drop_small_components(mask: &GrayImage, min_perimeter: i32) -> GrayImage {
    let (labels, count) = connected_components(mask);
    if count == 0 {
        return GrayImage::new(mask.w, mask.h);
    }

    let mut bounds = vec![(i32::MAX, i32::MAX, i32::MIN, i32::MIN); count as usize];
    for (idx, &label) in labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let x = (idx % mask.w) as i32;
        let y = (idx / mask.w) as i32;
        let b = &mut bounds[label as usize - 1];
        b.0 = b.0.min(x);
        b.1 = b.1.min(y);
        b.2 = b.2.max(x);
        b.3 = b.3.max(y);
    }
    let keep: Vec<bool> = bounds
        .iter()
        .map(|b| {
            let w = b.2 - b.0 + 1;
            let h = b.3 - b.1 + 1;
            2 * (w + h) > min_perimeter
        })
        .collect();

    let mut out = GrayImage::new(mask.w, mask.h);
    for (idx, &label) in labels.iter().enumerate() {
        if label != 0 && keep[label as usize - 1] {
            out.data[idx] = 255;
        }
    }
    out
}
