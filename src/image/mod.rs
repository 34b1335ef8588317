//! Owned image buffers used throughout the pipeline.
//!
//! - [`GrayImage`]: owned 8-bit single-channel buffer. Lane masks, camera
//!   frames and calibration photographs all live in this type.
//! - [`ImageF32`]: owned single-channel float buffer for gradient work.
//!
//! All buffers are row-major with `stride == width`.

pub mod io;

pub use self::io::{load_grayscale_image, save_grayscale_u8};

/// Owned 8-bit grayscale buffer.
///
/// Binary lane masks use the convention 0 = background, 255 = foreground.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub w: usize,
    pub h: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Zero-initialized buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0; w * h],
        }
    }

    /// Wrap raw row-major bytes. Panics if `data.len() != w * h`.
    pub fn from_raw(w: usize, h: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), w * h, "buffer size must match dimensions");
        Self { w, h, data }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.w + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.w;
        &mut self.data[start..start + self.w]
    }

    /// Reversed pixel order within every row.
    pub fn flipped_horizontal(&self) -> GrayImage {
        let mut out = self.clone();
        for y in 0..out.h {
            out.row_mut(y).reverse();
        }
        out
    }

    /// Copy of the row band `[y0, y1)`. Panics if the range is out of bounds.
    pub fn crop_rows(&self, y0: usize, y1: usize) -> GrayImage {
        assert!(y0 <= y1 && y1 <= self.h, "row band out of bounds");
        GrayImage {
            w: self.w,
            h: y1 - y0,
            data: self.data[y0 * self.w..y1 * self.w].to_vec(),
        }
    }

    /// Nearest-neighbor resize. Masks stay binary under this scheme.
    pub fn resize(&self, w: usize, h: usize) -> GrayImage {
        if w == self.w && h == self.h {
            return self.clone();
        }
        let mut out = GrayImage::new(w, h);
        for y in 0..h {
            let sy = (y * self.h) / h.max(1);
            for x in 0..w {
                let sx = (x * self.w) / w.max(1);
                out.data[y * w + x] = self.get(sx, sy);
            }
        }
        out
    }

    /// Convert to a float buffer with values in [0, 1].
    pub fn to_f32(&self) -> ImageF32 {
        let mut out = ImageF32::new(self.w, self.h);
        for (dst, &src) in out.data.iter_mut().zip(self.data.iter()) {
            *dst = src as f32 / 255.0;
        }
        out
    }

    /// Bilinear sample at floating coordinates; `None` outside the image.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> Option<u8> {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        if x0 + 1 >= self.w || y0 + 1 >= self.h {
            // Clamp exact border hits, reject everything further out.
            if x0 < self.w && y0 < self.h && x == x0 as f32 && y == y0 as f32 {
                return Some(self.get(x0, y0));
            }
            return None;
        }
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let p00 = self.get(x0, y0) as f32;
        let p10 = self.get(x0 + 1, y0) as f32;
        let p01 = self.get(x0, y0 + 1) as f32;
        let p11 = self.get(x0 + 1, y0 + 1) as f32;
        let top = p00 + (p10 - p00) * fx;
        let bot = p01 + (p11 - p01) * fx;
        Some((top + (bot - top) * fy).round().clamp(0.0, 255.0) as u8)
    }
}

/// Owned single-channel f32 image in row-major layout.
#[derive(Clone, Debug)]
pub struct ImageF32 {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl ImageF32 {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0.0; w * h],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.w + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = y * self.w + x;
        self.data[i] = v;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.w;
        &mut self.data[start..start + self.w]
    }
}
