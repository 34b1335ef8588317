use lane_finder::image::GrayImage;

/// Paints filled vertical bars into a fresh binary mask. Each bar is
/// (center_x, half_width, y0, y1); widths are odd so the transverse midpoint
/// lands exactly on `center_x`.
pub fn mask_with_bars(w: usize, h: usize, bars: &[(usize, usize, usize, usize)]) -> GrayImage {
    let mut mask = GrayImage::new(w, h);
    for &(center_x, half_width, y0, y1) in bars {
        for y in y0..y1 {
            for x in center_x - half_width..=center_x + half_width {
                mask.set(x, y, 255);
            }
        }
    }
    mask
}

/// Smooth diagonal luma ramp; bilinear resampling reproduces it exactly at
/// integer positions, which makes it convenient for warp round-trips.
pub fn gradient_image(w: usize, h: usize) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.set(x, y, ((x + 2 * y) % 251) as u8);
        }
    }
    img
}
