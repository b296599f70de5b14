//! Aspect-preserving downscale with area-averaging interpolation

use image::{Rgb, RgbImage};

/// Dimensions that fit `width x height` inside `max_width x max_height`.
///
/// Returns `None` when the image already fits; images are never upscaled.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width <= max_width && height <= max_height {
        return None;
    }

    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let new_width = ((width as f64 * ratio).round() as u32).clamp(1, max_width);
    let new_height = ((height as f64 * ratio).round() as u32).clamp(1, max_height);
    Some((new_width, new_height))
}

/// Source taps (index, weight) contributing to each destination index.
/// Weights of one destination index sum to 1.
fn area_taps(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|dst| {
            let start = dst as f64 * scale;
            let end = (start + scale).min(src_len as f64);
            let span = end - start;

            let mut taps = Vec::with_capacity(scale.ceil() as usize + 1);
            let mut src = start.floor() as u32;
            while (src as f64) < end && src < src_len {
                let lo = (src as f64).max(start);
                let hi = ((src + 1) as f64).min(end);
                let covered = hi - lo;
                if covered > 1e-9 {
                    taps.push((src, (covered / span) as f32));
                }
                src += 1;
            }
            taps
        })
        .collect()
}

/// Downscale by averaging each destination pixel's source footprint (like `INTER_AREA`).
pub fn area_resize(src: &RgbImage, dst_width: u32, dst_height: u32) -> RgbImage {
    let (src_width, src_height) = src.dimensions();
    let x_taps = area_taps(src_width, dst_width);
    let y_taps = area_taps(src_height, dst_height);

    // Horizontal pass: src_height rows of dst_width pixels
    let row_len = dst_width as usize * 3;
    let mut horizontal = vec![0f32; row_len * src_height as usize];
    for y in 0..src_height {
        let row = &mut horizontal[y as usize * row_len..(y as usize + 1) * row_len];
        for (dst_x, taps) in x_taps.iter().enumerate() {
            let mut acc = [0f32; 3];
            for &(src_x, weight) in taps {
                let pixel = src.get_pixel(src_x, y);
                for c in 0..3 {
                    acc[c] += pixel[c] as f32 * weight;
                }
            }
            row[dst_x * 3..dst_x * 3 + 3].copy_from_slice(&acc);
        }
    }

    // Vertical pass
    let mut out = RgbImage::new(dst_width, dst_height);
    for (dst_y, taps) in y_taps.iter().enumerate() {
        for dst_x in 0..dst_width as usize {
            let mut acc = [0f32; 3];
            for &(src_y, weight) in taps {
                let offset = src_y as usize * row_len + dst_x * 3;
                for c in 0..3 {
                    acc[c] += horizontal[offset + c] * weight;
                }
            }
            out.put_pixel(
                dst_x as u32,
                dst_y as u32,
                Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8)),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_is_width_limited() {
        // min(1600/3000, 1200/2000) = 0.533
        assert_eq!(fit_within(3000, 2000, 1600, 1200), Some((1600, 1067)));
    }

    #[test]
    fn portrait_is_height_limited() {
        assert_eq!(fit_within(1000, 2400, 1600, 1200), Some((500, 1200)));
    }

    #[test]
    fn images_within_bound_are_untouched() {
        assert_eq!(fit_within(1600, 1200, 1600, 1200), None);
        assert_eq!(fit_within(20, 10, 1600, 1200), None);
    }

    #[test]
    fn aspect_ratio_is_preserved_within_a_pixel() {
        for &(w, h) in &[(3000, 2000), (4032, 3024), (1601, 17), (5000, 1300), (1700, 1250)] {
            let (nw, nh) = fit_within(w, h, 1600, 1200).expect("needs resize");
            assert!(nw <= 1600 && nh <= 1200);
            assert!(nw == 1600 || nh == 1200, "one side must hit the bound: {nw}x{nh}");
            let expected_h = nw as f64 * h as f64 / w as f64;
            assert!((nh as f64 - expected_h).abs() < 1.0, "{w}x{h} -> {nw}x{nh}");
        }
    }

    #[test]
    fn area_taps_cover_the_source_evenly() {
        let taps = area_taps(10, 4);
        assert_eq!(taps.len(), 4);
        for t in &taps {
            let total: f32 = t.iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
        // 2.5 source pixels per destination pixel
        assert_eq!(taps[0].iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn area_resize_averages_blocks() {
        let mut src = RgbImage::new(4, 2);
        for y in 0..2 {
            src.put_pixel(0, y, Rgb([0, 0, 0]));
            src.put_pixel(1, y, Rgb([100, 100, 100]));
            src.put_pixel(2, y, Rgb([200, 200, 200]));
            src.put_pixel(3, y, Rgb([200, 200, 200]));
        }
        let out = area_resize(&src, 2, 1);
        assert_eq!(out.dimensions(), (2, 1));
        assert_eq!(out.get_pixel(0, 0), &Rgb([50, 50, 50]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([200, 200, 200]));
    }
}
