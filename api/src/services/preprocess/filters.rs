//! Per-channel spatial filters and range normalization

use image::RgbImage;
use imageproc::filter::{filter3x3, gaussian_blur_f32, median_filter};

use crate::constants::{NORMALIZE_EPSILON, SHARPEN_KERNEL};

/// Sharpen with a 3x3 kernel per channel. Borders replicate the edge pixels.
pub fn sharpen(src: &RgbImage) -> RgbImage {
    filter3x3::<_, f32, u8>(src, &SHARPEN_KERNEL)
}

/// Gaussian smoothing then median filtering. Both operate on channels independently.
pub fn denoise(src: &RgbImage, sigma: f32, median_radius: u32) -> RgbImage {
    let smoothed = if sigma > 0.0 {
        gaussian_blur_f32(src, sigma)
    } else {
        src.clone()
    };

    if median_radius > 0 {
        median_filter(&smoothed, median_radius, median_radius)
    } else {
        smoothed
    }
}

/// Min-max rescale of one plane to `[0, out_max]`.
///
/// The epsilon in the denominator keeps a constant plane finite: it maps to 0.
pub fn min_max_rescale(values: &[f32], out_max: f32) -> Vec<f32> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() || !max.is_finite() {
        return vec![0.0; values.len()];
    }

    let range = max - min + NORMALIZE_EPSILON;
    values
        .iter()
        .map(|&v| ((v - min) / range * out_max).clamp(0.0, out_max))
        .collect()
}

/// Stretch each channel to the full 0..=255 range independently
pub fn normalize_channels(src: &RgbImage) -> RgbImage {
    let (width, height) = src.dimensions();
    let mut out = RgbImage::new(width, height);

    for c in 0..3 {
        let plane: Vec<f32> = src.pixels().map(|p| p[c] as f32).collect();
        let scaled = min_max_rescale(&plane, 255.0);
        for (pixel, value) in out.pixels_mut().zip(scaled) {
            pixel[c] = value.round() as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn sharpen_keeps_flat_regions_and_borders() {
        let flat = RgbImage::from_pixel(5, 4, Rgb([90, 120, 30]));
        let out = sharpen(&flat);
        assert!(out.pixels().all(|p| *p == Rgb([90, 120, 30])));
    }

    #[test]
    fn sharpen_boosts_an_isolated_peak() {
        let mut img = RgbImage::from_pixel(3, 3, Rgb([100, 100, 100]));
        img.put_pixel(1, 1, Rgb([140, 140, 140]));
        let out = sharpen(&img);
        // 5 * 140 - 4 * 100
        assert_eq!(out.get_pixel(1, 1), &Rgb([255, 255, 255]));
        // left edge replicates itself: 5 * 100 - 3 * 100 - 140
        assert_eq!(out.get_pixel(0, 1)[0], 60);
    }

    #[test]
    fn median_removes_salt_noise_per_channel() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([10, 200, 50]));
        img.put_pixel(2, 2, Rgb([255, 200, 50]));
        let out = denoise(&img, 0.0, 1);
        assert_eq!(out.get_pixel(2, 2), &Rgb([10, 200, 50]));
    }

    #[test]
    fn constant_plane_rescales_to_finite_zero() {
        let out = min_max_rescale(&[42.0; 16], 255.0);
        assert!(out.iter().all(|v| v.is_finite() && *v == 0.0));
    }

    #[test]
    fn rescale_never_produces_nan() {
        let inputs: [&[f32]; 4] = [&[], &[0.0], &[3.0, 3.0, 3.0], &[0.0, 255.0, 17.5]];
        for values in inputs {
            for v in min_max_rescale(values, 255.0) {
                assert!(v.is_finite());
                assert!((0.0..=255.0).contains(&v));
            }
        }
    }

    #[test]
    fn channels_are_stretched_independently() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([100, 7, 0]));
        img.put_pixel(1, 0, Rgb([150, 7, 255]));
        let out = normalize_channels(&img);

        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([255, 0, 255]));
    }
}
