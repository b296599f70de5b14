//! sRGB <-> CIE L*a*b* (D65) conversion with 8-bit lightness, matching the
//! common `L * 255 / 100` storage convention so CLAHE can work on a u8 histogram.

use image::{Rgb, RgbImage};

const XN: f32 = 0.950_456;
const ZN: f32 = 1.088_754;
const EPSILON: f32 = 0.008_856;
const KAPPA: f32 = 903.3;

/// Luminance-separated planes of an image
pub struct LabPlanes {
    pub width: u32,
    pub height: u32,
    /// L* scaled to 0..=255
    pub lightness: Vec<u8>,
    pub a: Vec<f32>,
    pub b: Vec<f32>,
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    let cubed = t * t * t;
    if cubed > EPSILON {
        cubed
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

pub fn to_lab(rgb: &RgbImage) -> LabPlanes {
    let linear: Vec<f32> = (0..=255u8)
        .map(|v| srgb_to_linear(v as f32 / 255.0))
        .collect();

    let len = (rgb.width() * rgb.height()) as usize;
    let mut lightness = Vec::with_capacity(len);
    let mut a_plane = Vec::with_capacity(len);
    let mut b_plane = Vec::with_capacity(len);

    for pixel in rgb.pixels() {
        let r = linear[pixel[0] as usize];
        let g = linear[pixel[1] as usize];
        let b = linear[pixel[2] as usize];

        let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / XN;
        let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
        let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / ZN;

        let fy = lab_f(y);
        let l = if y > EPSILON { 116.0 * fy - 16.0 } else { KAPPA * y };

        lightness.push((l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8);
        a_plane.push(500.0 * (lab_f(x) - fy));
        b_plane.push(200.0 * (fy - lab_f(z)));
    }

    LabPlanes {
        width: rgb.width(),
        height: rgb.height(),
        lightness,
        a: a_plane,
        b: b_plane,
    }
}

pub fn from_lab(planes: &LabPlanes) -> RgbImage {
    let mut out = RgbImage::new(planes.width, planes.height);

    for (i, pixel) in out.pixels_mut().enumerate() {
        let l = planes.lightness[i] as f32 * 100.0 / 255.0;
        let fy = (l + 16.0) / 116.0;
        let fx = fy + planes.a[i] / 500.0;
        let fz = fy - planes.b[i] / 200.0;

        let y = if l > KAPPA * EPSILON { fy * fy * fy } else { l / KAPPA };
        let x = lab_f_inv(fx) * XN;
        let z = lab_f_inv(fz) * ZN;

        let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
        let g = -0.969_256 * x + 1.875_992 * y + 0.041_556 * z;
        let b = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

        *pixel = Rgb([r, g, b].map(|c| {
            (linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0)
                .round()
                .clamp(0.0, 255.0) as u8
        }));
    }
    out
}
