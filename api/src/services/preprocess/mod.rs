//! Image normalization: decode, bound, enhance, denoise, normalize.
//!
//! Every analyzer consumes the resulting [`CanonicalImage`]. The stages run in a
//! fixed order and are deterministic for a given input and [`PreprocessConfig`].

mod clahe;
mod color;
mod filters;
mod resize;

use image::{ColorType, DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use thiserror::Error;

use crate::constants::{
    DEFAULT_CLAHE_CLIP_LIMIT, DEFAULT_CLAHE_TILE_GRID, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
    DEFAULT_MEDIAN_RADIUS, DEFAULT_MIN_DIMENSION, DEFAULT_SMOOTHING_SIGMA,
};
use crate::models::CanonicalImage;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("image could not be decoded: {0}")]
    Unreadable(String),
    #[error("image is {width}x{height}, smaller than the {min}px minimum")]
    TooSmall { width: u32, height: u32, min: u32 },
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        DecodeError::Unreadable(err.to_string())
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Unreadable(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub min_dimension: u32,
    pub clahe_clip_limit: f32,
    pub clahe_tile_grid: u32,
    pub smoothing_sigma: f32,
    pub median_radius: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            min_dimension: DEFAULT_MIN_DIMENSION,
            clahe_clip_limit: DEFAULT_CLAHE_CLIP_LIMIT,
            clahe_tile_grid: DEFAULT_CLAHE_TILE_GRID,
            smoothing_sigma: DEFAULT_SMOOTHING_SIGMA,
            median_radius: DEFAULT_MEDIAN_RADIUS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreprocessingPipeline {
    config: PreprocessConfig,
}

impl PreprocessingPipeline {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Decode raw upload bytes, honouring any EXIF orientation
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_decoder()?;
        let orientation = decoder.orientation()?;
        let mut img = DynamicImage::from_decoder(decoder)?;
        img.apply_orientation(orientation);
        Ok(img)
    }

    /// Decode then normalize
    pub fn process(&self, bytes: &[u8]) -> Result<CanonicalImage, DecodeError> {
        let img = self.decode(bytes)?;
        self.normalize(&img)
    }

    /// Run resize, enhancement, noise reduction, and normalization in that order
    pub fn normalize(&self, img: &DynamicImage) -> Result<CanonicalImage, DecodeError> {
        let cfg = &self.config;
        let (width, height) = (img.width(), img.height());
        if width < cfg.min_dimension || height < cfg.min_dimension {
            return Err(DecodeError::TooSmall {
                width,
                height,
                min: cfg.min_dimension,
            });
        }

        let grayscale = matches!(
            img.color(),
            ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
        );

        let mut rgb = img.to_rgb8();
        if let Some((w, h)) = resize::fit_within(width, height, cfg.max_width, cfg.max_height) {
            rgb = resize::area_resize(&rgb, w, h);
        }

        if !grayscale {
            rgb = self.enhance(&rgb);
        }

        let denoised = filters::denoise(&rgb, cfg.smoothing_sigma, cfg.median_radius);
        let normalized = filters::normalize_channels(&denoised);

        Ok(CanonicalImage::new(normalized, grayscale))
    }

    /// CLAHE on L*, back to RGB, then sharpen
    fn enhance(&self, rgb: &image::RgbImage) -> image::RgbImage {
        let mut lab = color::to_lab(rgb);
        lab.lightness = clahe::equalize(
            &lab.lightness,
            lab.width,
            lab.height,
            self.config.clahe_clip_limit,
            self.config.clahe_tile_grid,
        );
        let rebuilt = color::from_lab(&lab);
        filters::sharpen(&rebuilt)
    }
}
