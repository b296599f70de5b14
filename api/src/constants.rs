//! Application constants

use std::time::Duration;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum upload size for a moderation submission (20 MB)
pub const MAX_UPLOAD_SIZE: usize = 20 * 1024 * 1024;

// Preprocessing

/// Canonical image bound (width, height). Larger images are scaled down to fit.
pub const DEFAULT_MAX_WIDTH: u32 = 1600;
pub const DEFAULT_MAX_HEIGHT: u32 = 1200;

/// Images with either side below this are rejected as undecodable
pub const DEFAULT_MIN_DIMENSION: u32 = 8;

/// CLAHE clip limit, relative to the uniform bin height
pub const DEFAULT_CLAHE_CLIP_LIMIT: f32 = 2.0;

/// CLAHE tile grid (tiles per side)
pub const DEFAULT_CLAHE_TILE_GRID: u32 = 8;

/// Gaussian sigma for the smoothing pass
pub const DEFAULT_SMOOTHING_SIGMA: f32 = 1.0;

/// Median filter radius (1 => 3x3 window)
pub const DEFAULT_MEDIAN_RADIUS: u32 = 1;

/// Mild sharpening kernel applied after contrast enhancement
pub const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Added to the min-max denominator so constant channels never divide by zero
pub const NORMALIZE_EPSILON: f32 = 1e-7;

// Injection guard

pub const DEFAULT_INJECTION_THRESHOLD: f32 = 0.7;
pub const DEFAULT_PATTERN_WEIGHT: f32 = 0.3;
pub const DEFAULT_KEYWORD_WEIGHT: f32 = 0.1;
pub const DEFAULT_LENGTH_PENALTY: f32 = 0.2;
pub const DEFAULT_LENGTH_THRESHOLD: usize = 1000;

// Collaborator calls

pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

// Rate limiting (/moderate, per client IP)

/// Seconds between token refills
pub const DEFAULT_RATE_LIMIT_REFILL_SECS: u64 = 2;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 20;

// Upstream services

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_VISION_BASE_URL: &str = "https://vision.googleapis.com/v1";
pub const DEFAULT_TESSERACT_BIN: &str = "tesseract";

/// Returned in place of a generated summary when the summarizer fails
pub const FALLBACK_SUMMARY: &str =
    "A summary could not be generated for this result. See the structured verdict for details.";
