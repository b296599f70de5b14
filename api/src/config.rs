//! Environment-driven configuration
//!
//! Every tunable falls back to its default when unset or invalid. Only missing
//! collaborator credentials are fatal.

use secrecy::SecretString;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::constants::*;
use crate::services::injection_guard::GuardConfig;
use crate::services::preprocess::PreprocessConfig;
use crate::services::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingCredential(&'static str),
}

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub cors_allowed_origin: Option<String>,
    pub json_logs: bool,

    pub preprocess: PreprocessConfig,
    pub guard: GuardConfig,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,

    pub rate_limit_refill_secs: u64,
    pub rate_limit_burst: u32,

    pub groq_api_key: SecretString,
    pub groq_model: String,
    pub groq_base_url: String,
    pub vision_api_key: SecretString,
    pub vision_base_url: String,
    pub tesseract_bin: String,
    pub summaries_enabled: bool,
}

/// Parse `key`, keeping the default when absent, unparsable, or rejected by `valid`
fn parse_or<T, F>(lookup: &F, key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .filter(|v| valid(v))
        .unwrap_or(default)
}

fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn secret<F>(lookup: &F, key: &'static str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(SecretString::from)
        .ok_or(ConfigError::MissingCredential(key))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let positive_f32 = |v: &f32| v.is_finite() && *v > 0.0;
        let weight = |v: &f32| v.is_finite() && *v >= 0.0;

        let preprocess = PreprocessConfig {
            max_width: parse_or(&lookup, "PREPROCESS_MAX_WIDTH", DEFAULT_MAX_WIDTH, |v| *v > 0),
            max_height: parse_or(&lookup, "PREPROCESS_MAX_HEIGHT", DEFAULT_MAX_HEIGHT, |v| *v > 0),
            min_dimension: parse_or(&lookup, "PREPROCESS_MIN_DIMENSION", DEFAULT_MIN_DIMENSION, |v| {
                *v > 0
            }),
            clahe_clip_limit: parse_or(&lookup, "CLAHE_CLIP_LIMIT", DEFAULT_CLAHE_CLIP_LIMIT, weight),
            clahe_tile_grid: parse_or(&lookup, "CLAHE_TILE_GRID", DEFAULT_CLAHE_TILE_GRID, |v| {
                (1..=64).contains(v)
            }),
            smoothing_sigma: parse_or(&lookup, "SMOOTHING_SIGMA", DEFAULT_SMOOTHING_SIGMA, weight),
            median_radius: parse_or(&lookup, "MEDIAN_RADIUS", DEFAULT_MEDIAN_RADIUS, |v| *v <= 8),
        };

        let guard = GuardConfig {
            threshold: parse_or(&lookup, "INJECTION_THRESHOLD", DEFAULT_INJECTION_THRESHOLD, |v| {
                positive_f32(v) && *v <= 1.0
            }),
            pattern_weight: parse_or(&lookup, "INJECTION_PATTERN_WEIGHT", DEFAULT_PATTERN_WEIGHT, weight),
            keyword_weight: parse_or(&lookup, "INJECTION_KEYWORD_WEIGHT", DEFAULT_KEYWORD_WEIGHT, weight),
            length_penalty: parse_or(&lookup, "INJECTION_LENGTH_PENALTY", DEFAULT_LENGTH_PENALTY, weight),
            length_threshold: parse_or(
                &lookup,
                "INJECTION_LENGTH_THRESHOLD",
                DEFAULT_LENGTH_THRESHOLD,
                |v| *v > 0,
            ),
        };

        let retry = RetryPolicy {
            max_retries: parse_or(&lookup, "COLLABORATOR_MAX_RETRIES", DEFAULT_MAX_RETRIES, |v| *v <= 5),
            attempt_timeout: Duration::from_secs(parse_or(
                &lookup,
                "COLLABORATOR_TIMEOUT_SECS",
                DEFAULT_COLLABORATOR_TIMEOUT.as_secs(),
                |v| *v > 0,
            )),
            base_delay: Duration::from_millis(parse_or(
                &lookup,
                "RETRY_BASE_DELAY_MS",
                DEFAULT_RETRY_BASE_DELAY.as_millis() as u64,
                |v| *v > 0,
            )),
            ..RetryPolicy::default()
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT, |v| *v > 0),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", MAX_UPLOAD_SIZE, |v| *v > 0),
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN").filter(|s| !s.trim().is_empty()),
            json_logs: lookup("LOG_FORMAT").is_some_and(|s| s.eq_ignore_ascii_case("json")),

            preprocess,
            guard,
            retry,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT.as_secs(),
                |v| *v > 0,
            )),

            rate_limit_refill_secs: parse_or(
                &lookup,
                "RATE_LIMIT_REFILL_SECS",
                DEFAULT_RATE_LIMIT_REFILL_SECS,
                |v| *v > 0,
            ),
            rate_limit_burst: parse_or(&lookup, "RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST, |v| *v > 0),

            groq_api_key: secret(&lookup, "GROQ_API_KEY")?,
            groq_model: string_or(&lookup, "GROQ_MODEL", DEFAULT_GROQ_MODEL),
            groq_base_url: string_or(&lookup, "GROQ_BASE_URL", DEFAULT_GROQ_BASE_URL),
            vision_api_key: secret(&lookup, "GOOGLE_VISION_API_KEY")?,
            vision_base_url: string_or(&lookup, "GOOGLE_VISION_BASE_URL", DEFAULT_VISION_BASE_URL),
            tesseract_bin: string_or(&lookup, "TESSERACT_BIN", DEFAULT_TESSERACT_BIN),
            summaries_enabled: parse_or(&lookup, "SUMMARIES_ENABLED", true, |_| true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDS: [(&str, &str); 2] = [("GROQ_API_KEY", "gk"), ("GOOGLE_VISION_API_KEY", "vk")];

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&CREDS)).expect("config");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.preprocess.max_width, 1600);
        assert_eq!(cfg.preprocess.max_height, 1200);
        assert_eq!(cfg.guard.threshold, 0.7);
        assert_eq!(cfg.retry.max_retries, 1);
        assert_eq!(cfg.request_timeout, Duration::from_secs(60));
        assert!(cfg.summaries_enabled);
        assert!(cfg.cors_allowed_origin.is_none());
        assert_eq!(cfg.groq_api_key.expose_secret(), "gk");
    }

    #[test]
    fn valid_overrides_are_used_and_invalid_ones_ignored() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("INJECTION_THRESHOLD", "0.5"),
            ("PREPROCESS_MAX_WIDTH", "0"),
            ("CLAHE_TILE_GRID", "abc"),
            ("COLLABORATOR_TIMEOUT_SECS", "5"),
            ("SUMMARIES_ENABLED", "false"),
            ("LOG_FORMAT", "JSON"),
        ]);
        let cfg = Config::from_lookup(lookup(&pairs)).expect("config");

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.guard.threshold, 0.5);
        assert_eq!(cfg.preprocess.max_width, DEFAULT_MAX_WIDTH);
        assert_eq!(cfg.preprocess.clahe_tile_grid, DEFAULT_CLAHE_TILE_GRID);
        assert_eq!(cfg.retry.attempt_timeout, Duration::from_secs(5));
        assert!(!cfg.summaries_enabled);
        assert!(cfg.json_logs);
    }

    #[test]
    fn rate_limit_is_read_as_refill_seconds() {
        let cfg = Config::from_lookup(lookup(&CREDS)).expect("config");
        assert_eq!(cfg.rate_limit_refill_secs, DEFAULT_RATE_LIMIT_REFILL_SECS);

        let mut pairs = CREDS.to_vec();
        pairs.extend([("RATE_LIMIT_REFILL_SECS", "10"), ("RATE_LIMIT_PER_SECOND", "1")]);
        let cfg = Config::from_lookup(lookup(&pairs)).expect("config");
        assert_eq!(cfg.rate_limit_refill_secs, 10);
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let err = Config::from_lookup(lookup(&[("GROQ_API_KEY", "gk")])).expect_err("no vision key");
        assert!(matches!(err, ConfigError::MissingCredential("GOOGLE_VISION_API_KEY")));

        let err = Config::from_lookup(lookup(&[("GROQ_API_KEY", "  ")])).expect_err("blank key");
        assert!(matches!(err, ConfigError::MissingCredential("GROQ_API_KEY")));
    }
}
