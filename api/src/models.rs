//! Shared data models used across modules

use bytes::Bytes;
use image::{GrayImage, ImageFormat, RgbImage};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Text produced by OCR or submitted directly. May be empty.
pub type ExtractedText = String;

/// Clamp a score into `[0, 1]`. NaN maps to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A single moderation request payload. Exactly one input kind by construction.
#[derive(Debug, Clone)]
pub enum RawSubmission {
    Image(Bytes),
    Text(String),
}

impl RawSubmission {
    pub fn kind(&self) -> SubmissionKind {
        match self {
            RawSubmission::Image(_) => SubmissionKind::Image,
            RawSubmission::Text(_) => SubmissionKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    Text,
    Image,
}

/// Bounded, enhanced, denoised, normalized RGB image that every analyzer consumes.
///
/// Only the preprocessing pipeline constructs one; there is no mutable access.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalImage {
    pixels: RgbImage,
    source_was_grayscale: bool,
}

impl CanonicalImage {
    pub(crate) fn new(pixels: RgbImage, source_was_grayscale: bool) -> Self {
        Self {
            pixels,
            source_was_grayscale,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// True when the decoded source had a single luminance channel
    pub fn source_was_grayscale(&self) -> bool {
        self.source_was_grayscale
    }

    /// Lossless PNG encoding for upstream APIs
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut output = Cursor::new(Vec::new());
        self.pixels.write_to(&mut output, ImageFormat::Png)?;
        Ok(output.into_inner())
    }

    /// Single-channel PNG, which is what OCR engines prefer
    pub fn encode_grayscale_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let gray: GrayImage = image::DynamicImage::ImageRgb8(self.pixels.clone()).to_luma8();
        let mut output = Cursor::new(Vec::new());
        gray.write_to(&mut output, ImageFormat::Png)?;
        Ok(output.into_inner())
    }
}

/// Ordinal risk level. Ordering is `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

fn deserialize_unit<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    f32::deserialize(deserializer).map(clamp_unit)
}

/// One piece of supporting evidence: what was seen, where, and how sure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub label: String,
    pub detail: String,
    #[serde(deserialize_with = "deserialize_unit")]
    pub confidence: f32,
}

impl Evidence {
    pub fn new(label: impl Into<String>, detail: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            detail: detail.into(),
            confidence: clamp_unit(confidence),
        }
    }
}

/// Result shape shared by the image and text branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "unsafe")]
    pub is_unsafe: bool,
    #[serde(deserialize_with = "deserialize_unit")]
    pub confidence: f32,
    pub categories: BTreeSet<String>,
    pub severity: Severity,
    pub evidence: Vec<Evidence>,
}

impl ClassificationResult {
    pub fn new(is_unsafe: bool, confidence: f32, severity: Severity) -> Self {
        Self {
            is_unsafe,
            confidence: clamp_unit(confidence),
            categories: BTreeSet::new(),
            severity,
            evidence: Vec::new(),
        }
    }

    /// Nothing found: safe, zero confidence, no evidence
    pub fn clear() -> Self {
        Self::new(false, 0.0, Severity::Low)
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Transport,
    Upstream,
    MalformedResponse,
    Unreadable,
    NotApplicable,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport",
            FailureKind::Upstream => "upstream",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::Unreadable => "unreadable",
            FailureKind::NotApplicable => "not_applicable",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl BranchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Resolved result of one analysis branch. Never pending, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum BranchOutcome<T> {
    Success(T),
    Failure(BranchFailure),
}

impl<T> BranchOutcome<T> {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        BranchOutcome::Failure(BranchFailure::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BranchOutcome::Success(_))
    }

    pub fn as_success(&self) -> Option<&T> {
        match self {
            BranchOutcome::Success(value) => Some(value),
            BranchOutcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&BranchFailure> {
        match self {
            BranchOutcome::Success(_) => None,
            BranchOutcome::Failure(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionVerdict {
    pub flagged: bool,
    pub score: f32,
    pub matched_signals: Vec<String>,
}

impl InjectionVerdict {
    pub fn clean() -> Self {
        Self {
            flagged: false,
            score: 0.0,
            matched_signals: Vec::new(),
        }
    }
}

/// Final structured safety decision for one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedVerdict {
    pub overall_unsafe: bool,
    pub overall_confidence: f32,
    pub overall_severity: Severity,
    pub image: BranchOutcome<ClassificationResult>,
    pub text: BranchOutcome<ClassificationResult>,
    pub extracted_text: ExtractedText,
}

/// What the service returns for a successful moderation request
#[derive(Debug, Clone, Serialize)]
pub struct ModerationReport {
    pub submission_type: SubmissionKind,
    #[serde(flatten)]
    pub verdict: AggregatedVerdict,
    pub summary: Option<String>,
}
