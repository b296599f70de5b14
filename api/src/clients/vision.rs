//! Google Cloud Vision SafeSearch + object localization adapter

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

use crate::collaborators::{ClassifierError, ImageClassifier};
use crate::models::{CanonicalImage, ClassificationResult, Evidence, Severity};

/// Objects scoring above this become visual cues
const VISUAL_CUE_MIN_SCORE: f32 = 0.7;
const MAX_OBJECTS: u32 = 10;

const CATEGORIES: &[(&str, &str)] = &[
    ("adult", "Nudity or sexual content"),
    ("violence", "Violent or graphic content"),
    ("racy", "Suggestive content"),
    ("medical", "Medical conditions/injuries"),
    ("spoof", "Edited/doctored media"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum Likelihood {
    #[default]
    Unknown,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    fn as_str(&self) -> &'static str {
        match self {
            Likelihood::Unknown => "UNKNOWN",
            Likelihood::VeryUnlikely => "VERY_UNLIKELY",
            Likelihood::Unlikely => "UNLIKELY",
            Likelihood::Possible => "POSSIBLE",
            Likelihood::Likely => "LIKELY",
            Likelihood::VeryLikely => "VERY_LIKELY",
        }
    }

    /// Confidence and severity for a flagged likelihood; `None` below `POSSIBLE`
    fn grade(&self) -> Option<(f32, Severity)> {
        match self {
            Likelihood::Possible => Some((0.5, Severity::Low)),
            Likelihood::Likely => Some((0.75, Severity::Medium)),
            Likelihood::VeryLikely => Some((0.95, Severity::High)),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SafeSearchAnnotation {
    #[serde(default)]
    adult: Likelihood,
    #[serde(default)]
    violence: Likelihood,
    #[serde(default)]
    racy: Likelihood,
    #[serde(default)]
    medical: Likelihood,
    #[serde(default)]
    spoof: Likelihood,
}

impl SafeSearchAnnotation {
    fn get(&self, category: &str) -> Likelihood {
        match category {
            "adult" => self.adult,
            "violence" => self.violence,
            "racy" => self.racy,
            "medical" => self.medical,
            "spoof" => self.spoof,
            _ => Likelihood::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocalizedObject {
    name: String,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    safe_search_annotation: Option<SafeSearchAnnotation>,
    #[serde(default)]
    localized_object_annotations: Vec<LocalizedObject>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct BatchAnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
}

fn interpret(batch: BatchAnnotateResponse) -> Result<ClassificationResult, ClassifierError> {
    let response = batch
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| ClassifierError::MalformedResponse("empty annotate response".into()))?;

    if let Some(status) = response.error {
        return Err(ClassifierError::MalformedResponse(format!(
            "vision error: {}",
            status.message
        )));
    }
    let safe = response
        .safe_search_annotation
        .ok_or_else(|| ClassifierError::MalformedResponse("missing safeSearchAnnotation".into()))?;

    let mut flagged = Vec::new();
    for (category, description) in CATEGORIES {
        let likelihood = safe.get(category);
        if let Some((confidence, severity)) = likelihood.grade() {
            flagged.push((*category, *description, likelihood, confidence, severity));
        }
    }

    let confidence = flagged.iter().map(|f| f.3).fold(0.0, f32::max);
    let severity = flagged.iter().map(|f| f.4).max().unwrap_or_default();
    let mut result = ClassificationResult::new(!flagged.is_empty(), confidence, severity);

    for (category, description, likelihood, confidence, _) in flagged {
        result = result.with_category(category).with_evidence(Evidence::new(
            category,
            format!("{description} ({})", likelihood.as_str()),
            confidence,
        ));
    }

    let mut seen = BTreeSet::new();
    for object in response.localized_object_annotations {
        if object.score > VISUAL_CUE_MIN_SCORE && seen.insert(object.name.clone()) {
            result = result.with_evidence(Evidence::new("visual_cue", object.name, object.score));
        }
    }

    Ok(result)
}

pub struct VisionSafeSearchClassifier {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl VisionSafeSearchClassifier {
    pub fn new(http: Client, base_url: &str, api_key: SecretString) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ImageClassifier for VisionSafeSearchClassifier {
    async fn classify(&self, image: &CanonicalImage) -> Result<ClassificationResult, ClassifierError> {
        let png = image
            .encode_png()
            .map_err(|e| ClassifierError::Encode(e.to_string()))?;
        let content = base64::engine::general_purpose::STANDARD.encode(png);

        let body = json!({
            "requests": [{
                "image": { "content": content },
                "features": [
                    { "type": "SAFE_SEARCH_DETECTION" },
                    { "type": "OBJECT_LOCALIZATION", "maxResults": MAX_OBJECTS },
                ],
            }],
        });

        let resp = self
            .http
            .post(format!("{}/images:annotate", self.base_url))
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClassifierError::Upstream {
                status: resp.status().as_u16(),
            });
        }

        let batch: BatchAnnotateResponse = resp
            .json()
            .await
            .map_err(|e| ClassifierError::MalformedResponse(e.without_url().to_string()))?;
        interpret(batch)
    }
}
