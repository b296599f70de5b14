//! Structured description of a verdict for the summarizer collaborator.
//!
//! Building the payload is pure and total: missing data becomes an explicit
//! "none" or "unknown" so the summarizer never has to guess.

use serde::Serialize;

use crate::models::{AggregatedVerdict, BranchOutcome, ClassificationResult, Severity};

const NONE: &str = "none";
const UNKNOWN: &str = "unknown";
const DEFAULT_EXCERPT_CHARS: usize = 280;
const MAX_EVIDENCE_PER_BRANCH: usize = 5;

/// One branch rendered as display-ready strings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchDigest {
    pub status: String,
    pub verdict: String,
    pub confidence: String,
    pub severity: String,
    pub categories: Vec<String>,
    pub evidence: Vec<String>,
}

impl BranchDigest {
    fn from_outcome(outcome: &BranchOutcome<ClassificationResult>) -> Self {
        match outcome {
            BranchOutcome::Success(result) => Self {
                status: "completed".to_string(),
                verdict: if result.is_unsafe { "unsafe" } else { "safe" }.to_string(),
                confidence: format!("{:.2}", result.confidence),
                severity: result.severity.to_string(),
                categories: or_none(result.categories.iter().cloned().collect()),
                evidence: or_none(
                    result
                        .evidence
                        .iter()
                        .take(MAX_EVIDENCE_PER_BRANCH)
                        .map(|e| format!("{}: {} ({:.2})", e.label, e.detail, e.confidence))
                        .collect(),
                ),
            },
            BranchOutcome::Failure(failure) => Self {
                status: format!("unavailable ({})", failure.kind),
                verdict: UNKNOWN.to_string(),
                confidence: UNKNOWN.to_string(),
                severity: UNKNOWN.to_string(),
                categories: vec![NONE.to_string()],
                evidence: vec![NONE.to_string()],
            },
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        out.push_str(&format!(
            "{name} analysis: {}\n  verdict: {}\n  confidence: {}\n  severity: {}\n  categories: {}\n  evidence: {}\n",
            self.status,
            self.verdict,
            self.confidence,
            self.severity,
            self.categories.join(", "),
            self.evidence.join("; "),
        ));
    }
}

fn or_none(items: Vec<String>) -> Vec<String> {
    if items.is_empty() {
        vec![NONE.to_string()]
    } else {
        items
    }
}

/// What the summarizer receives
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryPayload {
    pub headline: String,
    pub overall_severity: Severity,
    pub overall_confidence: String,
    pub image: BranchDigest,
    pub text: BranchDigest,
    pub extracted_text_excerpt: String,
}

impl SummaryPayload {
    /// Plain-text rendering suitable as a prompt body
    pub fn render(&self) -> String {
        let mut out = format!(
            "{}\noverall severity: {}\noverall confidence: {}\n",
            self.headline, self.overall_severity, self.overall_confidence
        );
        self.image.render("image", &mut out);
        self.text.render("text", &mut out);
        out.push_str(&format!("extracted text: {}\n", self.extracted_text_excerpt));
        out
    }
}

#[derive(Debug, Clone)]
pub struct SummaryRequestBuilder {
    excerpt_chars: usize,
}

impl Default for SummaryRequestBuilder {
    fn default() -> Self {
        Self {
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

impl SummaryRequestBuilder {
    pub fn build(&self, verdict: &AggregatedVerdict) -> SummaryPayload {
        let headline = if verdict.overall_unsafe {
            format!(
                "Content flagged as unsafe ({} severity)",
                verdict.overall_severity
            )
        } else {
            "No unsafe content detected".to_string()
        };

        SummaryPayload {
            headline,
            overall_severity: verdict.overall_severity,
            overall_confidence: format!("{:.2}", verdict.overall_confidence),
            image: BranchDigest::from_outcome(&verdict.image),
            text: BranchDigest::from_outcome(&verdict.text),
            extracted_text_excerpt: self.excerpt(&verdict.extracted_text),
        }
    }

    fn excerpt(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return NONE.to_string();
        }
        if text.chars().count() <= self.excerpt_chars {
            return text.to_string();
        }
        let cut: String = text.chars().take(self.excerpt_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Evidence, FailureKind};

    fn verdict(
        image: BranchOutcome<ClassificationResult>,
        text: BranchOutcome<ClassificationResult>,
    ) -> AggregatedVerdict {
        AggregatedVerdict {
            overall_unsafe: true,
            overall_confidence: 0.9,
            overall_severity: Severity::High,
            image,
            text,
            extracted_text: String::new(),
        }
    }

    #[test]
    fn failed_branch_renders_placeholders() {
        let flagged = ClassificationResult::new(true, 0.9, Severity::High)
            .with_category("violence")
            .with_evidence(Evidence::new("violence", "VERY_LIKELY", 0.95));
        let payload = SummaryRequestBuilder::default().build(&verdict(
            BranchOutcome::Success(flagged),
            BranchOutcome::failure(FailureKind::Timeout, "text classifier timed out"),
        ));

        assert_eq!(payload.headline, "Content flagged as unsafe (high severity)");
        assert_eq!(payload.image.categories, vec!["violence"]);
        assert_eq!(payload.image.evidence, vec!["violence: VERY_LIKELY (0.95)"]);
        assert_eq!(payload.text.status, "unavailable (timeout)");
        assert_eq!(payload.text.verdict, "unknown");
        assert_eq!(payload.text.categories, vec!["none"]);
        assert_eq!(payload.extracted_text_excerpt, "none");
    }

    #[test]
    fn clean_result_lists_none() {
        let payload = SummaryRequestBuilder::default().build(&AggregatedVerdict {
            overall_unsafe: false,
            overall_confidence: 0.0,
            overall_severity: Severity::Low,
            image: BranchOutcome::failure(FailureKind::NotApplicable, "no image submitted"),
            text: BranchOutcome::Success(ClassificationResult::clear()),
            extracted_text: "hello".into(),
        });

        assert_eq!(payload.headline, "No unsafe content detected");
        assert_eq!(payload.text.evidence, vec!["none"]);
        assert_eq!(payload.text.verdict, "safe");
        assert_eq!(payload.extracted_text_excerpt, "hello");

        let rendered = payload.render();
        assert!(rendered.contains("image analysis: unavailable (not_applicable)"));
        assert!(rendered.contains("extracted text: hello"));
    }

    #[test]
    fn long_text_is_excerpted_on_char_boundaries() {
        let builder = SummaryRequestBuilder { excerpt_chars: 4 };
        assert_eq!(builder.excerpt("ééééé"), "éééé...");
        assert_eq!(builder.excerpt("abc"), "abc");
    }
}
