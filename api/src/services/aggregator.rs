//! Merge branch outcomes into one verdict

use thiserror::Error;

use crate::models::{
    AggregatedVerdict, BranchFailure, BranchOutcome, ClassificationResult, ExtractedText, Severity,
    clamp_unit,
};

/// Both branches failed, so there is no evidence either way
#[derive(Debug, Error)]
#[error("no analysis branch succeeded (image: {}, text: {})", .image.kind, .text.kind)]
pub struct AggregationError {
    pub image: BranchFailure,
    pub text: BranchFailure,
}

/// Combine outcomes. Failed branches count as safe with zero confidence but are
/// kept in the verdict; if both failed the result is an error, never "safe".
pub fn aggregate(
    image: BranchOutcome<ClassificationResult>,
    text: BranchOutcome<ClassificationResult>,
    extracted_text: ExtractedText,
) -> Result<AggregatedVerdict, AggregationError> {
    if let (BranchOutcome::Failure(image), BranchOutcome::Failure(text)) = (&image, &text) {
        return Err(AggregationError {
            image: image.clone(),
            text: text.clone(),
        });
    }

    let live: Vec<&ClassificationResult> = [image.as_success(), text.as_success()]
        .into_iter()
        .flatten()
        .collect();

    let overall_unsafe = live.iter().any(|r| r.is_unsafe);
    let overall_confidence = live
        .iter()
        .map(|r| clamp_unit(r.confidence))
        .fold(0.0, f32::max);
    let overall_severity = live
        .iter()
        .map(|r| r.severity)
        .max()
        .unwrap_or(Severity::Low);

    Ok(AggregatedVerdict {
        overall_unsafe,
        overall_confidence,
        overall_severity,
        image,
        text,
        extracted_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;

    fn ok(is_unsafe: bool, confidence: f32, severity: Severity) -> BranchOutcome<ClassificationResult> {
        BranchOutcome::Success(ClassificationResult::new(is_unsafe, confidence, severity))
    }

    fn failed(kind: FailureKind) -> BranchOutcome<ClassificationResult> {
        BranchOutcome::failure(kind, "upstream unavailable")
    }

    #[test]
    fn two_safe_branches_are_safe() {
        let v = aggregate(ok(false, 0.2, Severity::Low), ok(false, 0.4, Severity::Medium), String::new())
            .expect("aggregate");
        assert!(!v.overall_unsafe);
        assert_eq!(v.overall_confidence, 0.4);
        assert_eq!(v.overall_severity, Severity::Medium);
    }

    #[test]
    fn either_unsafe_branch_makes_the_verdict_unsafe() {
        let image_only = aggregate(ok(true, 0.9, Severity::High), ok(false, 0.1, Severity::Low), String::new())
            .expect("aggregate");
        assert!(image_only.overall_unsafe);
        assert_eq!(image_only.overall_severity, Severity::High);

        let text_only = aggregate(ok(false, 0.1, Severity::Low), ok(true, 0.7, Severity::Medium), String::new())
            .expect("aggregate");
        assert!(text_only.overall_unsafe);
        assert_eq!(text_only.overall_confidence, 0.7);
    }

    #[test]
    fn failed_branch_counts_as_safe_but_is_kept() {
        let v = aggregate(
            failed(FailureKind::Timeout),
            ok(false, 0.3, Severity::Low),
            "hi".into(),
        )
        .expect("aggregate");

        assert!(!v.overall_unsafe);
        assert_eq!(v.overall_confidence, 0.3);
        assert_eq!(v.image.as_failure().map(|f| f.kind), Some(FailureKind::Timeout));
        assert_eq!(v.extracted_text, "hi");
    }

    #[test]
    fn failed_branch_does_not_mask_the_live_one() {
        let v = aggregate(ok(true, 0.95, Severity::High), failed(FailureKind::MalformedResponse), String::new())
            .expect("aggregate");
        assert!(v.overall_unsafe);
        assert_eq!(v.overall_confidence, 0.95);
        assert_eq!(v.overall_severity, Severity::High);
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let mut hot = ClassificationResult::new(true, 0.5, Severity::High);
        hot.confidence = 1.5;
        let v = aggregate(BranchOutcome::Success(hot), ok(false, 0.2, Severity::Low), String::new())
            .expect("aggregate");
        assert_eq!(v.overall_confidence, 1.0);

        let mut negative = ClassificationResult::clear();
        negative.confidence = -3.0;
        let v = aggregate(BranchOutcome::Success(negative), failed(FailureKind::Timeout), String::new())
            .expect("aggregate");
        assert_eq!(v.overall_confidence, 0.0);
    }

    #[test]
    fn total_outage_is_an_error() {
        let err = aggregate(
            failed(FailureKind::Timeout),
            failed(FailureKind::Transport),
            String::new(),
        )
        .expect_err("both failed");
        assert_eq!(err.image.kind, FailureKind::Timeout);
        assert_eq!(err.text.kind, FailureKind::Transport);
    }
}
