//! Request orchestration: submission in, report out

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::collaborators::{Summarizer, SummarizerError};
use crate::constants::FALLBACK_SUMMARY;
use crate::models::{
    AggregatedVerdict, BranchOutcome, FailureKind, ModerationReport, RawSubmission,
};
use crate::services::aggregator::{AggregationError, aggregate};
use crate::services::fanout::{AnalyzerFanout, FanoutOutcome};
use crate::services::preprocess::{DecodeError, PreprocessingPipeline};
use crate::services::summary::SummaryRequestBuilder;
use crate::services::text_stage::{InjectionDetected, TextAnalysisStage};

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("invalid submission: {0}")]
    Validation(&'static str),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    InjectionDetected(#[from] InjectionDetected),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error("moderation did not finish within {0:?}")]
    DeadlineExceeded(Duration),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Build a submission from optional form fields. Exactly one must be present.
pub fn submission_from_parts(
    text: Option<String>,
    image: Option<Bytes>,
) -> Result<RawSubmission, ModerationError> {
    match (text, image) {
        (Some(text), None) => Ok(RawSubmission::Text(text)),
        (None, Some(bytes)) => Ok(RawSubmission::Image(bytes)),
        (Some(_), Some(_)) => Err(ModerationError::Validation(
            "provide either text or an image, not both",
        )),
        (None, None) => Err(ModerationError::Validation("provide text or an image")),
    }
}

/// Optional prose summary stage
pub struct SummaryStage {
    pub builder: SummaryRequestBuilder,
    pub summarizer: Arc<dyn Summarizer>,
    pub timeout: Duration,
}

pub struct ModerationEngine {
    pipeline: Arc<PreprocessingPipeline>,
    fanout: AnalyzerFanout,
    text_stage: TextAnalysisStage,
    summary: Option<SummaryStage>,
    request_timeout: Duration,
}

impl ModerationEngine {
    pub fn new(
        pipeline: PreprocessingPipeline,
        fanout: AnalyzerFanout,
        text_stage: TextAnalysisStage,
        summary: Option<SummaryStage>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            fanout,
            text_stage,
            summary,
            request_timeout,
        }
    }

    /// Moderate one submission within the request deadline.
    ///
    /// The deadline bounds analysis; on expiry every in-flight branch is dropped
    /// and `DeadlineExceeded` returned. The summary only gets whatever budget is
    /// left and falls back once that runs out.
    pub async fn moderate(&self, submission: RawSubmission) -> Result<ModerationReport, ModerationError> {
        let submission_type = submission.kind();
        let started = Instant::now();

        let verdict = timeout(self.request_timeout, self.analyze(submission))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.request_timeout, "moderation request deadline exceeded");
                ModerationError::DeadlineExceeded(self.request_timeout)
            })??;

        let remaining = self.request_timeout.saturating_sub(started.elapsed());
        let summary = self.summarize(&verdict, remaining).await;

        info!(
            submission_type = ?submission_type,
            overall_unsafe = verdict.overall_unsafe,
            overall_severity = %verdict.overall_severity,
            image_ok = verdict.image.is_success(),
            text_ok = verdict.text.is_success(),
            "moderation complete"
        );

        Ok(ModerationReport {
            submission_type,
            verdict,
            summary,
        })
    }

    async fn analyze(&self, submission: RawSubmission) -> Result<AggregatedVerdict, ModerationError> {
        match submission {
            RawSubmission::Text(text) => {
                let image = BranchOutcome::failure(FailureKind::NotApplicable, "no image submitted");
                let text_outcome = self.text_stage.run(&text).await?;
                Ok(aggregate(image, text_outcome, text)?)
            }
            RawSubmission::Image(bytes) => {
                let pipeline = Arc::clone(&self.pipeline);
                let canonical = tokio::task::spawn_blocking(move || pipeline.process(&bytes))
                    .await
                    .map_err(|e| ModerationError::Internal(format!("preprocessing task failed: {e}")))??;

                debug!(
                    width = canonical.width(),
                    height = canonical.height(),
                    grayscale = canonical.source_was_grayscale(),
                    "image preprocessed"
                );

                let FanoutOutcome { extraction, image } = self.fanout.run(&canonical).await;

                let (text_outcome, extracted) = match extraction {
                    BranchOutcome::Success(text) => (self.text_stage.run(&text).await?, text),
                    BranchOutcome::Failure(failure) => (BranchOutcome::Failure(failure), String::new()),
                };
                Ok(aggregate(image, text_outcome, extracted)?)
            }
        }
    }

    async fn summarize(&self, verdict: &AggregatedVerdict, remaining: Duration) -> Option<String> {
        let stage = self.summary.as_ref()?;
        let payload = stage.builder.build(verdict);
        let budget = stage.timeout.min(remaining);

        let outcome = timeout(budget, stage.summarizer.summarize(&payload))
            .await
            .unwrap_or(Err(SummarizerError::Timeout(budget)))
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(SummarizerError::Empty)
                } else {
                    Ok(text)
                }
            });

        match outcome {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(error = %err, "summary unavailable, using fallback");
                Some(FALLBACK_SUMMARY.to_string())
            }
        }
    }
}
