//! Concurrent OCR + image classification over one canonical image

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

use crate::collaborators::{CollaboratorFault, ImageClassifier, TextExtractor};
use crate::models::{BranchOutcome, CanonicalImage, ClassificationResult, ExtractedText, FailureKind};
use crate::services::retry::RetryPolicy;

/// Drive one branch to a resolved outcome. Errors and panics become `Failure`.
pub(crate) async fn settle<T, E, Fut>(branch: &'static str, call: Fut) -> BranchOutcome<T>
where
    E: CollaboratorFault,
    Fut: Future<Output = Result<T, E>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => BranchOutcome::Success(value),
        Ok(Err(err)) => {
            warn!(branch, kind = %err.kind(), error = %err, "analysis branch failed");
            BranchOutcome::failure(err.kind(), err.to_string())
        }
        Err(_) => {
            error!(branch, "analysis branch panicked");
            BranchOutcome::failure(FailureKind::Internal, format!("{branch} analyzer crashed"))
        }
    }
}

/// Both branch outcomes, each resolved independently
#[derive(Debug)]
pub struct FanoutOutcome {
    pub extraction: BranchOutcome<ExtractedText>,
    pub image: BranchOutcome<ClassificationResult>,
}

pub struct AnalyzerFanout {
    extractor: Arc<dyn TextExtractor>,
    classifier: Arc<dyn ImageClassifier>,
    retry: RetryPolicy,
}

impl AnalyzerFanout {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        classifier: Arc<dyn ImageClassifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            extractor,
            classifier,
            retry,
        }
    }

    /// Returns once both branches have resolved. Dropping the future cancels both.
    pub async fn run(&self, image: &CanonicalImage) -> FanoutOutcome {
        let extractor = self.extractor.as_ref();
        let classifier = self.classifier.as_ref();

        let (extraction, image) = tokio::join!(
            settle("ocr", self.retry.run("ocr", move || extractor.extract(image))),
            settle("image", self.retry.run("image", move || classifier.classify(image))),
        );

        FanoutOutcome { extraction, image }
    }
}
