//! Capability interfaces the moderation core consumes.
//!
//! Implementations are shared read-only across in-flight requests (`Arc<dyn ...>`),
//! so they must be `Send + Sync` and must not mutate per-request state.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{CanonicalImage, ClassificationResult, ExtractedText, FailureKind};
use crate::services::injection_guard::ScreenedText;
use crate::services::summary::SummaryPayload;

/// Classification of a collaborator fault, used for retry decisions and branch outcomes
pub trait CollaboratorFault: std::error::Error + Send + Sync + 'static {
    fn kind(&self) -> FailureKind;

    /// Worth one more attempt (timeouts, transport faults, upstream 5xx/429)
    fn is_transient(&self) -> bool;

    fn timed_out(after: Duration) -> Self;
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("text extraction timed out after {0:?}")]
    Timeout(Duration),
    #[error("image content could not be read: {0}")]
    Unreadable(String),
    #[error("OCR engine failed: {0}")]
    Engine(String),
}

impl CollaboratorFault for ExtractionError {
    fn kind(&self) -> FailureKind {
        match self {
            ExtractionError::Timeout(_) => FailureKind::Timeout,
            ExtractionError::Unreadable(_) => FailureKind::Unreadable,
            ExtractionError::Engine(_) => FailureKind::Upstream,
        }
    }

    fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Timeout(_))
    }

    fn timed_out(after: Duration) -> Self {
        ExtractionError::Timeout(after)
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
    #[error("classifier transport failed: {0}")]
    Transport(String),
    #[error("classifier upstream returned status {status}")]
    Upstream { status: u16 },
    #[error("classifier response did not match the expected schema: {0}")]
    MalformedResponse(String),
    #[error("request could not be prepared: {0}")]
    Encode(String),
}

impl CollaboratorFault for ClassifierError {
    fn kind(&self) -> FailureKind {
        match self {
            ClassifierError::Timeout(_) => FailureKind::Timeout,
            ClassifierError::Transport(_) => FailureKind::Transport,
            ClassifierError::Upstream { .. } => FailureKind::Upstream,
            ClassifierError::MalformedResponse(_) => FailureKind::MalformedResponse,
            ClassifierError::Encode(_) => FailureKind::Internal,
        }
    }

    fn is_transient(&self) -> bool {
        match self {
            ClassifierError::Timeout(_) | ClassifierError::Transport(_) => true,
            ClassifierError::Upstream { status } => *status == 429 || *status >= 500,
            ClassifierError::MalformedResponse(_) | ClassifierError::Encode(_) => false,
        }
    }

    fn timed_out(after: Duration) -> Self {
        ClassifierError::Timeout(after)
    }
}

impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        // URLs can carry API keys in the query string
        let err = err.without_url();
        if err.is_timeout() {
            ClassifierError::Transport(format!("request timed out: {err}"))
        } else if err.is_decode() {
            ClassifierError::MalformedResponse(err.to_string())
        } else {
            ClassifierError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("summarizer timed out after {0:?}")]
    Timeout(Duration),
    #[error("summarizer transport failed: {0}")]
    Transport(String),
    #[error("summarizer upstream returned status {status}")]
    Upstream { status: u16 },
    #[error("summarizer returned no text")]
    Empty,
}

impl From<reqwest::Error> for SummarizerError {
    fn from(err: reqwest::Error) -> Self {
        SummarizerError::Transport(err.without_url().to_string())
    }
}

/// Pulls printed text out of a canonical image
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &CanonicalImage) -> Result<ExtractedText, ExtractionError>;
}

/// Visual content classification (nudity, violence, ...)
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, image: &CanonicalImage)
    -> Result<ClassificationResult, ClassifierError>;
}

/// Toxicity classification. Only accepts text that has passed the injection guard.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &ScreenedText) -> Result<ClassificationResult, ClassifierError>;
}

/// Turns a structured verdict description into prose. Best effort.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, payload: &SummaryPayload) -> Result<String, SummarizerError>;
}

/// Substitute collaborators for tests
#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What a fake does when called
    #[derive(Clone)]
    pub enum Behavior<T> {
        Return(T),
        Fail(FailureKind),
        Hang,
    }

    async fn act<T: Clone, E: CollaboratorFault>(
        behavior: &Behavior<T>,
        make_err: impl Fn(FailureKind) -> E,
    ) -> Result<T, E> {
        match behavior {
            Behavior::Return(value) => Ok(value.clone()),
            Behavior::Fail(kind) => Err(make_err(*kind)),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(make_err(FailureKind::Timeout))
            }
        }
    }

    fn classifier_error(kind: FailureKind) -> ClassifierError {
        match kind {
            FailureKind::Timeout => ClassifierError::Timeout(Duration::from_secs(1)),
            FailureKind::Transport => ClassifierError::Transport("connection reset".into()),
            FailureKind::MalformedResponse => {
                ClassifierError::MalformedResponse("missing field `is_toxic`".into())
            }
            _ => ClassifierError::Upstream { status: 502 },
        }
    }

    fn extraction_error(kind: FailureKind) -> ExtractionError {
        match kind {
            FailureKind::Timeout => ExtractionError::Timeout(Duration::from_secs(1)),
            FailureKind::Unreadable => ExtractionError::Unreadable("no text layer".into()),
            _ => ExtractionError::Engine("tesseract exited with status 1".into()),
        }
    }

    pub struct FakeExtractor {
        pub behavior: Behavior<String>,
        pub calls: AtomicUsize,
    }

    impl FakeExtractor {
        pub fn new(behavior: Behavior<String>) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextExtractor for FakeExtractor {
        async fn extract(&self, _image: &CanonicalImage) -> Result<ExtractedText, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            act(&self.behavior, extraction_error).await
        }
    }

    pub struct FakeImageClassifier {
        pub behavior: Behavior<ClassificationResult>,
        pub calls: AtomicUsize,
    }

    impl FakeImageClassifier {
        pub fn new(behavior: Behavior<ClassificationResult>) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageClassifier for FakeImageClassifier {
        async fn classify(
            &self,
            _image: &CanonicalImage,
        ) -> Result<ClassificationResult, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            act(&self.behavior, classifier_error).await
        }
    }

    /// Records every text it is asked to classify
    pub struct FakeTextClassifier {
        pub behavior: Behavior<ClassificationResult>,
        pub calls: AtomicUsize,
        pub seen: std::sync::Mutex<Vec<String>>,
    }

    impl FakeTextClassifier {
        pub fn new(behavior: Behavior<ClassificationResult>) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextClassifier for FakeTextClassifier {
        async fn classify(
            &self,
            text: &ScreenedText,
        ) -> Result<ClassificationResult, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .expect("seen lock")
                .push(text.as_str().to_string());
            act(&self.behavior, classifier_error).await
        }
    }

    pub struct FakeSummarizer {
        pub reply: Behavior<String>,
    }

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize(&self, payload: &SummaryPayload) -> Result<String, SummarizerError> {
            match &self.reply {
                Behavior::Return(reply) => Ok(format!("{reply} ({})", payload.headline)),
                Behavior::Fail(_) => Err(SummarizerError::Upstream { status: 503 }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(SummarizerError::Timeout(Duration::from_secs(3600)))
                }
            }
        }
    }
}
