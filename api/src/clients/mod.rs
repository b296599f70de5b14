//! Concrete collaborator adapters

pub mod groq;
pub mod tesseract;
pub mod vision;

pub use groq::{GroqClient, GroqSummarizer, GroqToxicityClassifier};
pub use tesseract::TesseractExtractor;
pub use vision::VisionSafeSearchClassifier;
