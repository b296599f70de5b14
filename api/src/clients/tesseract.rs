//! OCR through the `tesseract` command-line engine

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::collaborators::{ExtractionError, TextExtractor};
use crate::models::{CanonicalImage, ExtractedText};

/// Pipes a grayscale PNG through `tesseract stdin stdout`
pub struct TesseractExtractor {
    binary: String,
}

impl TesseractExtractor {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, image: &CanonicalImage) -> Result<ExtractedText, ExtractionError> {
        let png = image
            .encode_grayscale_png()
            .map_err(|e| ExtractionError::Unreadable(e.to_string()))?;

        // Dropping the child (e.g. on timeout) kills the process
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractionError::Engine(format!("failed to start {}: {e}", self.binary)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExtractionError::Engine("tesseract stdin unavailable".into()))?;

        let feed = async move {
            let written = stdin.write_all(&png).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.map_err(|e| ExtractionError::Engine(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        match written {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(ExtractionError::Engine(format!(
                    "writing image to tesseract: {e}"
                )));
            }
            _ => {}
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|_| ExtractionError::Unreadable("OCR output was not valid UTF-8".into()))?;
        Ok(text.trim().to_string())
    }
}
