use async_trait::async_trait;
use kassa_core::{ReceiptReport, TokenDecoder};
use std::sync::Mutex;
use thiserror::Error;

use crate::receipt_image::ReceiptImage;
use crate::types::LayoutInput;

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("Inference backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Unexpected model output: {0}")]
    Output(String),
}

/// Image → plain text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &ReceiptImage) -> Result<String, RecognizerError>;
}

/// Image + words + boxes → grouped entities.
#[async_trait]
pub trait LayoutLabeler: Send + Sync {
    async fn label(
        &self,
        image: &ReceiptImage,
        input: &LayoutInput,
    ) -> Result<ReceiptReport, RecognizerError>;
}

// ── Mock backends (used for tests) ────────────────────────────────────────────

/// Returns a pre-set string regardless of the image.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl TextRecognizer for MockRecognizer {
    async fn recognize(&self, _image: &ReceiptImage) -> Result<String, RecognizerError> {
        Ok(self.text.clone())
    }
}

/// Decodes a fixed token/label sequence and remembers the last input it saw.
pub struct MockLabeler {
    tokens: Vec<String>,
    labels: Vec<String>,
    decoder: TokenDecoder,
    last_input: Mutex<Option<LayoutInput>>,
}

impl MockLabeler {
    pub fn new<S: Into<String>>(tokens: Vec<S>, labels: Vec<S>) -> Self {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            labels: labels.into_iter().map(Into::into).collect(),
            decoder: TokenDecoder::new(),
            last_input: Mutex::new(None),
        }
    }

    pub fn last_input(&self) -> Option<LayoutInput> {
        self.last_input.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl LayoutLabeler for MockLabeler {
    async fn label(
        &self,
        _image: &ReceiptImage,
        input: &LayoutInput,
    ) -> Result<ReceiptReport, RecognizerError> {
        if let Ok(mut guard) = self.last_input.lock() {
            *guard = Some(input.clone());
        }
        ReceiptReport::from_predictions(&self.decoder, &self.tokens, &self.labels)
            .map_err(|e| RecognizerError::Output(e.to_string()))
    }
}
