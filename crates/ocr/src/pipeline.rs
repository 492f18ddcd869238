use kassa_core::ReceiptReport;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::receipt_image::{ImageError, ReceiptImage, DEFAULT_MAX_SIDE};
use crate::recognizer::{LayoutLabeler, RecognizerError, TextRecognizer};
use crate::types::{LayoutInput, LayoutInputError};
use crate::words;

const OCR_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[source] RecognizerError),
    #[error("Layout labeling failed: {0}")]
    Layout(#[source] RecognizerError),
    #[error("Invalid layout input: {0}")]
    Input(#[from] LayoutInputError),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Images with a longer side are downscaled before upload.
    pub max_image_side: u32,
    /// Entity type renames applied to the final report.
    pub aliases: HashMap<String, String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_image_side: DEFAULT_MAX_SIDE,
            aliases: HashMap::new(),
        }
    }
}

/// Orchestrates: load → OCR → split words + estimate boxes → layout labeling.
pub struct ReceiptPipeline<R: TextRecognizer, L: LayoutLabeler> {
    recognizer: R,
    labeler: L,
    options: PipelineOptions,
}

impl<R: TextRecognizer, L: LayoutLabeler> ReceiptPipeline<R, L> {
    pub fn new(recognizer: R, labeler: L) -> Self {
        Self::with_options(recognizer, labeler, PipelineOptions::default())
    }

    pub fn with_options(recognizer: R, labeler: L, options: PipelineOptions) -> Self {
        Self { recognizer, labeler, options }
    }

    pub fn labeler(&self) -> &L {
        &self.labeler
    }

    /// Process a file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<ReceiptReport, PipelineError> {
        let image = ReceiptImage::load(path, self.options.max_image_side).await?;
        self.process_image(&image).await
    }

    /// Process an already decoded image.
    pub async fn process_image(&self, image: &ReceiptImage) -> Result<ReceiptReport, PipelineError> {
        // 1. OCR.
        tracing::info!("Running OCR...");
        let ocr_text = self
            .recognizer
            .recognize(image)
            .await
            .map_err(PipelineError::Ocr)?;

        if ocr_text.is_empty() {
            tracing::warn!("OCR returned empty result");
            return Ok(ReceiptReport::failed(
                "No text extracted from image.",
                "OCR returned empty result",
            ));
        }
        let preview: String = ocr_text.chars().take(OCR_PREVIEW_CHARS).collect();
        tracing::info!("OCR extracted text: {preview}...");

        // 2. Words + estimated boxes.
        let (words, boxes) = words::extract_words_and_boxes(&ocr_text, image.width(), image.height());
        if words.is_empty() {
            return Ok(ReceiptReport::failed(
                "No text detected in image.",
                "No words extracted from OCR",
            ));
        }
        tracing::info!("Extracted {} words", words.len());
        let input = LayoutInput::new(words, boxes)?;

        // 3. Layout labeling.
        tracing::info!("Running layout model...");
        let report = self
            .labeler
            .label(image, &input)
            .await
            .map_err(PipelineError::Layout)?;

        Ok(report.with_aliases(&self.options.aliases))
    }
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// Whether `path` has an image extension we know how to decode.
pub fn is_receipt_image(path: &Path) -> bool {
    image::ImageFormat::from_path(path).is_ok_and(|f| f.reading_enabled())
}

/// Spawn a notify watcher on `watch_dir` that sends newly created images to `tx`.
/// The returned watcher must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) if matches!(ev.kind, EventKind::Create(_)) => {
                for path in ev.paths.into_iter().filter(|p| is_receipt_image(p)) {
                    if tx.try_send(path).is_err() {
                        tracing::warn!("Intake queue full or closed; dropping event");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Watch error: {e}"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
