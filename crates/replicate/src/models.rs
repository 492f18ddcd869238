use async_trait::async_trait;
use kassa_core::{format_report, ReceiptReport, TokenDecoder};
use kassa_ocr::{LayoutInput, LayoutLabeler, ReceiptImage, RecognizerError, TextRecognizer};
use serde_json::{json, Value};

use crate::client::{ModelRef, ReplicateClient, ReplicateError};

pub const DEFAULT_OCR_MODEL: &str = "whidge/deepseekocr";
pub const DEFAULT_LAYOUT_MODEL: &str = "whidge/layoutlmv3";

impl From<ReplicateError> for RecognizerError {
    fn from(e: ReplicateError) -> Self {
        RecognizerError::Backend(Box::new(e))
    }
}

// ── OCR ───────────────────────────────────────────────────────────────────────

/// Hosted DeepSeek-OCR deployment: image in, `{"text": ...}` out.
pub struct DeepSeekOcr {
    client: ReplicateClient,
    model: ModelRef,
}

impl DeepSeekOcr {
    pub fn new(client: ReplicateClient, model: ModelRef) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl TextRecognizer for DeepSeekOcr {
    async fn recognize(&self, image: &ReceiptImage) -> Result<String, RecognizerError> {
        let input = json!({ "image": image.to_data_uri() });
        let output = self.client.run(&self.model, input).await?;
        Ok(ocr_text(output))
    }
}

/// Normalize whatever shape an OCR deployment returns into plain text.
///
/// Objects yield their `"text"` field, strings pass through, and streamed
/// token arrays are concatenated. Anything else is rendered as JSON.
pub fn ocr_text(output: Value) -> String {
    match output {
        Value::Object(mut map) => match map.remove("text") {
            Some(Value::String(s)) => s,
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        },
        Value::String(s) => s,
        Value::Array(parts) if parts.iter().all(Value::is_string) => {
            parts.iter().filter_map(Value::as_str).collect()
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ── Layout ────────────────────────────────────────────────────────────────────

/// Hosted LayoutLMv3 (CORD) deployment: image + words + boxes in, report out.
pub struct LayoutLmv3 {
    client: ReplicateClient,
    model: ModelRef,
    decoder: TokenDecoder,
}

impl LayoutLmv3 {
    pub fn new(client: ReplicateClient, model: ModelRef) -> Self {
        Self {
            client,
            model,
            decoder: TokenDecoder::new(),
        }
    }
}

#[async_trait]
impl LayoutLabeler for LayoutLmv3 {
    async fn label(
        &self,
        image: &ReceiptImage,
        input: &LayoutInput,
    ) -> Result<ReceiptReport, RecognizerError> {
        let payload = json!({
            "image": image.to_data_uri(),
            "words": input.words(),
            "boxes": input.boxes(),
        });
        let output = self.client.run(&self.model, payload).await?;
        layout_report(output, &self.decoder)
    }
}

/// Turn the layout deployment's output into a report.
///
/// Deployments that only return raw `tokens` / `predictions` are decoded
/// here; a missing summary is rendered from the entities.
pub fn layout_report(output: Value, decoder: &TokenDecoder) -> Result<ReceiptReport, RecognizerError> {
    if !output.is_object() {
        return Err(RecognizerError::Output(format!(
            "expected a JSON object, got {output}"
        )));
    }
    let mut report: ReceiptReport =
        serde_json::from_value(output).map_err(|e| RecognizerError::Output(e.to_string()))?;

    if report.entities.is_empty() && report.formatted_text.is_empty() && !report.tokens.is_empty() {
        let error = report.error.take();
        let decoded = ReceiptReport::from_predictions(decoder, &report.tokens, &report.predictions)
            .map_err(|e| RecognizerError::Output(e.to_string()))?;
        return Ok(ReceiptReport { error, ..decoded });
    }
    if report.formatted_text.is_empty() {
        report.formatted_text = format_report(&report.entities);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kassa_core::NO_ENTITIES;

    #[test]
    fn ocr_text_from_object() {
        assert_eq!(ocr_text(json!({"text": "ACME\nTOTAL 4.50"})), "ACME\nTOTAL 4.50");
        assert_eq!(ocr_text(json!({"other": 1})), "");
        assert_eq!(ocr_text(json!({"text": null})), "");
    }

    #[test]
    fn ocr_text_from_string_and_stream() {
        assert_eq!(ocr_text(json!("plain")), "plain");
        assert_eq!(ocr_text(json!(["AC", "ME", " 4.50"])), "ACME 4.50");
        assert_eq!(ocr_text(Value::Null), "");
    }

    #[test]
    fn ocr_text_falls_back_to_json() {
        assert_eq!(ocr_text(json!(42)), "42");
        assert_eq!(ocr_text(json!([1, "a"])), r#"[1,"a"]"#);
    }

    #[test]
    fn layout_report_passes_hosted_report_through() {
        let output = json!({
            "entities": {"STORE": ["ACME"], "TOTAL": ["4.50"]},
            "formatted_text": "# ACME\n\n## Total: 4.50",
            "tokens": ["<s>"],
            "predictions": ["O"]
        });
        let r = layout_report(output, &TokenDecoder::new()).unwrap();
        assert_eq!(r.formatted_text, "# ACME\n\n## Total: 4.50");
        assert_eq!(r.entities.first("TOTAL"), Some("4.50"));
    }

    #[test]
    fn layout_report_decodes_raw_predictions() {
        let output = json!({
            "tokens": ["<s>", "ĠACME", "ĠMART", "</s>"],
            "predictions": ["O", "B-STORE", "I-STORE", "O"]
        });
        let r = layout_report(output, &TokenDecoder::new()).unwrap();
        assert_eq!(r.formatted_text, "# ACME MART");
        assert_eq!(r.entities.first("STORE"), Some("ACME MART"));
    }

    #[test]
    fn layout_report_renders_missing_summary() {
        let r = layout_report(json!({"entities": {"DATE": ["01/15"]}}), &TokenDecoder::new()).unwrap();
        assert_eq!(r.formatted_text, "Date: 01/15");

        let r = layout_report(json!({}), &TokenDecoder::new()).unwrap();
        assert_eq!(r.formatted_text, NO_ENTITIES);
    }

    #[test]
    fn layout_report_keeps_hosted_error_message() {
        let output = json!({
            "entities": {},
            "formatted_text": "Error: words (3) and boxes (2) count mismatch.",
            "tokens": [],
            "predictions": []
        });
        let r = layout_report(output, &TokenDecoder::new()).unwrap();
        assert_eq!(r.formatted_text, "Error: words (3) and boxes (2) count mismatch.");
        assert!(r.entities.is_empty());
    }

    #[test]
    fn layout_report_rejects_non_objects() {
        let err = layout_report(json!("oops"), &TokenDecoder::new()).unwrap_err();
        assert!(matches!(err, RecognizerError::Output(_)));
    }

    #[test]
    fn replicate_errors_become_backend_errors() {
        let err: RecognizerError = ReplicateError::Canceled("p1".into()).into();
        assert!(matches!(err, RecognizerError::Backend(_)));
        assert_eq!(err.to_string(), "Inference backend error: Prediction p1 was canceled");
    }
}
