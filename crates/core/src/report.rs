use serde::{Deserialize, Serialize};

use crate::decode::{DecodeError, TokenDecoder};
use crate::entity::EntityMap;

pub const STORE: &str = "STORE";
pub const DATE: &str = "DATE";
pub const ITEM: &str = "ITEM";
pub const PRICE: &str = "PRICE";
pub const TOTAL: &str = "TOTAL";

pub const NO_ENTITIES: &str = "No structured entities detected.";

/// How many tokens / labels a report echoes back for inspection.
pub const MAX_ECHOED_TOKENS: usize = 50;

/// Render grouped entities as a short Markdown summary.
pub fn format_report(entities: &EntityMap) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(store) = entities.first(STORE) {
        lines.push(format!("# {store}"));
    }
    if let Some(date) = entities.first(DATE) {
        lines.push(format!("Date: {date}"));
    }
    if let Some(items) = entities.get(ITEM) {
        lines.push("\n## Items".to_string());
        lines.extend(items.iter().map(|item| format!("- {item}")));
    }
    if let Some(prices) = entities.get(PRICE) {
        lines.push("\n## Prices".to_string());
        lines.extend(prices.iter().map(|price| format!("- {price}")));
    }
    if let Some(total) = entities.first(TOTAL) {
        lines.push(format!("\n## Total: {total}"));
    }

    if lines.is_empty() {
        NO_ENTITIES.to_string()
    } else {
        lines.join("\n")
    }
}

/// Structured result for one receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptReport {
    #[serde(default)]
    pub entities: EntityMap,
    #[serde(default)]
    pub formatted_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predictions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReceiptReport {
    /// Decode a token classifier's output and format it.
    pub fn from_predictions<T, L>(
        decoder: &TokenDecoder,
        tokens: &[T],
        labels: &[L],
    ) -> Result<Self, DecodeError>
    where
        T: AsRef<str>,
        L: AsRef<str>,
    {
        let entities = decoder.decode(tokens, labels)?;
        let formatted_text = format_report(&entities);
        Ok(Self {
            entities,
            formatted_text,
            tokens: echo(tokens),
            predictions: echo(labels),
            error: None,
        })
    }

    pub fn from_entities(entities: EntityMap) -> Self {
        let formatted_text = format_report(&entities);
        Self { entities, formatted_text, ..Self::default() }
    }

    /// Nothing to label; `message` stands in for the formatted text.
    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            formatted_text: message.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Rename entity types and re-render the summary.
    pub fn with_aliases(self, aliases: &std::collections::HashMap<String, String>) -> Self {
        if aliases.is_empty() || self.entities.is_empty() {
            return self;
        }
        let entities = self.entities.remap(aliases);
        let formatted_text = format_report(&entities);
        Self { entities, formatted_text, ..self }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn echo<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .take(MAX_ECHOED_TOKENS)
        .map(|v| v.as_ref().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn receipt_entities() -> EntityMap {
        let mut m = EntityMap::new();
        m.push(STORE, "CAFE NERO".into());
        m.push(STORE, "ignored second store".into());
        m.push(DATE, "2024-01-15".into());
        m.push(ITEM, "Latte".into());
        m.push(ITEM, "Muffin".into());
        m.push(PRICE, "4.50".into());
        m.push(PRICE, "3.25".into());
        m.push(TOTAL, "7.75".into());
        m
    }

    #[test]
    fn full_report_layout() {
        let text = format_report(&receipt_entities());
        assert_eq!(
            text,
            "# CAFE NERO\nDate: 2024-01-15\n\n## Items\n- Latte\n- Muffin\n\n## Prices\n- 4.50\n- 3.25\n\n## Total: 7.75"
        );
    }

    #[test]
    fn absent_sections_are_omitted() {
        let mut m = EntityMap::new();
        m.push(TOTAL, "12.00".into());
        m.push("MENU.CNT", "2".into());
        assert_eq!(format_report(&m), "\n## Total: 12.00");
    }

    #[test]
    fn nothing_detected_message() {
        assert_eq!(format_report(&EntityMap::new()), NO_ENTITIES);

        let mut m = EntityMap::new();
        m.push("MENU.NM", "Latte".into());
        assert_eq!(format_report(&m), NO_ENTITIES);
    }

    #[test]
    fn from_predictions_decodes_and_truncates_echo() {
        let mut tokens = vec!["<s>".to_string(), "ĠACME".to_string()];
        let mut labels = vec!["O".to_string(), "B-STORE".to_string()];
        tokens.extend(std::iter::repeat("<pad>".to_string()).take(100));
        labels.extend(std::iter::repeat("O".to_string()).take(100));

        let report = ReceiptReport::from_predictions(&TokenDecoder::new(), &tokens, &labels).unwrap();
        assert_eq!(report.formatted_text, "# ACME");
        assert_eq!(report.tokens.len(), MAX_ECHOED_TOKENS);
        assert_eq!(report.predictions.len(), MAX_ECHOED_TOKENS);
        assert_eq!(report.tokens[1], "ĠACME");
        assert!(!report.is_error());
    }

    #[test]
    fn failed_report_carries_error() {
        let r = ReceiptReport::failed("No text extracted from image.", "OCR returned empty result");
        assert!(r.is_error());
        assert!(r.entities.is_empty());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["error"], "OCR returned empty result");
        assert_eq!(json["entities"], serde_json::json!({}));
    }

    #[test]
    fn aliases_rewrite_entities_and_summary() {
        let mut m = EntityMap::new();
        m.push("MENU.NM", "Latte".into());
        m.push("TOTAL.TOTAL_PRICE", "4.50".into());
        let report = ReceiptReport::from_entities(m);
        assert_eq!(report.formatted_text, NO_ENTITIES);

        let aliases: HashMap<String, String> = [
            ("MENU.NM".to_string(), ITEM.to_string()),
            ("TOTAL.TOTAL_PRICE".to_string(), TOTAL.to_string()),
        ]
        .into_iter()
        .collect();
        let report = report.with_aliases(&aliases);
        assert_eq!(report.formatted_text, "\n## Items\n- Latte\n\n## Total: 4.50");
    }

    #[test]
    fn hosted_output_parses_as_report() {
        let json = r##"{
            "entities": {"STORE": ["ACME"]},
            "formatted_text": "# ACME",
            "tokens": ["<s>", "ĠACME"],
            "predictions": ["O", "B-STORE"]
        }"##;
        let r: ReceiptReport = serde_json::from_str(json).unwrap();
        assert_eq!(r.entities.first(STORE), Some("ACME"));
        assert_eq!(r.predictions, vec!["O", "B-STORE"]);
        assert_eq!(r.error, None);
    }
}
