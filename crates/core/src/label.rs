use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Fallback for class ids the model config does not name.
pub const OUTSIDE: &str = "O";

/// A single BIO tag as produced by the token classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Outside,
    Begin(String),
    Inside(String),
}

impl Label {
    /// Parse a raw tag. Anything without a `B-` / `I-` prefix is `Outside`.
    pub fn parse(raw: &str) -> Self {
        if let Some(kind) = raw.strip_prefix("B-") {
            Label::Begin(kind.to_string())
        } else if let Some(kind) = raw.strip_prefix("I-") {
            Label::Inside(kind.to_string())
        } else {
            Label::Outside
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Outside => write!(f, "{OUTSIDE}"),
            Label::Begin(kind) => write!(f, "B-{kind}"),
            Label::Inside(kind) => write!(f, "I-{kind}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LabelMapError {
    #[error("Failed to parse model config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid class id in id2label: '{0}'")]
    InvalidId(String),
}

/// Class-id → tag mapping, as found in a Hugging Face `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    labels: HashMap<u32, String>,
}

#[derive(Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: HashMap<String, String>,
}

impl LabelMap {
    /// Ids are assigned by position.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels
            .into_iter()
            .enumerate()
            .map(|(id, label)| (id as u32, label.into()))
            .collect();
        Self { labels }
    }

    /// Read the `id2label` table out of a model `config.json`.
    pub fn from_config_json(json: &str) -> Result<Self, LabelMapError> {
        let config: ModelConfig = serde_json::from_str(json)?;
        let mut labels = HashMap::with_capacity(config.id2label.len());
        for (id, label) in config.id2label {
            let parsed: u32 = id
                .trim()
                .parse()
                .map_err(|_| LabelMapError::InvalidId(id.clone()))?;
            labels.insert(parsed, label);
        }
        Ok(Self { labels })
    }

    pub fn label(&self, id: u32) -> &str {
        self.labels.get(&id).map(String::as_str).unwrap_or(OUTSIDE)
    }

    pub fn labels_for(&self, ids: &[u32]) -> Vec<String> {
        ids.iter().map(|&id| self.label(id).to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
