use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kassa_ocr::{PipelineOptions, DEFAULT_MAX_SIDE};
use kassa_replicate::{DEFAULT_API_BASE, DEFAULT_LAYOUT_MODEL, DEFAULT_OCR_MODEL};

/// Settings read from `config.toml`. The API token is never stored here;
/// it comes from the flag or `REPLICATE_API_TOKEN`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_base: String,
    pub ocr_model: String,
    pub layout_model: String,
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,
    pub max_image_side: u32,
    /// Entity type renames, e.g. `"MENU.NM" = "ITEM"`.
    pub aliases: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ocr_model: DEFAULT_OCR_MODEL.to_string(),
            layout_model: DEFAULT_LAYOUT_MODEL.to_string(),
            poll_interval_ms: 1000,
            max_wait_secs: 600,
            max_image_side: DEFAULT_MAX_SIDE,
            aliases: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// `<config dir>/kassa/config.toml` for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "kassa", "kassa")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    tracing::debug!("No config file found; using defaults");
                    return Ok(Self::default());
                }
            },
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_image_side: self.max_image_side,
            aliases: self.aliases.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let s = Settings::from_toml(
            r#"
            ocr_model = "me/ocr:1234"
            poll_interval_ms = 250

            [aliases]
            "MENU.NM" = "ITEM"
            "TOTAL.TOTAL_PRICE" = "TOTAL"
            "#,
        )
        .unwrap();
        assert_eq!(s.ocr_model, "me/ocr:1234");
        assert_eq!(s.layout_model, DEFAULT_LAYOUT_MODEL);
        assert_eq!(s.poll_interval(), Duration::from_millis(250));
        assert_eq!(s.aliases.get("MENU.NM").map(String::as_str), Some("ITEM"));
        assert_eq!(s.pipeline_options().aliases.len(), 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::from_toml("api_token = \"secret\"").is_err());
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_wait_secs = 30\n").unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.max_wait(), Duration::from_secs(30));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
