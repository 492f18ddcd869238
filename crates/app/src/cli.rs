use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "kassa")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn receipt photos into structured fields", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "KASSA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run OCR and layout labeling on one or more receipt images
    Process {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[command(flatten)]
        remote: RemoteArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Group a saved token/label sequence into entities (no network)
    Decode {
        /// JSON file with `tokens` and either `labels` or `predictions`
        file: PathBuf,

        /// Model `config.json` used to map `predictions` class ids to labels
        #[arg(long)]
        labels: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Process every image dropped into a folder until interrupted
    Watch {
        dir: PathBuf,

        #[command(flatten)]
        remote: RemoteArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

#[derive(Args, Clone, Default)]
pub struct RemoteArgs {
    /// Inference API token
    #[arg(long, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// OCR model as owner/name[:version]
    #[arg(long, env = "KASSA_OCR_MODEL")]
    pub ocr_model: Option<String>,

    /// Layout model as owner/name[:version]
    #[arg(long, env = "KASSA_LAYOUT_MODEL")]
    pub layout_model: Option<String>,

    /// Inference API base URL
    #[arg(long, env = "KASSA_API_BASE")]
    pub api_base: Option<String>,
}

impl RemoteArgs {
    /// Flags and env vars win over the config file.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(m) = &self.ocr_model {
            settings.ocr_model = m.clone();
        }
        if let Some(m) = &self.layout_model {
            settings.layout_model = m.clone();
        }
        if let Some(base) = &self.api_base {
            settings.api_base = base.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_process_with_overrides() {
        let cli = Cli::try_parse_from([
            "kassa",
            "process",
            "a.jpg",
            "b.png",
            "--ocr-model",
            "me/ocr",
            "--output",
            "json",
        ])
        .unwrap();
        match cli.command {
            Command::Process { images, remote, output } => {
                assert_eq!(images.len(), 2);
                assert_eq!(remote.ocr_model.as_deref(), Some("me/ocr"));
                assert_eq!(output, OutputFormat::Json);
            }
            _ => panic!("expected process"),
        }
    }

    #[test]
    fn process_requires_an_image() {
        assert!(Cli::try_parse_from(["kassa", "process"]).is_err());
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut settings = Settings::default();
        let remote = RemoteArgs {
            layout_model: Some("me/layout:v2".into()),
            api_base: Some("http://localhost:5000/v1".into()),
            ..RemoteArgs::default()
        };
        remote.apply_to(&mut settings);
        assert_eq!(settings.layout_model, "me/layout:v2");
        assert_eq!(settings.api_base, "http://localhost:5000/v1");
        assert_eq!(settings.ocr_model, Settings::default().ocr_model);
    }
}
