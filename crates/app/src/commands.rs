use anyhow::{bail, Context};
use kassa_core::{LabelMap, ReceiptReport, TokenDecoder};
use kassa_ocr::{spawn_intake_watcher, ReceiptPipeline};
use kassa_replicate::{DeepSeekOcr, LayoutLmv3, ModelRef, ReplicateClient, ReplicateError};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::cli::{OutputFormat, RemoteArgs};
use crate::config::Settings;

/// Give writers a moment to finish a file after its create event fires.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

type HostedPipeline = ReceiptPipeline<DeepSeekOcr, LayoutLmv3>;

fn build_pipeline(settings: &Settings, remote: &RemoteArgs) -> anyhow::Result<HostedPipeline> {
    let token = remote
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ReplicateError::MissingToken)?;

    let client = ReplicateClient::new(token)?
        .with_base_url(&settings.api_base)
        .with_poll_interval(settings.poll_interval())
        .with_max_wait(settings.max_wait());

    let ocr_model: ModelRef = settings.ocr_model.parse()?;
    let layout_model: ModelRef = settings.layout_model.parse()?;
    tracing::info!("Using OCR model {ocr_model} and layout model {layout_model}");

    Ok(ReceiptPipeline::with_options(
        DeepSeekOcr::new(client.clone(), ocr_model),
        LayoutLmv3::new(client, layout_model),
        settings.pipeline_options(),
    ))
}

fn render(report: &ReceiptReport, image: Option<&Path>, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match (format, image) {
        (OutputFormat::Text, Some(path)) => {
            format!("=== Results: {} ===\n{}", path.display(), report.formatted_text)
        }
        (OutputFormat::Text, None) => report.formatted_text.clone(),
        (OutputFormat::Json, Some(path)) => serde_json::to_string_pretty(&json!({
            "image": path.display().to_string(),
            "report": report,
        }))?,
        (OutputFormat::Json, None) => serde_json::to_string_pretty(report)?,
    })
}

async fn process_one(pipeline: &HostedPipeline, path: &Path, format: OutputFormat) -> bool {
    let start = Instant::now();
    tracing::info!("Processing receipt: {}", path.display());
    match pipeline.process_file(path).await {
        Ok(report) => {
            if let Some(err) = &report.error {
                tracing::warn!("{}: {err}", path.display());
            }
            tracing::info!(
                "Finished {} in {:.2}s",
                path.display(),
                start.elapsed().as_secs_f64()
            );
            match render(&report, Some(path), format) {
                Ok(out) => {
                    println!("{out}");
                    true
                }
                Err(e) => {
                    tracing::error!("{}: {e:#}", path.display());
                    false
                }
            }
        }
        Err(e) => {
            tracing::error!("{}: {e}", path.display());
            false
        }
    }
}

pub async fn process(
    settings: Settings,
    images: &[PathBuf],
    remote: &RemoteArgs,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let pipeline = build_pipeline(&settings, remote)?;

    let mut failures = 0usize;
    for path in images {
        if !process_one(&pipeline, path, format).await {
            failures += 1;
        }
    }

    if failures > 0 {
        tracing::error!("{failures} of {} receipt(s) failed", images.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn watch(
    settings: Settings,
    dir: &Path,
    remote: &RemoteArgs,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let pipeline = build_pipeline(&settings, remote)?;

    // The watcher must stay alive for events to keep flowing.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spawn_intake_watcher(dir, tx)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    tracing::info!("Watching intake folder: {}", dir.display());

    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(path) => {
                    tokio::time::sleep(SETTLE_DELAY).await;
                    process_one(&pipeline, &path, format).await;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; stopping watcher");
                break;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Saved classifier output for offline decoding.
#[derive(Debug, Deserialize)]
struct DecodeInput {
    tokens: Vec<String>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    /// Raw class ids; needs a label map.
    #[serde(default)]
    predictions: Option<Vec<u32>>,
}

fn decode_report(input: DecodeInput, label_map: Option<&LabelMap>) -> anyhow::Result<ReceiptReport> {
    let labels = match (input.labels, input.predictions, label_map) {
        (Some(labels), _, _) => labels,
        (None, Some(ids), Some(map)) => map.labels_for(&ids),
        (None, Some(_), None) => bail!("`predictions` are class ids; pass --labels <config.json>"),
        (None, None, _) => bail!("input has neither `labels` nor `predictions`"),
    };
    Ok(ReceiptReport::from_predictions(&TokenDecoder::new(), &input.tokens, &labels)?)
}

pub fn decode(
    settings: &Settings,
    file: &Path,
    labels: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let input: DecodeInput = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid decode input {}", file.display()))?;

    let label_map = labels
        .map(|path| -> anyhow::Result<LabelMap> {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(LabelMap::from_config_json(&json)?)
        })
        .transpose()?;

    let report = decode_report(input, label_map.as_ref())?.with_aliases(&settings.aliases);
    println!("{}", render(&report, None, format)?);
    Ok(ExitCode::SUCCESS)
}
