use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";
pub const TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("REPLICATE_API_TOKEN environment variable not set")]
    MissingToken,
    #[error("Invalid model reference '{0}': expected owner/name or owner/name:version")]
    InvalidModel(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Replicate API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Prediction {id} failed: {message}")]
    PredictionFailed { id: String, message: String },
    #[error("Prediction {0} was canceled")]
    Canceled(String),
    #[error("Prediction {id} did not finish within {waited_secs}s")]
    Timeout { id: String, waited_secs: u64 },
}

/// `owner/name`, optionally pinned to a version as `owner/name:version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl FromStr for ModelRef {
    type Err = ReplicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReplicateError::InvalidModel(s.to_string());
        let (path, version) = match s.trim().split_once(':') {
            Some((path, version)) if !version.is_empty() => (path, Some(version.to_string())),
            Some(_) => return Err(invalid()),
            None => (s.trim(), None),
        };
        let (owner, name) = path.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)?;
        if let Some(v) = &self.version {
            write!(f, ":{v}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionUrls {
    #[serde(default)]
    pub get: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

impl Prediction {
    fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => "unknown error".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Async client for the hosted prediction API.
#[derive(Debug, Clone)]
pub struct ReplicateClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ReplicateClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ReplicateError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        })
    }

    /// Build a client from `REPLICATE_API_TOKEN`.
    pub fn from_env() -> Result<Self, ReplicateError> {
        Self::from_token_var(std::env::var(TOKEN_ENV).ok())
    }

    fn from_token_var(token: Option<String>) -> Result<Self, ReplicateError> {
        match token {
            Some(t) if !t.trim().is_empty() => Self::new(t.trim()),
            _ => Err(ReplicateError::MissingToken),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a prediction, asking the API to hold the response until it
    /// finishes where it can.
    pub async fn create_prediction(
        &self,
        model: &ModelRef,
        input: Value,
    ) -> Result<Prediction, ReplicateError> {
        let (url, body) = match &model.version {
            Some(version) => (
                format!("{}/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/models/{}/{}/predictions", self.base_url, model.owner, model.name),
                json!({ "input": input }),
            ),
        };

        tracing::debug!(model = %model, "Creating prediction");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        parse_response(response).await
    }

    pub async fn get_prediction(&self, prediction: &Prediction) -> Result<Prediction, ReplicateError> {
        let url = prediction
            .urls
            .as_ref()
            .and_then(|u| u.get.clone())
            .unwrap_or_else(|| format!("{}/predictions/{}", self.base_url, prediction.id));
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        parse_response(response).await
    }

    /// Poll until the prediction reaches a terminal state or the wait budget
    /// runs out.
    pub async fn wait(&self, mut prediction: Prediction) -> Result<Prediction, ReplicateError> {
        let started = Instant::now();
        loop {
            match prediction.status {
                PredictionStatus::Succeeded => return Ok(prediction),
                PredictionStatus::Failed => {
                    return Err(ReplicateError::PredictionFailed {
                        message: prediction.error_message(),
                        id: prediction.id,
                    })
                }
                PredictionStatus::Canceled => return Err(ReplicateError::Canceled(prediction.id)),
                PredictionStatus::Starting | PredictionStatus::Processing | PredictionStatus::Unknown => {}
            }

            if started.elapsed() >= self.max_wait {
                return Err(ReplicateError::Timeout {
                    id: prediction.id,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            tracing::debug!(id = %prediction.id, status = ?prediction.status, "Polling prediction");
            prediction = self.get_prediction(&prediction).await?;
        }
    }

    /// Run `model` on `input` and return its output. A prediction that
    /// succeeds without output yields `Value::Null`.
    pub async fn run(&self, model: &ModelRef, input: Value) -> Result<Value, ReplicateError> {
        let created = self.create_prediction(model, input).await?;
        tracing::debug!(id = %created.id, status = ?created.status, "Prediction created");
        let finished = self.wait(created).await?;
        Ok(finished.output.unwrap_or(Value::Null))
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ReplicateError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ReplicateError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_model_ref() {
        let m: ModelRef = "whidge/deepseekocr".parse().unwrap();
        assert_eq!(m.owner, "whidge");
        assert_eq!(m.name, "deepseekocr");
        assert_eq!(m.version, None);
        assert_eq!(m.to_string(), "whidge/deepseekocr");
    }

    #[test]
    fn parse_pinned_model_ref() {
        let m: ModelRef = "whidge/layoutlmv3:5c7d5dc6".parse().unwrap();
        assert_eq!(m.version.as_deref(), Some("5c7d5dc6"));
        assert_eq!(m.to_string(), "whidge/layoutlmv3:5c7d5dc6");
    }

    #[test]
    fn reject_malformed_model_refs() {
        for bad in ["", "noslash", "/name", "owner/", "a/b/c", "owner/name:"] {
            assert!(
                matches!(bad.parse::<ModelRef>(), Err(ReplicateError::InvalidModel(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn prediction_deserializes_with_unknown_status() {
        let p: Prediction = serde_json::from_str(
            r#"{"id": "abc", "status": "queued", "output": null, "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(p.status, PredictionStatus::Unknown);
        assert!(p.output.is_none());
        assert!(p.urls.is_none());
    }

    #[test]
    fn error_message_variants() {
        let mut p: Prediction = serde_json::from_str(r#"{"id": "x", "status": "failed"}"#).unwrap();
        assert_eq!(p.error_message(), "unknown error");
        p.error = Some(Value::String("CUDA out of memory".into()));
        assert_eq!(p.error_message(), "CUDA out of memory");
        p.error = Some(json!({"detail": "bad input"}));
        assert_eq!(p.error_message(), r#"{"detail":"bad input"}"#);
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(
            ReplicateClient::from_token_var(None),
            Err(ReplicateError::MissingToken)
        ));
        assert!(matches!(
            ReplicateClient::from_token_var(Some("   ".into())),
            Err(ReplicateError::MissingToken)
        ));
        assert!(ReplicateClient::from_token_var(Some("r8_abc".into())).is_ok());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = ReplicateClient::new("t").unwrap().with_base_url("http://localhost:9000/v1/");
        assert_eq!(c.base_url(), "http://localhost:9000/v1");
    }
}
