// homebites/server/src/services/gemini_oracle.rs

//! `Oracle` backed by the Gemini `generateContent` REST endpoint.

use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use async_trait::async_trait;
use homebites::oracle::{Oracle, OracleError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{event, instrument, Level};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
  contents: Vec<Content<'a>>,
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
  role: &'static str,
  parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
  text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
  temperature: f32,
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
  text: Option<String>,
}

impl GenerateContentResponse {
  /// Text of the first candidate, all parts joined.
  fn first_text(self) -> String {
    self
      .candidates
      .into_iter()
      .next()
      .and_then(|c| c.content)
      .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join(""))
      .unwrap_or_default()
  }
}

pub struct GeminiOracle {
  client: Client,
  base_url: String,
  model: String,
  api_key: String,
  temperature: f32,
}

impl GeminiOracle {
  pub fn new(config: &AppConfig) -> AppResult<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.oracle_timeout_secs))
      .build()
      .map_err(|e| AppError::Oracle(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base_url: config.oracle_base_url.clone(),
      model: config.oracle_model.clone(),
      api_key: config.google_api_key.clone(),
      temperature: config.oracle_temperature,
    })
  }

  fn endpoint(&self) -> String {
    format!("{}/models/{}:generateContent", self.base_url, self.model)
  }
}

#[async_trait]
impl Oracle for GeminiOracle {
  #[instrument(name = "GeminiOracle::complete", skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
    let body = GenerateContentRequest {
      contents: vec![Content {
        role: "user",
        parts: vec![Part { text: prompt }],
      }],
      generation_config: GenerationConfig {
        temperature: self.temperature,
      },
    };

    let response = self
      .client
      .post(self.endpoint())
      .query(&[("key", self.api_key.as_str())])
      .json(&body)
      .send()
      .await
      .map_err(|e| OracleError::Unreachable(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let error_text = response.text().await.unwrap_or_default();
      event!(Level::WARN, %status, body = %error_text, "Oracle returned an error status.");
      return Err(OracleError::Unreachable(format!("HTTP {}", status)));
    }

    let data: GenerateContentResponse = response
      .json()
      .await
      .map_err(|e| OracleError::Unreachable(format!("invalid response body: {}", e.without_url())))?;

    let text = data.first_text();
    if text.trim().is_empty() {
      return Err(OracleError::EmptyResponse);
    }
    event!(Level::DEBUG, completion_len = text.len(), "Oracle completion received.");
    Ok(text)
  }
}
