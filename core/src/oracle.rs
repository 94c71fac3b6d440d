// homebites/src/oracle.rs

//! The text-completion seam. The server crate provides the concrete client;
//! tests script one.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
  #[error("oracle unreachable: {0}")]
  Unreachable(String),

  #[error("oracle returned an empty completion")]
  EmptyResponse,
}

/// A prompt-completion service. One call per translation or description.
#[async_trait]
pub trait Oracle: Send + Sync {
  async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Trims a completion and treats a blank one as `EmptyResponse`.
pub fn non_empty(completion: String) -> Result<String, OracleError> {
  let trimmed = completion.trim();
  if trimmed.is_empty() {
    Err(OracleError::EmptyResponse)
  } else {
    Ok(trimmed.to_string())
  }
}
