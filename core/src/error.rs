// homebites/src/error.rs
use crate::executor::ExecutionError;
use crate::gate::Rejection;
use crate::oracle::OracleError;
use thiserror::Error;

/// The fixed sentence returned for questions outside the HomeBites domain.
pub const OUT_OF_SCOPE_MESSAGE: &str = "I can only answer questions about the HomeBites system.";

/// Returned when the oracle cannot be reached or produced nothing.
pub const ORACLE_UNAVAILABLE_MESSAGE: &str =
  "Sorry, I couldn't reach the assistant right now. Please try again later.";

/// Returned when the answer pipeline itself is misconfigured.
pub const INTERNAL_FAILURE_MESSAGE: &str = "Sorry, something went wrong while answering your question.";

/// Engine-level failures of the step pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Internal pipeline error: {0}")]
  Internal(String),
}

/// Every way answering a question can fail.
///
/// None of these escape `Agent::answer`: each one is turned into a
/// user-visible sentence by [`AgentError::user_message`].
#[derive(Debug, Error)]
pub enum AgentError {
  #[error("Oracle unavailable: {0}")]
  OracleUnavailable(#[from] OracleError),

  #[error("Query rejected: {0}")]
  Rejected(#[from] Rejection),

  #[error(transparent)]
  Execution(#[from] ExecutionError),

  #[error("Question is outside the HomeBites domain")]
  OutOfScope,

  #[error("Answer pipeline error: {0}")]
  Pipeline(#[from] PipelineError),
}

impl AgentError {
  /// The string shown to the caller for this failure.
  ///
  /// Gate rejections name their category but never echo the rejected query.
  /// Execution errors carry the database detail, since the query was already
  /// approved.
  pub fn user_message(&self) -> String {
    match self {
      AgentError::OracleUnavailable(_) => ORACLE_UNAVAILABLE_MESSAGE.to_string(),
      AgentError::Rejected(rejection) => rejection.refusal().to_string(),
      AgentError::Execution(e) => e.to_string(),
      AgentError::OutOfScope => OUT_OF_SCOPE_MESSAGE.to_string(),
      AgentError::Pipeline(_) => INTERNAL_FAILURE_MESSAGE.to_string(),
    }
  }
}
