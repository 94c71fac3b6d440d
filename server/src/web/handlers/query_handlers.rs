// homebites/server/src/web/handlers/query_handlers.rs

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct QueryRequest {
  pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct QueryResponse {
  pub response: String,
}

#[instrument(name = "handler::query", skip(app_state, req_body))]
pub async fn query_handler(
  app_state: web::Data<AppState>,
  req_body: web::Json<QueryRequest>,
) -> Result<HttpResponse, AppError> {
  let message = req_body.into_inner().message;
  if message.trim().is_empty() {
    warn!("Rejected query request with an empty message.");
    return Err(AppError::Validation("'message' must not be empty.".to_string()));
  }

  let response = app_state.agent.answer(&message).await;
  info!(response_len = response.len(), "Question answered.");

  Ok(HttpResponse::Ok().json(QueryResponse { response }))
}
