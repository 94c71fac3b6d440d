// homebites/server/src/main.rs

mod config;
mod errors;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::services::{GeminiOracle, MongoStore};
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use homebites::Agent;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting HomeBites agent server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
  };
  tracing::debug!(config = ?app_config, "Configuration loaded.");

  let store = match MongoStore::connect(&app_config.mongo_uri, &app_config.mongo_db_name).await {
    Ok(store) => store,
    Err(e) => {
      tracing::error!(error = %e, "Failed to create the database client.");
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
  };

  // Fail fast when the deployment is unreachable.
  if let Err(e) = store.ping().await {
    tracing::error!(error = %e, "Failed to connect to the database.");
    return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
  }
  match store.collection_names().await {
    Ok(names) => tracing::info!(collections = ?names, "Successfully connected to the database."),
    Err(e) => tracing::warn!(error = %e, "Connected, but could not list collections."),
  }

  let oracle = match GeminiOracle::new(&app_config) {
    Ok(oracle) => oracle,
    Err(e) => {
      tracing::error!(error = %e, "Failed to build the oracle client.");
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
  };

  let agent = Arc::new(Agent::new(Arc::new(oracle), Arc::new(store)));

  let app_state = AppState {
    agent,
    config: app_config.clone(),
  };

  let server_address = format!("{}:{}", app_state.config.server_host, app_state.config.server_port);
  tracing::info!("Server listening on http://{}", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
