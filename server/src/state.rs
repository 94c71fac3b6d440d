// homebites/server/src/state.rs
use crate::config::AppConfig;
use homebites::Agent;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub agent: Arc<Agent>,
  pub config: Arc<AppConfig>, // Share loaded config
}
