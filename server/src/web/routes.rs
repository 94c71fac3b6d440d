// homebites/server/src/web/routes.rs

use actix_web::web;

// Called in `main.rs` to configure services for the Actix App.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.route(
    "/query",
    web::post().to(crate::web::handlers::query_handlers::query_handler),
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::state::AppState;
  use crate::web::handlers::query_handlers::QueryResponse;
  use actix_web::{test, App};
  use async_trait::async_trait;
  use bson::{Bson, Document};
  use homebites::executor::DocumentStore;
  use homebites::oracle::{Oracle, OracleError};
  use homebites::{Agent, CursorOptions};
  use std::sync::Arc;

  struct CannedOracle(&'static str);

  #[async_trait]
  impl Oracle for CannedOracle {
    async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
      Ok(self.0.to_string())
    }
  }

  struct CountingStore;

  #[async_trait]
  impl DocumentStore for CountingStore {
    async fn find(&self, _: &str, _: Document, _: CursorOptions) -> anyhow::Result<Vec<Document>> {
      Ok(Vec::new())
    }
    async fn find_one(&self, _: &str, _: Document, _: Option<Document>) -> anyhow::Result<Option<Document>> {
      Ok(None)
    }
    async fn count_documents(&self, _: &str, _: Document) -> anyhow::Result<u64> {
      Ok(12)
    }
    async fn estimated_document_count(&self, _: &str) -> anyhow::Result<u64> {
      Ok(12)
    }
    async fn aggregate(&self, _: &str, _: Vec<Document>) -> anyhow::Result<Vec<Document>> {
      Ok(Vec::new())
    }
    async fn distinct(&self, _: &str, _: &str, _: Document) -> anyhow::Result<Vec<Bson>> {
      Ok(Vec::new())
    }
  }

  fn app_state(oracle_reply: &'static str) -> AppState {
    let config = AppConfig::from_lookup(|key| match key {
      "MONGO_URI" => Some("mongodb://localhost:27017".to_string()),
      "GOOGLE_API_KEY" => Some("test-key".to_string()),
      _ => None,
    })
    .unwrap();
    AppState {
      agent: Arc::new(Agent::new(Arc::new(CannedOracle(oracle_reply)), Arc::new(CountingStore))),
      config: Arc::new(config),
    }
  }

  #[actix_rt::test]
  async fn post_query_returns_the_answer() {
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(app_state("db.users.countDocuments({role: 'chef'})")))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/query")
      .set_json(serde_json::json!({ "message": "How many chefs are there?" }))
      .to_request();
    let body: QueryResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.response, "12");
  }

  #[actix_rt::test]
  async fn rejected_queries_still_answer_with_200() {
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(app_state("db.orders.deleteMany({})")))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/query")
      .set_json(serde_json::json!({ "message": "delete all orders" }))
      .to_request();
    let body: QueryResponse = test::call_and_read_body_json(&app, req).await;
    assert!(body.response.contains("FORBIDDEN_OPERATION"));
  }

  #[actix_rt::test]
  async fn empty_message_is_a_bad_request() {
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(app_state("unused")))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::post()
      .uri("/query")
      .set_json(serde_json::json!({ "message": "  " }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
  }

  #[actix_rt::test]
  async fn no_other_routes_exist() {
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(app_state("unused")))
        .configure(configure_app_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/query").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
  }
}
