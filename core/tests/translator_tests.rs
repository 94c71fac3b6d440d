// tests/translator_tests.rs
mod common;

use common::*;
use homebites::translator::DESTRUCTIVE_REFUSAL;
use homebites::{OracleError, QueryTranslator, SchemaRegistry};
use std::sync::Arc;

fn translator(oracle: Arc<ScriptedOracle>) -> QueryTranslator {
  QueryTranslator::new(oracle, Arc::new(SchemaRegistry::homebites()))
}

#[test]
fn test_prompt_carries_schema_and_rules() {
  let prompt = translator(ScriptedOracle::new()).prompt_for("how many meals does chef Alice have");

  for field in ["role", "name", "email", "chefId", "customerId", "status", "quantity", "cuisine", "price", "mealId"] {
    assert!(prompt.contains(field), "prompt is missing field {}", field);
  }
  assert!(prompt.contains("resolve the name to the user's _id through the users collection"));
  assert!(prompt.contains("$lookup"));
  assert!(prompt.contains(DESTRUCTIVE_REFUSAL));
  assert!(prompt.contains("db.<collection>.<method>(<arguments>)"));
  assert!(prompt.contains("code fences"));
  assert!(prompt.ends_with("Question: how many meals does chef Alice have\nQuery:"));
}

#[tokio::test]
async fn test_translate_only_trims_the_completion() {
  setup_tracing();
  let oracle = ScriptedOracle::replying(&["  db.users.countDocuments({role: \"chef\"})\n"]);
  let candidate = translator(oracle.clone()).translate("how many chefs are there").await.unwrap();

  assert_eq!(candidate, "db.users.countDocuments({role: \"chef\"})");
  assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn test_malformed_completion_is_passed_through_unrepaired() {
  let oracle = ScriptedOracle::replying(&["```js\ndb.users.find({})\n```"]);
  let candidate = translator(oracle).translate("list users").await.unwrap();
  assert!(candidate.starts_with("```"));
}

#[tokio::test]
async fn test_empty_completion_is_oracle_unavailable() {
  let oracle = ScriptedOracle::replying(&["   \n"]);
  let err = translator(oracle).translate("list users").await.unwrap_err();
  assert_eq!(err, OracleError::EmptyResponse);
}

#[tokio::test]
async fn test_unreachable_oracle_is_reported_without_retry() {
  let oracle = ScriptedOracle::failing();
  let err = translator(oracle.clone()).translate("list users").await.unwrap_err();
  assert!(matches!(err, OracleError::Unreachable(_)));
  assert_eq!(oracle.call_count(), 1);
}
