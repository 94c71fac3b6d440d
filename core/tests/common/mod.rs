// tests/common/mod.rs
#![allow(dead_code)] // Each test binary uses a different subset.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use homebites::executor::DocumentStore;
use homebites::oracle::{Oracle, OracleError};
use homebites::{ContextData, CursorOptions, PipelineControl, PipelineError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;

// --- Generic pipeline test context ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub should_stop_at: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TestError {
  #[error("Pipeline error: {0}")]
  Pipeline(#[from] PipelineError),

  #[error("Test handler failed: {0}")]
  Handler(String),
}

pub fn create_simple_handler(
  step_name: &'static str,
  message_to_append: &'static str,
) -> homebites::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    let step_name_owned = step_name.to_string();
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.message.push_str(message_to_append);
      guard.steps_executed.push(step_name_owned.clone());
      tracing::debug!(target: "test_handlers", step = %step_name_owned, "executed, counter: {}", guard.counter);
      if guard.should_stop_at.as_deref() == Some(step_name_owned.as_str()) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn create_failing_handler(
  step_name: &'static str,
  error_message: &'static str,
) -> homebites::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    let step_name_owned = step_name.to_string();
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name_owned.clone());
      tracing::warn!(target: "test_handlers", step = %step_name_owned, "failing with: '{}'", error_message);
      Err(TestError::Handler(error_message.to_string()))
    })
  })
}

// --- Scripted oracle ---

/// Replies with queued responses in order, recording every prompt.
/// An exhausted script behaves like an unreachable service.
#[derive(Default)]
pub struct ScriptedOracle {
  replies: Mutex<VecDeque<Result<String, OracleError>>>,
  prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn replying(replies: &[&str]) -> Arc<Self> {
    let oracle = Self::default();
    {
      let mut queue = oracle.replies.lock();
      for reply in replies {
        queue.push_back(Ok((*reply).to_string()));
      }
    }
    Arc::new(oracle)
  }

  pub fn failing() -> Arc<Self> {
    let oracle = Self::default();
    oracle
      .replies
      .lock()
      .push_back(Err(OracleError::Unreachable("connection refused".to_string())));
    Arc::new(oracle)
  }

  pub fn prompts(&self) -> Vec<String> {
    self.prompts.lock().clone()
  }

  pub fn call_count(&self) -> usize {
    self.prompts.lock().len()
  }
}

#[async_trait]
impl Oracle for ScriptedOracle {
  async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
    self.prompts.lock().push(prompt.to_string());
    self
      .replies
      .lock()
      .pop_front()
      .unwrap_or_else(|| Err(OracleError::Unreachable("script exhausted".to_string())))
  }
}

// --- Recording document store ---

/// One store call as seen by the recording store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
  pub method: &'static str,
  pub collection: String,
  pub argument: Bson,
}

/// Returns canned results and records every call.
pub struct RecordingStore {
  pub documents: Vec<Document>,
  pub count: u64,
  pub fail_with: Option<String>,
  calls: Mutex<Vec<StoreCall>>,
  call_counter: AtomicUsize,
}

impl Default for RecordingStore {
  fn default() -> Self {
    Self {
      documents: vec![
        doc! { "name": "Lasagna", "cuisine": "Italian", "price": 12.5, "quantity": 4 },
        doc! { "name": "Pad Thai", "cuisine": "Thai", "price": 9.0, "quantity": 2 },
      ],
      count: 2,
      fail_with: None,
      calls: Mutex::new(Vec::new()),
      call_counter: AtomicUsize::new(0),
    }
  }
}

impl RecordingStore {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn with_count(count: u64) -> Arc<Self> {
    Arc::new(Self {
      count,
      ..Self::default()
    })
  }

  pub fn failing(message: &str) -> Arc<Self> {
    Arc::new(Self {
      fail_with: Some(message.to_string()),
      ..Self::default()
    })
  }

  pub fn calls(&self) -> Vec<StoreCall> {
    self.calls.lock().clone()
  }

  pub fn call_count(&self) -> usize {
    self.call_counter.load(Ordering::SeqCst)
  }

  fn record(&self, method: &'static str, collection: &str, argument: Bson) -> anyhow::Result<()> {
    self.call_counter.fetch_add(1, Ordering::SeqCst);
    self.calls.lock().push(StoreCall {
      method,
      collection: collection.to_string(),
      argument,
    });
    match &self.fail_with {
      Some(message) => Err(anyhow::anyhow!(message.clone())),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl DocumentStore for RecordingStore {
  async fn find(&self, collection: &str, filter: Document, _options: CursorOptions) -> anyhow::Result<Vec<Document>> {
    self.record("find", collection, Bson::Document(filter))?;
    Ok(self.documents.clone())
  }

  async fn find_one(
    &self,
    collection: &str,
    filter: Document,
    _projection: Option<Document>,
  ) -> anyhow::Result<Option<Document>> {
    self.record("find_one", collection, Bson::Document(filter))?;
    Ok(self.documents.first().cloned())
  }

  async fn count_documents(&self, collection: &str, filter: Document) -> anyhow::Result<u64> {
    self.record("count_documents", collection, Bson::Document(filter))?;
    Ok(self.count)
  }

  async fn estimated_document_count(&self, collection: &str) -> anyhow::Result<u64> {
    self.record("estimated_document_count", collection, Bson::Null)?;
    Ok(self.count)
  }

  async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> anyhow::Result<Vec<Document>> {
    let stages = pipeline.into_iter().map(Bson::Document).collect();
    self.record("aggregate", collection, Bson::Array(stages))?;
    Ok(vec![doc! { "meals": self.count as i64 }])
  }

  async fn distinct(&self, collection: &str, field: &str, _filter: Document) -> anyhow::Result<Vec<Bson>> {
    self.record("distinct", collection, Bson::String(field.to_string()))?;
    Ok(self.documents.iter().filter_map(|d| d.get(field).cloned()).collect())
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
