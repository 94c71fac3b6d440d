// homebites/src/executor.rs

//! The Query Executor: runs an [`ApprovedQuery`] against a [`DocumentStore`]
//! and normalizes the result.
//!
//! There is no string evaluation here. Each read operation maps onto one
//! trait method, so the store can only ever be asked to read.

use crate::gate::ApprovedQuery;
use crate::query::{CursorOptions, ReadOperation};
use async_trait::async_trait;
use bson::{Bson, Document};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{event, instrument, Level};

/// Read access to the HomeBites database.
///
/// Cursors are returned fully materialized.
#[async_trait]
pub trait DocumentStore: Send + Sync {
  async fn find(&self, collection: &str, filter: Document, options: CursorOptions) -> anyhow::Result<Vec<Document>>;

  async fn find_one(
    &self,
    collection: &str,
    filter: Document,
    projection: Option<Document>,
  ) -> anyhow::Result<Option<Document>>;

  async fn count_documents(&self, collection: &str, filter: Document) -> anyhow::Result<u64>;

  async fn estimated_document_count(&self, collection: &str) -> anyhow::Result<u64>;

  async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> anyhow::Result<Vec<Document>>;

  async fn distinct(&self, collection: &str, field: &str, filter: Document) -> anyhow::Result<Vec<Bson>>;
}

/// Normalized result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
  Documents(Vec<Document>),
  Document(Option<Document>),
  Count(u64),
  Values(Vec<Bson>),
}

impl QueryOutput {
  /// Response text: relaxed extended JSON, a bare number for counts, `null`
  /// when `findOne` matched nothing.
  pub fn render(&self) -> String {
    let value = match self {
      QueryOutput::Documents(docs) => Bson::Array(docs.iter().cloned().map(Bson::Document).collect()),
      QueryOutput::Document(Some(doc)) => Bson::Document(doc.clone()),
      QueryOutput::Document(None) => return "null".to_string(),
      QueryOutput::Count(n) => return n.to_string(),
      QueryOutput::Values(values) => Bson::Array(values.clone()),
    };
    value.into_relaxed_extjson().to_string()
  }
}

/// A store failure while running an approved query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error executing query: {message}")]
pub struct ExecutionError {
  pub message: String,
}

impl ExecutionError {
  fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

#[derive(Clone)]
pub struct Executor {
  store: Arc<dyn DocumentStore>,
}

impl Executor {
  pub fn new(store: Arc<dyn DocumentStore>) -> Self {
    Self { store }
  }

  /// Runs `approved` and normalizes its result. Store errors and store panics
  /// both come back as `ExecutionError`.
  #[instrument(
    name = "Executor::execute",
    skip_all,
    fields(
      collection = %approved.query().collection,
      operation = approved.query().operation.method_name(),
    )
  )]
  pub async fn execute(&self, approved: &ApprovedQuery) -> Result<QueryOutput, ExecutionError> {
    let query = approved.query();
    let fut = self.dispatch(&query.collection, query.operation.clone());
    match AssertUnwindSafe(fut).catch_unwind().await {
      Ok(Ok(output)) => {
        event!(Level::DEBUG, "Query executed.");
        Ok(output)
      }
      Ok(Err(e)) => {
        event!(Level::ERROR, error = %e, "Query execution failed.");
        Err(ExecutionError::new(format!("{:#}", e)))
      }
      Err(_) => {
        event!(Level::ERROR, "Document store panicked while executing query.");
        Err(ExecutionError::new("the document store failed unexpectedly"))
      }
    }
  }

  async fn dispatch(&self, collection: &str, operation: ReadOperation) -> anyhow::Result<QueryOutput> {
    let store = &self.store;
    Ok(match operation {
      ReadOperation::Find { filter, options } => QueryOutput::Documents(store.find(collection, filter, options).await?),
      ReadOperation::FindOne { filter, projection } => {
        QueryOutput::Document(store.find_one(collection, filter, projection).await?)
      }
      ReadOperation::CountDocuments { filter } => QueryOutput::Count(store.count_documents(collection, filter).await?),
      ReadOperation::EstimatedDocumentCount => QueryOutput::Count(store.estimated_document_count(collection).await?),
      ReadOperation::Aggregate { pipeline } => QueryOutput::Documents(store.aggregate(collection, pipeline).await?),
      ReadOperation::Distinct { field, filter } => {
        QueryOutput::Values(store.distinct(collection, &field, filter).await?)
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bson::doc;

  #[test]
  fn render_uses_relaxed_extended_json() {
    let output = QueryOutput::Documents(vec![doc! { "name": "Lasagna", "price": 12.5, "quantity": 3 }]);
    assert_eq!(output.render(), r#"[{"name":"Lasagna","price":12.5,"quantity":3}]"#);
  }

  #[test]
  fn render_scalars() {
    assert_eq!(QueryOutput::Count(7).render(), "7");
    assert_eq!(QueryOutput::Document(None).render(), "null");
    assert_eq!(
      QueryOutput::Values(vec![Bson::String("Italian".into()), Bson::String("Thai".into())]).render(),
      r#"["Italian","Thai"]"#
    );
  }
}
