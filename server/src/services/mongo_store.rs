// homebites/server/src/services/mongo_store.rs

//! `DocumentStore` over the official MongoDB driver.

use crate::errors::Result as AppResult;
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use homebites::executor::DocumentStore;
use homebites::CursorOptions;
use mongodb::{Client, Collection, Database};
use tracing::{info, instrument};

#[derive(Clone)]
pub struct MongoStore {
  db: Database,
}

impl MongoStore {
  /// Creates the client. The driver connects lazily; call [`MongoStore::ping`]
  /// to check the deployment is reachable.
  pub async fn connect(uri: &str, db_name: &str) -> AppResult<Self> {
    let client = Client::with_uri_str(uri).await?;
    Ok(Self {
      db: client.database(db_name),
    })
  }

  #[instrument(name = "MongoStore::ping", skip(self), fields(db = %self.db.name()))]
  pub async fn ping(&self) -> AppResult<()> {
    self.db.run_command(doc! { "ping": 1 }).await?;
    info!("Database ping succeeded.");
    Ok(())
  }

  pub async fn collection_names(&self) -> AppResult<Vec<String>> {
    Ok(self.db.list_collection_names().await?)
  }

  fn collection(&self, name: &str) -> Collection<Document> {
    self.db.collection::<Document>(name)
  }
}

#[async_trait]
impl DocumentStore for MongoStore {
  async fn find(&self, collection: &str, filter: Document, options: CursorOptions) -> anyhow::Result<Vec<Document>> {
    let coll = self.collection(collection);
    let mut action = coll.find(filter);
    if let Some(projection) = options.projection {
      action = action.projection(projection);
    }
    if let Some(sort) = options.sort {
      action = action.sort(sort);
    }
    if let Some(skip) = options.skip {
      action = action.skip(skip);
    }
    if let Some(limit) = options.limit {
      action = action.limit(limit);
    }
    let cursor = action.await?;
    Ok(cursor.try_collect().await?)
  }

  async fn find_one(
    &self,
    collection: &str,
    filter: Document,
    projection: Option<Document>,
  ) -> anyhow::Result<Option<Document>> {
    let coll = self.collection(collection);
    let mut action = coll.find_one(filter);
    if let Some(projection) = projection {
      action = action.projection(projection);
    }
    Ok(action.await?)
  }

  async fn count_documents(&self, collection: &str, filter: Document) -> anyhow::Result<u64> {
    Ok(self.collection(collection).count_documents(filter).await?)
  }

  async fn estimated_document_count(&self, collection: &str) -> anyhow::Result<u64> {
    Ok(self.collection(collection).estimated_document_count().await?)
  }

  async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> anyhow::Result<Vec<Document>> {
    let cursor = self.collection(collection).aggregate(pipeline).await?;
    Ok(cursor.try_collect().await?)
  }

  async fn distinct(&self, collection: &str, field: &str, filter: Document) -> anyhow::Result<Vec<Bson>> {
    Ok(self.collection(collection).distinct(field, filter).await?)
  }
}
