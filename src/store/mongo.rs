//! MongoDB store implementation
//!
//! Provides the process-wide MongoDB client using the official mongodb driver

use super::{
    convert_mongodb_error, DeleteSummary, DocumentStore, InsertManySummary, InsertOneSummary,
    Namespace, StoreError, UpdateSummary,
};
use crate::config::MongoConfig;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::ClientOptions,
    results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
    Client, Collection,
};
use std::time::Duration;
use tracing::{debug, info};

/// MongoDB store backed by one pooled client
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Connect and verify reachability.
    ///
    /// Fails if the URI cannot be parsed, the client cannot be built or the
    /// initial `ping` does not succeed.
    pub async fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let mut client_options = ClientOptions::parse(&config.url)
            .await
            .map_err(convert_mongodb_error)?;

        // Apply pool options
        client_options.min_pool_size = Some(config.min_pool_size);
        client_options.max_pool_size = Some(config.max_pool_size);
        client_options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
        client_options.server_selection_timeout =
            Some(Duration::from_secs(config.server_selection_timeout_secs));

        if let Some(ref app_name) = config.app_name {
            client_options.app_name = Some(app_name.clone());
        }

        let client = Client::with_options(client_options).map_err(convert_mongodb_error)?;
        let store = Self { client };

        store.ping().await?;

        info!(
            min_pool_size = config.min_pool_size,
            max_pool_size = config.max_pool_size,
            "MongoDB connection established"
        );

        Ok(store)
    }

    /// Get reference to MongoDB client
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, ns: &Namespace) -> Collection<Document> {
        self.client
            .database(&ns.database)
            .collection::<Document>(&ns.collection)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(&self, ns: &Namespace, filter: Document) -> Result<Vec<Document>, StoreError> {
        debug!(namespace = %ns, "find");
        let cursor = self
            .collection(ns)
            .find(filter)
            .await
            .map_err(convert_mongodb_error)?;

        cursor.try_collect().await.map_err(convert_mongodb_error)
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        debug!(namespace = %ns, "find_one");
        self.collection(ns)
            .find_one(filter)
            .await
            .map_err(convert_mongodb_error)
    }

    async fn insert_one(
        &self,
        ns: &Namespace,
        document: Document,
    ) -> Result<InsertOneSummary, StoreError> {
        debug!(namespace = %ns, "insert_one");
        self.collection(ns)
            .insert_one(document)
            .await
            .map(InsertOneSummary::from)
            .map_err(convert_mongodb_error)
    }

    async fn insert_many(
        &self,
        ns: &Namespace,
        documents: Vec<Document>,
    ) -> Result<InsertManySummary, StoreError> {
        debug!(namespace = %ns, count = documents.len(), "insert_many");
        self.collection(ns)
            .insert_many(documents)
            .await
            .map(InsertManySummary::from)
            .map_err(convert_mongodb_error)
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateSummary, StoreError> {
        debug!(namespace = %ns, "update_one");
        self.collection(ns)
            .update_one(filter, update)
            .await
            .map(UpdateSummary::from)
            .map_err(convert_mongodb_error)
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateSummary, StoreError> {
        debug!(namespace = %ns, "update_many");
        self.collection(ns)
            .update_many(filter, update)
            .await
            .map(UpdateSummary::from)
            .map_err(convert_mongodb_error)
    }

    async fn delete_one(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<DeleteSummary, StoreError> {
        debug!(namespace = %ns, "delete_one");
        self.collection(ns)
            .delete_one(filter)
            .await
            .map(DeleteSummary::from)
            .map_err(convert_mongodb_error)
    }

    async fn delete_many(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<DeleteSummary, StoreError> {
        debug!(namespace = %ns, "delete_many");
        self.collection(ns)
            .delete_many(filter)
            .await
            .map(DeleteSummary::from)
            .map_err(convert_mongodb_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(convert_mongodb_error)?;

        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        // Shutting down any clone closes the shared pool.
        self.client.clone().shutdown().await;
        info!("MongoDB connection closed");
        Ok(())
    }
}

impl From<InsertOneResult> for InsertOneSummary {
    fn from(result: InsertOneResult) -> Self {
        Self {
            inserted_id: result.inserted_id,
        }
    }
}

impl From<InsertManyResult> for InsertManySummary {
    fn from(result: InsertManyResult) -> Self {
        let mut ids: Vec<_> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);

        Self {
            inserted_ids: ids.into_iter().map(|(_, id)| id).collect(),
        }
    }
}

impl From<UpdateResult> for UpdateSummary {
    fn from(result: UpdateResult) -> Self {
        Self {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        }
    }
}

impl From<DeleteResult> for DeleteSummary {
    fn from(result: DeleteResult) -> Self {
        Self {
            deleted_count: result.deleted_count,
        }
    }
}
