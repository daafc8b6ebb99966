//! In-memory document store
//!
//! A process-local stand-in for MongoDB used to exercise the gateway without
//! a server. Filters match by equality on top-level fields; updates accept the
//! `$set` modifier only. Query operators are rejected rather than ignored so a
//! test never silently matches more than MongoDB would.

use super::{
    DeleteSummary, DocumentStore, InsertManySummary, InsertOneSummary, Namespace, StoreError,
    UpdateSummary,
};
use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Namespace, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection
    pub async fn count(&self, ns: &Namespace) -> usize {
        self.collections
            .read()
            .await
            .get(ns)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn check_filter(filter: &Document) -> Result<(), StoreError> {
    for (key, value) in filter {
        if key.starts_with('$') {
            return Err(StoreError::UnsupportedOperation(format!(
                "query operator {} is not supported by the in-memory store",
                key
            )));
        }
        if let Bson::Document(inner) = value {
            if let Some(op) = inner.keys().find(|k| k.starts_with('$')) {
                return Err(StoreError::UnsupportedOperation(format!(
                    "query operator {} is not supported by the in-memory store",
                    op
                )));
            }
        }
    }
    Ok(())
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| document.get(key) == Some(value))
}

/// Extract the `$set` fields from an update document
fn set_fields(update: &Document) -> Result<&Document, StoreError> {
    if let Some(key) = update.keys().find(|k| k.as_str() != "$set") {
        return Err(StoreError::UnsupportedOperation(format!(
            "update modifier {} is not supported by the in-memory store",
            key
        )));
    }
    update
        .get_document("$set")
        .map_err(|e| StoreError::InvalidQuery(format!("Invalid $set modifier: {}", e)))
}

/// Apply `$set` to one document, returning whether anything changed
fn apply_set(document: &mut Document, fields: &Document) -> Result<bool, StoreError> {
    if let Some(id) = fields.get("_id") {
        if document.get("_id") != Some(id) {
            return Err(StoreError::QueryFailed(
                "Performing an update on the path '_id' would modify the immutable field '_id'"
                    .to_string(),
            ));
        }
    }

    let mut modified = false;
    for (key, value) in fields {
        if document.get(key) != Some(value) {
            document.insert(key.clone(), value.clone());
            modified = true;
        }
    }
    Ok(modified)
}

/// Give the document an `_id` if it has none, keeping `_id` as the first field
fn assign_id(document: Document) -> (Bson, Document) {
    if let Some(id) = document.get("_id") {
        return (id.clone(), document);
    }

    let id = Bson::ObjectId(ObjectId::new());
    let mut with_id = Document::new();
    with_id.insert("_id", id.clone());
    with_id.extend(document);
    (id, with_id)
}

fn insert_into(documents: &mut Vec<Document>, document: Document) -> Result<Bson, StoreError> {
    let (id, document) = assign_id(document);
    if documents.iter().any(|d| d.get("_id") == Some(&id)) {
        return Err(StoreError::QueryFailed(format!(
            "E11000 duplicate key error: _id {}",
            id
        )));
    }
    documents.push(document);
    Ok(id)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, ns: &Namespace, filter: Document) -> Result<Vec<Document>, StoreError> {
        check_filter(&filter)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(ns)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        check_filter(&filter)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(ns)
            .and_then(|docs| docs.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn insert_one(
        &self,
        ns: &Namespace,
        document: Document,
    ) -> Result<InsertOneSummary, StoreError> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(ns.clone()).or_default();
        let inserted_id = insert_into(documents, document)?;
        Ok(InsertOneSummary { inserted_id })
    }

    async fn insert_many(
        &self,
        ns: &Namespace,
        documents: Vec<Document>,
    ) -> Result<InsertManySummary, StoreError> {
        if documents.is_empty() {
            return Err(StoreError::InvalidQuery(
                "must provide at least one element to insert".to_string(),
            ));
        }

        // Ordered insert: documents before the first failure stay inserted.
        let mut collections = self.collections.write().await;
        let existing = collections.entry(ns.clone()).or_default();
        let mut inserted_ids = Vec::with_capacity(documents.len());
        for document in documents {
            inserted_ids.push(insert_into(existing, document)?);
        }
        Ok(InsertManySummary { inserted_ids })
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateSummary, StoreError> {
        check_filter(&filter)?;
        let fields = set_fields(&update)?;

        let mut collections = self.collections.write().await;
        let mut summary = UpdateSummary {
            matched_count: 0,
            modified_count: 0,
            upserted_id: None,
        };
        if let Some(document) = collections
            .get_mut(ns)
            .and_then(|docs| docs.iter_mut().find(|d| matches(d, &filter)))
        {
            summary.matched_count = 1;
            if apply_set(document, fields)? {
                summary.modified_count = 1;
            }
        }
        Ok(summary)
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateSummary, StoreError> {
        check_filter(&filter)?;
        let fields = set_fields(&update)?;

        let mut collections = self.collections.write().await;
        let mut summary = UpdateSummary {
            matched_count: 0,
            modified_count: 0,
            upserted_id: None,
        };
        if let Some(documents) = collections.get_mut(ns) {
            for document in documents.iter_mut().filter(|d| matches(d, &filter)) {
                summary.matched_count += 1;
                if apply_set(document, fields)? {
                    summary.modified_count += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn delete_one(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<DeleteSummary, StoreError> {
        check_filter(&filter)?;
        let mut collections = self.collections.write().await;
        let mut deleted_count = 0;
        if let Some(documents) = collections.get_mut(ns) {
            if let Some(position) = documents.iter().position(|d| matches(d, &filter)) {
                documents.remove(position);
                deleted_count = 1;
            }
        }
        Ok(DeleteSummary { deleted_count })
    }

    async fn delete_many(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<DeleteSummary, StoreError> {
        check_filter(&filter)?;
        let mut collections = self.collections.write().await;
        let mut deleted_count = 0;
        if let Some(documents) = collections.get_mut(ns) {
            let before = documents.len();
            documents.retain(|d| !matches(d, &filter));
            deleted_count = (before - documents.len()) as u64;
        }
        Ok(DeleteSummary { deleted_count })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
