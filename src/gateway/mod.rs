//! Request/Response Translator
//!
//! [`Gateway::handle`] is the only entry point: decode the body, run one store
//! operation, map the result (or the error) onto an [`Envelope`]. Errors never
//! escape it.

pub mod envelope;
pub mod render;
pub mod request;

pub use envelope::{Envelope, Outcome};
pub use request::{check_filter_data, parse_object_id, Operation, OperationKind, RequestError};

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::store::{DocumentStore, Namespace, StoreError};

/// Why a request did not produce a success envelope
#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no matching document")]
    NotFound,
}

/// Translator between HTTP bodies and the document store
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn DocumentStore>,
}

impl Gateway {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Handle one request body for the given operation
    pub async fn handle(&self, kind: OperationKind, body: &[u8]) -> Envelope {
        match self.run(kind, body).await {
            Ok(data) => Envelope::success(data),
            Err(Failure::Request(e)) => {
                warn!(operation = %kind, error = %e, "Rejected malformed request");
                Envelope::failure(Outcome::MalformedParameters)
            }
            Err(Failure::NotFound) => {
                debug!(operation = %kind, "No matching document");
                Envelope::failure(Outcome::NotFound)
            }
            Err(Failure::Store(e)) => {
                error!(operation = %kind, error = %e, "Store operation failed");
                Envelope::failure(kind.store_failure())
            }
        }
    }

    async fn run(&self, kind: OperationKind, body: &[u8]) -> Result<Value, Failure> {
        let (ns, operation) = kind.decode(body)?;
        debug!(operation = %kind, namespace = %ns, "Dispatching to store");
        self.execute(&ns, operation).await
    }

    /// Run one validated operation against the store
    async fn execute(&self, ns: &Namespace, operation: Operation) -> Result<Value, Failure> {
        let store = self.store.as_ref();

        let data = match operation {
            Operation::Find { filter } => render::find_result(store.find(ns, filter).await?),
            Operation::FindOne { filter } => store
                .find_one(ns, filter)
                .await?
                .map(render::document_to_json)
                .ok_or(Failure::NotFound)?,
            Operation::InsertOne { document } => {
                render::insert_one_result(store.insert_one(ns, document).await?)
            }
            Operation::InsertMany { documents } => {
                render::insert_many_result(store.insert_many(ns, documents).await?)
            }
            Operation::UpdateOne { filter, update } => {
                render::update_result(store.update_one(ns, filter, update).await?)
            }
            Operation::UpdateMany { filter, update } => {
                render::update_result(store.update_many(ns, filter, update).await?)
            }
            Operation::DeleteOne { filter } => {
                render::delete_result(store.delete_one(ns, filter).await?)
            }
            Operation::DeleteMany { filter } => {
                render::delete_result(store.delete_many(ns, filter).await?)
            }
        };

        Ok(data)
    }
}
