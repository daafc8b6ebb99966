//! Document Store Gateway
//!
//! The single long-lived handle to the document store. Every request selects
//! a database and collection by name and runs exactly one operation through
//! [`DocumentStore`].
//!
//! Database and collection names are taken verbatim from the caller; there is
//! no allowlist. Anything the configured credentials can reach is reachable
//! through this trait.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use thiserror::Error;

/// Database and collection addressed by one request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Identifier assigned to a single inserted document
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneSummary {
    pub inserted_id: Bson,
}

/// Identifiers assigned to inserted documents, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManySummary {
    pub inserted_ids: Vec<Bson>,
}

/// Matched/modified counts of an update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSummary {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

/// Deleted count of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted_count: u64,
}

/// Errors reported by a document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Data conversion error: {0}")]
    Conversion(String),
}

/// Document store abstraction.
///
/// Implementations must be safe to share across concurrently running
/// requests; [`MongoStore`] delegates pooling to the driver.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a query and materialize every matching document
    async fn find(&self, ns: &Namespace, filter: Document) -> Result<Vec<Document>, StoreError>;

    /// First matching document, if any
    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn insert_one(
        &self,
        ns: &Namespace,
        document: Document,
    ) -> Result<InsertOneSummary, StoreError>;

    async fn insert_many(
        &self,
        ns: &Namespace,
        documents: Vec<Document>,
    ) -> Result<InsertManySummary, StoreError>;

    async fn update_one(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateSummary, StoreError>;

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateSummary, StoreError>;

    async fn delete_one(&self, ns: &Namespace, filter: Document)
        -> Result<DeleteSummary, StoreError>;

    async fn delete_many(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<DeleteSummary, StoreError>;

    /// Reachability check
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release the underlying connection handle
    async fn close(&self) -> Result<(), StoreError>;
}

/// MongoDB specific error conversion
pub(crate) fn convert_mongodb_error(err: mongodb::error::Error) -> StoreError {
    use mongodb::error::ErrorKind;

    match err.kind.as_ref() {
        ErrorKind::Authentication { .. } => {
            StoreError::ConnectionFailed(format!("Authentication failed: {}", err))
        }
        ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::ConnectionFailed(format!("Connection pool cleared: {}", err))
        }
        ErrorKind::ServerSelection { .. } => {
            StoreError::ConnectionFailed(format!("Server selection failed: {}", err))
        }
        ErrorKind::Io(_) => StoreError::ConnectionFailed(format!("I/O error: {}", err)),
        ErrorKind::InvalidArgument { .. } => {
            StoreError::InvalidQuery(format!("Invalid argument: {}", err))
        }
        _ => StoreError::QueryFailed(err.to_string()),
    }
}
