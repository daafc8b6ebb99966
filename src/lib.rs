//! # mongo-gateway
//!
//! HTTP-to-MongoDB gateway. REST endpoints accept a JSON body naming a
//! database, a collection and a filter/update/document, forward it to
//! MongoDB's native query API, and answer with a uniform
//! `{code, message, data}` envelope.
//!
//! ## Wire format
//!
//! The numeric codes are the historical ones (100200, 100100, 100500,
//! 100501, 100508, 100518), but the payloads are not byte-compatible with
//! older clients of this API:
//!
//! - `message` is English text (`"operation succeeded"`, ...).
//! - Result objects use camelCase keys: `insertedId`, `insertedIds`,
//!   `matchedCount`, `modifiedCount`, `upsertedId`, `deletedCount`.
//!   There is no `upsertedCount`; updates never upsert.
//! - Object ids are 24-character hex strings, not `{"$oid": ..}`.
//! - Failures carry `data: null`.
//!
//! Clients matching on the old `MatchedCount`/`InsertedID` field names or on
//! message text must be updated.
//!
//! ## Security
//!
//! Filters and updates are passed to MongoDB verbatim and database/collection
//! names are not restricted. Any caller gets full read/write query power over
//! every database the configured credentials can reach. Production use needs
//! an authorization layer and a query-shape allowlist in front of this crate.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http_server;
pub mod logging;
pub mod store;

pub use error::{Error, Result};
pub use gateway::{Envelope, Gateway, OperationKind, Outcome};
pub use store::{DocumentStore, MemoryStore, MongoStore, Namespace};
