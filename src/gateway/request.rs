//! Operation request decoding
//!
//! Turns a raw request body into a [`Namespace`] and a validated
//! [`Operation`]. Nothing here talks to the store: a body that fails any check
//! is rejected before a collection handle is even selected.
//!
//! Filter and update values are forwarded as-is. Query operators such as
//! `$where` or `$regex` are not inspected; whoever can reach the gateway can
//! run any query the configured credentials allow.

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;

use super::envelope::Outcome;
use crate::store::Namespace;

/// Reasons a request body is rejected as malformed
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Field `{0}` must be a non-empty string")]
    EmptyName(&'static str),

    #[error("Invalid object id {id:?}: {message}")]
    InvalidObjectId { id: String, message: String },

    #[error("Field `{field}` must be a JSON object, found {found}")]
    NotADocument {
        field: &'static str,
        found: &'static str,
    },

    #[error("Field `{field}` must be a JSON array, found {found}")]
    NotAnArray {
        field: &'static str,
        found: &'static str,
    },

    #[error("Field `{field}` is not valid extended JSON: {message}")]
    Conversion {
        field: &'static str,
        message: String,
    },
}

/// One variant per route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Update-by-id served on the legacy `cs` route
    RawUpdate,
    Find,
    FindOne,
    InsertMany,
    InsertOne,
    UpdateById,
    UpdateOne,
    UpdateMany,
    DeleteById,
    DeleteMany,
}

/// A validated store command
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Find { filter: Document },
    FindOne { filter: Document },
    InsertOne { document: Document },
    InsertMany { documents: Vec<Document> },
    UpdateOne { filter: Document, update: Document },
    UpdateMany { filter: Document, update: Document },
    DeleteOne { filter: Document },
    DeleteMany { filter: Document },
}

#[derive(Deserialize)]
struct FilterParams {
    database: String,
    collection: String,
    filter: Value,
}

#[derive(Deserialize)]
struct FilterUpdateParams {
    database: String,
    collection: String,
    filter: Value,
    update: Value,
}

#[derive(Deserialize)]
struct IdParams {
    database: String,
    collection: String,
    id: String,
}

#[derive(Deserialize)]
struct IdUpdateParams {
    database: String,
    collection: String,
    id: String,
    update: Value,
}

#[derive(Deserialize)]
struct InsertParams {
    database: String,
    collection: String,
    data: Value,
}

impl OperationKind {
    pub const ALL: [OperationKind; 10] = [
        OperationKind::RawUpdate,
        OperationKind::Find,
        OperationKind::FindOne,
        OperationKind::InsertMany,
        OperationKind::InsertOne,
        OperationKind::UpdateById,
        OperationKind::UpdateOne,
        OperationKind::UpdateMany,
        OperationKind::DeleteById,
        OperationKind::DeleteMany,
    ];

    /// Route segment under `/api/v1/mongodb/`
    pub const fn path(self) -> &'static str {
        match self {
            OperationKind::RawUpdate => "cs",
            OperationKind::Find => "find",
            OperationKind::FindOne => "fineOne",
            OperationKind::InsertMany => "installMany",
            OperationKind::InsertOne => "installOne",
            OperationKind::UpdateById => "updateById",
            OperationKind::UpdateOne => "updateOne",
            OperationKind::UpdateMany => "updateMany",
            OperationKind::DeleteById => "deleteById",
            OperationKind::DeleteMany => "deleteMany",
        }
    }

    /// Correctly spelled alias for the historical route names
    pub const fn alias(self) -> Option<&'static str> {
        match self {
            OperationKind::FindOne => Some("findOne"),
            OperationKind::InsertMany => Some("insertMany"),
            OperationKind::InsertOne => Some("insertOne"),
            _ => None,
        }
    }

    /// Outcome reported when the store rejects the operation
    pub const fn store_failure(self) -> Outcome {
        match self {
            OperationKind::Find | OperationKind::FindOne => Outcome::Failed,
            OperationKind::InsertMany | OperationKind::InsertOne => Outcome::InsertFailed,
            OperationKind::RawUpdate
            | OperationKind::UpdateById
            | OperationKind::UpdateOne
            | OperationKind::UpdateMany
            | OperationKind::DeleteById
            | OperationKind::DeleteMany => Outcome::UpdateFailed,
        }
    }

    /// Decode and validate a request body for this operation
    pub fn decode(self, body: &[u8]) -> Result<(Namespace, Operation), RequestError> {
        match self {
            OperationKind::Find | OperationKind::FindOne | OperationKind::DeleteMany => {
                let params: FilterParams = parse_body(body)?;
                let ns = namespace(params.database, params.collection)?;
                let filter = check_filter_data(params.filter, "filter")?;
                let operation = match self {
                    OperationKind::Find => Operation::Find { filter },
                    OperationKind::FindOne => Operation::FindOne { filter },
                    _ => Operation::DeleteMany { filter },
                };
                Ok((ns, operation))
            }
            OperationKind::UpdateOne | OperationKind::UpdateMany => {
                let params: FilterUpdateParams = parse_body(body)?;
                let ns = namespace(params.database, params.collection)?;
                let filter = check_filter_data(params.filter, "filter")?;
                let update = set_modifier(params.update)?;
                let operation = if self == OperationKind::UpdateOne {
                    Operation::UpdateOne { filter, update }
                } else {
                    Operation::UpdateMany { filter, update }
                };
                Ok((ns, operation))
            }
            OperationKind::RawUpdate | OperationKind::UpdateById => {
                let params: IdUpdateParams = parse_body(body)?;
                let ns = namespace(params.database, params.collection)?;
                let filter = id_filter(&params.id)?;
                let update = set_modifier(params.update)?;
                Ok((ns, Operation::UpdateOne { filter, update }))
            }
            OperationKind::DeleteById => {
                let params: IdParams = parse_body(body)?;
                let ns = namespace(params.database, params.collection)?;
                let filter = id_filter(&params.id)?;
                Ok((ns, Operation::DeleteOne { filter }))
            }
            OperationKind::InsertOne => {
                let params: InsertParams = parse_body(body)?;
                let ns = namespace(params.database, params.collection)?;
                let document = check_filter_data(params.data, "data")?;
                Ok((ns, Operation::InsertOne { document }))
            }
            OperationKind::InsertMany => {
                let params: InsertParams = parse_body(body)?;
                let ns = namespace(params.database, params.collection)?;
                let items = match params.data {
                    Value::Array(items) => items,
                    other => {
                        return Err(RequestError::NotAnArray {
                            field: "data",
                            found: json_type(&other),
                        })
                    }
                };
                let documents = items
                    .into_iter()
                    .map(|item| check_filter_data(item, "data"))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((ns, Operation::InsertMany { documents }))
            }
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RequestError> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(RequestError::NotADocument {
            field: "body",
            found: json_type(&value),
        });
    }
    Ok(serde_json::from_value(value)?)
}

fn namespace(database: String, collection: String) -> Result<Namespace, RequestError> {
    if database.is_empty() {
        return Err(RequestError::EmptyName("database"));
    }
    if collection.is_empty() {
        return Err(RequestError::EmptyName("collection"));
    }
    Ok(Namespace::new(database, collection))
}

/// Parse a 24-character hexadecimal object identifier
pub fn parse_object_id(id: &str) -> Result<ObjectId, RequestError> {
    ObjectId::parse_str(id).map_err(|e| RequestError::InvalidObjectId {
        id: id.to_string(),
        message: e.to_string(),
    })
}

fn id_filter(id: &str) -> Result<Document, RequestError> {
    let oid = parse_object_id(id)?;
    Ok(doc! { "_id": oid })
}

/// Accept exactly a JSON object and convert it to an ordered BSON document.
///
/// Values are converted with extended JSON rules (`{"$oid": ..}`,
/// `{"$date": ..}`) and otherwise passed through untouched.
pub fn check_filter_data(value: Value, field: &'static str) -> Result<Document, RequestError> {
    if !value.is_object() {
        return Err(RequestError::NotADocument {
            field,
            found: json_type(&value),
        });
    }

    match Bson::try_from(value) {
        Ok(Bson::Document(document)) => Ok(document),
        // an object such as {"$oid": ".."} collapses into a scalar
        Ok(other) => Err(RequestError::NotADocument {
            field,
            found: bson_type(&other),
        }),
        Err(e) => Err(RequestError::Conversion {
            field,
            message: e.to_string(),
        }),
    }
}

/// Wrap an update mapping as `{"$set": update}`
fn set_modifier(update: Value) -> Result<Document, RequestError> {
    let fields = check_filter_data(update, "update")?;
    Ok(doc! { "$set": fields })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn bson_type(value: &Bson) -> &'static str {
    match value {
        Bson::ObjectId(_) => "object id",
        Bson::DateTime(_) => "date",
        Bson::Binary(_) => "binary",
        Bson::Decimal128(_) => "decimal",
        Bson::Int64(_) | Bson::Int32(_) | Bson::Double(_) => "number",
        _ => "extended JSON value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_parse_object_id() {
        let oid = parse_object_id("65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(oid.to_hex(), "65a1b2c3d4e5f60718293a4b");

        // upper case hex is still hex
        assert!(parse_object_id("65A1B2C3D4E5F60718293A4B").is_ok());

        for bad in [
            "",
            "65a1b2c3d4e5f60718293a4",
            "65a1b2c3d4e5f60718293a4b0",
            "65a1b2c3d4e5f60718293a4g",
            "not-an-object-id-at-all!",
        ] {
            assert!(
                matches!(parse_object_id(bad), Err(RequestError::InvalidObjectId { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_check_filter_data_accepts_objects_only() {
        let filter = check_filter_data(json!({"name": "a", "age": {"$gt": 3}}), "filter").unwrap();
        assert_eq!(filter.get_str("name").unwrap(), "a");
        // operators are forwarded untouched
        assert_eq!(
            filter.get_document("age").unwrap(),
            &doc! { "$gt": 3 }
        );

        assert!(check_filter_data(json!({}), "filter").unwrap().is_empty());

        for bad in [json!([1, 2]), json!("x"), json!(3), json!(true), Value::Null] {
            assert!(matches!(
                check_filter_data(bad, "filter"),
                Err(RequestError::NotADocument { field: "filter", .. })
            ));
        }
    }

    #[test]
    fn test_check_filter_data_extended_json() {
        let filter = check_filter_data(
            json!({"_id": {"$oid": "65a1b2c3d4e5f60718293a4b"}}),
            "filter",
        )
        .unwrap();
        assert!(filter.get_object_id("_id").is_ok());

        // a bare extended JSON scalar is not a mapping
        assert!(check_filter_data(json!({"$oid": "65a1b2c3d4e5f60718293a4b"}), "filter").is_err());
    }

    #[test]
    fn test_decode_find() {
        let (ns, op) = OperationKind::Find
            .decode(&body(json!({"database": "d", "collection": "c", "filter": {"k": 1}})))
            .unwrap();
        assert_eq!(ns, Namespace::new("d", "c"));
        assert_eq!(op, Operation::Find { filter: doc! { "k": 1 } });
    }

    #[test]
    fn test_decode_update_by_id_wraps_set() {
        let (_, op) = OperationKind::UpdateById
            .decode(&body(json!({
                "database": "d",
                "collection": "c",
                "id": "65a1b2c3d4e5f60718293a4b",
                "update": {"name": "b"},
                "options": {"upsert": true}
            })))
            .unwrap();

        let oid = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(
            op,
            Operation::UpdateOne {
                filter: doc! { "_id": oid },
                update: doc! { "$set": { "name": "b" } },
            }
        );
    }

    #[test]
    fn test_decode_raw_update_matches_update_by_id() {
        let request = body(json!({
            "database": "d",
            "collection": "c",
            "id": "65a1b2c3d4e5f60718293a4b",
            "update": {"n": 1}
        }));
        assert_eq!(
            OperationKind::RawUpdate.decode(&request).unwrap(),
            OperationKind::UpdateById.decode(&request).unwrap()
        );
    }

    #[test]
    fn test_decode_insert_many() {
        let (_, op) = OperationKind::InsertMany
            .decode(&body(json!({
                "database": "d",
                "collection": "c",
                "data": [{"a": 1}, {"a": 2}]
            })))
            .unwrap();
        assert_eq!(
            op,
            Operation::InsertMany {
                documents: vec![doc! { "a": 1 }, doc! { "a": 2 }]
            }
        );

        let err = OperationKind::InsertMany
            .decode(&body(json!({
                "database": "d",
                "collection": "c",
                "data": [{"a": 1}, 2]
            })))
            .unwrap_err();
        assert!(matches!(err, RequestError::NotADocument { field: "data", .. }));

        let err = OperationKind::InsertMany
            .decode(&body(json!({"database": "d", "collection": "c", "data": {"a": 1}})))
            .unwrap_err();
        assert!(matches!(err, RequestError::NotAnArray { .. }));
    }

    #[test]
    fn test_decode_rejects_missing_or_empty_names() {
        let err = OperationKind::Find
            .decode(&body(json!({"collection": "c", "filter": {}})))
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidBody(_)));

        let err = OperationKind::Find
            .decode(&body(json!({"database": "", "collection": "c", "filter": {}})))
            .unwrap_err();
        assert!(matches!(err, RequestError::EmptyName("database")));

        let err = OperationKind::DeleteById
            .decode(&body(json!({"database": "d", "collection": "", "id": "x"})))
            .unwrap_err();
        assert!(matches!(err, RequestError::EmptyName("collection")));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        for kind in OperationKind::ALL {
            assert!(matches!(
                kind.decode(b"{not json"),
                Err(RequestError::InvalidBody(_))
            ));
            assert!(kind.decode(b"").is_err());
            assert!(matches!(
                kind.decode(br#"["d", "c", {}]"#),
                Err(RequestError::NotADocument { field: "body", .. })
            ));
        }
    }

    #[test]
    fn test_update_must_be_object() {
        let err = OperationKind::UpdateOne
            .decode(&body(json!({
                "database": "d",
                "collection": "c",
                "filter": {},
                "update": [1]
            })))
            .unwrap_err();
        assert!(matches!(err, RequestError::NotADocument { field: "update", .. }));
    }

    #[test]
    fn test_store_failure_table() {
        assert_eq!(OperationKind::Find.store_failure(), Outcome::Failed);
        assert_eq!(OperationKind::InsertOne.store_failure(), Outcome::InsertFailed);
        assert_eq!(OperationKind::DeleteById.store_failure(), Outcome::UpdateFailed);
        assert_eq!(OperationKind::UpdateMany.store_failure(), Outcome::UpdateFailed);
    }
}
