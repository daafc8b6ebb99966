//! Store results → JSON payloads
//!
//! Documents are rendered as relaxed extended JSON, except object ids which
//! become their 24-character hex string. An id returned by an insert can be
//! passed straight to the by-id routes.

use mongodb::bson::{Bson, Document};
use serde_json::{json, Map, Value};

use crate::store::{DeleteSummary, InsertManySummary, InsertOneSummary, UpdateSummary};

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Document(document) => document_to_json(document),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

pub fn document_to_json(document: Document) -> Value {
    Value::Object(
        document
            .into_iter()
            .map(|(key, value)| (key, bson_to_json(value)))
            .collect::<Map<String, Value>>(),
    )
}

/// `{items, total}` for find-many
pub fn find_result(documents: Vec<Document>) -> Value {
    let total = documents.len();
    let items: Vec<Value> = documents.into_iter().map(document_to_json).collect();
    json!({ "items": items, "total": total })
}

pub fn insert_one_result(summary: InsertOneSummary) -> Value {
    json!({ "insertedId": bson_to_json(summary.inserted_id) })
}

pub fn insert_many_result(summary: InsertManySummary) -> Value {
    let ids: Vec<Value> = summary.inserted_ids.into_iter().map(bson_to_json).collect();
    json!({ "insertedIds": ids })
}

pub fn update_result(summary: UpdateSummary) -> Value {
    json!({
        "matchedCount": summary.matched_count,
        "modifiedCount": summary.modified_count,
        "upsertedId": summary.upserted_id.map(bson_to_json),
    })
}

pub fn delete_result(summary: DeleteSummary) -> Value {
    json!({ "deletedCount": summary.deleted_count })
}
