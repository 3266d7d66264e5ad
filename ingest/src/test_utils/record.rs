use serde_json::Value;

use crate::types::{JsonRow, Payload, Record};

/// Converts a JSON object literal into a row. Panics on anything else.
pub fn json_row(value: Value) -> JsonRow {
    match value {
        Value::Object(row) => row,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Builds a record with the given `data` payload.
pub fn record_with_data(uid: &str, data: Value) -> Record {
    let mut record = Record::new(uid);
    record.data = payload(data);
    record
}

/// Builds an article-like record with `title`, `author` and `viewCount` in its payload.
pub fn article(uid: &str, title: &str, author: &str, view_count: i64) -> Record {
    record_with_data(
        uid,
        serde_json::json!({
            "title": title,
            "author": author,
            "viewCount": view_count,
        }),
    )
}

/// Builds records that only carry a uid.
pub fn records(uids: &[&str]) -> Vec<Record> {
    uids.iter().map(|uid| Record::new(*uid)).collect()
}

pub fn uids(records: &[Record]) -> Vec<String> {
    records.iter().map(|record| record.uid().to_string()).collect()
}

fn payload(value: Value) -> Payload {
    match value {
        Value::Object(payload) => payload,
        Value::Null => Payload::new(),
        other => panic!("expected a JSON object payload, got {other}"),
    }
}
