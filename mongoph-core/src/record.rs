//! Record representation, stamping and normalization.
//!
//! A [`Record`] is a plain BSON document. Records created through the store
//! carry four stamped fields: `id`, the configured reference key, `created_at`
//! and `updated_at`. Before a record leaves the store its datetime fields are
//! rewritten by [`normalize`] into `YYYY-MM-DDTHH:MM:SS` strings.

use bson::{Bson, DateTime, Document};
use uuid::Uuid;

use crate::error::MongophResult;

/// A persisted mapping of field names to values.
pub type Record = Document;

/// Sequence identifier field.
pub const ID_FIELD: &str = "id";
/// Creation timestamp field.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Last update timestamp field.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Format used for normalized datetimes (second precision, no offset).
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Mints a fresh reference key token.
pub fn new_reference_key() -> String {
    Uuid::new_v4().to_string()
}

/// Stamps a record about to be inserted and returns its reference key.
pub(crate) fn stamp_new(record: &mut Record, id: i64, reference_key_field: &str, now: DateTime) -> String {
    let reference_key = new_reference_key();

    record.insert(CREATED_AT_FIELD, now);
    record.insert(UPDATED_AT_FIELD, now);
    record.insert(ID_FIELD, id);
    record.insert(reference_key_field, reference_key.clone());

    reference_key
}

/// Formats a BSON datetime the way normalized records carry it.
pub fn format_datetime(value: &DateTime) -> String {
    value.to_chrono().format(DATETIME_FORMAT).to_string()
}

/// Rewrites every top-level datetime value of `record` in place.
///
/// Values of any other type, including datetimes nested in sub-documents or
/// arrays, are left as they are.
pub fn normalize(record: &mut Record) -> &mut Record {
    for (_, value) in record.iter_mut() {
        if let Bson::DateTime(datetime) = value {
            *value = Bson::String(format_datetime(datetime));
        }
    }

    record
}

/// Normalizes an optional record; `None` stays `None`.
pub fn normalized(record: Option<Record>) -> Option<Record> {
    record.map(|mut record| {
        normalize(&mut record);
        record
    })
}

/// Converts a JSON object into a record.
pub fn from_json(value: serde_json::Value) -> MongophResult<Record> {
    Ok(serde_json::from_value(value)?)
}

/// Converts a record into a JSON value (relaxed extended JSON for BSON-only types).
pub fn to_json(record: &Record) -> MongophResult<serde_json::Value> {
    Ok(serde_json::to_value(record)?)
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn normalize_formats_datetimes_to_seconds() {
        let at = DateTime::from_millis(1_700_000_000_123);
        let mut record = doc! { "name": "a", "created_at": at, "nested": { "at": at } };

        normalize(&mut record);

        assert_eq!(record.get_str("created_at").unwrap(), "2023-11-14T22:13:20");
        assert_eq!(record.get_str("name").unwrap(), "a");
        assert!(matches!(record.get_document("nested").unwrap().get("at"), Some(Bson::DateTime(_))));
    }

    #[test]
    fn normalized_passes_none_through() {
        assert_eq!(normalized(None), None);
    }

    #[test]
    fn stamp_new_sets_consistent_fields() {
        let now = DateTime::now();
        let mut record = doc! { "name": "a" };

        let key = stamp_new(&mut record, 7, "record_id", now);

        assert_eq!(record.get("id"), Some(&Bson::Int64(7)));
        assert_eq!(record.get_str("record_id").unwrap(), key);
        assert_eq!(record.get("created_at"), record.get("updated_at"));
        assert!(Uuid::parse_str(&key).is_ok());
    }

    #[test]
    fn json_round_trip_keeps_plain_fields() {
        let record = from_json(serde_json::json!({ "name": "a", "tags": ["x"] })).unwrap();

        assert_eq!(record.get_str("name").unwrap(), "a");
        assert_eq!(to_json(&record).unwrap()["tags"][0], "x");
    }
}
