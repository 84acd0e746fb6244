//! Inclusion and exclusion projections over top-level fields.

use bson::{Bson, Document};

const ID: &str = "_id";

fn is_included(flag: &Bson) -> bool {
    match flag {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

/// Shapes `record` according to `projection`.
///
/// An empty projection returns the whole record. `_id` is kept unless it is
/// explicitly excluded. Mixing inclusions and exclusions of other fields is an
/// error.
pub(crate) fn project(record: &Document, projection: &Document) -> Result<Document, String> {
    if projection.is_empty() {
        return Ok(record.clone());
    }

    let keep_id = projection.get(ID).map(is_included).unwrap_or(true);
    let (included, excluded): (Vec<_>, Vec<_>) = projection
        .iter()
        .filter(|(field, _)| field.as_str() != ID)
        .partition(|(_, flag)| is_included(flag));

    if !included.is_empty() && !excluded.is_empty() {
        return Err("cannot mix inclusion and exclusion in a projection".to_string());
    }

    let mut shaped = Document::new();

    for (field, value) in record {
        let keep = if field == ID {
            keep_id
        } else if included.is_empty() {
            !excluded.iter().any(|(name, _)| *name == field)
        } else {
            included.iter().any(|(name, _)| *name == field)
        };

        if keep {
            shaped.insert(field.clone(), value.clone());
        }
    }

    Ok(shaped)
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn inclusion_keeps_listed_fields_and_id() {
        let record = doc! { "_id": 1, "id": 2, "name": "a", "age": 3 };

        assert_eq!(project(&record, &doc! { "name": 1 }).unwrap(), doc! { "_id": 1, "name": "a" });
        assert_eq!(project(&record, &doc! { "_id": false, "id": true }).unwrap(), doc! { "id": 2 });
    }

    #[test]
    fn exclusion_drops_listed_fields() {
        let record = doc! { "_id": 1, "name": "a", "age": 3 };

        assert_eq!(project(&record, &doc! { "age": 0 }).unwrap(), doc! { "_id": 1, "name": "a" });
        assert_eq!(project(&record, &doc! { "_id": 0 }).unwrap(), doc! { "name": "a", "age": 3 });
    }

    #[test]
    fn mixed_projection_is_rejected() {
        assert!(project(&doc! { "a": 1 }, &doc! { "a": 1, "b": 0 }).is_err());
    }
}
