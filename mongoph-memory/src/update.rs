//! Update operators applied to in-memory records.

use bson::{Bson, Document, doc};

use mongoph_core::query::Expr;

use crate::evaluator::{DocumentEvaluator, lookup, values_equal};

fn ensure_subdoc<'a>(root: &'a mut Document, key: &str) -> Result<&'a mut Document, String> {
    if root.get(key).is_none() {
        root.insert(key.to_string(), Bson::Document(Document::new()));
    }

    match root.get_mut(key) {
        Some(Bson::Document(inner)) => Ok(inner),
        _ => Err(format!("cannot traverse non-document field {key}")),
    }
}

fn traverse_to_parent<'a>(root: &'a mut Document, path: &str) -> Result<(&'a mut Document, String), String> {
    let mut current = root;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            return Ok((current, segment.to_string()));
        }
        current = ensure_subdoc(current, segment)?;
    }

    Err("empty field path".to_string())
}

fn set_path(root: &mut Document, path: &str, value: Bson) -> Result<(), String> {
    let (parent, last) = traverse_to_parent(root, path)?;
    parent.insert(last, value);
    Ok(())
}

fn unset_path(root: &mut Document, path: &str) -> Result<(), String> {
    if lookup(root, path).is_none() {
        return Ok(());
    }

    let (parent, last) = traverse_to_parent(root, path)?;
    parent.remove(&last);
    Ok(())
}

fn add_i64(a: i64, b: i64, path: &str) -> Result<Bson, String> {
    a.checked_add(b)
        .map(Bson::Int64)
        .ok_or_else(|| format!("integer overflow applying $inc to {path}"))
}

fn increment(current: Option<&Bson>, by: &Bson, path: &str) -> Result<Bson, String> {
    let current = current.cloned().unwrap_or(Bson::Int32(0));

    match (&current, by) {
        // Int32 sums that overflow are widened to Int64.
        (Bson::Int32(a), Bson::Int32(b)) => Ok(a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(i64::from(*a) + i64::from(*b)))),
        (Bson::Int32(a), Bson::Int64(b)) => add_i64(i64::from(*a), *b, path),
        (Bson::Int64(a), Bson::Int32(b)) => add_i64(*a, i64::from(*b), path),
        (Bson::Int64(a), Bson::Int64(b)) => add_i64(*a, *b, path),
        (Bson::Double(a), Bson::Int32(b)) => Ok(Bson::Double(a + f64::from(*b))),
        (Bson::Double(a), Bson::Int64(b)) => Ok(Bson::Double(a + *b as f64)),
        (Bson::Int32(a), Bson::Double(b)) => Ok(Bson::Double(f64::from(*a) + b)),
        (Bson::Int64(a), Bson::Double(b)) => Ok(Bson::Double(*a as f64 + b)),
        (Bson::Double(a), Bson::Double(b)) => Ok(Bson::Double(a + b)),
        _ => Err(format!("cannot apply $inc to non-numeric field {path}")),
    }
}

/// Values appended by `$push` / `$addToSet`, honouring the `$each` modifier.
fn appended_values(value: &Bson) -> Vec<Bson> {
    match value {
        Bson::Document(modifier) => match modifier.get("$each") {
            Some(Bson::Array(each)) => each.clone(),
            _ => vec![value.clone()],
        },
        _ => vec![value.clone()],
    }
}

fn array_at<'a>(root: &'a mut Document, path: &str) -> Result<&'a mut Vec<Bson>, String> {
    if lookup(root, path).is_none() {
        set_path(root, path, Bson::Array(Vec::new()))?;
    }

    let (parent, last) = traverse_to_parent(root, path)?;
    match parent.get_mut(&last) {
        Some(Bson::Array(items)) => Ok(items),
        _ => Err(format!("field {path} is not an array")),
    }
}

/// Builds the predicate `$pull` uses to decide which elements to remove.
fn pull_matcher(condition: &Bson) -> Result<Box<dyn Fn(&Bson) -> bool>, String> {
    let operators = matches!(
        condition,
        Bson::Document(d) if !d.is_empty() && d.keys().all(|key| key.starts_with('$'))
    );

    match condition {
        Bson::Document(criteria) if operators => {
            let expr = Expr::from_criteria(&doc! { "v": criteria.clone() }).map_err(|e| e.to_string())?;
            Ok(Box::new(move |item: &Bson| {
                DocumentEvaluator::new(&doc! { "v": item.clone() })
                    .evaluate(&expr)
                    .unwrap_or(false)
            }))
        }
        Bson::Document(criteria) => {
            let expr = Expr::from_criteria(criteria).map_err(|e| e.to_string())?;
            Ok(Box::new(move |item: &Bson| match item {
                Bson::Document(element) => DocumentEvaluator::new(element).evaluate(&expr).unwrap_or(false),
                _ => false,
            }))
        }
        value => {
            let value = value.clone();
            Ok(Box::new(move |item: &Bson| values_equal(item, &value)))
        }
    }
}

fn fields_of<'a>(operator: &str, operand: &'a Bson) -> Result<&'a Document, String> {
    match operand {
        Bson::Document(fields) => Ok(fields),
        _ => Err(format!("{operator} expects a document")),
    }
}

/// Applies an update document (`{ "$op": { field: value } }`) to `record`.
pub(crate) fn apply_update(record: &mut Document, update: &Document) -> Result<(), String> {
    if update.is_empty() {
        return Err("update document must not be empty".to_string());
    }

    for (operator, operand) in update {
        let fields = fields_of(operator, operand)?;

        for (path, value) in fields {
            if path == "_id" || path.starts_with("_id.") {
                return Err("performing an update on the path '_id' would modify the immutable field '_id'".to_string());
            }

            match operator.as_str() {
                "$set" => set_path(record, path, value.clone())?,
                "$unset" => unset_path(record, path)?,
                "$inc" => {
                    let next = increment(lookup(record, path), value, path)?;
                    set_path(record, path, next)?;
                }
                "$push" => array_at(record, path)?.extend(appended_values(value)),
                "$addToSet" => {
                    let items = array_at(record, path)?;
                    for candidate in appended_values(value) {
                        if !items.iter().any(|item| values_equal(item, &candidate)) {
                            items.push(candidate);
                        }
                    }
                }
                "$pull" => {
                    let matcher = pull_matcher(value)?;
                    match lookup(record, path) {
                        Some(Bson::Array(_)) => array_at(record, path)?.retain(|item| !matcher(item)),
                        Some(_) => return Err(format!("cannot apply $pull to non-array field {path}")),
                        None => {}
                    }
                }
                other if other.starts_with('$') => {
                    return Err(format!("unsupported update operator {other}"));
                }
                _ => return Err("update document must contain only update operators".to_string()),
            }
        }
    }

    Ok(())
}
