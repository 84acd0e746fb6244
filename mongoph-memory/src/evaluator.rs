//! Criteria evaluation and ordering for in-memory records.
//!
//! Criteria documents are parsed into expression trees by the core crate and
//! evaluated here with a [`QueryVisitor`]. Field names may be dotted paths that
//! address nested documents.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use mongoph_core::{
    error::{MongophError, MongophResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `Int32(1)` equals `Int64(1)`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    Map(HashMap<&'a str, Comparable<'a>>),
    Array(Vec<Comparable<'a>>),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
}

impl<'a> Comparable<'a> {
    /// Rank of the value's type in cross-type ordering.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut current = document;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let value = current.get(segment)?;

        if segments.peek().is_none() {
            return Some(value);
        }

        match value {
            Bson::Document(inner) => current = inner,
            _ => return None,
        }
    }

    None
}

/// Equality with numeric normalization.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Total order used for sorting: missing and null first, then by type rank.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    match left.rank().cmp(&right.rank()) {
        Ordering::Equal => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        unequal => unequal,
    }
}

/// Stable multi-key sort.
pub(crate) fn sort_records(records: &mut [Document], keys: &[Sort]) {
    records.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = compare_values(lookup(a, &key.field), lookup(b, &key.field));

                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> MongophResult<bool> {
        self.visit_expr(expr)
    }

    /// Parses `criteria` once and keeps the records that match it.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        criteria: &Document,
    ) -> MongophResult<Vec<&'a Document>> {
        let expr = Expr::from_criteria(criteria)?;
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(&expr)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn matches_eq(field_value: &Bson, value: &Bson) -> bool {
        if values_equal(field_value, value) {
            return true;
        }

        match field_value {
            Bson::Array(items) => items.iter().any(|item| values_equal(item, value)),
            _ => false,
        }
    }

    /// A missing field matches `null`.
    fn matches_value(field_value: Option<&Bson>, value: &Bson) -> bool {
        match field_value {
            Some(found) => Self::matches_eq(found, value),
            None => matches!(value, Bson::Null),
        }
    }

    fn matches_any(field_value: Option<&Bson>, values: &Bson) -> bool {
        let candidates = match values {
            Bson::Array(values) => values.as_slice(),
            single => std::slice::from_ref(single),
        };

        candidates
            .iter()
            .any(|candidate| Self::matches_value(field_value, candidate))
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = MongophError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup(self.document, field);

        Ok(match op {
            FieldOp::Eq => Self::matches_value(field_value, value),
            FieldOp::Ne => !Self::matches_value(field_value, value),
            FieldOp::AnyOf => Self::matches_any(field_value, value),
            FieldOp::NoneOf => !Self::matches_any(field_value, value),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let Some(found) = field_value else {
                    return Ok(false);
                };
                let target = Comparable::from(value);
                let candidates: Vec<&Bson> = match found {
                    Bson::Array(items) => items.iter().collect(),
                    single => vec![single],
                };

                candidates.into_iter().any(|candidate| {
                    match Comparable::from(candidate).partial_cmp(&target) {
                        Some(ordering) => match op {
                            FieldOp::Gt => ordering == Ordering::Greater,
                            FieldOp::Gte => ordering != Ordering::Less,
                            FieldOp::Lt => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        },
                        None => false,
                    }
                })
            }
        })
    }
}
