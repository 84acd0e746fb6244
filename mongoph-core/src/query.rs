//! Criteria, sorting and read-plan construction.
//!
//! Criteria are plain BSON documents in the store's native query language and
//! are passed through to the backend verbatim. The [`Filter`] helpers build
//! typed [`Expr`] values that render to such documents, and
//! [`Expr::from_criteria`] parses a criteria document back into an expression
//! tree so that backends without a native query engine can evaluate it.
//!
//! # Example
//!
//! ```ignore
//! use mongoph::query::{Filter, FindOptions, SortDirection};
//! use mongoph::page::Pager;
//!
//! let options = FindOptions::builder()
//!     .criteria(Filter::eq("status", "active").and(Filter::gt("age", 18)))
//!     .sort("age", SortDirection::Asc)
//!     .pager(Pager::new(20, 10))
//!     .build();
//! ```

use std::convert::Infallible;

use bson::{Bson, Document, doc};

use crate::{
    error::{MongophError, MongophResult},
    page::Pager,
    record::{CREATED_AT_FIELD, ID_FIELD},
};

/// Projection applied when the caller supplies none: only `id`, without `_id`.
pub fn default_projection() -> Document {
    doc! { "_id": false, ID_FIELD: true }
}

/// Ordering applied when the caller supplies none: newest first.
pub fn default_sort() -> Vec<Sort> {
    vec![Sort::desc(CREATED_AT_FIELD)]
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One sort key. Multiple keys are applied in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }

    /// Renders sort keys as an ordered `{ field: 1 | -1 }` document.
    pub fn to_document(keys: &[Sort]) -> Document {
        keys.iter()
            .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
            .collect()
    }

    /// Parses an ordered `{ field: 1 | -1 }` document into sort keys.
    pub fn from_document(document: &Document) -> MongophResult<Vec<Sort>> {
        document
            .iter()
            .map(|(field, value)| {
                let direction = match value {
                    Bson::Int32(n) => *n as f64,
                    Bson::Int64(n) => *n as f64,
                    Bson::Double(n) => *n,
                    other => {
                        return Err(MongophError::Validation(format!(
                            "invalid sort direction for {field}: {other}"
                        )));
                    }
                };

                match direction {
                    d if d == 1.0 => Ok(Sort::asc(field.clone())),
                    d if d == -1.0 => Ok(Sort::desc(field.clone())),
                    _ => Err(MongophError::Validation(format!(
                        "sort direction for {field} must be 1 or -1"
                    ))),
                }
            })
            .collect()
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to (for array fields: contains the value).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field equals any of the values (`$in`).
    AnyOf,
    /// Field equals none of the values (`$nin`).
    NoneOf,
}

impl FieldOp {
    fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }

    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::AnyOf,
            "$nin" => FieldOp::NoneOf,
            _ => return None,
        })
    }
}

/// A filter expression over records.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match; empty matches everything).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression.
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name (dotted paths address nested fields).
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Renders this expression as a criteria document.
    pub fn to_criteria(&self) -> Document {
        match CriteriaTranslator.visit_expr(self) {
            Ok(criteria) => criteria,
            Err(never) => match never {},
        }
    }

    /// Parses a criteria document into an expression tree.
    ///
    /// Supports implicit field equality, the field operators `$eq $ne $gt $gte
    /// $lt $lte $in $nin $exists $not`, and the logical operators `$and $or
    /// $nor`. An empty document matches every record.
    ///
    /// # Errors
    ///
    /// Returns [`MongophError::Validation`] for unsupported operators or
    /// malformed operands.
    pub fn from_criteria(criteria: &Document) -> MongophResult<Expr> {
        let mut exprs = criteria
            .iter()
            .map(|(key, value)| match key.as_str() {
                "$and" => Ok(Expr::And(parse_list(key, value)?)),
                "$or" => Ok(Expr::Or(parse_list(key, value)?)),
                "$nor" => Ok(Expr::Or(parse_list(key, value)?).not()),
                operator if operator.starts_with('$') => Err(MongophError::Validation(format!(
                    "unsupported criteria operator {operator}"
                ))),
                field => parse_field(field, value),
            })
            .collect::<MongophResult<Vec<_>>>()?;

        Ok(if exprs.len() == 1 { exprs.remove(0) } else { Expr::And(exprs) })
    }
}

impl From<Expr> for Document {
    fn from(expr: Expr) -> Self {
        expr.to_criteria()
    }
}

fn parse_list(operator: &str, value: &Bson) -> MongophResult<Vec<Expr>> {
    match value {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Bson::Document(criteria) => Expr::from_criteria(criteria),
                other => Err(MongophError::Validation(format!(
                    "{operator} expects documents, got {other}"
                ))),
            })
            .collect(),
        _ => Err(MongophError::Validation(format!(
            "{operator} expects a non-empty array"
        ))),
    }
}

fn is_operator_document(value: &Bson) -> bool {
    match value {
        Bson::Document(document) => {
            !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
        }
        _ => false,
    }
}

fn parse_field(field: &str, value: &Bson) -> MongophResult<Expr> {
    let operators = match value {
        Bson::Document(operators) if is_operator_document(value) => operators,
        _ => return Ok(Expr::field(field.to_string(), FieldOp::Eq, value.clone())),
    };

    let mut exprs = operators
        .iter()
        .map(|(operator, operand)| match operator.as_str() {
            "$exists" => Ok(Expr::Exists(field.to_string(), is_truthy(operand))),
            "$not" if is_operator_document(operand) => Ok(parse_field(field, operand)?.not()),
            "$not" => Err(MongophError::Validation(format!(
                "$not on {field} expects an operator document"
            ))),
            "$in" | "$nin" if !matches!(operand, Bson::Array(_)) => Err(MongophError::Validation(
                format!("{operator} on {field} expects an array"),
            )),
            other => FieldOp::from_operator(other)
                .map(|op| Expr::field(field.to_string(), op, operand.clone()))
                .ok_or_else(|| {
                    MongophError::Validation(format!("unsupported field operator {other} on {field}"))
                }),
        })
        .collect::<MongophResult<Vec<_>>>()?;

    Ok(if exprs.len() == 1 { exprs.remove(0) } else { Expr::And(exprs) })
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

/// Helper struct for constructing filter expressions.
///
/// ```ignore
/// use mongoph::query::Filter;
///
/// let expr = Filter::eq("name", "Alice")
///     .and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches records where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches records where the field is missing.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches records where the field equals any of the values.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches records where the field equals none of the values.
    pub fn none_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::NoneOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<MongophError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Renders expressions into criteria documents.
struct CriteriaTranslator;

impl CriteriaTranslator {
    fn visit_all(&mut self, exprs: &[Expr]) -> Vec<Document> {
        exprs
            .iter()
            .map(|expr| match self.visit_expr(expr) {
                Ok(criteria) => criteria,
                Err(never) => match never {},
            })
            .collect()
    }
}

impl QueryVisitor for CriteriaTranslator {
    type Output = Document;
    type Error = Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(Document::new());
        }

        Ok(doc! { "$and": self.visit_all(exprs) })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$or": self.visit_all(exprs) })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$nor": [self.visit_expr(expr)?] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! { field: { "$exists": should_exist } })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let value = match (op, value) {
            (FieldOp::AnyOf | FieldOp::NoneOf, Bson::Array(_)) => value.clone(),
            (FieldOp::AnyOf | FieldOp::NoneOf, single) => Bson::Array(vec![single.clone()]),
            _ => value.clone(),
        };

        Ok(doc! { field: { op.operator(): value } })
    }
}

/// Update operator applied by [`RecordStore::update_one`](crate::store::RecordStore::update_one).
///
/// Operators outside the common set are carried verbatim in [`UpdateOperator::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOperator {
    /// `$set`: assign fields.
    Set,
    /// `$unset`: remove fields.
    Unset,
    /// `$push`: append to array fields.
    Push,
    /// `$pull`: remove matching values from array fields.
    Pull,
    /// `$addToSet`: append to array fields unless already present.
    AddToSet,
    /// `$inc`: increment numeric fields.
    Inc,
    /// Any other operator, passed through as written.
    Other(String),
}

impl UpdateOperator {
    pub fn as_str(&self) -> &str {
        match self {
            UpdateOperator::Set => "$set",
            UpdateOperator::Unset => "$unset",
            UpdateOperator::Push => "$push",
            UpdateOperator::Pull => "$pull",
            UpdateOperator::AddToSet => "$addToSet",
            UpdateOperator::Inc => "$inc",
            UpdateOperator::Other(operator) => operator,
        }
    }
}

impl From<&str> for UpdateOperator {
    fn from(operator: &str) -> Self {
        match operator {
            "$set" => UpdateOperator::Set,
            "$unset" => UpdateOperator::Unset,
            "$push" => UpdateOperator::Push,
            "$pull" => UpdateOperator::Pull,
            "$addToSet" => UpdateOperator::AddToSet,
            "$inc" => UpdateOperator::Inc,
            other => UpdateOperator::Other(other.to_string()),
        }
    }
}

/// A resolved read plan handed to a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Criteria document matching records.
    pub criteria: Document,
    /// Projection document (empty returns whole records).
    pub projection: Document,
    /// Sort keys, applied before skip and limit.
    pub sort: Vec<Sort>,
    /// Number of records to skip after sorting.
    pub skip: Option<u64>,
    /// Maximum number of records to return.
    pub limit: Option<u64>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            criteria: Document::new(),
            projection: default_projection(),
            sort: default_sort(),
            skip: None,
            limit: None,
        }
    }
}

/// Caller-facing options of [`RecordStore::find`](crate::store::RecordStore::find).
#[derive(Debug, Clone, PartialEq)]
pub struct FindOptions {
    pub criteria: Document,
    pub projection: Document,
    pub sort: Vec<Sort>,
    /// Maximum number of records, `0` for unbounded. Ignored when a pager is set.
    pub limit: u64,
    pub pager: Option<Pager>,
}

impl FindOptions {
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }

    /// Resolves these options into a read plan.
    ///
    /// A pager takes precedence over `limit`; sorting always applies first.
    /// An empty pager counts as no pager, and a page size of `0` is unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`MongophError::Validation`] if the pager is incomplete.
    pub fn resolve(self) -> MongophResult<Query> {
        let window = match &self.pager {
            Some(pager) => pager.window()?,
            None => None,
        };
        let (skip, limit) = match window {
            Some((skip, limit)) => (Some(skip), (limit > 0).then_some(limit)),
            None => (None, (self.limit > 0).then_some(self.limit)),
        };

        Ok(Query {
            criteria: self.criteria,
            projection: self.projection,
            sort: self.sort,
            skip,
            limit,
        })
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            criteria: Document::new(),
            projection: default_projection(),
            sort: default_sort(),
            limit: 0,
            pager: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FindOptionsBuilder {
    options: FindOptions,
    sort: Vec<Sort>,
}

impl FindOptionsBuilder {
    pub fn new() -> Self {
        FindOptionsBuilder {
            options: FindOptions::default(),
            sort: Vec::new(),
        }
    }

    /// Sets the criteria document (or expression) records must match.
    pub fn criteria(mut self, criteria: impl Into<Document>) -> Self {
        self.options.criteria = criteria.into();
        self
    }

    /// Sets the projection; an empty document returns whole records.
    pub fn projection(mut self, projection: Document) -> Self {
        self.options.projection = projection;
        self
    }

    /// Appends a sort key. Without any, records come newest first.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = limit;
        self
    }

    pub fn pager(mut self, pager: Pager) -> Self {
        self.options.pager = Some(pager);
        self
    }

    pub fn build(mut self) -> FindOptions {
        if !self.sort.is_empty() {
            self.options.sort = self.sort;
        }
        self.options
    }
}

impl Default for FindOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_render_to_native_criteria() {
        let criteria = Filter::eq("status", "active").and(Filter::gt("age", 18)).to_criteria();

        assert_eq!(
            criteria,
            doc! { "$and": [ { "status": { "$eq": "active" } }, { "age": { "$gt": 18 } } ] }
        );
        assert_eq!(Filter::exists("x").not().to_criteria(), doc! { "$nor": [ { "x": { "$exists": true } } ] });
    }

    #[test]
    fn criteria_parse_back_into_expressions() {
        let expr = Expr::from_criteria(&doc! {
            "name": "a",
            "age": { "$gte": 3, "$lt": 9 },
            "$or": [ { "tag": { "$in": ["x", "y"] } }, { "gone": { "$exists": false } } ],
        })
        .unwrap();

        assert_eq!(
            expr,
            Filter::and([
                Filter::eq("name", "a"),
                Filter::and([Filter::gte("age", 3), Filter::lt("age", 9)]),
                Filter::or([Filter::any_of("tag", ["x", "y"]), Filter::not_exists("gone")]),
            ])
        );
        assert_eq!(Expr::from_criteria(&doc! {}).unwrap(), Expr::And(vec![]));
    }

    #[test]
    fn embedded_documents_are_equality_not_operators() {
        let expr = Expr::from_criteria(&doc! { "address": { "city": "Paris" } }).unwrap();

        assert_eq!(expr, Filter::eq("address", doc! { "city": "Paris" }));
    }

    #[test]
    fn unsupported_operators_are_rejected() {
        assert!(Expr::from_criteria(&doc! { "$where": "1" }).unwrap_err().is_validation());
        assert!(Expr::from_criteria(&doc! { "a": { "$regex": "x" } }).unwrap_err().is_validation());
        assert!(Expr::from_criteria(&doc! { "a": { "$in": 1 } }).unwrap_err().is_validation());
    }

    #[test]
    fn pager_takes_precedence_over_limit() {
        let query = FindOptions::builder()
            .limit(50)
            .pager(Pager::new(1, 2))
            .build()
            .resolve()
            .unwrap();

        assert_eq!((query.skip, query.limit), (Some(1), Some(2)));
        assert_eq!(query.sort, default_sort());
    }

    #[test]
    fn zero_page_size_and_empty_pager_are_unbounded() {
        let query = FindOptions::builder().pager(Pager::new(1, 0)).build().resolve().unwrap();
        assert_eq!((query.skip, query.limit), (Some(1), None));

        let query = FindOptions::builder()
            .limit(5)
            .pager(Pager::default())
            .build()
            .resolve()
            .unwrap();
        assert_eq!((query.skip, query.limit), (None, Some(5)));
    }

    #[test]
    fn zero_limit_means_unbounded() {
        let query = FindOptions::default().resolve().unwrap();

        assert_eq!((query.skip, query.limit), (None, None));
        assert_eq!(query.projection, default_projection());
    }

    #[test]
    fn sort_documents_round_trip_in_order() {
        let keys = vec![Sort::asc("a"), Sort::desc("b")];

        assert_eq!(Sort::from_document(&Sort::to_document(&keys)).unwrap(), keys);
        assert!(Sort::from_document(&doc! { "a": 2 }).is_err());
    }

    #[test]
    fn update_operators_pass_unknown_strings_through() {
        assert_eq!(UpdateOperator::from("$push"), UpdateOperator::Push);
        assert_eq!(UpdateOperator::from("$currentDate").as_str(), "$currentDate");
    }
}
