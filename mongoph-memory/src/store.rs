//! In-memory connection provider.
//!
//! Databases live in process memory behind an async-aware read-write lock.
//! Every [`InMemoryConnector::connect`] call hands out a fresh
//! [`InMemoryConnection`] sharing that state, and the connector keeps track of how
//! many connections are currently open so release discipline can be observed.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;

use mongoph_core::{
    backend::{Connection, Connector},
    error::{MongophError, MongophResult},
    query::{Expr, Query},
};

use crate::{
    evaluator::{DocumentEvaluator, sort_records},
    pipeline::run_pipeline,
    projection::project,
    update::apply_update,
};

const ID: &str = "_id";
const TALLY: &str = "tally";
const PRIMARY_INDEX: &str = "_id_";

#[derive(Debug, Clone)]
struct IndexSpec {
    name: String,
    field: String,
}

#[derive(Debug, Default)]
struct CollectionState {
    records: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

type DatabaseMap = HashMap<String, CollectionState>;
type ServerMap = HashMap<String, DatabaseMap>;

/// Puts an `_id` at the front of `record` unless it already carries one.
fn with_object_id(record: Document) -> Document {
    if record.contains_key(ID) {
        return record;
    }

    let mut stamped = Document::new();
    stamped.insert(ID, ObjectId::new());
    stamped.extend(record);
    stamped
}

fn tally_of(record: &Document) -> i64 {
    match record.get(TALLY) {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Double(n)) => *n as i64,
        _ => 0,
    }
}

/// Thread-safe in-memory stand-in for a MongoDB deployment.
///
/// Clones share the same underlying data and connection bookkeeping. Mark the
/// connector unreachable with [`set_reachable`](Self::set_reachable) to make
/// subsequent connects fail with [`MongophError::Connection`].
///
/// # Example
///
/// ```ignore
/// use mongoph_memory::InMemoryConnector;
/// use mongoph_core::backend::{Connector, Connection};
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let connector = InMemoryConnector::new();
///     let connection = connector.connect("shop").await?;
///     connection.insert_one("orders", doc! { "id": 1 }).await?;
///     connection.close().await?;
///
///     assert_eq!(connector.open_connections(), 0);
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryConnector {
    /// database name -> collection name -> state
    server: Arc<RwLock<ServerMap>>,
    open: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    unreachable: Arc<AtomicBool>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryConnectorBuilder {
        InMemoryConnectorBuilder::default()
    }

    /// Number of connections handed out and not yet released.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Total number of connections handed out so far.
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Connection = InMemoryConnection;

    async fn connect(&self, database: &str) -> MongophResult<Self::Connection> {
        if self.unreachable.load(Ordering::SeqCst) {
            log::warn!("refusing connection to {database}: server marked unreachable");
            return Err(MongophError::Connection(format!(
                "in-memory server is unreachable (database {database})"
            )));
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(InMemoryConnection {
            server: Arc::clone(&self.server),
            open: Arc::clone(&self.open),
            database: database.to_string(),
        })
    }
}

/// Builder for [`InMemoryConnector`], optionally seeded with records.
#[derive(Default)]
pub struct InMemoryConnectorBuilder {
    seed: ServerMap,
    reachable: Option<bool>,
}

impl InMemoryConnectorBuilder {
    /// Preloads `records` into `database.collection`.
    pub fn with_records(mut self, database: &str, collection: &str, records: Vec<Document>) -> Self {
        self.seed
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default()
            .records
            .extend(records.into_iter().map(with_object_id));
        self
    }

    pub fn reachable(mut self, reachable: bool) -> Self {
        self.reachable = Some(reachable);
        self
    }

    pub fn build(self) -> InMemoryConnector {
        let connector = InMemoryConnector {
            server: Arc::new(RwLock::new(self.seed)),
            ..InMemoryConnector::default()
        };
        connector.set_reachable(self.reachable.unwrap_or(true));
        connector
    }
}

/// A handle onto one database of an [`InMemoryConnector`].
#[derive(Debug)]
pub struct InMemoryConnection {
    server: Arc<RwLock<ServerMap>>,
    open: Arc<AtomicUsize>,
    database: String,
}

impl InMemoryConnection {
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Clones the records of `collection` matching `criteria`, in insertion order.
    async fn matching(&self, collection: &str, criteria: &Document) -> MongophResult<Vec<Document>> {
        let server = self.server.read().await;
        let Some(state) = server.get(&self.database).and_then(|db| db.get(collection)) else {
            return Ok(Vec::new());
        };

        DocumentEvaluator::filter_documents(state.records.iter(), criteria)
            .map(|matched| matched.into_iter().cloned().collect())
            .map_err(|e| MongophError::operation(collection, e))
    }

    /// Positions of records matching `criteria`; at most one when `first_only`.
    fn positions(
        collection: &str,
        records: &[Document],
        criteria: &Document,
        first_only: bool,
    ) -> MongophResult<Vec<usize>> {
        let expr = Expr::from_criteria(criteria)
            .map_err(|e| MongophError::operation(collection, e))?;
        let mut found = Vec::new();

        for (position, record) in records.iter().enumerate() {
            let matched = DocumentEvaluator::new(record)
                .evaluate(&expr)
                .map_err(|e| MongophError::operation(collection, e))?;

            if matched {
                found.push(position);
                if first_only {
                    break;
                }
            }
        }

        Ok(found)
    }

    async fn insert(&self, collection: &str, records: Vec<Document>) -> MongophResult<()> {
        let mut server = self.server.write().await;
        let state = server
            .entry(self.database.clone())
            .or_default()
            .entry(collection.to_string())
            .or_default();

        let records: Vec<Document> = records.into_iter().map(with_object_id).collect();

        for (position, record) in records.iter().enumerate() {
            let id = record.get(ID);
            let clash = state.records.iter().any(|existing| existing.get(ID) == id)
                || records[..position].iter().any(|earlier| earlier.get(ID) == id);

            if clash {
                return Err(MongophError::operation(
                    collection,
                    format!("duplicate key error: _id {:?}", id),
                ));
            }
        }

        state.records.extend(records);
        Ok(())
    }

    async fn delete(&self, collection: &str, criteria: Document, first_only: bool) -> MongophResult<u64> {
        let mut server = self.server.write().await;
        let Some(state) = server.get_mut(&self.database).and_then(|db| db.get_mut(collection)) else {
            return Ok(0);
        };

        let positions = Self::positions(collection, &state.records, &criteria, first_only)?;
        for position in positions.iter().rev() {
            state.records.remove(*position);
        }

        Ok(positions.len() as u64)
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn find_one(
        &self,
        collection: &str,
        criteria: Document,
        projection: Document,
    ) -> MongophResult<Option<Document>> {
        self.matching(collection, &criteria)
            .await?
            .first()
            .map(|record| project(record, &projection))
            .transpose()
            .map_err(|e| MongophError::operation(collection, e))
    }

    async fn find(&self, collection: &str, query: Query) -> MongophResult<Vec<Document>> {
        let mut records = self.matching(collection, &query.criteria).await?;
        sort_records(&mut records, &query.sort);

        let skip = query.skip.map(|n| n as usize).unwrap_or(0);
        let limit = query.limit.map(|n| n as usize).unwrap_or(usize::MAX);

        records
            .iter()
            .skip(skip)
            .take(limit)
            .map(|record| project(record, &query.projection))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MongophError::operation(collection, e))
    }

    async fn insert_one(&self, collection: &str, record: Document) -> MongophResult<()> {
        self.insert(collection, vec![record]).await
    }

    async fn insert_many(&self, collection: &str, records: Vec<Document>) -> MongophResult<()> {
        self.insert(collection, records).await
    }

    async fn update_one(
        &self,
        collection: &str,
        criteria: Document,
        update: Document,
    ) -> MongophResult<u64> {
        let mut server = self.server.write().await;
        let Some(state) = server.get_mut(&self.database).and_then(|db| db.get_mut(collection)) else {
            return Ok(0);
        };

        let Some(position) = Self::positions(collection, &state.records, &criteria, true)?.pop() else {
            return Ok(0);
        };

        // Work on a copy so a rejected update leaves the record untouched.
        let mut updated = state.records[position].clone();
        apply_update(&mut updated, &update).map_err(|e| MongophError::operation(collection, e))?;
        state.records[position] = updated;

        Ok(1)
    }

    async fn delete_one(&self, collection: &str, criteria: Document) -> MongophResult<u64> {
        self.delete(collection, criteria, true).await
    }

    async fn delete_many(&self, collection: &str, criteria: Document) -> MongophResult<u64> {
        self.delete(collection, criteria, false).await
    }

    async fn count(&self, collection: &str, criteria: Document) -> MongophResult<u64> {
        Ok(self.matching(collection, &criteria).await?.len() as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> MongophResult<Vec<Document>> {
        let records = self.matching(collection, &Document::new()).await?;
        run_pipeline(records, &pipeline).map_err(|e| MongophError::operation(collection, e))
    }

    async fn increment_counter(&self, counters: &str, key: &str) -> MongophResult<i64> {
        let mut server = self.server.write().await;
        let state = server
            .entry(self.database.clone())
            .or_default()
            .entry(counters.to_string())
            .or_default();

        let entry = state
            .records
            .iter_mut()
            .find(|record| record.get_str(ID).is_ok_and(|id| id == key));

        match entry {
            Some(record) => {
                let tally = tally_of(record) + 1;
                record.insert(TALLY, tally);
                Ok(tally)
            }
            None => {
                let mut record = Document::new();
                record.insert(ID, key);
                record.insert(TALLY, 1_i64);
                state.records.push(record);
                Ok(1)
            }
        }
    }

    async fn init_counter(&self, counters: &str, key: &str) -> MongophResult<()> {
        let mut server = self.server.write().await;
        let state = server
            .entry(self.database.clone())
            .or_default()
            .entry(counters.to_string())
            .or_default();

        let exists = state
            .records
            .iter()
            .any(|record| record.get_str(ID).is_ok_and(|id| id == key));

        if !exists {
            let mut record = Document::new();
            record.insert(ID, key);
            record.insert(TALLY, 0_i64);
            state.records.push(record);
        }

        Ok(())
    }

    async fn list_collections(&self) -> MongophResult<Vec<String>> {
        let server = self.server.read().await;
        let mut names: Vec<String> = server
            .get(&self.database)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default();

        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, name: &str) -> MongophResult<()> {
        let mut server = self.server.write().await;
        let database = server.entry(self.database.clone()).or_default();

        if database.contains_key(name) {
            return Err(MongophError::operation(name, format!("collection {name} already exists")));
        }

        database.insert(name.to_string(), CollectionState::default());
        log::debug!("created collection {}.{name}", self.database);

        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> MongophResult<Vec<String>> {
        let server = self.server.read().await;
        let Some(state) = server.get(&self.database).and_then(|db| db.get(collection)) else {
            return Ok(Vec::new());
        };

        Ok(std::iter::once(PRIMARY_INDEX.to_string())
            .chain(state.indexes.iter().map(|index| index.name.clone()))
            .collect())
    }

    async fn create_text_index(&self, collection: &str, field: &str, name: &str) -> MongophResult<()> {
        let mut server = self.server.write().await;
        let state = server
            .entry(self.database.clone())
            .or_default()
            .entry(collection.to_string())
            .or_default();

        if let Some(existing) = state.indexes.first() {
            if existing.name == name && existing.field == field {
                return Ok(());
            }

            return Err(MongophError::operation(
                collection,
                format!("text index {} already exists; only one text index per collection", existing.name),
            ));
        }

        state.indexes.push(IndexSpec {
            name: name.to_string(),
            field: field.to_string(),
        });
        log::debug!("created text index {name} on {}.{collection}", self.database);

        Ok(())
    }

    async fn close(self) -> MongophResult<()> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
