//! MongoDB connector and connection.
//!
//! The connector holds only a validated endpoint. Every connection owns a fresh
//! driver client bound to one database and shuts it down on close.

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, Database, IndexModel,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, IndexOptions, ReturnDocument},
};

use mongoph_core::{
    backend::{Connection, Connector},
    config::Config,
    error::{MongophError, MongophResult},
    query::{Query, Sort},
    store::RecordStore,
};

const NAMESPACE_NOT_FOUND: i32 = 26;
const TALLY: &str = "tally";

fn is_namespace_not_found(error: &MongoError) -> bool {
    matches!(&*error.kind, ErrorKind::Command(command) if command.code == NAMESPACE_NOT_FOUND)
}

/// Connection provider for a MongoDB deployment.
///
/// Holds only the endpoint; each [`connect`](Connector::connect) builds its own
/// client, pings the target database and hands the client to the connection.
#[derive(Debug, Clone)]
pub struct MongoDbConnector {
    dsn: String,
}

impl MongoDbConnector {
    /// Creates a connector for `dsn`.
    ///
    /// # Errors
    ///
    /// Returns [`MongophError::Configuration`] if the endpoint is empty.
    pub fn new(dsn: impl Into<String>) -> MongophResult<Self> {
        let dsn = dsn.into();

        if dsn.trim().is_empty() {
            return Err(MongophError::Configuration(
                "connection string must not be empty".to_string(),
            ));
        }

        Ok(Self { dsn })
    }

    pub fn builder(dsn: &str) -> MongoDbConnectorBuilder {
        MongoDbConnectorBuilder::new(dsn)
    }

    /// Uses the endpoint of an explicit configuration.
    pub fn from_config(config: &Config) -> MongophResult<Self> {
        Self::new(config.connection_string.clone())
    }

    /// Builds a record store whose connector and settings come from the same
    /// configuration.
    pub fn record_store(config: Config) -> MongophResult<RecordStore<Self>> {
        Ok(RecordStore::new(Self::from_config(&config)?, config))
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }
}

#[async_trait]
impl Connector for MongoDbConnector {
    type Connection = MongoDbConnection;

    async fn connect(&self, database: &str) -> MongophResult<Self::Connection> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| MongophError::Connection(e.to_string()))?;
        let client = Client::with_options(options).map_err(|e| MongophError::Connection(e.to_string()))?;

        let ping = client.database(database).run_command(doc! { "ping": 1 }).await;

        if let Err(e) = ping {
            log::warn!("ping to {database} failed: {e}");
            client.shutdown().await;
            return Err(MongophError::Connection(e.to_string()));
        }

        Ok(MongoDbConnection::new(client, database.to_string()))
    }
}

pub struct MongoDbConnectorBuilder {
    dsn: String,
}

impl MongoDbConnectorBuilder {
    pub fn new(dsn: &str) -> Self {
        Self { dsn: dsn.to_string() }
    }

    pub fn build(self) -> MongophResult<MongoDbConnector> {
        MongoDbConnector::new(self.dsn)
    }
}

/// A verified client bound to one database.
#[derive(Debug)]
pub struct MongoDbConnection {
    client: Client,
    database: String,
}

impl MongoDbConnection {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    fn database(&self) -> Database {
        self.client.database(&self.database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.database().collection(collection_name)
    }
}

#[async_trait]
impl Connection for MongoDbConnection {
    async fn find_one(
        &self,
        collection: &str,
        criteria: Document,
        projection: Document,
    ) -> MongophResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(criteria)
            .projection(projection)
            .await
            .map_err(|e| MongophError::operation(collection, e))
    }

    async fn find(&self, collection: &str, query: Query) -> MongophResult<Vec<Document>> {
        let coll = self.get_collection(collection);
        let mut action = coll
            .find(query.criteria)
            .projection(query.projection)
            .sort(Sort::to_document(&query.sort));

        if let Some(skip) = query.skip {
            action = action.skip(skip);
        }
        if let Some(limit) = query.limit {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        action
            .await
            .map_err(|e| MongophError::operation(collection, e))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| MongophError::operation(collection, e))
    }

    async fn insert_one(&self, collection: &str, record: Document) -> MongophResult<()> {
        self.get_collection(collection)
            .insert_one(record)
            .await
            .map_err(|e| MongophError::operation(collection, e))?;

        Ok(())
    }

    async fn insert_many(&self, collection: &str, records: Vec<Document>) -> MongophResult<()> {
        self.get_collection(collection)
            .insert_many(records)
            .await
            .map_err(|e| MongophError::operation(collection, e))?;

        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        criteria: Document,
        update: Document,
    ) -> MongophResult<u64> {
        Ok(self
            .get_collection(collection)
            .update_one(criteria, update)
            .await
            .map_err(|e| MongophError::operation(collection, e))?
            .matched_count)
    }

    async fn delete_one(&self, collection: &str, criteria: Document) -> MongophResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_one(criteria)
            .await
            .map_err(|e| MongophError::operation(collection, e))?
            .deleted_count)
    }

    async fn delete_many(&self, collection: &str, criteria: Document) -> MongophResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(criteria)
            .await
            .map_err(|e| MongophError::operation(collection, e))?
            .deleted_count)
    }

    async fn count(&self, collection: &str, criteria: Document) -> MongophResult<u64> {
        self.get_collection(collection)
            .count_documents(criteria)
            .await
            .map_err(|e| MongophError::operation(collection, e))
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> MongophResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(|e| MongophError::operation(collection, e))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| MongophError::operation(collection, e))
    }

    async fn increment_counter(&self, counters: &str, key: &str) -> MongophResult<i64> {
        let entry = self
            .get_collection(counters)
            .find_one_and_update(doc! { "_id": key }, doc! { "$inc": { TALLY: 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| MongophError::operation(counters, e))?;

        match entry.as_ref().and_then(|entry| entry.get(TALLY)) {
            Some(Bson::Int64(tally)) => Ok(*tally),
            Some(Bson::Int32(tally)) => Ok(i64::from(*tally)),
            other => Err(MongophError::operation(
                counters,
                format!("counter {key} has no integer tally: {other:?}"),
            )),
        }
    }

    async fn init_counter(&self, counters: &str, key: &str) -> MongophResult<()> {
        self.get_collection(counters)
            .update_one(doc! { "_id": key }, doc! { "$setOnInsert": { TALLY: 0_i64 } })
            .upsert(true)
            .await
            .map_err(|e| MongophError::operation(counters, e))?;

        Ok(())
    }

    async fn list_collections(&self) -> MongophResult<Vec<String>> {
        self.database()
            .list_collection_names()
            .await
            .map_err(|e| MongophError::operation(self.database.as_str(), e))
    }

    async fn create_collection(&self, name: &str) -> MongophResult<()> {
        self.database()
            .create_collection(name)
            .await
            .map_err(|e| MongophError::operation(name, e))
    }

    async fn list_indexes(&self, collection: &str) -> MongophResult<Vec<String>> {
        match self.get_collection(collection).list_index_names().await {
            Ok(names) => Ok(names),
            Err(e) if is_namespace_not_found(&e) => {
                log::debug!("collection {collection} does not exist, reporting no indexes");
                Ok(Vec::new())
            }
            Err(e) => Err(MongophError::operation(collection, e)),
        }
    }

    async fn create_text_index(&self, collection: &str, field: &str, name: &str) -> MongophResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: "text" })
                    .options(IndexOptions::builder().name(name.to_string()).build())
                    .build(),
            )
            .await
            .map_err(|e| MongophError::operation(collection, e))?;

        Ok(())
    }

    async fn close(self) -> MongophResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}
