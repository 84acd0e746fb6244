//! Connection provider abstraction.
//!
//! A [`Connector`] is the factory built once at startup from a
//! [`Config`](crate::config::Config). Every logical operation asks it for a fresh
//! [`Connection`] bound to one database, performs its work, and releases the
//! connection. Connections are never cached or shared across operations.
//!
//! Release is guaranteed by [`scoped`], which closes the connection on every exit
//! path of the operation body.
//!
//! # Implementations
//!
//! - `mongoph_memory::InMemoryConnector` keeps databases in process memory
//! - `mongoph_mongodb::MongoDbConnector` talks to a MongoDB deployment

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{error::MongophResult, query::Query};

/// A live handle to one logical database, owned by a single operation.
///
/// Every method maps backend failures to
/// [`MongophError::DatabaseOperation`](crate::error::MongophError::DatabaseOperation)
/// naming the collection involved.
#[async_trait]
pub trait Connection: Send + Sync + Debug {
    /// Returns the first record matching `criteria`, shaped by `projection`.
    async fn find_one(
        &self,
        collection: &str,
        criteria: Document,
        projection: Document,
    ) -> MongophResult<Option<Document>>;

    /// Runs a resolved read plan: filter, sort, skip, limit, project.
    async fn find(&self, collection: &str, query: Query) -> MongophResult<Vec<Document>>;

    async fn insert_one(&self, collection: &str, record: Document) -> MongophResult<()>;

    /// Persists `records` in a single bulk call.
    async fn insert_many(&self, collection: &str, records: Vec<Document>) -> MongophResult<()>;

    /// Applies an update document to the first record matching `criteria`.
    ///
    /// Returns the number of matched records (0 or 1).
    async fn update_one(
        &self,
        collection: &str,
        criteria: Document,
        update: Document,
    ) -> MongophResult<u64>;

    /// Returns the number of deleted records (0 or 1).
    async fn delete_one(&self, collection: &str, criteria: Document) -> MongophResult<u64>;

    /// Returns the number of deleted records.
    async fn delete_many(&self, collection: &str, criteria: Document) -> MongophResult<u64>;

    async fn count(&self, collection: &str, criteria: Document) -> MongophResult<u64>;

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> MongophResult<Vec<Document>>;

    /// Atomically increments the counter entry `_id = key` in `counters` and
    /// returns the post-increment tally, creating the entry with tally 1 on first use.
    async fn increment_counter(&self, counters: &str, key: &str) -> MongophResult<i64>;

    /// Creates the counter entry `_id = key` with tally 0 unless it already exists.
    async fn init_counter(&self, counters: &str, key: &str) -> MongophResult<()>;

    async fn list_collections(&self) -> MongophResult<Vec<String>>;

    async fn create_collection(&self, name: &str) -> MongophResult<()>;

    /// Lists index names of a collection; a missing collection has none.
    async fn list_indexes(&self, collection: &str) -> MongophResult<Vec<String>>;

    /// Creates a text index on `field` named `name`.
    async fn create_text_index(&self, collection: &str, field: &str, name: &str) -> MongophResult<()>;

    /// Releases the connection. Consumes the handle so it cannot be released twice.
    async fn close(self) -> MongophResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory producing verified connections from explicit configuration.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    type Connection: Connection;

    /// Opens a connection to `database` and verifies liveness before returning.
    ///
    /// # Errors
    ///
    /// Returns [`MongophError::Connection`](crate::error::MongophError::Connection)
    /// if the endpoint cannot be parsed, reached or authenticated against.
    async fn connect(&self, database: &str) -> MongophResult<Self::Connection>;
}

#[async_trait]
impl<C> Connector for &C
where
    C: Connector,
{
    type Connection = C::Connection;

    async fn connect(&self, database: &str) -> MongophResult<Self::Connection> {
        (*self).connect(database).await
    }
}

/// Runs `operation` on a fresh connection to `database` and releases it afterwards.
///
/// The connection is closed whether `operation` succeeds or fails. A failure to
/// close is logged and does not replace the operation's own result.
pub async fn scoped<C, T, F>(connector: &C, database: &str, operation: F) -> MongophResult<T>
where
    C: Connector + ?Sized,
    F: AsyncFnOnce(&C::Connection) -> MongophResult<T>,
{
    let connection = connector.connect(database).await?;
    log::debug!("opened connection to {database}");

    let result = operation(&connection).await;

    match connection.close().await {
        Ok(()) => log::debug!("released connection to {database}"),
        Err(e) => log::warn!("failed to release connection to {database}: {e}"),
    }

    result
}
