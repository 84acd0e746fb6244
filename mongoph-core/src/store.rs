//! Record store: CRUD, pagination, counting and aggregation over named collections.
//!
//! Every operation opens its own connection through the configured
//! [`Connector`], performs one unit of work, normalizes what it returns, and
//! releases the connection on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use mongoph::{prelude::*, memory::InMemoryConnector};
//! use bson::doc;
//!
//! let store = RecordStore::new(InMemoryConnector::new(), Config::builder("memory://").build());
//!
//! let key = store
//!     .insert_one("app", "users", doc! { "name": "Alice" }, Returning::Ack)
//!     .await?
//!     .into_ack();
//!
//! let users = store.find("app", "users", FindOptions::default()).await?;
//! ```

use bson::{DateTime, Document, doc};

use crate::{
    backend::{Connection, Connector, scoped},
    collection::Collection,
    config::Config,
    error::MongophResult,
    identifier::{IdentifierGenerator, next_on},
    index::IndexManager,
    query::{FindOptions, Query, UpdateOperator, default_projection},
    record::{Record, UPDATED_AT_FIELD, normalize, normalized, stamp_new},
};

/// What a write operation hands back to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Returning {
    /// The full default listing of the collection after the write.
    ///
    /// This re-reads the whole collection and is meant for small collections.
    Listing,
    /// Only the acknowledgement (reference keys for inserts, `true` otherwise).
    #[default]
    Ack,
}

/// Result of a write operation, shaped by [`Returning`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    Listing(Vec<Record>),
    Ack(T),
}

impl<T> WriteOutcome<T> {
    pub fn into_listing(self) -> Option<Vec<Record>> {
        match self {
            WriteOutcome::Listing(records) => Some(records),
            WriteOutcome::Ack(_) => None,
        }
    }

    pub fn into_ack(self) -> Option<T> {
        match self {
            WriteOutcome::Listing(_) => None,
            WriteOutcome::Ack(ack) => Some(ack),
        }
    }
}

/// Generic record store bound to a connector and its configuration.
#[derive(Debug)]
pub struct RecordStore<C: Connector> {
    connector: C,
    config: Config,
}

impl<C: Connector> RecordStore<C> {
    /// Creates a record store over `connector`.
    ///
    /// The counter collection and reference key field are taken from `config`.
    pub fn new(connector: C, config: Config) -> Self {
        Self { connector, config }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Field under which reference keys are stored.
    pub fn reference_key(&self) -> &str {
        &self.config.reference_key
    }

    /// Identifier generator sharing this store's connector and counter collection.
    pub fn identifiers(&self) -> IdentifierGenerator<'_, C> {
        IdentifierGenerator::new(&self.connector, &self.config.counter_collection)
    }

    /// Index manager sharing this store's connector.
    pub fn indexes(&self) -> IndexManager<'_, C> {
        IndexManager::new(&self.connector, &self.config.counter_collection)
    }

    /// A view with the database and collection bound.
    pub fn collection<'a>(&'a self, database: &str, name: &str) -> Collection<'a, C> {
        Collection::new(self, database.to_string(), name.to_string())
    }

    /// Returns the first record matching `criteria`, or `None` if there is none.
    ///
    /// `projection` defaults to `{ _id: false, id: true }`.
    pub async fn find_one(
        &self,
        database: &str,
        collection: &str,
        criteria: Document,
        projection: Option<Document>,
    ) -> MongophResult<Option<Record>> {
        scoped(&self.connector, database, async |connection| {
            let record = connection
                .find_one(collection, criteria, projection.unwrap_or_else(default_projection))
                .await?;

            Ok(normalized(record))
        })
        .await
    }

    /// Lists records according to `options`.
    ///
    /// # Errors
    ///
    /// An incomplete pager yields
    /// [`MongophError::Validation`](crate::error::MongophError::Validation)
    /// before any connection is opened.
    pub async fn find(
        &self,
        database: &str,
        collection: &str,
        options: FindOptions,
    ) -> MongophResult<Vec<Record>> {
        let query = options.resolve()?;

        scoped(&self.connector, database, async |connection| {
            list_on(connection, collection, query).await
        })
        .await
    }

    /// Stamps and persists one record.
    ///
    /// Returns the new reference key, or the collection listing.
    pub async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        mut record: Record,
        returning: Returning,
    ) -> MongophResult<WriteOutcome<String>> {
        scoped(&self.connector, database, async |connection| {
            let id = next_on(connection, &self.config.counter_collection, collection).await?;
            let reference_key = stamp_new(&mut record, id, &self.config.reference_key, DateTime::now());

            connection.insert_one(collection, record).await?;
            log::debug!("inserted record {id} into {collection}");

            outcome_on(connection, collection, returning, reference_key).await
        })
        .await
    }

    /// Stamps every record, then persists them in one bulk call.
    ///
    /// Returns the reference keys in input order, or the collection listing.
    /// An empty input performs no write. The bulk write is not atomic, and
    /// identifiers allocated for records that fail to persist are not reclaimed.
    pub async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        mut records: Vec<Record>,
        returning: Returning,
    ) -> MongophResult<WriteOutcome<Vec<String>>> {
        scoped(&self.connector, database, async |connection| {
            let mut reference_keys = Vec::with_capacity(records.len());

            for record in records.iter_mut() {
                let id = next_on(connection, &self.config.counter_collection, collection).await?;
                reference_keys.push(stamp_new(record, id, &self.config.reference_key, DateTime::now()));
            }

            if !records.is_empty() {
                let inserted = records.len();
                connection.insert_many(collection, records).await?;
                log::debug!("inserted {inserted} records into {collection}");
            }

            outcome_on(connection, collection, returning, reference_keys).await
        })
        .await
    }

    /// Applies `patch` under `operator` to the first record matching `criteria`.
    ///
    /// `updated_at` is stamped on every update. With [`UpdateOperator::Set`] it is
    /// merged into the patch; with any other operator it is set alongside it.
    pub async fn update_one(
        &self,
        database: &str,
        collection: &str,
        criteria: Document,
        operator: impl Into<UpdateOperator>,
        patch: Document,
        returning: Returning,
    ) -> MongophResult<WriteOutcome<bool>> {
        let update = update_document(operator.into(), patch, DateTime::now());

        scoped(&self.connector, database, async |connection| {
            let matched = connection.update_one(collection, criteria, update).await?;
            log::debug!("updated {matched} record(s) in {collection}");

            outcome_on(connection, collection, returning, true).await
        })
        .await
    }

    /// Removes the first record matching `criteria`.
    pub async fn delete_one(
        &self,
        database: &str,
        collection: &str,
        criteria: Document,
        returning: Returning,
    ) -> MongophResult<WriteOutcome<bool>> {
        scoped(&self.connector, database, async |connection| {
            let deleted = connection.delete_one(collection, criteria).await?;
            log::debug!("deleted {deleted} record(s) from {collection}");

            outcome_on(connection, collection, returning, true).await
        })
        .await
    }

    /// Removes every record matching `criteria`. Not atomic as a whole.
    pub async fn delete_many(
        &self,
        database: &str,
        collection: &str,
        criteria: Document,
        returning: Returning,
    ) -> MongophResult<WriteOutcome<bool>> {
        scoped(&self.connector, database, async |connection| {
            let deleted = connection.delete_many(collection, criteria).await?;
            log::debug!("deleted {deleted} record(s) from {collection}");

            outcome_on(connection, collection, returning, true).await
        })
        .await
    }

    pub async fn count(&self, database: &str, collection: &str, criteria: Document) -> MongophResult<u64> {
        scoped(&self.connector, database, async |connection| {
            connection.count(collection, criteria).await
        })
        .await
    }

    /// Runs a caller-supplied aggregation pipeline and normalizes its output.
    pub async fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> MongophResult<Vec<Record>> {
        scoped(&self.connector, database, async |connection| {
            let mut records = connection.aggregate(collection, pipeline).await?;
            records.iter_mut().for_each(|record| {
                normalize(record);
            });

            Ok(records)
        })
        .await
    }
}

fn update_document(operator: UpdateOperator, mut patch: Document, now: DateTime) -> Document {
    match operator {
        UpdateOperator::Set => {
            patch.insert(UPDATED_AT_FIELD, now);
            doc! { "$set": patch }
        }
        other => doc! {
            other.as_str(): patch,
            "$set": { UPDATED_AT_FIELD: now },
        },
    }
}

async fn list_on<K: Connection>(connection: &K, collection: &str, query: Query) -> MongophResult<Vec<Record>> {
    let mut records = connection.find(collection, query).await?;
    records.iter_mut().for_each(|record| {
        normalize(record);
    });

    Ok(records)
}

async fn outcome_on<K: Connection, T>(
    connection: &K,
    collection: &str,
    returning: Returning,
    ack: T,
) -> MongophResult<WriteOutcome<T>> {
    Ok(match returning {
        Returning::Listing => WriteOutcome::Listing(list_on(connection, collection, Query::default()).await?),
        Returning::Ack => WriteOutcome::Ack(ack),
    })
}
