//! Collection view with the database and collection name bound.
//!
//! # Example
//!
//! ```ignore
//! let users = store.collection("app", "users");
//!
//! users.insert_one(doc! { "name": "Alice" }, Returning::Ack).await?;
//! let alice = users.find_one(doc! { "name": "Alice" }, None).await?;
//! ```

use bson::Document;

use crate::{
    backend::Connector,
    error::MongophResult,
    query::{FindOptions, UpdateOperator},
    record::Record,
    store::{RecordStore, Returning, WriteOutcome},
};

/// A named collection in a named database, borrowed from a [`RecordStore`].
///
/// Every method forwards to the store operation of the same name.
#[derive(Debug)]
pub struct Collection<'a, C: Connector> {
    store: &'a RecordStore<C>,
    database: String,
    name: String,
}

impl<'a, C: Connector> Collection<'a, C> {
    pub(crate) fn new(store: &'a RecordStore<C>, database: String, name: String) -> Self {
        Self { store, database, name }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn find_one(&self, criteria: Document, projection: Option<Document>) -> MongophResult<Option<Record>> {
        self.store
            .find_one(&self.database, &self.name, criteria, projection)
            .await
    }

    pub async fn find(&self, options: FindOptions) -> MongophResult<Vec<Record>> {
        self.store.find(&self.database, &self.name, options).await
    }

    pub async fn insert_one(&self, record: Record, returning: Returning) -> MongophResult<WriteOutcome<String>> {
        self.store
            .insert_one(&self.database, &self.name, record, returning)
            .await
    }

    pub async fn insert_many(
        &self,
        records: Vec<Record>,
        returning: Returning,
    ) -> MongophResult<WriteOutcome<Vec<String>>> {
        self.store
            .insert_many(&self.database, &self.name, records, returning)
            .await
    }

    pub async fn update_one(
        &self,
        criteria: Document,
        operator: impl Into<UpdateOperator>,
        patch: Document,
        returning: Returning,
    ) -> MongophResult<WriteOutcome<bool>> {
        self.store
            .update_one(&self.database, &self.name, criteria, operator, patch, returning)
            .await
    }

    pub async fn delete_one(&self, criteria: Document, returning: Returning) -> MongophResult<WriteOutcome<bool>> {
        self.store
            .delete_one(&self.database, &self.name, criteria, returning)
            .await
    }

    pub async fn delete_many(&self, criteria: Document, returning: Returning) -> MongophResult<WriteOutcome<bool>> {
        self.store
            .delete_many(&self.database, &self.name, criteria, returning)
            .await
    }

    pub async fn count(&self, criteria: Document) -> MongophResult<u64> {
        self.store.count(&self.database, &self.name, criteria).await
    }

    pub async fn aggregate(&self, pipeline: Vec<Document>) -> MongophResult<Vec<Record>> {
        self.store.aggregate(&self.database, &self.name, pipeline).await
    }

    /// Next identifier of this collection's sequence.
    pub async fn next_identifier(&self) -> MongophResult<i64> {
        self.store
            .identifiers()
            .next_identifier(&self.database, &self.name)
            .await
    }
}
