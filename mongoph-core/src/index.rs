//! Index and collection management.
//!
//! Indexes are named `<collection>_<field>`. Existence is always checked by name
//! before creation, so asking twice never creates a duplicate.

use crate::{
    backend::{Connection, Connector, scoped},
    error::MongophResult,
    identifier::ensure_on,
};

/// Composite index name for `field` on `collection`.
pub fn index_name(collection: &str, field: &str) -> String {
    format!("{collection}_{field}")
}

/// Checks for and creates collections and text indexes.
///
/// Obtained from [`RecordStore::indexes`](crate::store::RecordStore::indexes).
#[derive(Debug)]
pub struct IndexManager<'a, C: Connector> {
    connector: &'a C,
    counters: &'a str,
}

impl<'a, C: Connector> IndexManager<'a, C> {
    pub(crate) fn new(connector: &'a C, counters: &'a str) -> Self {
        Self { connector, counters }
    }

    /// Reports whether `collection` existed before this call.
    ///
    /// When it did not and `create_if_absent` is set, the collection is created
    /// and its identifier counter is initialized (tally 0), so the first record
    /// inserted afterwards still receives `id` 1.
    pub async fn collection_exists(
        &self,
        database: &str,
        collection: &str,
        create_if_absent: bool,
    ) -> MongophResult<bool> {
        scoped(self.connector, database, async |connection| {
            let exists = connection
                .list_collections()
                .await?
                .iter()
                .any(|name| name == collection);

            if !exists && create_if_absent {
                connection.create_collection(collection).await?;
                ensure_on(connection, self.counters, collection).await?;
                log::info!("created collection {collection}");
            }

            Ok(exists)
        })
        .await
    }

    /// Reports whether the `<collection>_<field>` index existed before this call.
    ///
    /// When it did not and `create_if_absent` is set, a text index on `field` is
    /// created under that name.
    pub async fn check_index(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        create_if_absent: bool,
    ) -> MongophResult<bool> {
        scoped(self.connector, database, async |connection| {
            let exists = has_index(connection, collection, field).await?;

            if !exists && create_if_absent {
                create_on(connection, collection, field).await?;
            }

            Ok(exists)
        })
        .await
    }

    /// Creates a text index on `field` unless one with the composite name exists.
    pub async fn create_index(&self, database: &str, collection: &str, field: &str) -> MongophResult<()> {
        scoped(self.connector, database, async |connection| {
            if !has_index(connection, collection, field).await? {
                create_on(connection, collection, field).await?;
            }

            Ok(())
        })
        .await
    }

    /// Lists the index names of `collection` (empty if it does not exist).
    pub async fn list_indexes(&self, database: &str, collection: &str) -> MongophResult<Vec<String>> {
        scoped(self.connector, database, async |connection| {
            connection.list_indexes(collection).await
        })
        .await
    }
}

async fn has_index<K: Connection>(connection: &K, collection: &str, field: &str) -> MongophResult<bool> {
    let name = index_name(collection, field);

    Ok(connection
        .list_indexes(collection)
        .await?
        .iter()
        .any(|existing| *existing == name))
}

async fn create_on<K: Connection>(connection: &K, collection: &str, field: &str) -> MongophResult<()> {
    let name = index_name(collection, field);

    connection.create_text_index(collection, field, &name).await?;
    log::info!("created text index {name} on {collection}");

    Ok(())
}
