//! Auto-incrementing identifier generator.
//!
//! Each tracked collection owns one counter entry `{ _id: <collection>, tally: n }`
//! in the counter collection. Identifiers are minted with a single atomic
//! upsert-with-increment that returns the post-increment tally, so concurrent
//! callers (in this process or any other) never observe the same value and the
//! generator itself never leaves gaps.
//!
//! Counters are not rolled back when the insert that consumed an identifier
//! fails: identifiers are allocated at least once, not used exactly once.

use crate::{
    backend::{Connection, Connector, scoped},
    error::MongophResult,
};

/// Mints sequence identifiers for named collections.
///
/// Obtained from [`RecordStore::identifiers`](crate::store::RecordStore::identifiers).
#[derive(Debug)]
pub struct IdentifierGenerator<'a, C: Connector> {
    connector: &'a C,
    counters: &'a str,
}

impl<'a, C: Connector> IdentifierGenerator<'a, C> {
    pub(crate) fn new(connector: &'a C, counters: &'a str) -> Self {
        Self { connector, counters }
    }

    /// Name of the collection holding the counter entries.
    pub fn counter_collection(&self) -> &str {
        self.counters
    }

    /// Returns the next identifier for `collection`, starting at 1.
    ///
    /// # Errors
    ///
    /// Returns [`MongophError::Connection`](crate::error::MongophError::Connection)
    /// if no connection can be opened and
    /// [`MongophError::DatabaseOperation`](crate::error::MongophError::DatabaseOperation)
    /// naming `collection` if the increment fails.
    pub async fn next_identifier(&self, database: &str, collection: &str) -> MongophResult<i64> {
        scoped(self.connector, database, async |connection| {
            next_on(connection, self.counters, collection).await
        })
        .await
    }

    /// Creates the counter entry for `collection` with tally 0 if it is missing.
    ///
    /// No identifier is consumed: the next call to
    /// [`next_identifier`](Self::next_identifier) still returns 1 for a fresh entry.
    pub async fn ensure_counter(&self, database: &str, collection: &str) -> MongophResult<()> {
        scoped(self.connector, database, async |connection| {
            ensure_on(connection, self.counters, collection).await
        })
        .await
    }
}

/// Mints the next identifier on an already open connection.
pub(crate) async fn next_on<K: Connection>(
    connection: &K,
    counters: &str,
    collection: &str,
) -> MongophResult<i64> {
    let tally = connection.increment_counter(counters, collection).await?;

    if tally == 1 {
        log::info!("initialized identifier counter for {collection}");
    }
    log::debug!("generated identifier {tally} for {collection}");

    Ok(tally)
}

pub(crate) async fn ensure_on<K: Connection>(
    connection: &K,
    counters: &str,
    collection: &str,
) -> MongophResult<()> {
    connection.init_counter(counters, collection).await
}
