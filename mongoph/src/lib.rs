//! Main mongoph crate: a thin convenience layer over a MongoDB deployment.
//!
//! It re-exports the core record store and its helpers, and gives access to
//! the available connection providers.
//!
//! # Features
//!
//! - **Per-operation connections** - every call opens, uses and releases its own connection
//! - **Sequential identifiers** - atomic per-collection counters stamped as `id`
//! - **Reference keys and timestamps** - `record_id`, `created_at` and `updated_at` on every record
//! - **Pagination** - skip/limit pagers validated before any I/O
//! - **Normalized output** - datetimes come back as `%Y-%m-%dT%H:%M:%S` strings
//! - **Index management** - idempotent text indexes named `<collection>_<field>`
//!
//! # Quick Start
//!
//! ```ignore
//! use mongoph::{prelude::*, memory::InMemoryConnector};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RecordStore::new(InMemoryConnector::new(), Config::builder("mongodb://localhost").build());
//!     let orders = store.collection("shop", "orders");
//!
//!     orders.insert_one(doc! { "total": 12 }, Returning::Ack).await?;
//!     orders.insert_one(doc! { "total": 30 }, Returning::Ack).await?;
//!
//!     let page = orders
//!         .find(
//!             FindOptions::builder()
//!                 .criteria(Filter::gt("total", 10))
//!                 .pager(Pager::new(0, 10))
//!                 .build(),
//!         )
//!         .await?;
//!
//!     println!("{page:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Connection providers
//!
//! - [`memory`] - In-process databases for development and testing
//! - [`mongodb`] - A MongoDB deployment (requires the `mongodb` feature)

pub mod prelude;

pub use mongoph_core::{backend, collection, config, error, identifier, index, page, query, record, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory connection provider.
pub mod memory {
    pub use mongoph_memory::{InMemoryConnection, InMemoryConnector, InMemoryConnectorBuilder};
}

/// MongoDB connection provider.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use mongoph_mongodb::{MongoDbConnection, MongoDbConnector, MongoDbConnectorBuilder};
}
