//! In-memory connection provider for mongoph.
//!
//! This crate implements the `Connector` and `Connection` traits of `mongoph-core`
//! entirely in process memory. It understands the same criteria, update,
//! projection and aggregation documents the record store sends to MongoDB, for
//! the subset of operators listed below, which makes it suitable for tests and
//! local development.
//!
//! # Supported operators
//!
//! - **Criteria** - implicit equality, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`,
//!   `$in`, `$nin`, `$exists`, `$not`, `$and`, `$or`, `$nor`
//! - **Updates** - `$set`, `$unset`, `$inc`, `$push`, `$addToSet`, `$pull`
//! - **Aggregation** - `$match`, `$sort`, `$skip`, `$limit`, `$project`, `$count`
//!
//! # Quick Start
//!
//! ```ignore
//! use mongoph::{store::RecordStore, config::Config, memory::InMemoryConnector};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder("mongodb://unused").build();
//!     let store = RecordStore::new(InMemoryConnector::new(), config);
//!
//!     let key = store
//!         .insert_one("shop", "orders", doc! { "total": 12 }, Default::default())
//!         .await?
//!         .into_ack();
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongoph_memory;

pub mod store;

mod evaluator;
mod pipeline;
mod projection;
mod update;

pub use store::{InMemoryConnection, InMemoryConnector, InMemoryConnectorBuilder};
