//! A thin convenience layer over a document database.
//!
//! This crate is the core of the mongoph project and provides:
//!
//! - **Configuration** ([`config`]) - Explicit settings resolved once at startup
//! - **Connection abstraction** ([`backend`]) - Connector and connection traits with scoped release
//! - **Record store** ([`store`]) - CRUD, pagination, counting and aggregation
//! - **Collection views** ([`collection`]) - Store operations with the names bound
//! - **Identifier generator** ([`identifier`]) - Atomic per-collection sequences
//! - **Index manager** ([`index`]) - Collection and text-index existence checks
//! - **Criteria and read plans** ([`query`]) - Filters, sorting, projections
//! - **Pagination** ([`page`]) - Skip/limit pagers
//! - **Records** ([`record`]) - Stamped fields and datetime normalization
//! - **Error handling** ([`error`]) - Error taxonomy and result type
//!
//! # Example
//!
//! ```ignore
//! use mongoph::{prelude::*, memory::InMemoryConnector};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> MongophResult<()> {
//!     let store = RecordStore::new(InMemoryConnector::new(), Config::builder("memory://").build());
//!
//!     store.insert_one("app", "users", doc! { "name": "Alice" }, Returning::Ack).await?;
//!     let alice = store.find_one("app", "users", doc! { "name": "Alice" }, None).await?;
//!
//!     assert_eq!(alice.unwrap().get_i64("id").unwrap(), 1);
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongoph_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod error;
pub mod identifier;
pub mod index;
pub mod page;
pub mod query;
pub mod record;
pub mod store;
