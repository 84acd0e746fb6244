//! MongoDB connection provider for mongoph.
//!
//! [`MongoDbConnector`] implements the `Connector` trait of `mongoph-core` on top of
//! the official `mongodb` driver. Each connection owns its own client, verified
//! with a `ping` before use and shut down when the connection is released.
//!
//! # Example
//!
//! ```ignore
//! use mongoph::{config::Config, mongodb::MongoDbConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let store = MongoDbConnector::record_store(config)?;
//!
//!     let total = store.count("shop", "orders", Default::default()).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongoph_mongodb;

pub mod store;

pub use store::{MongoDbConnection, MongoDbConnector, MongoDbConnectorBuilder};
