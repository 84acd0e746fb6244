//! Convenient re-exports of commonly used types from mongoph.
//!
//! ```ignore
//! use mongoph::prelude::*;
//! ```

pub use mongoph_core::{
    backend::{Connection, Connector, scoped},
    collection::Collection,
    config::{Config, ConfigBuilder},
    error::{MongophError, MongophResult},
    identifier::IdentifierGenerator,
    index::{IndexManager, index_name},
    page::{Pager, PaginationParams},
    query::{Expr, FieldOp, Filter, FindOptions, FindOptionsBuilder, Query, QueryVisitor, Sort, SortDirection, UpdateOperator},
    record::{Record, normalize, normalized},
    store::{RecordStore, Returning, WriteOutcome},
};
