//! Database layer.
//!
//! This module provides the crate's working parts:
//! - Driver pool handling and DSN-to-driver translation
//! - The connection facade (execute/fetch helpers, attribute snapshot)
//! - Catalog introspection and provisioning
//! - Dump/restore orchestration over external tools
//! - Parameter binding and row-to-JSON type mappings

pub mod catalog;
pub mod dump;
pub mod facade;
pub mod params;
pub mod pool;
pub mod types;

pub use catalog::Catalog;
pub use facade::{ATTRIBUTE_NAMES, Bindings, Connection, Outcome};
pub use params::Param;
pub use pool::DbPool;
pub use types::RowMap;
