//! Query builder module
//!
//! Builders are plain values until they run. Each one is consumed by
//! `execute()` or `.await`; composition errors surface before the executor
//! is touched.

pub mod common;
pub mod delete;
pub mod from;
pub mod insert;
pub mod select;
pub mod update;

// Re-export types from submodules
pub use common::{Filter, Filtered};
pub use delete::DeleteQuery;
pub use from::FromQuery;
pub use insert::{InsertQuery, ReturningInsertQuery};
pub use select::{CountQuery, SelectQuery};
pub use update::UpdateQuery;
