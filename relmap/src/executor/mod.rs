//! Statement execution interface

use std::future::Future;

use crate::statement::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};
use crate::value::Row;
use crate::Result;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Runs statement descriptions against a database
///
/// Rows come back keyed by result column label. Implementations pass database
/// errors through unchanged.
pub trait Executor: Send + Sync {
    /// Execute a SELECT and return every row
    fn select(&self, statement: &SelectStatement) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Execute an INSERT; rows are returned only when the statement has a returning list
    fn insert(&self, statement: &InsertStatement) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Execute an UPDATE and return the number of affected rows
    fn update(&self, statement: &UpdateStatement) -> impl Future<Output = Result<u64>> + Send;

    /// Execute a DELETE and return the number of affected rows
    fn delete(&self, statement: &DeleteStatement) -> impl Future<Output = Result<u64>> + Send;

    /// Remove every row of a table
    fn truncate(&self, table: &str) -> impl Future<Output = Result<()>> + Send;
}

/// An executor bound to one open transaction
pub trait Transaction: Executor {
    /// Commit the transaction
    fn commit(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;

    /// Rollback the transaction
    fn rollback(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// Extension trait for executors that can open transactions
pub trait TransactionalExecutor: Executor {
    type Transaction: Transaction;

    /// Start a new transaction
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}
