//! SQLite executor backed by a `sqlx` pool
//!
//! Datetimes are stored as epoch milliseconds and JSON as text. SQLite has no
//! row locks and no TRUNCATE, so `FOR UPDATE` is dropped and truncation
//! becomes an unconditional DELETE.

use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as SqlxRow, Sqlite, ValueRef};
use tokio::sync::Mutex;

use super::{Executor, Transaction, TransactionalExecutor};
use crate::statement::{
    DeleteStatement, Dialect, InsertStatement, SelectStatement, Statement, TruncateStatement,
    UpdateStatement,
};
use crate::value::Row;
use crate::{Error, Result, Value};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite connection pool wrapper
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    /// Connect to a database URL such as `sqlite://orders.db`
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database
    ///
    /// The pool holds a single connection that is never recycled, since every
    /// connection to `sqlite::memory:` would otherwise see its own empty database.
    pub async fn memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Executor for SqliteExecutor {
    async fn select(&self, statement: &SelectStatement) -> Result<Vec<Row>> {
        let mut conn = self.pool.acquire().await?;
        fetch_rows(&mut conn, statement).await
    }

    async fn insert(&self, statement: &InsertStatement) -> Result<Vec<Row>> {
        let mut conn = self.pool.acquire().await?;
        insert_rows(&mut conn, statement).await
    }

    async fn update(&self, statement: &UpdateStatement) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        execute(&mut conn, statement).await
    }

    async fn delete(&self, statement: &DeleteStatement) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        execute(&mut conn, statement).await
    }

    async fn truncate(&self, table: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        execute(&mut conn, &TruncateStatement::new(table)).await?;
        Ok(())
    }
}

/// SQLite transaction wrapper
pub struct SqliteTransaction {
    inner: Mutex<sqlx::Transaction<'static, Sqlite>>,
}

impl Executor for SqliteTransaction {
    async fn select(&self, statement: &SelectStatement) -> Result<Vec<Row>> {
        let mut tx = self.inner.lock().await;
        fetch_rows(&mut tx, statement).await
    }

    async fn insert(&self, statement: &InsertStatement) -> Result<Vec<Row>> {
        let mut tx = self.inner.lock().await;
        insert_rows(&mut tx, statement).await
    }

    async fn update(&self, statement: &UpdateStatement) -> Result<u64> {
        let mut tx = self.inner.lock().await;
        execute(&mut tx, statement).await
    }

    async fn delete(&self, statement: &DeleteStatement) -> Result<u64> {
        let mut tx = self.inner.lock().await;
        execute(&mut tx, statement).await
    }

    async fn truncate(&self, table: &str) -> Result<()> {
        let mut tx = self.inner.lock().await;
        execute(&mut tx, &TruncateStatement::new(table)).await?;
        Ok(())
    }
}

impl Transaction for SqliteTransaction {
    async fn commit(self) -> Result<()> {
        self.inner.into_inner().commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.inner.into_inner().rollback().await?;
        Ok(())
    }
}

impl TransactionalExecutor for SqliteExecutor {
    type Transaction = SqliteTransaction;

    async fn begin(&self) -> Result<Self::Transaction> {
        let tx = self.pool.begin().await?;
        Ok(SqliteTransaction {
            inner: Mutex::new(tx),
        })
    }
}

async fn fetch_rows(conn: &mut SqliteConnection, statement: &SelectStatement) -> Result<Vec<Row>> {
    let sql = statement.to_sql_for(&Dialect::SQLITE)?;
    let params = statement.parameters();
    tracing::debug!(%sql, params = params.len(), "select");

    let rows = bind_values(sqlx::query(&sql), &params)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(convert_row).collect()
}

async fn insert_rows(conn: &mut SqliteConnection, statement: &InsertStatement) -> Result<Vec<Row>> {
    let sql = statement.to_sql_for(&Dialect::SQLITE)?;
    let params = statement.parameters();
    tracing::debug!(%sql, params = params.len(), "insert");

    let query = bind_values(sqlx::query(&sql), &params);
    if statement.returning.is_empty() {
        query.execute(&mut *conn).await?;
        Ok(Vec::new())
    } else {
        let rows = query.fetch_all(&mut *conn).await?;
        rows.iter().map(convert_row).collect()
    }
}

async fn execute(conn: &mut SqliteConnection, statement: &impl Statement) -> Result<u64> {
    let sql = statement.to_sql_for(&Dialect::SQLITE)?;
    let params = statement.parameters();
    tracing::debug!(%sql, params = params.len(), "execute");

    let result = bind_values(sqlx::query(&sql), &params)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Bind values to a SQLite query
fn bind_values<'q>(mut query: SqliteQuery<'q>, params: &[Value]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.clone()),
            Value::DateTime(dt) => query.bind(dt.timestamp_millis()),
            Value::Json(j) => query.bind(j.to_string()),
        };
    }
    query
}

/// Convert a result row, keyed by column label
///
/// Values are classified by their runtime storage class, so untyped
/// expression columns such as aggregates convert like table columns.
fn convert_row(row: &SqliteRow) -> Result<Row> {
    let mut converted = Row::with_capacity(row.columns().len());

    for (i, column) in row.columns().iter().enumerate() {
        let value = if row.try_get_raw(i)?.is_null() {
            Value::Null
        } else if let Ok(value) = row.try_get::<i64, _>(i) {
            Value::Int(value)
        } else if let Ok(value) = row.try_get::<f64, _>(i) {
            Value::Float(value)
        } else if let Ok(value) = row.try_get::<String, _>(i) {
            Value::String(value)
        } else if let Ok(value) = row.try_get::<bool, _>(i) {
            Value::Bool(value)
        } else {
            return Err(Error::internal(format!(
                "unsupported value in result column '{}'",
                column.name()
            )));
        };

        converted.insert(column.name().to_string(), value);
    }

    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn executor_with_table() -> SqliteExecutor {
        let executor = SqliteExecutor::memory().await.unwrap();
        sqlx::query("CREATE TABLE item (id INTEGER PRIMARY KEY, label TEXT, price REAL)")
            .execute(executor.pool())
            .await
            .unwrap();
        executor
    }

    fn insert_item(id: i64, label: Option<&str>, price: f64) -> InsertStatement {
        let mut statement = InsertStatement::new("item");
        statement.columns = vec!["id".into(), "label".into(), "price".into()];
        statement.rows = vec![vec![Value::Int(id), Value::from(label), Value::Float(price)]];
        statement
    }

    fn select_items() -> SelectStatement {
        let mut statement = SelectStatement::new("item");
        statement.columns = vec![
            "\"item\".\"id\" AS \"id\"".to_string(),
            "\"item\".\"label\" AS \"label\"".to_string(),
            "\"item\".\"price\" AS \"price\"".to_string(),
        ];
        statement
    }

    #[tokio::test]
    async fn test_round_trip_storage_classes() {
        let executor = executor_with_table().await;
        executor.insert(&insert_item(1, Some("a"), 2.5)).await.unwrap();
        executor.insert(&insert_item(2, None, 1.0)).await.unwrap();

        let rows = executor.select(&select_items()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], Value::Int(1));
        assert_eq!(rows[0]["label"], Value::from("a"));
        assert_eq!(rows[0]["price"], Value::Float(2.5));
        assert_eq!(rows[1]["label"], Value::Null);
    }

    #[tokio::test]
    async fn test_for_update_is_dropped() {
        let executor = executor_with_table().await;
        let mut statement = select_items();
        statement.for_update = true;

        assert!(executor.select(&statement).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_truncate_and_affected_rows() {
        let executor = executor_with_table().await;
        executor.insert(&insert_item(1, Some("a"), 2.5)).await.unwrap();

        let mut update = UpdateStatement::new("item");
        update.values = vec![("label".to_string(), Value::from("b"))];
        assert_eq!(executor.update(&update).await.unwrap(), 1);

        executor.truncate("item").await.unwrap();
        assert!(executor.select(&select_items()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_writes() {
        let executor = executor_with_table().await;

        let tx = executor.begin().await.unwrap();
        tx.insert(&insert_item(1, Some("a"), 2.5)).await.unwrap();
        assert_eq!(tx.select(&select_items()).await.unwrap().len(), 1);
        tx.rollback().await.unwrap();

        assert!(executor.select(&select_items()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_database_errors_pass_through() {
        let executor = SqliteExecutor::memory().await.unwrap();
        let err = executor.select(&select_items()).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }
}
