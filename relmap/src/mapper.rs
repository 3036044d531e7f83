//! The root entry point: builders bound to an executor and serialization options

use futures::future::BoxFuture;
use serde::Serialize;

use crate::builder::{
    CountQuery, DeleteQuery, Filtered, FromQuery, InsertQuery, SelectQuery, UpdateQuery,
};
use crate::codec::{self, SerializationOptions};
use crate::executor::{Executor, Transaction, TransactionalExecutor};
use crate::mapping::Mapping;
use crate::value::{Record, Value};
use crate::{Error, Result};

/// Starts every query against one executor
///
/// # Examples
/// ```no_run
/// use relmap::executor::sqlite::SqliteExecutor;
/// use relmap::{define_mapping, number, Filtered, Mapper, SerializationOptions};
///
/// # async fn run() -> relmap::Result<()> {
/// let order = define_mapping("order", [("id", number())])?;
/// let mapper = Mapper::new(SqliteExecutor::connect("sqlite://orders.db").await?, SerializationOptions::default());
///
/// let orders = mapper
///     .select_all_from(&order)?
///     .where_greater(&order.attribute("id")?, 10)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Mapper<E> {
    executor: E,
    options: SerializationOptions,
}

impl<E: Executor> Mapper<E> {
    pub fn new(executor: E, options: SerializationOptions) -> Self {
        Self { executor, options }
    }

    pub fn options(&self) -> SerializationOptions {
        self.options
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Start a from-clause on `mapping`
    pub fn from(&self, mapping: &Mapping) -> FromQuery<'_, E> {
        FromQuery::new(&self.executor, self.options, mapping)
    }

    /// Select every attribute of `mapping`
    pub fn select_all_from(&self, mapping: &Mapping) -> Result<SelectQuery<'_, E>> {
        self.from(mapping).select_all(mapping)
    }

    /// Count the rows of `mapping`
    pub fn select_count_from(&self, mapping: &Mapping) -> CountQuery<'_, E> {
        CountQuery::new(&self.executor, self.options, mapping)
    }

    /// Insert one instance; keys the mapping does not declare are ignored
    pub fn insert_into<T: Serialize + ?Sized>(&self, mapping: &Mapping, instance: &T) -> Result<InsertQuery<'_, E>> {
        InsertQuery::single(&self.executor, self.options, mapping, instance)
    }

    /// Insert many instances in one statement
    pub fn batch_insert_into<T: Serialize>(&self, mapping: &Mapping, instances: &[T]) -> Result<InsertQuery<'_, E>> {
        InsertQuery::batch(&self.executor, self.options, mapping, instances)
    }

    /// Update rows of `mapping` with the instance's mapped keys
    pub fn update_with<T: Serialize + ?Sized>(&self, mapping: &Mapping, instance: &T) -> Result<UpdateQuery<'_, E>> {
        UpdateQuery::new(&self.executor, self.options, mapping, instance)
    }

    pub fn delete_from(&self, mapping: &Mapping) -> DeleteQuery<'_, E> {
        DeleteQuery::new(&self.executor, mapping)
    }

    /// Remove every row of `mapping`
    pub async fn truncate(&self, mapping: &Mapping) -> Result<()> {
        tracing::debug!(table = mapping.table_name(), "truncate");
        self.executor.truncate(mapping.table_name()).await
    }

    /// Look a row up by the attributes present in `key`
    ///
    /// Keys the mapping does not declare are ignored, so a whole instance can
    /// serve as its own key. A `Null` key value matches with `IS NULL`.
    /// Returns `None` when nothing matches and fails when more than one row does.
    pub async fn try_find_one_by_key<K: Serialize + ?Sized>(&self, mapping: &Mapping, key: &K) -> Result<Option<Record>> {
        let key = Record::from_serialize(key)?;
        let row = codec::serialize(mapping, &key, self.options)?;
        if row.is_empty() {
            return Err(Error::invalid_query(format!(
                "lookup key has no attribute of {}",
                mapping.table_name()
            )));
        }

        let attributes = mapping.column_attribute_map();
        let mut query = self.select_all_from(mapping)?;
        for (column, value) in row {
            let attribute = attributes
                .get(&column)
                .ok_or_else(|| Error::internal(format!("serialized column '{}' has no attribute", column)))?;
            query = match value {
                Value::Null => query.where_null(attribute),
                value => query.where_equal(attribute, value),
            };
        }

        query.try_get_one().await
    }

    /// Like [`try_find_one_by_key`](Mapper::try_find_one_by_key), but a missing row is an error
    pub async fn find_one_by_key<K: Serialize + ?Sized>(&self, mapping: &Mapping, key: &K) -> Result<Record> {
        self.try_find_one_by_key(mapping, key)
            .await?
            .ok_or_else(|| Error::not_exactly_one(0))
    }
}

impl<E: TransactionalExecutor> Mapper<E> {
    /// Run `body` inside a transaction
    ///
    /// The body gets a mapper bound to the transaction. `Ok` commits; `Err`
    /// rolls back and is returned unchanged, even when the rollback itself fails.
    ///
    /// # Examples
    /// ```no_run
    /// use relmap::executor::sqlite::SqliteExecutor;
    /// use relmap::{define_mapping, number, Error, Mapper, Record};
    ///
    /// # async fn run(mapper: Mapper<SqliteExecutor>) -> relmap::Result<()> {
    /// let order = define_mapping("order", [("id", number())])?;
    ///
    /// let inserted = mapper
    ///     .transaction(move |tx| {
    ///         Box::pin(async move {
    ///             tx.insert_into(&order, &Record::new().with("id", 1))?.await?;
    ///             Ok::<_, Error>(1)
    ///         })
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn transaction<T, Err, F>(&self, body: F) -> std::result::Result<T, Err>
    where
        Err: From<Error>,
        F: for<'t> FnOnce(&'t Mapper<E::Transaction>) -> BoxFuture<'t, std::result::Result<T, Err>>,
    {
        let tx = self.executor.begin().await?;
        tracing::debug!("transaction started");

        let scoped = Mapper::new(tx, self.options);
        let outcome = body(&scoped).await;
        let tx = scoped.executor;

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                match tx.rollback().await {
                    Ok(()) => tracing::debug!("transaction rolled back"),
                    Err(rollback_err) => tracing::warn!(error = %rollback_err, "transaction rollback failed"),
                }
                Err(err)
            }
        }
    }
}
