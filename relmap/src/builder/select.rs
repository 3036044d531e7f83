//! SELECT query builder implementation
//!
//! A query is consumed when it runs, so it cannot be executed twice:
//!
//! ```compile_fail
//! use relmap::{Mapper, Mapping, Result};
//! use relmap::executor::sqlite::SqliteExecutor;
//!
//! async fn twice(mapper: &Mapper<SqliteExecutor>, order: &Mapping) -> Result<()> {
//!     let query = mapper.select_all_from(order)?;
//!     let first = query.execute().await?;
//!     let second = query.execute().await?;
//!     Ok(())
//! }
//! ```

use std::future::IntoFuture;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::aggregation::count;
use crate::codec::{self, FieldMap, SerializationOptions};
use crate::executor::Executor;
use crate::expression::{Expression, Projection};
use crate::mapping::Mapping;
use crate::statement::{OrderByClause, SelectStatement, SortDirection, Statement};
use crate::value::{Record, Value};
use crate::{Error, Result};

use super::common::{Filter, Filtered, Scope};

/// SELECT query with its result shape chosen
pub struct SelectQuery<'a, E> {
    executor: &'a E,
    options: SerializationOptions,
    scope: Scope,
    statement: SelectStatement,
    fields: FieldMap,
    filter: Filter,
}

impl<'a, E: Executor> SelectQuery<'a, E> {
    pub(crate) fn new(
        executor: &'a E,
        options: SerializationOptions,
        scope: Scope,
        statement: SelectStatement,
        fields: FieldMap,
    ) -> Self {
        Self {
            executor,
            options,
            scope,
            statement,
            fields,
            filter: Filter::default(),
        }
    }

    /// Add an ORDER BY clause
    pub fn order_by(mut self, expression: impl Into<Expression>, direction: SortDirection) -> Result<Self> {
        let expression = expression.into();
        let sql = expression.to_sql();
        self.scope.check(&sql, &expression)?;

        self.statement.order_by.push(OrderByClause {
            expression: sql,
            direction,
        });
        Ok(self)
    }

    /// Add a GROUP BY expression
    pub fn group_by(mut self, expression: impl Into<Expression>) -> Result<Self> {
        let expression = expression.into();
        let sql = expression.to_sql();
        self.scope.check(&sql, &expression)?;

        self.statement.group_by.push(sql);
        Ok(self)
    }

    /// Set LIMIT
    pub fn limit(mut self, limit: u64) -> Self {
        self.statement.limit = Some(limit);
        self
    }

    /// Set OFFSET
    pub fn offset(mut self, offset: u64) -> Self {
        self.statement.offset = Some(offset);
        self
    }

    /// Lock the selected rows until the enclosing transaction ends
    pub fn for_update(mut self) -> Self {
        self.statement.for_update = true;
        self
    }

    /// The statement this query will run
    pub fn statement(&self) -> SelectStatement {
        let mut statement = self.statement.clone();
        statement.where_clause = self.filter.to_fragment();
        statement
    }

    /// Render with the generic dialect
    pub fn to_sql(&self) -> Result<String> {
        self.statement().to_sql()
    }

    /// Execute the query and return every row
    pub async fn execute(self) -> Result<Vec<Record>> {
        let statement = self.statement();
        let rows = self.executor.select(&statement).await?;
        tracing::debug!(table = %statement.table, rows = rows.len(), "selected");

        rows.iter()
            .map(|row| codec::deserialize(&self.fields, row, self.options))
            .collect()
    }

    /// Execute the query and deserialize every row into `T`
    pub async fn fetch_all<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        self.execute()
            .await?
            .iter()
            .map(Record::deserialize_into)
            .collect()
    }

    /// At most one row; two or more is an error
    ///
    /// Without an explicit limit, fetches with LIMIT 2 so a second row is noticed.
    pub async fn try_get_one(mut self) -> Result<Option<Record>> {
        if self.statement.limit.is_none() {
            self.statement.limit = Some(2);
        }

        let mut records = self.execute().await?;
        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            found => Err(Error::more_than_one(found)),
        }
    }

    /// Exactly one row
    pub async fn get_one(self) -> Result<Record> {
        self.try_get_one()
            .await?
            .ok_or_else(|| Error::not_exactly_one(0))
    }

    pub async fn try_get_one_as<T: DeserializeOwned>(self) -> Result<Option<T>> {
        self.try_get_one()
            .await?
            .map(|record| record.deserialize_into())
            .transpose()
    }

    pub async fn get_one_as<T: DeserializeOwned>(self) -> Result<T> {
        self.get_one().await?.deserialize_into()
    }
}

impl<E> Filtered for SelectQuery<'_, E> {
    fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }
}

impl<'a, E: Executor> IntoFuture for SelectQuery<'a, E> {
    type Output = Result<Vec<Record>>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

/// `SELECT count(*)` over one table; resolves to the number of matching rows
pub struct CountQuery<'a, E> {
    inner: SelectQuery<'a, E>,
}

impl<'a, E: Executor> CountQuery<'a, E> {
    pub(crate) fn new(executor: &'a E, options: SerializationOptions, mapping: &Mapping) -> Self {
        let projection = Projection::new().field("value", count());
        let mut statement = SelectStatement::new(mapping.table_name());
        statement.columns = projection.select_list();

        Self {
            inner: SelectQuery::new(
                executor,
                options,
                Scope::new(mapping),
                statement,
                projection.field_map(),
            ),
        }
    }

    pub fn to_sql(&self) -> Result<String> {
        self.inner.to_sql()
    }

    pub async fn execute(self) -> Result<u64> {
        let records = self.inner.execute().await?;

        let [record] = records.as_slice() else {
            return Err(Error::internal(format!(
                "count query returned {} rows",
                records.len()
            )));
        };

        match record.get("value") {
            Some(Value::Int(n)) if *n >= 0 => Ok(*n as u64),
            other => Err(Error::internal(format!(
                "count query returned a non-count value: {:?}",
                other
            ))),
        }
    }
}

impl<E> Filtered for CountQuery<'_, E> {
    fn filter_mut(&mut self) -> &mut Filter {
        self.inner.filter_mut()
    }
}

impl<'a, E: Executor> IntoFuture for CountQuery<'a, E> {
    type Output = Result<u64>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}
