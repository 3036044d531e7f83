//! UPDATE query builder implementation

use std::future::IntoFuture;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::codec::{self, SerializationOptions};
use crate::executor::Executor;
use crate::mapping::Mapping;
use crate::statement::{Statement, UpdateStatement};
use crate::value::Record;
use crate::{Error, Result};

use super::common::{Filter, Filtered};

/// UPDATE from an instance's mapped keys; resolves to the number of affected rows
pub struct UpdateQuery<'a, E> {
    executor: &'a E,
    statement: UpdateStatement,
    filter: Filter,
}

impl<'a, E: Executor> UpdateQuery<'a, E> {
    pub(crate) fn new<T: Serialize + ?Sized>(
        executor: &'a E,
        options: SerializationOptions,
        mapping: &Mapping,
        instance: &T,
    ) -> Result<Self> {
        let record = Record::from_serialize(instance)?;
        let row = codec::serialize(mapping, &record, options)?;
        if row.is_empty() {
            return Err(Error::invalid_query(format!(
                "update of {} sets no mapped attribute",
                mapping.table_name()
            )));
        }

        let mut statement = UpdateStatement::new(mapping.table_name());
        statement.values = row.into_iter().collect();

        Ok(Self {
            executor,
            statement,
            filter: Filter::default(),
        })
    }

    /// The statement this query will run
    pub fn statement(&self) -> UpdateStatement {
        let mut statement = self.statement.clone();
        statement.where_clause = self.filter.to_fragment();
        statement
    }

    pub fn to_sql(&self) -> Result<String> {
        self.statement().to_sql()
    }

    /// Execute the update and return the number of affected rows
    pub async fn execute(self) -> Result<u64> {
        if self.filter.is_empty() {
            tracing::debug!(table = %self.statement.table, "update without conditions affects every row");
        }

        let affected = self.executor.update(&self.statement()).await?;
        tracing::debug!(table = %self.statement.table, affected, "updated");
        Ok(affected)
    }
}

impl<E> Filtered for UpdateQuery<'_, E> {
    fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }
}

impl<'a, E: Executor> IntoFuture for UpdateQuery<'a, E> {
    type Output = Result<u64>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}
