//! DELETE query builder implementation

use std::future::IntoFuture;

use futures::future::BoxFuture;

use crate::executor::Executor;
use crate::mapping::Mapping;
use crate::statement::{DeleteStatement, Statement};
use crate::Result;

use super::common::{Filter, Filtered};

/// DELETE from one table; resolves to `()`
pub struct DeleteQuery<'a, E> {
    executor: &'a E,
    table: String,
    filter: Filter,
}

impl<'a, E: Executor> DeleteQuery<'a, E> {
    pub(crate) fn new(executor: &'a E, mapping: &Mapping) -> Self {
        Self {
            executor,
            table: mapping.table_name().to_string(),
            filter: Filter::default(),
        }
    }

    /// The statement this query will run
    pub fn statement(&self) -> DeleteStatement {
        let mut statement = DeleteStatement::new(&self.table);
        statement.where_clause = self.filter.to_fragment();
        statement
    }

    pub fn to_sql(&self) -> Result<String> {
        self.statement().to_sql()
    }

    /// Execute the delete
    pub async fn execute(self) -> Result<()> {
        if self.filter.is_empty() {
            tracing::debug!(table = %self.table, "delete without conditions removes every row");
        }

        let deleted = self.executor.delete(&self.statement()).await?;
        tracing::debug!(table = %self.table, deleted, "deleted");
        Ok(())
    }
}

impl<E> Filtered for DeleteQuery<'_, E> {
    fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }
}

impl<'a, E: Executor> IntoFuture for DeleteQuery<'a, E> {
    type Output = Result<()>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}
