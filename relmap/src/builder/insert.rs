//! INSERT query builder implementation

use std::future::IntoFuture;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::codec::{self, aliased_name, FieldMap, SerializationOptions};
use crate::executor::Executor;
use crate::mapping::Mapping;
use crate::statement::{quote_identifier, InsertStatement, Statement};
use crate::value::{Record, Row, Value};
use crate::{Error, Result};

/// INSERT of one or more instances; resolves to `()`
pub struct InsertQuery<'a, E> {
    executor: &'a E,
    options: SerializationOptions,
    mapping: Mapping,
    statement: InsertStatement,
}

impl<'a, E: Executor> InsertQuery<'a, E> {
    /// Insert a single instance; only its mapped keys become columns
    pub(crate) fn single<T: Serialize + ?Sized>(
        executor: &'a E,
        options: SerializationOptions,
        mapping: &Mapping,
        instance: &T,
    ) -> Result<Self> {
        let record = Record::from_serialize(instance)?;
        let row = codec::serialize(mapping, &record, options)?;

        let mut statement = InsertStatement::new(mapping.table_name());
        statement.columns = row.keys().cloned().collect();
        statement.rows = vec![row.into_values().collect()];

        Ok(Self {
            executor,
            options,
            mapping: mapping.clone(),
            statement,
        })
    }

    /// Insert many instances in one statement
    ///
    /// Columns are the union of every instance's mapped keys, in first-seen
    /// order; an instance lacking one of them inserts NULL there.
    pub(crate) fn batch<T: Serialize>(
        executor: &'a E,
        options: SerializationOptions,
        mapping: &Mapping,
        instances: &[T],
    ) -> Result<Self> {
        if instances.is_empty() {
            return Err(Error::invalid_query("batch insert needs at least one instance"));
        }

        let rows = instances
            .iter()
            .map(|instance| {
                let record = Record::from_serialize(instance)?;
                codec::serialize(mapping, &record, options)
            })
            .collect::<Result<Vec<Row>>>()?;

        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for column in row.keys() {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut statement = InsertStatement::new(mapping.table_name());
        statement.rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        statement.columns = columns;

        Ok(Self {
            executor,
            options,
            mapping: mapping.clone(),
            statement,
        })
    }

    /// Read every attribute of the inserted rows back
    pub fn returning_all(mut self) -> ReturningInsertQuery<'a, E> {
        let projection = self.mapping.select_all();
        self.statement.returning = self
            .mapping
            .attributes()
            .iter()
            .map(|attribute| {
                format!(
                    "{} AS {}",
                    attribute.quoted_column(),
                    quote_identifier(&aliased_name(attribute.attribute_name()))
                )
            })
            .collect();

        ReturningInsertQuery {
            executor: self.executor,
            options: self.options,
            statement: self.statement,
            fields: projection.field_map(),
        }
    }

    pub fn statement(&self) -> &InsertStatement {
        &self.statement
    }

    pub fn to_sql(&self) -> Result<String> {
        self.statement.to_sql()
    }

    /// Execute the insert
    pub async fn execute(self) -> Result<()> {
        self.executor.insert(&self.statement).await?;
        tracing::debug!(
            table = %self.statement.table,
            rows = self.statement.rows.len(),
            "inserted"
        );
        Ok(())
    }
}

impl<'a, E: Executor> IntoFuture for InsertQuery<'a, E> {
    type Output = Result<()>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

/// INSERT that reads the inserted rows back; resolves to the stored records
pub struct ReturningInsertQuery<'a, E> {
    executor: &'a E,
    options: SerializationOptions,
    statement: InsertStatement,
    fields: FieldMap,
}

impl<'a, E: Executor> ReturningInsertQuery<'a, E> {
    pub fn to_sql(&self) -> Result<String> {
        self.statement.to_sql()
    }

    pub async fn execute(self) -> Result<Vec<Record>> {
        let rows = self.executor.insert(&self.statement).await?;
        if rows.len() != self.statement.rows.len() {
            return Err(Error::internal(format!(
                "inserted {} rows but {} were returned",
                self.statement.rows.len(),
                rows.len()
            )));
        }

        rows.iter()
            .map(|row| codec::deserialize(&self.fields, row, self.options))
            .collect()
    }
}

impl<'a, E: Executor> IntoFuture for ReturningInsertQuery<'a, E> {
    type Output = Result<Vec<Record>>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{row, RecordingExecutor};
    use crate::mapping::{datetime, define_mapping, json, number, string};
    use chrono::{TimeZone, Utc};

    fn detail() -> Mapping {
        define_mapping(
            "order_detail",
            [
                ("id", number()),
                ("order_id", number().column("order_ref")),
                ("value", string()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_single_insert_uses_mapped_keys_only() {
        let detail = detail();
        let executor = RecordingExecutor::new();
        let instance = serde_json::json!({ "id": 1, "order_id": 2, "unmapped": true });

        let query =
            InsertQuery::single(&executor, SerializationOptions::default(), &detail, &instance).unwrap();

        assert_eq!(
            query.to_sql().unwrap(),
            "INSERT INTO \"order_detail\" (\"id\", \"order_ref\") VALUES (?, ?)"
        );
        assert_eq!(query.statement().parameters(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_typed_instance_is_serialized() {
        #[derive(Serialize)]
        struct Order {
            id: i64,
            ordered_at: chrono::DateTime<Utc>,
            tags: Vec<String>,
        }

        let order = define_mapping(
            "order",
            [("id", number()), ("ordered_at", datetime()), ("tags", json())],
        )
        .unwrap();
        let executor = RecordingExecutor::new();
        let time = Utc.timestamp_millis_opt(1_600_000_000_000).unwrap();
        let instance = Order {
            id: 3,
            ordered_at: time,
            tags: vec!["a".into()],
        };

        let query =
            InsertQuery::single(&executor, SerializationOptions::stringify_json(), &order, &instance)
                .unwrap();

        assert_eq!(
            query.statement().parameters(),
            vec![Value::Int(3), Value::DateTime(time), Value::from("[\"a\"]")]
        );
    }

    #[test]
    fn test_batch_insert_unions_columns() {
        let detail = detail();
        let executor = RecordingExecutor::new();
        let instances = vec![
            serde_json::json!({ "id": 1, "value": "a" }),
            serde_json::json!({ "id": 2, "order_id": 9 }),
        ];

        let query =
            InsertQuery::batch(&executor, SerializationOptions::default(), &detail, &instances).unwrap();

        assert_eq!(
            query.to_sql().unwrap(),
            "INSERT INTO \"order_detail\" (\"id\", \"value\", \"order_ref\") VALUES (?, ?, ?), (?, ?, ?)"
        );
        assert_eq!(
            query.statement().parameters(),
            vec![
                Value::Int(1),
                Value::from("a"),
                Value::Null,
                Value::Int(2),
                Value::Null,
                Value::Int(9),
            ]
        );
    }

    #[test]
    fn test_empty_batch_fails() {
        let executor = RecordingExecutor::new();
        let instances: Vec<serde_json::Value> = Vec::new();

        let err = InsertQuery::batch(&executor, SerializationOptions::default(), &detail(), &instances)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_returning_all() {
        let detail = detail();
        let executor = RecordingExecutor::new().with_rows(vec![row([
            ("id", Value::Int(1)),
            ("order_id", Value::Int(2)),
            ("value", Value::Null),
        ])]);
        let instance = Record::new().with("id", 1).with("order_id", 2);

        let query = InsertQuery::single(&executor, SerializationOptions::default(), &detail, &instance)
            .unwrap()
            .returning_all();
        assert!(query.to_sql().unwrap().ends_with(
            "RETURNING \"id\" AS \"id\", \"order_ref\" AS \"order_id\", \"value\" AS \"value\""
        ));

        let records = query.await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("order_id"), Some(&Value::Int(2)));
        assert_eq!(records[0].get("value"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_insert_resolves_to_unit() {
        let detail = detail();
        let executor = RecordingExecutor::new();
        let instance = Record::new().with("id", 1);

        InsertQuery::single(&executor, SerializationOptions::default(), &detail, &instance)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(
            executor.log(),
            vec!["INSERT INTO \"order_detail\" (\"id\") VALUES (?)".to_string()]
        );
        assert_eq!(executor.last_parameters(), vec![Value::Int(1)]);
    }
}
