//! From-clause builder: the base table and its joins

use crate::attribute::Attribute;
use crate::codec::SerializationOptions;
use crate::condition::{equal, Condition};
use crate::executor::Executor;
use crate::expression::Projection;
use crate::mapping::Mapping;
use crate::statement::{JoinClause, JoinType, SelectStatement};
use crate::{Error, Result};

use super::common::Scope;
use super::select::SelectQuery;

/// A from-clause in progress; call [`select`](FromQuery::select) to choose the result shape
pub struct FromQuery<'a, E> {
    executor: &'a E,
    options: SerializationOptions,
    scope: Scope,
    statement: SelectStatement,
}

impl<'a, E: Executor> FromQuery<'a, E> {
    pub(crate) fn new(executor: &'a E, options: SerializationOptions, mapping: &Mapping) -> Self {
        Self {
            executor,
            options,
            scope: Scope::new(mapping),
            statement: SelectStatement::new(mapping.table_name()),
        }
    }

    fn join(mut self, join_type: JoinType, mapping: &Mapping, condition: Condition) -> Result<Self> {
        self.scope.add(mapping)?;
        self.scope.check_condition(&condition)?;
        self.statement.joins.push(JoinClause {
            join_type,
            table: mapping.table_name().to_string(),
            on: condition.to_join_fragment(),
        });
        Ok(self)
    }

    /// Add an INNER JOIN clause
    pub fn inner_join(self, mapping: &Mapping, condition: Condition) -> Result<Self> {
        self.join(JoinType::Inner, mapping, condition)
    }

    /// Add a LEFT OUTER JOIN clause
    pub fn left_join(self, mapping: &Mapping, condition: Condition) -> Result<Self> {
        self.join(JoinType::Left, mapping, condition)
    }

    /// Add a RIGHT OUTER JOIN clause
    pub fn right_join(self, mapping: &Mapping, condition: Condition) -> Result<Self> {
        self.join(JoinType::Right, mapping, condition)
    }

    /// INNER JOIN on `left = right`
    pub fn inner_join_equal(self, mapping: &Mapping, left: &Attribute, right: &Attribute) -> Result<Self> {
        self.inner_join(mapping, equal(left, right))
    }

    /// LEFT OUTER JOIN on `left = right`
    pub fn left_join_equal(self, mapping: &Mapping, left: &Attribute, right: &Attribute) -> Result<Self> {
        self.left_join(mapping, equal(left, right))
    }

    /// RIGHT OUTER JOIN on `left = right`
    pub fn right_join_equal(self, mapping: &Mapping, left: &Attribute, right: &Attribute) -> Result<Self> {
        self.right_join(mapping, equal(left, right))
    }

    /// Choose the result shape
    ///
    /// Every expression must read from a table in this from-clause.
    pub fn select(mut self, projection: Projection) -> Result<SelectQuery<'a, E>> {
        if projection.is_empty() {
            return Err(Error::invalid_query("select list is empty"));
        }
        for (key, expression) in projection.iter() {
            self.scope.check(key, expression)?;
        }

        self.statement.columns = projection.select_list();
        Ok(SelectQuery::new(
            self.executor,
            self.options,
            self.scope,
            self.statement,
            projection.field_map(),
        ))
    }

    /// Select every attribute of one mapping in scope
    pub fn select_all(self, mapping: &Mapping) -> Result<SelectQuery<'a, E>> {
        self.select(mapping.select_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::sum;
    use crate::executor::testing::RecordingExecutor;
    use crate::mapping::{define_mapping, number, string};

    struct Fixture {
        order: Mapping,
        detail: Mapping,
        customer: Mapping,
    }

    fn fixture() -> Fixture {
        Fixture {
            order: define_mapping("order", [("id", number())]).unwrap(),
            detail: define_mapping(
                "order_detail",
                [("id", number()), ("order_id", number()), ("value", string())],
            )
            .unwrap(),
            customer: define_mapping("customer", [("id", number())]).unwrap(),
        }
    }

    fn from<'a>(executor: &'a RecordingExecutor, mapping: &Mapping) -> FromQuery<'a, RecordingExecutor> {
        FromQuery::new(executor, SerializationOptions::default(), mapping)
    }

    #[test]
    fn test_join_renders_on_clause() {
        let f = fixture();
        let executor = RecordingExecutor::new();

        let query = from(&executor, &f.order)
            .left_join_equal(
                &f.detail,
                &f.detail.attribute("order_id").unwrap(),
                &f.order.attribute("id").unwrap(),
            )
            .unwrap()
            .select(Projection::new().field("value", &f.detail.attribute("value").unwrap()))
            .unwrap();

        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT \"order_detail\".\"value\" AS \"value\" FROM \"order\" \
             LEFT OUTER JOIN \"order_detail\" ON \"order_detail\".\"order_id\" = \"order\".\"id\""
        );
    }

    #[test]
    fn test_rejoin_fails() {
        let f = fixture();
        let executor = RecordingExecutor::new();
        let order_id = f.detail.attribute("order_id").unwrap();
        let id = f.order.attribute("id").unwrap();

        let err = from(&executor, &f.order)
            .inner_join_equal(&f.detail, &order_id, &id)
            .unwrap()
            .inner_join_equal(&f.detail, &order_id, &id)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidJoin { .. }));

        let err = from(&executor, &f.order)
            .right_join_equal(&f.order, &id, &id)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidJoin { .. }));
    }

    #[test]
    fn test_join_condition_out_of_scope() {
        let f = fixture();
        let executor = RecordingExecutor::new();

        let err = from(&executor, &f.order)
            .inner_join_equal(
                &f.detail,
                &f.detail.attribute("order_id").unwrap(),
                &f.customer.attribute("id").unwrap(),
            )
            .err()
            .unwrap();
        assert!(matches!(err, Error::OutOfScope { ref table, .. } if table == "customer"));
    }

    #[test]
    fn test_select_out_of_scope() {
        let f = fixture();
        let executor = RecordingExecutor::new();

        let err = from(&executor, &f.order)
            .select(Projection::new().field("customer_id", &f.customer.attribute("id").unwrap()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::OutOfScope { ref key, .. } if key == "customer_id"));

        let err = from(&executor, &f.order)
            .select(Projection::new().field("total", sum(&f.detail.attribute("id").unwrap())))
            .err()
            .unwrap();
        assert!(matches!(err, Error::OutOfScope { ref table, .. } if table == "order_detail"));
    }

    #[test]
    fn test_empty_projection_fails() {
        let f = fixture();
        let executor = RecordingExecutor::new();

        let err = from(&executor, &f.order).select(Projection::new()).err().unwrap();
        assert!(matches!(err, Error::InvalidQuery { .. }));
        assert!(executor.log().is_empty());
    }
}
