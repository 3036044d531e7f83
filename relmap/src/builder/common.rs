//! Pieces shared by every builder: table scope and where-clause accumulation

use indexmap::IndexMap;

use crate::attribute::Attribute;
use crate::condition::{comparison, is_not_null, is_null, Condition, IntoOperand};
use crate::expression::Expression;
use crate::mapping::Mapping;
use crate::operator::Operator;
use crate::statement::Fragment;
use crate::{Error, Result};

/// Tables reachable from a from-clause, keyed by table name
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    tables: IndexMap<String, Mapping>,
}

impl Scope {
    pub(crate) fn new(mapping: &Mapping) -> Self {
        let mut tables = IndexMap::new();
        tables.insert(mapping.table_name().to_string(), mapping.clone());
        Self { tables }
    }

    /// Bring a joined table into scope; a table may appear once
    pub(crate) fn add(&mut self, mapping: &Mapping) -> Result<()> {
        if self.tables.contains_key(mapping.table_name()) {
            return Err(Error::invalid_join(mapping.table_name()));
        }
        self.tables
            .insert(mapping.table_name().to_string(), mapping.clone());
        Ok(())
    }

    /// Expressions may only read from tables in scope
    pub(crate) fn check(&self, key: &str, expression: &Expression) -> Result<()> {
        match expression.source_table() {
            Some(table) if !self.tables.contains_key(table) => Err(Error::out_of_scope(key, table)),
            _ => Ok(()),
        }
    }

    /// Every attribute a condition reads must come from a table in scope
    pub(crate) fn check_condition(&self, condition: &Condition) -> Result<()> {
        for attribute in condition.attributes() {
            self.check(attribute.attribute_name(), &Expression::from(attribute))?;
        }
        Ok(())
    }
}

/// Accumulated where conditions, AND-combined in the order they were added
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub(crate) fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub(crate) fn to_fragment(&self) -> Option<Fragment> {
        Fragment::conjoin(self.conditions.iter().map(Condition::to_where_fragment))
    }
}

/// Where-clause methods shared by select, count, update and delete builders
///
/// Every call adds one more condition; all of them must hold.
pub trait Filtered: Sized {
    #[doc(hidden)]
    fn filter_mut(&mut self) -> &mut Filter;

    /// Add an arbitrary condition
    fn where_(mut self, condition: Condition) -> Self {
        self.filter_mut().push(condition);
        self
    }

    fn where_equal(self, attribute: &Attribute, value: impl IntoOperand) -> Self {
        self.where_(comparison(attribute, Operator::EQ, value))
    }

    fn where_not_equal(self, attribute: &Attribute, value: impl IntoOperand) -> Self {
        self.where_(comparison(attribute, Operator::NEQ, value))
    }

    fn where_less(self, attribute: &Attribute, value: impl IntoOperand) -> Self {
        self.where_(comparison(attribute, Operator::LT, value))
    }

    fn where_less_or_equal(self, attribute: &Attribute, value: impl IntoOperand) -> Self {
        self.where_(comparison(attribute, Operator::LTE, value))
    }

    fn where_greater(self, attribute: &Attribute, value: impl IntoOperand) -> Self {
        self.where_(comparison(attribute, Operator::GT, value))
    }

    fn where_greater_or_equal(self, attribute: &Attribute, value: impl IntoOperand) -> Self {
        self.where_(comparison(attribute, Operator::GTE, value))
    }

    fn where_null(self, attribute: &Attribute) -> Self {
        self.where_(is_null(attribute))
    }

    fn where_not_null(self, attribute: &Attribute) -> Self {
        self.where_(is_not_null(attribute))
    }

    /// Compare with an operator given as text, such as `">="` or `"<>"`
    ///
    /// Fails with [`Error::InvalidOperator`] for anything but the six comparisons.
    fn where_compare(self, attribute: &Attribute, operator: &str, value: impl IntoOperand) -> Result<Self> {
        let operator: Operator = operator.parse()?;
        Ok(self.where_(comparison(attribute, operator, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::count;
    use crate::condition::equal;
    use crate::mapping::{define_mapping, number};
    use crate::Value;

    #[derive(Default)]
    struct Filtering {
        filter: Filter,
    }

    impl Filtered for Filtering {
        fn filter_mut(&mut self) -> &mut Filter {
            &mut self.filter
        }
    }

    #[test]
    fn test_scope_rejects_rejoin() {
        let order = define_mapping("order", [("id", number())]).unwrap();
        let mut scope = Scope::new(&order);

        let err = scope.add(&order).unwrap_err();
        assert!(matches!(err, Error::InvalidJoin { ref table } if table == "order"));
    }

    #[test]
    fn test_scope_check() {
        let order = define_mapping("order", [("id", number())]).unwrap();
        let detail = define_mapping("order_detail", [("id", number())]).unwrap();
        let scope = Scope::new(&order);

        assert!(scope.check("id", &order.attribute("id").unwrap().into()).is_ok());
        assert!(scope.check("n", &count().into()).is_ok());

        let err = scope
            .check("detail_id", &detail.attribute("id").unwrap().into())
            .unwrap_err();
        assert!(matches!(err, Error::OutOfScope { ref key, ref table } if key == "detail_id" && table == "order_detail"));
    }

    #[test]
    fn test_where_shorthands_are_and_combined() {
        let order = define_mapping("order", [("id", number()), ("total", number())]).unwrap();
        let id = order.attribute("id").unwrap();
        let total = order.attribute("total").unwrap();

        let filtering = Filtering::default()
            .where_greater_or_equal(&id, 1)
            .where_less(&total, 10.5)
            .where_(equal(&id, &total));

        let fragment = filtering.filter.to_fragment().unwrap();
        assert_eq!(
            fragment.sql,
            "\"order\".\"id\" >= ? AND \"order\".\"total\" < ? AND \"order\".\"id\" = \"order\".\"total\""
        );
        assert_eq!(fragment.params, vec![Value::Int(1), Value::Float(10.5)]);
    }

    #[test]
    fn test_where_null_and_textual_operators() {
        let order = define_mapping("order", [("id", number()), ("note", number())]).unwrap();
        let id = order.attribute("id").unwrap();
        let note = order.attribute("note").unwrap();

        let filtering = Filtering::default()
            .where_null(&note)
            .where_compare(&id, "<>", 3)
            .unwrap()
            .where_not_null(&id);

        let fragment = filtering.filter.to_fragment().unwrap();
        assert_eq!(
            fragment.sql,
            "\"order\".\"note\" IS NULL AND \"order\".\"id\" != ? AND \"order\".\"id\" IS NOT NULL"
        );
        assert_eq!(fragment.params, vec![Value::Int(3)]);

        let err = Filtering::default().where_compare(&id, "LIKE", 3).err().unwrap();
        assert!(matches!(err, Error::InvalidOperator { ref operator } if operator == "LIKE"));
    }

    #[test]
    fn test_scope_checks_condition_attributes() {
        let order = define_mapping("order", [("id", number())]).unwrap();
        let detail = define_mapping("order_detail", [("order_id", number())]).unwrap();
        let scope = Scope::new(&order);

        let id = order.attribute("id").unwrap();
        let order_id = detail.attribute("order_id").unwrap();
        assert!(scope.check_condition(&equal(&id, 1)).is_ok());

        let err = scope.check_condition(&equal(&order_id, &id)).unwrap_err();
        assert!(matches!(err, Error::OutOfScope { ref key, ref table } if key == "order_id" && table == "order_detail"));
    }

    #[test]
    fn test_empty_filter_renders_nothing() {
        assert!(Filter::default().to_fragment().is_none());
        assert!(Filter::default().is_empty());
    }
}
