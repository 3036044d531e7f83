//! Selectable expressions and projections

use indexmap::IndexMap;

use crate::aggregation::Aggregation;
use crate::attribute::Attribute;
use crate::codec::{aliased_name, FieldDefinition, FieldMap};
use crate::statement::quote_identifier;

/// Anything that can be selected, ordered by or grouped by
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Attribute(Attribute),
    Aggregation(Aggregation),
}

impl Expression {
    /// Table the expression reads from, if any
    pub fn source_table(&self) -> Option<&str> {
        match self {
            Expression::Attribute(attribute) => Some(attribute.table_name()),
            Expression::Aggregation(aggregation) => aggregation.source_table(),
        }
    }

    pub fn field_definition(&self, key: &str) -> FieldDefinition {
        match self {
            Expression::Attribute(attribute) => attribute.field_definition(key),
            Expression::Aggregation(aggregation) => aggregation.field_definition(key),
        }
    }

    /// The bare expression, as used in ORDER BY and GROUP BY
    pub fn to_sql(&self) -> String {
        match self {
            Expression::Attribute(attribute) => attribute.quoted_qualified_column(),
            Expression::Aggregation(aggregation) => aggregation.to_sql(None),
        }
    }

    /// A select-list entry labelled with the aliased key
    pub fn to_select_sql(&self, key: &str) -> String {
        let alias = aliased_name(key);
        match self {
            Expression::Attribute(attribute) => format!(
                "{} AS {}",
                attribute.quoted_qualified_column(),
                quote_identifier(&alias)
            ),
            Expression::Aggregation(aggregation) => aggregation.to_sql(Some(&alias)),
        }
    }
}

impl From<Attribute> for Expression {
    fn from(attribute: Attribute) -> Self {
        Expression::Attribute(attribute)
    }
}

impl From<&Attribute> for Expression {
    fn from(attribute: &Attribute) -> Self {
        Expression::Attribute(attribute.clone())
    }
}

impl From<Aggregation> for Expression {
    fn from(aggregation: Aggregation) -> Self {
        Expression::Aggregation(aggregation)
    }
}

/// Output key to expression, in select order
///
/// # Examples
/// ```
/// use relmap::{count, define_mapping, number, Projection};
///
/// let order = define_mapping("order", [("id", number())]).unwrap();
/// let projection = Projection::new()
///     .field("order_id", &order.attribute("id").unwrap())
///     .field("total", count());
///
/// assert_eq!(projection.keys().collect::<Vec<_>>(), vec!["order_id", "total"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    fields: IndexMap<String, Expression>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an output key
    pub fn field(mut self, key: impl Into<String>, expression: impl Into<Expression>) -> Self {
        self.fields.insert(key.into(), expression.into());
        self
    }

    /// Add every field of another projection; later keys replace earlier ones
    pub fn merge(mut self, other: Projection) -> Self {
        self.fields.extend(other.fields);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Expression> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.fields.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Codec entries for every output key
    pub fn field_map(&self) -> FieldMap {
        self.fields
            .iter()
            .map(|(key, expression)| (key.clone(), expression.field_definition(key)))
            .collect()
    }

    pub(crate) fn select_list(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|(key, expression)| expression.to_select_sql(key))
            .collect()
    }
}

impl<K: Into<String>, E: Into<Expression>> FromIterator<(K, E)> for Projection {
    fn from_iter<I: IntoIterator<Item = (K, E)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, expression)| (key.into(), expression.into()))
                .collect(),
        }
    }
}
