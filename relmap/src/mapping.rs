//! Table mappings: the registry that turns a declaration into attribute handles
//!
//! A [`Mapping`] is built once, typically at start-up, and shared by every
//! query that references it. Handles for every attribute are created at
//! registration time; nothing about a mapping can change afterwards.
//!
//! ```compile_fail
//! use relmap::{define_mapping, number};
//!
//! let order = define_mapping("order", [("id", number())]).unwrap();
//! // Mappings expose no mutable state.
//! order.attributes = Default::default();
//! ```

use std::collections::HashSet;
use std::fmt::{self, Display};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::attribute::Attribute;
use crate::expression::Projection;
use crate::{Error, Result};

/// Declared type of a mapped attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Datetime,
    Json,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Datetime => "datetime",
            DataType::Json => "json",
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one attribute: its type and an optional explicit column name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttributeSpec {
    data_type: DataType,
    #[serde(default)]
    column: Option<String>,
}

impl AttributeSpec {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            column: None,
        }
    }

    /// Store the attribute under a column name that differs from the attribute name
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column = Some(name.into());
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Declare a string attribute
pub fn string() -> AttributeSpec {
    AttributeSpec::new(DataType::String)
}

/// Declare a number attribute
pub fn number() -> AttributeSpec {
    AttributeSpec::new(DataType::Number)
}

/// Declare a boolean attribute
pub fn boolean() -> AttributeSpec {
    AttributeSpec::new(DataType::Boolean)
}

/// Declare a datetime attribute
pub fn datetime() -> AttributeSpec {
    AttributeSpec::new(DataType::Datetime)
}

/// Declare a JSON attribute
pub fn json() -> AttributeSpec {
    AttributeSpec::new(DataType::Json)
}

#[derive(Debug)]
pub(crate) struct MappingData {
    table_name: String,
    attributes: IndexMap<String, Attribute>,
}

/// An immutable registration of a table and its attributes
///
/// Clones share identity: two clones of one mapping are the same mapping.
#[derive(Debug, Clone)]
pub struct Mapping {
    inner: Arc<MappingData>,
}

/// Create a [`Mapping`] from a table name and attribute declarations
///
/// # Examples
/// ```
/// use relmap::{define_mapping, datetime, number};
///
/// let order = define_mapping(
///     "order",
///     [("id", number()), ("order_time", datetime().column("ordered_at"))],
/// ).unwrap();
///
/// let order_time = order.attribute("order_time").unwrap();
/// assert_eq!(order_time.qualified_column_name(), "order.ordered_at");
/// ```
pub fn define_mapping<N, I>(table_name: impl Into<String>, specs: I) -> Result<Mapping>
where
    N: Into<String>,
    I: IntoIterator<Item = (N, AttributeSpec)>,
{
    let table_name = table_name.into();

    let mut declared = Vec::new();
    let mut attribute_names = HashSet::new();
    let mut column_names = HashSet::new();

    for (name, spec) in specs {
        let name = name.into();
        let column = spec.column.clone().unwrap_or_else(|| name.clone());

        if !attribute_names.insert(name.clone()) {
            return Err(Error::duplicate_attribute(&table_name, name));
        }
        if !column_names.insert(column.clone()) {
            return Err(Error::duplicate_column(&table_name, column));
        }

        declared.push((name, spec.data_type, column));
    }

    let inner = Arc::new_cyclic(|origin| MappingData {
        attributes: declared
            .into_iter()
            .map(|(name, data_type, column)| {
                let attribute = Attribute::new(
                    origin.clone(),
                    data_type,
                    name.clone(),
                    column,
                    table_name.clone(),
                );
                (name, attribute)
            })
            .collect(),
        table_name,
    });

    tracing::debug!(
        table = %inner.table_name,
        attributes = inner.attributes.len(),
        "defined mapping"
    );

    Ok(Mapping { inner })
}

impl Mapping {
    pub fn table_name(&self) -> &str {
        &self.inner.table_name
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.inner.attributes.keys().map(String::as_str).collect()
    }

    /// Handle for a declared attribute
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        self.inner
            .attributes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::invalid_attribute(self.table_name(), name))
    }

    /// Handles for every attribute, in declaration order
    pub fn attributes(&self) -> Vec<Attribute> {
        self.inner.attributes.values().cloned().collect()
    }

    /// Attribute name to handle
    pub fn attribute_map(&self) -> IndexMap<String, Attribute> {
        self.inner.attributes.clone()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.inner
            .attributes
            .values()
            .map(|attribute| attribute.column_name())
            .collect()
    }

    /// Column names prefixed with the table, as `table.column`
    pub fn qualified_column_names(&self) -> Vec<String> {
        self.inner
            .attributes
            .values()
            .map(Attribute::qualified_column_name)
            .collect()
    }

    /// Column name to handle
    pub fn column_attribute_map(&self) -> IndexMap<String, Attribute> {
        self.inner
            .attributes
            .values()
            .map(|attribute| (attribute.column_name().to_string(), attribute.clone()))
            .collect()
    }

    /// Qualified column name to handle
    pub fn qualified_column_attribute_map(&self) -> IndexMap<String, Attribute> {
        self.inner
            .attributes
            .values()
            .map(|attribute| (attribute.qualified_column_name(), attribute.clone()))
            .collect()
    }

    /// A projection of every attribute under its own name
    pub fn select_all(&self) -> Projection {
        self.inner
            .attributes
            .iter()
            .map(|(name, attribute)| (name.clone(), attribute.clone()))
            .collect()
    }

    /// Whether the handle was produced by this mapping
    pub fn contains(&self, attribute: &Attribute) -> bool {
        attribute.belongs_to(self)
    }

    pub(crate) fn data(&self) -> &Arc<MappingData> {
        &self.inner
    }

    pub(crate) fn from_data(inner: Arc<MappingData>) -> Self {
        Self { inner }
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Mapping {}

/// Declare a struct holding a mapping and one pre-built handle per attribute
///
/// # Examples
/// ```
/// use relmap::{define_table, datetime, number};
///
/// define_table! {
///     pub struct OrderTable("order") {
///         id: number(),
///         order_time: datetime(),
///     }
/// }
///
/// let order = OrderTable::new().unwrap();
/// assert_eq!(order.order_time.qualified_column_name(), "order.order_time");
/// assert!(order.mapping.contains(&order.id));
/// ```
#[macro_export]
macro_rules! define_table {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($table:expr) {
            $($attribute:ident : $spec:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            pub mapping: $crate::Mapping,
            $(pub $attribute: $crate::Attribute,)*
        }

        impl $name {
            pub fn new() -> $crate::Result<Self> {
                let mapping = $crate::define_mapping(
                    $table,
                    [$((stringify!($attribute), $spec)),*],
                )?;
                Ok(Self {
                    $($attribute: mapping.attribute(stringify!($attribute))?,)*
                    mapping,
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_mapping() -> Mapping {
        define_mapping(
            "order",
            [
                ("id", number()),
                ("order_time", datetime().column("ordered_at")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_define_mapping() {
        let order = order_mapping();
        assert_eq!(order.table_name(), "order");
        assert_eq!(order.attribute_names(), vec!["id", "order_time"]);
        assert_eq!(order.column_names(), vec!["id", "ordered_at"]);
        assert_eq!(
            order.qualified_column_names(),
            vec!["order.id", "order.ordered_at"]
        );
    }

    #[test]
    fn test_attribute_lookup() {
        let order = order_mapping();
        let attribute = order.attribute("order_time").unwrap();
        assert_eq!(attribute.data_type(), DataType::Datetime);
        assert_eq!(attribute.column_name(), "ordered_at");

        let err = order.attribute("missing").unwrap_err();
        assert_eq!(err.to_string(), "Invalid attribute name: missing (table 'order')");
    }

    #[test]
    fn test_explicit_column_names_are_legal_when_distinct() {
        let mapping = define_mapping(
            "detail",
            [
                ("order_id", number()),
                ("orderId", number().column("order_ref")),
            ],
        );
        assert!(mapping.is_ok());
    }

    #[test]
    fn test_duplicate_column_name_fails() {
        let err = define_mapping(
            "detail",
            [("order_id", number()), ("orderId", number().column("order_id"))],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn { ref column, .. } if column == "order_id"));
    }

    #[test]
    fn test_duplicate_attribute_name_fails() {
        let err = define_mapping("detail", [("id", number()), ("id", string())]).unwrap_err();
        assert!(matches!(err, Error::DuplicateAttribute { .. }));
    }

    #[test]
    fn test_maps() {
        let order = order_mapping();
        let by_column = order.column_attribute_map();
        assert_eq!(by_column["ordered_at"].attribute_name(), "order_time");

        let by_qualified = order.qualified_column_attribute_map();
        assert_eq!(by_qualified["order.id"].attribute_name(), "id");

        let by_name = order.attribute_map();
        assert_eq!(by_name.len(), 2);
    }

    #[test]
    fn test_clones_share_identity() {
        let order = order_mapping();
        let again = order_mapping();
        assert_eq!(order, order.clone());
        assert_ne!(order, again);
    }

    #[test]
    fn test_define_table_macro() {
        define_table! {
            struct DetailTable("order_detail") {
                id: number(),
                order_id: number(),
                quantity: number(),
            }
        }

        let detail = DetailTable::new().unwrap();
        assert_eq!(detail.mapping.table_name(), "order_detail");
        assert_eq!(detail.quantity.attribute_name(), "quantity");
        assert_eq!(detail.order_id, detail.mapping.attribute("order_id").unwrap());
    }

    #[test]
    fn test_attribute_spec_from_config() {
        let spec: AttributeSpec =
            serde_json::from_str(r#"{ "data_type": "datetime", "column": "ordered_at" }"#).unwrap();
        assert_eq!(spec, datetime().column("ordered_at"));
    }
}
