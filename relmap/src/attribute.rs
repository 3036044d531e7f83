//! Attribute handles: typed references to one mapped column

use std::fmt;
use std::sync::{Arc, Weak};

use crate::codec::FieldDefinition;
use crate::mapping::{DataType, Mapping, MappingData};
use crate::statement::quote_identifier;

/// A typed, immutable reference to one mapped column
///
/// Handles point back at their mapping without owning it. Two handles are
/// equal when they come from the same mapping and carry the same attribute
/// key; structurally identical handles from another mapping are not equal.
#[derive(Clone)]
pub struct Attribute {
    origin: Weak<MappingData>,
    data_type: DataType,
    attribute_name: String,
    column_name: String,
    table_name: String,
}

impl Attribute {
    pub(crate) fn new(
        origin: Weak<MappingData>,
        data_type: DataType,
        attribute_name: String,
        column_name: String,
        table_name: String,
    ) -> Self {
        Self {
            origin,
            data_type,
            attribute_name,
            column_name,
            table_name,
        }
    }

    /// The key this attribute is read into and written from
    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// `table.column`
    pub fn qualified_column_name(&self) -> String {
        format!("{}.{}", self.table_name, self.column_name)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The owning mapping, if it is still alive
    pub fn mapping(&self) -> Option<Mapping> {
        self.origin.upgrade().map(Mapping::from_data)
    }

    pub fn belongs_to(&self, mapping: &Mapping) -> bool {
        std::ptr::eq(self.origin.as_ptr(), Arc::as_ptr(mapping.data()))
    }

    /// A new handle on the same column, read into a different key
    pub fn with_key(&self, key: impl Into<String>) -> Attribute {
        Attribute {
            attribute_name: key.into(),
            ..self.clone()
        }
    }

    /// The codec entry for this attribute when projected under `key`
    pub fn field_definition(&self, key: &str) -> FieldDefinition {
        FieldDefinition::new(key, self.data_type)
    }

    /// `"table"."column"`
    pub(crate) fn quoted_qualified_column(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.table_name),
            quote_identifier(&self.column_name)
        )
    }

    pub(crate) fn quoted_column(&self) -> String {
        quote_identifier(&self.column_name)
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.origin, &other.origin) && self.attribute_name == other.attribute_name
    }
}

impl Eq for Attribute {}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("table", &self.table_name)
            .field("attribute", &self.attribute_name)
            .field("column", &self.column_name)
            .field("data_type", &self.data_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{define_mapping, number, string};

    fn test_model() -> Mapping {
        define_mapping(
            "test_model",
            [("id", number()), ("external_id", string().column("ext_id"))],
        )
        .unwrap()
    }

    #[test]
    fn test_column_names() {
        let model = test_model();
        let external_id = model.attribute("external_id").unwrap();
        assert_eq!(external_id.attribute_name(), "external_id");
        assert_eq!(external_id.column_name(), "ext_id");
        assert_eq!(external_id.table_name(), "test_model");
        assert_eq!(external_id.qualified_column_name(), "test_model.ext_id");
        assert_eq!(external_id.quoted_qualified_column(), "\"test_model\".\"ext_id\"");
        assert_eq!(external_id.data_type(), DataType::String);
    }

    #[test]
    fn test_equality_is_identity_of_origin() {
        let model = test_model();
        let twin = test_model();

        assert_eq!(model.attribute("id").unwrap(), model.attribute("id").unwrap());
        assert_ne!(model.attribute("id").unwrap(), twin.attribute("id").unwrap());
        assert_ne!(
            model.attribute("id").unwrap(),
            model.attribute("external_id").unwrap()
        );
    }

    #[test]
    fn test_with_key_keeps_column() {
        let model = test_model();
        let id = model.attribute("id").unwrap();
        let renamed = id.with_key("model_id");

        assert_eq!(renamed.attribute_name(), "model_id");
        assert_eq!(renamed.qualified_column_name(), "test_model.id");
        assert!(renamed.belongs_to(&model));
        assert_ne!(renamed, id);
    }

    #[test]
    fn test_back_reference_does_not_own_mapping() {
        let model = test_model();
        let id = model.attribute("id").unwrap();
        assert_eq!(id.mapping(), Some(model.clone()));

        drop(model);
        assert!(id.mapping().is_none());
        assert_eq!(id.qualified_column_name(), "test_model.id");
    }
}
