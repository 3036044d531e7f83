//! Conversion between attribute-keyed records and column-keyed rows

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use md5::{Digest, Md5};
use serde::Deserialize;

use crate::mapping::{DataType, Mapping};
use crate::value::{Record, Row, Value};
use crate::{Error, Result};

/// Longest alias passed to the database verbatim
pub const MAX_ALIAS_LENGTH: usize = 60;

/// Options threaded through every serialize and deserialize call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerializationOptions {
    /// Store JSON attributes as text and parse them back on read
    pub stringify_json: bool,
}

impl SerializationOptions {
    pub fn stringify_json() -> Self {
        Self {
            stringify_json: true,
        }
    }
}

/// Output key and declared type of one projected expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub key: String,
    pub data_type: DataType,
}

impl FieldDefinition {
    pub fn new(key: impl Into<String>, data_type: DataType) -> Self {
        Self {
            key: key.into(),
            data_type,
        }
    }

    /// The result column label this field is read from
    pub fn alias(&self) -> String {
        aliased_name(&self.key)
    }
}

/// Output key to field definition, in projection order
pub type FieldMap = IndexMap<String, FieldDefinition>;

/// The label used for `name` in select and returning lists
///
/// Names longer than [`MAX_ALIAS_LENGTH`] are replaced with their lowercase hex MD5.
///
/// # Examples
/// ```
/// use relmap::codec::aliased_name;
///
/// assert_eq!(aliased_name("order_time"), "order_time");
/// assert_eq!(aliased_name(&"x".repeat(61)).len(), 32);
/// ```
pub fn aliased_name(name: &str) -> String {
    if name.chars().count() > MAX_ALIAS_LENGTH {
        hex::encode(Md5::digest(name.as_bytes()))
    } else {
        name.to_string()
    }
}

/// Convert a record into a row keyed by column name
///
/// Keys that are not declared in the mapping are dropped.
pub fn serialize(mapping: &Mapping, instance: &Record, options: SerializationOptions) -> Result<Row> {
    let attributes = mapping.attribute_map();
    let mut row = Row::new();

    for (key, value) in instance.iter() {
        let Some(attribute) = attributes.get(key) else {
            tracing::trace!(table = mapping.table_name(), key, "dropping undeclared key");
            continue;
        };

        let value = serialize_value(key, attribute.data_type(), value, options)?;
        row.insert(attribute.column_name().to_string(), value);
    }

    Ok(row)
}

fn serialize_value(
    key: &str,
    data_type: DataType,
    value: &Value,
    options: SerializationOptions,
) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match (data_type, value) {
        (DataType::Json, value) => {
            let json = value.to_json();
            if options.stringify_json {
                Ok(Value::String(serde_json::to_string(&json)?))
            } else {
                Ok(Value::Json(json))
            }
        }
        (DataType::String, Value::String(_))
        | (DataType::Number, Value::Int(_) | Value::Float(_))
        | (DataType::Boolean, Value::Bool(_))
        | (DataType::Datetime, Value::DateTime(_)) => Ok(value.clone()),
        (DataType::Datetime, Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
            .map_err(|_| Error::type_mismatch(key, DataType::Datetime.as_str(), value.kind())),
        (DataType::Datetime, Value::Int(millis)) => from_millis(*millis)
            .map(Value::DateTime)
            .ok_or_else(|| Error::type_mismatch(key, DataType::Datetime.as_str(), value.kind())),
        (data_type, value) => Err(Error::type_mismatch(key, data_type.as_str(), value.kind())),
    }
}

/// Convert a raw row into a record keyed by the projection's output keys
pub fn deserialize(fields: &FieldMap, row: &Row, options: SerializationOptions) -> Result<Record> {
    let mut record = Record::new();

    for (key, field) in fields {
        let alias = field.alias();
        let value = row.get(&alias).ok_or_else(|| {
            Error::internal(format!("result row is missing column '{}' for '{}'", alias, key))
        })?;

        record.insert(key.clone(), deserialize_value(field, value, options)?);
    }

    Ok(record)
}

fn deserialize_value(field: &FieldDefinition, value: &Value, options: SerializationOptions) -> Result<Value> {
    let converted = match (field.data_type, value) {
        (_, Value::Null) => Value::Null,
        (DataType::Json, Value::String(text)) if options.stringify_json => {
            Value::from_json(serde_json::from_str(text)?)
        }
        (DataType::Json, Value::Json(json)) => Value::from_json(json.clone()),
        (DataType::Datetime, Value::Int(millis)) => {
            from_millis(*millis).map_or_else(|| value.clone(), Value::DateTime)
        }
        (DataType::Datetime, Value::Float(millis)) => {
            from_millis(*millis as i64).map_or_else(|| value.clone(), Value::DateTime)
        }
        (DataType::Datetime, Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
            .unwrap_or_else(|_| value.clone()),
        (DataType::Number, Value::String(text)) => parse_number(text).unwrap_or_else(|| value.clone()),
        (DataType::Boolean, Value::Int(0)) => Value::Bool(false),
        (DataType::Boolean, Value::Int(1)) => Value::Bool(true),
        _ => value.clone(),
    };

    if converted != *value {
        tracing::trace!(
            key = %field.key,
            data_type = %field.data_type,
            from = value.kind(),
            to = converted.kind(),
            "converted column value"
        );
    }

    Ok(converted)
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    text.parse::<i64>()
        .map(Value::Int)
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(Value::Float))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{boolean, datetime, define_mapping, json, number, string};

    fn fields(entries: &[(&str, DataType)]) -> FieldMap {
        entries
            .iter()
            .map(|(key, data_type)| (key.to_string(), FieldDefinition::new(*key, *data_type)))
            .collect()
    }

    fn detail() -> Mapping {
        define_mapping(
            "order_detail",
            [
                ("id", number()),
                ("order_id", number().column("order_ref")),
                ("value", string()),
                ("shipped", boolean()),
                ("shipped_at", datetime()),
                ("extra", json()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_serialize_uses_column_names_and_drops_extras() {
        let record = Record::new()
            .with("order_id", 3)
            .with("value", "x")
            .with("not_mapped", true);

        let row = serialize(&detail(), &record, SerializationOptions::default()).unwrap();

        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["order_ref", "value"]);
        assert_eq!(row["order_ref"], Value::Int(3));
    }

    #[test]
    fn test_serialize_json() {
        let record = Record::new().with("extra", serde_json::json!({ "a": [1, 2] }));

        let row = serialize(&detail(), &record, SerializationOptions::default()).unwrap();
        assert_eq!(row["extra"], Value::Json(serde_json::json!({ "a": [1, 2] })));

        let row = serialize(&detail(), &record, SerializationOptions::stringify_json()).unwrap();
        assert_eq!(row["extra"], Value::String("{\"a\":[1,2]}".to_string()));
    }

    #[test]
    fn test_serialize_datetime_inputs() {
        let expected = Value::DateTime(Utc.timestamp_millis_opt(1_500_000_000_000).unwrap());
        let options = SerializationOptions::default();

        for input in [
            Value::Int(1_500_000_000_000),
            Value::from("2017-07-14T02:40:00Z"),
            expected.clone(),
        ] {
            let record = Record::new().with("shipped_at", input);
            let row = serialize(&detail(), &record, options).unwrap();
            assert_eq!(row["shipped_at"], expected);
        }
    }

    #[test]
    fn test_serialize_type_mismatch() {
        let record = Record::new().with("id", "one");
        let err = serialize(&detail(), &record, SerializationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch { ref attribute, expected: "number", found: "string" } if attribute == "id"
        ));

        let record = Record::new().with("shipped_at", "yesterday");
        assert!(serialize(&detail(), &record, SerializationOptions::default()).is_err());
    }

    #[test]
    fn test_serialize_accepts_null_for_any_type() {
        let record = Record::new().with("shipped", Value::Null).with("extra", Value::Null);
        let row = serialize(&detail(), &record, SerializationOptions::stringify_json()).unwrap();
        assert_eq!(row["shipped"], Value::Null);
        assert_eq!(row["extra"], Value::Null);
    }

    #[test]
    fn test_deserialize_conversions() {
        let fields = fields(&[
            ("id", DataType::Number),
            ("shipped", DataType::Boolean),
            ("shipped_at", DataType::Datetime),
            ("extra", DataType::Json),
        ]);
        let row: Row = [
            ("id", Value::from("42")),
            ("shipped", Value::Int(1)),
            ("shipped_at", Value::Int(1_500_000_000_000)),
            ("extra", Value::from("[1,2]")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let record = deserialize(&fields, &row, SerializationOptions::stringify_json()).unwrap();

        assert_eq!(record.get("id"), Some(&Value::Int(42)));
        assert_eq!(record.get("shipped"), Some(&Value::Bool(true)));
        assert_eq!(
            record.get("shipped_at"),
            Some(&Value::DateTime(Utc.timestamp_millis_opt(1_500_000_000_000).unwrap()))
        );
        assert_eq!(record.get("extra"), Some(&Value::Json(serde_json::json!([1, 2]))));
    }

    #[test]
    fn test_deserialize_json_text_without_stringify() {
        let fields = fields(&[("extra", DataType::Json)]);
        let row: Row = [("extra".to_string(), Value::from("[1,2]"))].into_iter().collect();

        let record = deserialize(&fields, &row, SerializationOptions::default()).unwrap();
        assert_eq!(record.get("extra"), Some(&Value::from("[1,2]")));
    }

    #[test]
    fn test_json_round_trip_keeps_record_values() {
        let mapping = detail();
        let fields = mapping.select_all().field_map();

        for options in [SerializationOptions::default(), SerializationOptions::stringify_json()] {
            for payload in [
                Value::Int(5),
                Value::from("text"),
                Value::Bool(false),
                Value::Json(serde_json::json!([1, "two"])),
                Value::Json(serde_json::json!({ "nested": { "n": 1.5 } })),
            ] {
                let record = Record::new().with("id", 1).with("extra", payload.clone());
                let row = serialize(&mapping, &record, options).unwrap();
                let aliased: Row = mapping
                    .attributes()
                    .iter()
                    .map(|attribute| {
                        let value = row.get(attribute.column_name()).cloned().unwrap_or(Value::Null);
                        (attribute.attribute_name().to_string(), value)
                    })
                    .collect();

                let decoded = deserialize(&fields, &aliased, options).unwrap();
                assert_eq!(decoded.get("extra"), Some(&payload), "{:?} with {:?}", payload, options);
                assert_eq!(decoded.get("id"), Some(&Value::Int(1)));
            }
        }
    }

    #[test]
    fn test_deserialize_float_string() {
        let fields = fields(&[("total", DataType::Number)]);
        let row: Row = [("total".to_string(), Value::from("1.5"))].into_iter().collect();

        let record = deserialize(&fields, &row, SerializationOptions::default()).unwrap();
        assert_eq!(record.get("total"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_deserialize_missing_column() {
        let fields = fields(&[("id", DataType::Number)]);
        let err = deserialize(&fields, &Row::new(), SerializationOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InternalConsistency { .. }));
    }

    #[test]
    fn test_deserialize_reads_hashed_alias() {
        let key = "a_very_long_attribute_name_that_goes_well_beyond_sixty_characters";
        let fields = fields(&[(key, DataType::Number)]);
        let row: Row = [(aliased_name(key), Value::Int(7))].into_iter().collect();

        let record = deserialize(&fields, &row, SerializationOptions::default()).unwrap();
        assert_eq!(record.get(key), Some(&Value::Int(7)));
    }

    #[test]
    fn test_aliased_name() {
        let exactly_sixty = "y".repeat(60);
        assert_eq!(aliased_name(&exactly_sixty), exactly_sixty);

        let long = "z".repeat(61);
        let hashed = aliased_name(&long);
        assert_eq!(hashed.len(), 32);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hashed, aliased_name(&long));
    }

    #[test]
    fn test_options_from_config() {
        let options: SerializationOptions = serde_json::from_str("{}").unwrap();
        assert!(!options.stringify_json);

        let options: SerializationOptions =
            serde_json::from_str(r#"{ "stringify_json": true }"#).unwrap();
        assert_eq!(options, SerializationOptions::stringify_json());
    }
}
