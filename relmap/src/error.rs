//! Error types for relmap

use thiserror::Error;

/// The main error type for relmap operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or execution error, passed through from the executor
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Two attributes of one mapping resolve to the same column
    #[error("Duplicate column '{column}' in mapping for table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// The same attribute name was declared twice
    #[error("Duplicate attribute '{attribute}' in mapping for table '{table}'")]
    DuplicateAttribute { table: String, attribute: String },

    /// Attribute not declared in the mapping
    #[error("Invalid attribute name: {attribute} (table '{table}')")]
    InvalidAttribute { table: String, attribute: String },

    /// The join target is already part of the from-clause
    #[error("Invalid join. The same table ({table}) can be referred to in one from-clause only")]
    InvalidJoin { table: String },

    /// A selected, ordered or grouped expression refers to a table not in the from-clause
    #[error("Invalid expression for attribute \"{key}\": the table {table} is missing a from-clause entry")]
    OutOfScope { key: String, table: String },

    /// Aggregation constructed with an unsupported operand
    #[error("Invalid aggregation: {message}")]
    InvalidAggregation { message: String },

    /// Invalid query configuration
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// Unknown comparison operator
    #[error("Unknown operator '{operator}'")]
    InvalidOperator { operator: String },

    /// A condition attribute was bound to a null instance value
    #[error("Binding instance has a null value for attribute '{attribute}'")]
    NullBind { attribute: String },

    /// A condition attribute was bound to an instance that lacks the attribute
    #[error("Binding instance missing required attribute '{attribute}'")]
    UnboundAttribute { attribute: String },

    /// A single-row read did not find the expected number of rows
    #[error("Expected {expected} row, found {found}")]
    Cardinality { expected: &'static str, found: usize },

    /// A value does not fit the declared type of its attribute
    #[error("Attribute '{attribute}' expects a {expected} value, got {found}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Results that contradict the statement that produced them
    #[error("Internal consistency error: {message}")]
    InternalConsistency { message: String },
}

/// Convenience Result type for relmap operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new duplicate column error
    pub fn duplicate_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::DuplicateColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create a new duplicate attribute error
    pub fn duplicate_attribute(table: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::DuplicateAttribute {
            table: table.into(),
            attribute: attribute.into(),
        }
    }

    /// Create a new invalid attribute error
    pub fn invalid_attribute(table: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            table: table.into(),
            attribute: attribute.into(),
        }
    }

    /// Create a new invalid join error
    pub fn invalid_join(table: impl Into<String>) -> Self {
        Self::InvalidJoin {
            table: table.into(),
        }
    }

    /// Create a new out-of-scope expression error
    pub fn out_of_scope(key: impl Into<String>, table: impl Into<String>) -> Self {
        Self::OutOfScope {
            key: key.into(),
            table: table.into(),
        }
    }

    /// Create a new invalid aggregation error
    pub fn invalid_aggregation(message: impl Into<String>) -> Self {
        Self::InvalidAggregation {
            message: message.into(),
        }
    }

    /// Create a new invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create a new null bind error
    pub fn null_bind(attribute: impl Into<String>) -> Self {
        Self::NullBind {
            attribute: attribute.into(),
        }
    }

    /// Create a new unbound attribute error
    pub fn unbound_attribute(attribute: impl Into<String>) -> Self {
        Self::UnboundAttribute {
            attribute: attribute.into(),
        }
    }

    /// Create a new cardinality error for reads that expect exactly one row
    pub fn not_exactly_one(found: usize) -> Self {
        Self::Cardinality {
            expected: "exactly one",
            found,
        }
    }

    /// Create a new cardinality error for reads that accept at most one row
    pub fn more_than_one(found: usize) -> Self {
        Self::Cardinality {
            expected: "at most one",
            found,
        }
    }

    pub fn type_mismatch(
        attribute: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            attribute: attribute.into(),
            expected,
            found,
        }
    }

    /// Create a new internal consistency error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalConsistency {
            message: message.into(),
        }
    }

    /// Whether this error is a null bind, the one binding failure callers may opt out of
    pub fn is_null_bind(&self) -> bool {
        matches!(self, Self::NullBind { .. })
    }
}
