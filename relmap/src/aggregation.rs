//! Aggregate functions usable anywhere an attribute can be selected

use std::fmt::{self, Display};

use crate::attribute::Attribute;
use crate::codec::FieldDefinition;
use crate::mapping::DataType;
use crate::statement::quote_identifier;
use crate::{Error, Result};

/// Aggregate functions for SELECT lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
}

impl Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Sum => write!(f, "sum"),
            AggregateFunction::Avg => write!(f, "avg"),
            AggregateFunction::Count | AggregateFunction::CountDistinct => write!(f, "count"),
            AggregateFunction::Min => write!(f, "min"),
            AggregateFunction::Max => write!(f, "max"),
        }
    }
}

/// An aggregate over an attribute, or over all rows for `count(*)`
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    function: AggregateFunction,
    operand: Option<Attribute>,
}

impl Aggregation {
    /// Only `Count` may be built without an operand
    pub fn new(function: AggregateFunction, operand: Option<Attribute>) -> Result<Self> {
        if operand.is_none() && function != AggregateFunction::Count {
            return Err(Error::invalid_aggregation(format!(
                "{:?} requires an attribute operand",
                function
            )));
        }

        Ok(Self { function, operand })
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    pub fn operand(&self) -> Option<&Attribute> {
        self.operand.as_ref()
    }

    /// Counts yield numbers; every other aggregate yields its operand's type
    pub fn result_type(&self) -> DataType {
        match (self.function, &self.operand) {
            (AggregateFunction::Count | AggregateFunction::CountDistinct, _) => DataType::Number,
            (_, Some(operand)) => operand.data_type(),
            (_, None) => DataType::Number,
        }
    }

    /// Table of the operand; `count(*)` has none
    pub fn source_table(&self) -> Option<&str> {
        self.operand.as_ref().map(Attribute::table_name)
    }

    pub fn field_definition(&self, key: &str) -> FieldDefinition {
        FieldDefinition::new(key, self.result_type())
    }

    /// Render as `fn("table"."column")`, optionally followed by ` AS "alias"`
    pub fn to_sql(&self, alias: Option<&str>) -> String {
        let mut sql = match (&self.operand, self.function) {
            (Some(operand), AggregateFunction::CountDistinct) => {
                format!("count(distinct {})", operand.quoted_qualified_column())
            }
            (Some(operand), function) => {
                format!("{}({})", function, operand.quoted_qualified_column())
            }
            (None, function) => format!("{}(*)", function),
        };

        if let Some(alias) = alias {
            sql.push_str(" AS ");
            sql.push_str(&quote_identifier(alias));
        }

        sql
    }
}

fn with_operand(function: AggregateFunction, operand: &Attribute) -> Aggregation {
    Aggregation {
        function,
        operand: Some(operand.clone()),
    }
}

pub fn sum(operand: &Attribute) -> Aggregation {
    with_operand(AggregateFunction::Sum, operand)
}

pub fn avg(operand: &Attribute) -> Aggregation {
    with_operand(AggregateFunction::Avg, operand)
}

pub fn min(operand: &Attribute) -> Aggregation {
    with_operand(AggregateFunction::Min, operand)
}

pub fn max(operand: &Attribute) -> Aggregation {
    with_operand(AggregateFunction::Max, operand)
}

/// `count(*)`
pub fn count() -> Aggregation {
    Aggregation {
        function: AggregateFunction::Count,
        operand: None,
    }
}

/// `count(column)`, which skips nulls
pub fn count_of(operand: &Attribute) -> Aggregation {
    with_operand(AggregateFunction::Count, operand)
}

pub fn count_distinct(operand: &Attribute) -> Aggregation {
    with_operand(AggregateFunction::CountDistinct, operand)
}
