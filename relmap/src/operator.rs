//! SQL comparison operators

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::Error;

/// Comparison operator usable in where and join-on conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operator(&'static str);

impl Operator {
    pub const LT: Self = Operator("<");
    pub const GT: Self = Operator(">");
    pub const LTE: Self = Operator("<=");
    pub const GTE: Self = Operator(">=");
    pub const EQ: Self = Operator("=");
    pub const NEQ: Self = Operator("!=");

    /// Get the string representation of the operator
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Operator::LT),
            ">" => Ok(Operator::GT),
            "<=" => Ok(Operator::LTE),
            ">=" => Ok(Operator::GTE),
            "=" => Ok(Operator::EQ),
            "!=" | "<>" => Ok(Operator::NEQ),
            other => Err(Error::InvalidOperator {
                operator: other.to_string(),
            }),
        }
    }
}

/// Convenience module for operator constants
pub mod op {
    use super::Operator;

    pub const LT: Operator = Operator::LT;
    pub const GT: Operator = Operator::GT;
    pub const LTE: Operator = Operator::LTE;
    pub const GTE: Operator = Operator::GTE;
    pub const EQ: Operator = Operator::EQ;
    pub const NEQ: Operator = Operator::NEQ;
}
