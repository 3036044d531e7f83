//! Condition algebra: comparison leaves and and/or branches over attributes and literals
//!
//! Conditions lower into two targets, a where-clause and a join-on clause.
//! Attribute operands always render as quoted qualified columns and literal
//! operands always become bound parameters. The one exception is an equality
//! against a `Null` literal, which renders `IS NULL` / `IS NOT NULL`.

use chrono::{DateTime, Utc};

use crate::attribute::Attribute;
use crate::mapping::Mapping;
use crate::operator::Operator;
use crate::statement::{ClauseTarget, Fragment};
use crate::value::{Record, Value};
use crate::{Error, Result};

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Attribute(Attribute),
    Literal(Value),
}

/// Trait for types usable as comparison operands
pub trait IntoOperand {
    fn into_operand(self) -> Operand;
}

impl IntoOperand for Operand {
    fn into_operand(self) -> Operand {
        self
    }
}

impl IntoOperand for Attribute {
    fn into_operand(self) -> Operand {
        Operand::Attribute(self)
    }
}

impl IntoOperand for &Attribute {
    fn into_operand(self) -> Operand {
        Operand::Attribute(self.clone())
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOperand for $ty {
                fn into_operand(self) -> Operand {
                    Operand::Literal(Value::from(self))
                }
            }
        )*
    };
}

literal_operand!(Value, bool, i32, i64, u32, f32, f64, String, &str, DateTime<Utc>);

/// Logical connective of a branch node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    fn keyword(&self) -> &'static str {
        match self {
            LogicalOperator::And => " AND ",
            LogicalOperator::Or => " OR ",
        }
    }

    /// What an empty branch evaluates to
    fn identity(&self) -> &'static str {
        match self {
            LogicalOperator::And => "1 = 1",
            LogicalOperator::Or => "1 = 0",
        }
    }
}

/// A node in the condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        operator: Operator,
        left: Operand,
        right: Operand,
    },
    Logical {
        operator: LogicalOperator,
        operands: Vec<Condition>,
    },
}

/// Compare two operands
///
/// # Examples
/// ```
/// use relmap::{comparison, define_mapping, number, op};
///
/// let order = define_mapping("order", [("id", number())]).unwrap();
/// let condition = comparison(&order.attribute("id").unwrap(), op::GT, 10);
///
/// let fragment = condition.to_where_fragment();
/// assert_eq!(fragment.sql, "\"order\".\"id\" > ?");
/// ```
pub fn comparison(left: impl IntoOperand, operator: Operator, right: impl IntoOperand) -> Condition {
    Condition::Comparison {
        operator,
        left: left.into_operand(),
        right: right.into_operand(),
    }
}

pub fn equal(left: impl IntoOperand, right: impl IntoOperand) -> Condition {
    comparison(left, Operator::EQ, right)
}

pub fn not_equal(left: impl IntoOperand, right: impl IntoOperand) -> Condition {
    comparison(left, Operator::NEQ, right)
}

pub fn less(left: impl IntoOperand, right: impl IntoOperand) -> Condition {
    comparison(left, Operator::LT, right)
}

pub fn greater(left: impl IntoOperand, right: impl IntoOperand) -> Condition {
    comparison(left, Operator::GT, right)
}

/// `operand IS NULL`
pub fn is_null(operand: impl IntoOperand) -> Condition {
    equal(operand, Value::Null)
}

/// `operand IS NOT NULL`
pub fn is_not_null(operand: impl IntoOperand) -> Condition {
    not_equal(operand, Value::Null)
}

/// Conjunction of conditions, rendered in the given order
pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    Condition::Logical {
        operator: LogicalOperator::And,
        operands: conditions.into_iter().collect(),
    }
}

/// Disjunction of conditions, rendered in the given order
pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    Condition::Logical {
        operator: LogicalOperator::Or,
        operands: conditions.into_iter().collect(),
    }
}

impl Condition {
    /// Lower into a where-clause fragment
    pub fn to_where_fragment(&self) -> Fragment {
        self.lower(ClauseTarget::Where)
    }

    /// Lower into a join-on fragment
    pub fn to_join_fragment(&self) -> Fragment {
        self.lower(ClauseTarget::JoinOn)
    }

    fn lower(&self, target: ClauseTarget) -> Fragment {
        let mut fragment = Fragment::empty(target);
        self.write_to(&mut fragment);
        fragment
    }

    fn write_to(&self, fragment: &mut Fragment) {
        match self {
            Condition::Comparison {
                operator,
                left,
                right: Operand::Literal(Value::Null),
            } if *operator == Operator::EQ || *operator == Operator::NEQ => {
                write_operand(left, fragment);
                fragment.sql.push_str(if *operator == Operator::EQ {
                    " IS NULL"
                } else {
                    " IS NOT NULL"
                });
            }
            Condition::Comparison {
                operator,
                left,
                right,
            } => {
                write_operand(left, fragment);
                fragment.sql.push(' ');
                fragment.sql.push_str(operator.as_str());
                fragment.sql.push(' ');
                write_operand(right, fragment);
            }
            Condition::Logical { operator, operands } => match operands.as_slice() {
                [] => fragment.sql.push_str(operator.identity()),
                [single] => single.write_to(fragment),
                _ => {
                    fragment.sql.push('(');
                    for (i, operand) in operands.iter().enumerate() {
                        if i > 0 {
                            fragment.sql.push_str(operator.keyword());
                        }
                        operand.write_to(fragment);
                    }
                    fragment.sql.push(')');
                }
            },
        }
    }

    /// Every attribute referenced anywhere in the tree, left to right
    pub fn attributes(&self) -> Vec<&Attribute> {
        let mut found = Vec::new();
        self.collect_attributes(&mut found);
        found
    }

    fn collect_attributes<'a>(&'a self, found: &mut Vec<&'a Attribute>) {
        match self {
            Condition::Comparison { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Attribute(attribute) = operand {
                        found.push(attribute);
                    }
                }
            }
            Condition::Logical { operands, .. } => {
                for operand in operands {
                    operand.collect_attributes(found);
                }
            }
        }
    }
}

fn write_operand(operand: &Operand, fragment: &mut Fragment) {
    match operand {
        Operand::Attribute(attribute) => {
            fragment.sql.push_str(&attribute.quoted_qualified_column());
        }
        Operand::Literal(value) => {
            fragment.sql.push('?');
            fragment.params.push(value.clone());
        }
    }
}

/// Replace the attributes of `mapping` in a condition with the instance's values
///
/// Fails with [`Error::NullBind`] when the instance holds `Null` for a bound
/// attribute and with [`Error::UnboundAttribute`] when the instance lacks it.
/// With `catch_null_binds`, a null bind anywhere in the tree yields `Ok(None)`,
/// meaning the condition cannot be evaluated for this instance; other bind
/// failures still propagate.
pub fn bind_condition_attributes(
    condition: &Condition,
    mapping: &Mapping,
    instance: &Record,
    catch_null_binds: bool,
) -> Result<Option<Condition>> {
    let mut null_bind = None;
    let bound = bind(condition, mapping, instance, &mut null_bind)?;

    match null_bind {
        None => Ok(Some(bound)),
        Some(attribute) if catch_null_binds => {
            tracing::trace!(%attribute, "null bind caught, condition does not apply");
            Ok(None)
        }
        Some(attribute) => Err(Error::null_bind(attribute)),
    }
}

fn bind(
    condition: &Condition,
    mapping: &Mapping,
    instance: &Record,
    null_bind: &mut Option<String>,
) -> Result<Condition> {
    match condition {
        Condition::Logical { operator, operands } => Ok(Condition::Logical {
            operator: *operator,
            operands: operands
                .iter()
                .map(|operand| bind(operand, mapping, instance, null_bind))
                .collect::<Result<_>>()?,
        }),
        Condition::Comparison {
            operator,
            left,
            right,
        } => Ok(Condition::Comparison {
            operator: *operator,
            left: bind_operand(left, mapping, instance, null_bind)?,
            right: bind_operand(right, mapping, instance, null_bind)?,
        }),
    }
}

fn bind_operand(
    operand: &Operand,
    mapping: &Mapping,
    instance: &Record,
    null_bind: &mut Option<String>,
) -> Result<Operand> {
    match operand {
        Operand::Attribute(attribute) if attribute.belongs_to(mapping) => {
            match instance.get(attribute.attribute_name()) {
                None => Err(Error::unbound_attribute(attribute.attribute_name())),
                Some(Value::Null) => {
                    null_bind.get_or_insert_with(|| attribute.attribute_name().to_string());
                    Ok(operand.clone())
                }
                Some(value) => Ok(Operand::Literal(value.clone())),
            }
        }
        _ => Ok(operand.clone()),
    }
}
