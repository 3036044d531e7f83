//! Statement descriptions handed to an executor, and their SQL rendering
//!
//! Builders produce these plain values; executors render them with
//! [`Statement::to_sql_for`] and bind [`Statement::parameters`] in order.
//! Every placeholder is a positional `?`.

use std::fmt::{self, Display};

use crate::{Error, Result, Value};

/// Quote an identifier, doubling any embedded quote
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Core trait for all statements
pub trait Statement {
    /// Render for a dialect
    fn to_sql_for(&self, dialect: &Dialect) -> Result<String>;

    /// Render with the generic dialect
    fn to_sql(&self) -> Result<String> {
        self.to_sql_for(&Dialect::GENERIC)
    }

    /// Bound values, in placeholder order
    fn parameters(&self) -> Vec<Value>;
}

/// What the target database understands beyond the common subset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub row_locks: bool,
    pub truncate: bool,
    pub offset_requires_limit: bool,
}

impl Dialect {
    pub const GENERIC: Dialect = Dialect {
        row_locks: true,
        truncate: true,
        offset_requires_limit: false,
    };

    pub const SQLITE: Dialect = Dialect {
        row_locks: false,
        truncate: false,
        offset_requires_limit: true,
    };
}

/// Where a lowered condition is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseTarget {
    Where,
    JoinOn,
}

/// A rendered condition with its bound values
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<Value>,
    pub target: ClauseTarget,
}

impl Fragment {
    pub(crate) fn empty(target: ClauseTarget) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            target,
        }
    }

    /// AND-combine fragments without extra parentheses; `None` when there are none
    pub(crate) fn conjoin(fragments: impl IntoIterator<Item = Fragment>) -> Option<Fragment> {
        let mut fragments = fragments.into_iter();
        let mut combined = fragments.next()?;
        for fragment in fragments {
            combined.sql.push_str(" AND ");
            combined.sql.push_str(&fragment.sql);
            combined.params.extend(fragment.params);
        }
        Some(combined)
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT OUTER JOIN"),
            JoinType::Right => write!(f, "RIGHT OUTER JOIN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub on: Fragment,
}

/// Sort direction for ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub expression: String,
    pub direction: SortDirection,
}

/// A SELECT over one base table and its joins
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: String,
    /// Rendered select-list entries, `expr AS "alias"`
    pub columns: Vec<String>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Fragment>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub for_update: bool,
}

impl SelectStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            joins: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            for_update: false,
        }
    }
}

impl Statement for SelectStatement {
    fn to_sql_for(&self, dialect: &Dialect) -> Result<String> {
        if self.columns.is_empty() {
            return Err(Error::invalid_query("select list is empty"));
        }

        let mut sql = String::from("SELECT ");
        sql.push_str(&self.columns.join(", "));

        sql.push_str(" FROM ");
        sql.push_str(&quote_identifier(&self.table));

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.join_type.to_string());
            sql.push(' ');
            sql.push_str(&quote_identifier(&join.table));
            sql.push_str(" ON ");
            sql.push_str(&join.on.sql);
        }

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause.sql);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let parts: Vec<String> = self
                .order_by
                .iter()
                .map(|clause| format!("{} {}", clause.expression, clause.direction))
                .collect();
            sql.push_str(&parts.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(_)) if dialect.offset_requires_limit => sql.push_str(" LIMIT -1"),
            (None, _) => {}
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        if self.for_update {
            if dialect.row_locks {
                sql.push_str(" FOR UPDATE");
            } else {
                tracing::debug!(table = %self.table, "row locks unsupported, dropping FOR UPDATE");
            }
        }

        Ok(sql)
    }

    fn parameters(&self) -> Vec<Value> {
        self.joins
            .iter()
            .flat_map(|join| join.on.params.iter().cloned())
            .chain(
                self.where_clause
                    .iter()
                    .flat_map(|clause| clause.params.iter().cloned()),
            )
            .collect()
    }
}

/// An INSERT of one or more rows sharing a column list
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rendered returning-list entries; empty means no RETURNING clause
    pub returning: Vec<String>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            returning: Vec::new(),
        }
    }
}

impl Statement for InsertStatement {
    fn to_sql_for(&self, _dialect: &Dialect) -> Result<String> {
        if self.rows.is_empty() {
            return Err(Error::invalid_query("insert has no rows"));
        }
        if let Some(row) = self.rows.iter().find(|row| row.len() != self.columns.len()) {
            return Err(Error::internal(format!(
                "insert row has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }

        let mut sql = format!("INSERT INTO {}", quote_identifier(&self.table));

        if self.columns.is_empty() {
            if self.rows.len() > 1 {
                return Err(Error::invalid_query(
                    "cannot insert several rows without any mapped column",
                ));
            }
            sql.push_str(" DEFAULT VALUES");
        } else {
            let columns: Vec<String> = self.columns.iter().map(|c| quote_identifier(c)).collect();
            let placeholders = format!("({})", vec!["?"; self.columns.len()].join(", "));
            let values = vec![placeholders; self.rows.len()].join(", ");

            sql.push_str(&format!(" ({}) VALUES {}", columns.join(", "), values));
        }

        if !self.returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning.join(", "));
        }

        Ok(sql)
    }

    fn parameters(&self) -> Vec<Value> {
        self.rows.iter().flatten().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub values: Vec<(String, Value)>,
    pub where_clause: Option<Fragment>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
            where_clause: None,
        }
    }
}

impl Statement for UpdateStatement {
    fn to_sql_for(&self, _dialect: &Dialect) -> Result<String> {
        if self.values.is_empty() {
            return Err(Error::invalid_query("update sets no columns"));
        }

        let assignments: Vec<String> = self
            .values
            .iter()
            .map(|(column, _)| format!("{} = ?", quote_identifier(column)))
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            quote_identifier(&self.table),
            assignments.join(", ")
        );

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause.sql);
        }

        Ok(sql)
    }

    fn parameters(&self) -> Vec<Value> {
        self.values
            .iter()
            .map(|(_, value)| value.clone())
            .chain(
                self.where_clause
                    .iter()
                    .flat_map(|clause| clause.params.iter().cloned()),
            )
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<Fragment>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: None,
        }
    }
}

impl Statement for DeleteStatement {
    fn to_sql_for(&self, _dialect: &Dialect) -> Result<String> {
        let mut sql = format!("DELETE FROM {}", quote_identifier(&self.table));

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause.sql);
        }

        Ok(sql)
    }

    fn parameters(&self) -> Vec<Value> {
        self.where_clause
            .iter()
            .flat_map(|clause| clause.params.iter().cloned())
            .collect()
    }
}

/// Removes every row of a table
#[derive(Debug, Clone, PartialEq)]
pub struct TruncateStatement {
    pub table: String,
}

impl TruncateStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Statement for TruncateStatement {
    fn to_sql_for(&self, dialect: &Dialect) -> Result<String> {
        let table = quote_identifier(&self.table);
        if dialect.truncate {
            Ok(format!("TRUNCATE TABLE {}", table))
        } else {
            Ok(format!("DELETE FROM {}", table))
        }
    }

    fn parameters(&self) -> Vec<Value> {
        Vec::new()
    }
}
