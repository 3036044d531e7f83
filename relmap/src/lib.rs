//! Relmap - typed table mappings and a query builder on top of them
//!
//! Declare a table once as a [`Mapping`], then build select, insert, update
//! and delete statements against its [`Attribute`] handles. Results come back
//! as [`Record`]s keyed by attribute name, or as any `serde` type.
//!
//! ```no_run
//! use relmap::executor::sqlite::SqliteExecutor;
//! use relmap::{define_table, equal, number, string, Filtered, Mapper, Projection, SerializationOptions};
//!
//! define_table! {
//!     struct Order("order") {
//!         id: number(),
//!         customer: string(),
//!     }
//! }
//!
//! define_table! {
//!     struct OrderDetail("order_detail") {
//!         id: number(),
//!         order_id: number(),
//!         quantity: number(),
//!     }
//! }
//!
//! # async fn run() -> relmap::Result<()> {
//! let order = Order::new()?;
//! let detail = OrderDetail::new()?;
//! let mapper = Mapper::new(SqliteExecutor::memory().await?, SerializationOptions::default());
//!
//! let rows = mapper
//!     .from(&order.mapping)
//!     .inner_join(&detail.mapping, equal(&detail.order_id, &order.id))?
//!     .select(
//!         Projection::new()
//!             .field("customer", &order.customer)
//!             .field("quantity", &detail.quantity),
//!     )?
//!     .where_equal(&order.id, 1)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod attribute;
pub mod builder;
pub mod codec;
pub mod condition;
pub mod error;
pub mod executor;
pub mod expression;
pub mod mapper;
pub mod mapping;
pub mod operator;
pub mod statement;
pub mod value;

// Re-export main types
pub use aggregation::{avg, count, count_distinct, count_of, max, min, sum, AggregateFunction, Aggregation};
pub use attribute::Attribute;
pub use builder::{
    CountQuery, DeleteQuery, Filtered, FromQuery, InsertQuery, ReturningInsertQuery, SelectQuery,
    UpdateQuery,
};
pub use codec::{FieldDefinition, SerializationOptions};
pub use condition::{
    and, bind_condition_attributes, comparison, equal, greater, is_not_null, is_null, less,
    not_equal, or, Condition, IntoOperand, LogicalOperator, Operand,
};
pub use error::{Error, Result};
pub use executor::{Executor, Transaction, TransactionalExecutor};
pub use expression::{Expression, Projection};
pub use mapper::Mapper;
pub use mapping::{boolean, datetime, define_mapping, json, number, string, AttributeSpec, DataType, Mapping};
pub use operator::{op, Operator};
pub use statement::{SortDirection, Statement};
pub use value::{Record, Row, Value};
