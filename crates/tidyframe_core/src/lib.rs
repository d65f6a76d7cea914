//! In-memory tables of named, typed, nullable columns, and the verbs that
//! transform them.
//!
//! Every verb takes `&Table` and returns a new `Table`. Nothing is modified in
//! place.
//!
//! ```text
//! table
//!     .filter(gt(col("age"), lit(18)))?
//!     .group_by(&["city"])?
//!     .summarize([mean("weight").remove_nulls(true).alias("mean_weight")])?
//! ```
pub mod aggregate;
pub mod arrays;
pub mod config;
pub mod expr;
pub mod group;
pub mod select;
pub mod sort;
pub mod testutil;
pub mod verbs;

pub use arrays::array::Array;
pub use arrays::column::{Column, column};
pub use arrays::datatype::DataType;
pub use arrays::row::RowContext;
pub use arrays::scalar::ScalarValue;
pub use arrays::schema::{Field, Schema};
pub use arrays::table::Table;
pub use config::ExecutionConfig;
pub use expr::predicate::Predicate;
pub use expr::{Expression, NamedExpr};
pub use group::GroupedTable;
pub use sort::SortKey;
