//! REST query construction
//!
//! Follows the same pattern as the rest of the api layer: a reusable [`Query`] and a
//! [`QueryBuilder`] that derives its parameters from schema fields and filter values.

pub mod builder;
pub mod ops;
pub mod query;

pub use builder::{QueryBuilder, QueryParams};
pub use ops::{MultiOp, QueryOp, op_param};
pub use query::Query;
