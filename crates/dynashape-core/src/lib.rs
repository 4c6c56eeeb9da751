//! Shape-driven attribute mapping and typed expression compilation.
//!
//! A record [`Shape`](dynashape_model::Shape) drives everything here:
//!
//! - [`mapper`] encodes native values to wire attributes and back, checking
//!   constraints on the way.
//! - [`dsl`] exposes a typed facade over the record for building conditions,
//!   update actions and projections.
//! - [`expression`] renders those trees into expression text with their
//!   `#n`/`:n` tables, and verifies the result.
//! - [`table`] ties a record shape to a key schema and builds complete
//!   request payloads.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod attribute_shape;
pub mod config;
pub mod dsl;
pub mod error;
pub mod expression;
pub mod mapper;
pub mod table;

pub use attribute_shape::{AttributeShape, shape_of};
pub use config::MapperConfig;
pub use dsl::{
    Condition, DslExpression, Facade, Item, KeyCondition, Ordered, SortCondition, UpdateAction,
};
pub use error::{DslError, DynashapeError, DynashapeResult, MapperError, SchemaError};
pub use expression::{CompiledExpression, CompiledQuery};
pub use mapper::{Mapper, MapperCache};
pub use table::{KeyAttribute, KeySchema, Table};
