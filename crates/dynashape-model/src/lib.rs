//! Shape, value and wire types for dynashape.
//!
//! This crate holds the data types shared by the mapper and the expression
//! compiler: the [`Shape`] schema algebra, the native [`Value`], the tagged
//! wire [`AttributeValue`], and the request payloads a compiled expression is
//! merged into. It contains no behaviour beyond construction and serde.
// "DynamoDB" appears in many doc comments in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod input;
pub mod shape;
pub mod types;
pub mod value;

pub use attribute_value::AttributeValue;
pub use shape::{Constraint, Member, RecordShape, Shape, ShapeKind};
pub use value::Value;
