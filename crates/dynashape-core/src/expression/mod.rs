//! Rendering DSL trees into the target expression dialect, and checking
//! rendered output.
//!
//! 1. **Writing**: a [`Writer`] renders a node tree, interning names and
//!    values in its [`Namespace`].
//! 2. **Compiling**: the `compile_*` functions render whole conditions,
//!    update action lists, projections and queries.
//! 3. **Verifying**: the `verify_*` functions parse compiled text back and
//!    check its placeholders against the tables.

pub mod ast;
mod compile;
pub mod parser;
mod verify;
mod writer;

pub use compile::{
    CompiledQuery, compile_condition, compile_projection, compile_query, compile_update,
};
pub use parser::{ExpressionError, parse_condition, parse_projection, parse_update};
pub use verify::{
    ExpressionKind, verify_condition, verify_expressions, verify_projection, verify_query,
    verify_update,
};
pub use writer::{CompiledExpression, Namespace, Writer};

pub(crate) use compile::{write_projection, write_update};
