//! End-to-end tests for dynashape.
//!
//! Each module drives the public API the way a caller would: declare a
//! record shape, open a [`Table`] over it, build expressions through the
//! facade and check the compiled text, tables and payloads.
//!
//! ```text
//! cargo test -p dynashape-integration
//! ```

use std::sync::{Arc, Once};

use dynashape_core::{MapperConfig, Table};
use dynashape_model::{Constraint, Shape};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// The record shape shared by the tests.
///
/// `id` is the partition key and `version` the sort key.
#[must_use]
pub fn document_shape() -> Arc<Shape> {
    Arc::new(
        Shape::record("Document")
            .member("id", Shape::string())
            .member("version", Shape::number().with(Constraint::Integer))
            .member("count", Shape::number())
            .member("array", Shape::list(Shape::string()))
            .member(
                "nested",
                Shape::record("Nested").member("a", Shape::string()).build(),
            )
            .member("tags", Shape::set(Shape::string()))
            .member("blobs", Shape::set(Shape::binary()))
            .member(
                "fieldName",
                Shape::list(Shape::string().with(Constraint::MaxLength(3))),
            )
            .optional("note", Shape::string())
            .member("attrs", Shape::map(Shape::number()))
            .build(),
    )
}

/// A table over [`document_shape`] keyed by `id` and `version`.
pub fn document_table() -> anyhow::Result<Table> {
    init_tracing();
    Ok(Table::new(
        "documents",
        document_shape(),
        "id",
        Some("version"),
        MapperConfig::default(),
    )?)
}

mod test_condition;
mod test_mapper;
mod test_query;
mod test_update;
