//! Error types for dynashape.
//!
//! One enum per concern: shape problems found while building mappers
//! ([`SchemaError`]), wire values that do not fit their shape
//! ([`MapperError`]), misuse of the expression DSL ([`DslError`]). Expression
//! verification errors live next to the parser as
//! [`ExpressionError`](crate::expression::ExpressionError).

use std::fmt;

use crate::expression::ExpressionError;

/// A shape cannot be mapped to the wire format.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The shape kind has no wire representation in this position.
    #[error("unsupported shape at {path}: {kind} ({reason})")]
    UnsupportedShape {
        /// Location of the offending node.
        path: String,
        /// Kind name of the offending node.
        kind: &'static str,
        /// Why it is unsupported.
        reason: String,
    },
    /// A `Pattern` constraint does not compile.
    #[error("invalid pattern '{pattern}' at {path}: {source}")]
    InvalidPattern {
        /// Location of the constrained node.
        path: String,
        /// The pattern as written.
        pattern: String,
        /// Compilation failure.
        #[source]
        source: regex::Error,
    },
    /// Two members of one record share a name.
    #[error("duplicate member '{member}' in record {record}")]
    DuplicateMember {
        /// Record name.
        record: String,
        /// Repeated member name.
        member: String,
    },
    /// A named member does not exist.
    #[error("record {record} has no member '{member}'")]
    UnknownMember {
        /// Record name.
        record: String,
        /// Requested member name.
        member: String,
    },
    /// A key attribute does not project to `S`, `N` or `B`.
    #[error("key attribute '{attr}' must be a string, number or binary, got {actual}")]
    InvalidKeyShape {
        /// Key attribute name.
        attr: String,
        /// The wire shape it projects to.
        actual: String,
    },
    /// A table needs a record shape.
    #[error("table shape must be a record, got {kind}")]
    NotARecord {
        /// Kind name of the supplied shape.
        kind: &'static str,
    },
}

/// One failed constraint, tagged with where it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON-pointer-like location, e.g. `$['tags'][0]`.
    pub path: String,
    /// What was wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: {}", self.path, self.message)
    }
}

/// Every violation found in one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    /// Iterate the violations.
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are none.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// A value does not fit its shape.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// The wire tag or native variant is not what the shape expects.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Location of the offending value.
        path: String,
        /// What the shape expects.
        expected: String,
        /// What was encountered.
        found: String,
    },
    /// One or more constraints failed.
    #[error("validation failed: {0}")]
    Validation(Violations),
    /// The shape itself cannot be mapped.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl MapperError {
    /// Violations carried by a `Validation` error.
    #[must_use]
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

/// Misuse of the expression DSL.
#[derive(Debug, thiserror::Error)]
pub enum DslError {
    /// The shape is not a data type (function / never).
    #[error("cannot build an expression over a {kind} shape at {path}")]
    Construction {
        /// Location of the offending node.
        path: String,
        /// Kind name of the offending node.
        kind: &'static str,
    },
    /// The operation makes no sense for the expression's type.
    #[error("'{operation}' is not supported on a {kind} expression: {hint}")]
    UnsupportedOperation {
        /// The attempted operation.
        operation: &'static str,
        /// Kind of the receiving expression.
        kind: &'static str,
        /// How to fix the call.
        hint: String,
    },
    /// A record field that does not exist.
    #[error("record {record} has no field '{field}'")]
    UnknownField {
        /// Record name.
        record: String,
        /// Requested field.
        field: String,
    },
    /// A literal could not be encoded for its field.
    #[error(transparent)]
    Mapper(#[from] MapperError),
    /// A shape could not be mapped while building the facade.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Umbrella error for table-level operations.
#[derive(Debug, thiserror::Error)]
pub enum DynashapeError {
    /// Schema problem.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Value/shape mismatch.
    #[error(transparent)]
    Mapper(#[from] MapperError),
    /// DSL misuse.
    #[error(transparent)]
    Dsl(#[from] DslError),
    /// Compiled expression failed verification.
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// Convenience result type for table-level operations.
pub type DynashapeResult<T> = Result<T, DynashapeError>;
