//! Constraint checks run while reading.

use dynashape_model::{Constraint, Value};
use regex::Regex;

use crate::error::SchemaError;
use crate::mapper::ValuePath;

/// A compiled [`Constraint`].
#[derive(Debug, Clone)]
pub(crate) enum Check {
    MinLength(usize),
    MaxLength(usize),
    Minimum(f64),
    Maximum(f64),
    Pattern(Regex),
    Integer,
}

/// Compile the constraints attached to one shape node.
pub(crate) fn compile(
    constraints: &[Constraint],
    path: &ValuePath,
) -> Result<Vec<Check>, SchemaError> {
    constraints
        .iter()
        .map(|c| {
            Ok(match c {
                Constraint::MinLength(n) => Check::MinLength(*n),
                Constraint::MaxLength(n) => Check::MaxLength(*n),
                Constraint::Minimum(n) => Check::Minimum(*n),
                Constraint::Maximum(n) => Check::Maximum(*n),
                Constraint::Integer => Check::Integer,
                Constraint::Pattern(p) => {
                    Check::Pattern(Regex::new(p).map_err(|source| SchemaError::InvalidPattern {
                        path: path.to_string(),
                        pattern: p.clone(),
                        source,
                    })?)
                }
            })
        })
        .collect()
}

/// Length as constraints see it: chars for strings, bytes for binaries,
/// entries for collections.
fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Binary(b) => Some(b.len()),
        Value::List(v) | Value::Set(v) => Some(v.len()),
        Value::Map(m) => Some(m.len()),
        _ => None,
    }
}

impl Check {
    /// Returns a message when `value` violates the check. Checks that do not
    /// apply to the value's variant pass.
    pub(crate) fn violation(&self, value: &Value) -> Option<String> {
        match self {
            Self::MinLength(min) => {
                let len = length(value)?;
                (len < *min).then(|| format!("length {len} is less than minimum {min}"))
            }
            Self::MaxLength(max) => {
                let len = length(value)?;
                (len > *max).then(|| format!("length {len} exceeds maximum {max}"))
            }
            Self::Minimum(min) => {
                let n = value.as_f64()?;
                (n < *min).then(|| format!("{n} is less than minimum {min}"))
            }
            Self::Maximum(max) => {
                let n = value.as_f64()?;
                (n > *max).then(|| format!("{n} exceeds maximum {max}"))
            }
            Self::Integer => {
                let n = value.as_f64()?;
                (n.fract() != 0.0).then(|| format!("{n} is not an integer"))
            }
            Self::Pattern(re) => {
                let s = value.as_str()?;
                (!re.is_match(s)).then(|| format!("{s:?} does not match pattern {}", re.as_str()))
            }
        }
    }
}
