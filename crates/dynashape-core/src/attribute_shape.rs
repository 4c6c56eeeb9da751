//! Projection of a [`Shape`] onto its tagged wire shape.
//!
//! Pure structural recursion with one case per shape kind. The result
//! describes which `AttributeValue` envelope a value of the shape is stored
//! in; it is used for key-schema checks and `attribute_type` conditions.
//!
//! Function and never shapes have no wire form and are rejected rather than
//! widened to `any`.

use std::collections::BTreeMap;
use std::fmt;

use dynashape_model::{Shape, ShapeKind, Value};

use crate::config::MapperConfig;
use crate::error::SchemaError;
use crate::mapper::ValuePath;

/// The wire shape of a [`Shape`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeShape {
    /// `{S: string}`
    S,
    /// `{N: string}`
    N,
    /// `{BOOL: bool}`
    Bool,
    /// `{B: bytes}`
    B,
    /// `{NULL: true}`
    Null,
    /// `{SS: [string...]}`
    Ss,
    /// `{NS: [string...]}`
    Ns,
    /// `{BS: [bytes...]}`
    Bs,
    /// `{L: [item...]}`
    L(Box<AttributeShape>),
    /// `{M: {key: value...}}` with arbitrary keys.
    MapOf(Box<AttributeShape>),
    /// `{M: {field: value...}}` with the record's fields.
    M(BTreeMap<String, AttributeShape>),
    /// Any of the projected members.
    Union(Vec<AttributeShape>),
    /// Whatever envelope the value carries.
    Any,
}

impl AttributeShape {
    /// The single wire tag this shape always uses, if there is one.
    #[must_use]
    pub fn type_descriptor(&self) -> Option<&'static str> {
        match self {
            Self::S => Some("S"),
            Self::N => Some("N"),
            Self::Bool => Some("BOOL"),
            Self::B => Some("B"),
            Self::Null => Some("NULL"),
            Self::Ss => Some("SS"),
            Self::Ns => Some("NS"),
            Self::Bs => Some("BS"),
            Self::L(_) => Some("L"),
            Self::MapOf(_) | Self::M(_) => Some("M"),
            Self::Union(_) | Self::Any => None,
        }
    }
}

impl fmt::Display for AttributeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L(item) => write!(f, "{{L: [{item}]}}"),
            Self::MapOf(value) => write!(f, "{{M: {{*: {value}}}}}"),
            Self::M(fields) => {
                f.write_str("{M: {")?;
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {shape}")?;
                }
                f.write_str("}}")
            }
            Self::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Self::Any => f.write_str("any"),
            scalar => write!(f, "{{{}}}", scalar.type_descriptor().unwrap_or("?")),
        }
    }
}

/// Typed set envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetTag {
    Ss,
    Ns,
    Bs,
}

/// Which typed set a set of `item` is stored in, if any.
pub(crate) fn set_tag(item: &Shape) -> Option<SetTag> {
    match item.kind() {
        ShapeKind::String | ShapeKind::Enum(_) | ShapeKind::Timestamp => Some(SetTag::Ss),
        ShapeKind::Number => Some(SetTag::Ns),
        ShapeKind::Binary => Some(SetTag::Bs),
        ShapeKind::Literal(Value::String(_)) => Some(SetTag::Ss),
        ShapeKind::Literal(Value::Number(_)) => Some(SetTag::Ns),
        _ => None,
    }
}

/// Project `shape` onto its wire shape.
pub fn shape_of(shape: &Shape, config: &MapperConfig) -> Result<AttributeShape, SchemaError> {
    project(shape, config, &mut ValuePath::root())
}

fn project(
    shape: &Shape,
    config: &MapperConfig,
    path: &mut ValuePath,
) -> Result<AttributeShape, SchemaError> {
    let projected = match shape.kind() {
        ShapeKind::String | ShapeKind::Timestamp | ShapeKind::Enum(_) => AttributeShape::S,
        ShapeKind::Number => AttributeShape::N,
        ShapeKind::Boolean => AttributeShape::Bool,
        ShapeKind::Binary => AttributeShape::B,
        ShapeKind::Nothing => AttributeShape::Null,
        ShapeKind::Any => AttributeShape::Any,
        ShapeKind::Literal(value) => literal_shape(value),
        ShapeKind::List(item) => {
            path.push_index(0);
            let item = project(item, config, path);
            path.pop();
            AttributeShape::L(Box::new(item?))
        }
        ShapeKind::Set(item) => match set_tag(item) {
            _ if config.set_as_list => {
                path.push_index(0);
                let item = project(item, config, path);
                path.pop();
                AttributeShape::L(Box::new(item?))
            }
            Some(SetTag::Ss) => AttributeShape::Ss,
            Some(SetTag::Ns) => AttributeShape::Ns,
            Some(SetTag::Bs) => AttributeShape::Bs,
            None => {
                return Err(SchemaError::UnsupportedShape {
                    path: path.to_string(),
                    kind: "set",
                    reason: format!(
                        "set items must be string, number or binary, got {}",
                        item.kind().name()
                    ),
                });
            }
        },
        ShapeKind::Map(value) => {
            path.push_key("*");
            let value = project(value, config, path);
            path.pop();
            AttributeShape::MapOf(Box::new(value?))
        }
        ShapeKind::Record(record) => {
            let mut fields = BTreeMap::new();
            for member in &record.members {
                path.push_key(&member.name);
                let field = project(&member.shape, config, path);
                path.pop();
                fields.insert(member.name.clone(), field?);
            }
            AttributeShape::M(fields)
        }
        ShapeKind::Union(members) => {
            let projected = members
                .iter()
                .map(|m| project(m, config, path))
                .collect::<Result<Vec<_>, _>>()?;
            AttributeShape::Union(projected)
        }
        ShapeKind::Function | ShapeKind::Never => {
            return Err(SchemaError::UnsupportedShape {
                path: path.to_string(),
                kind: shape.kind().name(),
                reason: "not a data type".to_owned(),
            });
        }
    };
    Ok(projected)
}

fn literal_shape(value: &Value) -> AttributeShape {
    match value {
        Value::Null => AttributeShape::Null,
        Value::Bool(_) => AttributeShape::Bool,
        Value::Number(_) => AttributeShape::N,
        Value::String(_) | Value::Timestamp(_) => AttributeShape::S,
        Value::Binary(_) => AttributeShape::B,
        Value::List(_) | Value::Set(_) | Value::Map(_) => AttributeShape::Any,
    }
}
