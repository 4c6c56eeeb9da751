//! The shape algebra describing a record schema.
//!
//! A [`Shape`] is a closed, recursively-defined tree: every node has exactly
//! one [`ShapeKind`], containers own their item/value shape, and records own
//! an ordered list of uniquely named [`Member`]s. Constraints ride along on
//! the node they restrict, so a `list<string(max 3)>` carries the length
//! bound on the item shape rather than on the list.
//!
//! Shapes are shared through [`Arc`]; mapper caches key on the `Arc` identity.

use std::sync::Arc;

use crate::value::Value;

/// A schema node: one kind plus the constraints that apply to its values.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    kind: ShapeKind,
    constraints: Vec<Constraint>,
}

/// The closed set of shape kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// UTF-8 string.
    String,
    /// Number (decimal on the wire).
    Number,
    /// Boolean.
    Boolean,
    /// Raw bytes.
    Binary,
    /// Point in time, ISO-8601 on the wire.
    Timestamp,
    /// The unit/null type.
    Nothing,
    /// Dynamically typed value.
    Any,
    /// Ordered list of items.
    List(Arc<Shape>),
    /// Set of items.
    Set(Arc<Shape>),
    /// String-keyed map of values.
    Map(Arc<Shape>),
    /// Record with named members.
    Record(RecordShape),
    /// One of several shapes.
    Union(Vec<Arc<Shape>>),
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// Exactly one value.
    Literal(Value),
    /// A function. Not data; rejected by mappers and facades.
    Function,
    /// The empty type. Not data; rejected by mappers and facades.
    Never,
}

/// A record: a name plus ordered members.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    /// Record type name, used in error messages.
    pub name: String,
    /// Members in declaration order.
    pub members: Vec<Member>,
}

/// A named record member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Attribute name.
    pub name: String,
    /// Member shape.
    pub shape: Arc<Shape>,
}

/// A value constraint checked when reading from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Minimum length (chars, bytes, or entries).
    MinLength(usize),
    /// Maximum length (chars, bytes, or entries).
    MaxLength(usize),
    /// Inclusive numeric lower bound.
    Minimum(f64),
    /// Inclusive numeric upper bound.
    Maximum(f64),
    /// Regular expression a string must match.
    Pattern(String),
    /// Number must be integral.
    Integer,
}

impl Shape {
    fn of(kind: ShapeKind) -> Self {
        Self {
            kind,
            constraints: Vec::new(),
        }
    }

    /// `string`
    #[must_use]
    pub fn string() -> Self {
        Self::of(ShapeKind::String)
    }

    /// `number`
    #[must_use]
    pub fn number() -> Self {
        Self::of(ShapeKind::Number)
    }

    /// `boolean`
    #[must_use]
    pub fn boolean() -> Self {
        Self::of(ShapeKind::Boolean)
    }

    /// `binary`
    #[must_use]
    pub fn binary() -> Self {
        Self::of(ShapeKind::Binary)
    }

    /// `timestamp`
    #[must_use]
    pub fn timestamp() -> Self {
        Self::of(ShapeKind::Timestamp)
    }

    /// `nothing`
    #[must_use]
    pub fn nothing() -> Self {
        Self::of(ShapeKind::Nothing)
    }

    /// `any`
    #[must_use]
    pub fn any() -> Self {
        Self::of(ShapeKind::Any)
    }

    /// `function`
    #[must_use]
    pub fn function() -> Self {
        Self::of(ShapeKind::Function)
    }

    /// `never`
    #[must_use]
    pub fn never() -> Self {
        Self::of(ShapeKind::Never)
    }

    /// `list<item>`
    #[must_use]
    pub fn list(item: impl Into<Arc<Shape>>) -> Self {
        Self::of(ShapeKind::List(item.into()))
    }

    /// `set<item>`
    #[must_use]
    pub fn set(item: impl Into<Arc<Shape>>) -> Self {
        Self::of(ShapeKind::Set(item.into()))
    }

    /// `map<value>`
    #[must_use]
    pub fn map(value: impl Into<Arc<Shape>>) -> Self {
        Self::of(ShapeKind::Map(value.into()))
    }

    /// `union[members...]`
    #[must_use]
    pub fn union<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<Shape>>,
    {
        Self::of(ShapeKind::Union(members.into_iter().map(Into::into).collect()))
    }

    /// `union[inner, nothing]`: a member that may be absent or null.
    #[must_use]
    pub fn optional(inner: impl Into<Arc<Shape>>) -> Self {
        Self::union([inner.into(), Arc::new(Self::nothing())])
    }

    /// `enum{values...}`
    #[must_use]
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::of(ShapeKind::Enum(values.into_iter().map(Into::into).collect()))
    }

    /// `literal(value)`
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::of(ShapeKind::Literal(value.into()))
    }

    /// Start a record shape.
    #[must_use]
    pub fn record(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            record: RecordShape {
                name: name.into(),
                members: Vec::new(),
            },
            constraints: Vec::new(),
        }
    }

    /// Attach a constraint.
    #[must_use]
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// The node kind.
    #[must_use]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Constraints attached to this node.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Returns the record if this is a record shape.
    #[must_use]
    pub fn as_record(&self) -> Option<&RecordShape> {
        match &self.kind {
            ShapeKind::Record(r) => Some(r),
            _ => None,
        }
    }

    /// `true` for `union[.., nothing, ..]`, `nothing` and `any`: shapes whose
    /// record members may be omitted.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        match &self.kind {
            ShapeKind::Nothing | ShapeKind::Any => true,
            ShapeKind::Union(members) => members.iter().any(|m| m.is_optional()),
            _ => false,
        }
    }

    /// For `union[T, nothing]` returns `T`; otherwise `None`.
    #[must_use]
    pub fn unwrap_optional(&self) -> Option<&Arc<Shape>> {
        let ShapeKind::Union(members) = &self.kind else {
            return None;
        };
        let mut present = members
            .iter()
            .filter(|m| !matches!(m.kind, ShapeKind::Nothing));
        match (present.next(), present.next()) {
            (Some(inner), None) => Some(inner),
            _ => None,
        }
    }
}

impl ShapeKind {
    /// Lowercase kind name used in messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Binary => "binary",
            Self::Timestamp => "timestamp",
            Self::Nothing => "nothing",
            Self::Any => "any",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Record(_) => "record",
            Self::Union(_) => "union",
            Self::Enum(_) => "enum",
            Self::Literal(_) => "literal",
            Self::Function => "function",
            Self::Never => "never",
        }
    }
}

impl RecordShape {
    /// Look up a member by name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Builder for record shapes.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: RecordShape,
    constraints: Vec<Constraint>,
}

impl RecordBuilder {
    /// Append a member.
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, shape: impl Into<Arc<Shape>>) -> Self {
        self.record.members.push(Member {
            name: name.into(),
            shape: shape.into(),
        });
        self
    }

    /// Append an optional member (`union[shape, nothing]`).
    #[must_use]
    pub fn optional(self, name: impl Into<String>, shape: impl Into<Arc<Shape>>) -> Self {
        self.member(name, Shape::optional(shape))
    }

    /// Attach a constraint to the record node.
    #[must_use]
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Finish the record.
    #[must_use]
    pub fn build(self) -> Shape {
        Shape {
            kind: ShapeKind::Record(self.record),
            constraints: self.constraints,
        }
    }
}

impl From<RecordBuilder> for Shape {
    fn from(builder: RecordBuilder) -> Self {
        builder.build()
    }
}

impl From<RecordBuilder> for Arc<Shape> {
    fn from(builder: RecordBuilder) -> Self {
        Arc::new(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_nested_record() {
        let shape = Shape::record("Item")
            .member("id", Shape::string())
            .member("nested", Shape::record("Nested").member("a", Shape::string()))
            .build();
        let record = shape.as_record().unwrap();
        assert_eq!(record.members.len(), 2);
        let nested = record.member("nested").unwrap();
        assert!(nested.shape.as_record().unwrap().member("a").is_some());
    }

    #[test]
    fn test_should_detect_optional_members() {
        let shape = Shape::optional(Shape::number());
        assert!(shape.is_optional());
        assert!(matches!(
            shape.unwrap_optional().unwrap().kind(),
            ShapeKind::Number
        ));
        assert!(!Shape::number().is_optional());
    }

    #[test]
    fn test_should_not_unwrap_wide_union() {
        let shape = Shape::union([Shape::string(), Shape::number()]);
        assert!(shape.unwrap_optional().is_none());
    }

    #[test]
    fn test_should_attach_constraints_to_item_shape() {
        let shape = Shape::list(Shape::string().with(Constraint::MaxLength(3)));
        let ShapeKind::List(item) = shape.kind() else {
            panic!("expected list");
        };
        assert_eq!(item.constraints(), &[Constraint::MaxLength(3)]);
        assert!(shape.constraints().is_empty());
    }
}
