//! Shape-directed dispatch from a node to its typed expression.

use std::sync::Arc;

use dynashape_model::{Shape, ShapeKind, Value};

use super::expr::{
    self, AnyExpr, BinaryExpr, BoolExpr, DslExpression, ListExpr, MapExpr, NothingExpr,
    NumberExpr, RecordExpr, SetExpr, StringExpr, TimestampExpr, TypedNode,
};
use super::node::Node;
use super::{Condition, Operand, UpdateAction};
use crate::error::{DslError, SchemaError};
use crate::mapper::{Mapper, MapperCache, ValuePath};

/// The typed expression for one attribute, chosen from its shape.
#[derive(Debug, Clone)]
pub enum Facade {
    /// `string`, `enum` and string literals.
    String(StringExpr),
    /// `number` and number literals.
    Number(NumberExpr),
    /// `boolean` and boolean literals.
    Boolean(BoolExpr),
    /// `binary`.
    Binary(BinaryExpr),
    /// `timestamp`.
    Timestamp(TimestampExpr),
    /// `nothing`.
    Nothing(NothingExpr),
    /// `list<T>`.
    List(ListExpr),
    /// `set<T>`.
    Set(SetExpr),
    /// `map<T>`.
    Map(MapExpr),
    /// Nested record.
    Record(RecordExpr),
    /// `any` and unions of several data types.
    Any(AnyExpr),
}

macro_rules! cast {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty, $any:ident) => {
        $(#[$doc])*
        pub fn $name(&self) -> Result<$ty, DslError> {
            match self {
                Self::$variant(e) => Ok(e.clone()),
                Self::Any(e) => e.$any(),
                other => Err(other.mismatch(stringify!($name))),
            }
        }
    };
}

impl Facade {
    /// Kind name of the wrapped expression.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(e) => e.kind(),
            Self::Number(e) => e.kind(),
            Self::Boolean(e) => e.kind(),
            Self::Binary(e) => e.kind(),
            Self::Timestamp(e) => e.kind(),
            Self::Nothing(e) => e.kind(),
            Self::List(e) => e.kind(),
            Self::Set(e) => e.kind(),
            Self::Map(e) => e.kind(),
            Self::Record(e) => e.kind(),
            Self::Any(_) => "any",
        }
    }

    /// Node and mapper of the wrapped expression.
    #[must_use]
    pub fn typed(&self) -> &TypedNode {
        match self {
            Self::String(e) => e.typed(),
            Self::Number(e) => e.typed(),
            Self::Boolean(e) => e.typed(),
            Self::Binary(e) => e.typed(),
            Self::Timestamp(e) => e.typed(),
            Self::Nothing(e) => e.typed(),
            Self::List(e) => e.typed(),
            Self::Set(e) => e.typed(),
            Self::Map(e) => e.typed(),
            Self::Record(e) => e.typed(),
            Self::Any(e) => e.typed(),
        }
    }

    /// The attribute node.
    #[must_use]
    pub fn node(&self) -> Arc<Node> {
        Arc::clone(&self.typed().node)
    }

    fn mismatch(&self, operation: &'static str) -> DslError {
        DslError::UnsupportedOperation {
            operation,
            kind: self.kind(),
            hint: format!("the attribute is a {}", self.kind()),
        }
    }

    cast!(
        /// The string expression, or narrow an `any`.
        as_string,
        String,
        StringExpr,
        as_string
    );
    cast!(
        /// The number expression, or narrow an `any`.
        as_number,
        Number,
        NumberExpr,
        as_number
    );
    cast!(
        /// The boolean expression, or narrow an `any`.
        as_bool,
        Boolean,
        BoolExpr,
        as_bool
    );
    cast!(
        /// The binary expression, or narrow an `any`.
        as_binary,
        Binary,
        BinaryExpr,
        as_binary
    );
    cast!(
        /// The timestamp expression, or narrow an `any`.
        as_timestamp,
        Timestamp,
        TimestampExpr,
        as_timestamp
    );
    cast!(
        /// The list expression, or narrow an `any`.
        as_list,
        List,
        ListExpr,
        as_list
    );
    cast!(
        /// The map expression, or narrow an `any`.
        as_map,
        Map,
        MapExpr,
        as_map
    );

    /// The set expression.
    pub fn as_set(&self) -> Result<SetExpr, DslError> {
        match self {
            Self::Set(e) => Ok(e.clone()),
            other => Err(other.mismatch("as_set")),
        }
    }

    /// The nested record expression.
    pub fn as_record(&self) -> Result<RecordExpr, DslError> {
        match self {
            Self::Record(e) => Ok(e.clone()),
            other => Err(other.mismatch("as_record")),
        }
    }

    /// The dynamic expression. Any attribute can be viewed as `any`.
    #[must_use]
    pub fn as_any(&self) -> AnyExpr {
        match self {
            Self::Any(e) => e.clone(),
            other => AnyExpr(other.typed().clone()),
        }
    }

    /// Member of a nested record.
    pub fn field(&self, name: &str) -> Result<Facade, DslError> {
        self.as_record()?.field(name)
    }

    /// Element of a list.
    pub fn get(&self, index: usize) -> Result<Facade, DslError> {
        self.as_list()?.get(index)
    }

    /// Value of a map.
    pub fn key(&self, key: &str) -> Result<Facade, DslError> {
        self.as_map()?.get(key)
    }

    fn typed_only(&self, operation: &'static str) -> Result<&TypedNode, DslError> {
        match self {
            Self::Any(_) => Err(DslError::UnsupportedOperation {
                operation,
                kind: "any",
                hint: "cast with as_string(), as_number(), ... before comparing".to_owned(),
            }),
            other => Ok(other.typed()),
        }
    }

    /// `self = other`
    pub fn equals(&self, other: impl Into<Operand>) -> Result<Condition, DslError> {
        let typed = self.typed_only("equals")?;
        expr::compare(typed, super::Comparator::Equals, other.into())
    }

    /// `self <> other`
    pub fn not_equals(&self, other: impl Into<Operand>) -> Result<Condition, DslError> {
        let typed = self.typed_only("not_equals")?;
        expr::compare(typed, super::Comparator::NotEquals, other.into())
    }

    /// `attribute_exists(self)`
    #[must_use]
    pub fn exists(&self) -> Condition {
        expr::exists(self.typed())
    }

    /// `attribute_not_exists(self)`
    #[must_use]
    pub fn not_exists(&self) -> Condition {
        expr::not_exists(self.typed())
    }

    /// `SET self=value`
    pub fn set(&self, value: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        expr::assign(self.typed(), self.kind(), value.into())
    }

    /// `REMOVE self`
    pub fn remove(&self) -> Result<UpdateAction, DslError> {
        expr::remove(self.typed(), self.kind())
    }
}

/// Wrap `node` in the typed expression matching `mapper`'s shape.
pub(crate) fn build(node: Arc<Node>, mapper: Arc<Mapper>) -> Result<Facade, DslError> {
    let typed = |mapper: Arc<Mapper>| TypedNode::new(Arc::clone(&node), mapper);
    let shape = Arc::clone(mapper.shape());
    let facade = match shape.kind() {
        ShapeKind::String | ShapeKind::Enum(_) => Facade::String(StringExpr(typed(mapper))),
        ShapeKind::Number => Facade::Number(NumberExpr(typed(mapper))),
        ShapeKind::Boolean => Facade::Boolean(BoolExpr(typed(mapper))),
        ShapeKind::Binary => Facade::Binary(BinaryExpr(typed(mapper))),
        ShapeKind::Timestamp => Facade::Timestamp(TimestampExpr(typed(mapper))),
        ShapeKind::Nothing => Facade::Nothing(NothingExpr(typed(mapper))),
        ShapeKind::Any => Facade::Any(AnyExpr(typed(mapper))),
        ShapeKind::List(_) => Facade::List(ListExpr(typed(mapper))),
        ShapeKind::Set(_) => Facade::Set(SetExpr(typed(mapper))),
        ShapeKind::Map(_) => Facade::Map(MapExpr(typed(mapper))),
        ShapeKind::Record(_) => Facade::Record(RecordExpr(typed(mapper))),
        ShapeKind::Literal(value) => match value {
            Value::String(_) => Facade::String(StringExpr(typed(mapper))),
            Value::Number(_) => Facade::Number(NumberExpr(typed(mapper))),
            Value::Bool(_) => Facade::Boolean(BoolExpr(typed(mapper))),
            Value::Binary(_) => Facade::Binary(BinaryExpr(typed(mapper))),
            Value::Null => Facade::Nothing(NothingExpr(typed(mapper))),
            _ => Facade::Any(AnyExpr(typed(mapper))),
        },
        ShapeKind::Union(_) => {
            let inner = shape.unwrap_optional().and_then(|inner| {
                mapper
                    .variants()
                    .iter()
                    .find(|v| Arc::ptr_eq(v.shape(), inner))
                    .cloned()
            });
            match inner {
                Some(inner) => return build(Arc::clone(&node), inner),
                None => Facade::Any(AnyExpr(typed(mapper))),
            }
        }
        ShapeKind::Function | ShapeKind::Never => {
            return Err(DslError::Construction {
                path: node_path(&node),
                kind: shape.kind().name(),
            });
        }
    };
    Ok(facade)
}

fn node_path(node: &Node) -> String {
    let mut w = crate::expression::Writer::new();
    node.synthesize(&mut w);
    let compiled = w.to_expression();
    let mut aliases: Vec<_> = compiled.expression_attribute_names.iter().collect();
    // `#10` before `#1`
    aliases.sort_by_key(|(alias, _)| std::cmp::Reverse(alias.len()));
    aliases
        .into_iter()
        .fold(compiled.expression, |text, (alias, name)| {
            text.replace(alias.as_str(), name)
        })
}

/// Mapper of record member `name`, or an `UnknownField` error.
pub(crate) fn member(mapper: &Mapper, name: &str) -> Result<Arc<Mapper>, DslError> {
    mapper.field(name).cloned().ok_or_else(|| DslError::UnknownField {
        record: mapper
            .shape()
            .as_record()
            .map_or_else(String::new, |r| r.name.clone()),
        field: name.to_owned(),
    })
}

/// Root of the expression facade for one record shape.
#[derive(Debug, Clone)]
pub struct Item {
    mapper: Arc<Mapper>,
}

impl Item {
    /// Build the facade for `shape`, which must be a record of data types.
    pub fn new(shape: &Arc<Shape>, cache: &MapperCache) -> Result<Self, DslError> {
        if shape.as_record().is_none() {
            return Err(SchemaError::NotARecord {
                kind: shape.kind().name(),
            }
            .into());
        }
        reject_non_data(shape, &mut ValuePath::root())?;
        let mapper = cache.mapper_for(shape)?;
        Ok(Self { mapper })
    }

    /// The record mapper.
    #[must_use]
    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    /// Top-level attribute `name`.
    pub fn field(&self, name: &str) -> Result<Facade, DslError> {
        let mapper = member(&self.mapper, name)?;
        build(
            Arc::new(Node::RootProperty {
                name: name.to_owned(),
            }),
            mapper,
        )
    }
}

fn reject_non_data(shape: &Shape, path: &mut ValuePath) -> Result<(), DslError> {
    match shape.kind() {
        ShapeKind::Function | ShapeKind::Never => Err(DslError::Construction {
            path: path.to_string(),
            kind: shape.kind().name(),
        }),
        ShapeKind::List(item) | ShapeKind::Set(item) => {
            path.push_index(0);
            let result = reject_non_data(item, path);
            path.pop();
            result
        }
        ShapeKind::Map(value) => {
            path.push_key("*");
            let result = reject_non_data(value, path);
            path.pop();
            result
        }
        ShapeKind::Record(record) => record.members.iter().try_for_each(|m| {
            path.push_key(&m.name);
            let result = reject_non_data(&m.shape, path);
            path.pop();
            result
        }),
        ShapeKind::Union(members) => members.iter().try_for_each(|m| reject_non_data(m, path)),
        _ => Ok(()),
    }
}
