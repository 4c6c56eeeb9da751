//! Typed expression wrappers.
//!
//! Each wrapper pairs a node with the mapper of the shape it refers to.
//! Shared operations live on [`DslExpression`] and [`Ordered`]; per-type
//! operations (string prefixes, arithmetic, list appends, ...) are inherent
//! methods. Dynamic `any` fields get [`AnyExpr`], which has no comparison
//! operators until narrowed with a cast.

use std::sync::Arc;

use dynashape_model::{AttributeValue, Shape, attribute_value::TAGS};

use super::facade::{self, Facade};
use super::node::{Arithmetic, Comparator, FunctionName, Index, Node};
use super::{ActionKind, Condition, Operand, UpdateAction};
use crate::error::DslError;
use crate::mapper::Mapper;

/// A node together with the mapper that encodes values compared or assigned
/// to it.
#[derive(Debug, Clone)]
pub struct TypedNode {
    pub(crate) node: Arc<Node>,
    pub(crate) mapper: Arc<Mapper>,
}

impl TypedNode {
    pub(crate) fn new(node: Arc<Node>, mapper: Arc<Mapper>) -> Self {
        Self { node, mapper }
    }

    /// The expression node.
    #[must_use]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// The mapper for values of this expression.
    #[must_use]
    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }
}

pub(crate) fn compare(
    typed: &TypedNode,
    op: Comparator,
    other: Operand,
) -> Result<Condition, DslError> {
    let right = other.into_node(&typed.mapper)?;
    Ok(Condition::new(Node::Compare {
        op,
        left: Arc::clone(&typed.node),
        right,
    }))
}

pub(crate) fn between(
    typed: &TypedNode,
    lower: Operand,
    upper: Operand,
) -> Result<Condition, DslError> {
    Ok(Condition::new(Node::Between {
        operand: Arc::clone(&typed.node),
        lower: lower.into_node(&typed.mapper)?,
        upper: upper.into_node(&typed.mapper)?,
    }))
}

pub(crate) fn call(name: FunctionName, args: Vec<Arc<Node>>) -> Node {
    Node::FunctionCall { name, args }
}

fn require_path(
    typed: &TypedNode,
    operation: &'static str,
    kind: &'static str,
) -> Result<Arc<Node>, DslError> {
    if typed.node.is_path() {
        Ok(Arc::clone(&typed.node))
    } else {
        Err(DslError::UnsupportedOperation {
            operation,
            kind,
            hint: "update targets must be attribute paths, not derived expressions".to_owned(),
        })
    }
}

pub(crate) fn exists(typed: &TypedNode) -> Condition {
    Condition::new(call(FunctionName::AttributeExists, vec![Arc::clone(&typed.node)]))
}

pub(crate) fn not_exists(typed: &TypedNode) -> Condition {
    Condition::new(call(
        FunctionName::AttributeNotExists,
        vec![Arc::clone(&typed.node)],
    ))
}

pub(crate) fn assign(
    typed: &TypedNode,
    kind: &'static str,
    value: Operand,
) -> Result<UpdateAction, DslError> {
    let target = require_path(typed, "set", kind)?;
    let value = value.into_node(&typed.mapper)?;
    Ok(UpdateAction::new(ActionKind::Set, Node::Assign { target, value }))
}

pub(crate) fn remove(typed: &TypedNode, kind: &'static str) -> Result<UpdateAction, DslError> {
    let target = require_path(typed, "remove", kind)?;
    Ok(UpdateAction::new(ActionKind::Remove, Node::Remove { target }))
}

fn size(typed: &TypedNode) -> NumberExpr {
    NumberExpr(TypedNode::new(
        Arc::new(call(FunctionName::Size, vec![Arc::clone(&typed.node)])),
        Mapper::number(),
    ))
}

fn element_mapper(
    child: Option<&Arc<Mapper>>,
    operation: &'static str,
    kind: &'static str,
) -> Result<Arc<Mapper>, DslError> {
    child.cloned().ok_or_else(|| DslError::UnsupportedOperation {
        operation,
        kind,
        hint: "the expression's mapper has no element mapper".to_owned(),
    })
}

/// Operations every typed expression supports.
pub trait DslExpression {
    /// Node and mapper.
    fn typed(&self) -> &TypedNode;

    /// Kind name used in error messages.
    fn kind(&self) -> &'static str;

    /// The expression node.
    fn node(&self) -> Arc<Node> {
        Arc::clone(&self.typed().node)
    }

    /// The shape this expression refers to.
    fn shape(&self) -> &Arc<Shape> {
        self.typed().mapper.shape()
    }

    /// `self = other`
    fn equals(&self, other: impl Into<Operand>) -> Result<Condition, DslError> {
        compare(self.typed(), Comparator::Equals, other.into())
    }

    /// `self <> other`
    fn not_equals(&self, other: impl Into<Operand>) -> Result<Condition, DslError> {
        compare(self.typed(), Comparator::NotEquals, other.into())
    }

    /// `self IN (candidates...)`
    fn is_in<I, O>(&self, candidates: I) -> Result<Condition, DslError>
    where
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        let typed = self.typed();
        let candidates = candidates
            .into_iter()
            .map(|c| c.into().into_node(&typed.mapper))
            .collect::<Result<Vec<_>, _>>()?;
        if candidates.is_empty() {
            return Err(DslError::UnsupportedOperation {
                operation: "is_in",
                kind: self.kind(),
                hint: "pass at least one candidate".to_owned(),
            });
        }
        Ok(Condition::new(Node::In {
            operand: Arc::clone(&typed.node),
            candidates,
        }))
    }

    /// `attribute_exists(self)`
    fn exists(&self) -> Condition {
        exists(self.typed())
    }

    /// `attribute_not_exists(self)`
    fn not_exists(&self) -> Condition {
        not_exists(self.typed())
    }

    /// `SET self=value`
    fn set(&self, value: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        assign(self.typed(), self.kind(), value.into())
    }

    /// `SET self=if_not_exists(self,value)`
    fn set_if_not_exists(&self, value: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        let typed = self.typed();
        let target = require_path(typed, "set_if_not_exists", self.kind())?;
        let default = value.into().into_node(&typed.mapper)?;
        let value = Arc::new(call(
            FunctionName::IfNotExists,
            vec![Arc::clone(&target), default],
        ));
        Ok(UpdateAction::new(ActionKind::Set, Node::Assign { target, value }))
    }

    /// `REMOVE self`
    fn remove(&self) -> Result<UpdateAction, DslError> {
        remove(self.typed(), self.kind())
    }
}

/// Ordering comparisons for strings, numbers, binaries and timestamps.
pub trait Ordered: DslExpression {
    /// `self < other`
    fn less_than(&self, other: impl Into<Operand>) -> Result<Condition, DslError> {
        compare(self.typed(), Comparator::LessThan, other.into())
    }

    /// `self <= other`
    fn less_than_or_equal(&self, other: impl Into<Operand>) -> Result<Condition, DslError> {
        compare(self.typed(), Comparator::LessThanOrEqual, other.into())
    }

    /// `self > other`
    fn greater_than(&self, other: impl Into<Operand>) -> Result<Condition, DslError> {
        compare(self.typed(), Comparator::GreaterThan, other.into())
    }

    /// `self >= other`
    fn greater_than_or_equal(&self, other: impl Into<Operand>) -> Result<Condition, DslError> {
        compare(self.typed(), Comparator::GreaterThanOrEqual, other.into())
    }

    /// `self BETWEEN lower AND upper`
    fn between(
        &self,
        lower: impl Into<Operand>,
        upper: impl Into<Operand>,
    ) -> Result<Condition, DslError> {
        between(self.typed(), lower.into(), upper.into())
    }
}

macro_rules! typed_expr {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(pub(crate) TypedNode);

        impl DslExpression for $name {
            fn typed(&self) -> &TypedNode {
                &self.0
            }

            fn kind(&self) -> &'static str {
                $kind
            }
        }
    };
}

typed_expr!(
    /// String (or enum) expression.
    StringExpr,
    "string"
);
typed_expr!(
    /// Number expression.
    NumberExpr,
    "number"
);
typed_expr!(
    /// Boolean expression.
    BoolExpr,
    "boolean"
);
typed_expr!(
    /// Binary expression.
    BinaryExpr,
    "binary"
);
typed_expr!(
    /// Timestamp expression (stored as an ISO-8601 string).
    TimestampExpr,
    "timestamp"
);
typed_expr!(
    /// Expression of the `nothing` type.
    NothingExpr,
    "nothing"
);
typed_expr!(
    /// List expression.
    ListExpr,
    "list"
);
typed_expr!(
    /// Set expression.
    SetExpr,
    "set"
);
typed_expr!(
    /// Map expression.
    MapExpr,
    "map"
);
typed_expr!(
    /// Nested record expression.
    RecordExpr,
    "record"
);

impl Ordered for StringExpr {}
impl Ordered for NumberExpr {}
impl Ordered for BinaryExpr {}
impl Ordered for TimestampExpr {}

impl StringExpr {
    /// `begins_with(self, prefix)`
    pub fn begins_with(&self, prefix: impl Into<Operand>) -> Result<Condition, DslError> {
        let prefix = prefix.into().into_node(&self.0.mapper)?;
        Ok(Condition::new(call(
            FunctionName::BeginsWith,
            vec![Arc::clone(&self.0.node), prefix],
        )))
    }

    /// `contains(self, substring)`
    pub fn contains(&self, substring: impl Into<Operand>) -> Result<Condition, DslError> {
        let substring = substring.into().into_node(&self.0.mapper)?;
        Ok(Condition::new(call(
            FunctionName::Contains,
            vec![Arc::clone(&self.0.node), substring],
        )))
    }

    /// `size(self)`, the length in bytes.
    #[must_use]
    pub fn length(&self) -> NumberExpr {
        size(&self.0)
    }
}

impl NumberExpr {
    fn arithmetic(&self, op: Arithmetic, amount: Operand) -> Result<NumberExpr, DslError> {
        let right = amount.into_node(&self.0.mapper)?;
        Ok(NumberExpr(TypedNode::new(
            Arc::new(Node::Computation {
                op,
                left: Arc::clone(&self.0.node),
                right,
            }),
            Arc::clone(&self.0.mapper),
        )))
    }

    /// `self + amount`
    pub fn plus(&self, amount: impl Into<Operand>) -> Result<NumberExpr, DslError> {
        self.arithmetic(Arithmetic::Plus, amount.into())
    }

    /// `self - amount`
    pub fn minus(&self, amount: impl Into<Operand>) -> Result<NumberExpr, DslError> {
        self.arithmetic(Arithmetic::Minus, amount.into())
    }

    /// `SET self=self+1`
    pub fn increment(&self) -> Result<UpdateAction, DslError> {
        self.increment_by(1)
    }

    /// `SET self=self+amount`
    pub fn increment_by(&self, amount: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        self.set(&self.plus(amount)?)
    }

    /// `SET self=self-1`
    pub fn decrement(&self) -> Result<UpdateAction, DslError> {
        self.decrement_by(1)
    }

    /// `SET self=self-amount`
    pub fn decrement_by(&self, amount: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        self.set(&self.minus(amount)?)
    }

    /// `ADD self amount`
    pub fn add(&self, amount: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        let target = require_path(&self.0, "add", "number")?;
        let value = amount.into().into_node(&self.0.mapper)?;
        Ok(UpdateAction::new(ActionKind::Add, Node::Add { target, value }))
    }
}

impl BoolExpr {
    /// `self = true`
    pub fn is_true(&self) -> Result<Condition, DslError> {
        self.equals(true)
    }

    /// `self = false`
    pub fn is_false(&self) -> Result<Condition, DslError> {
        self.equals(false)
    }
}

impl BinaryExpr {
    /// `size(self)`
    #[must_use]
    pub fn length(&self) -> NumberExpr {
        size(&self.0)
    }
}

impl ListExpr {
    fn item_mapper(&self, operation: &'static str) -> Result<Arc<Mapper>, DslError> {
        element_mapper(self.0.mapper.item(), operation, "list")
    }

    /// `self[index]`
    pub fn get(&self, index: usize) -> Result<Facade, DslError> {
        facade::build(
            Arc::new(Node::ListItem {
                parent: Arc::clone(&self.0.node),
                index: Index::Literal(index),
            }),
            self.item_mapper("get")?,
        )
    }

    /// `self[<index expression>]`. The target dialect only accepts literal
    /// indices, so expressions built this way fail verification.
    pub fn get_at(&self, index: &NumberExpr) -> Result<Facade, DslError> {
        facade::build(
            Arc::new(Node::ListItem {
                parent: Arc::clone(&self.0.node),
                index: Index::Expression(index.node()),
            }),
            self.item_mapper("get_at")?,
        )
    }

    /// `size(self)`
    #[must_use]
    pub fn size(&self) -> NumberExpr {
        size(&self.0)
    }

    /// `contains(self, item)`
    pub fn contains(&self, item: impl Into<Operand>) -> Result<Condition, DslError> {
        let mapper = self.item_mapper("contains")?;
        let item = item.into().into_node(&mapper)?;
        Ok(Condition::new(call(
            FunctionName::Contains,
            vec![Arc::clone(&self.0.node), item],
        )))
    }

    /// `list_append(self, other)` as an expression.
    pub fn concat(&self, other: impl Into<Operand>) -> Result<ListExpr, DslError> {
        let other = other.into().into_node(&self.0.mapper)?;
        Ok(ListExpr(TypedNode::new(
            Arc::new(call(
                FunctionName::ListAppend,
                vec![Arc::clone(&self.0.node), other],
            )),
            Arc::clone(&self.0.mapper),
        )))
    }

    /// `SET self=list_append(self, items)`
    pub fn append(&self, items: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        self.set(&self.concat(items)?)
    }

    /// `SET self=list_append(items, self)`
    pub fn prepend(&self, items: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        let items = items.into().into_node(&self.0.mapper)?;
        let value = ListExpr(TypedNode::new(
            Arc::new(call(
                FunctionName::ListAppend,
                vec![items, Arc::clone(&self.0.node)],
            )),
            Arc::clone(&self.0.mapper),
        ));
        self.set(&value)
    }
}

impl SetExpr {
    /// `contains(self, member)`
    pub fn contains(&self, member: impl Into<Operand>) -> Result<Condition, DslError> {
        let mapper = element_mapper(self.0.mapper.item(), "contains", "set")?;
        let member = member.into().into_node(&mapper)?;
        Ok(Condition::new(call(
            FunctionName::Contains,
            vec![Arc::clone(&self.0.node), member],
        )))
    }

    /// `size(self)`
    #[must_use]
    pub fn size(&self) -> NumberExpr {
        size(&self.0)
    }

    /// `ADD self members`
    pub fn add(&self, members: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        let target = require_path(&self.0, "add", "set")?;
        let value = members.into().into_node(&self.0.mapper)?;
        Ok(UpdateAction::new(ActionKind::Add, Node::Add { target, value }))
    }

    /// `DELETE self members`
    pub fn delete(&self, members: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        let target = require_path(&self.0, "delete", "set")?;
        let value = members.into().into_node(&self.0.mapper)?;
        Ok(UpdateAction::new(
            ActionKind::Delete,
            Node::Delete { target, value },
        ))
    }
}

impl MapExpr {
    /// `self.key`
    pub fn get(&self, key: &str) -> Result<Facade, DslError> {
        facade::build(
            Arc::new(Node::MapValue {
                parent: Arc::clone(&self.0.node),
                key: key.to_owned(),
            }),
            element_mapper(self.0.mapper.value(), "get", "map")?,
        )
    }

    /// `size(self)`
    #[must_use]
    pub fn size(&self) -> NumberExpr {
        size(&self.0)
    }

    /// `SET self.key=value`
    pub fn put(&self, key: &str, value: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        self.get(key)?.set(value)
    }
}

impl RecordExpr {
    /// `self.name`
    pub fn field(&self, name: &str) -> Result<Facade, DslError> {
        let mapper = facade::member(&self.0.mapper, name)?;
        facade::build(
            Arc::new(Node::StructField {
                parent: Arc::clone(&self.0.node),
                name: name.to_owned(),
            }),
            mapper,
        )
    }
}

/// A dynamically typed expression. Supports existence checks, type tests,
/// assignment and removal; comparisons require a cast first.
#[derive(Debug, Clone)]
pub struct AnyExpr(pub(crate) TypedNode);

impl AnyExpr {
    /// Node and mapper.
    #[must_use]
    pub fn typed(&self) -> &TypedNode {
        &self.0
    }

    /// The expression node.
    #[must_use]
    pub fn node(&self) -> Arc<Node> {
        Arc::clone(&self.0.node)
    }

    /// `attribute_exists(self)`
    #[must_use]
    pub fn exists(&self) -> Condition {
        exists(&self.0)
    }

    /// `attribute_not_exists(self)`
    #[must_use]
    pub fn not_exists(&self) -> Condition {
        not_exists(&self.0)
    }

    /// `attribute_type(self, :tag)` where `tag` is a wire tag such as `"S"`.
    pub fn is_type(&self, tag: &str) -> Result<Condition, DslError> {
        if !TAGS.contains(&tag) {
            return Err(DslError::UnsupportedOperation {
                operation: "is_type",
                kind: "any",
                hint: format!("unknown type tag '{tag}', expected one of {TAGS:?}"),
            });
        }
        let tag = Arc::new(Node::Literal {
            value: AttributeValue::S(tag.to_owned()),
        });
        Ok(Condition::new(call(
            FunctionName::AttributeType,
            vec![Arc::clone(&self.0.node), tag],
        )))
    }

    /// `SET self=value`, encoded from the value's own variant.
    pub fn set(&self, value: impl Into<Operand>) -> Result<UpdateAction, DslError> {
        assign(&self.0, "any", value.into())
    }

    /// `REMOVE self`
    pub fn remove(&self) -> Result<UpdateAction, DslError> {
        remove(&self.0, "any")
    }

    fn narrow(&self, shape: Shape) -> Result<TypedNode, DslError> {
        let mapper = Mapper::of(&Arc::new(shape))?;
        Ok(TypedNode::new(Arc::clone(&self.0.node), mapper))
    }

    /// Treat as a string.
    pub fn as_string(&self) -> Result<StringExpr, DslError> {
        self.narrow(Shape::string()).map(StringExpr)
    }

    /// Treat as a number.
    pub fn as_number(&self) -> Result<NumberExpr, DslError> {
        self.narrow(Shape::number()).map(NumberExpr)
    }

    /// Treat as a boolean.
    pub fn as_bool(&self) -> Result<BoolExpr, DslError> {
        self.narrow(Shape::boolean()).map(BoolExpr)
    }

    /// Treat as binary.
    pub fn as_binary(&self) -> Result<BinaryExpr, DslError> {
        self.narrow(Shape::binary()).map(BinaryExpr)
    }

    /// Treat as a timestamp.
    pub fn as_timestamp(&self) -> Result<TimestampExpr, DslError> {
        self.narrow(Shape::timestamp()).map(TimestampExpr)
    }

    /// Treat as a list of dynamic items.
    pub fn as_list(&self) -> Result<ListExpr, DslError> {
        self.narrow(Shape::list(Shape::any())).map(ListExpr)
    }

    /// Treat as a map of dynamic values.
    pub fn as_map(&self) -> Result<MapExpr, DslError> {
        self.narrow(Shape::map(Shape::any())).map(MapExpr)
    }
}
