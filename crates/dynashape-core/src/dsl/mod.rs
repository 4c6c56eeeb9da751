//! Typed expression builders over a record shape.
//!
//! [`Item`] is the root of a table's facade: `item.field("id")` returns a
//! [`Facade`] wrapping the typed expression for that member (a
//! [`StringExpr`], [`ListExpr`], ...). Typed expressions build
//! [`Condition`]s and [`UpdateAction`]s; every literal passed in is encoded
//! on the spot by the field's mapper, so the resulting node tree already
//! carries wire values.
//!
//! ```text
//! let id = item.field("id")?.as_string()?;
//! let cond = id.equals("a")?.and(item.field("count")?.as_number()?.greater_than(1)?);
//! ```

mod expr;
mod facade;
mod node;

use std::ops;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dynashape_model::Value;

pub use expr::{
    AnyExpr, BinaryExpr, BoolExpr, DslExpression, ListExpr, MapExpr, NothingExpr, NumberExpr,
    Ordered, RecordExpr, SetExpr, StringExpr, TimestampExpr, TypedNode,
};
pub use facade::{Facade, Item};
pub use node::{
    Arithmetic, BoolOp, Comparator, FunctionName, Index, Node, NodeType, SubNodeType,
};

use crate::error::DslError;
use crate::mapper::Mapper;

/// Right-hand side of an operation: a native value, encoded with the
/// receiving field's mapper, or another expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Native value.
    Value(Value),
    /// Existing expression node.
    Node(Arc<Node>),
}

impl Operand {
    /// Node for this operand, encoding values with `mapper`.
    pub(crate) fn into_node(self, mapper: &Mapper) -> Result<Arc<Node>, DslError> {
        match self {
            Self::Value(value) => Ok(Arc::new(Node::Literal {
                value: mapper.write(&value)?,
            })),
            Self::Node(node) => Ok(node),
        }
    }
}

macro_rules! operand_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Self::Value(Value::from(v))
                }
            }
        )*
    };
}

operand_from_value!(
    &str,
    String,
    bool,
    f64,
    i32,
    i64,
    u32,
    u64,
    usize,
    Bytes,
    &'static [u8],
    DateTime<Utc>,
    Vec<Value>,
);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<Arc<Node>> for Operand {
    fn from(node: Arc<Node>) -> Self {
        Self::Node(node)
    }
}

macro_rules! operand_from_expr {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<&$t> for Operand {
                fn from(e: &$t) -> Self {
                    Self::Node(Arc::clone(&e.typed().node))
                }
            }
        )*
    };
}

operand_from_expr!(
    StringExpr,
    NumberExpr,
    BoolExpr,
    BinaryExpr,
    TimestampExpr,
    NothingExpr,
    ListExpr,
    SetExpr,
    MapExpr,
    RecordExpr,
    AnyExpr,
    Facade,
);

/// A boolean expression usable as a condition, filter or key condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    node: Arc<Node>,
}

impl Condition {
    pub(crate) fn new(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    /// The root node.
    #[must_use]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// `(self AND other)`
    #[must_use]
    pub fn and(self, other: Condition) -> Condition {
        Self::new(Node::Bool {
            op: BoolOp::And,
            operands: vec![self.node, other.node],
        })
    }

    /// `(self OR other)`
    #[must_use]
    pub fn or(self, other: Condition) -> Condition {
        Self::new(Node::Bool {
            op: BoolOp::Or,
            operands: vec![self.node, other.node],
        })
    }

    /// `NOT (self)`
    #[must_use]
    pub fn negate(self) -> Condition {
        Self::new(Node::Not { operand: self.node })
    }

    /// `(a AND b AND ...)` as one group.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Result<Condition, DslError> {
        Self::group(BoolOp::And, "all", conditions)
    }

    /// `(a OR b OR ...)` as one group.
    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Result<Condition, DslError> {
        Self::group(BoolOp::Or, "any", conditions)
    }

    fn group(
        op: BoolOp,
        operation: &'static str,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> Result<Condition, DslError> {
        let operands: Vec<_> = conditions.into_iter().map(|c| c.node).collect();
        if operands.is_empty() {
            return Err(DslError::UnsupportedOperation {
                operation,
                kind: "condition",
                hint: "pass at least one condition".to_owned(),
            });
        }
        Ok(Self::new(Node::Bool { op, operands }))
    }
}

impl ops::Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        self.negate()
    }
}

/// Update clause an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    /// `SET`
    Set,
    /// `ADD`
    Add,
    /// `DELETE`
    Delete,
    /// `REMOVE`
    Remove,
}

impl ActionKind {
    /// Clause keyword.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Add => "ADD",
            Self::Delete => "DELETE",
            Self::Remove => "REMOVE",
        }
    }
}

/// One update action (a statement node plus its clause).
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAction {
    kind: ActionKind,
    node: Arc<Node>,
}

impl UpdateAction {
    pub(crate) fn new(kind: ActionKind, node: Node) -> Self {
        Self {
            kind,
            node: Arc::new(node),
        }
    }

    /// The clause this action is rendered in.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// The statement node.
    #[must_use]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }
}

/// Sort-key predicate of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    /// `sk = v`
    Equals(Value),
    /// `sk < v`
    LessThan(Value),
    /// `sk <= v`
    LessThanOrEqual(Value),
    /// `sk > v`
    GreaterThan(Value),
    /// `sk >= v`
    GreaterThanOrEqual(Value),
    /// `sk BETWEEN lo AND hi`
    Between(Value, Value),
    /// `begins_with(sk, prefix)`
    BeginsWith(String),
}

/// Key condition of a query: partition-key equality plus an optional
/// sort-key predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    /// Partition key value.
    pub partition: Value,
    /// Sort key predicate.
    pub sort: Option<SortCondition>,
}

impl KeyCondition {
    /// Match one partition.
    pub fn new(partition: impl Into<Value>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// Narrow by sort key.
    #[must_use]
    pub fn with_sort(mut self, sort: SortCondition) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Build the partition and sort conditions against the key facades.
    pub fn resolve(
        &self,
        partition_key: &Facade,
        sort_key: Option<&Facade>,
    ) -> Result<(Condition, Option<Condition>), DslError> {
        let partition = partition_key.equals(self.partition.clone())?;
        let Some(sort) = &self.sort else {
            return Ok((partition, None));
        };
        let Some(key) = sort_key else {
            return Err(DslError::UnsupportedOperation {
                operation: "sort condition",
                kind: "key condition",
                hint: "the table has no sort key".to_owned(),
            });
        };
        let typed = key.typed();
        let compare = |op: Comparator, v: &Value| -> Result<Condition, DslError> {
            expr::compare(typed, op, Operand::Value(v.clone()))
        };
        let sort = match sort {
            SortCondition::Equals(v) => compare(Comparator::Equals, v)?,
            SortCondition::LessThan(v) => compare(Comparator::LessThan, v)?,
            SortCondition::LessThanOrEqual(v) => compare(Comparator::LessThanOrEqual, v)?,
            SortCondition::GreaterThan(v) => compare(Comparator::GreaterThan, v)?,
            SortCondition::GreaterThanOrEqual(v) => compare(Comparator::GreaterThanOrEqual, v)?,
            SortCondition::Between(lower, upper) => {
                expr::between(typed, lower.clone().into(), upper.clone().into())?
            }
            SortCondition::BeginsWith(prefix) => key.as_string()?.begins_with(prefix.as_str())?,
        };
        Ok((partition, Some(sort)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use dynashape_model::{AttributeValue, Shape};

    use super::*;
    use crate::expression::Writer;
    use crate::mapper::MapperCache;

    fn item() -> Item {
        let shape = Arc::new(
            Shape::record("Row")
                .member("pk", Shape::string())
                .member("sk", Shape::number())
                .build(),
        );
        Item::new(&shape, &MapperCache::default()).unwrap()
    }

    fn render(condition: &Condition) -> (String, HashMap<String, AttributeValue>) {
        let mut w = Writer::new();
        condition.node().synthesize(&mut w);
        let out = w.to_expression();
        (out.expression, out.expression_attribute_values)
    }

    #[test]
    fn test_should_group_all_conditions_once() {
        let item = item();
        let pk = item.field("pk").unwrap();
        let all = Condition::all([
            pk.exists(),
            pk.equals("a").unwrap(),
            pk.not_equals("b").unwrap(),
        ])
        .unwrap();
        assert_eq!(
            render(&all).0,
            "(attribute_exists(#1) AND #1=:1 AND #1<>:2)"
        );
    }

    #[test]
    fn test_should_reject_empty_group() {
        assert!(Condition::any(Vec::new()).is_err());
    }

    #[test]
    fn test_should_negate_with_operator() {
        let item = item();
        let cond = !item.field("pk").unwrap().exists();
        assert_eq!(render(&cond).0, "NOT (attribute_exists(#1))");
    }

    #[test]
    fn test_should_resolve_key_condition_with_sort() {
        let item = item();
        let pk = item.field("pk").unwrap();
        let sk = item.field("sk").unwrap();
        let key = KeyCondition::new("p").with_sort(SortCondition::Between(
            Value::from(1),
            Value::from(5),
        ));
        let (partition, sort) = key.resolve(&pk, Some(&sk)).unwrap();
        assert_eq!(render(&partition).0, "#1=:1");
        let (text, values) = render(&sort.unwrap());
        assert_eq!(text, "#1 BETWEEN :1 AND :2");
        assert_eq!(values[":2"], AttributeValue::N("5".to_owned()));
    }

    #[test]
    fn test_should_reject_sort_condition_without_sort_key() {
        let item = item();
        let pk = item.field("pk").unwrap();
        let key = KeyCondition::new("p").with_sort(SortCondition::BeginsWith("x".to_owned()));
        assert!(key.resolve(&pk, None).is_err());
    }

    #[test]
    fn test_should_encode_operand_with_mapper() {
        let item = item();
        let sk = item.field("sk").unwrap();
        let err = sk.equals("not a number").unwrap_err();
        assert!(matches!(err, DslError::Mapper(_)), "{err}");
    }
}
