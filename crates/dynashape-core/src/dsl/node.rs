//! Expression tree nodes.
//!
//! Nodes are immutable and shared through `Arc`, so one facade can feed any
//! number of expressions. Each node renders itself into a [`Writer`]; paths
//! chain by rendering the parent first and appending `.name` or `[index]`.

use std::fmt;
use std::sync::Arc;

use dynashape_model::AttributeValue;

use crate::expression::Writer;

/// Whether a node produces a value or describes an update action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Usable inside conditions and other expressions.
    Expression,
    /// An update action; only valid at the top of an update.
    Statement,
}

/// Fine-grained node tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubNodeType {
    /// Top-level attribute.
    RootProperty,
    /// Encoded literal value.
    Literal,
    /// Record member access.
    StructField,
    /// Map entry access.
    MapValue,
    /// List element access.
    ListItem,
    /// Built-in function call.
    FunctionCall,
    /// Binary comparison.
    Compare,
    /// `BETWEEN`.
    Between,
    /// `IN`.
    In,
    /// Parenthesized `AND` group.
    And,
    /// Parenthesized `OR` group.
    Or,
    /// `NOT`.
    Not,
    /// `+` / `-`.
    Computation,
    /// `SET` assignment.
    Assign,
    /// `ADD` action.
    Add,
    /// `DELETE` action.
    Delete,
    /// `REMOVE` action.
    Remove,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `=`
    Equals,
    /// `<>`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl Comparator {
    /// Operator text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        }
    }
}

/// Boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// `AND`
    And,
    /// `OR`
    Or,
}

/// Arithmetic operators allowed in `SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    /// `+`
    Plus,
    /// `-`
    Minus,
}

/// Built-in functions of the expression dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// `attribute_exists(path)`
    AttributeExists,
    /// `attribute_not_exists(path)`
    AttributeNotExists,
    /// `attribute_type(path, :type)`
    AttributeType,
    /// `begins_with(path, :prefix)`
    BeginsWith,
    /// `contains(path, :operand)`
    Contains,
    /// `size(path)`
    Size,
    /// `if_not_exists(path, :value)`
    IfNotExists,
    /// `list_append(a, b)`
    ListAppend,
}

impl FunctionName {
    /// Function name as written in expressions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AttributeExists => "attribute_exists",
            Self::AttributeNotExists => "attribute_not_exists",
            Self::AttributeType => "attribute_type",
            Self::BeginsWith => "begins_with",
            Self::Contains => "contains",
            Self::Size => "size",
            Self::IfNotExists => "if_not_exists",
            Self::ListAppend => "list_append",
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A list index: literal indices render inline, expression indices render
/// their sub-expression between brackets.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    /// `[3]`
    Literal(usize),
    /// `[<expression>]`
    Expression(Arc<Node>),
}

/// One node of an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Top-level attribute reference.
    RootProperty {
        /// Attribute name.
        name: String,
    },
    /// A value already encoded by its field's mapper.
    Literal {
        /// Wire form.
        value: AttributeValue,
    },
    /// `parent.name`
    StructField {
        /// Record expression.
        parent: Arc<Node>,
        /// Member name.
        name: String,
    },
    /// `parent.key`
    MapValue {
        /// Map expression.
        parent: Arc<Node>,
        /// Entry key.
        key: String,
    },
    /// `parent[index]`
    ListItem {
        /// List expression.
        parent: Arc<Node>,
        /// Element index.
        index: Index,
    },
    /// `name(args...)`
    FunctionCall {
        /// Function.
        name: FunctionName,
        /// Arguments in order.
        args: Vec<Arc<Node>>,
    },
    /// `left op right`
    Compare {
        /// Operator.
        op: Comparator,
        /// Left operand.
        left: Arc<Node>,
        /// Right operand.
        right: Arc<Node>,
    },
    /// `operand BETWEEN lower AND upper`
    Between {
        /// Tested value.
        operand: Arc<Node>,
        /// Inclusive lower bound.
        lower: Arc<Node>,
        /// Inclusive upper bound.
        upper: Arc<Node>,
    },
    /// `operand IN (candidates...)`
    In {
        /// Tested value.
        operand: Arc<Node>,
        /// Candidate values.
        candidates: Vec<Arc<Node>>,
    },
    /// `(a AND b ...)` / `(a OR b ...)`
    Bool {
        /// Connective.
        op: BoolOp,
        /// Operands, at least one.
        operands: Vec<Arc<Node>>,
    },
    /// `NOT (operand)`
    Not {
        /// Negated condition.
        operand: Arc<Node>,
    },
    /// `left + right` / `left - right`
    Computation {
        /// Operator.
        op: Arithmetic,
        /// Left operand.
        left: Arc<Node>,
        /// Right operand.
        right: Arc<Node>,
    },
    /// `target=value`
    Assign {
        /// Path being set.
        target: Arc<Node>,
        /// New value.
        value: Arc<Node>,
    },
    /// `target value` inside `ADD`
    Add {
        /// Number or set path.
        target: Arc<Node>,
        /// Amount or members.
        value: Arc<Node>,
    },
    /// `target value` inside `DELETE`
    Delete {
        /// Set path.
        target: Arc<Node>,
        /// Members to drop.
        value: Arc<Node>,
    },
    /// `target` inside `REMOVE`
    Remove {
        /// Path being removed.
        target: Arc<Node>,
    },
}

impl Node {
    /// Expression or statement.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Assign { .. } | Self::Add { .. } | Self::Delete { .. } | Self::Remove { .. } => {
                NodeType::Statement
            }
            _ => NodeType::Expression,
        }
    }

    /// Fine-grained tag.
    #[must_use]
    pub fn sub_node_type(&self) -> SubNodeType {
        match self {
            Self::RootProperty { .. } => SubNodeType::RootProperty,
            Self::Literal { .. } => SubNodeType::Literal,
            Self::StructField { .. } => SubNodeType::StructField,
            Self::MapValue { .. } => SubNodeType::MapValue,
            Self::ListItem { .. } => SubNodeType::ListItem,
            Self::FunctionCall { .. } => SubNodeType::FunctionCall,
            Self::Compare { .. } => SubNodeType::Compare,
            Self::Between { .. } => SubNodeType::Between,
            Self::In { .. } => SubNodeType::In,
            Self::Bool { op: BoolOp::And, .. } => SubNodeType::And,
            Self::Bool { op: BoolOp::Or, .. } => SubNodeType::Or,
            Self::Not { .. } => SubNodeType::Not,
            Self::Computation { .. } => SubNodeType::Computation,
            Self::Assign { .. } => SubNodeType::Assign,
            Self::Add { .. } => SubNodeType::Add,
            Self::Delete { .. } => SubNodeType::Delete,
            Self::Remove { .. } => SubNodeType::Remove,
        }
    }

    /// `true` for attribute references (`#a`, `#a.#b`, `#a[0]`).
    #[must_use]
    pub fn is_path(&self) -> bool {
        matches!(
            self,
            Self::RootProperty { .. }
                | Self::StructField { .. }
                | Self::MapValue { .. }
                | Self::ListItem { .. }
        )
    }

    /// Render into `writer`.
    pub fn synthesize(&self, writer: &mut Writer) {
        match self {
            Self::RootProperty { name } => writer.write_name(name),
            Self::Literal { value } => writer.write_value(value.clone()),
            Self::StructField { parent, name: key } | Self::MapValue { parent, key } => {
                parent.synthesize(writer);
                writer.write_token(".");
                writer.write_name(key);
            }
            Self::ListItem { parent, index } => {
                parent.synthesize(writer);
                match index {
                    Index::Literal(i) => writer.write_index(*i),
                    Index::Expression(node) => {
                        writer.write_token("[");
                        node.synthesize(writer);
                        writer.write_token("]");
                    }
                }
            }
            Self::FunctionCall { name, args } => {
                writer.write_token(format!("{name}("));
                write_separated(writer, args, ",");
                writer.write_token(")");
            }
            Self::Compare { op, left, right } => {
                left.synthesize(writer);
                writer.write_token(op.as_str());
                right.synthesize(writer);
            }
            Self::Between {
                operand,
                lower,
                upper,
            } => {
                operand.synthesize(writer);
                writer.write_token(" BETWEEN ");
                lower.synthesize(writer);
                writer.write_token(" AND ");
                upper.synthesize(writer);
            }
            Self::In {
                operand,
                candidates,
            } => {
                operand.synthesize(writer);
                writer.write_token(" IN (");
                write_separated(writer, candidates, ",");
                writer.write_token(")");
            }
            Self::Bool { op, operands } => {
                let separator = match op {
                    BoolOp::And => " AND ",
                    BoolOp::Or => " OR ",
                };
                writer.write_token("(");
                write_separated(writer, operands, separator);
                writer.write_token(")");
            }
            Self::Not { operand } => {
                writer.write_token("NOT (");
                operand.synthesize(writer);
                writer.write_token(")");
            }
            Self::Computation { op, left, right } => {
                left.synthesize(writer);
                writer.write_token(match op {
                    Arithmetic::Plus => "+",
                    Arithmetic::Minus => "-",
                });
                right.synthesize(writer);
            }
            Self::Assign { target, value } => {
                target.synthesize(writer);
                writer.write_token("=");
                value.synthesize(writer);
            }
            Self::Add { target, value } | Self::Delete { target, value } => {
                target.synthesize(writer);
                writer.write_token(" ");
                value.synthesize(writer);
            }
            Self::Remove { target } => target.synthesize(writer),
        }
    }
}

/// Render `nodes` joined by `separator`, trimming the trailing separator.
pub(crate) fn write_separated(writer: &mut Writer, nodes: &[Arc<Node>], separator: &str) {
    for node in nodes {
        node.synthesize(writer);
        writer.write_token(separator);
    }
    if !nodes.is_empty() {
        writer.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(name: &str) -> Arc<Node> {
        Arc::new(Node::RootProperty {
            name: name.to_owned(),
        })
    }

    fn lit(s: &str) -> Arc<Node> {
        Arc::new(Node::Literal {
            value: AttributeValue::S(s.to_owned()),
        })
    }

    fn render(node: &Node) -> String {
        let mut w = Writer::new();
        node.synthesize(&mut w);
        w.to_expression().expression
    }

    #[test]
    fn test_should_render_nested_path() {
        let node = Node::ListItem {
            parent: Arc::new(Node::StructField {
                parent: root("a"),
                name: "b".to_owned(),
            }),
            index: Index::Literal(3),
        };
        assert_eq!(render(&node), "#1.#2[3]");
        assert!(node.is_path());
    }

    #[test]
    fn test_should_render_expression_index() {
        let node = Node::ListItem {
            parent: root("list"),
            index: Index::Expression(root("i")),
        };
        assert_eq!(render(&node), "#1[#2]");
    }

    #[test]
    fn test_should_render_groups_and_functions() {
        let eq = Arc::new(Node::Compare {
            op: Comparator::Equals,
            left: root("a"),
            right: lit("x"),
        });
        let starts = Arc::new(Node::FunctionCall {
            name: FunctionName::BeginsWith,
            args: vec![root("b"), lit("p")],
        });
        let node = Node::Not {
            operand: Arc::new(Node::Bool {
                op: BoolOp::Or,
                operands: vec![eq, starts],
            }),
        };
        assert_eq!(render(&node), "NOT ((#1=:1 OR begins_with(#2,:2)))");
        assert_eq!(node.sub_node_type(), SubNodeType::Not);
    }

    #[test]
    fn test_should_render_between_and_in() {
        let between = Node::Between {
            operand: root("n"),
            lower: lit("a"),
            upper: lit("z"),
        };
        assert_eq!(render(&between), "#1 BETWEEN :1 AND :2");
        let within = Node::In {
            operand: root("n"),
            candidates: vec![lit("a"), lit("b")],
        };
        assert_eq!(render(&within), "#1 IN (:1,:2)");
    }

    #[test]
    fn test_should_classify_statements() {
        let node = Node::Remove { target: root("a") };
        assert_eq!(node.node_type(), NodeType::Statement);
        assert_eq!(render(&node), "#1");
        assert_eq!(root("a").node_type(), NodeType::Expression);
    }
}
