//! Syntax tree of the target expression dialect.
//!
//! Produced by the verifier's parser from compiled text. Operators and
//! function names reuse the DSL enums, so a rendered node and its parsed
//! counterpart name the same thing.

use std::collections::BTreeSet;
use std::fmt;

use crate::dsl::{BoolOp, Comparator, FunctionName};

/// Condition, filter or key-condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `left op right`
    Compare {
        /// Left operand.
        left: Operand,
        /// Operator.
        op: Comparator,
        /// Right operand.
        right: Operand,
    },
    /// `operand BETWEEN lower AND upper`
    Between {
        /// Tested operand.
        operand: Operand,
        /// Inclusive lower bound.
        lower: Operand,
        /// Inclusive upper bound.
        upper: Operand,
    },
    /// `operand IN (candidates...)`
    In {
        /// Tested operand.
        operand: Operand,
        /// Candidates.
        candidates: Vec<Operand>,
    },
    /// `left AND right` / `left OR right`
    Logical {
        /// Operator.
        op: BoolOp,
        /// Left side.
        left: Box<Expr>,
        /// Right side.
        right: Box<Expr>,
    },
    /// `NOT expr`
    Not(Box<Expr>),
    /// Boolean function call such as `begins_with(#1,:1)`.
    Function {
        /// Function.
        name: FunctionName,
        /// Arguments.
        args: Vec<Operand>,
    },
}

/// Value-producing operand of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Attribute path.
    Path(AttributePath),
    /// Value placeholder, including the leading `:`.
    Value(String),
    /// `size(path)`
    Size(AttributePath),
}

/// Dotted / indexed attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    /// Path elements from the root.
    pub elements: Vec<PathElement>,
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            match element {
                PathElement::Attribute(name) if i == 0 => write!(f, "{name}")?,
                PathElement::Attribute(name) => write!(f, ".{name}")?,
                PathElement::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// One element of an [`AttributePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// Bare identifier or `#alias` (with the `#`).
    Attribute(String),
    /// Literal list index.
    Index(usize),
}

/// Parsed update expression. Each clause keyword may appear once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpr {
    /// `SET path=value, ...`
    pub set: Vec<SetAction>,
    /// `REMOVE path, ...`
    pub remove: Vec<AttributePath>,
    /// `ADD path value, ...`
    pub add: Vec<(AttributePath, Operand)>,
    /// `DELETE path value, ...`
    pub delete: Vec<(AttributePath, Operand)>,
}

impl UpdateExpr {
    /// `true` when no clause holds an action.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty() && self.add.is_empty() && self.delete.is_empty()
    }
}

/// `path = value` inside a SET clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SetAction {
    /// Assigned path.
    pub path: AttributePath,
    /// Assigned value.
    pub value: SetValue,
}

/// Right-hand side of a SET action.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// Single operand.
    Operand(SetOperand),
    /// `a + b`
    Plus(SetOperand, SetOperand),
    /// `a - b`
    Minus(SetOperand, SetOperand),
}

/// Operand of a SET value: a path, a placeholder or one of the two update
/// functions.
#[derive(Debug, Clone, PartialEq)]
pub enum SetOperand {
    /// Path or value placeholder.
    Operand(Operand),
    /// `if_not_exists(path, operand)`
    IfNotExists(AttributePath, Box<SetOperand>),
    /// `list_append(a, b)`
    ListAppend(Box<SetOperand>, Box<SetOperand>),
}

/// Placeholders referenced by a parsed expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    /// `#n` aliases.
    pub names: BTreeSet<String>,
    /// `:n` placeholders.
    pub values: BTreeSet<String>,
}

impl Placeholders {
    /// Placeholders of a condition.
    #[must_use]
    pub fn of_condition(expr: &Expr) -> Self {
        let mut out = Self::default();
        out.expr(expr);
        out
    }

    /// Placeholders of an update expression.
    #[must_use]
    pub fn of_update(update: &UpdateExpr) -> Self {
        let mut out = Self::default();
        for action in &update.set {
            out.path(&action.path);
            match &action.value {
                SetValue::Operand(operand) => out.set_operand(operand),
                SetValue::Plus(a, b) | SetValue::Minus(a, b) => {
                    out.set_operand(a);
                    out.set_operand(b);
                }
            }
        }
        update.remove.iter().for_each(|path| out.path(path));
        for (path, operand) in update.add.iter().chain(&update.delete) {
            out.path(path);
            out.operand(operand);
        }
        out
    }

    /// Placeholders of a projection.
    #[must_use]
    pub fn of_projection(paths: &[AttributePath]) -> Self {
        let mut out = Self::default();
        paths.iter().for_each(|path| out.path(path));
        out
    }

    /// Add everything `other` references.
    pub fn merge(&mut self, other: Placeholders) {
        self.names.extend(other.names);
        self.values.extend(other.values);
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Compare { left, right, .. } => {
                self.operand(left);
                self.operand(right);
            }
            Expr::Between {
                operand,
                lower,
                upper,
            } => {
                self.operand(operand);
                self.operand(lower);
                self.operand(upper);
            }
            Expr::In {
                operand,
                candidates,
            } => {
                self.operand(operand);
                candidates.iter().for_each(|c| self.operand(c));
            }
            Expr::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Not(inner) => self.expr(inner),
            Expr::Function { args, .. } => args.iter().for_each(|a| self.operand(a)),
        }
    }

    fn operand(&mut self, operand: &Operand) {
        match operand {
            Operand::Path(path) | Operand::Size(path) => self.path(path),
            Operand::Value(id) => {
                self.values.insert(id.clone());
            }
        }
    }

    fn set_operand(&mut self, operand: &SetOperand) {
        match operand {
            SetOperand::Operand(operand) => self.operand(operand),
            SetOperand::IfNotExists(path, default) => {
                self.path(path);
                self.set_operand(default);
            }
            SetOperand::ListAppend(a, b) => {
                self.set_operand(a);
                self.set_operand(b);
            }
        }
    }

    fn path(&mut self, path: &AttributePath) {
        for element in &path.elements {
            if let PathElement::Attribute(name) = element {
                if name.starts_with('#') {
                    self.names.insert(name.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(names: &[&str]) -> AttributePath {
        AttributePath {
            elements: names
                .iter()
                .map(|n| PathElement::Attribute((*n).to_owned()))
                .collect(),
        }
    }

    #[test]
    fn test_should_display_path() {
        let mut p = path(&["#1", "#2"]);
        p.elements.push(PathElement::Index(3));
        assert_eq!(p.to_string(), "#1.#2[3]");
    }

    #[test]
    fn test_should_collect_condition_placeholders() {
        let expr = Expr::Logical {
            op: BoolOp::And,
            left: Box::new(Expr::Compare {
                left: Operand::Path(path(&["#1"])),
                op: Comparator::Equals,
                right: Operand::Value(":1".to_owned()),
            }),
            right: Box::new(Expr::Function {
                name: FunctionName::AttributeExists,
                args: vec![Operand::Size(path(&["#2", "plain"]))],
            }),
        };
        let p = Placeholders::of_condition(&expr);
        assert_eq!(p.names.into_iter().collect::<Vec<_>>(), ["#1", "#2"]);
        assert_eq!(p.values.into_iter().collect::<Vec<_>>(), [":1"]);
    }

    #[test]
    fn test_should_collect_update_placeholders() {
        let update = UpdateExpr {
            set: vec![SetAction {
                path: path(&["#1"]),
                value: SetValue::Plus(
                    SetOperand::IfNotExists(
                        path(&["#1"]),
                        Box::new(SetOperand::Operand(Operand::Value(":1".to_owned()))),
                    ),
                    SetOperand::Operand(Operand::Value(":2".to_owned())),
                ),
            }],
            remove: vec![path(&["#2"])],
            add: vec![(path(&["#3"]), Operand::Value(":3".to_owned()))],
            delete: Vec::new(),
        };
        let p = Placeholders::of_update(&update);
        assert_eq!(p.names.len(), 3);
        assert_eq!(p.values.len(), 3);
        assert!(!update.is_empty());
    }
}
