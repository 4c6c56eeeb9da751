//! Lexer and recursive-descent parser for the target expression dialect.
//!
//! Covers condition/filter/key-condition expressions, update expressions and
//! projection expressions. Keywords and function names are matched
//! case-insensitively. List indices must be integer literals; a bracketed
//! placeholder such as `[#2]` is rejected.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::ast::{
    AttributePath, Expr, Operand, PathElement, SetAction, SetOperand, SetValue, UpdateExpr,
};
use crate::dsl::{BoolOp, Comparator, FunctionName};

/// Errors produced while parsing or verifying a compiled expression.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    /// An unexpected token was encountered.
    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
    },
    /// The expression ended prematurely.
    #[error("unexpected end of expression")]
    UnexpectedEof,
    /// A list index that is not an integer literal.
    #[error("list index must be an integer literal, found {found}")]
    InvalidIndex {
        /// The offending token.
        found: String,
    },
    /// A clause keyword appeared twice in one update expression.
    #[error("the {clause} clause appears more than once")]
    DuplicateClause {
        /// Clause keyword.
        clause: &'static str,
    },
    /// An alias used in the text has no entry in the name map.
    #[error("undefined expression attribute name: {name}")]
    UndefinedName {
        /// The alias.
        name: String,
    },
    /// A placeholder used in the text has no entry in the value map.
    #[error("undefined expression attribute value: {name}")]
    UndefinedValue {
        /// The placeholder.
        name: String,
    },
    /// A name map entry the text never references.
    #[error("unused expression attribute name: {name}")]
    UnusedName {
        /// The alias.
        name: String,
    },
    /// A value map entry the text never references.
    #[error("unused expression attribute value: {name}")]
    UnusedValue {
        /// The placeholder.
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    /// `#name`, stored with the `#`.
    NamePlaceholder(String),
    /// `:name`, stored with the `:`.
    ValuePlaceholder(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
    Between,
    In,
    Set,
    Remove,
    Add,
    Delete,
    Function(FunctionName),
    Number(usize),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::NamePlaceholder(s) | Self::ValuePlaceholder(s) => f.write_str(s),
            Self::Eq => f.write_str("'='"),
            Self::Ne => f.write_str("'<>'"),
            Self::Lt => f.write_str("'<'"),
            Self::Le => f.write_str("'<='"),
            Self::Gt => f.write_str("'>'"),
            Self::Ge => f.write_str("'>='"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Dot => f.write_str("'.'"),
            Self::Comma => f.write_str("','"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::Between => f.write_str("BETWEEN"),
            Self::In => f.write_str("IN"),
            Self::Set => f.write_str("SET"),
            Self::Remove => f.write_str("REMOVE"),
            Self::Add => f.write_str("ADD"),
            Self::Delete => f.write_str("DELETE"),
            Self::Function(name) => write!(f, "{name}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Eof => f.write_str("EOF"),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }
        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };
        let token = match ch {
            '#' => self.placeholder('#')?,
            ':' => self.placeholder(':')?,
            '<' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => self.bump(Token::Le),
                    Some('>') => self.bump(Token::Ne),
                    _ => Token::Lt,
                }
            }
            '>' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => self.bump(Token::Ge),
                    _ => Token::Gt,
                }
            }
            '=' => self.bump(Token::Eq),
            '+' => self.bump(Token::Plus),
            '-' => self.bump(Token::Minus),
            '.' => self.bump(Token::Dot),
            ',' => self.bump(Token::Comma),
            '(' => self.bump(Token::LParen),
            ')' => self.bump(Token::RParen),
            '[' => self.bump(Token::LBracket),
            ']' => self.bump(Token::RBracket),
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            _ => {
                return Err(ExpressionError::UnexpectedToken {
                    expected: "valid token".to_owned(),
                    found: format!("'{ch}'"),
                });
            }
        };
        Ok(token)
    }

    fn ident_chars(&mut self) -> String {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            s.push(c);
            self.chars.next();
        }
        s
    }

    fn placeholder(&mut self, sigil: char) -> Result<Token, ExpressionError> {
        self.chars.next();
        let name = self.ident_chars();
        if name.is_empty() {
            return Err(ExpressionError::UnexpectedToken {
                expected: format!("placeholder name after '{sigil}'"),
                found: "nothing".to_owned(),
            });
        }
        let text = format!("{sigil}{name}");
        Ok(if sigil == '#' {
            Token::NamePlaceholder(text)
        } else {
            Token::ValuePlaceholder(text)
        })
    }

    fn number(&mut self) -> Result<Token, ExpressionError> {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek().filter(|c| c.is_ascii_digit()) {
            s.push(c);
            self.chars.next();
        }
        s.parse()
            .map(Token::Number)
            .map_err(|_| ExpressionError::InvalidIndex { found: s })
    }

    fn identifier_or_keyword(&mut self) -> Token {
        let ident = self.ident_chars();
        match ident.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "between" => Token::Between,
            "in" => Token::In,
            "set" => Token::Set,
            "remove" => Token::Remove,
            "add" => Token::Add,
            "delete" => Token::Delete,
            "attribute_exists" => Token::Function(FunctionName::AttributeExists),
            "attribute_not_exists" => Token::Function(FunctionName::AttributeNotExists),
            "attribute_type" => Token::Function(FunctionName::AttributeType),
            "begins_with" => Token::Function(FunctionName::BeginsWith),
            "contains" => Token::Function(FunctionName::Contains),
            "size" => Token::Function(FunctionName::Size),
            "if_not_exists" => Token::Function(FunctionName::IfNotExists),
            "list_append" => Token::Function(FunctionName::ListAppend),
            _ => Token::Identifier(ident),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            tokens: Lexer::new(input).tokenize()?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        match self.advance() {
            token if token == *expected => Ok(()),
            Token::Eof => Err(ExpressionError::UnexpectedEof),
            token => Err(ExpressionError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.to_string(),
            }),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        let matched = self.peek() == token;
        if matched {
            self.pos += 1;
        }
        matched
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn finish(&self) -> Result<(), ExpressionError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of expression"))
        }
    }

    fn unexpected(&self, expected: &str) -> ExpressionError {
        match self.peek() {
            Token::Eof => ExpressionError::UnexpectedEof,
            found => ExpressionError::UnexpectedToken {
                expected: expected.to_owned(),
                found: found.to_string(),
            },
        }
    }

    fn comma_separated<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<Vec<T>, ExpressionError> {
        let mut items = vec![item(self)?];
        while self.eat(&Token::Comma) {
            items.push(item(self)?);
        }
        Ok(items)
    }
}

// Conditions, lowest precedence first: OR, AND, NOT, primary.
impl Parser {
    fn or_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Expr::Logical {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.not_expr()?;
        while self.eat(&Token::And) {
            let right = self.not_expr()?;
            left = Expr::Logical {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::LParen) {
            let expr = self.or_expr()?;
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }
        if let Token::Function(name) = *self.peek() {
            if matches!(
                name,
                FunctionName::AttributeExists
                    | FunctionName::AttributeNotExists
                    | FunctionName::AttributeType
                    | FunctionName::BeginsWith
                    | FunctionName::Contains
            ) {
                self.advance();
                self.expect(&Token::LParen)?;
                let args = self.comma_separated(Self::operand)?;
                self.expect(&Token::RParen)?;
                return Ok(Expr::Function { name, args });
            }
        }
        let operand = self.operand()?;
        self.postfix_expr(operand)
    }

    fn postfix_expr(&mut self, left: Operand) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            Token::Eq => Comparator::Equals,
            Token::Ne => Comparator::NotEquals,
            Token::Lt => Comparator::LessThan,
            Token::Le => Comparator::LessThanOrEqual,
            Token::Gt => Comparator::GreaterThan,
            Token::Ge => Comparator::GreaterThanOrEqual,
            Token::Between => {
                self.advance();
                let lower = self.operand()?;
                self.expect(&Token::And)?;
                let upper = self.operand()?;
                return Ok(Expr::Between {
                    operand: left,
                    lower,
                    upper,
                });
            }
            Token::In => {
                self.advance();
                self.expect(&Token::LParen)?;
                let candidates = self.comma_separated(Self::operand)?;
                self.expect(&Token::RParen)?;
                return Ok(Expr::In {
                    operand: left,
                    candidates,
                });
            }
            _ => return Err(self.unexpected("comparison operator, BETWEEN, or IN")),
        };
        self.advance();
        let right = self.operand()?;
        Ok(Expr::Compare { left, op, right })
    }
}

// Operands and paths.
impl Parser {
    fn operand(&mut self) -> Result<Operand, ExpressionError> {
        match self.peek() {
            Token::ValuePlaceholder(_) => match self.advance() {
                Token::ValuePlaceholder(id) => Ok(Operand::Value(id)),
                _ => Err(ExpressionError::UnexpectedEof),
            },
            Token::Function(FunctionName::Size) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let path = self.path()?;
                self.expect(&Token::RParen)?;
                Ok(Operand::Size(path))
            }
            _ => Ok(Operand::Path(self.path()?)),
        }
    }

    fn path(&mut self) -> Result<AttributePath, ExpressionError> {
        let mut elements = vec![self.path_name()?];
        loop {
            if self.eat(&Token::Dot) {
                elements.push(self.path_name()?);
            } else if self.eat(&Token::LBracket) {
                match self.advance() {
                    Token::Number(index) => elements.push(PathElement::Index(index)),
                    Token::Eof => return Err(ExpressionError::UnexpectedEof),
                    other => {
                        return Err(ExpressionError::InvalidIndex {
                            found: other.to_string(),
                        });
                    }
                }
                self.expect(&Token::RBracket)?;
            } else {
                return Ok(AttributePath { elements });
            }
        }
    }

    fn path_name(&mut self) -> Result<PathElement, ExpressionError> {
        match self.peek() {
            Token::Identifier(_) | Token::NamePlaceholder(_) => match self.advance() {
                Token::Identifier(name) | Token::NamePlaceholder(name) => {
                    Ok(PathElement::Attribute(name))
                }
                _ => Err(ExpressionError::UnexpectedEof),
            },
            _ => Err(self.unexpected("attribute name or #alias")),
        }
    }
}

// Update clauses.
impl Parser {
    fn update_expr(&mut self) -> Result<UpdateExpr, ExpressionError> {
        let mut update = UpdateExpr::default();
        let mut seen = Vec::new();
        while !self.at_end() {
            let clause = match self.advance() {
                Token::Set => "SET",
                Token::Remove => "REMOVE",
                Token::Add => "ADD",
                Token::Delete => "DELETE",
                other => {
                    return Err(ExpressionError::UnexpectedToken {
                        expected: "SET, REMOVE, ADD, or DELETE".to_owned(),
                        found: other.to_string(),
                    });
                }
            };
            if seen.contains(&clause) {
                return Err(ExpressionError::DuplicateClause { clause });
            }
            seen.push(clause);
            match clause {
                "SET" => update.set = self.comma_separated(Self::set_action)?,
                "REMOVE" => update.remove = self.comma_separated(Self::path)?,
                "ADD" => update.add = self.comma_separated(Self::path_and_operand)?,
                _ => update.delete = self.comma_separated(Self::path_and_operand)?,
            }
        }
        Ok(update)
    }

    fn set_action(&mut self) -> Result<SetAction, ExpressionError> {
        let path = self.path()?;
        self.expect(&Token::Eq)?;
        let first = self.set_operand()?;
        let value = if self.eat(&Token::Plus) {
            SetValue::Plus(first, self.set_operand()?)
        } else if self.eat(&Token::Minus) {
            SetValue::Minus(first, self.set_operand()?)
        } else {
            SetValue::Operand(first)
        };
        Ok(SetAction { path, value })
    }

    fn set_operand(&mut self) -> Result<SetOperand, ExpressionError> {
        match self.peek() {
            Token::Function(FunctionName::IfNotExists) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let path = self.path()?;
                self.expect(&Token::Comma)?;
                let default = self.set_operand()?;
                self.expect(&Token::RParen)?;
                Ok(SetOperand::IfNotExists(path, Box::new(default)))
            }
            Token::Function(FunctionName::ListAppend) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let first = self.set_operand()?;
                self.expect(&Token::Comma)?;
                let second = self.set_operand()?;
                self.expect(&Token::RParen)?;
                Ok(SetOperand::ListAppend(Box::new(first), Box::new(second)))
            }
            Token::ValuePlaceholder(_) | Token::Identifier(_) | Token::NamePlaceholder(_) => {
                Ok(SetOperand::Operand(self.operand()?))
            }
            _ => Err(self.unexpected("path, value, if_not_exists or list_append")),
        }
    }

    fn path_and_operand(&mut self) -> Result<(AttributePath, Operand), ExpressionError> {
        let path = self.path()?;
        match self.peek() {
            Token::ValuePlaceholder(_) => Ok((path, self.operand()?)),
            _ => Err(self.unexpected("value placeholder")),
        }
    }
}

/// Parse a condition, filter or key-condition expression.
pub fn parse_condition(input: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.or_expr()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse an update expression. An empty expression is an error.
pub fn parse_update(input: &str) -> Result<UpdateExpr, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let update = parser.update_expr()?;
    if update.is_empty() {
        return Err(ExpressionError::UnexpectedToken {
            expected: "SET, REMOVE, ADD, or DELETE".to_owned(),
            found: "empty update expression".to_owned(),
        });
    }
    Ok(update)
}

/// Parse a projection expression (comma-separated paths).
pub fn parse_projection(input: &str) -> Result<Vec<AttributePath>, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let paths = parser.comma_separated(Parser::path)?;
    parser.finish()?;
    Ok(paths)
}
