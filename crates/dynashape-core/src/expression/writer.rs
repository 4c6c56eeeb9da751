//! Placeholder interning and token buffering.
//!
//! A [`Namespace`] maps attribute names to `#n` aliases (deduplicated by the
//! exact name) and literal values to `:n` placeholders (never deduplicated).
//! A [`Writer`] owns a namespace plus the token buffer a node tree renders
//! into. Tokens are concatenated without separators; spacing is part of the
//! operator tokens themselves (`" AND "`, `" BETWEEN "`).

use std::collections::HashMap;

use dynashape_model::AttributeValue;
use serde::{Deserialize, Serialize};

/// Alias and value tables for one compiled request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    names: HashMap<String, String>,
    aliases: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    next_name: usize,
    next_value: usize,
}

impl Namespace {
    /// Create an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for `name`, allocating `#n` the first time it is seen.
    pub fn add_name(&mut self, name: &str) -> String {
        if let Some(alias) = self.aliases.get(name) {
            return alias.clone();
        }
        self.next_name += 1;
        let alias = format!("#{}", self.next_name);
        self.aliases.insert(name.to_owned(), alias.clone());
        self.names.insert(alias.clone(), name.to_owned());
        alias
    }

    /// Fresh `:n` placeholder for `value`.
    pub fn add_value(&mut self, value: AttributeValue) -> String {
        self.next_value += 1;
        let id = format!(":{}", self.next_value);
        self.values.insert(id.clone(), value);
        id
    }

    /// `alias -> attribute name`.
    #[must_use]
    pub fn names(&self) -> &HashMap<String, String> {
        &self.names
    }

    /// `placeholder -> wire value`.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, AttributeValue> {
        &self.values
    }

    /// Split into the alias and value tables.
    #[must_use]
    pub fn into_parts(self) -> (HashMap<String, String>, HashMap<String, AttributeValue>) {
        (self.names, self.values)
    }
}

/// Token buffer plus the namespace its placeholders come from.
#[derive(Debug, Default)]
pub struct Writer {
    namespace: Namespace,
    tokens: Vec<String>,
}

impl Writer {
    /// Writer with a fresh namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer continuing an existing namespace, so aliases and placeholder
    /// counters carry over.
    #[must_use]
    pub fn with_namespace(namespace: Namespace) -> Self {
        Self {
            namespace,
            tokens: Vec::new(),
        }
    }

    /// Append a raw token.
    pub fn write_token(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    /// Append the alias for an attribute name.
    pub fn write_name(&mut self, name: &str) {
        let alias = self.namespace.add_name(name);
        self.tokens.push(alias);
    }

    /// Append a value placeholder.
    pub fn write_value(&mut self, value: AttributeValue) {
        let id = self.namespace.add_value(value);
        self.tokens.push(id);
    }

    /// Append a literal list index, `[n]`. Indices are part of the path
    /// grammar and never become placeholders.
    pub fn write_index(&mut self, index: usize) {
        self.tokens.push(format!("[{index}]"));
    }

    /// Remove and return the last token.
    pub fn pop(&mut self) -> Option<String> {
        self.tokens.pop()
    }

    /// The last token written.
    #[must_use]
    pub fn head(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    /// The namespace collected so far.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Render the buffered tokens and clear the buffer, keeping the namespace
    /// for the next expression of the same request.
    pub fn take_expression(&mut self) -> String {
        let text = self.tokens.concat();
        self.tokens.clear();
        text
    }

    /// Drop the token buffer and return the namespace.
    #[must_use]
    pub fn into_namespace(self) -> Namespace {
        self.namespace
    }

    /// Render the buffered tokens together with the placeholder tables.
    #[must_use]
    pub fn to_expression(mut self) -> CompiledExpression {
        let expression = self.take_expression();
        let (names, values) = self.namespace.into_parts();
        CompiledExpression {
            expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
        }
    }
}

/// A rendered expression and its placeholder tables.
///
/// Both tables are always present in memory (possibly empty); serialization
/// omits empty tables, matching what the service accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompiledExpression {
    /// Expression text.
    pub expression: String,
    /// `#n -> attribute name`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// `:n -> wire value`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

impl CompiledExpression {
    /// Alias table, `None` when empty.
    #[must_use]
    pub fn names(&self) -> Option<HashMap<String, String>> {
        non_empty(&self.expression_attribute_names)
    }

    /// Value table, `None` when empty.
    #[must_use]
    pub fn values(&self) -> Option<HashMap<String, AttributeValue>> {
        non_empty(&self.expression_attribute_values)
    }
}

pub(crate) fn non_empty<V: Clone>(map: &HashMap<String, V>) -> Option<HashMap<String, V>> {
    (!map.is_empty()).then(|| map.clone())
}
