//! Check compiled output against the target dialect.
//!
//! The text must parse, every referenced `#n`/`:n` must be defined, and every
//! defined placeholder must be referenced: the service rejects requests with
//! unused entries in either map.

use std::collections::HashMap;

use dynashape_model::AttributeValue;
use tracing::trace;

use super::ast::Placeholders;
use super::compile::CompiledQuery;
use super::parser::{ExpressionError, parse_condition, parse_projection, parse_update};
use super::writer::CompiledExpression;

/// Which grammar an expression is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    /// Condition, filter or key condition.
    Condition,
    /// Update clauses.
    Update,
    /// Projection.
    Projection,
}

impl ExpressionKind {
    fn placeholders(self, text: &str) -> Result<Placeholders, ExpressionError> {
        Ok(match self {
            Self::Condition => Placeholders::of_condition(&parse_condition(text)?),
            Self::Update => Placeholders::of_update(&parse_update(text)?),
            Self::Projection => Placeholders::of_projection(&parse_projection(text)?),
        })
    }
}

/// Verify several expressions of one request against their shared tables.
pub fn verify_expressions(
    expressions: &[(ExpressionKind, &str)],
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<(), ExpressionError> {
    let mut used = Placeholders::default();
    for (kind, text) in expressions {
        used.merge(kind.placeholders(text)?);
    }
    trace!(
        expressions = expressions.len(),
        names = used.names.len(),
        values = used.values.len(),
        "verifying placeholders"
    );
    if let Some(name) = used.names.iter().find(|n| !names.contains_key(*n)) {
        return Err(ExpressionError::UndefinedName { name: name.clone() });
    }
    if let Some(name) = used.values.iter().find(|v| !values.contains_key(*v)) {
        return Err(ExpressionError::UndefinedValue { name: name.clone() });
    }
    if let Some(name) = sorted_keys(names).find(|n| !used.names.contains(*n)) {
        return Err(ExpressionError::UnusedName { name: name.clone() });
    }
    if let Some(name) = sorted_keys(values).find(|v| !used.values.contains(*v)) {
        return Err(ExpressionError::UnusedValue { name: name.clone() });
    }
    Ok(())
}

fn verify_one(kind: ExpressionKind, compiled: &CompiledExpression) -> Result<(), ExpressionError> {
    verify_expressions(
        &[(kind, compiled.expression.as_str())],
        &compiled.expression_attribute_names,
        &compiled.expression_attribute_values,
    )
}

/// Verify a compiled condition, filter or key condition.
pub fn verify_condition(compiled: &CompiledExpression) -> Result<(), ExpressionError> {
    verify_one(ExpressionKind::Condition, compiled)
}

/// Verify a compiled update expression.
pub fn verify_update(compiled: &CompiledExpression) -> Result<(), ExpressionError> {
    verify_one(ExpressionKind::Update, compiled)
}

/// Verify a compiled projection expression.
pub fn verify_projection(compiled: &CompiledExpression) -> Result<(), ExpressionError> {
    verify_one(ExpressionKind::Projection, compiled)
}

/// Verify every expression of a compiled query against the shared tables.
pub fn verify_query(compiled: &CompiledQuery) -> Result<(), ExpressionError> {
    let mut expressions = vec![(
        ExpressionKind::Condition,
        compiled.key_condition_expression.as_str(),
    )];
    if let Some(filter) = &compiled.filter_expression {
        expressions.push((ExpressionKind::Condition, filter.as_str()));
    }
    if let Some(projection) = &compiled.projection_expression {
        expressions.push((ExpressionKind::Projection, projection.as_str()));
    }
    verify_expressions(
        &expressions,
        &compiled.expression_attribute_names,
        &compiled.expression_attribute_values,
    )
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> impl Iterator<Item = &String> {
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();
    keys.into_iter()
}
