//! Condition, update, projection and query compilers.
//!
//! Every compile call owns one [`Writer`]; expressions bound to the same
//! request (key condition, filter, projection) are rendered through the same
//! writer so they share one alias and placeholder table.

use std::collections::HashMap;
use std::sync::Arc;

use dynashape_model::AttributeValue;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::writer::{CompiledExpression, Writer, non_empty};
use crate::dsl::{ActionKind, Condition, Node, UpdateAction};
use crate::error::DslError;

/// Render a condition (condition, filter or key condition expression).
#[must_use]
pub fn compile_condition(condition: &Condition) -> CompiledExpression {
    let mut writer = Writer::new();
    condition.node().synthesize(&mut writer);
    let out = writer.to_expression();
    debug!(
        expression = %out.expression,
        names = out.expression_attribute_names.len(),
        values = out.expression_attribute_values.len(),
        "compiled condition"
    );
    out
}

/// Render update actions as `SET a, b ADD c DELETE d REMOVE e`.
///
/// Actions are grouped by clause in that order; inside a clause they keep the
/// order given. Empty clauses are omitted.
pub fn compile_update(actions: &[UpdateAction]) -> Result<CompiledExpression, DslError> {
    let mut writer = Writer::new();
    write_update(&mut writer, actions)?;
    let out = writer.to_expression();
    debug!(
        expression = %out.expression,
        actions = actions.len(),
        values = out.expression_attribute_values.len(),
        "compiled update"
    );
    Ok(out)
}

pub(crate) fn write_update(writer: &mut Writer, actions: &[UpdateAction]) -> Result<(), DslError> {
    if actions.is_empty() {
        return Err(DslError::UnsupportedOperation {
            operation: "compile_update",
            kind: "update",
            hint: "pass at least one action".to_owned(),
        });
    }
    let mut grouped: Vec<&UpdateAction> = actions.iter().collect();
    grouped.sort_by_key(|a| a.kind());

    let mut current: Option<ActionKind> = None;
    for action in grouped {
        if current == Some(action.kind()) {
            writer.write_token(", ");
        } else {
            if current.is_some() {
                writer.write_token(" ");
            }
            writer.write_token(format!("{} ", action.kind().keyword()));
            current = Some(action.kind());
        }
        action.node().synthesize(writer);
    }
    Ok(())
}

pub(crate) fn write_projection(writer: &mut Writer, paths: &[Arc<Node>]) -> Result<(), DslError> {
    if paths.is_empty() {
        return Err(DslError::UnsupportedOperation {
            operation: "projection",
            kind: "projection",
            hint: "pass at least one attribute path".to_owned(),
        });
    }
    for path in paths {
        if !path.is_path() {
            return Err(DslError::UnsupportedOperation {
                operation: "projection",
                kind: "projection",
                hint: "only attribute paths can be projected".to_owned(),
            });
        }
        path.synthesize(writer);
        writer.write_token(", ");
    }
    writer.pop();
    Ok(())
}

/// Render a projection expression such as `#1, #2.#3`.
pub fn compile_projection(paths: &[Arc<Node>]) -> Result<CompiledExpression, DslError> {
    let mut writer = Writer::new();
    write_projection(&mut writer, paths)?;
    let out = writer.to_expression();
    debug!(expression = %out.expression, "compiled projection");
    Ok(out)
}

/// Expressions of one query request, sharing one placeholder table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompiledQuery {
    /// `partition AND sort`
    pub key_condition_expression: String,
    /// Filter applied after the key condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// Attributes to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// `#n -> attribute name` for every expression above.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// `:n -> wire value` for every expression above.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

impl CompiledQuery {
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

/// Render a query's key condition, optional filter and optional projection.
///
/// The key condition is `partition` alone or `partition AND sort`, without
/// an enclosing group.
pub fn compile_query(
    partition: &Condition,
    sort: Option<&Condition>,
    filter: Option<&Condition>,
    projection: &[Arc<Node>],
) -> Result<CompiledQuery, DslError> {
    let mut writer = Writer::new();
    partition.node().synthesize(&mut writer);
    if let Some(sort) = sort {
        writer.write_token(" AND ");
        sort.node().synthesize(&mut writer);
    }
    let key_condition_expression = writer.take_expression();

    let filter_expression = filter.map(|filter| {
        filter.node().synthesize(&mut writer);
        writer.take_expression()
    });

    let projection_expression = if projection.is_empty() {
        None
    } else {
        write_projection(&mut writer, projection)?;
        Some(writer.take_expression())
    };

    let (names, values) = writer.into_namespace().into_parts();
    debug!(
        key = %key_condition_expression,
        filter = ?filter_expression,
        projection = ?projection_expression,
        names = names.len(),
        values = values.len(),
        "compiled query"
    );
    Ok(CompiledQuery {
        key_condition_expression,
        filter_expression,
        projection_expression,
        expression_attribute_names: names,
        expression_attribute_values: values,
    })
}

#[cfg(test)]
mod tests {
    use dynashape_model::{Shape, Value};

    use super::*;
    use crate::dsl::{DslExpression, Item, Ordered};
    use crate::mapper::MapperCache;

    fn item() -> Item {
        let shape = Arc::new(
            Shape::record("Row")
                .member("pk", Shape::string())
                .member("sk", Shape::number())
                .member("count", Shape::number())
                .member("tags", Shape::set(Shape::string()))
                .member("note", Shape::string())
                .build(),
        );
        Item::new(&shape, &MapperCache::default()).unwrap()
    }

    #[test]
    fn test_should_compile_condition_with_tables() {
        let item = item();
        let out = compile_condition(&item.field("pk").unwrap().equals("a").unwrap());
        assert_eq!(out.expression, "#1=:1");
        assert_eq!(out.expression_attribute_names["#1"], "pk");
        assert_eq!(
            out.expression_attribute_values[":1"],
            AttributeValue::S("a".to_owned())
        );
    }

    #[test]
    fn test_should_group_update_clauses() {
        let item = item();
        let count = item.field("count").unwrap().as_number().unwrap();
        let tags = item.field("tags").unwrap().as_set().unwrap();
        let actions = [
            item.field("note").unwrap().remove().unwrap(),
            count.increment().unwrap(),
            tags.delete(Value::set(["x"])).unwrap(),
            tags.add(Value::set(["y"])).unwrap(),
            item.field("pk").unwrap().set("p").unwrap(),
        ];
        let out = compile_update(&actions).unwrap();
        assert_eq!(
            out.expression,
            "SET #1=#1+:1, #2=:2 ADD #3 :3 DELETE #3 :4 REMOVE #4"
        );
        assert_eq!(out.expression_attribute_names["#4"], "note");
    }

    #[test]
    fn test_should_reject_empty_update() {
        assert!(compile_update(&[]).is_err());
    }

    #[test]
    fn test_should_compile_projection() {
        let item = item();
        let out = compile_projection(&[
            item.field("pk").unwrap().node(),
            item.field("tags").unwrap().node(),
        ])
        .unwrap();
        assert_eq!(out.expression, "#1, #2");
        assert!(out.values().is_none());
        let size = item.field("note").unwrap().as_string().unwrap().length();
        assert!(compile_projection(&[size.node()]).is_err());
    }

    #[test]
    fn test_should_share_namespace_across_query_parts() {
        let item = item();
        let pk = item.field("pk").unwrap();
        let sk = item.field("sk").unwrap().as_number().unwrap();
        let out = compile_query(
            &pk.equals("p").unwrap(),
            Some(&sk.greater_than(3).unwrap()),
            Some(&pk.not_equals("q").unwrap()),
            &[pk.node(), item.field("count").unwrap().node()],
        )
        .unwrap();
        assert_eq!(out.key_condition_expression, "#1=:1 AND #2>:2");
        assert_eq!(out.filter_expression.as_deref(), Some("#1<>:3"));
        assert_eq!(out.projection_expression.as_deref(), Some("#1, #3"));
        assert_eq!(out.expression_attribute_names.len(), 3);
        assert_eq!(out.expression_attribute_values.len(), 3);
    }
}
