//! A typed table: record shape, key schema and request builders.
//!
//! A [`Table`] owns the [`MapperCache`] for its shape and the root [`Item`]
//! facade. Request builders compile every expression of one request through a
//! single [`Writer`], so the key condition, filter, update, condition and
//! projection of that request share one alias/placeholder table, then verify
//! the result before returning the payload.

use std::collections::HashMap;
use std::sync::Arc;

use dynashape_model::input::{
    DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use dynashape_model::types::{AttributeDefinition, KeySchemaElement, KeyType, ScalarAttributeType};
use dynashape_model::{AttributeValue, Shape, Value};
use tracing::debug;

use crate::attribute_shape::shape_of;
use crate::config::MapperConfig;
use crate::dsl::{Condition, Item, KeyCondition, Node, UpdateAction};
use crate::error::{DslError, DynashapeError, DynashapeResult, MapperError, SchemaError};
use crate::expression::{
    ExpressionKind, Writer, compile_query, verify_expressions, verify_query, write_projection,
    write_update,
};
use crate::mapper::{Mapper, MapperCache};

/// Partition key and optional sort key of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition (HASH) key.
    pub partition_key: KeyAttribute,
    /// Sort (RANGE) key.
    pub sort_key: Option<KeyAttribute>,
}

/// A key attribute name and its scalar wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    /// Attribute name.
    pub name: String,
    /// `S`, `N` or `B`.
    pub attr_type: ScalarAttributeType,
}

/// A named table over one record shape.
#[derive(Debug)]
pub struct Table {
    name: String,
    key_schema: KeySchema,
    cache: MapperCache,
    item: Item,
}

impl Table {
    /// Create a table, checking that the key members exist and are stored as
    /// `S`, `N` or `B`.
    pub fn new(
        name: impl Into<String>,
        shape: Arc<Shape>,
        partition_key: &str,
        sort_key: Option<&str>,
        config: MapperConfig,
    ) -> DynashapeResult<Self> {
        let name = name.into();
        let record = shape.as_record().ok_or(SchemaError::NotARecord {
            kind: shape.kind().name(),
        })?;
        let key_attribute = |attr: &str| -> Result<KeyAttribute, SchemaError> {
            let member = record
                .member(attr)
                .ok_or_else(|| SchemaError::UnknownMember {
                    record: record.name.clone(),
                    member: attr.to_owned(),
                })?;
            let projected = shape_of(&member.shape, &config)?;
            let attr_type = projected
                .type_descriptor()
                .and_then(ScalarAttributeType::from_tag)
                .ok_or_else(|| SchemaError::InvalidKeyShape {
                    attr: attr.to_owned(),
                    actual: projected.to_string(),
                })?;
            Ok(KeyAttribute {
                name: attr.to_owned(),
                attr_type,
            })
        };
        let key_schema = KeySchema {
            partition_key: key_attribute(partition_key)?,
            sort_key: sort_key.map(key_attribute).transpose()?,
        };

        let cache = MapperCache::new(config);
        let item = Item::new(&shape, &cache)?;
        debug!(
            table = %name,
            partition_key,
            sort_key,
            "created table"
        );
        Ok(Self {
            name,
            key_schema,
            cache,
            item,
        })
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The mapper cache every mapper of this table is built in.
    #[must_use]
    pub fn cache(&self) -> &MapperCache {
        &self.cache
    }

    /// Root of the expression facade.
    #[must_use]
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// The record mapper.
    #[must_use]
    pub fn mapper(&self) -> &Arc<Mapper> {
        self.item.mapper()
    }

    /// Partition and sort key.
    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// Key schema elements, as sent when creating the table.
    #[must_use]
    pub fn key_schema_elements(&self) -> Vec<KeySchemaElement> {
        self.key_attributes()
            .map(|(attr, key_type)| KeySchemaElement {
                attribute_name: attr.name.clone(),
                key_type,
            })
            .collect()
    }

    /// Attribute definitions of the key attributes.
    #[must_use]
    pub fn attribute_definitions(&self) -> Vec<AttributeDefinition> {
        self.key_attributes()
            .map(|(attr, _)| AttributeDefinition {
                attribute_name: attr.name.clone(),
                attribute_type: attr.attr_type,
            })
            .collect()
    }

    fn key_attributes(&self) -> impl Iterator<Item = (&KeyAttribute, KeyType)> {
        std::iter::once((&self.key_schema.partition_key, KeyType::Hash)).chain(
            self.key_schema
                .sort_key
                .iter()
                .map(|attr| (attr, KeyType::Range)),
        )
    }

    /// Decode a stored item.
    pub fn read_item(&self, item: &HashMap<String, AttributeValue>) -> Result<Value, MapperError> {
        self.mapper().read_item(item)
    }

    /// Encode an item for storage.
    pub fn write_item(&self, value: &Value) -> Result<HashMap<String, AttributeValue>, MapperError> {
        self.mapper().write_item(value)
    }

    /// Encode a primary key. `sort` must be given exactly when the table has
    /// a sort key.
    pub fn key(
        &self,
        partition: impl Into<Value>,
        sort: Option<Value>,
    ) -> DynashapeResult<HashMap<String, AttributeValue>> {
        let mut key = HashMap::with_capacity(2);
        let partition_key = &self.key_schema.partition_key;
        key.insert(
            partition_key.name.clone(),
            self.encode_member(&partition_key.name, &partition.into())?,
        );
        match (&self.key_schema.sort_key, sort) {
            (Some(attr), Some(value)) => {
                key.insert(attr.name.clone(), self.encode_member(&attr.name, &value)?);
            }
            (None, None) => {}
            (Some(_), None) => return Err(key_error("the table has a sort key; pass its value")),
            (None, Some(_)) => return Err(key_error("the table has no sort key")),
        }
        Ok(key)
    }

    fn encode_member(&self, name: &str, value: &Value) -> DynashapeResult<AttributeValue> {
        let mapper = self.mapper().field(name).ok_or_else(|| DslError::UnknownField {
            record: self.name.clone(),
            field: name.to_owned(),
        })?;
        Ok(mapper.write(value)?)
    }

    /// Projection paths for top-level `attributes`.
    pub fn projection(&self, attributes: &[&str]) -> Result<Vec<Arc<Node>>, DslError> {
        attributes
            .iter()
            .map(|name| self.item.field(name).map(|f| f.node()))
            .collect()
    }

    /// `GetItem` for `key`, optionally projected.
    pub fn get_item(
        &self,
        key: HashMap<String, AttributeValue>,
        projection: &[Arc<Node>],
    ) -> DynashapeResult<GetItemInput> {
        let mut request = Request::default();
        let projection_expression = request.projection(projection)?;
        let (names, _) = request.finish()?;
        Ok(GetItemInput {
            table_name: self.name.clone(),
            key,
            projection_expression,
            expression_attribute_names: names,
            ..Default::default()
        })
    }

    /// `PutItem` for `value`, optionally guarded by `condition`.
    pub fn put_item(
        &self,
        value: &Value,
        condition: Option<&Condition>,
    ) -> DynashapeResult<PutItemInput> {
        let item = self.write_item(value)?;
        let mut request = Request::default();
        let condition_expression = request.condition(condition);
        let (names, values) = request.finish()?;
        Ok(PutItemInput {
            table_name: self.name.clone(),
            item,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            ..Default::default()
        })
    }

    /// `UpdateItem` applying `actions` to `key`, optionally guarded by
    /// `condition`.
    pub fn update_item(
        &self,
        key: HashMap<String, AttributeValue>,
        actions: &[UpdateAction],
        condition: Option<&Condition>,
    ) -> DynashapeResult<UpdateItemInput> {
        let mut request = Request::default();
        let update_expression = request.update(actions)?;
        let condition_expression = request.condition(condition);
        let (names, values) = request.finish()?;
        Ok(UpdateItemInput {
            table_name: self.name.clone(),
            key,
            update_expression: Some(update_expression),
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            ..Default::default()
        })
    }

    /// `DeleteItem` for `key`, optionally guarded by `condition`.
    pub fn delete_item(
        &self,
        key: HashMap<String, AttributeValue>,
        condition: Option<&Condition>,
    ) -> DynashapeResult<DeleteItemInput> {
        let mut request = Request::default();
        let condition_expression = request.condition(condition);
        let (names, values) = request.finish()?;
        Ok(DeleteItemInput {
            table_name: self.name.clone(),
            key,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            ..Default::default()
        })
    }

    /// `Query` for one partition, optionally narrowed by sort key, filtered
    /// and projected.
    pub fn query(
        &self,
        key: &KeyCondition,
        filter: Option<&Condition>,
        projection: &[Arc<Node>],
    ) -> DynashapeResult<QueryInput> {
        let partition_key = self.item.field(&self.key_schema.partition_key.name)?;
        let sort_key = self
            .key_schema
            .sort_key
            .as_ref()
            .map(|attr| self.item.field(&attr.name))
            .transpose()?;
        let (partition, sort) = key.resolve(&partition_key, sort_key.as_ref())?;
        let compiled = compile_query(&partition, sort.as_ref(), filter, projection)?;
        verify_query(&compiled)?;
        Ok(QueryInput {
            table_name: self.name.clone(),
            key_condition_expression: Some(compiled.key_condition_expression),
            filter_expression: compiled.filter_expression,
            projection_expression: compiled.projection_expression,
            expression_attribute_names: compiled.expression_attribute_names,
            expression_attribute_values: compiled.expression_attribute_values,
            ..Default::default()
        })
    }

    /// `Scan`, optionally filtered and projected.
    pub fn scan(
        &self,
        filter: Option<&Condition>,
        projection: &[Arc<Node>],
    ) -> DynashapeResult<ScanInput> {
        let mut request = Request::default();
        let filter_expression = request.condition(filter);
        let projection_expression = request.projection(projection)?;
        let (names, values) = request.finish()?;
        Ok(ScanInput {
            table_name: self.name.clone(),
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            ..Default::default()
        })
    }
}

fn key_error(hint: &str) -> DynashapeError {
    DslError::UnsupportedOperation {
        operation: "key",
        kind: "table",
        hint: hint.to_owned(),
    }
    .into()
}

/// Expressions of one request rendered through one writer.
#[derive(Debug, Default)]
struct Request {
    writer: Writer,
    rendered: Vec<(ExpressionKind, String)>,
}

impl Request {
    fn push(&mut self, kind: ExpressionKind) -> String {
        let text = self.writer.take_expression();
        self.rendered.push((kind, text.clone()));
        text
    }

    fn condition(&mut self, condition: Option<&Condition>) -> Option<String> {
        let condition = condition?;
        condition.node().synthesize(&mut self.writer);
        Some(self.push(ExpressionKind::Condition))
    }

    fn update(&mut self, actions: &[UpdateAction]) -> Result<String, DslError> {
        write_update(&mut self.writer, actions)?;
        Ok(self.push(ExpressionKind::Update))
    }

    fn projection(&mut self, paths: &[Arc<Node>]) -> Result<Option<String>, DslError> {
        if paths.is_empty() {
            return Ok(None);
        }
        write_projection(&mut self.writer, paths)?;
        Ok(Some(self.push(ExpressionKind::Projection)))
    }

    fn finish(
        self,
    ) -> DynashapeResult<(HashMap<String, String>, HashMap<String, AttributeValue>)> {
        let (names, values) = self.writer.into_namespace().into_parts();
        let expressions: Vec<_> = self
            .rendered
            .iter()
            .map(|(kind, text)| (*kind, text.as_str()))
            .collect();
        verify_expressions(&expressions, &names, &values)?;
        debug!(
            expressions = expressions.len(),
            names = names.len(),
            values = values.len(),
            "built request"
        );
        Ok((names, values))
    }
}

#[cfg(test)]
mod tests {
    use dynashape_model::Shape;

    use super::*;
    use crate::dsl::{Ordered, SortCondition};
    use crate::expression::ExpressionError;

    fn shape() -> Arc<Shape> {
        Arc::new(
            Shape::record("Order")
                .member("customer", Shape::string())
                .member("placed", Shape::number())
                .member("status", Shape::enumeration(["open", "closed"]))
                .member("lines", Shape::list(Shape::string()))
                .optional("note", Shape::string())
                .member("tags", Shape::set(Shape::string()))
                .build(),
        )
    }

    fn table() -> Table {
        Table::new(
            "orders",
            shape(),
            "customer",
            Some("placed"),
            MapperConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_should_describe_key_schema() {
        let table = table();
        let elements = table.key_schema_elements();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].key_type, KeyType::Hash);
        assert_eq!(elements[1].attribute_name, "placed");
        let defs = table.attribute_definitions();
        assert_eq!(defs[1].attribute_type, ScalarAttributeType::N);
    }

    #[test]
    fn test_should_reject_bad_keys() {
        let err = Table::new("t", shape(), "missing", None, MapperConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DynashapeError::Schema(SchemaError::UnknownMember { .. })
        ));
        let err = Table::new("t", shape(), "note", None, MapperConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DynashapeError::Schema(SchemaError::InvalidKeyShape { .. })
        ));
        let err = Table::new("t", shape(), "lines", None, MapperConfig::default()).unwrap_err();
        assert!(err.to_string().contains("'lines'"), "{err}");
    }

    #[test]
    fn test_should_encode_key() {
        let table = table();
        let key = table.key("c1", Some(Value::from(7))).unwrap();
        assert_eq!(key["customer"], AttributeValue::S("c1".to_owned()));
        assert_eq!(key["placed"], AttributeValue::N("7".to_owned()));
        assert!(table.key("c1", None).is_err());
    }

    #[test]
    fn test_should_share_table_between_update_and_condition() {
        let table = table();
        let item = table.item();
        let status = item.field("status").unwrap();
        let request = table
            .update_item(
                table.key("c1", Some(Value::from(1))).unwrap(),
                &[status.set("closed").unwrap()],
                Some(&status.equals("open").unwrap()),
            )
            .unwrap();
        assert_eq!(request.update_expression.as_deref(), Some("SET #1=:1"));
        assert_eq!(request.condition_expression.as_deref(), Some("#1=:2"));
        assert_eq!(request.expression_attribute_names.len(), 1);
        assert_eq!(request.expression_attribute_values.len(), 2);
    }

    #[test]
    fn test_should_build_query_request() {
        let table = table();
        let item = table.item();
        let key = KeyCondition::new("c1").with_sort(SortCondition::GreaterThan(Value::from(10)));
        let filter = item.field("status").unwrap().equals("open").unwrap();
        let request = table
            .query(&key, Some(&filter), &table.projection(&["status", "lines"]).unwrap())
            .unwrap();
        assert_eq!(
            request.key_condition_expression.as_deref(),
            Some("#1=:1 AND #2>:2")
        );
        assert_eq!(request.filter_expression.as_deref(), Some("#3=:3"));
        assert_eq!(request.projection_expression.as_deref(), Some("#3, #4"));
    }

    #[test]
    fn test_should_reject_dynamic_index_in_request() {
        let table = table();
        let item = table.item();
        let lines = item.field("lines").unwrap().as_list().unwrap();
        let placed = item.field("placed").unwrap().as_number().unwrap();
        let cond = lines
            .get_at(&placed)
            .unwrap()
            .as_string()
            .unwrap()
            .greater_than("a")
            .unwrap();
        let err = table.scan(Some(&cond), &[]).unwrap_err();
        assert!(matches!(
            err,
            DynashapeError::Expression(ExpressionError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_should_omit_empty_maps_in_payload() {
        let table = table();
        let request = table
            .get_item(table.key("c1", Some(Value::from(1))).unwrap(), &[])
            .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("ExpressionAttributeNames").is_none());
        assert!(json.get("ProjectionExpression").is_none());
    }
}
