//! Reading and writing items through a table's mapper.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use bytes::Bytes;
    use dynashape_core::{DynashapeError, MapperCache, MapperConfig, MapperError};
    use dynashape_model::{AttributeValue, Shape, Value};

    use crate::{document_shape, document_table, init_tracing};

    fn document() -> Value {
        Value::map([
            ("id", Value::from("doc-1")),
            ("version", Value::from(3)),
            ("count", Value::from(1.5)),
            ("array", Value::list(["a", "b"])),
            ("nested", Value::map([("a", "x")])),
            ("tags", Value::set(["red", "blue"])),
            ("blobs", Value::set([Bytes::from_static(b"\x01")])),
            ("fieldName", Value::list(["ab"])),
            ("note", Value::Null),
            ("attrs", Value::map([("w", 2)])),
        ])
    }

    #[test]
    fn test_should_round_trip_document() {
        let table = document_table().unwrap();
        let wire = table.write_item(&document()).unwrap();
        assert_eq!(wire["count"], AttributeValue::N("1.5".to_owned()));
        assert_eq!(wire["note"], AttributeValue::null());
        assert!(matches!(wire["blobs"], AttributeValue::Bs(_)));
        assert_eq!(table.read_item(&wire).unwrap(), document());
    }

    #[test]
    fn test_should_deduplicate_binary_set_on_read() {
        init_tracing();
        let cache = MapperCache::default();
        let mapper = cache
            .mapper_for(&Arc::new(Shape::set(Shape::binary())))
            .unwrap();
        let wire = AttributeValue::Bs(vec![
            Bytes::from_static(b"same"),
            Bytes::from_static(b"same"),
            Bytes::from_static(b"other"),
        ]);
        let value = mapper.read(&wire).unwrap();
        assert_eq!(value.as_set().unwrap().len(), 2);
    }

    #[test]
    fn test_should_report_path_of_every_violation() {
        let table = document_table().unwrap();
        let mut wire = table.write_item(&document()).unwrap();
        wire.insert(
            "fieldName".to_owned(),
            AttributeValue::L(vec![
                AttributeValue::S("too long".to_owned()),
                AttributeValue::S("ok".to_owned()),
            ]),
        );
        let err = table.read_item(&wire).unwrap_err();
        let violations = err.violations().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.iter().next().unwrap().path, "$['fieldName'][0]");
    }

    #[test]
    fn test_should_fail_fast_on_wrong_tag() {
        let table = document_table().unwrap();
        let mut wire = table.write_item(&document()).unwrap();
        wire.insert("count".to_owned(), AttributeValue::S("1".to_owned()));
        let err = table.read_item(&wire).unwrap_err();
        assert!(matches!(err, MapperError::TypeMismatch { ref path, .. } if path == "$['count']"));
    }

    #[test]
    fn test_should_share_mappers_per_shape() {
        init_tracing();
        let cache = MapperCache::default();
        let shape = document_shape();
        let first = cache.mapper_for(&shape).unwrap();
        let second = cache.mapper_for(&shape).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_should_store_sets_as_lists_when_configured() {
        init_tracing();
        let table = dynashape_core::Table::new(
            "documents",
            document_shape(),
            "id",
            None,
            MapperConfig::default().with_set_as_list(),
        )
        .unwrap();
        let wire = table.write_item(&document()).unwrap();
        assert!(matches!(wire["tags"], AttributeValue::L(_)));
    }

    #[test]
    fn test_should_build_put_item_payload() {
        let table = document_table().unwrap();
        let id = table.item().field("id").unwrap();
        let request = table.put_item(&document(), Some(&id.not_exists())).unwrap();
        assert_eq!(
            request.condition_expression.as_deref(),
            Some("attribute_not_exists(#1)")
        );
        assert!(request.expression_attribute_values.is_empty());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Item"]["id"]["S"], "doc-1");
        assert!(json.get("ExpressionAttributeValues").is_none());
    }

    #[test]
    fn test_should_reject_key_of_wrong_type() {
        let table = document_table().unwrap();
        let err = table.key(7, Some(Value::from(1))).unwrap_err();
        assert!(matches!(err, DynashapeError::Mapper(_)));
        let missing: HashMap<String, AttributeValue> = HashMap::new();
        assert!(table.read_item(&missing).is_err());
    }
}
