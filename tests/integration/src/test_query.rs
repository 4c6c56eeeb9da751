//! Query, scan and get payloads with shared placeholder tables.

#[cfg(test)]
mod tests {
    use dynashape_core::expression::{
        ExpressionError, compile_projection, compile_query, parse_condition, verify_projection,
        verify_query,
    };
    use dynashape_core::{DynashapeError, KeyCondition, Ordered, SortCondition};
    use dynashape_model::Value;
    use dynashape_model::types::KeyType;

    use crate::document_table;

    #[test]
    fn test_should_describe_key_schema() {
        let table = document_table().unwrap();
        let elements = table.key_schema_elements();
        assert_eq!(elements[0].attribute_name, "id");
        assert_eq!(elements[0].key_type, KeyType::Hash);
        assert_eq!(elements[1].key_type, KeyType::Range);
        let json = serde_json::to_value(table.attribute_definitions()).unwrap();
        assert_eq!(json[1]["AttributeType"], "N");
    }

    #[test]
    fn test_should_query_partition_with_sort_range() {
        let table = document_table().unwrap();
        let key = KeyCondition::new("doc-1").with_sort(SortCondition::Between(
            Value::from(1),
            Value::from(5),
        ));
        let request = table.query(&key, None, &[]).unwrap();
        assert_eq!(
            request.key_condition_expression.as_deref(),
            Some("#1=:1 AND #2 BETWEEN :2 AND :3")
        );
        assert!(request.filter_expression.is_none());
        assert_eq!(request.expression_attribute_names["#2"], "version");
    }

    #[test]
    fn test_should_reuse_aliases_across_key_filter_and_projection() {
        let table = document_table().unwrap();
        let item = table.item();
        let count = item.field("count").unwrap().as_number().unwrap();
        let id = item.field("id").unwrap();
        let key = KeyCondition::new("doc-1");
        let partition = id.equals("doc-1").unwrap();
        let filter = count.greater_than_or_equal(3).unwrap();
        let projection = table.projection(&["id", "count", "array"]).unwrap();

        let compiled = compile_query(&partition, None, Some(&filter), &projection).unwrap();
        assert_eq!(compiled.key_condition_expression, "#1=:1");
        assert_eq!(compiled.filter_expression.as_deref(), Some("#2>=:2"));
        assert_eq!(compiled.projection_expression.as_deref(), Some("#1, #2, #3"));
        verify_query(&compiled).unwrap();

        let request = table.query(&key, Some(&filter), &projection).unwrap();
        assert_eq!(request.projection_expression, compiled.projection_expression);
        assert_eq!(
            request.expression_attribute_names,
            compiled.expression_attribute_names
        );
    }

    #[test]
    fn test_should_reject_sort_condition_on_hash_only_table() {
        let table = dynashape_core::Table::new(
            "hash-only",
            crate::document_shape(),
            "id",
            None,
            dynashape_core::MapperConfig::default(),
        )
        .unwrap();
        let key = KeyCondition::new("a").with_sort(SortCondition::Equals(Value::from(1)));
        assert!(matches!(
            table.query(&key, None, &[]).unwrap_err(),
            DynashapeError::Dsl(_)
        ));
    }

    #[test]
    fn test_should_scan_with_filter_and_projection() {
        let table = document_table().unwrap();
        let tags = table.item().field("tags").unwrap().as_set().unwrap();
        let filter = tags.size().greater_than(2).unwrap();
        let request = table
            .scan(Some(&filter), &table.projection(&["id", "tags"]).unwrap())
            .unwrap();
        assert_eq!(request.filter_expression.as_deref(), Some("size(#1)>:1"));
        assert_eq!(request.projection_expression.as_deref(), Some("#2, #1"));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["ExpressionAttributeNames"]["#2"], "id");
    }

    #[test]
    fn test_should_project_nested_paths() {
        let table = document_table().unwrap();
        let item = table.item();
        let out = compile_projection(&[
            item.field("nested").unwrap().field("a").unwrap().node(),
            item.field("array").unwrap().get(1).unwrap().node(),
        ])
        .unwrap();
        assert_eq!(out.expression, "#1.#2, #3[1]");
        verify_projection(&out).unwrap();
        assert!(out.values().is_none());
    }

    #[test]
    fn test_should_get_item_with_projection() {
        let table = document_table().unwrap();
        let request = table
            .get_item(
                table.key("doc-1", Some(Value::from(2))).unwrap(),
                &table.projection(&["note"]).unwrap(),
            )
            .unwrap();
        assert_eq!(request.projection_expression.as_deref(), Some("#1"));
        assert_eq!(request.expression_attribute_names["#1"], "note");
    }

    #[test]
    fn test_should_reject_malformed_expression_text() {
        assert!(matches!(
            parse_condition("#1 = "),
            Err(ExpressionError::UnexpectedEof)
        ));
        assert!(parse_condition("#1[x]=:1").is_err());
    }
}
