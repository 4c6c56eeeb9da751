//! Update expressions and `UpdateItem` payloads.

#[cfg(test)]
mod tests {
    use dynashape_core::expression::{compile_update, verify_update};
    use dynashape_core::{DslExpression, DynashapeError, Ordered};
    use dynashape_model::{AttributeValue, Value};

    use crate::document_table;

    #[test]
    fn test_should_keep_repeated_sets_in_order() {
        let table = document_table().unwrap();
        let note = table.item().field("note").unwrap();
        let out = compile_update(&[note.set("a").unwrap(), note.set("b").unwrap()]).unwrap();
        assert_eq!(out.expression, "SET #1=:1, #1=:2");
        assert_eq!(out.expression_attribute_names.len(), 1);
        verify_update(&out).unwrap();
    }

    #[test]
    fn test_should_increment_number() {
        let table = document_table().unwrap();
        let count = table.item().field("count").unwrap().as_number().unwrap();
        let out = compile_update(&[count.increment().unwrap()]).unwrap();
        assert_eq!(out.expression, "SET #1=#1+:1");
        assert_eq!(
            out.expression_attribute_values[":1"],
            AttributeValue::N("1".to_owned())
        );
        verify_update(&out).unwrap();
    }

    #[test]
    fn test_should_order_clauses_by_keyword() {
        let table = document_table().unwrap();
        let item = table.item();
        let tags = item.field("tags").unwrap().as_set().unwrap();
        let array = item.field("array").unwrap().as_list().unwrap();
        let actions = [
            item.field("note").unwrap().remove().unwrap(),
            tags.add(Value::set(["new"])).unwrap(),
            array.append(Value::list(["tail"])).unwrap(),
            tags.delete(Value::set(["old"])).unwrap(),
        ];
        let out = compile_update(&actions).unwrap();
        assert_eq!(
            out.expression,
            "SET #1=list_append(#1,:1) ADD #2 :2 DELETE #2 :3 REMOVE #3"
        );
        assert_eq!(
            out.expression_attribute_values[":2"],
            AttributeValue::Ss(vec!["new".to_owned()])
        );
        verify_update(&out).unwrap();
    }

    #[test]
    fn test_should_share_tables_between_update_and_condition() {
        let table = document_table().unwrap();
        let item = table.item();
        let count = item.field("count").unwrap().as_number().unwrap();
        let request = table
            .update_item(
                table.key("doc-1", Some(Value::from(1))).unwrap(),
                &[
                    count.set_if_not_exists(0).unwrap(),
                    item.field("nested").unwrap().field("a").unwrap().set("z").unwrap(),
                ],
                Some(&count.less_than(10).unwrap()),
            )
            .unwrap();
        assert_eq!(
            request.update_expression.as_deref(),
            Some("SET #1=if_not_exists(#1,:1), #2.#3=:2")
        );
        assert_eq!(request.condition_expression.as_deref(), Some("#1<:3"));
        assert_eq!(request.expression_attribute_names.len(), 3);
        assert_eq!(request.key["version"], AttributeValue::N("1".to_owned()));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["TableName"], "documents");
        assert_eq!(json["ExpressionAttributeValues"][":3"]["N"], "10");
    }

    #[test]
    fn test_should_reject_empty_action_list() {
        let table = document_table().unwrap();
        let err = table
            .update_item(table.key("doc-1", Some(Value::from(1))).unwrap(), &[], None)
            .unwrap_err();
        assert!(matches!(err, DynashapeError::Dsl(_)));
    }

    #[test]
    fn test_should_put_map_value() {
        let table = document_table().unwrap();
        let attrs = table.item().field("attrs").unwrap().as_map().unwrap();
        let out = compile_update(&[attrs.put("weight", 3).unwrap()]).unwrap();
        assert_eq!(out.expression, "SET #1.#2=:1");
        assert_eq!(out.expression_attribute_names["#2"], "weight");
    }
}
