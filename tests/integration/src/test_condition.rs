//! Condition expressions built through the table facade.

#[cfg(test)]
mod tests {
    use dynashape_core::expression::{compile_condition, verify_condition};
    use dynashape_core::{Condition, Ordered};
    use dynashape_model::AttributeValue;

    use crate::document_table;

    #[test]
    fn test_should_compile_equality_on_top_level_field() {
        let table = document_table().unwrap();
        let id = table.item().field("id").unwrap();
        let out = compile_condition(&id.equals("doc-1").unwrap());
        assert_eq!(out.expression, "#1=:1");
        assert_eq!(out.expression_attribute_names["#1"], "id");
        assert_eq!(
            out.expression_attribute_values[":1"],
            AttributeValue::S("doc-1".to_owned())
        );
        verify_condition(&out).unwrap();
    }

    #[test]
    fn test_should_compile_list_index_access() {
        let table = document_table().unwrap();
        let first = table.item().field("array").unwrap().get(0).unwrap();
        let out = compile_condition(&first.equals("x").unwrap());
        assert_eq!(out.expression, "#1[0]=:1");
        assert_eq!(out.expression_attribute_names["#1"], "array");
        verify_condition(&out).unwrap();
    }

    #[test]
    fn test_should_compare_two_paths_without_values() {
        let table = document_table().unwrap();
        let item = table.item();
        let nested_a = item.field("nested").unwrap().field("a").unwrap();
        let first = item.field("array").unwrap().get(0).unwrap();
        let out = compile_condition(&nested_a.equals(&first).unwrap());
        assert_eq!(out.expression, "#1.#2=#3[0]");
        assert!(out.expression_attribute_values.is_empty());
        assert!(out.values().is_none());
        assert_eq!(out.expression_attribute_names["#2"], "a");
        verify_condition(&out).unwrap();
    }

    #[test]
    fn test_should_group_conjunction_and_intern_names() {
        let table = document_table().unwrap();
        let item = table.item();
        let id = item.field("id").unwrap();
        let count = item.field("count").unwrap().as_number().unwrap();
        let cond = id
            .equals("a")
            .unwrap()
            .and(count.greater_than(2).unwrap())
            .or(id.equals("b").unwrap());
        let out = compile_condition(&cond);
        assert_eq!(out.expression, "((#1=:1 AND #2>:2) OR #1=:3)");
        assert_eq!(out.expression_attribute_names.len(), 2);
        verify_condition(&out).unwrap();
    }

    #[test]
    fn test_should_compile_functions_and_negation() {
        let table = document_table().unwrap();
        let item = table.item();
        let tags = item.field("tags").unwrap().as_set().unwrap();
        let id = item.field("id").unwrap().as_string().unwrap();
        let cond = Condition::all([
            tags.contains("red").unwrap(),
            id.begins_with("doc-").unwrap(),
            !item.field("note").unwrap().exists(),
        ])
        .unwrap();
        let out = compile_condition(&cond);
        assert_eq!(
            out.expression,
            "(contains(#1,:1) AND begins_with(#2,:2) AND NOT (attribute_exists(#3)))"
        );
        verify_condition(&out).unwrap();
    }

    #[test]
    fn test_should_encode_literals_with_field_mapper() {
        let table = document_table().unwrap();
        let count = table.item().field("count").unwrap().as_number().unwrap();
        let out = compile_condition(&count.between(1, 2.5).unwrap());
        assert_eq!(out.expression, "#1 BETWEEN :1 AND :2");
        assert_eq!(
            out.expression_attribute_values[":2"],
            AttributeValue::N("2.5".to_owned())
        );
    }

    #[test]
    fn test_should_reject_wrong_literal_type() {
        let table = document_table().unwrap();
        let count = table.item().field("count").unwrap();
        assert!(count.equals("not a number").is_err());
    }

    #[test]
    fn test_should_reject_unknown_field() {
        let table = document_table().unwrap();
        let err = table.item().field("missing").unwrap_err();
        assert!(err.to_string().contains("missing"), "{err}");
    }
}
