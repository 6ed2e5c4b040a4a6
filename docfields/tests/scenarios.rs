//! Concrete end-to-end behaviours of the built-in field types.

mod common;

use common::{document, document_type, engine, field, query_ids};
use docfields::{EngineError, FilterExpr, Operator};
use serde_json::json;

#[test]
fn text_longer_than_max_length_is_truncated() {
    let engine = engine();
    let notes = field(&engine, "Notes", "text", json!({"max_length": 5}));
    let doc = document(&engine, None, "Doc");

    let stored = engine.put_value(doc.id, notes.id, &json!("UPPERCASE TEXT")).unwrap();
    assert_eq!(stored.envelope.raw, json!("UPPER"));
    assert_eq!(stored.envelope.sortable.as_deref(), Some("upper"));
    assert_eq!(stored.envelope.metadata["truncated"], json!(true));
    assert_eq!(stored.envelope.metadata["original_length"], json!(14));
    assert_eq!(stored.projections.value_text.as_deref(), Some("upper"));
}

#[test]
fn monetary_rounds_half_away_from_zero() {
    let engine = engine();
    let price = field(&engine, "Price", "monetary", json!({"currency": "EUR", "precision": 2}));
    let doc = document(&engine, None, "Invoice");

    let stored = engine.put_value(doc.id, price.id, &json!("22.895")).unwrap();
    assert_eq!(stored.envelope.raw, json!(22.9));
    assert_eq!(stored.envelope.sortable.as_deref(), Some("22.90"));
    assert_eq!(stored.envelope.metadata["currency"], json!("EUR"));
    assert_eq!(stored.envelope.metadata["symbol"], json!("€"));
    assert_eq!(stored.projections.value_numeric, Some(22.9));
}

#[test]
fn date_bounds_are_enforced() {
    let engine = engine();
    let due = field(
        &engine,
        "Due",
        "date",
        json!({"min_date": "2024-01-01", "max_date": "2024-12-31"}),
    );
    let doc = document(&engine, None, "Doc");

    let stored = engine.put_value(doc.id, due.id, &json!("2024-06-15")).unwrap();
    assert_eq!(stored.projections.value_date.as_deref(), Some("2024-06-15"));

    let err = engine.put_value(doc.id, due.id, &json!("2023-12-31")).unwrap_err();
    match err {
        EngineError::InvalidValue { field_id, message } => {
            assert_eq!(field_id, due.id);
            assert_eq!(message, "Date must be on or after 2024-01-01");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn select_filters_on_option_value_not_label() {
    let engine = engine();
    let department = field(
        &engine,
        "Department",
        "select",
        json!({"options": [
            {"value": "hr", "label": "Human Resources"},
            {"value": "dev", "label": "Development"}
        ]}),
    );
    let hr = document(&engine, None, "HR doc");
    let dev = document(&engine, None, "Dev doc");
    let stored = engine.put_value(hr.id, department.id, &json!("hr")).unwrap();
    engine.put_value(dev.id, department.id, &json!("dev")).unwrap();
    assert_eq!(stored.projections.value_text.as_deref(), Some("human resources"));

    let by_value = FilterExpr::condition(department.id, Operator::Eq, "hr");
    assert_eq!(query_ids(&engine, Some(&by_value), None), vec![hr.id]);

    let by_label = FilterExpr::condition(department.id, Operator::Eq, "human resources");
    assert!(query_ids(&engine, Some(&by_label), None).is_empty());
}

#[test]
fn multiselect_any_matches_overlap() {
    let engine = engine();
    let tags = field(&engine, "Tags", "multiselect", json!({"options": ["hr", "dev", "legal"]}));
    let overlapping = document(&engine, None, "legal+dev");
    let disjoint = document(&engine, None, "legal");
    engine.put_value(overlapping.id, tags.id, &json!(["legal", "dev"])).unwrap();
    engine.put_value(disjoint.id, tags.id, &json!(["legal"])).unwrap();

    let any = FilterExpr::condition(tags.id, Operator::Any, json!(["hr", "dev"]));
    assert_eq!(query_ids(&engine, Some(&any), None), vec![overlapping.id]);

    let all = FilterExpr::condition(tags.id, Operator::All, json!(["legal", "dev"]));
    assert_eq!(query_ids(&engine, Some(&all), None), vec![overlapping.id]);

    let not = FilterExpr::condition(tags.id, Operator::Not, json!(["dev"]));
    assert_eq!(query_ids(&engine, Some(&not), None), vec![disjoint.id]);
}

#[test]
fn boolean_coerces_truthy_words_and_numbers() {
    let engine = engine();
    let approved = field(&engine, "Approved", "boolean", json!({}));
    let doc = document(&engine, None, "Doc");

    let yes = engine.put_value(doc.id, approved.id, &json!("yes")).unwrap();
    assert_eq!(yes.envelope.raw, json!(true));
    assert_eq!(yes.envelope.sortable.as_deref(), Some("1"));
    assert_eq!(yes.projections.value_boolean, Some(true));

    let zero = engine.put_value(doc.id, approved.id, &json!(0)).unwrap();
    assert_eq!(zero.envelope.raw, json!(false));
    assert_eq!(zero.envelope.sortable.as_deref(), Some("0"));
    assert_eq!(zero.projections.value_boolean, Some(false));
}

#[test]
fn resetting_field_list_reorders_and_hides_dropped_fields() {
    let engine = engine();
    let f1 = field(&engine, "F1", "text", json!({}));
    let f2 = field(&engine, "F2", "text", json!({}));
    let f3 = field(&engine, "F3", "text", json!({}));
    let doc_type = document_type(&engine, "D", &[&f1, &f2, &f3]);
    let doc = document(&engine, Some(&doc_type), "Doc");
    for (field, value) in [(&f1, "one"), (&f2, "two"), (&f3, "three")] {
        engine.put_value(doc.id, field.id, &json!(value)).unwrap();
    }

    let updated = engine.set_document_type_fields(doc_type.id, &[f3.id, f1.id]).unwrap();
    let positions: Vec<_> = updated.fields.iter().map(|f| (f.field_id, f.position)).collect();
    assert_eq!(positions, vec![(f3.id, 0), (f1.id, 1)]);

    let values = engine.get_values(doc.id).unwrap();
    let visible: Vec<_> = values.iter().map(|v| (v.field_id, v.value.clone())).collect();
    assert_eq!(visible, vec![(f3.id, json!("three")), (f1.id, json!("one"))]);

    // Still stored, just not bound.
    let hidden = engine.get_value(doc.id, f2.id).unwrap().unwrap();
    assert_eq!(hidden.value, json!("two"));
    assert_eq!(hidden.position, None);
}
