mod common;

use common::{document, document_type, engine, field};
use docfields::EngineError;
use serde_json::{Value, json};
use uuid::Uuid;

#[test]
fn bulk_write_is_all_or_nothing() {
    let engine = engine();
    let age = field(&engine, "Age", "integer", json!({"min_value": 0}));
    let email = field(&engine, "Email", "email", json!({}));
    let name = field(&engine, "Name", "short_text", json!({}));
    let doc = document(&engine, None, "Doc");

    let err = engine
        .put_values_bulk(
            doc.id,
            [
                (name.id, json!("Ada")),
                (age.id, json!(-3)),
                (email.id, json!("not-an-email")),
            ],
        )
        .unwrap_err();
    let EngineError::Validation(errors) = err else {
        panic!("expected aggregated validation error");
    };
    let mut rejected: Vec<_> = errors.issues.iter().map(|issue| issue.field.clone()).collect();
    rejected.sort();
    let mut expected = vec![age.id.to_string(), email.id.to_string()];
    expected.sort();
    assert_eq!(rejected, expected);
    assert!(errors.issues.iter().all(|issue| issue.code == "validation.value"));

    // The valid value was not written either.
    assert!(engine.get_value(doc.id, name.id).unwrap().is_none());

    let written = engine
        .put_values_bulk(
            doc.id,
            [
                (name.id, json!("Ada")),
                (age.id, json!(36)),
                (email.id, json!("Ada@Example.com")),
            ],
        )
        .unwrap();
    assert_eq!(written, 3);
    assert_eq!(engine.get_value(doc.id, email.id).unwrap().unwrap().value, json!("ada@example.com"));
}

#[test]
fn bulk_write_reports_unknown_fields() {
    let engine = engine();
    let doc = document(&engine, None, "Doc");
    let missing = Uuid::new_v4();
    let err = engine.put_values_bulk(doc.id, [(missing, json!(1))]).unwrap_err();
    let EngineError::Validation(errors) = err else {
        panic!("expected aggregated validation error");
    };
    assert_eq!(errors.issues[0].field, missing.to_string());
    assert_eq!(errors.issues[0].code, "validation.unknown_field");
}

#[test]
fn writes_to_missing_documents_or_fields_are_not_found() {
    let engine = engine();
    let age = field(&engine, "Age", "integer", json!({}));
    let doc = document(&engine, None, "Doc");
    assert!(matches!(
        engine.put_value(Uuid::new_v4(), age.id, &json!(1)),
        Err(EngineError::NotFound { entity: "document", .. })
    ));
    assert!(matches!(
        engine.put_value(doc.id, Uuid::new_v4(), &json!(1)),
        Err(EngineError::NotFound { entity: "custom field", .. })
    ));
}

#[test]
fn rewrite_replaces_value_and_keeps_created_at() {
    let engine = engine();
    let age = field(&engine, "Age", "integer", json!({}));
    let doc = document(&engine, None, "Doc");

    let first = engine.put_value(doc.id, age.id, &json!(1)).unwrap();
    let second = engine.put_value(doc.id, age.id, &json!("2")).unwrap();
    assert_eq!(second.envelope.raw, json!(2));
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
}

#[test]
fn same_envelope_yields_same_projections() {
    let engine = engine();
    let when = field(&engine, "When", "datetime", json!({}));
    let doc = document(&engine, None, "Doc");

    let first = engine.put_value(doc.id, when.id, &json!("2024-06-15T10:30:00+02:00")).unwrap();
    let second = engine.put_value(doc.id, when.id, &json!("2024-06-15 08:30:00")).unwrap();
    assert_eq!(first.envelope, second.envelope);
    assert_eq!(first.projections, second.projections);
    assert_eq!(first.projections.value_datetime.as_deref(), Some("2024-06-15 08:30:00.000000"));
}

#[test]
fn deleting_a_document_removes_its_values() {
    let engine = engine();
    let age = field(&engine, "Age", "integer", json!({}));
    let doc = document(&engine, None, "Doc");
    engine.put_value(doc.id, age.id, &json!(5)).unwrap();

    engine.delete_document(doc.id).unwrap();
    assert!(matches!(engine.get_document(doc.id), Err(EngineError::NotFound { .. })));
    assert!(matches!(engine.delete_document(doc.id), Err(EngineError::NotFound { .. })));
}

#[test]
fn values_round_trip_through_every_type() {
    let engine = engine();
    let cases = [
        ("short_text", json!({}), json!("  padded  "), json!("padded")),
        ("integer", json!({}), json!("42"), json!(42)),
        ("number", json!({"precision": 1}), json!(3.14159), json!(3.1)),
        ("monetary", json!({"currency": "USD"}), json!("USD 10"), json!(10.0)),
        ("boolean", json!({}), json!("On"), json!(true)),
        ("date", json!({}), json!("2024-02-29T12:00:00Z"), json!("2024-02-29")),
        ("datetime", json!({}), json!("2024-02-29T12:00:00Z"), json!("2024-02-29T12:00:00Z")),
        ("yearmonth", json!({}), json!("2024-02"), json!("2024-02")),
        ("select", json!({"options": ["a", "b"]}), json!("b"), json!("b")),
        ("multiselect", json!({"options": ["a", "b"]}), json!(["b", "a", "b"]), json!(["b", "a"])),
        ("url", json!({}), json!(" https://example.com/x "), json!("https://example.com/x")),
        ("email", json!({}), json!("Bob@Example.COM"), json!("bob@example.com")),
    ];

    let doc = document(&engine, None, "Doc");
    for (index, (type_id, config, input, expected)) in cases.into_iter().enumerate() {
        let custom = field(&engine, &format!("field {index}"), type_id, config);
        engine
            .put_value(doc.id, custom.id, &input)
            .unwrap_or_else(|err| panic!("{type_id}: {err}"));
        let read = engine.get_value(doc.id, custom.id).unwrap().unwrap();
        assert_eq!(read.value, expected, "{type_id}");
    }
}

#[test]
fn get_values_requires_a_bound_type() {
    let engine = engine();
    let note = field(&engine, "Note", "text", json!({}));
    let untyped = document(&engine, None, "Loose");
    engine.put_value(untyped.id, note.id, &json!("hello")).unwrap();
    assert!(engine.get_values(untyped.id).unwrap().is_empty());

    let doc_type = document_type(&engine, "Memo", &[&note]);
    let typed = document(&engine, Some(&doc_type), "Typed");
    engine.put_value(typed.id, note.id, &Value::Null).unwrap();
    let values = engine.get_values(typed.id).unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, Value::Null);
    assert_eq!(values[0].position, Some(0));
}

#[test]
fn date_like_words_and_day_numbers_are_plain_text() {
    let engine = engine();
    let notes = field(&engine, "Notes", "text", json!({}));
    let state = field(&engine, "State", "select", json!({"options": ["now", "later"]}));
    let doc = document(&engine, None, "Doc");

    let now = engine.put_value(doc.id, notes.id, &json!("now")).unwrap();
    assert_eq!(now.projections.value_text.as_deref(), Some("now"));
    assert!(now.projections.value_date.is_none());
    assert!(now.projections.value_datetime.is_none());

    let day_number = engine.put_value(doc.id, notes.id, &json!("2460000")).unwrap();
    assert!(day_number.projections.value_date.is_none());
    assert!(day_number.projections.value_numeric.is_none());

    let selected = engine.put_value(doc.id, state.id, &json!("now")).unwrap();
    assert!(selected.projections.value_date.is_none());
    assert_eq!(engine.get_value(doc.id, state.id).unwrap().unwrap().value, json!("now"));
}
