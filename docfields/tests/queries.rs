mod common;

use common::{document, engine, field, query_ids};
use docfields::{EngineError, FilterExpr, Operator, Paging, SortOrder, SortSpec};
use serde_json::{Value, json};
use uuid::Uuid;

fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}

#[test]
fn numeric_sort_puts_missing_values_last_in_both_directions() {
    let engine = engine();
    let amount = field(&engine, "Amount", "number", json!({}));
    let ten = document(&engine, None, "ten");
    let missing = document(&engine, None, "missing");
    let two = document(&engine, None, "two");
    let cleared = document(&engine, None, "cleared");
    engine.put_value(ten.id, amount.id, &json!(10)).unwrap();
    engine.put_value(two.id, amount.id, &json!(2)).unwrap();
    engine.put_value(cleared.id, amount.id, &json!(5)).unwrap();
    engine.put_value(cleared.id, amount.id, &Value::Null).unwrap();

    let asc = query_ids(&engine, None, Some(&SortSpec::new(amount.id, SortOrder::Asc)));
    assert_eq!(&asc[..2], &[two.id, ten.id]);
    assert_eq!(sorted(asc[2..].to_vec()), sorted(vec![missing.id, cleared.id]));

    let desc = query_ids(&engine, None, Some(&SortSpec::new(amount.id, SortOrder::Desc)));
    assert_eq!(&desc[..2], &[ten.id, two.id]);
    assert_eq!(sorted(desc[2..].to_vec()), sorted(vec![missing.id, cleared.id]));
}

#[test]
fn text_sort_is_case_insensitive() {
    let engine = engine();
    let title = field(&engine, "Title", "short_text", json!({}));
    let bravo = document(&engine, None, "b");
    let alpha = document(&engine, None, "a");
    let charlie = document(&engine, None, "c");
    engine.put_value(bravo.id, title.id, &json!("bravo")).unwrap();
    engine.put_value(alpha.id, title.id, &json!("Alpha")).unwrap();
    engine.put_value(charlie.id, title.id, &json!("CHARLIE")).unwrap();

    let asc = query_ids(&engine, None, Some(&SortSpec::new(title.id, SortOrder::Asc)));
    assert_eq!(asc, vec![alpha.id, bravo.id, charlie.id]);
}

#[test]
fn date_sort_and_range_filters() {
    let engine = engine();
    let due = field(&engine, "Due", "date", json!({}));
    let march = document(&engine, None, "march");
    let january = document(&engine, None, "january");
    let december = document(&engine, None, "december");
    engine.put_value(march.id, due.id, &json!("2024-03-01")).unwrap();
    engine.put_value(january.id, due.id, &json!("2024-01-15")).unwrap();
    engine.put_value(december.id, due.id, &json!("2023-12-31")).unwrap();

    let desc = query_ids(&engine, None, Some(&SortSpec::new(due.id, SortOrder::Desc)));
    assert_eq!(desc, vec![march.id, january.id, december.id]);

    let in_2024 = FilterExpr::and([
        FilterExpr::condition(due.id, Operator::Gte, "2024-01-01"),
        FilterExpr::condition(due.id, Operator::Lt, "2024-03-01"),
    ]);
    assert_eq!(query_ids(&engine, Some(&in_2024), None), vec![january.id]);
}

#[test]
fn datetime_sort_orders_within_the_same_second() {
    let engine = engine();
    let seen = field(&engine, "Seen", "datetime", json!({}));
    // Created first, latest timestamp, so creation order is the reverse of value order.
    let docs: Vec<Uuid> = (1..=6)
        .rev()
        .map(|tenth| {
            let doc = document(&engine, None, &format!("tenth {tenth}"));
            engine
                .put_value(doc.id, seen.id, &json!(format!("2024-06-15T10:30:00.{tenth}00Z")))
                .unwrap();
            doc.id
        })
        .collect();
    let ascending: Vec<Uuid> = docs.iter().rev().copied().collect();

    let asc = query_ids(&engine, None, Some(&SortSpec::new(seen.id, SortOrder::Asc)));
    assert_eq!(asc, ascending);
    let desc = query_ids(&engine, None, Some(&SortSpec::new(seen.id, SortOrder::Desc)));
    assert_eq!(desc, docs);

    let later = FilterExpr::condition(seen.id, Operator::Gt, "2024-06-15T10:30:00.300Z");
    assert_eq!(sorted(query_ids(&engine, Some(&later), None)), sorted(ascending[3..].to_vec()));
    let at_or_before = FilterExpr::condition(seen.id, Operator::Lte, "2024-06-15T12:30:00.300+02:00");
    assert_eq!(sorted(query_ids(&engine, Some(&at_or_before), None)), sorted(ascending[..3].to_vec()));
}

#[test]
fn monetary_sort_is_numeric() {
    let engine = engine();
    let price = field(&engine, "Price", "monetary", json!({"currency": "EUR", "precision": 2}));
    let hundred = document(&engine, None, "hundred");
    let small = document(&engine, None, "small");
    let mid = document(&engine, None, "mid");
    engine.put_value(hundred.id, price.id, &json!("100.00")).unwrap();
    engine.put_value(small.id, price.id, &json!(3.5)).unwrap();
    engine.put_value(mid.id, price.id, &json!(22.9)).unwrap();

    let asc = query_ids(&engine, None, Some(&SortSpec::new(price.id, SortOrder::Asc)));
    assert_eq!(asc, vec![small.id, mid.id, hundred.id]);
    let desc = query_ids(&engine, None, Some(&SortSpec::new(price.id, SortOrder::Desc)));
    assert_eq!(desc, vec![hundred.id, mid.id, small.id]);
}

#[test]
fn yearmonth_sort_is_chronological() {
    let engine = engine();
    let period = field(&engine, "Period", "yearmonth", json!({}));
    let october = document(&engine, None, "october");
    let november = document(&engine, None, "november");
    let february = document(&engine, None, "february");
    let missing = document(&engine, None, "missing");
    engine.put_value(october.id, period.id, &json!("2024-10")).unwrap();
    engine.put_value(november.id, period.id, &json!("2023-11")).unwrap();
    engine.put_value(february.id, period.id, &json!("2024-02")).unwrap();

    let asc = query_ids(&engine, None, Some(&SortSpec::new(period.id, SortOrder::Asc)));
    assert_eq!(asc, vec![november.id, february.id, october.id, missing.id]);
    let desc = query_ids(&engine, None, Some(&SortSpec::new(period.id, SortOrder::Desc)));
    assert_eq!(desc, vec![october.id, february.id, november.id, missing.id]);
}

#[test]
fn boolean_sort_puts_false_first() {
    let engine = engine();
    let done = field(&engine, "Done", "boolean", json!({}));
    let finished = document(&engine, None, "finished");
    let missing = document(&engine, None, "missing");
    let open = document(&engine, None, "open");
    engine.put_value(finished.id, done.id, &json!(true)).unwrap();
    engine.put_value(open.id, done.id, &json!(false)).unwrap();

    let asc = query_ids(&engine, None, Some(&SortSpec::new(done.id, SortOrder::Asc)));
    assert_eq!(asc, vec![open.id, finished.id, missing.id]);
    let desc = query_ids(&engine, None, Some(&SortSpec::new(done.id, SortOrder::Desc)));
    assert_eq!(desc, vec![finished.id, open.id, missing.id]);
}

#[test]
fn paging_reports_total_and_more() {
    let engine = engine();
    let rank = field(&engine, "Rank", "integer", json!({}));
    let mut ids = Vec::new();
    for index in 0..5 {
        let doc = document(&engine, None, &format!("doc {index}"));
        engine.put_value(doc.id, rank.id, &json!(index)).unwrap();
        ids.push(doc.id);
    }
    let sort = SortSpec::new(rank.id, SortOrder::Asc);

    let first = engine.query_documents(None, Some(&sort), Paging::new(1, 2)).unwrap();
    assert_eq!(first.total, 5);
    assert!(first.has_more());
    assert_eq!(first.items.iter().map(|d| d.id).collect::<Vec<_>>(), ids[..2].to_vec());

    let last = engine.query_documents(None, Some(&sort), Paging::new(3, 2)).unwrap();
    assert!(!last.has_more());
    assert_eq!(last.items.iter().map(|d| d.id).collect::<Vec<_>>(), vec![ids[4]]);

    let beyond = engine.query_documents(None, Some(&sort), Paging::new(9, 2)).unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 5);
}

#[test]
fn far_out_pages_are_empty() {
    let engine = engine();
    document(&engine, None, "only");
    let result = engine.query_documents(None, None, Paging::new(u64::MAX, 100)).unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.total, 1);
    assert!(!result.has_more());
}

#[test]
fn page_size_is_clamped_to_the_configured_maximum() {
    let engine = engine();
    let max = engine.config().query.max_page_size;
    let result = engine.query_documents(None, None, Paging::new(0, max + 50)).unwrap();
    assert_eq!(result.page, 1);
    assert_eq!(result.page_size, max);
}

#[test]
fn ilike_treats_wildcards_literally() {
    let engine = engine();
    let note = field(&engine, "Note", "text", json!({}));
    let percent = document(&engine, None, "percent");
    let plain = document(&engine, None, "plain");
    engine.put_value(percent.id, note.id, &json!("Growth of 50% YoY")).unwrap();
    engine.put_value(plain.id, note.id, &json!("Growth of 500 units")).unwrap();

    let literal = FilterExpr::condition(note.id, Operator::ILike, "50%");
    assert_eq!(query_ids(&engine, Some(&literal), None), vec![percent.id]);

    let underscore = FilterExpr::condition(note.id, Operator::ILike, "of_5");
    assert!(query_ids(&engine, Some(&underscore), None).is_empty());

    let case_insensitive = FilterExpr::condition(note.id, Operator::ILike, "GROWTH");
    assert_eq!(
        sorted(query_ids(&engine, Some(&case_insensitive), None)),
        sorted(vec![percent.id, plain.id])
    );
}

#[test]
fn absent_values_match_is_null_but_not_ne() {
    let engine = engine();
    let status = field(&engine, "Status", "short_text", json!({}));
    let open = document(&engine, None, "open");
    let closed = document(&engine, None, "closed");
    let missing = document(&engine, None, "missing");
    engine.put_value(open.id, status.id, &json!("open")).unwrap();
    engine.put_value(closed.id, status.id, &json!("closed")).unwrap();

    let is_null = FilterExpr::condition(status.id, Operator::IsNull, Value::Null);
    assert_eq!(query_ids(&engine, Some(&is_null), None), vec![missing.id]);

    let is_not_null = FilterExpr::condition(status.id, Operator::IsNotNull, Value::Null);
    assert_eq!(
        sorted(query_ids(&engine, Some(&is_not_null), None)),
        sorted(vec![open.id, closed.id])
    );

    let ne = FilterExpr::condition(status.id, Operator::Ne, "open");
    assert_eq!(query_ids(&engine, Some(&ne), None), vec![closed.id]);

    let not_in = FilterExpr::condition(status.id, Operator::NotIn, json!(["closed"]));
    assert_eq!(query_ids(&engine, Some(&not_in), None), vec![open.id]);
}

#[test]
fn unchecked_includes_documents_without_a_value() {
    let engine = engine();
    let done = field(&engine, "Done", "boolean", json!({}));
    let checked = document(&engine, None, "checked");
    let unchecked = document(&engine, None, "unchecked");
    let missing = document(&engine, None, "missing");
    engine.put_value(checked.id, done.id, &json!(true)).unwrap();
    engine.put_value(unchecked.id, done.id, &json!(false)).unwrap();

    let is_checked = FilterExpr::condition(done.id, Operator::IsChecked, Value::Null);
    assert_eq!(query_ids(&engine, Some(&is_checked), None), vec![checked.id]);

    let is_not_checked = FilterExpr::condition(done.id, Operator::IsNotChecked, Value::Null);
    assert_eq!(
        sorted(query_ids(&engine, Some(&is_not_checked), None)),
        sorted(vec![unchecked.id, missing.id])
    );
}

#[test]
fn or_groups_combine_fields() {
    let engine = engine();
    let amount = field(&engine, "Amount", "monetary", json!({}));
    let owner = field(&engine, "Owner", "email", json!({}));
    let big = document(&engine, None, "big");
    let mine = document(&engine, None, "mine");
    let neither = document(&engine, None, "neither");
    engine.put_value(big.id, amount.id, &json!(1000)).unwrap();
    engine.put_value(mine.id, amount.id, &json!(5)).unwrap();
    engine.put_value(mine.id, owner.id, &json!("me@example.com")).unwrap();
    engine.put_value(neither.id, amount.id, &json!(1)).unwrap();

    let expr = FilterExpr::or([
        FilterExpr::condition(amount.id, Operator::Gt, 100),
        FilterExpr::condition(owner.id, Operator::Eq, "ME@example.com"),
    ]);
    assert_eq!(sorted(query_ids(&engine, Some(&expr), None)), sorted(vec![big.id, mine.id]));
}

#[test]
fn in_matches_any_listed_value() {
    let engine = engine();
    let rank = field(&engine, "Rank", "integer", json!({}));
    let docs: Vec<_> = (1..=3)
        .map(|rank_value| {
            let doc = document(&engine, None, &format!("rank {rank_value}"));
            engine.put_value(doc.id, rank.id, &json!(rank_value)).unwrap();
            doc.id
        })
        .collect();

    let expr = FilterExpr::condition(rank.id, Operator::In, json!([1, "3"]));
    assert_eq!(sorted(query_ids(&engine, Some(&expr), None)), sorted(vec![docs[0], docs[2]]));
}

#[test]
fn query_errors_are_typed() {
    let engine = engine();
    let done = field(&engine, "Done", "boolean", json!({}));

    let unsupported = FilterExpr::condition(done.id, Operator::Gt, true);
    match engine.query_documents(Some(&unsupported), None, Paging::default()) {
        Err(EngineError::UnsupportedOperator { type_id, operator }) => {
            assert_eq!(type_id, "boolean");
            assert_eq!(operator, "gt");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let unknown = FilterExpr::condition(Uuid::new_v4(), Operator::Eq, "x");
    assert!(matches!(
        engine.query_documents(Some(&unknown), None, Paging::default()),
        Err(EngineError::NotFound { .. })
    ));

    let unknown_sort = SortSpec::new(Uuid::new_v4(), SortOrder::Asc);
    assert!(matches!(
        engine.query_documents(None, Some(&unknown_sort), Paging::default()),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn deleted_fields_cannot_be_queried() {
    let engine = engine();
    let note = field(&engine, "Note", "text", json!({}));
    engine.delete_field(note.id).unwrap();
    let expr = FilterExpr::condition(note.id, Operator::Eq, "x");
    assert!(matches!(
        engine.query_documents(Some(&expr), None, Paging::default()),
        Err(EngineError::NotFound { .. })
    ));
}
