use bson::{Bson, Regex, doc, oid::ObjectId};
use mimic_query::{QueryError, compile_filter};
use mimic_value::Document;

fn do_filter(query: bson::Document, input: Vec<bson::Document>) -> Vec<bson::Document> {
    let predicate = compile_filter(&Document::from(query)).unwrap();
    input
        .into_iter()
        .filter(|d| predicate.matches(&Document::from(d.clone())).unwrap())
        .collect()
}

fn regex(pattern: &str) -> Bson {
    Bson::RegularExpression(Regex {
        pattern: pattern.into(),
        options: String::new(),
    })
}

fn date(ms: i64) -> bson::DateTime {
    bson::DateTime::from_millis(ms)
}

fn people() -> Vec<bson::Document> {
    vec![
        doc! { "a": null },
        doc! { "n": "neil", "a": 1 },
        doc! { "n": "fred", "a": 2 },
        doc! { "n": "ted", "a": 3 },
        doc! { "n": "stu", "a": 4 },
        doc! { "n": "tim", "a": 5 },
        doc! { "a": [3, 4] },
    ]
}

// ── Equality and conjunction ────────────────────────────────────

#[test]
fn simple_and_filter() {
    let results = do_filter(
        doc! { "a": 3, "n": "j" },
        vec![doc! { "a": 3 }, doc! { "a": [1, 3], "n": "j" }, doc! { "a": 3, "n": "j" }, doc! { "n": "j" }],
    );
    assert_eq!(results, vec![doc! { "a": [1, 3], "n": "j" }, doc! { "a": 3, "n": "j" }]);
}

#[test]
fn top_level_and() {
    let results = do_filter(
        doc! { "$and": [{ "a": 3 }, { "b": 4 }] },
        vec![
            doc! { "a": 3, "b": 4 },
            doc! { "a": 3, "b": 5 },
            doc! { "b": 4 },
            doc! { "a": 3 },
            doc! { "a": 5, "b": 4 },
        ],
    );
    assert_eq!(results, vec![doc! { "a": 3, "b": 4 }]);
}

#[test]
fn empty_query_matches_everything() {
    assert_eq!(do_filter(doc! {}, people()).len(), people().len());
}

#[test]
fn empty_document_value_matches_only_empty_document() {
    let results = do_filter(
        doc! { "a": {} },
        vec![doc! { "a": { "b": 1 } }, doc! { "a": {} }, doc! { "b": 1 }],
    );
    assert_eq!(results, vec![doc! { "a": {} }]);
}

#[test]
fn compound_object_in_query() {
    let oid = ObjectId::new();
    let results = do_filter(
        doc! { "a": { "b": oid } },
        vec![doc! { "a": null }, doc! { "a": { "b": oid } }, doc! { "a": { "b": oid, "c": 1 } }],
    );
    assert_eq!(results, vec![doc! { "a": { "b": oid } }]);
}

#[test]
fn lists_match_exactly_or_by_element() {
    let results = do_filter(
        doc! { "a": [1, 2, 3] },
        vec![
            doc! { "a": [] },
            doc! { "b": [] },
            doc! { "a": [1, 2, 3] },
            doc! { "a": [3, 2, 1] },
            doc! { "a": [[1, 2, 3], 4] },
        ],
    );
    assert_eq!(results, vec![doc! { "a": [1, 2, 3] }, doc! { "a": [[1, 2, 3], 4] }]);
}

#[test]
fn null_matches_missing_and_explicit_null() {
    let results = do_filter(doc! { "a": null }, vec![doc! { "a": null }, doc! { "b": 1 }, doc! { "a": 0 }]);
    assert_eq!(results, vec![doc! { "a": null }, doc! { "b": 1 }]);
}

#[test]
fn object_id_matches_its_hex_string() {
    let oid = ObjectId::new();
    let results = do_filter(doc! { "a": oid.to_hex() }, vec![doc! { "a": oid }, doc! { "a": "other" }]);
    assert_eq!(results, vec![doc! { "a": oid }]);
}

// ── Paths ───────────────────────────────────────────────────────

#[test]
fn embedded_match() {
    let results = do_filter(
        doc! { "a.b": 1 },
        vec![doc! { "a": 1 }, doc! { "b": 1 }, doc! { "a": { "b": 1 } }],
    );
    assert_eq!(results, vec![doc! { "a": { "b": 1 } }]);
}

#[test]
fn embedded_array_index() {
    let results = do_filter(
        doc! { "a.0.b": 1 },
        vec![doc! { "a": [{ "b": 2 }] }, doc! { "b": 1 }, doc! { "a": [{ "b": 1 }] }],
    );
    assert_eq!(results, vec![doc! { "a": [{ "b": 1 }] }]);
}

#[test]
fn embedded_array_objects() {
    let results = do_filter(
        doc! { "a.b.c": 1 },
        vec![
            doc! { "a": [{ "b": { "c": 1 } }] },
            doc! { "a": [{ "b": 1 }] },
            doc! { "a": [] },
        ],
    );
    assert_eq!(results, vec![doc! { "a": [{ "b": { "c": 1 } }] }]);

    let results = do_filter(doc! { "a.b": 1, "a.c": 1 }, vec![doc! { "a": [{ "b": 1, "c": 1 }] }]);
    assert_eq!(results.len(), 1);
}

#[test]
fn reference_id_path() {
    let rec = doc! { "a": { "$ref": "c", "$id": 1 } };
    let results = do_filter(doc! { "a.$id": 1 }, vec![rec.clone(), doc! { "a": { "$ref": "c", "$id": 2 } }]);
    assert_eq!(results, vec![rec]);

    let list = doc! { "a": [{ "$ref": "c", "$id": 1 }, { "$ref": "c", "$id": 2 }] };
    let results = do_filter(doc! { "a.$id": 1 }, vec![list.clone(), doc! { "a": [{ "$ref": "c", "$id": 2 }] }]);
    assert_eq!(results, vec![list]);
}

// ── Range operators ─────────────────────────────────────────────

#[test]
fn basic_range_operators() {
    let names = |query| -> Vec<Bson> {
        do_filter(query, people())
            .into_iter()
            .map(|d| d.get("n").cloned().unwrap_or(Bson::Null))
            .collect()
    };
    assert_eq!(names(doc! { "a": { "$gte": 4 } }), vec![Bson::from("stu"), Bson::from("tim"), Bson::Null]);
    assert_eq!(
        names(doc! { "a": { "$lte": 3 } }),
        vec![Bson::from("neil"), Bson::from("fred"), Bson::from("ted"), Bson::Null]
    );
    assert_eq!(names(doc! { "a": { "$gt": 4 } }), vec![Bson::from("tim")]);
    assert_eq!(names(doc! { "a": { "$lt": 3 } }), vec![Bson::from("neil"), Bson::from("fred")]);
    assert_eq!(names(doc! { "a": { "$gt": 3, "$lt": 5 } }), vec![Bson::from("stu"), Bson::Null]);
}

#[test]
fn range_through_array_of_documents() {
    let results = do_filter(
        doc! { "a.b": { "$gt": 2 } },
        vec![doc! { "a": [{ "b": 1 }, { "b": 2 }] }, doc! { "a": [{ "b": 2 }, { "b": 3 }] }],
    );
    assert_eq!(results, vec![doc! { "a": [{ "b": 2 }, { "b": 3 }] }]);
}

#[test]
fn date_range_skips_other_types() {
    let results = do_filter(
        doc! { "a": { "$lte": date(2) } },
        vec![doc! { "a": null }, doc! { "a": date(2) }, doc! { "a": date(1) }, doc! { "a": date(3) }],
    );
    assert_eq!(results, vec![doc! { "a": date(2) }, doc! { "a": date(1) }]);
}

#[test]
fn compound_document_range() {
    let query = doc! { "_id": {
        "$lt": { "n": "a", "t": date(10) },
        "$gte": { "n": "a", "t": date(1) },
    } };
    let input: Vec<_> = [1, 2, 3, 11]
        .into_iter()
        .map(|ms| doc! { "_id": { "n": "a", "t": date(ms) } })
        .collect();
    let results = do_filter(query, input.clone());
    assert_eq!(results, input[..3].to_vec());
}

#[test]
fn extrema_bound_every_type() {
    let input = vec![doc! { "a": 1 }, doc! { "a": "s" }, doc! { "a": null }];
    assert_eq!(do_filter(doc! { "a": { "$gt": Bson::MinKey } }, input.clone()).len(), 3);
    assert_eq!(do_filter(doc! { "a": { "$lt": Bson::MaxKey } }, input).len(), 3);
}

// ── $ne / $in / $nin / $all ─────────────────────────────────────

#[test]
fn ne_operator() {
    let results = do_filter(
        doc! { "a": { "$ne": 3 } },
        vec![doc! { "a": [1, 3] }, doc! { "a": 1 }, doc! { "a": 3 }, doc! { "b": 3 }, doc! { "a": [1, 2] }],
    );
    assert_eq!(results, vec![doc! { "a": 1 }, doc! { "b": 3 }, doc! { "a": [1, 2] }]);
}

#[test]
fn ne_through_array_of_documents() {
    let results = do_filter(
        doc! { "a.b": { "$ne": 2 } },
        vec![doc! { "a": [{ "b": 1 }, { "b": 2 }] }, doc! { "a": [{ "b": 3 }, { "b": 4 }] }],
    );
    assert_eq!(results, vec![doc! { "a": [{ "b": 3 }, { "b": 4 }] }]);
}

#[test]
fn in_operator() {
    let results = do_filter(
        doc! { "a": { "$in": [2, 3] } },
        vec![doc! { "a": [1, 3] }, doc! { "a": 1 }, doc! { "a": 3 }],
    );
    assert_eq!(results, vec![doc! { "a": [1, 3] }, doc! { "a": 3 }]);

    let results = do_filter(
        doc! { "a.b": { "$in": [2] } },
        vec![doc! { "a": [{ "b": 1 }, { "b": 2 }] }, doc! { "a": [{ "b": 3 }, { "b": 4 }] }],
    );
    assert_eq!(results, vec![doc! { "a": [{ "b": 1 }, { "b": 2 }] }]);
}

#[test]
fn in_with_regex_member() {
    let results = do_filter(
        doc! { "a": { "$in": [regex("^fo"), 7] } },
        vec![doc! { "a": "foo" }, doc! { "a": "bar" }, doc! { "a": 7 }],
    );
    assert_eq!(results, vec![doc! { "a": "foo" }, doc! { "a": 7 }]);
}

#[test]
fn object_ids_in_list() {
    let rec = doc! {
        "_id": ObjectId::parse_str("4f39d78d4b90b2f2f1530841").unwrap(),
        "c": [ObjectId::parse_str("4f39d78d4b90b2f2f153083b").unwrap()],
    };
    let query = doc! {
        "_id": { "$in": [
            ObjectId::parse_str("4f39d7904b90b2f2f1530849").unwrap(),
            ObjectId::parse_str("4f39d78d4b90b2f2f1530841").unwrap(),
        ] },
        "c": { "$in": [ObjectId::parse_str("4f39d78d4b90b2f2f153083b").unwrap()] },
    };
    assert_eq!(do_filter(query, vec![rec.clone()]), vec![rec]);
}

#[test]
fn nin_operator_ignores_integer_width() {
    let input = vec![doc! { "a": [1, 4] }, doc! { "a": [1, 3] }, doc! { "a": 1 }, doc! { "a": 3 }];
    let expected = vec![doc! { "a": [1, 4] }, doc! { "a": 1 }];
    assert_eq!(do_filter(doc! { "a": { "$nin": [2, 3] } }, input.clone()), expected);
    assert_eq!(do_filter(doc! { "a": { "$nin": [2_i64, 3_i64] } }, input), expected);
}

#[test]
fn nin_matches_missing_field() {
    let results = do_filter(
        doc! { "a": { "$nin": [2, 3] } },
        vec![doc! { "a": [1, 4] }, doc! { "a": [1, 3] }, doc! { "a": 1 }, doc! { "a": 3 }, doc! { "b": 3 }],
    );
    assert_eq!(results, vec![doc! { "a": [1, 4] }, doc! { "a": 1 }, doc! { "b": 3 }]);
}

#[test]
fn nin_through_array_of_documents() {
    let results = do_filter(
        doc! { "a.b": { "$nin": [2] } },
        vec![doc! { "a": [{ "b": 1 }, { "b": 2 }] }, doc! { "a": [{ "b": 3 }, { "b": 4 }] }],
    );
    assert_eq!(results, vec![doc! { "a": [{ "b": 3 }, { "b": 4 }] }]);
}

#[test]
fn all_operator() {
    let results = do_filter(
        doc! { "a": { "$all": [2, 3] } },
        vec![
            doc! { "a": [2, 3] },
            doc! { "a": null },
            doc! { "a": [1, 3, 4] },
            doc! { "a": [1, 2, 3] },
        ],
    );
    assert_eq!(results, vec![doc! { "a": [2, 3] }, doc! { "a": [1, 2, 3] }]);
}

#[test]
fn all_with_regex() {
    let results = do_filter(
        doc! { "_keywords": { "$all": ["john", regex("^doe")] } },
        vec![
            doc! { "_keywords": ["john", "more"] },
            doc! { "_keywords": ["tim", "norton"] },
            doc! { "_keywords": ["john", { "doe": "" }] },
            doc! { "_keywords": ["john", "doeson"] },
            doc! { "_keywords": ["john", "don"] },
            doc! { "_keywords": ["john", "doe"] },
        ],
    );
    assert_eq!(
        results,
        vec![doc! { "_keywords": ["john", "doeson"] }, doc! { "_keywords": ["john", "doe"] }]
    );
}

// ── $exists / $mod / $size ──────────────────────────────────────

#[test]
fn exists_counts_explicit_null() {
    let input = vec![doc! { "a": null }, doc! { "b": null }, doc! { "a": "hi" }, doc! { "b": "hi" }];
    assert_eq!(
        do_filter(doc! { "a": { "$exists": true } }, input.clone()),
        vec![doc! { "a": null }, doc! { "a": "hi" }]
    );
    assert_eq!(
        do_filter(doc! { "a": { "$exists": false } }, input),
        vec![doc! { "b": null }, doc! { "b": "hi" }]
    );
}

#[test]
fn mod_operator() {
    let results = do_filter(
        doc! { "a": { "$mod": [10, 1] } },
        vec![doc! { "a": 1 }, doc! { "a": null }, doc! { "a": 21 }, doc! { "a": 22 }],
    );
    assert_eq!(results, vec![doc! { "a": 1 }, doc! { "a": 21 }]);
}

#[test]
fn size_operator() {
    let results = do_filter(
        doc! { "a": { "$size": 3 } },
        vec![doc! { "a": null }, doc! { "a": [1, 2, 3] }, doc! { "a": [1, 2, 3, 4] }],
    );
    assert_eq!(results, vec![doc! { "a": [1, 2, 3] }]);
}

// ── $not / $or / $nor ───────────────────────────────────────────

#[test]
fn not_of_operator_document() {
    let results = do_filter(
        doc! { "a": { "$not": { "$nin": [2, 3] } } },
        vec![doc! { "a": [1, 4] }, doc! { "a": [1, 3] }, doc! { "a": 1 }, doc! { "a": 3 }],
    );
    assert_eq!(results, vec![doc! { "a": [1, 3] }, doc! { "a": 3 }]);
}

#[test]
fn not_of_literal() {
    let results = do_filter(
        doc! { "a": { "$not": 3 } },
        vec![doc! { "a": [1, 4] }, doc! { "a": [1, 3] }, doc! { "a": 1 }, doc! { "a": 3 }],
    );
    assert_eq!(results, vec![doc! { "a": [1, 4] }, doc! { "a": 1 }]);
}

#[test]
fn not_of_regex() {
    let results = do_filter(doc! { "a": { "$not": regex("^f") } }, vec![doc! { "a": "foo" }, doc! { "a": "bar" }]);
    assert_eq!(results, vec![doc! { "a": "bar" }]);
}

#[test]
fn or_with_ne_matches_missing() {
    let results = do_filter(
        doc! { "$or": [{ "a": 3 }, { "b": { "$ne": 3 } }] },
        vec![
            doc! { "a": 3, "b": 1 },
            doc! { "a": 1, "b": 3 },
            doc! { "a": 1, "b": 1 },
            doc! { "a": 3 },
            doc! { "b": 1 },
            doc! { "a": 5 },
            doc! { "b": 3 },
        ],
    );
    assert_eq!(
        results,
        vec![doc! { "a": 3, "b": 1 }, doc! { "a": 1, "b": 1 }, doc! { "a": 3 }, doc! { "b": 1 }, doc! { "a": 5 }]
    );
}

#[test]
fn nested_or() {
    let results = do_filter(
        doc! { "$or": [{ "a": 3 }, { "$or": [{ "b": 1 }, { "b": 3 }] }] },
        vec![
            doc! { "a": 3, "b": 1 },
            doc! { "a": 1, "b": 3 },
            doc! { "a": 1, "b": 7 },
            doc! { "a": 3 },
            doc! { "b": 1 },
            doc! { "a": 5 },
            doc! { "b": 7 },
        ],
    );
    assert_eq!(
        results,
        vec![doc! { "a": 3, "b": 1 }, doc! { "a": 1, "b": 3 }, doc! { "a": 3 }, doc! { "b": 1 }]
    );
}

#[test]
fn nor_operator() {
    let results = do_filter(
        doc! { "$nor": [{ "a": 1 }, { "b": 2 }] },
        vec![doc! { "a": 1 }, doc! { "b": 2 }, doc! { "a": 2, "b": 1 }],
    );
    assert_eq!(results, vec![doc! { "a": 2, "b": 1 }]);
}

// ── Regex ───────────────────────────────────────────────────────

#[test]
fn regex_literal() {
    let results = do_filter(
        doc! { "a": regex("^foo") },
        vec![
            doc! { "a": 1 },
            doc! { "a": null },
            doc! { "a": "fooSter" },
            doc! { "a": "funky foo" },
            doc! { "a": ["foomania", "notfoo"] },
        ],
    );
    assert_eq!(results, vec![doc! { "a": "fooSter" }, doc! { "a": ["foomania", "notfoo"] }]);
}

#[test]
fn regex_operator_with_dot_all() {
    let query = doc! { "a": { "$regex": "foo.*Ster", "$options": "s" } };
    assert_eq!(do_filter(query, vec![doc! { "a": "foo\nSter" }]).len(), 1);
    let plain = doc! { "a": { "$regex": "foo.*Ster" } };
    assert!(do_filter(plain, vec![doc! { "a": "foo\nSter" }]).is_empty());
}

#[test]
fn regex_through_array_of_documents() {
    let rec = doc! { "a": [{ "b": "bar" }, { "b": "fooBar" }] };
    assert_eq!(do_filter(doc! { "a.b": regex("^foo") }, vec![rec.clone()]), vec![rec]);
}

// ── $elemMatch / $eq ────────────────────────────────────────────

#[test]
fn elem_match_with_operators() {
    let results = do_filter(
        doc! { "a": { "$elemMatch": { "$gt": 2, "$lt": 5 } } },
        vec![doc! { "a": [1, 6] }, doc! { "a": [1, 3] }, doc! { "a": 3 }],
    );
    assert_eq!(results, vec![doc! { "a": [1, 3] }]);
}

#[test]
fn elem_match_with_query() {
    let results = do_filter(
        doc! { "items": { "$elemMatch": { "sku": "A", "qty": { "$gte": 2 } } } },
        vec![
            doc! { "items": [{ "sku": "A", "qty": 1 }, { "sku": "B", "qty": 5 }] },
            doc! { "items": [{ "sku": "A", "qty": 3 }] },
        ],
    );
    assert_eq!(results, vec![doc! { "items": [{ "sku": "A", "qty": 3 }] }]);
}

#[test]
fn explicit_eq() {
    let results = do_filter(doc! { "a": { "$eq": 2 } }, vec![doc! { "a": 2.0 }, doc! { "a": 3 }]);
    assert_eq!(results, vec![doc! { "a": 2.0 }]);
}

#[test]
fn non_operator_keys_in_operator_document_are_ignored() {
    let zero = ObjectId::parse_str("000000000000000000000000").unwrap();
    let rec1 = doc! { "_id": { "u": 1, "v": ObjectId::new() }, "c": 1 };
    let rec2 = doc! { "_id": { "u": 1, "v": ObjectId::new() }, "c": 1 };
    let query = doc! { "_id": {
        "$gte": { "u": 1, "v": zero },
        "$lte": { "u": 2, "v": zero },
        "c": { "$gt": 0 },
    } };
    assert_eq!(do_filter(query, vec![rec1.clone(), rec2.clone()]), vec![rec1, rec2]);
}

// ── $where ──────────────────────────────────────────────────────

#[test]
fn where_expression() {
    let results = do_filter(doc! { "$where": "this.n == 'fred'" }, people());
    assert_eq!(results, vec![doc! { "n": "fred", "a": 2 }]);

    let results = do_filter(doc! { "$where": "this.a <= 3" }, people());
    assert_eq!(
        results,
        vec![
            doc! { "a": null },
            doc! { "n": "neil", "a": 1 },
            doc! { "n": "fred", "a": 2 },
            doc! { "n": "ted", "a": 3 },
        ]
    );
}

#[test]
fn where_function() {
    let results = do_filter(
        doc! { "$where": "function() return this.a == 5 end" },
        people(),
    );
    assert_eq!(results, vec![doc! { "n": "tim", "a": 5 }]);
}

#[test]
fn where_runtime_error_surfaces() {
    let predicate = compile_filter(&Document::from(doc! { "$where": "this.a.b.c" })).unwrap();
    let err = predicate.matches(&Document::from(doc! { "a": 1 })).unwrap_err();
    assert!(matches!(err, QueryError::Script(ref e) if e.script == "this.a.b.c"));
}

// ── Errors ──────────────────────────────────────────────────────

#[test]
fn malformed_queries_fail_at_compile_time() {
    for query in [
        doc! { "a": { "$foo": 1 } },
        doc! { "$bogus": [] },
        doc! { "$or": "x" },
        doc! { "a": { "$regex": "[" } },
        doc! { "a": { "$mod": [0, 0] } },
        doc! { "a": { "$all": 3 } },
    ] {
        assert!(
            matches!(compile_filter(&Document::from(query.clone())), Err(QueryError::Malformed(_))),
            "expected {query} to be rejected"
        );
    }
}
