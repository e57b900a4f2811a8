//! Property-based tests for the filter language.
//!
//! Uses proptest to generate random filter trees and documents, checking
//! the invariants that must hold for every input: parse/unparse
//! round-trips, logical-operator decomposition, empty-filter identity,
//! and case-insensitive equality.

use proptest::prelude::*;
use serde_json::{json, Value};

use scim_protocol::filter::ast::{AttrExpr, AttrPath, CompareOp, Filter, Literal};
use scim_protocol::filter::{evaluate, parse_filter};

fn attr_name() -> impl Strategy<Value = String> {
    // A small alphabet so generated filters actually hit generated
    // documents; includes keyword-shaped names on purpose.
    prop_oneof![
        "[a-e]",
        "[a-e][a-e0-9_]{1,6}",
        Just("and".to_string()),
        Just("not".to_string()),
        Just("pr".to_string()),
    ]
}

fn op_strategy() -> impl Strategy<Value = CompareOp> {
    prop::sample::select(vec![
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Co,
        CompareOp::Sw,
        CompareOp::Ew,
        CompareOp::Gt,
        CompareOp::Ge,
        CompareOp::Lt,
        CompareOp::Le,
    ])
}

fn literal_strategy() -> impl Strategy<Value = Literal> {
    prop_oneof![
        "[ -~]{0,10}".prop_map(Literal::Str),
        any::<i32>().prop_map(|n| Literal::Num(f64::from(n))),
        any::<i16>().prop_map(|n| Literal::Num(f64::from(n) / 8.0)),
        any::<bool>().prop_map(Literal::Bool),
        Just(Literal::Null),
    ]
}

fn simple_path() -> impl Strategy<Value = AttrPath> {
    (attr_name(), prop::collection::vec(attr_name(), 0..2)).prop_map(|(attribute, subs)| {
        AttrPath {
            attribute,
            value_filter: None,
            sub_attributes: subs,
        }
    })
}

fn filter_strategy() -> impl Strategy<Value = Filter> {
    let leaf = prop_oneof![
        (simple_path(), op_strategy(), literal_strategy())
            .prop_map(|(path, op, value)| Filter::Compare(AttrExpr { path, op, value })),
        simple_path().prop_map(Filter::Present),
    ];
    leaf.prop_recursive(3, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Filter::And(Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Filter::Or(Box::new(l), Box::new(r))),
            inner.clone().prop_map(|f| Filter::Not(Box::new(f))),
            inner.clone().prop_map(|f| Filter::Group(Box::new(f))),
            // value-path leaves: a[inner].sub op literal
            (attr_name(), inner, attr_name(), op_strategy(), literal_strategy()).prop_map(
                |(attribute, f, sub, op, value)| {
                    Filter::Compare(AttrExpr {
                        path: AttrPath {
                            attribute,
                            value_filter: Some(Box::new(f)),
                            sub_attributes: vec![sub],
                        },
                        op,
                        value,
                    })
                }
            ),
        ]
    })
}

fn scalar_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[ -~]{0,8}".prop_map(|s| json!(s)),
        any::<i32>().prop_map(|n| json!(n)),
        any::<bool>().prop_map(|b| json!(b)),
        Just(Value::Null),
    ]
}

fn document_strategy() -> impl Strategy<Value = Value> {
    // Flat-ish documents over the same attribute alphabet the filters
    // draw from, with some multi-valued and complex attributes.
    let member = prop_oneof![
        scalar_value(),
        prop::collection::vec(scalar_value(), 0..3).prop_map(Value::Array),
        prop::collection::hash_map("[a-e]", scalar_value(), 0..3)
            .prop_map(|m| json!(m)),
    ];
    prop::collection::hash_map(attr_name(), member, 0..5).prop_map(|m| json!(m))
}

proptest! {
    // parse(unparse(a)) == a, modulo Group wrappers
    #[test]
    fn round_trip_modulo_groups(filter in filter_strategy()) {
        let rendered = filter.to_string();
        let reparsed = parse_filter(&rendered)
            .unwrap_or_else(|e| panic!("{:?} failed to reparse: {}", rendered, e));
        prop_assert_eq!(reparsed.without_groups(), filter.without_groups());
    }

    #[test]
    fn and_decomposes(a in filter_strategy(), b in filter_strategy(), doc in document_strategy()) {
        let composite = Filter::And(Box::new(a.clone()), Box::new(b.clone()));
        prop_assert_eq!(evaluate(&composite, &doc), evaluate(&a, &doc) && evaluate(&b, &doc));
    }

    #[test]
    fn or_decomposes(a in filter_strategy(), b in filter_strategy(), doc in document_strategy()) {
        let composite = Filter::Or(Box::new(a.clone()), Box::new(b.clone()));
        prop_assert_eq!(evaluate(&composite, &doc), evaluate(&a, &doc) || evaluate(&b, &doc));
    }

    #[test]
    fn not_inverts(a in filter_strategy(), doc in document_strategy()) {
        let negated = Filter::Not(Box::new(a.clone()));
        prop_assert_eq!(evaluate(&negated, &doc), !evaluate(&a, &doc));
    }

    #[test]
    fn group_is_transparent(a in filter_strategy(), doc in document_strategy()) {
        let grouped = Filter::Group(Box::new(a.clone()));
        prop_assert_eq!(evaluate(&grouped, &doc), evaluate(&a, &doc));
    }

    #[test]
    fn empty_filter_matches_all(doc in document_strategy()) {
        prop_assert!(evaluate(&Filter::Empty, &doc));
    }

    #[test]
    fn eq_is_case_insensitive(
        attr in attr_name(),
        value in "[a-zA-Z]{1,8}",
        doc in document_strategy(),
    ) {
        let build = |literal: String| {
            Filter::Compare(AttrExpr {
                path: AttrPath {
                    attribute: attr.clone(),
                    value_filter: None,
                    sub_attributes: vec![],
                },
                op: CompareOp::Eq,
                value: Literal::Str(literal),
            })
        };
        let upper = build(value.to_uppercase());
        let lower = build(value.to_lowercase());
        prop_assert_eq!(evaluate(&upper, &doc), evaluate(&lower, &doc));
    }

    // Rendering and reparsing never changes what a filter matches.
    #[test]
    fn round_trip_preserves_semantics(filter in filter_strategy(), doc in document_strategy()) {
        let reparsed = parse_filter(&filter.to_string()).expect("round trip parse");
        prop_assert_eq!(evaluate(&reparsed, &doc), evaluate(&filter, &doc));
    }
}

#[test]
fn conjunction_of_string_and_boolean_comparisons() {
    let parsed = parse_filter("userName eq \"john\" and active eq true").unwrap();
    let expected = Filter::And(
        Box::new(Filter::Compare(AttrExpr {
            path: AttrPath::attribute("userName"),
            op: CompareOp::Eq,
            value: Literal::Str("john".into()),
        })),
        Box::new(Filter::Compare(AttrExpr {
            path: AttrPath::attribute("active"),
            op: CompareOp::Eq,
            value: Literal::Bool(true),
        })),
    );
    assert_eq!(parsed, expected);
}

#[test]
fn value_path_filter_matches_selected_elements() {
    let filter = parse_filter("emails[type eq \"work\"].value ew \"@example.com\"").unwrap();
    let both = json!({"emails": [
        {"type": "work", "value": "a@example.com"},
        {"type": "home", "value": "b@other"},
    ]});
    assert!(evaluate(&filter, &both));

    let home_only = json!({"emails": [{"type": "home", "value": "b@other"}]});
    assert!(!evaluate(&filter, &home_only));
}
