//! Filter evaluation against documents.
//!
//! `evaluate` is pure: no side effects, and no panics for well-formed
//! ASTs. Structural mismatches (e.g. applying `co` to a number) evaluate
//! to `false` rather than erroring.
//!
//! SCIM semantics implemented here:
//! - string comparison is case-insensitive for `eq ne co sw ew` (and for
//!   the ordering operators when both sides are strings),
//! - numeric comparison applies when both sides coerce to numbers,
//! - booleans match by string form (`"true"` / `"false"`, any case),
//! - an array matches when any element matches,
//! - a complex multi-valued element compared without a sub-attribute is
//!   compared through its `value` sub-attribute,
//! - `pr` is the presence test of [`crate::document::is_present`].

use serde_json::Value;

use super::ast::{AttrExpr, AttrPath, CompareOp, Filter, Literal};
use crate::document::{descend, get_attr_ci, is_present};

/// Evaluate a filter against a document. The empty filter matches all.
pub fn evaluate(filter: &Filter, doc: &Value) -> bool {
    match filter {
        Filter::Empty => true,
        Filter::Compare(expr) => eval_compare(expr, doc),
        Filter::Present(path) => resolve_any(path, doc, &mut is_present),
        Filter::And(l, r) => evaluate(l, doc) && evaluate(r, doc),
        Filter::Or(l, r) => evaluate(l, doc) || evaluate(r, doc),
        Filter::Not(inner) => !evaluate(inner, doc),
        Filter::Group(inner) => evaluate(inner, doc),
    }
}

fn eval_compare(expr: &AttrExpr, doc: &Value) -> bool {
    resolve_any(&expr.path, doc, &mut |v| compare(v, expr.op, &expr.value))
}

/// Resolve a path against the document and test the predicate against the
/// resolved value(s), existentially. For a value path (`a[inner].sub`),
/// the inner filter runs with each array element as document root; the
/// predicate is tested against the `sub` path of each matching element,
/// short-circuiting on the first hit.
fn resolve_any(path: &AttrPath, doc: &Value, pred: &mut dyn FnMut(&Value) -> bool) -> bool {
    let Some(obj) = doc.as_object() else {
        return false;
    };
    let Some(root) = lookup_attr(obj, &path.attribute) else {
        return false;
    };

    if let Some(inner) = &path.value_filter {
        let Some(items) = root.as_array() else {
            return false;
        };
        return items.iter().filter(|item| evaluate(inner, item)).any(|item| {
            match descend(item, &path.sub_attributes) {
                Some(target) => pred(target),
                None => false,
            }
        });
    }

    if path.sub_attributes.is_empty() {
        return pred(root);
    }

    // A plain sub-attribute path over a multi-valued attribute matches
    // when any element's sub-attribute matches.
    match root {
        Value::Array(items) => items
            .iter()
            .any(|item| descend(item, &path.sub_attributes).is_some_and(&mut *pred)),
        _ => descend(root, &path.sub_attributes).is_some_and(pred),
    }
}

/// Attribute lookup with a URN fallback: `urn:...:userName` resolves to
/// `userName` when the full name is not a key of the document.
fn lookup_attr<'a>(
    obj: &'a serde_json::Map<String, Value>,
    name: &str,
) -> Option<&'a Value> {
    get_attr_ci(obj, name).or_else(|| {
        let local = name.rsplit(':').next()?;
        if local == name {
            None
        } else {
            get_attr_ci(obj, local)
        }
    })
}

fn compare(actual: &Value, op: CompareOp, literal: &Literal) -> bool {
    match actual {
        // Existential semantics over multi-valued attributes.
        Value::Array(items) => items.iter().any(|item| compare(item, op, literal)),
        // Comparison against a complex element descends into `value`.
        Value::Object(obj) => get_attr_ci(obj, "value")
            .map(|v| compare(v, op, literal))
            .unwrap_or(false),
        leaf => compare_leaf(leaf, op, literal),
    }
}

fn compare_leaf(actual: &Value, op: CompareOp, literal: &Literal) -> bool {
    match op {
        CompareOp::Eq => leaf_eq(actual, literal),
        CompareOp::Ne => !leaf_eq(actual, literal),
        CompareOp::Co => string_op(actual, literal, |a, l| a.contains(l)),
        CompareOp::Sw => string_op(actual, literal, |a, l| a.starts_with(l)),
        CompareOp::Ew => string_op(actual, literal, |a, l| a.ends_with(l)),
        CompareOp::Gt => ordering(actual, literal, |o| o == std::cmp::Ordering::Greater),
        CompareOp::Ge => ordering(actual, literal, |o| o != std::cmp::Ordering::Less),
        CompareOp::Lt => ordering(actual, literal, |o| o == std::cmp::Ordering::Less),
        CompareOp::Le => ordering(actual, literal, |o| o != std::cmp::Ordering::Greater),
    }
}

fn leaf_eq(actual: &Value, literal: &Literal) -> bool {
    match (actual, literal) {
        (Value::Null, Literal::Null) => true,
        (_, Literal::Null) => false,
        (Value::Bool(a), Literal::Bool(b)) => a == b,
        (Value::Bool(a), Literal::Str(s)) => s.eq_ignore_ascii_case(bool_str(*a)),
        (Value::String(s), Literal::Bool(b)) => s.eq_ignore_ascii_case(bool_str(*b)),
        (Value::String(a), Literal::Str(b)) => a.eq_ignore_ascii_case(b),
        _ => match (as_number(actual), literal_number(literal)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn string_op(actual: &Value, literal: &Literal, test: fn(&str, &str) -> bool) -> bool {
    match (actual, literal) {
        (Value::String(a), Literal::Str(b)) => {
            test(&a.to_lowercase(), &b.to_lowercase())
        }
        _ => false,
    }
}

fn ordering(actual: &Value, literal: &Literal, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Some(a), Some(b)) = (as_number(actual), literal_number(literal)) {
        return a.partial_cmp(&b).map(accept).unwrap_or(false);
    }
    if let (Value::String(a), Literal::Str(b)) = (actual, literal) {
        return accept(a.to_lowercase().cmp(&b.to_lowercase()));
    }
    false
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Numeric coercion: JSON numbers directly, strings when they parse.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn literal_number(literal: &Literal) -> Option<f64> {
    match literal {
        Literal::Num(n) => Some(*n),
        Literal::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;
    use serde_json::json;

    fn matches(filter: &str, doc: &Value) -> bool {
        evaluate(&parse_filter(filter).expect("filter should parse"), doc)
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches("", &json!({})));
        assert!(matches("", &json!({"a": 1})));
    }

    #[test]
    fn string_equality_is_case_insensitive() {
        let doc = json!({"userName": "John"});
        assert!(matches("userName eq \"john\"", &doc));
        assert!(matches("userName eq \"JOHN\"", &doc));
        assert!(!matches("userName eq \"johnny\"", &doc));
    }

    #[test]
    fn attribute_names_are_case_insensitive() {
        let doc = json!({"userName": "john"});
        assert!(matches("USERNAME eq \"john\"", &doc));
    }

    #[test]
    fn boolean_matches_by_string_form() {
        let doc = json!({"active": true});
        assert!(matches("active eq true", &doc));
        assert!(matches("active eq \"True\"", &doc));
        assert!(!matches("active eq false", &doc));
    }

    #[test]
    fn numeric_comparisons() {
        let doc = json!({"age": 42, "height": "1.75"});
        assert!(matches("age eq 42", &doc));
        assert!(matches("age gt 40", &doc));
        assert!(matches("age le 42", &doc));
        assert!(!matches("age lt 42", &doc));
        // string coerces to number
        assert!(matches("height gt 1.5", &doc));
    }

    #[test]
    fn contains_starts_ends() {
        let doc = json!({"userName": "John.Doe"});
        assert!(matches("userName co \"hn.d\"", &doc));
        assert!(matches("userName sw \"JOHN\"", &doc));
        assert!(matches("userName ew \".doe\"", &doc));
        assert!(!matches("userName co \"smith\"", &doc));
    }

    #[test]
    fn structural_mismatch_is_false_not_an_error() {
        let doc = json!({"age": 42});
        assert!(!matches("age co \"4\"", &doc));
        assert!(!matches("missing eq \"x\"", &doc));
        assert!(!matches("age eq \"fortytwo\"", &doc));
    }

    #[test]
    fn array_matches_any_element() {
        let doc = json!({"nickNames": ["Jo", "Johnny"]});
        assert!(matches("nickNames eq \"johnny\"", &doc));
        assert!(!matches("nickNames eq \"jim\"", &doc));
    }

    #[test]
    fn complex_elements_compare_through_value() {
        let doc = json!({"emails": [
            {"type": "work", "value": "a@example.com"},
            {"type": "home", "value": "b@other.org"},
        ]});
        assert!(matches("emails eq \"a@example.com\"", &doc));
        assert!(matches("emails co \"other\"", &doc));
    }

    #[test]
    fn value_path_filters_elements() {
        let doc = json!({"emails": [
            {"type": "work", "value": "a@example.com"},
            {"type": "home", "value": "b@other"},
        ]});
        assert!(matches(
            "emails[type eq \"work\"].value ew \"@example.com\"",
            &doc
        ));

        let home_only = json!({"emails": [{"type": "home", "value": "b@other"}]});
        assert!(!matches(
            "emails[type eq \"work\"].value ew \"@example.com\"",
            &home_only
        ));
    }

    #[test]
    fn value_path_without_sub_attribute() {
        let doc = json!({"emails": [{"type": "work", "value": "a@example.com"}]});
        assert!(matches("emails[type eq \"work\"] pr", &doc));
        assert!(!matches("emails[type eq \"home\"] pr", &doc));
    }

    #[test]
    fn presence_semantics() {
        let doc = json!({"title": "boss", "emails": [], "name": null, "note": ""});
        assert!(matches("title pr", &doc));
        assert!(!matches("emails pr", &doc));
        assert!(!matches("name pr", &doc));
        assert!(!matches("note pr", &doc));
        assert!(!matches("missing pr", &doc));
    }

    #[test]
    fn sub_attribute_paths() {
        let doc = json!({"name": {"familyName": "Doe", "givenName": "John"}});
        assert!(matches("name.familyName eq \"doe\"", &doc));
        assert!(!matches("name.familyName eq \"smith\"", &doc));
    }

    #[test]
    fn sub_attribute_over_array_is_existential() {
        let doc = json!({"emails": [
            {"type": "work", "value": "a@example.com"},
            {"type": "home", "value": "b@other"},
        ]});
        assert!(matches("emails.type eq \"home\"", &doc));
        assert!(!matches("emails.type eq \"fax\"", &doc));
    }

    #[test]
    fn logical_operators_short_circuit_correctly() {
        let doc = json!({"a": 1, "b": 2});
        assert!(matches("a eq 1 and b eq 2", &doc));
        assert!(!matches("a eq 1 and b eq 3", &doc));
        assert!(matches("a eq 9 or b eq 2", &doc));
        assert!(matches("not (a eq 9)", &doc));
        assert!(!matches("not (a eq 1)", &doc));
    }

    #[test]
    fn ne_on_null_literal() {
        let doc = json!({"manager": null, "title": "x"});
        assert!(matches("manager eq null", &doc));
        assert!(matches("title ne null", &doc));
    }

    #[test]
    fn urn_prefixed_path_falls_back_to_local_name() {
        let doc = json!({"userName": "john"});
        assert!(matches(
            "urn:ietf:params:scim:schemas:core:userName eq \"john\"",
            &doc
        ));
    }
}
