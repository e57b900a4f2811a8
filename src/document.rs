//! Document model helpers.
//!
//! Every engine in this crate (filter evaluation, PATCH application,
//! projection) operates on one canonical in-memory shape: the
//! [`serde_json::Value`] tree. SCIM is open-ended: clients may send schema
//! extensions the server has never seen, so the tree, not any typed
//! struct, is the representation of record. Typed resources (de)serialize
//! to and from it at the boundary.
//!
//! SCIM attribute names are case-insensitive (RFC 7643 §2.1), which plain
//! `Map::get` cannot express; the lookups here exist so no engine
//! reimplements that rule.

use serde_json::{Map, Value};

/// Look up an attribute by name, case-insensitively.
///
/// An exact-case hit is preferred so documents that carry both `userName`
/// and `username` (malformed, but possible) resolve deterministically.
pub fn get_attr_ci<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    if let Some(v) = obj.get(name) {
        return Some(v);
    }
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Mutable case-insensitive attribute lookup.
pub fn get_attr_ci_mut<'a>(obj: &'a mut Map<String, Value>, name: &str) -> Option<&'a mut Value> {
    let key = resolve_key(obj, name)?;
    obj.get_mut(&key)
}

/// Find the stored spelling of an attribute name, case-insensitively.
pub fn resolve_key(obj: &Map<String, Value>, name: &str) -> Option<String> {
    if obj.contains_key(name) {
        return Some(name.to_string());
    }
    obj.keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()
}

/// Remove an attribute by name, case-insensitively. Returns the removed
/// value, if any.
pub fn remove_attr_ci(obj: &mut Map<String, Value>, name: &str) -> Option<Value> {
    let key = resolve_key(obj, name)?;
    obj.remove(&key)
}

/// The SCIM "present" test: a value is present iff it is not null, not an
/// empty string, not an empty array, and not an empty object. An empty
/// array in particular counts as an absent multi-valued attribute.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Follow a dotted sub-attribute chain from a value, case-insensitively.
/// Returns `None` as soon as a segment does not resolve to an object key.
pub fn descend<'a>(value: &'a Value, sub_attributes: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for sub in sub_attributes {
        current = get_attr_ci(current.as_object()?, sub)?;
    }
    Some(current)
}
