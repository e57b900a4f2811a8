//! Attribute projection (`attributes` / `excludedAttributes`).
//!
//! Include mode returns the always-returned attributes (`schemas`, `id`,
//! `meta`) plus every requested path; exclude mode deletes the requested
//! paths but never `schemas` or `id`. Sub-paths (`name.familyName`)
//! narrow to the named sub-attribute, per element for multi-valued
//! attributes. Attribute matching is case-insensitive.
//!
//! Projection paths are plain dotted names. Entries that do not parse
//! (or carry a value filter) are ignored rather than fatal: projection
//! is a response shaping concern, not a validation gate.

use serde_json::{Map, Value};

use crate::document::{get_attr_ci, remove_attr_ci, resolve_key};
use crate::patch::parse_path;

/// Attributes returned regardless of the include list.
const ALWAYS_RETURNED: &[&str] = &["schemas", "id", "meta"];

/// Attributes an exclude list can never remove.
const PROTECTED: &[&str] = &["schemas", "id"];

/// Apply a projection: `attributes` wins when both lists are non-empty,
/// an empty pair of lists is the identity.
pub fn project(doc: &Value, attributes: &[String], excluded: &[String]) -> Value {
    if !attributes.is_empty() {
        include(doc, attributes)
    } else if !excluded.is_empty() {
        exclude(doc, excluded)
    } else {
        doc.clone()
    }
}

/// Include-mode projection.
pub fn include(doc: &Value, paths: &[String]) -> Value {
    let Some(obj) = doc.as_object() else {
        return doc.clone();
    };

    let mut result = Map::new();
    for name in ALWAYS_RETURNED {
        if let Some(key) = resolve_key(obj, name) {
            if let Some(value) = obj.get(&key) {
                result.insert(key, value.clone());
            }
        }
    }

    for (attribute, subs) in grouped_paths(paths) {
        let Some(key) = resolve_key(obj, &attribute) else {
            continue;
        };
        let Some(source) = obj.get(&key) else {
            continue;
        };
        // Any whole-attribute entry wins over sub-path narrowing.
        if subs.iter().any(Vec::is_empty) {
            result.insert(key, source.clone());
        } else {
            result.insert(key, narrow(source, &subs));
        }
    }

    Value::Object(result)
}

/// Exclude-mode projection.
pub fn exclude(doc: &Value, paths: &[String]) -> Value {
    let mut result = doc.clone();
    let Some(obj) = result.as_object_mut() else {
        return result;
    };

    for (attribute, subs) in grouped_paths(paths) {
        for sub in subs {
            if sub.is_empty() {
                if PROTECTED.iter().any(|p| attribute.eq_ignore_ascii_case(p)) {
                    continue;
                }
                remove_attr_ci(obj, &attribute);
            } else if let Some(key) = resolve_key(obj, &attribute) {
                if let Some(child) = obj.get_mut(&key) {
                    prune(child, &sub);
                }
            }
        }
    }
    result
}

/// Parse and group projection paths by root attribute (case-folded).
/// Each group holds the sub-attribute chains requested under that root;
/// an empty chain means the whole attribute.
fn grouped_paths(paths: &[String]) -> Vec<(String, Vec<Vec<String>>)> {
    let mut groups: Vec<(String, Vec<Vec<String>>)> = Vec::new();
    for raw in paths {
        let Ok(path) = parse_path(raw) else {
            continue;
        };
        if path.is_empty() || path.filter.is_some() {
            continue;
        }
        match groups
            .iter_mut()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(&path.attribute))
        {
            Some((_, subs)) => subs.push(path.sub_attributes),
            None => groups.push((path.attribute, vec![path.sub_attributes])),
        }
    }
    groups
}

/// Keep only the requested sub-attribute chains of a value. Multi-valued
/// attributes narrow per element.
fn narrow(source: &Value, subs: &[Vec<String>]) -> Value {
    match source {
        Value::Array(items) => Value::Array(items.iter().map(|item| narrow(item, subs)).collect()),
        Value::Object(obj) => {
            let mut kept = Map::new();
            // Group requested chains by their first segment, narrowing
            // deeper chains recursively.
            let mut heads: Vec<(&String, Vec<Vec<String>>)> = Vec::new();
            for chain in subs {
                let Some((head, rest)) = chain.split_first() else {
                    continue;
                };
                match heads
                    .iter_mut()
                    .find(|(h, _)| h.eq_ignore_ascii_case(head))
                {
                    Some((_, rests)) => rests.push(rest.to_vec()),
                    None => heads.push((head, vec![rest.to_vec()])),
                }
            }
            for (head, rests) in heads {
                let Some(key) = resolve_key(obj, head) else {
                    continue;
                };
                let Some(value) = get_attr_ci(obj, head) else {
                    continue;
                };
                if rests.iter().any(Vec::is_empty) {
                    kept.insert(key, value.clone());
                } else {
                    kept.insert(key, narrow(value, &rests));
                }
            }
            Value::Object(kept)
        }
        other => other.clone(),
    }
}

/// Delete one sub-attribute chain from a value, per element for arrays.
fn prune(value: &mut Value, chain: &[String]) {
    match value {
        Value::Array(items) => {
            for item in items {
                prune(item, chain);
            }
        }
        Value::Object(obj) => match chain {
            [] => {}
            [last] => {
                remove_attr_ci(obj, last);
            }
            [head, rest @ ..] => {
                if let Some(key) = resolve_key(obj, head) {
                    if let Some(child) = obj.get_mut(&key) {
                        prune(child, rest);
                    }
                }
            }
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> Value {
        json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "id": "2819c223",
            "meta": {"resourceType": "User", "version": "W/\"1\""},
            "userName": "bjensen",
            "password": "secret",
            "name": {"familyName": "Jensen", "givenName": "Barbara"},
            "emails": [
                {"type": "work", "value": "b@example.com", "primary": true},
                {"type": "home", "value": "b@home.org"},
            ],
        })
    }

    #[test]
    fn include_keeps_always_returned_and_requested() {
        let projected = include(&user(), &["userName".into(), "name.familyName".into()]);
        assert_eq!(
            projected,
            json!({
                "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
                "id": "2819c223",
                "meta": {"resourceType": "User", "version": "W/\"1\""},
                "userName": "bjensen",
                "name": {"familyName": "Jensen"},
            })
        );
    }

    #[test]
    fn include_narrows_multi_valued_per_element() {
        let projected = include(&user(), &["emails.value".into()]);
        assert_eq!(
            projected["emails"],
            json!([{"value": "b@example.com"}, {"value": "b@home.org"}])
        );
    }

    #[test]
    fn include_is_case_insensitive() {
        let projected = include(&user(), &["USERNAME".into()]);
        assert_eq!(projected["userName"], "bjensen");
    }

    #[test]
    fn whole_attribute_wins_over_sub_path() {
        let projected = include(&user(), &["name.familyName".into(), "name".into()]);
        assert_eq!(projected["name"], user()["name"]);
    }

    #[test]
    fn exclude_removes_paths_but_protects_schemas_and_id() {
        let projected = exclude(
            &user(),
            &["password".into(), "schemas".into(), "id".into()],
        );
        assert_eq!(projected["schemas"], user()["schemas"]);
        assert_eq!(projected["id"], "2819c223");
        assert!(projected.get("password").is_none());
        // everything else untouched
        assert_eq!(projected["userName"], "bjensen");
    }

    #[test]
    fn exclude_sub_path_leaves_siblings() {
        let projected = exclude(&user(), &["name.familyName".into(), "emails.primary".into()]);
        assert_eq!(projected["name"], json!({"givenName": "Barbara"}));
        assert_eq!(
            projected["emails"],
            json!([
                {"type": "work", "value": "b@example.com"},
                {"type": "home", "value": "b@home.org"},
            ])
        );
    }

    #[test]
    fn empty_exclude_list_is_identity() {
        assert_eq!(exclude(&user(), &[]), user());
        assert_eq!(project(&user(), &[], &[]), user());
    }

    #[test]
    fn include_all_paths_is_identity() {
        let doc = user();
        let all: Vec<String> = doc
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(include(&doc, &all), doc);
    }

    #[test]
    fn attributes_win_over_excluded() {
        let projected = project(&user(), &["userName".into()], &["userName".into()]);
        assert_eq!(projected["userName"], "bjensen");
        assert!(projected.get("password").is_none());
    }

    #[test]
    fn unparsable_entries_are_ignored() {
        let projected = include(&user(), &["userName".into(), "emails[type eq".into()]);
        assert_eq!(projected["userName"], "bjensen");
    }
}
