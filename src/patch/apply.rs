//! PATCH operation execution.
//!
//! Implements the RFC 7644 §3.5.2 operation table over documents.
//! Operations are applied in array order; each operation sees the
//! document produced by the previous one, and the first failure aborts
//! the remainder.
//!
//! Two behaviors are deliberately lenient (and logged rather than
//! errored): an indexed `remove` that matches no elements is a no-op,
//! and `replace` on a missing path creates the attribute. The latter can
//! be tightened with [`PatchApplicator::strict`].

use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::path::{parse_path, PatchPath};
use crate::document::{remove_attr_ci, resolve_key};
use crate::error::{ScimError, ScimResult};
use crate::filter::ast::{CompareOp, Filter, Literal};
use crate::filter::evaluate;

/// Schema URI of the PATCH request message.
pub const PATCH_OP_URN: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// The RFC 7644 PATCH request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    #[serde(default)]
    pub schemas: Vec<String>,
    /// Capitalized on the wire, mandated by SCIM.
    #[serde(rename = "Operations")]
    pub operations: Vec<PatchOperation>,
}

impl PatchRequest {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self {
            schemas: vec![PATCH_OP_URN.to_string()],
            operations,
        }
    }

    /// Decode a request body. Requires the `Operations` array; the
    /// `schemas` member is not enforced.
    pub fn from_body(body: &[u8]) -> ScimResult<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// A single PATCH operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: Option<&str>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.map(String::from),
            value: Some(value),
        }
    }

    pub fn remove(path: &str) -> Self {
        Self {
            op: PatchOp::Remove,
            path: Some(path.to_string()),
            value: None,
        }
    }

    pub fn replace(path: Option<&str>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.map(String::from),
            value: Some(value),
        }
    }
}

/// PATCH operation kinds. Parsed case-insensitively off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

impl PatchOp {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        }
    }
}

impl Serialize for PatchOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for PatchOp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        PatchOp::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unsupported PATCH op {:?}", name)))
    }
}

/// Executes PATCH operations against a document.
#[derive(Debug, Clone, Default)]
pub struct PatchApplicator {
    strict_replace: bool,
}

impl PatchApplicator {
    /// Lenient applicator: `replace` on a missing path creates it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict applicator: `replace` on a missing path raises `NoTarget`.
    pub fn strict() -> Self {
        Self {
            strict_replace: true,
        }
    }

    /// Apply operations in order, mutating the document in place.
    pub fn apply(&self, doc: &mut Value, operations: &[PatchOperation]) -> ScimResult<()> {
        for operation in operations {
            self.apply_one(doc, operation)?;
        }
        Ok(())
    }

    fn apply_one(&self, doc: &mut Value, operation: &PatchOperation) -> ScimResult<()> {
        let path = match operation.path.as_deref() {
            Some(raw) => {
                let parsed = parse_path(raw)?;
                if parsed.is_empty() {
                    return Err(ScimError::InvalidPath("path must not be empty".into()));
                }
                if is_readonly_attribute(&parsed.attribute) {
                    return Err(ScimError::Mutability(format!(
                        "attribute {:?} is read-only",
                        parsed.attribute
                    )));
                }
                Some(parsed)
            }
            None => None,
        };

        debug!(
            "applying {} at {}",
            operation.op.name(),
            path.as_ref().map(|p| p.to_string()).unwrap_or_default()
        );

        match operation.op {
            PatchOp::Add => self.add(doc, path.as_ref(), operation.value.as_ref()),
            PatchOp::Remove => self.remove(doc, path.as_ref()),
            PatchOp::Replace => self.replace(doc, path.as_ref(), operation.value.as_ref()),
        }
    }

    fn add(&self, doc: &mut Value, path: Option<&PatchPath>, value: Option<&Value>) -> ScimResult<()> {
        let value = value
            .ok_or_else(|| ScimError::InvalidValue("add operation requires a value".into()))?;
        match path {
            None => {
                let incoming = value.as_object().ok_or_else(|| {
                    ScimError::InvalidValue("add without a path requires an object value".into())
                })?;
                merge_object(root_object(doc)?, incoming);
                Ok(())
            }
            Some(p) => match &p.filter {
                Some(filter) => self.apply_indexed(doc, p, filter, value, true),
                None => {
                    let obj = root_object(doc)?;
                    set_path(obj, local_name(&p.attribute), &p.sub_attributes, value, true, true);
                    Ok(())
                }
            },
        }
    }

    fn remove(&self, doc: &mut Value, path: Option<&PatchPath>) -> ScimResult<()> {
        let p = path
            .ok_or_else(|| ScimError::NoTarget("remove operation requires a path".into()))?;
        let obj = root_object(doc)?;
        let attr = local_name(&p.attribute);

        if let Some(filter) = &p.filter {
            let Some(key) = resolve_key(obj, attr) else {
                debug!("remove at {} matched nothing (attribute absent)", p);
                return Ok(());
            };
            let Some(items) = obj.get_mut(&key).and_then(Value::as_array_mut) else {
                debug!("remove at {} targets a single-valued attribute", p);
                return Ok(());
            };
            if p.sub_attributes.is_empty() {
                let before = items.len();
                items.retain(|item| !evaluate(filter, item));
                if items.len() == before {
                    debug!("remove at {} matched no elements", p);
                }
            } else {
                let mut touched = false;
                for item in items.iter_mut().filter(|item| evaluate(filter, item)) {
                    touched |= remove_at(item, &p.sub_attributes);
                }
                if !touched {
                    debug!("remove at {} matched no elements", p);
                }
            }
            return Ok(());
        }

        if p.sub_attributes.is_empty() {
            if remove_attr_ci(obj, attr).is_none() {
                debug!("remove of absent attribute {}", p);
            }
            return Ok(());
        }

        match resolve_key(obj, attr) {
            Some(key) => {
                let mut emptied = false;
                if let Some(child) = obj.get_mut(&key) {
                    remove_at(child, &p.sub_attributes);
                    emptied = child.as_object().map(Map::is_empty).unwrap_or(false);
                }
                // Removing the last sub-attribute removes the attribute.
                if emptied {
                    obj.remove(&key);
                }
            }
            None => debug!("remove of absent attribute {}", p),
        }
        Ok(())
    }

    fn replace(
        &self,
        doc: &mut Value,
        path: Option<&PatchPath>,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let value = value
            .ok_or_else(|| ScimError::InvalidValue("replace operation requires a value".into()))?;
        match path {
            None => {
                let incoming = value.as_object().ok_or_else(|| {
                    ScimError::InvalidValue(
                        "replace without a path requires an object value".into(),
                    )
                })?;
                let obj = root_object(doc)?;
                for (name, val) in incoming {
                    let key = resolve_key(obj, name).unwrap_or_else(|| name.clone());
                    obj.insert(key, val.clone());
                }
                Ok(())
            }
            Some(p) => match &p.filter {
                Some(filter) => self.apply_indexed(doc, p, filter, value, false),
                None => {
                    let obj = root_object(doc)?;
                    let applied = set_path(
                        obj,
                        local_name(&p.attribute),
                        &p.sub_attributes,
                        value,
                        false,
                        !self.strict_replace,
                    );
                    if !applied && self.strict_replace {
                        return Err(ScimError::NoTarget(format!(
                            "path {} does not resolve",
                            p
                        )));
                    }
                    Ok(())
                }
            },
        }
    }

    /// Add or replace through an indexed path: the inner filter is
    /// evaluated with each array element as document root, and every
    /// matching element is a target. With no matches, the lenient mode
    /// creates a new element seeded from the filter's `eq` conjuncts.
    fn apply_indexed(
        &self,
        doc: &mut Value,
        p: &PatchPath,
        filter: &Filter,
        value: &Value,
        append: bool,
    ) -> ScimResult<()> {
        let obj = root_object(doc)?;
        let attr = local_name(&p.attribute);
        let key = match resolve_key(obj, attr) {
            Some(key) => key,
            None if self.strict_replace && !append => {
                return Err(ScimError::NoTarget(format!("path {} does not resolve", p)));
            }
            None => {
                obj.insert(attr.to_string(), Value::Array(Vec::new()));
                attr.to_string()
            }
        };
        let Some(items) = obj.get_mut(&key).and_then(Value::as_array_mut) else {
            if self.strict_replace && !append {
                return Err(ScimError::NoTarget(format!(
                    "path {} targets a single-valued attribute",
                    p
                )));
            }
            debug!("{} at {} targets a single-valued attribute", op_word(append), p);
            return Ok(());
        };

        let mut matched = false;
        for item in items.iter_mut().filter(|item| evaluate(filter, item)) {
            matched = true;
            if p.sub_attributes.is_empty() {
                if append {
                    merge_value(item, value);
                } else {
                    overwrite_fields(item, value);
                }
            } else {
                set_at(item, &p.sub_attributes, value, append, true);
            }
        }

        if !matched {
            if self.strict_replace && !append {
                return Err(ScimError::NoTarget(format!(
                    "path {} matched no elements",
                    p
                )));
            }
            let mut element = Value::Object(seed_fields(filter));
            if p.sub_attributes.is_empty() {
                merge_value(&mut element, value);
            } else {
                set_at(&mut element, &p.sub_attributes, value, append, true);
            }
            debug!("{} at {} matched no elements, creating one", op_word(append), p);
            items.push(element);
        }
        Ok(())
    }
}

fn op_word(append: bool) -> &'static str {
    if append {
        "add"
    } else {
        "replace"
    }
}

/// RFC 7644 read-only attributes that PATCH may never target.
fn is_readonly_attribute(attribute: &str) -> bool {
    let name = local_name(attribute);
    name.eq_ignore_ascii_case("id") || name.eq_ignore_ascii_case("meta")
}

/// Strip a `urn:` schema prefix down to the attribute name after the
/// last colon. Plain names pass through untouched.
fn local_name(attribute: &str) -> &str {
    if attribute.len() >= 4 && attribute[..4].eq_ignore_ascii_case("urn:") {
        attribute.rsplit(':').next().unwrap_or(attribute)
    } else {
        attribute
    }
}

fn root_object(doc: &mut Value) -> ScimResult<&mut Map<String, Value>> {
    doc.as_object_mut()
        .ok_or_else(|| ScimError::InvalidValue("document must be a JSON object".into()))
}

/// Deep merge: arrays concatenate, objects merge recursively, scalars
/// overwrite.
fn merge_value(existing: &mut Value, incoming: &Value) {
    match (existing, incoming) {
        (Value::Array(current), Value::Array(new)) => current.extend(new.iter().cloned()),
        (Value::Object(current), Value::Object(new)) => merge_object(current, new),
        (slot, new) => *slot = new.clone(),
    }
}

fn merge_object(current: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (name, value) in incoming {
        match resolve_key(current, name) {
            Some(key) => {
                if let Some(slot) = current.get_mut(&key) {
                    merge_value(slot, value);
                }
            }
            None => {
                current.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Shallow merge for `replace` on a matched element: incoming fields win,
/// untouched fields survive. A non-object value overwrites the element.
fn overwrite_fields(element: &mut Value, value: &Value) {
    match (element.as_object_mut(), value.as_object()) {
        (Some(current), Some(incoming)) => {
            for (name, val) in incoming {
                let key = resolve_key(current, name).unwrap_or_else(|| name.clone());
                current.insert(key, val.clone());
            }
        }
        _ => *element = value.clone(),
    }
}

/// Set a value at `attr` (+ sub-attribute chain) inside an object.
/// `append` selects add semantics (arrays extend); `create` permits
/// materializing missing parents. Returns whether anything was applied.
fn set_path(
    obj: &mut Map<String, Value>,
    attr: &str,
    subs: &[String],
    value: &Value,
    append: bool,
    create: bool,
) -> bool {
    if subs.is_empty() {
        return set_leaf(obj, attr, value, append, create);
    }
    match resolve_key(obj, attr) {
        Some(key) => match obj.get_mut(&key) {
            Some(child) => set_at(child, subs, value, append, create),
            None => false,
        },
        None if create => {
            let child = obj
                .entry(attr.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_at(child, subs, value, append, create)
        }
        None => false,
    }
}

fn set_at(current: &mut Value, segments: &[String], value: &Value, append: bool, create: bool) -> bool {
    match current {
        // A plain sub-attribute path distributes over a multi-valued
        // attribute: the operation applies to every element.
        Value::Array(items) => {
            let mut applied = false;
            for item in items {
                applied |= set_at(item, segments, value, append, create);
            }
            applied
        }
        Value::Object(obj) => match segments {
            [] => false,
            [last] => set_leaf(obj, last, value, append, create),
            [head, rest @ ..] => match resolve_key(obj, head) {
                Some(key) => match obj.get_mut(&key) {
                    Some(child) => set_at(child, rest, value, append, create),
                    None => false,
                },
                None if create => {
                    let child = obj
                        .entry(head.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    set_at(child, rest, value, append, create)
                }
                None => false,
            },
        },
        _ => false,
    }
}

fn set_leaf(obj: &mut Map<String, Value>, name: &str, value: &Value, append: bool, create: bool) -> bool {
    match resolve_key(obj, name) {
        Some(key) => {
            match obj.get_mut(&key) {
                Some(Value::Array(items)) if append => match value {
                    Value::Array(new) => items.extend(new.iter().cloned()),
                    single => items.push(single.clone()),
                },
                Some(slot) => *slot = value.clone(),
                None => return false,
            }
            true
        }
        None if create => {
            obj.insert(name.to_string(), value.clone());
            true
        }
        None => false,
    }
}

fn remove_at(current: &mut Value, segments: &[String]) -> bool {
    match current {
        Value::Array(items) => {
            let mut removed = false;
            for item in items {
                removed |= remove_at(item, segments);
            }
            removed
        }
        Value::Object(obj) => match segments {
            [] => false,
            [last] => remove_attr_ci(obj, last).is_some(),
            [head, rest @ ..] => match resolve_key(obj, head) {
                Some(key) => {
                    let mut emptied = false;
                    let removed = match obj.get_mut(&key) {
                        Some(child) => {
                            let removed = remove_at(child, rest);
                            emptied = child.as_object().map(Map::is_empty).unwrap_or(false);
                            removed
                        }
                        None => false,
                    };
                    if removed && emptied {
                        obj.remove(&key);
                    }
                    removed
                }
                None => false,
            },
        },
        _ => false,
    }
}

/// Collect the `attr eq literal` conjuncts of a value filter; they seed
/// the element created when an indexed add/replace matches nothing.
fn seed_fields(filter: &Filter) -> Map<String, Value> {
    let mut fields = Map::new();
    collect_seed(filter, &mut fields);
    fields
}

fn collect_seed(filter: &Filter, out: &mut Map<String, Value>) {
    match filter {
        Filter::Compare(expr)
            if expr.op == CompareOp::Eq
                && expr.path.value_filter.is_none()
                && expr.path.sub_attributes.is_empty() =>
        {
            out.insert(expr.path.attribute.clone(), literal_value(&expr.value));
        }
        Filter::And(l, r) => {
            collect_seed(l, out);
            collect_seed(r, out);
        }
        Filter::Group(inner) => collect_seed(inner, out),
        _ => {}
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Num(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}
