//! Attribute path parser for PATCH operations.
//!
//! Grammar: `Root ("[" Filter "]")? ("." SubName)*`. The bracketed value
//! filter is parsed by the filter parser, so everything the filter
//! grammar allows inside brackets works here too.

use std::fmt;

use nom::combinator::all_consuming;

use crate::error::{ScimError, ScimResult};
use crate::filter::ast::Filter;
use crate::filter::parser::attr_path;

/// A parsed PATCH target path.
///
/// Exactly one root attribute (optionally indexed by a value filter),
/// followed by dotted sub-attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPath {
    /// Root attribute name (may carry a `urn:` prefix).
    pub attribute: String,
    /// Value filter selecting elements of a multi-valued root.
    pub filter: Option<Filter>,
    /// Sub-attribute continuations, outermost first.
    pub sub_attributes: Vec<String>,
}

impl PatchPath {
    /// The empty-path sentinel. Never a valid PATCH target.
    pub fn empty() -> Self {
        Self {
            attribute: String::new(),
            filter: None,
            sub_attributes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attribute.is_empty()
    }

    /// Whether the root attribute carries a value filter.
    pub fn is_indexed(&self) -> bool {
        self.filter.is_some()
    }
}

impl fmt::Display for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attribute)?;
        if let Some(filter) = &self.filter {
            write!(f, "[{}]", filter)?;
        }
        for sub in &self.sub_attributes {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}

/// Parse an attribute path. The empty string parses to the empty-path
/// sentinel; anything else must match the grammar exactly.
pub fn parse_path(input: &str) -> ScimResult<PatchPath> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(PatchPath::empty());
    }
    match all_consuming(attr_path)(trimmed) {
        Ok((_, path)) => Ok(PatchPath {
            attribute: path.attribute,
            filter: path.value_filter.map(|f| *f),
            sub_attributes: path.sub_attributes,
        }),
        Err(err) => Err(ScimError::InvalidPath(match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!(
                    "unexpected input at offset {} in {:?}",
                    trimmed.len() - e.input.len(),
                    trimmed
                )
            }
            nom::Err::Incomplete(_) => format!("incomplete path {:?}", trimmed),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ast::{CompareOp, Literal};

    #[test]
    fn parses_plain_attribute() {
        let p = parse_path("userName").unwrap();
        assert_eq!(p.attribute, "userName");
        assert!(p.filter.is_none());
        assert!(p.sub_attributes.is_empty());
    }

    #[test]
    fn parses_sub_attribute_chain() {
        let p = parse_path("name.familyName").unwrap();
        assert_eq!(p.attribute, "name");
        assert_eq!(p.sub_attributes, vec!["familyName".to_string()]);
    }

    #[test]
    fn parses_indexed_path_with_sub_attribute() {
        let p = parse_path("emails[type eq \"work\"].value").unwrap();
        assert_eq!(p.attribute, "emails");
        assert_eq!(p.sub_attributes, vec!["value".to_string()]);
        match p.filter.expect("filter") {
            Filter::Compare(expr) => {
                assert_eq!(expr.op, CompareOp::Eq);
                assert_eq!(expr.value, Literal::Str("work".into()));
            }
            other => panic!("expected Compare, got {:?}", other),
        }
    }

    #[test]
    fn empty_string_is_the_sentinel() {
        assert!(parse_path("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in [
            "emails[type eq \"work\"",
            "emails]",
            ".familyName",
            "name.",
            "name..familyName",
            "emails[].value",
            "a b",
        ] {
            let err = parse_path(bad).unwrap_err();
            assert!(
                matches!(err, ScimError::InvalidPath(_)),
                "{:?} should be InvalidPath, got {:?}",
                bad,
                err
            );
        }
    }
}
