//! Query parsing for list and search operations.
//!
//! Decodes the flat `filter` / `attributes` / `excludedAttributes` /
//! `sortBy` / `sortOrder` / `startIndex` / `count` parameter map, or the
//! equivalent `.search` JSON body, into a [`Query`]. Paging values are
//! clamped against [`ScimLimits`]; an explicit `count` above
//! `max_results` is the one flow-control error the core emits
//! (`tooMany`).

use std::collections::HashMap;

use serde_json::Value;

use crate::config::ScimLimits;
use crate::error::{ScimError, ScimResult};
use crate::filter::{parse_filter, Filter};

/// Sort direction. Anything other than `"descending"` is ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A decoded list/search query.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<Filter>,
    /// Include-projection paths. Wins over `excluded_attributes`.
    pub attributes: Vec<String>,
    pub excluded_attributes: Vec<String>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    /// 1-based index of the first returned result.
    pub start_index: usize,
    /// Page size, within `[1, max_results]`.
    pub count: usize,
}

impl Query {
    /// An unconstrained query using the given limits' defaults.
    pub fn empty(limits: &ScimLimits) -> Self {
        Self {
            start_index: 1,
            count: limits.default_page_size,
            ..Self::default()
        }
    }

    /// Zero-based pagination offset.
    pub fn offset(&self) -> usize {
        self.start_index.saturating_sub(1)
    }

    /// Parse a query from a flat parameter map.
    pub fn from_params(
        params: &HashMap<String, String>,
        limits: &ScimLimits,
    ) -> ScimResult<Self> {
        let filter = match params.get("filter").map(String::as_str) {
            Some(raw) if !raw.trim().is_empty() => Some(parse_filter(raw)?),
            _ => None,
        };

        let attributes = params
            .get("attributes")
            .map(|s| split_list(s))
            .unwrap_or_default();
        let excluded_attributes = params
            .get("excludedAttributes")
            .map(|s| split_list(s))
            .unwrap_or_default();

        let sort_by = params
            .get("sortBy")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let sort_order = match params.get("sortOrder") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("descending") => SortOrder::Descending,
            _ => SortOrder::Ascending,
        };

        let start_index = match params.get("startIndex") {
            Some(raw) => parse_integer(raw, "startIndex")?.max(1),
            None => 1,
        };
        let count = match params.get("count") {
            Some(raw) => {
                let requested = parse_integer(raw, "count")?;
                if requested > limits.max_results as i64 {
                    return Err(ScimError::TooMany(format!(
                        "count {} exceeds the maximum of {}",
                        requested, limits.max_results
                    )));
                }
                requested.max(1) as usize
            }
            None => limits.default_page_size,
        };

        Ok(Self {
            filter,
            attributes,
            excluded_attributes,
            sort_by,
            sort_order,
            start_index: start_index as usize,
            count,
        })
    }

    /// Parse the `.search` request body: the same keys as the query
    /// string, except `attributes` / `excludedAttributes` may be JSON
    /// arrays and numeric members may be JSON numbers.
    pub fn from_search_body(body: &Value, limits: &ScimLimits) -> ScimResult<Self> {
        let obj = body.as_object().ok_or_else(|| {
            ScimError::InvalidSyntax("search request body must be a JSON object".into())
        })?;

        let mut params = HashMap::new();
        for key in [
            "filter",
            "attributes",
            "excludedAttributes",
            "sortBy",
            "sortOrder",
            "startIndex",
            "count",
        ] {
            let Some(value) = obj.get(key) else {
                continue;
            };
            let flat = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
                Value::Null => continue,
                other => {
                    return Err(ScimError::InvalidSyntax(format!(
                        "search member {:?} has unsupported type: {}",
                        key, other
                    )));
                }
            };
            params.insert(key.to_string(), flat);
        }
        Self::from_params(&params, limits)
    }
}

/// Comma-separated list, trimmed per element, empties dropped.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_integer(raw: &str, name: &str) -> ScimResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| ScimError::InvalidValue(format!("{} must be an integer, got {:?}", name, raw)))
}
