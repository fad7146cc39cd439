//! Reusable value predicates
//!
//! Small checks shared by the builder, the route merger and the interface
//! adapter.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static LEGACY_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

static BRACED_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\*?([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

static PARAM_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{(\*?)([A-Za-z_][A-Za-z0-9_]*)\}$").expect("valid regex"));

/// String is present and non-empty
pub fn string_has_value(s: &str) -> bool {
    !s.is_empty()
}

/// Optional string is present and non-empty
pub fn option_string_has_value(s: Option<&str>) -> bool {
    s.is_some_and(string_has_value)
}

/// JSON value is a boolean (`true` or `false`, nothing else)
pub fn bool_has_value(value: &Value) -> bool {
    value.is_boolean()
}

/// JSON value is a non-empty object
pub fn mapping_has_value(value: &Value) -> bool {
    value.as_object().is_some_and(|m| !m.is_empty())
}

/// Route path is non-empty, rooted and a well-formed template
///
/// After `:param` normalization every segment must be plain text or a whole
/// `{name}` capture; a `{*name}` catch-all may only close the path and a
/// capture name may appear once.
pub fn path_is_valid(path: &str) -> bool {
    if !string_has_value(path) || !path.starts_with('/') {
        return false;
    }

    let normalized = normalize_path(path);
    let segments: Vec<&str> = normalized[1..].split('/').collect();
    let mut names = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        match PathSegment::parse(segment) {
            Some(PathSegment::Static(_)) => {}
            Some(PathSegment::Param(name)) => names.push(name),
            Some(PathSegment::CatchAll(name)) if i == segments.len() - 1 => names.push(name),
            _ => return false,
        }
    }

    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();
    unique.len() == names.len()
}

/// One `/`-separated piece of a normalized route template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

impl<'a> PathSegment<'a> {
    /// `None` for a segment with stray or partial braces
    pub fn parse(segment: &'a str) -> Option<Self> {
        if !segment.contains(['{', '}']) {
            return Some(PathSegment::Static(segment));
        }
        let captures = PARAM_SEGMENT.captures(segment)?;
        let name = captures.get(2)?.as_str();
        if captures[1].is_empty() {
            Some(PathSegment::Param(name))
        } else {
            Some(PathSegment::CatchAll(name))
        }
    }
}

/// Entity names become URL segments: non-empty, no separators or braces
pub fn entity_name_is_valid(name: &str) -> bool {
    string_has_value(name)
        && !name
            .chars()
            .any(|c| c == '/' || c == '{' || c == '}' || c.is_whitespace())
}

/// Rewrite `:param` segments into the `{param}` form the router expects
pub fn normalize_path(path: &str) -> String {
    LEGACY_PARAM.replace_all(path, "{$1}").into_owned()
}

/// Names of the `{param}` captures in a normalized path
pub fn path_params(path: &str) -> Vec<String> {
    BRACED_PARAM
        .captures_iter(path)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_has_value() {
        assert!(string_has_value("id"));
        assert!(!string_has_value(""));
        assert!(option_string_has_value(Some("key")));
        assert!(!option_string_has_value(Some("")));
        assert!(!option_string_has_value(None));
    }

    #[test]
    fn test_bool_has_value() {
        assert!(bool_has_value(&json!(false)));
        assert!(bool_has_value(&json!(true)));
        assert!(!bool_has_value(&json!("false")));
        assert!(!bool_has_value(&Value::Null));
    }

    #[test]
    fn test_mapping_has_value() {
        assert!(mapping_has_value(&json!({"findMany": "find"})));
        assert!(!mapping_has_value(&json!({})));
        assert!(!mapping_has_value(&json!(["findMany"])));
    }

    #[test]
    fn test_path_is_valid() {
        assert!(path_is_valid("/"));
        assert!(path_is_valid("/export/json"));
        assert!(!path_is_valid(""));
        assert!(!path_is_valid("export"));
        assert!(path_is_valid("/:key"));
        assert!(path_is_valid("/{org}/members/{key}"));
        assert!(path_is_valid("/files/{*rest}"));
    }

    #[test]
    fn test_path_is_valid_rejects_malformed_templates() {
        assert!(!path_is_valid("/{"));
        assert!(!path_is_valid("/x{y"));
        assert!(!path_is_valid("/x{y}"));
        assert!(!path_is_valid("/{id}}"));
        assert!(!path_is_valid("/{1st}"));
        assert!(!path_is_valid("/{*rest}/tail"));
        assert!(!path_is_valid("/{id}/items/:id"));
    }

    #[test]
    fn test_path_segment_parse() {
        assert_eq!(PathSegment::parse("items"), Some(PathSegment::Static("items")));
        assert_eq!(PathSegment::parse(""), Some(PathSegment::Static("")));
        assert_eq!(PathSegment::parse("{id}"), Some(PathSegment::Param("id")));
        assert_eq!(PathSegment::parse("{*rest}"), Some(PathSegment::CatchAll("rest")));
        assert_eq!(PathSegment::parse("{id"), None);
    }

    #[test]
    fn test_entity_name_is_valid() {
        assert!(entity_name_is_valid("users"));
        assert!(entity_name_is_valid("order-items"));
        assert!(!entity_name_is_valid(""));
        assert!(!entity_name_is_valid("users/admin"));
        assert!(!entity_name_is_valid("user s"));
        assert!(!entity_name_is_valid("{users}"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/:id"), "/{id}");
        assert_eq!(normalize_path("/:id/items/:item_id"), "/{id}/items/{item_id}");
        assert_eq!(normalize_path("/{id}"), "/{id}");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_path_params() {
        assert_eq!(path_params("/{id}"), vec!["id"]);
        assert_eq!(path_params("/{org}/members/{key}"), vec!["org", "key"]);
        assert!(path_params("/export/json").is_empty());
    }
}
