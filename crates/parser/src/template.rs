//! Path template helpers
//!
//! Templates look like `/projects/{projectId}/items/{itemId}`; segments in
//! braces are parameters.

use openapi_graph_extractor_common::{ArgMap, ArgValue};

/// Whether the template has any `{param}` segment
pub fn is_parameterized(template: &str) -> bool {
    template.contains('{')
}

/// Substitute `{name}` placeholders with the matching path arguments
pub fn substitute(template: &str, args: &ArgMap) -> String {
    let mut actual = template.to_string();
    for (name, value) in args {
        actual = actual.replace(&format!("{{{}}}", name), &value.to_string());
    }
    actual
}

/// Parameter name of a `{param}` segment
fn parameter_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// Match a concrete resource path against a template
///
/// Segment counts must agree and literal segments must be equal; each
/// `{param}` segment binds the corresponding path segment. Returns the bound
/// path arguments on a full match.
pub fn match_path(template: &str, path: &str) -> Option<ArgMap> {
    let template_parts: Vec<&str> = template.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();

    if template_parts.len() != path_parts.len() {
        return None;
    }

    let mut args = ArgMap::new();
    for (expected, actual) in template_parts.iter().zip(&path_parts) {
        if let Some(name) = parameter_name(expected) {
            args.insert(name.to_string(), ArgValue::String((*actual).to_string()));
        } else if expected != actual {
            return None;
        }
    }

    Some(args)
}

/// First segment of a template, e.g. `projects` for `/projects/{id}`
///
/// Used as the key that identifies a resource kind by its canonical listing path.
pub fn type_key(template: &str) -> &str {
    template
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_binds_parameters() {
        let args = match_path("/projects/{projectId}/items/{itemId}", "/projects/42/items/7").unwrap();
        assert_eq!(args["projectId"], ArgValue::from("42"));
        assert_eq!(args["itemId"], ArgValue::from("7"));
    }

    #[test]
    fn test_match_requires_same_segment_count() {
        assert!(match_path("/projects/{projectId}", "/projects/42/items/7").is_none());
        assert!(match_path("/projects/{projectId}/items/{itemId}/tags", "/projects/42/items/7").is_none());
    }

    #[test]
    fn test_match_requires_literal_segments() {
        assert!(match_path("/projects/{projectId}/users/{userId}", "/projects/42/items/7").is_none());
        assert!(match_path("/items", "/items").unwrap().is_empty());
    }

    #[test]
    fn test_substitute_and_helpers() {
        let mut args = ArgMap::new();
        args.insert("projectId".into(), ArgValue::Integer(42));
        assert_eq!(substitute("/projects/{projectId}/items", &args), "/projects/42/items");

        assert!(is_parameterized("/projects/{projectId}"));
        assert!(!is_parameterized("/projects"));
        assert_eq!(type_key("/projects/{projectId}/items"), "projects");
        assert_eq!(type_key("/items"), "items");
    }
}
