//! Service configuration consumed by the extraction engine
//!
//! Configuration is expressed through a handful of hook traits so that a
//! service can be described either programmatically or through the
//! declarative YAML format in [`declarative`].

mod declarative;

pub use declarative::{
    CursorConfig, DeclarativeConfig, DeclarativePagination, DeclarativePath, GraphqlConfig,
};

use crate::glob::Glob;
use openapi_graph_extractor_common::{RequestConfig, Result};
use openapi_graph_extractor_generator::FieldTypeHook;
use openapi_graph_extractor_parser::Operation;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Hook applied to every path matching a glob (or to all paths)
pub trait PathConfig: Send + Sync {
    /// Skip matching paths entirely
    fn skip(&self) -> bool {
        false
    }

    /// Arguments to contribute to a request for `operation`
    ///
    /// `args` holds the arguments the request started with. Returning `None`
    /// skips the resource. Keys already set on the request are never
    /// overwritten by the returned config.
    fn prepare(&self, operation: &Operation, args: &RequestConfig) -> Option<RequestConfig>;
}

/// Offset-based pagination policy
pub trait Pagination: Send + Sync {
    /// Page size; a page with fewer results ends pagination
    fn limit(&self) -> usize;

    /// Page size for a particular operation
    fn limit_for(&self, _operation: &Operation) -> usize {
        self.limit()
    }

    fn requires_pagination(&self, operation: &Operation) -> bool;

    /// Query arguments selecting the page starting at `offset`
    fn next_page(&self, offset: u64, operation: &Operation) -> RequestConfig;

    /// Offset of the page after the one that returned `items`
    fn next_offset(&self, current: u64, items: &[Value], _operation: &Operation) -> u64 {
        current + items.len() as u64
    }

    /// Delay between consecutive page requests
    fn pace(&self) -> Option<Duration> {
        None
    }
}

/// Replacements for the `host` and `basePath` of the document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOverrides {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub base_path: Option<String>,
}

/// Everything the engine needs to know about a service beyond its document
pub struct ServiceConfig {
    /// Expected OpenAPI version of the document, if asserted
    pub open_api_version: Option<String>,
    /// URL scheme for the API root
    pub scheme: String,
    pub overrides: DocumentOverrides,
    /// Static headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Path-specific hooks, applied in declaration order
    pub paths: Vec<(Glob, Box<dyn PathConfig>)>,
    pub all_paths: Option<Box<dyn PathConfig>>,
    pub pagination: Option<Box<dyn Pagination>>,
    pub graphql: Option<Box<dyn FieldTypeHook>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            open_api_version: None,
            scheme: "https".to_string(),
            overrides: DocumentOverrides::default(),
            headers: BTreeMap::new(),
            paths: Vec::new(),
            all_paths: None,
            pagination: None,
            graphql: None,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_api_version(mut self, version: impl Into<String>) -> Self {
        self.open_api_version = Some(version.into());
        self
    }

    pub fn with_overrides(mut self, overrides: DocumentOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Register a hook for paths matching `pattern`
    pub fn with_path(mut self, pattern: &str, config: impl PathConfig + 'static) -> Result<Self> {
        self.paths.push((Glob::new(pattern)?, Box::new(config)));
        Ok(self)
    }

    /// Shorthand for a hook that skips every path matching `pattern`
    pub fn skip_path(self, pattern: &str) -> Result<Self> {
        self.with_path(pattern, SkipPath)
    }

    pub fn with_all_paths(mut self, config: impl PathConfig + 'static) -> Self {
        self.all_paths = Some(Box::new(config));
        self
    }

    pub fn with_pagination(mut self, pagination: impl Pagination + 'static) -> Self {
        self.pagination = Some(Box::new(pagination));
        self
    }

    pub fn with_graphql(mut self, hook: impl FieldTypeHook + 'static) -> Self {
        self.graphql = Some(Box::new(hook));
        self
    }

    /// Hooks whose pattern matches `template`, in declaration order
    pub fn paths_matching<'a>(
        &'a self,
        template: &'a str,
    ) -> impl Iterator<Item = &'a dyn PathConfig> + 'a {
        self.paths
            .iter()
            .filter(move |(glob, _)| glob.is_match(template))
            .map(|(_, config)| config.as_ref())
    }
}

/// Path hook that only skips
pub struct SkipPath;

impl PathConfig for SkipPath {
    fn skip(&self) -> bool {
        true
    }

    fn prepare(&self, _operation: &Operation, _args: &RequestConfig) -> Option<RequestConfig> {
        None
    }
}

/// Blanket hook for closures used as `prepare`
impl<F> PathConfig for F
where
    F: Fn(&Operation, &RequestConfig) -> Option<RequestConfig> + Send + Sync,
{
    fn prepare(&self, operation: &Operation, args: &RequestConfig) -> Option<RequestConfig> {
        self(operation, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(usize);

    impl Pagination for Fixed {
        fn limit(&self) -> usize {
            self.0
        }

        fn requires_pagination(&self, _operation: &Operation) -> bool {
            true
        }

        fn next_page(&self, offset: u64, _operation: &Operation) -> RequestConfig {
            RequestConfig::default()
                .with_query_arg("startAt", offset)
                .with_query_arg("maxResults", self.0 as u64)
        }
    }

    #[test]
    fn test_pagination_defaults() {
        let pagination = Fixed(20);
        let operation = Operation::default();

        assert_eq!(pagination.limit_for(&operation), 20);
        assert_eq!(
            pagination.next_offset(40, &[Value::Null, Value::Null], &operation),
            42
        );
        assert!(pagination.pace().is_none());
    }

    #[test]
    fn test_paths_matching_in_order() {
        let config = ServiceConfig::new()
            .skip_path("/system/**")
            .unwrap()
            .with_path("/**", |_: &Operation, _: &RequestConfig| {
                Some(RequestConfig::default())
            })
            .unwrap();

        let matched: Vec<bool> = config
            .paths_matching("/system/settings")
            .map(|c| c.skip())
            .collect();
        assert_eq!(matched, vec![true, false]);
        assert_eq!(config.paths_matching("/items").count(), 1);
    }

    #[test]
    fn test_regex_characters_are_literal() {
        let config = ServiceConfig::new().skip_path("/items/(archived)").unwrap();

        assert_eq!(config.paths_matching("/items/(archived)").count(), 1);
        assert_eq!(config.paths_matching("/items/archived").count(), 0);
    }
}
