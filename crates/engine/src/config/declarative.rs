//! Declarative service configuration loaded from YAML or JSON

use super::{DocumentOverrides, Pagination, PathConfig, ServiceConfig};
use crate::glob::Glob;
use openapi_graph_extractor_common::{ArgMap, ArgValue, ExtractError, RequestConfig, Result};
use openapi_graph_extractor_generator::FieldTypeHook;
use openapi_graph_extractor_parser::{Operation, ParameterLocation};
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level config file
///
/// ```yaml
/// openApiVersion: "2.0"
/// overrides:
///   host: tracker.example.com
/// headers:
///   authorization: Bearer ${TRACKER_TOKEN}
/// allPaths:
///   pathArgs: { projectId: 20 }
///   queryArgs: { project: 20 }
///   require:
///     queryArgs: { project: 20 }
/// paths:
///   - pattern: /system/**
///     skip: true
/// pagination:
///   limit: 50
///   offsetParam: startAt
///   limitParam: maxResults
/// graphql:
///   fields:
///     id: ID @unique
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativeConfig {
    /// Path or URL of the API document; takes precedence over the command line
    #[serde(default)]
    pub open_api_document: Option<String>,

    #[serde(default)]
    pub open_api_version: Option<String>,

    #[serde(default)]
    pub scheme: Option<String>,

    #[serde(default)]
    pub overrides: DocumentOverrides,

    /// Static request headers; values may reference `${ENV_VAR}`
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub all_paths: Option<DeclarativePath>,

    #[serde(default)]
    pub paths: Vec<DeclarativePath>,

    #[serde(default)]
    pub pagination: Option<DeclarativePagination>,

    #[serde(default)]
    pub graphql: Option<GraphqlConfig>,
}

/// Arguments contributed to requests for matching paths
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativePath {
    /// Glob over path templates; ignored for `allPaths`
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub skip: bool,

    #[serde(default)]
    pub path_args: ArgMap,

    #[serde(default)]
    pub query_args: ArgMap,

    #[serde(default)]
    pub header_args: ArgMap,

    /// Only supply an argument when the operation declares a parameter of
    /// that name in that location
    #[serde(default = "default_only_declared")]
    pub only_declared: bool,

    /// Skip the resource when an incoming argument differs from these values
    #[serde(default)]
    pub require: Option<RequestConfig>,
}

fn default_only_declared() -> bool {
    true
}

/// Offset pagination keyed on declared query parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativePagination {
    pub limit: usize,

    #[serde(default = "default_offset_param")]
    pub offset_param: String,

    #[serde(default = "default_limit_param")]
    pub limit_param: String,

    /// Query parameters an operation must declare to be paginated;
    /// defaults to the offset and limit parameters
    #[serde(default)]
    pub required_params: Vec<String>,

    /// Pause between page requests
    #[serde(default)]
    pub delay_ms: Option<u64>,

    #[serde(default)]
    pub cursor: Option<CursorConfig>,
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

/// Last-ID pagination for specific operations
///
/// The offset of the next page is the identifier of the last item returned
/// rather than a running count.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorConfig {
    /// `operationId`s paginated by cursor
    pub operations: Vec<String>,

    /// Query parameter carrying the last seen identifier
    pub param: String,

    pub page_size: usize,

    #[serde(default = "default_id_field")]
    pub id_field: String,
}

fn default_id_field() -> String {
    "id".to_string()
}

/// SDL overrides keyed by `Type.field` or bare `field`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphqlConfig {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl DeclarativeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ExtractError::Config(format!(
                "Failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse YAML (JSON is accepted as a subset)
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| ExtractError::Config(format!("Invalid config: {}", e)))
    }

    /// Build the hook-based configuration, expanding environment references
    pub fn into_service_config(self) -> Result<ServiceConfig> {
        self.into_service_config_with(|name| std::env::var(name).ok())
    }

    /// Like [`into_service_config`](Self::into_service_config) with a custom variable lookup
    pub fn into_service_config_with<L>(self, lookup: L) -> Result<ServiceConfig>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = ServiceConfig {
            open_api_version: self.open_api_version,
            overrides: self.overrides,
            ..ServiceConfig::default()
        };
        if let Some(scheme) = self.scheme {
            config.scheme = scheme;
        }

        for (name, value) in self.headers {
            config.headers.insert(name, expand_env(&value, &lookup)?);
        }

        for path in self.paths {
            let pattern = path.pattern.clone().ok_or_else(|| {
                ExtractError::Config("Every entry under 'paths' needs a 'pattern'".to_string())
            })?;
            config
                .paths
                .push((Glob::new(&pattern)?, Box::new(path.expanded(&lookup)?)));
        }

        if let Some(all) = self.all_paths {
            config.all_paths = Some(Box::new(all.expanded(&lookup)?));
        }

        if let Some(pagination) = self.pagination {
            config.pagination = Some(Box::new(pagination));
        }

        if let Some(graphql) = self.graphql {
            if !graphql.fields.is_empty() {
                config.graphql = Some(Box::new(graphql));
            }
        }

        Ok(config)
    }
}

impl DeclarativePath {
    fn expanded<L>(mut self, lookup: &L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        for map in [&mut self.path_args, &mut self.query_args, &mut self.header_args] {
            expand_args(map, lookup)?;
        }
        if let Some(require) = self.require.as_mut() {
            expand_args(&mut require.path_args, lookup)?;
            expand_args(&mut require.query_args, lookup)?;
            expand_args(&mut require.header_args, lookup)?;
        }
        Ok(self)
    }

    fn conflicts(&self, args: &RequestConfig) -> bool {
        let Some(require) = &self.require else {
            return false;
        };
        differs(&require.path_args, &args.path_args)
            || differs(&require.query_args, &args.query_args)
            || differs(&require.header_args, &args.header_args)
    }
}

/// Whether `actual` sets any key of `required` to a different value
fn differs(required: &ArgMap, actual: &ArgMap) -> bool {
    required.iter().any(|(name, expected)| {
        actual
            .get(name)
            .is_some_and(|value| value.to_string() != expected.to_string())
    })
}

fn select(args: &ArgMap, operation: &Operation, location: ParameterLocation, only_declared: bool) -> ArgMap {
    args.iter()
        .filter(|(name, _)| !only_declared || operation.declares(name, location))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

impl PathConfig for DeclarativePath {
    fn skip(&self) -> bool {
        self.skip
    }

    fn prepare(&self, operation: &Operation, args: &RequestConfig) -> Option<RequestConfig> {
        if self.conflicts(args) {
            return None;
        }

        Some(RequestConfig {
            path_args: select(&self.path_args, operation, ParameterLocation::Path, self.only_declared),
            query_args: select(&self.query_args, operation, ParameterLocation::Query, self.only_declared),
            header_args: select(&self.header_args, operation, ParameterLocation::Header, self.only_declared),
            body_args: ArgMap::new(),
        })
    }
}

impl DeclarativePagination {
    fn cursor_for(&self, operation: &Operation) -> Option<&CursorConfig> {
        let id = operation.operation_id.as_deref()?;
        self.cursor
            .as_ref()
            .filter(|cursor| cursor.operations.iter().any(|op| op == id))
    }
}

impl Pagination for DeclarativePagination {
    fn limit(&self) -> usize {
        self.limit
    }

    fn limit_for(&self, operation: &Operation) -> usize {
        self.cursor_for(operation)
            .map(|cursor| cursor.page_size)
            .unwrap_or(self.limit)
    }

    fn requires_pagination(&self, operation: &Operation) -> bool {
        let declared = |name: &str| operation.declares(name, ParameterLocation::Query);
        if self.required_params.is_empty() {
            declared(&self.offset_param) && declared(&self.limit_param)
        } else {
            self.required_params.iter().all(|p| declared(p))
        }
    }

    fn next_page(&self, offset: u64, operation: &Operation) -> RequestConfig {
        match self.cursor_for(operation) {
            Some(cursor) => RequestConfig::new()
                .with_query_arg(self.limit_param.clone(), cursor.page_size as u64)
                .with_query_arg(cursor.param.clone(), offset),
            None => RequestConfig::new()
                .with_query_arg(self.offset_param.clone(), offset)
                .with_query_arg(self.limit_param.clone(), self.limit as u64),
        }
    }

    fn next_offset(&self, current: u64, items: &[Value], operation: &Operation) -> u64 {
        let Some(cursor) = self.cursor_for(operation) else {
            return current + items.len() as u64;
        };

        items
            .last()
            .and_then(|item| item.get(&cursor.id_field))
            .and_then(|id| match id {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(current + items.len() as u64)
    }

    fn pace(&self) -> Option<Duration> {
        self.delay_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}

impl FieldTypeHook for GraphqlConfig {
    fn field(&self, name: &str, _inferred_type: &str, type_label: &str) -> Option<String> {
        self.fields
            .get(&format!("{}.{}", type_label, name))
            .or_else(|| self.fields.get(name))
            .cloned()
    }
}

fn env_pattern() -> Result<Regex> {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ExtractError::Config(format!("Invalid environment pattern: {}", e)))
}

/// Replace `${NAME}` references with values from `lookup`
fn expand_env<L>(value: &str, lookup: &L) -> Result<String>
where
    L: Fn(&str) -> Option<String>,
{
    let pattern = env_pattern()?;
    let mut missing = Vec::new();
    let expanded = pattern.replace_all(value, |caps: &Captures| match lookup(&caps[1]) {
        Some(v) => v,
        None => {
            missing.push(caps[1].to_string());
            String::new()
        }
    });

    if !missing.is_empty() {
        return Err(ExtractError::Config(format!(
            "Environment variable(s) not set: {}",
            missing.join(", ")
        )));
    }

    Ok(expanded.into_owned())
}

fn expand_args<L>(args: &mut ArgMap, lookup: &L) -> Result<()>
where
    L: Fn(&str) -> Option<String>,
{
    for value in args.values_mut() {
        if let ArgValue::String(s) = value {
            *s = expand_env(s, lookup)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openapi_graph_extractor_parser::{Parameter, ParameterOrRef};
    use serde_json::json;

    const CONFIG: &str = r#"
openApiVersion: "2.0"
overrides:
  host: tracker.example.com
  basePath: /rest/v1
headers:
  authorization: Bearer ${TRACKER_TOKEN}
allPaths:
  pathArgs:
    projectId: 20
  queryArgs:
    project: 20
  require:
    queryArgs:
      project: 20
paths:
  - pattern: /system/**
    skip: true
  - pattern: /items
    onlyDeclared: false
    queryArgs:
      include: all
pagination:
  limit: 50
  offsetParam: startAt
  limitParam: maxResults
  delayMs: 250
  cursor:
    operations: [getRelationships]
    param: lastId
    pageSize: 1000
graphql:
  fields:
    id: ID @unique
    Item.name: String @unique
"#;

    fn param(name: &str, location: ParameterLocation) -> ParameterOrRef {
        ParameterOrRef::Parameter(Parameter {
            name: name.to_string(),
            location,
            description: None,
            required: false,
            param_type: Some("string".to_string()),
            format: None,
        })
    }

    fn operation(id: &str, params: Vec<ParameterOrRef>) -> Operation {
        Operation {
            operation_id: Some(id.to_string()),
            parameters: params,
            ..Operation::default()
        }
    }

    fn lookup(name: &str) -> Option<String> {
        (name == "TRACKER_TOKEN").then(|| "s3cret".to_string())
    }

    fn service() -> ServiceConfig {
        DeclarativeConfig::from_yaml(CONFIG)
            .unwrap()
            .into_service_config_with(lookup)
            .unwrap()
    }

    #[test]
    fn test_top_level_fields() {
        let config = service();

        assert_eq!(config.open_api_version.as_deref(), Some("2.0"));
        assert_eq!(config.scheme, "https");
        assert_eq!(config.overrides.host.as_deref(), Some("tracker.example.com"));
        assert_eq!(config.headers["authorization"], "Bearer s3cret");
        assert_eq!(config.paths.len(), 2);
        assert!(config.paths_matching("/system/settings").all(|p| p.skip()));
    }

    #[test]
    fn test_missing_env_var_is_error() {
        let result = DeclarativeConfig::from_yaml(CONFIG)
            .unwrap()
            .into_service_config_with(|_| None);

        assert!(matches!(result, Err(ExtractError::Config(msg)) if msg.contains("TRACKER_TOKEN")));
    }

    #[test]
    fn test_only_declared_args() {
        let config = service();
        let all = config.all_paths.as_ref().unwrap();

        let listing = operation(
            "getItems",
            vec![param("project", ParameterLocation::Query)],
        );
        let prepared = all.prepare(&listing, &RequestConfig::default()).unwrap();
        assert_eq!(prepared.query_args["project"], ArgValue::Integer(20));
        assert!(prepared.path_args.is_empty());

        let nested = operation("getProject", vec![param("projectId", ParameterLocation::Path)]);
        let prepared = all.prepare(&nested, &RequestConfig::default()).unwrap();
        assert_eq!(prepared.path_args["projectId"], ArgValue::Integer(20));
        assert!(prepared.query_args.is_empty());
    }

    #[test]
    fn test_undeclared_args_when_allowed() {
        let config = service();
        let items = config.paths_matching("/items").next().unwrap();

        let prepared = items
            .prepare(&operation("getItems", vec![]), &RequestConfig::default())
            .unwrap();
        assert_eq!(prepared.query_args["include"], ArgValue::from("all"));
    }

    #[test]
    fn test_require_skips_conflicting_args() {
        let config = service();
        let all = config.all_paths.as_ref().unwrap();
        let listing = operation("getItems", vec![param("project", ParameterLocation::Query)]);

        let other_project = RequestConfig::new().with_query_arg("project", "21");
        assert!(all.prepare(&listing, &other_project).is_none());

        let same_project = RequestConfig::new().with_query_arg("project", "20");
        assert!(all.prepare(&listing, &same_project).is_some());
    }

    #[test]
    fn test_offset_pagination() {
        let config = service();
        let pagination = config.pagination.as_ref().unwrap();
        let paged = operation(
            "getItems",
            vec![
                param("startAt", ParameterLocation::Query),
                param("maxResults", ParameterLocation::Query),
            ],
        );
        let unpaged = operation("getItem", vec![param("startAt", ParameterLocation::Query)]);

        assert!(pagination.requires_pagination(&paged));
        assert!(!pagination.requires_pagination(&unpaged));
        assert_eq!(pagination.limit_for(&paged), 50);

        let page = pagination.next_page(100, &paged);
        assert_eq!(page.query_args["startAt"], ArgValue::Integer(100));
        assert_eq!(page.query_args["maxResults"], ArgValue::Integer(50));

        let items = vec![json!({ "id": 7 }), json!({ "id": 9 })];
        assert_eq!(pagination.next_offset(100, &items, &paged), 102);
        assert_eq!(pagination.pace(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_cursor_pagination() {
        let config = service();
        let pagination = config.pagination.as_ref().unwrap();
        let relationships = operation(
            "getRelationships",
            vec![
                param("startAt", ParameterLocation::Query),
                param("maxResults", ParameterLocation::Query),
            ],
        );

        assert_eq!(pagination.limit_for(&relationships), 1000);

        let page = pagination.next_page(812, &relationships);
        assert_eq!(page.query_args["lastId"], ArgValue::Integer(812));
        assert_eq!(page.query_args["maxResults"], ArgValue::Integer(1000));

        let items = vec![json!({ "id": 900 }), json!({ "id": "1337" })];
        assert_eq!(pagination.next_offset(812, &items, &relationships), 1337);
    }

    #[test]
    fn test_graphql_field_overrides() {
        let config = service();
        let hook = config.graphql.as_ref().unwrap();

        assert_eq!(hook.field("id", "Int", "Project").as_deref(), Some("ID @unique"));
        assert_eq!(hook.field("name", "String", "Item").as_deref(), Some("String @unique"));
        assert_eq!(hook.field("name", "String", "Project"), None);
    }

    #[test]
    fn test_missing_pattern_is_error() {
        let result = DeclarativeConfig::from_yaml("paths:\n  - skip: true\n")
            .unwrap()
            .into_service_config_with(lookup);

        assert!(result.is_err());
    }
}
