//! The extraction engine: sweep every GET path, then crawl discovered links
//! until no new resources turn up.

use crate::config::ServiceConfig;
use crate::fetch::{Fetch, FetchRequest};
use crate::sink::TripleSink;
use crate::translator::Translator;
use openapi_graph_extractor_common::{
    ArgMap, ArgValue, Diagnostics, ExtractError, RequestConfig, Result,
};
use openapi_graph_extractor_generator::{SchemaArtifacts, SchemaInferencer};
use openapi_graph_extractor_parser::{
    template, Dereferencer, OpenApiDocument, Operation, Parameter, ParameterLocation,
    ResolvedSchema,
};
use serde_json::Value;
use std::collections::BTreeSet;
use url::form_urlencoded;

/// Outcome of a completed extraction run
#[derive(Debug)]
pub struct Extraction<S> {
    pub sink: S,
    pub artifacts: SchemaArtifacts,
    pub diagnostics: Diagnostics,
    /// Root-relative paths of every resource written
    pub obtained: BTreeSet<String>,
    /// Number of HTTP requests issued
    pub fetch_count: usize,
}

/// Sweeps and crawls one OpenAPI v2 service
///
/// Fetches are issued strictly one after another; the engine owns the
/// `obtained` and `discovered` sets, the schema accumulator and the sink for
/// the whole run.
pub struct Extractor<F: Fetch, S: TripleSink> {
    document: OpenApiDocument,
    config: ServiceConfig,
    fetcher: F,
    sink: S,
    inferencer: SchemaInferencer,
    /// Resources already translated
    obtained: BTreeSet<String>,
    /// Resources found through links and not yet obtained
    discovered: BTreeSet<String>,
    /// Resources the crawl already tried to obtain
    attempted: BTreeSet<String>,
    diagnostics: Diagnostics,
    root: String,
    fetch_count: usize,
}

impl<F: Fetch, S: TripleSink> Extractor<F, S> {
    /// Validate the document against the config and compute the API root
    pub fn new(
        mut document: OpenApiDocument,
        config: ServiceConfig,
        fetcher: F,
        sink: S,
    ) -> Result<Self> {
        let root = resolve_root(&mut document, &config)?;
        tracing::debug!(root = %root, "Resolved API root");

        Ok(Self {
            document,
            config,
            fetcher,
            sink,
            inferencer: SchemaInferencer::new(),
            obtained: BTreeSet::new(),
            discovered: BTreeSet::new(),
            attempted: BTreeSet::new(),
            diagnostics: Diagnostics::new(),
            root,
            fetch_count: 0,
        })
    }

    /// `{scheme}://{host}{basePath}`
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Namespace for local predicates and definitions
    pub fn base(&self) -> String {
        format!("{}#", self.root)
    }

    pub fn document(&self) -> &OpenApiDocument {
        &self.document
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn inferencer(&self) -> &SchemaInferencer {
        &self.inferencer
    }

    pub fn obtained(&self) -> &BTreeSet<String> {
        &self.obtained
    }

    pub fn discovered(&self) -> &BTreeSet<String> {
        &self.discovered
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Sweep, crawl, close the sink and render the schema artifacts
    pub async fn run(mut self) -> Result<Extraction<S>> {
        self.sweep().await?;
        self.crawl().await?;
        self.sink.end()?;

        let base = self.base();
        let artifacts =
            self.inferencer
                .dump(self.config.graphql.as_deref(), &base, &mut self.diagnostics)?;

        tracing::info!(
            resources = self.obtained.len(),
            requests = self.fetch_count,
            warnings = self.diagnostics.warnings().len(),
            "Extraction complete"
        );

        Ok(Extraction {
            sink: self.sink,
            artifacts,
            diagnostics: self.diagnostics,
            obtained: self.obtained,
            fetch_count: self.fetch_count,
        })
    }

    /// Obtain every path of the document with no initial arguments
    pub async fn sweep(&mut self) -> Result<()> {
        let templates: Vec<String> = self
            .document
            .paths()
            .iter()
            .map(|(template, _)| template.to_string())
            .collect();

        tracing::info!(paths = templates.len(), "Sweeping document paths");

        for template in templates {
            self.obtain(&template, RequestConfig::new()).await?;
        }

        Ok(())
    }

    /// Fetch discovered resources generation by generation until none remain
    pub async fn crawl(&mut self) -> Result<()> {
        let mut generation = 0usize;

        while !self.discovered.is_empty() {
            generation += 1;
            let batch = std::mem::take(&mut self.discovered);
            tracing::info!(generation, resources = batch.len(), "Crawling discovered resources");

            for resource in batch {
                // a resource whose fetch failed or was skipped is never retried,
                // so links that keep pointing at it cannot loop the crawl
                if self.obtained.contains(&resource) || !self.attempted.insert(resource.clone()) {
                    continue;
                }

                let Some((template, request)) = self.match_resource(&resource) else {
                    continue;
                };
                self.obtain(&template, request).await?;
            }
        }

        Ok(())
    }

    /// Prepare and submit the GET operation of `template`
    ///
    /// Skip conditions are reported to the diagnostics and return `Ok(())`.
    pub async fn obtain(&mut self, template: &str, request: RequestConfig) -> Result<()> {
        let Some(operation) = self.document.path(template).and_then(|p| p.get.clone()) else {
            return Ok(());
        };

        let Some(request) = self.prepare(template, &operation, request) else {
            tracing::debug!(path = template, "Skipped by path configuration");
            return Ok(());
        };

        let missing: Vec<&str> = operation
            .parameters()
            .filter(|p| p.required && !is_satisfied(&request, p))
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            self.diagnostics.warn(format!(
                "Skipping {} since it requires parameters for: {}",
                template,
                missing.join(", ")
            ));
            return Ok(());
        }

        let schema = match self.document.response_schema(&operation, "200") {
            Some(response) => Dereferencer::new(self.document.raw()).resolve(response)?,
            None => {
                self.diagnostics.warn(format!(
                    "Skipping {} since it does not have a defined response schema",
                    template
                ));
                return Ok(());
            }
        };

        self.submit(&operation, template, request, &schema).await
    }

    /// Run path-specific hooks in order, then the catch-all hook
    fn prepare(
        &self,
        template: &str,
        operation: &Operation,
        incoming: RequestConfig,
    ) -> Option<RequestConfig> {
        let mut request = incoming.clone();

        for config in self.config.paths_matching(template) {
            if config.skip() {
                return None;
            }
            request.merge_absent(config.prepare(operation, &incoming)?);
        }

        if let Some(all) = self.config.all_paths.as_deref() {
            if all.skip() {
                return None;
            }
            request.merge_absent(all.prepare(operation, &incoming)?);
        }

        Some(request)
    }

    /// Fetch and translate every page of one resource
    async fn submit(
        &mut self,
        operation: &Operation,
        template: &str,
        request: RequestConfig,
        schema: &ResolvedSchema,
    ) -> Result<()> {
        let actual = template::substitute(template, &request.path_args);
        let paginating = self
            .config
            .pagination
            .as_deref()
            .is_some_and(|p| p.requires_pagination(operation));

        let mut headers = self.config.headers.clone();
        for (name, value) in &request.header_args {
            headers.insert(name.clone(), value.to_string());
        }
        headers.insert("accept".to_string(), operation.accept());
        let fetch_request = FetchRequest { headers };

        let mut offset = 0u64;
        let mut page = 0usize;

        loop {
            let mut query = request.query_args.clone();
            if paginating {
                if let Some(pagination) = self.config.pagination.as_deref() {
                    for (name, value) in pagination.next_page(offset, operation).query_args {
                        query.entry(name).or_insert(value);
                    }
                }
            }

            if page > 0 {
                if let Some(delay) = self.config.pagination.as_deref().and_then(|p| p.pace()) {
                    tokio::time::sleep(delay).await;
                }
            }

            let url = self.request_url(&actual, &query);
            tracing::debug!(url = %url, page, "Fetching page");

            let response = self.fetcher.fetch(&url, &fetch_request).await?;
            self.fetch_count += 1;

            if !response.is_success() {
                match response.status {
                    401 => return Err(ExtractError::Unauthorized { url }),
                    404 if template::is_parameterized(template) => {
                        self.diagnostics.warn(format!(
                            "An item may have been deleted while extracting <{}>",
                            url
                        ));
                    }
                    404 => return Err(ExtractError::NotFound { url }),
                    status => {
                        tracing::debug!(url = %url, status, "Unexpected response status");
                        self.diagnostics.warn(format!(
                            "Non-200 response from <{}>; aborting pagination",
                            url
                        ));
                    }
                }
                break;
            }

            let body = response.json()?;
            let translation = Translator::new(
                &self.root,
                template,
                &actual,
                schema,
                &body,
                &mut self.sink,
                &mut self.obtained,
                &mut self.diagnostics,
            )
            .run(&mut self.inferencer)?;

            for resource in translation.discovered {
                if !self.obtained.contains(&resource) {
                    self.discovered.insert(resource);
                }
            }

            if !paginating {
                break;
            }
            let Some(pagination) = self.config.pagination.as_deref() else {
                break;
            };

            let items = page_items(&body);
            if items.len() < pagination.limit_for(operation) {
                break;
            }

            let next = pagination.next_offset(offset, items, operation);
            if next == offset {
                self.diagnostics.warn(format!(
                    "Pagination offset did not advance for <{}>; stopping",
                    url
                ));
                break;
            }
            offset = next;
            page += 1;
        }

        Ok(())
    }

    fn request_url(&self, actual: &str, query: &ArgMap) -> String {
        let mut url = format!("{}{}", self.root, actual);
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.to_string())))
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }

    /// First path template matching a discovered resource, with its bound arguments
    ///
    /// A query string on the resource is carried over as query arguments.
    fn match_resource(&mut self, resource: &str) -> Option<(String, RequestConfig)> {
        let (path, query) = match resource.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (resource, None),
        };

        for (candidate, item) in self.document.paths().iter() {
            let Some(path_args) = template::match_path(candidate, path) else {
                continue;
            };

            if item.get.is_none() {
                self.diagnostics.warn(format!(
                    "Cannot dereference linked resource since the associated path in the OpenAPI document does not have a GET method associated with it: {}",
                    candidate
                ));
                continue;
            }

            let query_args: ArgMap = query
                .map(|q| {
                    form_urlencoded::parse(q.as_bytes())
                        .map(|(k, v)| (k.into_owned(), ArgValue::String(v.into_owned())))
                        .collect()
                })
                .unwrap_or_default();

            let request = RequestConfig {
                path_args,
                query_args,
                ..RequestConfig::default()
            };
            return Some((candidate.to_string(), request));
        }

        self.diagnostics.warn(format!(
            "Failed to match discovered resource to a path in the document schema: {}",
            resource
        ));
        None
    }
}

/// Check the document version, apply overrides and compute `{scheme}://{host}{basePath}`
///
/// Applying the same config twice yields the same root.
pub fn resolve_root(document: &mut OpenApiDocument, config: &ServiceConfig) -> Result<String> {
    if let Some(version) = config.open_api_version.as_deref() {
        if version != "2.0" {
            return Err(ExtractError::Config(format!(
                "Unable to verify document version '{}'",
                version
            )));
        }
        if document.swagger_version() != Some("2.0") {
            return Err(ExtractError::Config(
                "The document OpenAPI (swagger) version does not match the expected '2.0' version identifier"
                    .to_string(),
            ));
        }
    }

    if document.swagger_version() != Some("2.0") {
        return Err(ExtractError::Parse(format!(
            "OpenAPI version {} not yet implemented",
            document.swagger_version().unwrap_or("<missing>")
        )));
    }

    if let Some(host) = config.overrides.host.as_deref().filter(|h| !h.is_empty()) {
        document.set_host(host);
    }
    if let Some(base_path) = config.overrides.base_path.as_deref().filter(|b| !b.is_empty()) {
        document.set_base_path(base_path);
    }

    let host = document.host().filter(|h| !h.is_empty());
    let base_path = document.base_path().filter(|b| !b.is_empty());
    let (Some(host), Some(base_path)) = (host, base_path) else {
        return Err(ExtractError::Config(
            "'host' and 'basePath' properties are required to be defined in the document or overriden by the config"
                .to_string(),
        ));
    };

    Ok(format!(
        "{}://{}{}",
        config.scheme,
        host,
        base_path.trim_end_matches('/')
    ))
}

/// Run a full extraction with a fresh engine
pub async fn extract<F: Fetch, S: TripleSink>(
    document: OpenApiDocument,
    config: ServiceConfig,
    fetcher: F,
    sink: S,
) -> Result<Extraction<S>> {
    Extractor::new(document, config, fetcher, sink)?.run().await
}

/// Whether the request already supplies an argument for `parameter`
fn is_satisfied(request: &RequestConfig, parameter: &Parameter) -> bool {
    let args = match parameter.location {
        ParameterLocation::Path => &request.path_args,
        ParameterLocation::Query => &request.query_args,
        ParameterLocation::Header => &request.header_args,
        ParameterLocation::Body | ParameterLocation::FormData => return false,
    };
    args.contains_key(&parameter.name)
}

/// Items of a page for pagination accounting
fn page_items(body: &Value) -> &[Value] {
    match body.get("data") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => &[],
        Some(other) => std::slice::from_ref(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentOverrides;
    use crate::fetch::{FetchResponse, MockFetch};
    use crate::sink::CollectingSink;
    use serde_json::json;

    fn document(paths: Value) -> OpenApiDocument {
        OpenApiDocument::from_value(json!({
            "swagger": "2.0",
            "host": "tracker.example.com",
            "basePath": "/rest/v1",
            "paths": paths,
            "definitions": {
                "Item": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "name": { "type": "string" }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn listing() -> Value {
        json!({
            "get": {
                "responses": {
                    "200": {
                        "schema": {
                            "type": "object",
                            "properties": {
                                "data": { "type": "array", "items": { "$ref": "#/definitions/Item" } }
                            }
                        }
                    }
                }
            }
        })
    }

    fn single() -> Value {
        json!({
            "get": {
                "parameters": [{ "name": "id", "in": "path", "required": true, "type": "integer" }],
                "responses": {
                    "200": {
                        "schema": {
                            "type": "object",
                            "properties": { "data": { "$ref": "#/definitions/Item" } }
                        }
                    }
                }
            }
        })
    }

    fn extractor(paths: Value, fetch: MockFetch) -> Extractor<MockFetch, CollectingSink> {
        Extractor::new(document(paths), ServiceConfig::new(), fetch, CollectingSink::new()).unwrap()
    }

    #[test]
    fn test_root_from_document_and_overrides() {
        let engine = extractor(json!({}), MockFetch::new());
        assert_eq!(engine.root(), "https://tracker.example.com/rest/v1");
        assert_eq!(engine.base(), "https://tracker.example.com/rest/v1#");

        let config = ServiceConfig::new().with_overrides(DocumentOverrides {
            host: Some("staging.example.com".to_string()),
            base_path: Some("/api/".to_string()),
        });
        let engine =
            Extractor::new(document(json!({})), config, MockFetch::new(), CollectingSink::new())
                .unwrap();
        assert_eq!(engine.root(), "https://staging.example.com/api");
        assert_eq!(engine.document().host(), Some("staging.example.com"));
    }

    #[test]
    fn test_missing_host_is_fatal() {
        let document = OpenApiDocument::from_value(json!({ "swagger": "2.0", "paths": {} })).unwrap();
        let result = Extractor::new(document, ServiceConfig::new(), MockFetch::new(), CollectingSink::new());

        assert!(matches!(result, Err(ExtractError::Config(msg)) if msg.contains("'host' and 'basePath'")));
    }

    #[test]
    fn test_version_checks() {
        let config = ServiceConfig::new().with_open_api_version("3.0");
        let result = Extractor::new(document(json!({})), config, MockFetch::new(), CollectingSink::new());
        assert!(matches!(result, Err(ExtractError::Config(_))));

        let document = OpenApiDocument::from_value(json!({
            "swagger": "1.2",
            "host": "h",
            "basePath": "/",
            "paths": {}
        }))
        .unwrap();
        let result = Extractor::new(document, ServiceConfig::new(), MockFetch::new(), CollectingSink::new());
        assert!(matches!(result, Err(ExtractError::Parse(msg)) if msg.contains("not yet implemented")));
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let mut fetch = MockFetch::new();
        fetch
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(FetchResponse::new(401, "{}")));

        let mut engine = extractor(json!({ "/items": listing() }), fetch);
        let result = engine.sweep().await;

        assert!(matches!(
            result,
            Err(ExtractError::Unauthorized { url }) if url == "https://tracker.example.com/rest/v1/items"
        ));
    }

    #[tokio::test]
    async fn test_not_found_on_listing_is_fatal() {
        let mut fetch = MockFetch::new();
        fetch
            .expect_fetch()
            .returning(|_, _| Ok(FetchResponse::new(404, "")));

        let mut engine = extractor(json!({ "/items": listing() }), fetch);

        assert!(matches!(engine.sweep().await, Err(ExtractError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_not_found_on_single_resource_is_soft() {
        let mut fetch = MockFetch::new();
        fetch
            .expect_fetch()
            .withf(|url, _| url.ends_with("/items/9"))
            .times(1)
            .returning(|_, _| Ok(FetchResponse::new(404, "")));

        let mut engine = extractor(json!({ "/items/{id}": single() }), fetch);
        engine
            .obtain("/items/{id}", RequestConfig::new().with_path_arg("id", 9u64))
            .await
            .unwrap();

        assert!(engine.diagnostics().contains("may have been deleted"));
        assert!(engine.obtained().is_empty());
    }

    #[tokio::test]
    async fn test_other_status_stops_resource_only() {
        let mut fetch = MockFetch::new();
        fetch
            .expect_fetch()
            .withf(|url, _| url.ends_with("/items"))
            .returning(|_, _| Ok(FetchResponse::new(503, "unavailable")));
        fetch
            .expect_fetch()
            .withf(|url, _| url.ends_with("/projects"))
            .returning(|_, _| Ok(FetchResponse::json_ok(&json!({ "data": [{ "id": 1, "name": "p" }] }))));

        let mut engine = extractor(json!({ "/items": listing(), "/projects": listing() }), fetch);
        engine.sweep().await.unwrap();

        assert!(engine.diagnostics().contains("Non-200 response"));
        assert!(engine.obtained().contains("/projects/1"));
        assert_eq!(engine.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_required_parameter_skips_path() {
        let mut fetch = MockFetch::new();
        fetch.expect_fetch().never();

        let mut engine = extractor(json!({ "/items/{id}": single() }), fetch);
        engine.sweep().await.unwrap();

        assert_eq!(
            engine.diagnostics().warnings(),
            &["Skipping /items/{id} since it requires parameters for: id".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_response_schema_skips_path() {
        let mut fetch = MockFetch::new();
        fetch.expect_fetch().never();

        let paths = json!({ "/ping": { "get": { "responses": { "200": { "description": "ok" } } } } });
        let mut engine = extractor(paths, fetch);
        engine.sweep().await.unwrap();

        assert!(engine
            .diagnostics()
            .contains("Skipping /ping since it does not have a defined response schema"));
    }

    #[tokio::test]
    async fn test_path_hooks_and_headers() {
        let mut fetch = MockFetch::new();
        fetch
            .expect_fetch()
            .withf(|url, request| {
                url == "https://tracker.example.com/rest/v1/items?project=20"
                    && request.headers["accept"] == "application/json"
                    && request.headers["authorization"] == "Bearer t"
                    && request.headers["x-trace"] == "1"
            })
            .times(1)
            .returning(|_, _| Ok(FetchResponse::json_ok(&json!({ "data": [] }))));

        let config = ServiceConfig::new()
            .with_header("authorization", "Bearer t")
            .with_header("accept", "text/plain")
            .skip_path("/system/**")
            .unwrap()
            .with_path("/items", |_: &Operation, _: &RequestConfig| {
                Some(RequestConfig::new().with_query_arg("project", 20u64))
            })
            .unwrap()
            .with_all_paths(|_: &Operation, _: &RequestConfig| {
                Some(
                    RequestConfig::new()
                        .with_query_arg("project", 99u64)
                        .with_header_arg("x-trace", "1"),
                )
            });

        let paths = json!({ "/items": listing(), "/system/settings": listing() });
        let mut engine =
            Extractor::new(document(paths), config, fetch, CollectingSink::new()).unwrap();
        engine.sweep().await.unwrap();

        assert_eq!(engine.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_hook_returning_none_skips() {
        let mut fetch = MockFetch::new();
        fetch.expect_fetch().never();

        let config = ServiceConfig::new()
            .with_all_paths(|_: &Operation, _: &RequestConfig| None);
        let mut engine = Extractor::new(
            document(json!({ "/items": listing() })),
            config,
            fetch,
            CollectingSink::new(),
        )
        .unwrap();

        engine.sweep().await.unwrap();
        assert_eq!(engine.fetch_count(), 0);
    }

    #[test]
    fn test_match_resource_prefers_segment_count() {
        let paths = json!({
            "/projects/{projectId}": single(),
            "/projects/{projectId}/items/{itemId}": single(),
            "/reports": { "parameters": [] }
        });
        let mut engine = extractor(paths, MockFetch::new());

        let (template, request) = engine.match_resource("/projects/42/items/7").unwrap();
        assert_eq!(template, "/projects/{projectId}/items/{itemId}");
        assert_eq!(request.path_args["projectId"], ArgValue::from("42"));
        assert_eq!(request.path_args["itemId"], ArgValue::from("7"));

        let (_, request) = engine.match_resource("/projects/42?include=all").unwrap();
        assert_eq!(request.query_args["include"], ArgValue::from("all"));

        assert!(engine.match_resource("/reports").is_none());
        assert!(engine.diagnostics().contains("does not have a GET method"));

        assert!(engine.match_resource("/unknown/1").is_none());
        assert!(engine
            .diagnostics()
            .contains("Failed to match discovered resource to a path in the document schema: /unknown/1"));
    }

    #[test]
    fn test_page_items() {
        assert_eq!(page_items(&json!({ "data": [1, 2] })).len(), 2);
        assert_eq!(page_items(&json!({ "data": { "id": 1 } })).len(), 1);
        assert!(page_items(&json!({ "meta": {} })).is_empty());
    }
}
