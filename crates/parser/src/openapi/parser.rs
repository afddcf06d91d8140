//! OpenAPI document loader

use super::types::{Operation, ParameterOrRef, PathItem, Paths, SwaggerSpec};
use crate::deref::resolve_pointer;
use openapi_graph_extractor_common::{ExtractError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A loaded OpenAPI v2 document
///
/// Holds both the typed view used to enumerate paths and operations and the
/// raw JSON tree that `$ref` pointers are resolved against.
#[derive(Debug, Clone)]
pub struct OpenApiDocument {
    raw: Value,
    spec: SwaggerSpec,
}

impl OpenApiDocument {
    /// Load a document from a file path, as JSON or YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ExtractError::Parse(format!(
                "Failed to read local API document file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse a document, treating it as JSON when it starts with `{` and YAML otherwise
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        if content.trim_start().starts_with('{') {
            Self::from_json(content)
        } else {
            Self::from_yaml(content)
        }
    }

    /// Parse a document from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(json)
            .map_err(|e| ExtractError::Parse(format!("Failed to parse document as JSON: {}", e)))?;
        Self::from_value(raw)
    }

    /// Parse a document from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(yaml)
            .map_err(|e| ExtractError::Parse(format!("Failed to parse document as YAML: {}", e)))?;
        Self::from_value(raw)
    }

    /// Build a document from an already parsed JSON tree
    pub fn from_value(raw: Value) -> Result<Self> {
        if !raw.get("paths").map(Value::is_object).unwrap_or(false) {
            return Err(ExtractError::Parse(
                "The parsed document does not have the expected shape. Are you sure the file is properly formatted?"
                    .to_string(),
            ));
        }

        let mut spec: SwaggerSpec = serde_json::from_value(raw.clone())
            .map_err(|e| ExtractError::Parse(format!("Invalid OpenAPI document: {}", e)))?;

        resolve_parameters(&raw, &mut spec.paths);

        tracing::debug!(paths = spec.paths.len(), "Loaded OpenAPI document");

        Ok(Self { raw, spec })
    }

    /// The raw JSON tree, used as the root for `$ref` resolution
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn spec(&self) -> &SwaggerSpec {
        &self.spec
    }

    pub fn swagger_version(&self) -> Option<&str> {
        self.spec.swagger.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.spec.host.as_deref()
    }

    pub fn base_path(&self) -> Option<&str> {
        self.spec.base_path.as_deref()
    }

    pub fn paths(&self) -> &Paths {
        &self.spec.paths
    }

    pub fn path(&self, template: &str) -> Option<&PathItem> {
        self.spec.paths.get(template)
    }

    /// Replace `host` in both views of the document
    pub fn set_host(&mut self, host: &str) {
        self.spec.host = Some(host.to_string());
        if let Some(obj) = self.raw.as_object_mut() {
            obj.insert("host".to_string(), Value::String(host.to_string()));
        }
    }

    /// Replace `basePath` in both views of the document
    pub fn set_base_path(&mut self, base_path: &str) {
        self.spec.base_path = Some(base_path.to_string());
        if let Some(obj) = self.raw.as_object_mut() {
            obj.insert("basePath".to_string(), Value::String(base_path.to_string()));
        }
    }

    /// The schema of the response for `status`, following a response-level `$ref`
    pub fn response_schema<'a>(&'a self, operation: &'a Operation, status: &str) -> Option<&'a Value> {
        let mut response = operation.responses.get(status)?;
        if let Some(reference) = response.get("$ref").and_then(Value::as_str) {
            response = resolve_pointer(&self.raw, response, reference)?;
        }
        response.get("schema").filter(|s| !s.is_null())
    }
}

/// Replace parameter references with their definitions and inherit path-level parameters
fn resolve_parameters(raw: &Value, paths: &mut Paths) {
    for item in paths.items_mut() {
        let shared = resolve_list(raw, &item.parameters);
        let Some(get) = item.get.as_mut() else {
            continue;
        };

        let mut resolved = resolve_list(raw, &get.parameters);
        for param in shared {
            let ParameterOrRef::Parameter(ref p) = param else {
                continue;
            };
            let overridden = resolved.iter().any(|r| {
                matches!(r, ParameterOrRef::Parameter(q) if q.name == p.name && q.location == p.location)
            });
            if !overridden {
                resolved.push(param);
            }
        }
        get.parameters = resolved;
    }
}

fn resolve_list(raw: &Value, params: &[ParameterOrRef]) -> Vec<ParameterOrRef> {
    params
        .iter()
        .map(|param| match param {
            ParameterOrRef::Reference { ref_path } => resolve_pointer(raw, raw, ref_path)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .map(ParameterOrRef::Parameter)
                .unwrap_or_else(|| {
                    tracing::warn!(reference = %ref_path, "Unresolvable parameter reference");
                    param.clone()
                }),
            other => other.clone(),
        })
        .collect()
}
