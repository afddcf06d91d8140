//! OpenAPI 2.0 type definitions
//!
//! Simplified representation focusing on readonly endpoint extraction

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Swagger document root
#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerSpec {
    /// Swagger version (must be "2.0")
    #[serde(default)]
    pub swagger: Option<String>,

    /// API metadata
    #[serde(default)]
    pub info: Option<Info>,

    /// Host (name or IP) serving the API
    #[serde(default)]
    pub host: Option<String>,

    /// Base path on which the API is served, relative to the host
    #[serde(rename = "basePath")]
    #[serde(default)]
    pub base_path: Option<String>,

    /// Transfer protocols of the API
    #[serde(default)]
    pub schemes: Vec<String>,

    /// API paths (endpoints), in declaration order
    #[serde(default)]
    pub paths: Paths,

    /// Reusable parameters
    #[serde(default)]
    pub parameters: HashMap<String, Parameter>,
}

/// API information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// API title
    #[serde(default)]
    pub title: String,

    /// API version
    #[serde(default)]
    pub version: String,

    /// API description
    #[serde(default)]
    pub description: Option<String>,
}

/// Path table that keeps the order paths were declared in
#[derive(Debug, Clone, Default)]
pub struct Paths(Vec<(String, PathItem)>);

impl Paths {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathItem)> {
        self.0.iter().map(|(path, item)| (path.as_str(), item))
    }

    pub fn get(&self, template: &str) -> Option<&PathItem> {
        self.0
            .iter()
            .find(|(path, _)| path == template)
            .map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = &mut PathItem> {
        self.0.iter_mut().map(|(_, item)| item)
    }
}

impl FromIterator<(String, PathItem)> for Paths {
    fn from_iter<I: IntoIterator<Item = (String, PathItem)>>(iter: I) -> Self {
        Paths(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for Paths {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PathsVisitor;

        impl<'de> Visitor<'de> for PathsVisitor {
            type Value = Paths;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of path templates to path items")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Paths, A::Error> {
                let mut entries = Vec::new();
                while let Some((path, item)) = map.next_entry::<String, PathItem>()? {
                    entries.push((path, item));
                }
                Ok(Paths(entries))
            }
        }

        deserializer.deserialize_map(PathsVisitor)
    }
}

/// Path item (operations for a path)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    /// GET operation
    #[serde(default)]
    pub get: Option<Operation>,

    /// Parameters shared by all operations of the path
    #[serde(default)]
    pub parameters: Vec<ParameterOrRef>,
}

/// HTTP operation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    /// Operation ID (unique identifier)
    #[serde(rename = "operationId")]
    #[serde(default)]
    pub operation_id: Option<String>,

    /// Summary
    #[serde(default)]
    pub summary: Option<String>,

    /// MIME types the operation can produce
    #[serde(default)]
    pub produces: Vec<String>,

    /// Parameters
    #[serde(default)]
    pub parameters: Vec<ParameterOrRef>,

    /// Responses keyed by status code, kept raw so schemas can be dereferenced
    #[serde(default)]
    pub responses: BTreeMap<String, serde_json::Value>,

    /// Tags (for grouping)
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Operation {
    /// Iterate over the parameters that are defined inline or were resolved at load
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter_map(|p| match p {
            ParameterOrRef::Parameter(param) => Some(param),
            ParameterOrRef::Reference { .. } => None,
        })
    }

    /// Whether the operation declares a parameter with this name and location
    pub fn declares(&self, name: &str, location: ParameterLocation) -> bool {
        self.parameters()
            .any(|p| p.name == name && p.location == location)
    }

    /// Accept header value derived from `produces`
    pub fn accept(&self) -> String {
        if self.produces.is_empty() {
            "application/json".to_string()
        } else {
            self.produces.join(",")
        }
    }
}

/// Parameter location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
}

/// Parameter definition
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,

    /// Location: path, query, header, body, formData
    #[serde(rename = "in")]
    pub location: ParameterLocation,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Required flag
    #[serde(default)]
    pub required: bool,

    /// Primitive type for non-body parameters
    #[serde(rename = "type")]
    #[serde(default)]
    pub param_type: Option<String>,

    /// Format (e.g., int32, int64, date-time)
    #[serde(default)]
    pub format: Option<String>,
}

/// Parameter or reference
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParameterOrRef {
    /// Direct parameter
    Parameter(Parameter),

    /// Reference to a parameter in `#/parameters`
    Reference {
        #[serde(rename = "$ref")]
        ref_path: String,
    },
}
