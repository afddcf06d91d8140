//! OpenAPI document handling for the graph extractor
//!
//! This crate loads OpenAPI v2 (Swagger) documents from JSON or YAML and
//! resolves the JSON Schema definitions they reference.
//!
//! ## Dereferencing
//!
//! Response schemas are resolved into a [`ResolvedSchema`]: an arena of typed
//! schema nodes. A `$ref` is resolved once per run; any reference back to a
//! definition that is still being resolved yields the arena index of that
//! definition, so self- and mutually-referential definitions terminate.
//!
//! ## Usage
//! ```rust,ignore
//! use openapi_graph_extractor_parser::{Dereferencer, OpenApiDocument};
//!
//! let document = OpenApiDocument::from_file("swagger.json")?;
//! let operation = document.path("/projects").and_then(|p| p.get.as_ref()).unwrap();
//! let response = document.response_schema(operation, "200").unwrap();
//! let schema = Dereferencer::new(document.raw()).resolve(response)?;
//! ```

mod deref;
pub mod openapi;
mod schema;
pub mod template;

pub use deref::{resolve_pointer, Dereferencer};
pub use openapi::{
    Info, OpenApiDocument, Operation, Parameter, ParameterLocation, ParameterOrRef, PathItem,
    Paths, SwaggerSpec,
};
pub use schema::{ResolvedSchema, SchemaArena, SchemaId, SchemaKind, SchemaNode};
