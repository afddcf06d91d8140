//! Common types and utilities for the OpenAPI graph extractor
//!
//! This crate contains the shared error type, the request argument model,
//! the deduplicating diagnostics sink and the vocabulary IRIs used across the
//! parser, generator, engine and CLI components.

mod diagnostics;
mod request;
pub mod vocab;

pub use diagnostics::Diagnostics;
pub use request::{ArgMap, ArgValue, RequestConfig};

use thiserror::Error;

/// Errors that can abort an extraction run
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unresolvable schema reference: {reference}")]
    UnresolvedReference { reference: String },

    #[error("Response schema missing from operation at {path}")]
    MissingSchema { path: String },

    #[error("Not authorized to access <{url}>")]
    Unauthorized { url: String },

    #[error("404 response from generic GET <{url}>")]
    NotFound { url: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Response data violates JSON schema at {key}: expected {expected}")]
    SchemaViolation { key: String, expected: String },

    #[error("Missing data: {body}")]
    MissingData { body: String },

    #[error("Shape changed unexpectedly: expected type '{expected}' but found '{found}'")]
    InconsistentShape { expected: String, found: String },

    #[error("Encountered non-primitive datatype in link path: {href}")]
    UnsupportedLinkValue { href: String },

    #[error("Unsupported response schema: {0}")]
    UnsupportedSchema(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Invalid RDF term '{term}': {reason}")]
    InvalidTerm { term: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ExtractError::Unauthorized {
            url: "https://example.com/rest/v1/projects".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Not authorized to access <https://example.com/rest/v1/projects>"
        );

        let err = ExtractError::SchemaViolation {
            key: "tags".to_string(),
            expected: "array".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Response data violates JSON schema at tags: expected array"
        );
    }
}
