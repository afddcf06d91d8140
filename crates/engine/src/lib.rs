//! Extraction engine for HATEOAS-style REST APIs described by OpenAPI v2
//!
//! The engine sweeps every GET path in a document, translates each response
//! page into RDF triples and follows the links found in `links` sections until
//! no new resources are discovered. Along the way it accumulates a GraphQL
//! schema and JSON-LD context describing the extracted data.
//!
//! ## Usage
//! ```rust,ignore
//! use openapi_graph_extractor_engine::{extract, DeclarativeConfig, HttpFetcher, NTriplesSink};
//! use openapi_graph_extractor_parser::OpenApiDocument;
//!
//! let document = OpenApiDocument::from_file("swagger.json")?;
//! let config = DeclarativeConfig::from_file("service.yaml")?.into_service_config()?;
//! let sink = NTriplesSink::new(std::io::stdout(), "https://tracker.example.com/rest/v1#");
//!
//! let extraction = extract(document, config, HttpFetcher::new(), sink).await?;
//! extraction.artifacts.write_to_directory("build".as_ref())?;
//! ```

pub mod config;
mod engine;
mod fetch;
mod glob;
mod sink;
mod translator;
mod triples;

pub use config::{
    CursorConfig, DeclarativeConfig, DeclarativePagination, DeclarativePath, DocumentOverrides,
    GraphqlConfig, Pagination, PathConfig, ServiceConfig, SkipPath,
};
pub use engine::{extract, resolve_root, Extraction, Extractor};
pub use fetch::{Fetch, FetchRequest, FetchResponse, HttpFetcher};
pub use glob::Glob;
pub use sink::{CollectingSink, NTriplesSink, SinkEntry, TripleSink};
pub use translator::{Translation, Translator};
pub use triples::{Predicate, PredicateMap, Term, TripleStore};
