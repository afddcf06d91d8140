//! Vocabulary IRIs shared by the RDF output and the JSON-LD context

pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const OGE: &str = "https://openmbee.org/openapi-graph-extractor#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
