//! OpenAPI 2.0 (Swagger) document model
//!
//! Only the parts the extractor consumes are modelled: host and base path,
//! the path table with its GET operations and parameters, and the raw JSON
//! tree that `$ref` pointers resolve against.
//!
//! ## Usage
//! ```rust,ignore
//! use openapi_graph_extractor_parser::OpenApiDocument;
//!
//! let document = OpenApiDocument::from_file("swagger.json")?;
//! for (path, item) in document.paths().iter() {
//!     println!("{} {}", path, item.get.is_some());
//! }
//! ```

mod parser;
mod types;

pub use parser::OpenApiDocument;
pub use types::*;
