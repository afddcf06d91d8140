//! GraphQL schema and JSON-LD context inference
//!
//! The [`SchemaInferencer`] accumulates one pre-schema entry per RDF type
//! label across every translated page, plus the enum and object expansions
//! created while flattening nested schema shapes. [`SchemaInferencer::dump`]
//! turns that state into GraphQL SDL text and a matching JSON-LD `@context`.

mod infer;
mod sdl;
mod templates;

pub use infer::infer_field_type;
pub use sdl::SchemaArtifacts;
pub use templates::graphql_name;

use openapi_graph_extractor_common::{Diagnostics, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Accumulated shape of one GraphQL object type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreSchemaType {
    /// Plural path segment identifying the type, e.g. `projects`
    pub key: String,
    /// Link field name to the key of the linked type
    pub links: BTreeMap<String, String>,
    /// Field name to inferred GraphQL type
    pub fields: BTreeMap<String, String>,
}

/// Synthetic enum and object types created while flattening nested schemas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansions {
    pub enums: BTreeMap<String, Vec<String>>,
    pub objects: BTreeMap<String, BTreeMap<String, String>>,
}

impl Expansions {
    /// Merge by name; later definitions replace earlier ones
    pub fn merge(&mut self, other: Expansions) {
        self.enums.extend(other.enums);
        self.objects.extend(other.objects);
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty() && self.objects.is_empty()
    }
}

/// Override hook for the SDL type emitted for a field
pub trait FieldTypeHook: Send + Sync {
    /// Return a replacement for `inferred_type`, or `None` to keep it
    fn field(&self, name: &str, inferred_type: &str, type_label: &str) -> Option<String>;
}

/// Cross-page accumulator of GraphQL type shapes
#[derive(Debug, Default)]
pub struct SchemaInferencer {
    types: BTreeMap<String, PreSchemaType>,
    expansions: Expansions,
}

impl SchemaInferencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&self) -> &BTreeMap<String, PreSchemaType> {
        &self.types
    }

    pub fn expansions(&self) -> &Expansions {
        &self.expansions
    }

    pub fn contains_type(&self, type_label: &str) -> bool {
        self.types.contains_key(type_label)
    }

    /// Unconditionally set the pre-schema entry for a type
    pub fn add_type(&mut self, type_label: &str, entry: PreSchemaType) {
        self.types.insert(type_label.to_string(), entry);
    }

    /// Register a type shape observed on a page
    ///
    /// The first sample of a type is always kept. A later sample replaces it
    /// only when it is an exemplar, i.e. it was fetched from the type's own
    /// listing path. Returns whether the entry was written.
    pub fn register_type(&mut self, type_label: &str, entry: PreSchemaType, exemplar: bool) -> bool {
        if self.contains_type(type_label) && !exemplar {
            return false;
        }
        self.add_type(type_label, entry);
        true
    }

    pub fn merge_expansions(&mut self, expansions: Expansions) {
        self.expansions.merge(expansions);
    }

    /// Render the GraphQL SDL and JSON-LD context
    ///
    /// `base` is the namespace IRI that field and type IRIs are minted under
    /// (the API root followed by `#`).
    pub fn dump(
        &self,
        hook: Option<&dyn FieldTypeHook>,
        base: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<SchemaArtifacts> {
        sdl::render(self, hook, base, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, field: &str) -> PreSchemaType {
        PreSchemaType {
            key: key.to_string(),
            links: BTreeMap::new(),
            fields: BTreeMap::from([(field.to_string(), "String".to_string())]),
        }
    }

    #[test]
    fn test_exemplar_rule() {
        let mut inferencer = SchemaInferencer::new();

        assert!(inferencer.register_type("Item", entry("items", "first"), false));
        assert!(!inferencer.register_type("Item", entry("projects", "second"), false));
        assert!(inferencer.types()["Item"].fields.contains_key("first"));

        assert!(inferencer.register_type("Item", entry("items", "third"), true));
        assert!(inferencer.types()["Item"].fields.contains_key("third"));
    }

    #[test]
    fn test_expansions_last_write_wins() {
        let mut inferencer = SchemaInferencer::new();
        let mut first = Expansions::default();
        first.enums.insert("Item_Status".into(), vec!["OPEN".into()]);
        let mut second = Expansions::default();
        second.enums.insert("Item_Status".into(), vec!["OPEN".into(), "CLOSED".into()]);

        inferencer.merge_expansions(first);
        inferencer.merge_expansions(second);

        assert_eq!(inferencer.expansions().enums["Item_Status"].len(), 2);
    }
}
