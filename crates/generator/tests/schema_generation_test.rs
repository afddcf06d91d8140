//! Integration tests for GraphQL schema inference from dereferenced definitions

use openapi_graph_extractor_common::Diagnostics;
use openapi_graph_extractor_generator::{
    infer_field_type, Expansions, PreSchemaType, SchemaArtifacts, SchemaInferencer,
};
use openapi_graph_extractor_parser::{Dereferencer, ResolvedSchema};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

const BASE: &str = "https://tracker.example.com/rest/v1#";

fn definitions() -> Value {
    json!({
        "definitions": {
            "Item": {
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "name": { "type": "string" },
                    "estimate": { "type": "number" },
                    "closed": { "type": "boolean" },
                    "status": { "type": "string", "enum": ["OPEN", "IN PROGRESS", "DONE"] },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "location": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "depth": { "type": "integer" }
                        }
                    },
                    "custom": { "type": "object" },
                    "parent": { "$ref": "#/definitions/Item" },
                    "anything": {}
                }
            }
        }
    })
}

fn resolve(root: &Value) -> ResolvedSchema {
    Dereferencer::new(root)
        .resolve(&json!({ "$ref": "#/definitions/Item" }))
        .expect("Item should resolve")
}

/// Infer every property of the root object the way a translated page would
fn register(inferencer: &mut SchemaInferencer, schema: &ResolvedSchema, label: &str, key: &str) {
    let (properties, _) = schema
        .object_shape(schema.root())
        .expect("root should be an object");

    let mut expansions = Expansions::default();
    let mut fields = BTreeMap::new();
    for (name, id) in properties {
        if let Some(field_type) = infer_field_type(schema, *id, label, name, &mut expansions) {
            fields.insert(name.clone(), field_type);
        }
    }

    inferencer.register_type(
        label,
        PreSchemaType {
            key: key.to_string(),
            links: BTreeMap::new(),
            fields,
        },
        true,
    );
    inferencer.merge_expansions(expansions);
}

#[test]
fn test_infer_schema_from_definitions() {
    let root = definitions();
    let schema = resolve(&root);
    let mut inferencer = SchemaInferencer::new();
    register(&mut inferencer, &schema, "Item", "items");

    let fields = &inferencer.types()["Item"].fields;
    assert_eq!(fields["id"], "Int");
    assert_eq!(fields["name"], "String");
    assert_eq!(fields["estimate"], "Float");
    assert_eq!(fields["closed"], "Boolean");
    assert_eq!(fields["status"], "Item_Status");
    assert_eq!(fields["tags"], "[String]");
    assert_eq!(fields["location"], "Item_Location");
    assert_eq!(fields["custom"], "Object @any");
    assert_eq!(fields["parent"], "Item_Parent");
    assert!(!fields.contains_key("anything"), "untyped fields have no SDL type");

    let expansions = inferencer.expansions();
    assert_eq!(
        expansions.enums["Item_Status"],
        vec!["OPEN".to_string(), "IN PROGRESS".to_string(), "DONE".to_string()]
    );
    assert_eq!(expansions.objects["Item_Location"]["depth"], "Int");
    assert!(
        !expansions.objects["Item_Parent"].contains_key("parent"),
        "self-reference must not recurse"
    );
}

#[test]
fn test_dump_renders_sdl_and_context() {
    let root = definitions();
    let schema = resolve(&root);
    let mut inferencer = SchemaInferencer::new();
    register(&mut inferencer, &schema, "Item", "items");
    let mut diagnostics = Diagnostics::new();

    let artifacts = inferencer.dump(None, BASE, &mut diagnostics).unwrap();

    assert!(artifacts.sdl.contains("type Query {\n  item: Item\n  items: [Item!]!\n}"));
    assert!(artifacts
        .sdl
        .contains("enum Item_Status {\n  OPEN\n  IN_PROGRESS\n  DONE\n}"));
    assert!(artifacts.sdl.contains("type Item_Location {"));
    assert!(artifacts.sdl.contains("type Item @object {"));
    assert!(artifacts.sdl.contains("  tags: [String]\n"));

    let context = &artifacts.context["@context"];
    assert_eq!(
        context["estimate"],
        json!({
            "@id": "https://tracker.example.com/rest/v1#estimate",
            "@type": "http://www.w3.org/2001/XMLSchema#decimal",
        })
    );
    assert_eq!(context["tags"], "https://tracker.example.com/rest/v1#tags");
    assert!(diagnostics.warnings().is_empty());
}

#[test]
fn test_artifacts_written_to_output_directory() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("build");

    let root = definitions();
    let schema = resolve(&root);
    let mut inferencer = SchemaInferencer::new();
    register(&mut inferencer, &schema, "Item", "items");
    let mut diagnostics = Diagnostics::new();
    let artifacts = inferencer.dump(None, BASE, &mut diagnostics).unwrap();

    artifacts.write_to_directory(&output).unwrap();

    let sdl_path = output.join(SchemaArtifacts::SDL_FILE);
    let context_path = output.join(SchemaArtifacts::CONTEXT_FILE);
    assert!(sdl_path.exists(), "schema.graphql should exist");
    assert!(context_path.exists(), "context.jsonld should exist");

    let context: Value = serde_json::from_str(&fs::read_to_string(context_path).unwrap()).unwrap();
    assert_eq!(context, artifacts.context);
}

#[test]
fn test_empty_inferencer_still_renders() {
    let inferencer = SchemaInferencer::new();
    let mut diagnostics = Diagnostics::new();

    let artifacts = inferencer.dump(None, BASE, &mut diagnostics).unwrap();

    assert!(artifacts.sdl.contains("type Query {\n}"));
    assert!(artifacts.sdl.contains("type _Any {"));
    assert_eq!(artifacts.context, json!({ "@context": {} }));
}
