//! `$ref` resolution for JSON Schema nodes

use crate::schema::{ResolvedSchema, SchemaArena, SchemaId, SchemaKind, SchemaNode};
use openapi_graph_extractor_common::{ExtractError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Resolve a `$ref` pointer string to the node it designates
///
/// A leading `#` resolves against `root`, a leading `.` against `node` itself.
/// Remaining `/`-separated segments are walked as map keys (or array indices).
/// Returns `None` when any segment is missing.
pub fn resolve_pointer<'v>(root: &'v Value, node: &'v Value, reference: &str) -> Option<&'v Value> {
    let mut parts = reference.split('/');
    let mut current = match parts.next()? {
        "#" => root,
        "." => node,
        _ => return None,
    };

    for part in parts {
        let key = part.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Resolves schema trees against a document root into a [`ResolvedSchema`]
///
/// The blocking table maps each reference string to the arena slot reserved
/// for it. A reference met again while its slot is still being filled returns
/// that slot, which breaks self- and mutually-referential cycles. The table
/// lives for one resolution only.
///
/// A reference to a reference gets its own slot holding a copy of the final
/// target. Copies are taken once the whole tree is filled, so an alias met
/// inside a cycle still sees the completed target.
pub struct Dereferencer<'a> {
    root: &'a Value,
    arena: SchemaArena,
    blocking: HashMap<String, SchemaId>,
    /// `(alias slot, target slot, alias reference)` in completion order
    aliases: Vec<(SchemaId, SchemaId, String)>,
}

impl<'a> Dereferencer<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            arena: SchemaArena::new(),
            blocking: HashMap::new(),
            aliases: Vec::new(),
        }
    }

    /// Resolve a schema that must exist
    ///
    /// Fails when the top-level `$ref` cannot be resolved. Nested references
    /// that cannot be resolved are dropped from their parent, which leaves the
    /// corresponding data unschema'd.
    pub fn resolve(mut self, node: &Value) -> Result<ResolvedSchema> {
        let root = self.deref(node).ok_or_else(|| ExtractError::UnresolvedReference {
            reference: node
                .get("$ref")
                .and_then(Value::as_str)
                .unwrap_or("<inline>")
                .to_string(),
        })?;

        // inner aliases complete first, so chains copy filled nodes
        for (alias, target, reference) in std::mem::take(&mut self.aliases) {
            let mut node = self.arena.get(target).clone();
            node.reference = Some(reference);
            self.arena.set(alias, node);
        }

        Ok(ResolvedSchema::new(self.arena, root))
    }

    fn deref(&mut self, node: &Value) -> Option<SchemaId> {
        let Some(reference) = node.get("$ref").and_then(Value::as_str) else {
            let id = self.arena.reserve();
            self.fill(id, node, None);
            return Some(id);
        };

        if let Some(id) = self.blocking.get(reference) {
            return Some(*id);
        }

        let root = self.root;
        let Some(target) = resolve_pointer(root, node, reference) else {
            tracing::debug!(reference = %reference, "Unresolvable $ref");
            return None;
        };

        let id = self.arena.reserve();
        self.blocking.insert(reference.to_string(), id);

        if target.get("$ref").is_some() {
            // the target slot may still be mid-fill; copied in `resolve`
            let inner = self.deref(target)?;
            self.aliases.push((id, inner, reference.to_string()));
        } else {
            self.fill(id, target, Some(reference.to_string()));
        }

        Some(id)
    }

    fn fill(&mut self, id: SchemaId, node: &Value, reference: Option<String>) {
        let kind = match node.get("type").and_then(Value::as_str) {
            Some("boolean") => SchemaKind::Boolean,
            Some("integer") => SchemaKind::Integer {
                format: string_field(node, "format"),
            },
            Some("number") => SchemaKind::Number {
                format: string_field(node, "format"),
            },
            Some("string") => SchemaKind::String {
                format: string_field(node, "format"),
                enumeration: node.get("enum").and_then(Value::as_array).cloned(),
            },
            Some("array") => SchemaKind::Array {
                items: node
                    .get("items")
                    .filter(|v| v.is_object())
                    .and_then(|items| self.deref(items)),
            },
            Some("object") => self.object_kind(node),
            None if node.get("properties").map(Value::is_object).unwrap_or(false) => {
                self.object_kind(node)
            }
            Some(other) => SchemaKind::Other(other.to_string()),
            None => SchemaKind::Untyped,
        };

        self.arena.set(
            id,
            SchemaNode {
                kind,
                reference,
                description: string_field(node, "description"),
            },
        );
    }

    fn object_kind(&mut self, node: &Value) -> SchemaKind {
        let mut properties = BTreeMap::new();
        if let Some(map) = node.get("properties").and_then(Value::as_object) {
            for (key, value) in map {
                if !value.is_object() {
                    continue;
                }
                if let Some(id) = self.deref(value) {
                    properties.insert(key.clone(), id);
                }
            }
        }

        let additional_properties = match node.get("additionalProperties") {
            Some(Value::Bool(true)) => Some(self.arena.push(SchemaNode::untyped())),
            Some(value) if value.is_object() => self.deref(value),
            _ => None,
        };

        let required = node
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        SchemaKind::Object {
            properties,
            additional_properties,
            required,
        }
    }
}

fn string_field(node: &Value, key: &str) -> Option<String> {
    node.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolves_ref_against_root() {
        let root = json!({
            "definitions": {
                "TestSchema": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "date": { "type": "date" }
                    }
                }
            }
        });

        let schema = Dereferencer::new(&root)
            .resolve(&json!({ "$ref": "#/definitions/TestSchema" }))
            .unwrap();

        let node = schema.node(schema.root());
        assert_eq!(node.reference_name(), Some("TestSchema"));

        let name = schema.property(schema.root(), "name").unwrap();
        assert!(matches!(schema.node(name).kind, SchemaKind::String { .. }));

        let date = schema.property(schema.root(), "date").unwrap();
        assert_eq!(schema.node(date).kind, SchemaKind::Other("date".to_string()));
    }

    #[test]
    fn test_self_referential_schema_terminates() {
        let root = json!({
            "definitions": {
                "A": {
                    "type": "object",
                    "properties": {
                        "prop": { "$ref": "#/definitions/A" },
                        "label": { "type": "string" }
                    }
                }
            }
        });

        let schema = Dereferencer::new(&root)
            .resolve(&json!({ "$ref": "#/definitions/A" }))
            .unwrap();

        let prop = schema.property(schema.root(), "prop").unwrap();
        assert_eq!(prop, schema.root());
        assert_eq!(schema.node(prop), schema.node(schema.root()));
        assert!(schema.property(prop, "label").is_some());
    }

    #[test]
    fn test_mutually_referential_schemas_terminate() {
        let root = json!({
            "definitions": {
                "Project": {
                    "type": "object",
                    "properties": {
                        "items": { "type": "array", "items": { "$ref": "#/definitions/Item" } }
                    }
                },
                "Item": {
                    "type": "object",
                    "properties": {
                        "project": { "$ref": "#/definitions/Project" }
                    }
                }
            }
        });

        let schema = Dereferencer::new(&root)
            .resolve(&json!({ "$ref": "#/definitions/Project" }))
            .unwrap();

        let items = schema.property(schema.root(), "items").unwrap();
        let item = schema.items(items).unwrap();
        assert_eq!(schema.node(item).reference_name(), Some("Item"));
        assert_eq!(schema.property(item, "project"), Some(schema.root()));
    }

    #[test]
    fn test_reference_chain_resolves_to_final_target() {
        let root = json!({
            "definitions": {
                "Owner": { "$ref": "#/definitions/Person" },
                "Person": { "$ref": "#/definitions/User" },
                "User": {
                    "type": "object",
                    "properties": { "login": { "type": "string" } }
                }
            }
        });

        let schema = Dereferencer::new(&root)
            .resolve(&json!({
                "type": "object",
                "properties": { "owner": { "$ref": "#/definitions/Owner" } }
            }))
            .unwrap();

        let owner = schema.property(schema.root(), "owner").unwrap();
        assert_eq!(schema.node(owner).reference_name(), Some("Owner"));
        assert!(schema.property(owner, "login").is_some());
    }

    #[test]
    fn test_alias_inside_cycle_sees_completed_target() {
        let root = json!({
            "definitions": {
                "Item": {
                    "type": "object",
                    "properties": {
                        "parent": { "$ref": "#/definitions/ItemRef" },
                        "name": { "type": "string" }
                    }
                },
                "ItemRef": { "$ref": "#/definitions/Item" }
            }
        });

        let schema = Dereferencer::new(&root)
            .resolve(&json!({ "$ref": "#/definitions/Item" }))
            .unwrap();

        let parent = schema.property(schema.root(), "parent").unwrap();
        assert_eq!(schema.node(parent).reference_name(), Some("ItemRef"));
        assert!(matches!(schema.node(parent).kind, SchemaKind::Object { .. }));
        assert!(schema.property(parent, "name").is_some());
        assert_eq!(schema.property(parent, "parent"), Some(parent));
    }

    #[test]
    fn test_missing_nested_ref_in_chain_is_dropped() {
        let root = json!({
            "definitions": {
                "Broken": { "$ref": "#/definitions/Gone" }
            }
        });
        let schema = Dereferencer::new(&root)
            .resolve(&json!({
                "type": "object",
                "properties": {
                    "broken": { "$ref": "#/definitions/Broken" },
                    "kept": { "type": "integer" }
                }
            }))
            .unwrap();

        assert!(schema.property(schema.root(), "broken").is_none());
        assert!(schema.property(schema.root(), "kept").is_some());
    }

    #[test]
    fn test_missing_top_level_ref_is_an_error() {
        let root = json!({ "definitions": {} });
        let result = Dereferencer::new(&root).resolve(&json!({ "$ref": "#/definitions/Nope" }));
        assert!(matches!(
            result,
            Err(ExtractError::UnresolvedReference { reference }) if reference == "#/definitions/Nope"
        ));
    }

    #[test]
    fn test_missing_nested_ref_is_dropped() {
        let root = json!({ "definitions": {} });
        let schema = Dereferencer::new(&root)
            .resolve(&json!({
                "type": "object",
                "properties": { "ghost": { "$ref": "#/definitions/Ghost" } }
            }))
            .unwrap();

        assert!(schema.property(schema.root(), "ghost").is_none());
    }

    #[test]
    fn test_additional_properties_field() {
        let root = json!({});
        let schema = Dereferencer::new(&root)
            .resolve(&json!({
                "type": "object",
                "additionalProperties": { "type": "integer" }
            }))
            .unwrap();

        let (properties, additional) = schema.object_shape(schema.root()).unwrap();
        assert!(properties.is_empty());
        let additional = additional.unwrap();
        assert!(matches!(schema.node(additional).kind, SchemaKind::Integer { .. }));
    }

    #[test]
    fn test_pointer_escapes_and_local_root() {
        let root = json!({ "definitions": { "a/b": { "type": "boolean" } } });
        assert!(resolve_pointer(&root, &root, "#/definitions/a~1b").is_some());

        let node = json!({ "inner": { "type": "string" }, "$ref": "./inner" });
        let resolved = resolve_pointer(&root, &node, "./inner").unwrap();
        assert_eq!(resolved["type"], "string");
    }
}
