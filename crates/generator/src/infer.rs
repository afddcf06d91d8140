//! Maps dereferenced JSON Schema nodes to GraphQL field types

use crate::Expansions;
use openapi_graph_extractor_parser::{ResolvedSchema, SchemaId, SchemaKind};
use serde_json::Value;
use std::collections::BTreeMap;

/// Infer the GraphQL type of `field` on `type_label`
///
/// Enums and nested object shapes are registered into `expansions` under
/// `<TypeLabel>_<Field>` names. Returns `None` for schema nodes with no
/// GraphQL mapping (untyped or unknown `type`).
pub fn infer_field_type(
    schema: &ResolvedSchema,
    id: SchemaId,
    type_label: &str,
    field: &str,
    expansions: &mut Expansions,
) -> Option<String> {
    infer(schema, id, type_label, field, expansions, &[id])
}

fn infer(
    schema: &ResolvedSchema,
    id: SchemaId,
    type_label: &str,
    field: &str,
    expansions: &mut Expansions,
    blocking: &[SchemaId],
) -> Option<String> {
    match &schema.node(id).kind {
        SchemaKind::Boolean => Some("Boolean".to_string()),
        SchemaKind::Integer { .. } => Some("Int".to_string()),
        SchemaKind::Number { .. } => Some("Float".to_string()),
        SchemaKind::String {
            enumeration: Some(values),
            ..
        } => {
            let name = expansion_name(type_label, field);
            let values = values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            expansions.enums.insert(name.clone(), values);
            Some(name)
        }
        SchemaKind::String { .. } => Some("String".to_string()),
        SchemaKind::Array { items } => {
            let items = (*items)?;
            // array of arrays looping back on itself
            if blocking.contains(&items) && schema.items(items).is_some() {
                return None;
            }
            let mut trail = blocking.to_vec();
            trail.push(id);
            let inner = infer(schema, items, type_label, field, expansions, &trail)?;
            Some(format!("[{}]", inner))
        }
        SchemaKind::Object {
            properties,
            additional_properties,
            ..
        } => {
            let properties = if !properties.is_empty() {
                properties
            } else {
                match (*additional_properties).and_then(|a| schema.object_shape(a)) {
                    Some((nested, _)) if !nested.is_empty() => nested,
                    _ => return Some("Object @any".to_string()),
                }
            };

            let name = expansion_name(type_label, field);
            let mut fields = BTreeMap::new();
            for (key, sub) in properties {
                if blocking.contains(sub) {
                    continue;
                }
                let mut trail = blocking.to_vec();
                trail.push(*sub);
                if let Some(field_type) = infer(schema, *sub, &name, key, expansions, &trail) {
                    fields.insert(key.clone(), field_type);
                }
            }

            expansions.objects.insert(name.clone(), fields);
            Some(name)
        }
        SchemaKind::Other(_) | SchemaKind::Untyped => None,
    }
}

/// `<Type>_<Field>` with the field's first letter upper-cased
fn expansion_name(type_label: &str, field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!("{}_{}{}", type_label, first.to_uppercase(), chars.as_str()),
        None => format!("{}_", type_label),
    }
}
