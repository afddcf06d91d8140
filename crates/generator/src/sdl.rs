//! SDL and JSON-LD context rendering

use crate::templates::load_templates;
use crate::{FieldTypeHook, SchemaInferencer};
use openapi_graph_extractor_common::{vocab, Diagnostics, ExtractError, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tera::Context;

const PRIMITIVES: [&str; 5] = ["ID", "Boolean", "Int", "Float", "String"];

const FILTER_STRING_ARGS: [&str; 12] = [
    "is",
    "not",
    "in",
    "notIn",
    "contains",
    "notContains",
    "startsWith",
    "notStartsWith",
    "endsWith",
    "notEndsWith",
    "regex",
    "notRegex",
];

const FILTER_FLOAT_ARGS: [&str; 10] = [
    "equals",
    "notEquals",
    "lessThan",
    "notLessThan",
    "greaterThan",
    "notGreaterThan",
    "lessThanOrEqualTo",
    "notLessThanOrEqualTo",
    "greaterThanOrEqualTo",
    "notGreaterThanOrEqualTo",
];

/// Rendered schema outputs
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaArtifacts {
    /// GraphQL SDL document
    pub sdl: String,
    /// JSON-LD document of the form `{"@context": {...}}`
    pub context: Value,
}

impl SchemaArtifacts {
    pub const SDL_FILE: &'static str = "schema.graphql";
    pub const CONTEXT_FILE: &'static str = "context.jsonld";

    /// Pretty-printed JSON-LD context
    pub fn context_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.context)?)
    }

    /// Write `schema.graphql` and `context.jsonld` into `dir`, creating it if needed
    pub fn write_to_directory(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let sdl_path = dir.join(Self::SDL_FILE);
        fs::write(&sdl_path, &self.sdl)?;

        let context_path = dir.join(Self::CONTEXT_FILE);
        fs::write(&context_path, self.context_json()?)?;

        tracing::debug!(dir = %dir.display(), "Wrote schema artifacts");
        Ok(vec![sdl_path, context_path])
    }
}

/// One top-level SDL definition, in output order
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Definition {
    Union { name: String, members: Vec<String> },
    Enum { name: String, values: Vec<String> },
    Type { header: String, lines: Vec<String> },
}

/// Ordered SDL definitions
///
/// A union is emitted at the point the field needing it is resolved, ahead of
/// the type block that declares the field.
#[derive(Default)]
struct Definitions {
    items: Vec<Definition>,
    unions: BTreeSet<String>,
}

impl Definitions {
    fn push_enum(&mut self, name: &str, values: &[String]) {
        self.items.push(Definition::Enum {
            name: name.to_string(),
            values: values.to_vec(),
        });
    }

    fn push_type(&mut self, header: String, lines: Vec<String>) {
        self.items.push(Definition::Type { header, lines });
    }

    /// Collapse several candidate types into one field type
    ///
    /// List wrappers are stripped and duplicates removed. When primitives and
    /// object types are mixed only the object types are kept. If more than
    /// one candidate remains a union named `<prefix><suffix>` is defined.
    fn unionize(&mut self, things: &[String], prefix: &str, suffix: &str) -> String {
        let Some(first) = things.first() else {
            return String::new();
        };
        if things.len() == 1 {
            return first.clone();
        }

        let mut members: Vec<String> = Vec::new();
        for thing in things {
            let bare = strip_list(thing);
            if !bare.is_empty() && !members.iter().any(|m| m == bare) {
                members.push(bare.to_string());
            }
        }

        if !members.iter().all(|m| is_primitive(m)) {
            members.retain(|m| !is_primitive(m));
        }

        match members.len() {
            0 => first.clone(),
            1 => members.remove(0),
            _ => {
                let name = format!("{}{}", prefix, suffix);
                if self.unions.insert(name.clone()) {
                    self.items.push(Definition::Union {
                        name: name.clone(),
                        members,
                    });
                }
                name
            }
        }
    }
}

fn strip_list(s: &str) -> &str {
    if !s.starts_with('[') {
        return s;
    }
    s.trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('!')
}

fn is_primitive(s: &str) -> bool {
    PRIMITIVES.contains(&s)
}

fn xsd_datatype(graphql_type: &str) -> Option<&'static str> {
    match graphql_type {
        "Boolean" => Some("boolean"),
        "Int" => Some("integer"),
        "Float" => Some("decimal"),
        "String" => Some("string"),
        _ => None,
    }
}

/// Upper-case the first letter of a key and drop a plural `s`
fn presume_key(key: &str) -> String {
    let mut chars = key.chars();
    let capitalized = match chars.next() {
        Some(first) => format!("{}{}", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    };
    capitalized
        .strip_suffix('s')
        .map(str::to_string)
        .unwrap_or(capitalized)
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_lowercase(), chars.as_str()),
        None => String::new(),
    }
}

/// Insert a context term, keeping the first mapping on conflict
fn map_term(context: &mut Map<String, Value>, name: &str, term: Value, diagnostics: &mut Diagnostics) {
    match context.get(name) {
        Some(existing) if *existing != term => {
            diagnostics.warn(format!(
                "Naming conflict on '{}' prevents JSON-LD context mapping for GraphQL queries",
                name
            ));
        }
        Some(_) => {}
        None => {
            context.insert(name.to_string(), term);
        }
    }
}

fn directives() -> Vec<String> {
    let mut filter = String::from("directive @filter(\n");
    for arg in FILTER_STRING_ARGS {
        let ty = if arg == "in" || arg == "notIn" {
            "[String]"
        } else {
            "String"
        };
        filter.push_str(&format!("  {}: {},\n", arg, ty));
    }
    for arg in FILTER_FLOAT_ARGS {
        filter.push_str(&format!("  {}: Float,\n", arg));
    }
    filter.push_str(") on FIELD");

    vec![
        "directive @object on OBJECT".to_string(),
        "directive @any on FIELD_DEFINITION".to_string(),
        "directive @unique on FIELD_DEFINITION".to_string(),
        "directive @many on FIELD".to_string(),
        filter,
    ]
}

pub(crate) fn render(
    inferencer: &SchemaInferencer,
    hook: Option<&dyn FieldTypeHook>,
    base: &str,
    diagnostics: &mut Diagnostics,
) -> Result<SchemaArtifacts> {
    let types = inferencer.types();
    let expansions = inferencer.expansions();

    let mut keys: BTreeMap<String, String> = BTreeMap::new();
    for (label, entry) in types {
        let key = if entry.key.is_empty() {
            format!("{}s", label.to_lowercase())
        } else {
            entry.key.clone()
        };
        keys.insert(key, label.clone());
    }

    let mut definitions = Definitions::default();
    let mut queries = Vec::new();
    let mut context = Map::new();
    let mut anys: BTreeMap<String, Vec<String>> = BTreeMap::new();
    // target class -> link name -> origin classes
    let mut inverse: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
    let mut classes: Vec<(String, Vec<String>)> = Vec::new();

    for (label, entry) in types {
        if label.is_empty() {
            diagnostics.warn(format!("Skipping empty type with key '{}'", entry.key));
            continue;
        }

        let camel = lower_first(label);
        queries.push(format!("{}: {}", camel, label));
        queries.push(format!("{}s: [{}!]!", camel, label));

        let mut lines = Vec::new();
        let mut as_unions: Vec<String> = Vec::new();

        for (field, field_type) in &entry.fields {
            let out_type = hook
                .and_then(|h| h.field(field, field_type, label))
                .unwrap_or_else(|| field_type.clone());
            lines.push(format!("{}: {}", field, out_type));

            push_unique(anys.entry(field.clone()).or_default(), field_type);

            let iri = format!("{}{}", base, field);
            let term = match xsd_datatype(field_type) {
                Some(datatype) => json!({
                    "@id": iri,
                    "@type": format!("{}{}", vocab::XSD, datatype),
                }),
                None => {
                    if expansions.objects.contains_key(field_type) {
                        push_unique(&mut as_unions, field_type);
                    }
                    Value::String(iri)
                }
            };
            map_term(&mut context, field, term, diagnostics);
        }

        for (field, key) in &entry.links {
            if key.is_empty() {
                diagnostics.warn(format!("Undefined key in {} on field {}", label, field));
                continue;
            }

            let class = keys.get(key).cloned().unwrap_or_else(|| presume_key(key));
            lines.push(format!("{}: {}", field, class));

            inverse
                .entry(class.clone())
                .or_default()
                .entry(field.clone())
                .or_default()
                .push(label.clone());

            push_unique(anys.entry(field.clone()).or_default(), &class);
            push_unique(&mut as_unions, &class);

            let term = json!({
                "@type": "@id",
                "@id": format!("{}{}", base, field),
            });
            map_term(&mut context, field, term, diagnostics);
        }

        if !as_unions.is_empty() {
            let target = definitions.unionize(&as_unions, label, "_any");
            lines.push(format!("_any: {}", target));
        }

        let term = json!({
            "@type": "@id",
            "@id": format!("{}/definitions/{}", base, label),
        });
        map_term(&mut context, label, term, diagnostics);

        classes.push((label.clone(), lines));
    }

    for (name, values) in &expansions.enums {
        definitions.push_enum(name, values);
    }

    for (name, fields) in &expansions.objects {
        definitions.push_type(
            format!("type {}", name),
            fields
                .iter()
                .map(|(key, ty)| format!("{}: {}", key, ty))
                .collect(),
        );
    }

    for (class, mut lines) in classes {
        if let Some(incoming) = inverse.get(&class) {
            for (link, origins) in incoming {
                let prop = format!("_inv_{}", link);
                let target = definitions.unionize(origins, &class, &prop);
                lines.push(format!("{}: {}", prop, target));
            }
        }
        definitions.push_type(format!("type {} @object", class), lines);
    }

    let mut any_lines = Vec::new();
    for (prop, candidates) in &anys {
        let target = definitions.unionize(candidates, "_Any_", prop);
        any_lines.push(format!("{}: {}", prop, target));
    }
    let labels: Vec<String> = types.keys().filter(|l| !l.is_empty()).cloned().collect();
    any_lines.push(format!("_any: {}", definitions.unionize(&labels, "_Any", "_any")));
    definitions.push_type("type _Any".to_string(), any_lines);

    let tera = load_templates()?;
    let mut ctx = Context::new();
    ctx.insert("directives", &directives());
    ctx.insert("queries", &queries);
    ctx.insert("definitions", &definitions.items);

    let sdl = tera
        .render("schema.graphql", &ctx)
        .map_err(|e| ExtractError::Generation(format!("Failed to render GraphQL schema: {}", e)))?;

    tracing::info!(
        types = classes_count(types),
        enums = expansions.enums.len(),
        objects = expansions.objects.len(),
        "Rendered GraphQL schema"
    );

    Ok(SchemaArtifacts {
        sdl,
        context: json!({ "@context": Value::Object(context) }),
    })
}

fn classes_count(types: &BTreeMap<String, crate::PreSchemaType>) -> usize {
    types.keys().filter(|l| !l.is_empty()).count()
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
