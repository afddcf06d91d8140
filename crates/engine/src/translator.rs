//! Translation of one response page into RDF triples
//!
//! A page body has the shape `{meta, links, linked, data}`. `data` holds one
//! item or a list of items described by the operation's response schema.
//! `links` maps dotted data paths such as `data.project` to HATEOAS
//! descriptors `{type, href}` whose `href` embeds `{data.<path>}`
//! substitutions evaluated against each item.

use crate::sink::{SinkEntry, TripleSink};
use crate::triples::{Predicate, Term, TripleStore};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use openapi_graph_extractor_common::{vocab, Diagnostics, ExtractError, Result};
use openapi_graph_extractor_generator::{
    infer_field_type, Expansions, PreSchemaType, SchemaInferencer,
};
use openapi_graph_extractor_parser::{template, ResolvedSchema, SchemaId, SchemaKind};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// One piece of a link `href` template
#[derive(Debug, Clone, PartialEq)]
enum HrefPart {
    Literal(String),
    /// Path below `data` to substitute, e.g. `["project", "id"]`
    DataPath(Vec<String>),
}

/// A link descriptor keyed under `data.`
#[derive(Debug, Clone, PartialEq)]
struct DataLink {
    /// Resource kind the link points at, e.g. `projects`
    kind: String,
    /// Path segments after `data`, e.g. `["project"]`
    path: Vec<String>,
    href: String,
    parts: Vec<HrefPart>,
}

/// Where items and their type come from in a response schema
struct ItemShape {
    /// Object schema describing each item
    item: SchemaId,
    /// `$ref` the item schema was resolved from
    reference: Option<String>,
    /// Whether the response wraps items in `data`
    wrapped: bool,
}

/// Result of translating one page
#[derive(Debug, Clone, Default)]
pub struct Translation {
    /// Root-relative resource paths found through links
    pub discovered: BTreeSet<String>,
    /// Number of items in `data`
    pub items: usize,
    pub type_label: Option<String>,
    /// Whether a triple store was written to the sink
    pub written: bool,
}

/// Translates a single response page
pub struct Translator<'a> {
    root: &'a str,
    template: &'a str,
    actual: &'a str,
    base: String,
    schema: &'a ResolvedSchema,
    body: &'a Value,
    sink: &'a mut dyn TripleSink,
    obtained: &'a mut BTreeSet<String>,
    diagnostics: &'a mut Diagnostics,
    triples: TripleStore,
    discovered: BTreeSet<String>,
}

impl<'a> Translator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root: &'a str,
        template: &'a str,
        actual: &'a str,
        schema: &'a ResolvedSchema,
        body: &'a Value,
        sink: &'a mut dyn TripleSink,
        obtained: &'a mut BTreeSet<String>,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            root,
            template,
            actual,
            base: format!("{}{}", root, actual),
            schema,
            body,
            sink,
            obtained,
            diagnostics,
            triples: TripleStore::new(),
            discovered: BTreeSet::new(),
        }
    }

    /// Translate the page, write its triples and update `inferencer`
    pub fn run(mut self, inferencer: &mut SchemaInferencer) -> Result<Translation> {
        let body = self.body;
        let links = parse_links(body)?;

        let data = match body.get("data") {
            Some(data) if !data.is_null() => data,
            _ => {
                let status = body.pointer("/meta/status").and_then(Value::as_str);
                if status == Some("Unauthorized") {
                    self.diagnostics
                        .warn(format!("Not authorized to access {}", self.base));
                    return Ok(Translation::default());
                }
                return Err(ExtractError::MissingData {
                    body: body.to_string(),
                });
            }
        };

        let single = !data.is_array();
        let rows: Vec<&Value> = match data {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let shape = self.item_shape()?;
        let key = template::type_key(self.template).to_string();
        let parameterized = template::is_parameterized(self.template);

        let mut type_label: Option<String> = None;
        let mut exemplar = true;
        let mut link_fields: BTreeMap<String, String> = BTreeMap::new();

        for row in &rows {
            let Value::Object(source) = row else {
                return Err(ExtractError::SchemaViolation {
                    key: "data".to_string(),
                    expected: "object".to_string(),
                });
            };

            let subject = if parameterized && single {
                format!("{}{}", self.root, self.actual)
            } else {
                format!("{}/{}", self.base, item_id(source)?)
            };
            self.obtained
                .insert(subject[self.root.len()..].to_string());

            let mut type_iri = self.base.clone();
            if let Some(reference) = shape.reference.as_deref() {
                type_iri = format!("{}{}", self.root, reference);
                let local = reference.rsplit('/').next().unwrap_or(reference);

                match &type_label {
                    Some(label) if label != local => {
                        return Err(ExtractError::InconsistentShape {
                            expected: label.clone(),
                            found: local.to_string(),
                        });
                    }
                    _ => type_label = Some(local.to_string()),
                }

                if source.get("type").and_then(Value::as_str) != Some(key.as_str()) {
                    exemplar = false;
                }
            }

            self.triples.declare(&subject, &type_iri);

            let mut item = source.clone();
            for link in &links {
                self.apply_link(link, &item, &subject, &mut link_fields)?;
            }
            for link in &links {
                remove_path(&mut item, &link.path);
            }

            let schema = self.schema;
            self.remap(schema.object_shape(shape.item), &item, &subject)?;
        }

        let store = std::mem::take(&mut self.triples);
        self.sink.write(SinkEntry::C3(store))?;

        if let Some(label) = type_label.as_deref() {
            let mut expansions = Expansions::default();
            let mut fields = BTreeMap::new();
            if shape.wrapped {
                if let Some((properties, _)) = self.schema.object_shape(shape.item) {
                    for (field, id) in properties {
                        if link_fields.contains_key(field) {
                            continue;
                        }
                        if let Some(field_type) =
                            infer_field_type(self.schema, *id, label, field, &mut expansions)
                        {
                            fields.insert(field.clone(), field_type);
                        }
                    }
                }
            }

            let entry = PreSchemaType {
                key: key.clone(),
                links: link_fields,
                fields,
            };
            if inferencer.register_type(label, entry, exemplar) {
                tracing::debug!(type_label = label, exemplar, "Registered GraphQL type shape");
            }
            inferencer.merge_expansions(expansions);
        }

        Ok(Translation {
            discovered: self.discovered,
            items: rows.len(),
            type_label,
            written: true,
        })
    }

    /// Locate the item schema within the response schema
    fn item_shape(&self) -> Result<ItemShape> {
        let schema = self.schema;
        let root = schema.root();

        match &schema.node(root).kind {
            SchemaKind::Object { .. } => {
                let data = schema.property(root, "data").ok_or_else(|| {
                    ExtractError::UnsupportedSchema(format!(
                        "Response schema of {} has no 'data' property",
                        self.template
                    ))
                })?;

                let item = match &schema.node(data).kind {
                    SchemaKind::Array { items: Some(items) } => *items,
                    SchemaKind::Object { .. } => data,
                    other => {
                        return Err(ExtractError::UnsupportedSchema(format!(
                            "Unhandled data type in response schema: {}",
                            kind_name(other)
                        )))
                    }
                };

                Ok(ItemShape {
                    item,
                    reference: schema.node(item).reference.clone(),
                    wrapped: true,
                })
            }
            SchemaKind::Array { items: Some(items) } => match &schema.node(*items).kind {
                SchemaKind::Object { .. } => Ok(ItemShape {
                    item: *items,
                    reference: None,
                    wrapped: false,
                }),
                other => Err(ExtractError::UnsupportedSchema(format!(
                    "Unhandled array item type in response schema: {}",
                    kind_name(other)
                ))),
            },
            other => Err(ExtractError::UnsupportedSchema(format!(
                "Unhandled type in response schema: {}",
                kind_name(other)
            ))),
        }
    }

    /// Record every instance of `link` for one item
    fn apply_link(
        &mut self,
        link: &DataLink,
        item: &Map<String, Value>,
        subject: &str,
        link_fields: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let mut segments: Vec<Vec<String>> = Vec::with_capacity(link.parts.len());
        for part in &link.parts {
            match part {
                HrefPart::Literal(text) => segments.push(vec![text.clone()]),
                HrefPart::DataPath(path) => {
                    let value = match resolve_path(item, path) {
                        None | Some(Value::Null) => return Ok(()),
                        Some(value) => value,
                    };
                    segments.push(substitution_values(value, &link.href)?);
                }
            }
        }

        for resource in cartesian(&segments) {
            if let Some(relative) = resource.strip_prefix(self.root) {
                self.discovered.insert(relative.to_string());
            }

            let mut node = subject.to_string();
            let last = link.path.len().saturating_sub(1);
            for (index, part) in link.path.iter().enumerate() {
                if index < last {
                    let next = format!("{}/{}", node, part);
                    self.triples
                        .add(&node, Predicate::local(part.clone()), Term::iri(next.clone()));
                    node = next;
                } else {
                    self.triples
                        .add(&node, Predicate::local(part.clone()), Term::iri(resource.clone()));
                }
            }

            if let [field] = link.path.as_slice() {
                link_fields.insert(field.clone(), link.kind.clone());
            }
        }

        Ok(())
    }

    /// Map the properties of an object onto triples of `subject`
    fn remap(
        &mut self,
        shape: Option<(&BTreeMap<String, SchemaId>, Option<SchemaId>)>,
        object: &Map<String, Value>,
        subject: &str,
    ) -> Result<()> {
        let schema = self.schema;
        let (properties, additional) = match shape {
            Some((properties, additional)) => (Some(properties), additional),
            None => (None, None),
        };

        for (key, value) in object {
            if value.is_null() {
                continue;
            }

            let declared = properties.and_then(|p| p.get(key)).copied();
            let def = declared.or(additional);
            let not_actually_object = declared.is_none()
                && additional.is_some_and(|a| {
                    matches!(schema.node(a).kind, SchemaKind::Object { .. })
                })
                && !value.is_object();

            let term = self.remap_value(def, value, subject, key, not_actually_object)?;
            self.triples.set(subject, Predicate::local(key.clone()), term);
        }

        Ok(())
    }

    fn remap_value(
        &mut self,
        def: Option<SchemaId>,
        value: &Value,
        parent: &str,
        key: &str,
        not_actually_object: bool,
    ) -> Result<Term> {
        let schema = self.schema;
        let kind = def.map(|id| &schema.node(id).kind);

        let kind = match kind {
            Some(SchemaKind::Untyped) | None => return self.unschemad(value, parent, key),
            Some(_) if not_actually_object => return self.unschemad(value, parent, key),
            Some(kind) => kind,
        };

        if value.is_null() {
            return Ok(Term::json(value));
        }

        match kind {
            SchemaKind::Boolean => Ok(Term::xsd(lexical(value), "boolean")),
            SchemaKind::Integer { .. } => Ok(Term::xsd(lexical(value), "integer")),
            SchemaKind::Number { .. } => Ok(Term::xsd(lexical(value), "decimal")),
            SchemaKind::String { format, .. } => {
                if format.as_deref() == Some("date-time") {
                    let normalized = normalize_date_time(value).unwrap_or_else(|| lexical(value));
                    Ok(Term::xsd(normalized, "dateTime"))
                } else {
                    Ok(Term::xsd(lexical(value), "string"))
                }
            }
            SchemaKind::Array { items } => {
                let Value::Array(elements) = value else {
                    return Err(ExtractError::SchemaViolation {
                        key: key.to_string(),
                        expected: "array".to_string(),
                    });
                };
                let container = format!("{}/{}", parent, key);
                let mut mapped = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    mapped.push(self.remap_value(
                        *items,
                        element,
                        &container,
                        &index.to_string(),
                        false,
                    )?);
                }
                Ok(Term::Collection(mapped))
            }
            SchemaKind::Object {
                properties,
                additional_properties,
                ..
            } => {
                let node = format!("{}/{}", parent, key);
                let class = if additional_properties.is_some() {
                    "Dictionary"
                } else {
                    "Object"
                };
                self.triples
                    .set(&node, Predicate::Type, Term::iri(format!("{}{}", vocab::OGE, class)));

                let Value::Object(object) = value else {
                    return Err(ExtractError::SchemaViolation {
                        key: key.to_string(),
                        expected: "object".to_string(),
                    });
                };

                self.remap(Some((properties, *additional_properties)), object, &node)?;
                Ok(Term::iri(node))
            }
            SchemaKind::Other(name) => Err(ExtractError::UnsupportedSchema(format!(
                "Datatype mapping for {} not implemented",
                name
            ))),
            SchemaKind::Untyped => self.unschemad(value, parent, key),
        }
    }

    /// Best-effort literal for a value the schema does not describe
    fn unschemad(&mut self, value: &Value, parent: &str, key: &str) -> Result<Term> {
        self.diagnostics
            .warn(format!("Property was not defined in schema: {}", key));

        Ok(match value {
            Value::String(s) => Term::plain(s.clone()),
            Value::Bool(b) => Term::xsd(b.to_string(), "boolean"),
            Value::Number(n) if n.is_i64() || n.is_u64() => Term::xsd(n.to_string(), "integer"),
            Value::Number(n) => Term::xsd(n.to_string(), "decimal"),
            Value::Array(elements) => {
                let container = format!("{}/{}", parent, key);
                let mut mapped = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    mapped.push(self.unschemad(element, &container, &index.to_string())?);
                }
                Term::Collection(mapped)
            }
            other => Term::json(other),
        })
    }
}

/// Parse the `data.` link descriptors of a page body
fn parse_links(body: &Value) -> Result<Vec<DataLink>> {
    let Some(links) = body.get("links").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    let mut parsed = Vec::new();
    for (key, descriptor) in links {
        let mut path = key.split('.');
        if path.next() != Some("data") {
            continue;
        }
        let path: Vec<String> = path.map(str::to_string).collect();
        if path.is_empty() {
            continue;
        }

        let href = descriptor
            .get("href")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let kind = descriptor
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        parsed.push(DataLink {
            kind,
            path,
            parts: parse_href(&href)?,
            href,
        });
    }

    Ok(parsed)
}

/// Split an `href` template into literal text and `{data.<path>}` substitutions
fn parse_href(href: &str) -> Result<Vec<HrefPart>> {
    let mut parts = Vec::new();
    let mut rest = href;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        let inner = &rest[open + 1..close];
        if inner.is_empty() {
            parts.push(HrefPart::Literal(rest[..=close].to_string()));
            rest = &rest[close + 1..];
            continue;
        }

        let Some(path) = inner.strip_prefix("data.") else {
            return Err(ExtractError::Parse(format!(
                "Found non-data path in link href: {}",
                href
            )));
        };

        parts.push(HrefPart::Literal(rest[..open].to_string()));
        parts.push(HrefPart::DataPath(
            path.split('.').map(str::to_string).collect(),
        ));
        rest = &rest[close + 1..];
    }

    parts.push(HrefPart::Literal(rest.to_string()));
    Ok(parts)
}

/// Stringified substitution candidates for one data path value
fn substitution_values(value: &Value, href: &str) -> Result<Vec<String>> {
    match value {
        Value::Array(elements) => elements
            .iter()
            .map(|element| {
                primitive_text(element).ok_or_else(|| ExtractError::UnsupportedLinkValue {
                    href: href.to_string(),
                })
            })
            .collect(),
        other => primitive_text(other)
            .map(|text| vec![text])
            .ok_or_else(|| ExtractError::UnsupportedLinkValue {
                href: href.to_string(),
            }),
    }
}

fn primitive_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Every concatenation taking one option from each segment, in order
fn cartesian(segments: &[Vec<String>]) -> Vec<String> {
    let mut results = vec![String::new()];
    for options in segments {
        let mut next = Vec::with_capacity(results.len() * options.len());
        for prefix in &results {
            for option in options {
                next.push(format!("{}{}", prefix, option));
            }
        }
        results = next;
    }
    results
}

fn resolve_path<'v>(item: &'v Map<String, Value>, path: &[String]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    let mut current = item.get(first)?;
    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Remove the property at `path` from an item, if present
fn remove_path(item: &mut Map<String, Value>, path: &[String]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = item;
    for segment in parents {
        match current.get_mut(segment) {
            Some(Value::Object(map)) => current = map,
            _ => return,
        }
    }
    current.shift_remove(last);
}

fn item_id(item: &Map<String, Value>) -> Result<String> {
    item.get("id")
        .and_then(primitive_text)
        .ok_or_else(|| ExtractError::SchemaViolation {
            key: "id".to_string(),
            expected: "identifier".to_string(),
        })
}

fn lexical(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2021-01-01T00:00:00.000Z`
fn normalize_date_time(value: &Value) -> Option<String> {
    let parsed: DateTime<Utc> = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })?,
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?)?,
        _ => return None,
    };
    Some(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn kind_name(kind: &SchemaKind) -> &str {
    match kind {
        SchemaKind::Boolean => "boolean",
        SchemaKind::Integer { .. } => "integer",
        SchemaKind::Number { .. } => "number",
        SchemaKind::String { .. } => "string",
        SchemaKind::Array { .. } => "array",
        SchemaKind::Object { .. } => "object",
        SchemaKind::Other(name) => name,
        SchemaKind::Untyped => "untyped",
    }
}
