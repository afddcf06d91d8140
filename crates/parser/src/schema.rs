//! Arena-backed JSON Schema representation
//!
//! Every resolved schema node lives in a [`SchemaArena`] and is addressed by a
//! [`SchemaId`]. Cyclic definitions point back at an existing index instead of
//! nesting, which keeps resolution finite.

use serde_json::Value;
use std::collections::BTreeMap;

/// Index of a node within a [`SchemaArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The JSON Schema node kinds the extractor understands
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Boolean,
    Integer {
        format: Option<String>,
    },
    Number {
        format: Option<String>,
    },
    String {
        format: Option<String>,
        enumeration: Option<Vec<Value>>,
    },
    Array {
        items: Option<SchemaId>,
    },
    Object {
        properties: BTreeMap<String, SchemaId>,
        /// Schema for keys not listed in `properties`
        additional_properties: Option<SchemaId>,
        required: Vec<String>,
    },
    /// A `type` this crate has no mapping for
    Other(String),
    /// No `type` declared
    Untyped,
}

/// A resolved schema node
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    /// The `$ref` this node was resolved from, if any (e.g. `#/definitions/Project`)
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl SchemaNode {
    pub fn untyped() -> Self {
        Self {
            kind: SchemaKind::Untyped,
            reference: None,
            description: None,
        }
    }

    /// Last segment of the reference, e.g. `Project` for `#/definitions/Project`
    pub fn reference_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .map(|r| r.rsplit('/').next().unwrap_or(r))
    }

    /// The JSON Schema `type` keyword for this node, if it has one
    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Boolean => Some("boolean"),
            SchemaKind::Integer { .. } => Some("integer"),
            SchemaKind::Number { .. } => Some("number"),
            SchemaKind::String { .. } => Some("string"),
            SchemaKind::Array { .. } => Some("array"),
            SchemaKind::Object { .. } => Some("object"),
            SchemaKind::Other(name) => Some(name),
            SchemaKind::Untyped => None,
        }
    }
}

/// Storage for resolved schema nodes
#[derive(Debug, Clone, Default)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
}

impl SchemaArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot that will be filled in once its node is resolved
    pub fn reserve(&mut self) -> SchemaId {
        self.push(SchemaNode::untyped())
    }

    pub fn push(&mut self, node: SchemaNode) -> SchemaId {
        self.nodes.push(node);
        SchemaId(self.nodes.len() - 1)
    }

    pub fn set(&mut self, id: SchemaId, node: SchemaNode) {
        self.nodes[id.0] = node;
    }

    pub fn get(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A fully dereferenced schema and the arena its nodes live in
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    arena: SchemaArena,
    root: SchemaId,
}

impl ResolvedSchema {
    pub(crate) fn new(arena: SchemaArena, root: SchemaId) -> Self {
        Self { arena, root }
    }

    pub fn root(&self) -> SchemaId {
        self.root
    }

    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        self.arena.get(id)
    }

    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    /// Named property of an object node
    pub fn property(&self, id: SchemaId, name: &str) -> Option<SchemaId> {
        match &self.node(id).kind {
            SchemaKind::Object { properties, .. } => properties.get(name).copied(),
            _ => None,
        }
    }

    /// Item schema of an array node
    pub fn items(&self, id: SchemaId) -> Option<SchemaId> {
        match &self.node(id).kind {
            SchemaKind::Array { items } => *items,
            _ => None,
        }
    }

    /// Properties and additional-properties schema of an object node
    pub fn object_shape(
        &self,
        id: SchemaId,
    ) -> Option<(&BTreeMap<String, SchemaId>, Option<SchemaId>)> {
        match &self.node(id).kind {
            SchemaKind::Object {
                properties,
                additional_properties,
                ..
            } => Some((properties, *additional_properties)),
            _ => None,
        }
    }
}
