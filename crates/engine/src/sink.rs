//! Triple sinks receiving one store per translated page

use crate::triples::{Predicate, Term, TripleStore};
use openapi_graph_extractor_common::{ExtractError, Result};
use oxrdf::vocab::rdf;
use oxrdf::{BlankNode, Literal, NamedNode, Term as RdfTerm, Triple};
use oxttl::NTriplesSerializer;
use serde::Serialize;
use std::io::Write;

/// Entry written to a [`TripleSink`]
///
/// Serializes as `{"type": "c3", "value": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SinkEntry {
    C3(TripleStore),
}

/// Receives the triples produced by the engine
pub trait TripleSink {
    fn write(&mut self, entry: SinkEntry) -> Result<()>;

    /// Called once after the crawl finishes
    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps every written store in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    stores: Vec<TripleStore>,
    ended: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stores(&self) -> &[TripleStore] {
        &self.stores
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Total number of statements across all pages
    pub fn triple_count(&self) -> usize {
        self.stores.iter().map(TripleStore::len).sum()
    }

    /// All objects of `subject`/`predicate` across pages
    pub fn objects(&self, subject: &str, predicate: &Predicate) -> Vec<&Term> {
        self.stores
            .iter()
            .flat_map(|store| store.objects(subject, predicate))
            .collect()
    }
}

impl TripleSink for CollectingSink {
    fn write(&mut self, entry: SinkEntry) -> Result<()> {
        match entry {
            SinkEntry::C3(store) => self.stores.push(store),
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ended = true;
        Ok(())
    }
}

/// Streams N-Triples to any writer
///
/// Local predicates are expanded against `base` (the API root followed by
/// `#`). Collections become `rdf:first`/`rdf:rest` chains of blank nodes.
/// Subjects, predicates and datatypes must be valid IRIs.
pub struct NTriplesSink<W: Write> {
    writer: W,
    base: String,
    blank_nodes: usize,
    written: usize,
}

impl<W: Write> NTriplesSink<W> {
    pub fn new(writer: W, base: impl Into<String>) -> Self {
        Self {
            writer,
            base: base.into(),
            blank_nodes: 0,
            written: 0,
        }
    }

    /// Number of triples written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn fresh_blank_node(&mut self) -> Result<BlankNode> {
        self.blank_nodes += 1;
        let id = format!("b{}", self.blank_nodes);
        BlankNode::new(id.as_str()).map_err(|e| ExtractError::InvalidTerm {
            term: format!("_:{}", id),
            reason: e.to_string(),
        })
    }

    /// Convert a term in object position, pushing any collection statements first
    fn object(&mut self, term: &Term, triples: &mut Vec<Triple>) -> Result<RdfTerm> {
        match term {
            Term::Iri(iri) => Ok(named_node(iri)?.into()),
            Term::Literal { lexical, datatype } => Ok(match datatype {
                Some(datatype) => Literal::new_typed_literal(lexical.as_str(), named_node(datatype)?),
                None => Literal::new_simple_literal(lexical.as_str()),
            }
            .into()),
            Term::Collection(items) => {
                let nil: RdfTerm = rdf::NIL.into_owned().into();
                if items.is_empty() {
                    return Ok(nil);
                }

                let mut nodes = Vec::with_capacity(items.len());
                for _ in items {
                    nodes.push(self.fresh_blank_node()?);
                }
                for (index, item) in items.iter().enumerate() {
                    let first = self.object(item, triples)?;
                    triples.push(Triple::new(nodes[index].clone(), rdf::FIRST.into_owned(), first));
                    let rest: RdfTerm = match nodes.get(index + 1) {
                        Some(next) => next.clone().into(),
                        None => nil.clone(),
                    };
                    triples.push(Triple::new(nodes[index].clone(), rdf::REST.into_owned(), rest));
                }
                Ok(nodes[0].clone().into())
            }
        }
    }
}

impl<W: Write> TripleSink for NTriplesSink<W> {
    fn write(&mut self, entry: SinkEntry) -> Result<()> {
        let SinkEntry::C3(store) = entry;

        let mut triples = Vec::new();
        for (subject, predicates) in store.iter() {
            let subject = named_node(subject)?;
            for (predicate, objects) in predicates {
                let predicate = named_node(&predicate.iri(&self.base))?;
                for object in objects {
                    let object = self.object(object, &mut triples)?;
                    triples.push(Triple::new(subject.clone(), predicate.clone(), object));
                }
            }
        }

        let mut serializer = NTriplesSerializer::new().for_writer(&mut self.writer);
        for triple in &triples {
            serializer.serialize_triple(triple)?;
        }
        serializer.finish();
        self.written += triples.len();

        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.writer.flush()?;
        tracing::debug!(triples = self.written, "Finished writing N-Triples");
        Ok(())
    }
}

fn named_node(iri: &str) -> Result<NamedNode> {
    NamedNode::new(iri).map_err(|e| ExtractError::InvalidTerm {
        term: iri.to_string(),
        reason: e.to_string(),
    })
}
