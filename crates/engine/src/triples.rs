//! Page-local RDF triple store

use openapi_graph_extractor_common::vocab;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Predicate of a triple
///
/// `Type` is `rdf:type`; `Local` names are resolved against the API base
/// namespace when serialized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predicate {
    Type,
    Local(String),
}

impl Predicate {
    pub fn local(name: impl Into<String>) -> Self {
        Predicate::Local(name.into())
    }

    /// Absolute IRI given the base namespace (`<root>#`)
    pub fn iri(&self, base: &str) -> String {
        match self {
            Predicate::Type => vocab::RDF_TYPE.to_string(),
            Predicate::Local(name) => format!("{}{}", base, name),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Type => write!(f, "a"),
            Predicate::Local(name) => write!(f, ":{}", name),
        }
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Object of a triple
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Term {
    Iri(String),
    Literal {
        lexical: String,
        /// Datatype IRI; `None` for a plain string literal
        datatype: Option<String>,
    },
    /// Ordered RDF collection
    Collection(Vec<Term>),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn plain(lexical: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: None,
        }
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
        }
    }

    /// Literal typed `xsd:<name>`
    pub fn xsd(lexical: impl Into<String>, name: &str) -> Self {
        Self::typed(lexical, format!("{}{}", vocab::XSD, name))
    }

    /// Literal typed `oge:Json` holding serialized JSON
    pub fn json(value: &serde_json::Value) -> Self {
        Self::typed(value.to_string(), format!("{}Json", vocab::OGE))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn lexical(&self) -> Option<&str> {
        match self {
            Term::Literal { lexical, .. } => Some(lexical),
            _ => None,
        }
    }

    pub fn datatype(&self) -> Option<&str> {
        match self {
            Term::Literal { datatype, .. } => datatype.as_deref(),
            _ => None,
        }
    }
}

pub type PredicateMap = BTreeMap<Predicate, Vec<Term>>;

/// `subject -> predicate -> objects` for one translated page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TripleStore {
    subjects: BTreeMap<String, PredicateMap>,
}

impl TripleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the subject with an `rdf:type` unless it already exists
    pub fn declare(&mut self, subject: &str, type_iri: &str) {
        self.subjects
            .entry(subject.to_string())
            .or_insert_with(|| BTreeMap::from([(Predicate::Type, vec![Term::iri(type_iri)])]));
    }

    /// Replace the objects of `predicate` with a single term
    pub fn set(&mut self, subject: &str, predicate: Predicate, object: Term) {
        self.subject_mut(subject).insert(predicate, vec![object]);
    }

    /// Add an object to `predicate`, ignoring exact duplicates
    pub fn add(&mut self, subject: &str, predicate: Predicate, object: Term) {
        let objects = self.subject_mut(subject).entry(predicate).or_default();
        if !objects.contains(&object) {
            objects.push(object);
        }
    }

    fn subject_mut(&mut self, subject: &str) -> &mut PredicateMap {
        self.subjects.entry(subject.to_string()).or_default()
    }

    pub fn subject(&self, subject: &str) -> Option<&PredicateMap> {
        self.subjects.get(subject)
    }

    /// Objects of one subject and predicate
    pub fn objects(&self, subject: &str, predicate: &Predicate) -> &[Term] {
        self.subjects
            .get(subject)
            .and_then(|p| p.get(predicate))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PredicateMap)> {
        self.subjects.iter().map(|(s, p)| (s.as_str(), p))
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Number of subject/predicate/object statements, counting a collection once
    pub fn len(&self) -> usize {
        self.subjects
            .values()
            .flat_map(|p| p.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}
