//! Request argument model
//!
//! A [`RequestConfig`] describes what gets substituted into a request: path
//! template arguments, query string arguments, headers and body arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A primitive argument value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Integer(i) => write!(f, "{}", i),
            ArgValue::Float(x) => write!(f, "{}", x),
            ArgValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::String(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::String(s)
    }
}

impl From<i64> for ArgValue {
    fn from(i: i64) -> Self {
        ArgValue::Integer(i)
    }
}

impl From<u64> for ArgValue {
    fn from(i: u64) -> Self {
        i64::try_from(i)
            .map(ArgValue::Integer)
            .unwrap_or_else(|_| ArgValue::String(i.to_string()))
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

/// Arguments keyed by parameter name
pub type ArgMap = BTreeMap<String, ArgValue>;

/// Arguments for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Args to substitute into the path template
    #[serde(default)]
    pub path_args: ArgMap,

    /// Args appended to the URL search params
    #[serde(default)]
    pub query_args: ArgMap,

    /// Args set in the header of the request
    #[serde(default)]
    pub header_args: ArgMap,

    /// Args sent in the content body
    #[serde(default)]
    pub body_args: ArgMap,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path_arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.path_args.insert(name.into(), value.into());
        self
    }

    pub fn with_query_arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.query_args.insert(name.into(), value.into());
        self
    }

    pub fn with_header_arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.header_args.insert(name.into(), value.into());
        self
    }

    /// Merge `other` into `self` without overwriting keys that are already set
    ///
    /// The first writer of a key wins. Repeated crawl passes rely on this so
    /// that a later hook cannot flip an argument an earlier one established.
    pub fn merge_absent(&mut self, other: RequestConfig) {
        merge_absent(&mut self.path_args, other.path_args);
        merge_absent(&mut self.query_args, other.query_args);
        merge_absent(&mut self.header_args, other.header_args);
        merge_absent(&mut self.body_args, other.body_args);
    }

    pub fn is_empty(&self) -> bool {
        self.path_args.is_empty()
            && self.query_args.is_empty()
            && self.header_args.is_empty()
            && self.body_args.is_empty()
    }
}

fn merge_absent(target: &mut ArgMap, source: ArgMap) {
    for (key, value) in source {
        target.entry(key).or_insert(value);
    }
}
