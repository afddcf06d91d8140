//! Template loading and management

use openapi_graph_extractor_common::{ExtractError, Result};
use std::collections::HashMap;
use tera::{Tera, Value};

/// Load the SDL template
pub fn load_templates() -> Result<Tera> {
    let mut tera = Tera::default();

    tera.register_filter("graphql_name", graphql_name_filter);

    tera.add_raw_template(
        "schema.graphql",
        include_str!("../templates/schema.graphql.tera"),
    )
    .map_err(|e| {
        ExtractError::Generation(format!("Failed to load schema.graphql template: {}", e))
    })?;

    Ok(tera)
}

/// Filter to turn an arbitrary enum value into a valid GraphQL name
fn graphql_name_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Ok(Value::String(graphql_name(&s)))
}

/// Replace characters outside `[_0-9A-Za-z]` and guard a leading digit
pub fn graphql_name(s: &str) -> String {
    let mut name: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }

    name
}
