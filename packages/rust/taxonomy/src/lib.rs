//! Insight taxonomy flattening.
//!
//! The solver service annotates each insight with a taxonomy: either a
//! ready-made breadcrumb string, or a nested category mapping whose keys
//! are category names and whose values are further mappings or a list of
//! leaf names. Exactly one branch of the mapping carries data; this crate
//! flattens that branch into a single display path like
//! `"General Formulation > Variable Definition > Continuous vs. Discrete Confusion"`.
//!
//! The flattened path is computed once at ingestion and stored on the
//! [`Insight`]; the raw mapping is never consulted again.

mod records;

use serde_json::{Map, Value};

use optdesk_shared::{Insight, OptdeskError, RawInsight, Result};

pub use records::insight_records;

/// Separator between path segments in the flattened display string.
pub const PATH_SEPARATOR: &str = " > ";

/// Normalize a wire insight record into its display form.
pub fn normalize(raw: &RawInsight) -> Result<Insight> {
    Ok(Insight {
        category: raw.category.clone(),
        taxonomy_path: display_path(&raw.taxonomy)?,
        condition: raw.condition.clone(),
        explanation: raw.explanation.clone(),
        example: raw.example.clone(),
    })
}

/// Flatten a raw taxonomy value into one display path.
///
/// A plain string is taken verbatim. A nested mapping is descended
/// depth-first along its single populated branch; the top-level key is
/// the tree's root label (e.g. `"Insight Taxonomy"`) and is excluded
/// from the path. A mapping with zero or multiple populated branches at
/// any level is rejected as malformed upstream data.
pub fn display_path(raw: &Value) -> Result<String> {
    match raw {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(OptdeskError::taxonomy("taxonomy string is empty"));
            }
            Ok(trimmed.to_string())
        }
        Value::Object(map) => {
            // The root key is a synthetic label, not a path segment.
            let (_, branch) = single_populated_branch(map)?;
            let mut segments = Vec::new();
            descend(branch, &mut segments)?;
            Ok(segments.join(PATH_SEPARATOR))
        }
        other => Err(OptdeskError::taxonomy(format!(
            "taxonomy must be a string or nested mapping, got {}",
            json_kind(other)
        ))),
    }
}

/// Walk one level of the mapping, collecting path segments.
fn descend(value: &Value, segments: &mut Vec<String>) -> Result<()> {
    match value {
        Value::Object(map) => {
            let (key, branch) = single_populated_branch(map)?;
            segments.push(key.to_string());
            descend(branch, segments)
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(leaf) => segments.push(leaf.clone()),
                    other => {
                        return Err(OptdeskError::taxonomy(format!(
                            "leaf list must contain strings, got {}",
                            json_kind(other)
                        )));
                    }
                }
            }
            Ok(())
        }
        other => Err(OptdeskError::taxonomy(format!(
            "expected nested mapping or leaf list, got {}",
            json_kind(other)
        ))),
    }
}

/// Find the single key of `map` whose value carries data.
///
/// Siblings are allowed to exist but must be empty; more than one
/// populated branch means the upstream record is ambiguous, and an
/// entirely empty mapping has no path to derive.
fn single_populated_branch(map: &Map<String, Value>) -> Result<(&str, &Value)> {
    let mut populated = map.iter().filter(|(_, v)| is_populated(v));

    let first = populated
        .next()
        .ok_or_else(|| OptdeskError::taxonomy("mapping has no populated branch"))?;

    if let Some((second, _)) = populated.next() {
        return Err(OptdeskError::taxonomy(format!(
            "mapping has multiple populated branches ('{}' and '{second}'); expected exactly one",
            first.0
        )));
    }

    Ok((first.0.as_str(), first.1))
}

/// A branch carries data if it eventually reaches a non-empty leaf list.
fn is_populated(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.values().any(is_populated),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
