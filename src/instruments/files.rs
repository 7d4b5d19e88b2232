//! Report file writers

use std::path::Path;

use serde_json::Value;

use crate::agents::error::{AgentError, AgentResult};

/// Models often emit Python-style quotes; JSON wants double quotes
pub fn normalize_quotes(payload: &str) -> String {
    payload.replace('\'', "\"")
}

fn parse_payload(payload: &str) -> AgentResult<Value> {
    serde_json::from_str(&normalize_quotes(payload))
        .map_err(|e| AgentError::Serialization(format!("Error decoding JSON: {}", e)))
}

fn write(path: &Path, content: &str) -> AgentResult<()> {
    std::fs::write(path, content)
        .map_err(|e| AgentError::Persistence(format!("{}: {}", path.display(), e)))
}

pub fn write_text(path: &Path, content: &str) -> AgentResult<()> {
    write(path, content)
}

/// Parse `payload` as JSON and write it pretty-printed
///
/// Nothing is written when the payload does not parse.
pub fn write_json(path: &Path, payload: &str) -> AgentResult<()> {
    let value = parse_payload(payload)?;
    let pretty = serde_json::to_string_pretty(&value)
        .map_err(|e| AgentError::Serialization(e.to_string()))?;
    write(path, &pretty)
}

/// Parse `payload` as JSON and write it as YAML
///
/// Nothing is written when the payload does not parse.
pub fn write_yaml(path: &Path, payload: &str) -> AgentResult<()> {
    let value = parse_payload(payload)?;
    let yaml = serde_yaml::to_string(&value)
        .map_err(|e| AgentError::Serialization(e.to_string()))?;
    write(path, &yaml)
}

/// Whether a file exists and has content
pub fn has_content(path: &Path) -> bool {
    std::fs::metadata(path).map_or(false, |meta| meta.len() > 0)
}
