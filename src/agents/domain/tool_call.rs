//! Tool call types for agent interactions

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call requested by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Arguments passed to the tool (as JSON)
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool call with a freshly generated id
    pub fn with_generated_id(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(Self::generate_id(), name, arguments)
    }

    /// Generate a unique ID for a tool call
    pub fn generate_id() -> String {
        format!("call_{}", &uuid::Uuid::new_v4().simple().to_string()[..24])
    }

    pub fn string_argument(&self, key: &str) -> Option<String> {
        string_argument(&self.arguments, key)
    }
}

/// Read a string argument from an object or a JSON-encoded object
pub fn string_argument(arguments: &Value, key: &str) -> Option<String> {
    match arguments {
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()?
            .get(key)?
            .as_str()
            .map(str::to_string),
        other => other.get(key)?.as_str().map(str::to_string),
    }
}

/// Definition of a tool offered to a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema defining the tool's parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Create a tool definition whose parameters are derived from an argument type
    pub fn for_arguments<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        let schema = schemars::schema_for!(T);
        let mut parameters = serde_json::to_value(schema).unwrap_or(Value::Null);
        if let Some(obj) = parameters.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        Self::new(name, description, parameters)
    }
}
