//! Tool descriptors and per-agent toolboxes
//!
//! A tool binds a unique name to a JSON Schema and a handler. Agents that own a
//! [`Toolbox`] may answer with a function call; the orchestrator resolves the
//! call against the acting agent's toolbox and runs the handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::agents::domain::ToolDefinition;
use crate::agents::error::{AgentError, AgentResult};

/// Local function behind a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with model-supplied arguments and return a short confirmation
    async fn invoke(&self, arguments: &Value) -> AgentResult<String>;
}

/// Adapts a synchronous closure into a [`ToolHandler`]
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(&Value) -> AgentResult<String> + Send + Sync,
{
    async fn invoke(&self, arguments: &Value) -> AgentResult<String> {
        (self.0)(arguments)
    }
}

/// A named, schema-described callable
#[derive(Clone)]
pub struct ToolDescriptor {
    pub definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        Self { definition, handler }
    }

    /// Build a descriptor whose schema is derived from the argument type `A`
    pub fn typed<A: JsonSchema>(
        name: &str,
        description: &str,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self::new(ToolDefinition::for_arguments::<A>(name, description), handler)
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub async fn invoke(&self, arguments: &Value) -> AgentResult<String> {
        self.handler.invoke(arguments).await
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.definition.name)
            .finish()
    }
}

/// The set of tools one agent may call, keyed by unique name
#[derive(Debug, Clone, Default)]
pub struct Toolbox {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique within a toolbox
    pub fn register(&mut self, tool: ToolDescriptor) -> AgentResult<()> {
        if self.tools.contains_key(tool.name()) {
            return Err(AgentError::Configuration(format!(
                "Tool '{}' is already registered",
                tool.name()
            )));
        }
        self.tools.insert(tool.name().to_string(), tool);
        Ok(())
    }

    /// Builder form of [`Toolbox::register`]
    pub fn with(mut self, tool: ToolDescriptor) -> AgentResult<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Definitions offered to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// A toolbox restricted to the named tools; unknown names are an error
    pub fn subset(&self, names: &[&str]) -> AgentResult<Toolbox> {
        let mut subset = Toolbox::new();
        for name in names {
            let tool = self.get(name).ok_or_else(|| {
                AgentError::Configuration(format!(
                    "Tool '{}' not found in toolbox [{}]",
                    name,
                    self.names().join(", ")
                ))
            })?;
            subset.register(tool.clone())?;
        }
        Ok(subset)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Decode model-supplied arguments into a typed struct
pub fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: &Value) -> AgentResult<T> {
    // Some models send the arguments object as an encoded string
    let decoded;
    let arguments = match arguments {
        Value::String(raw) => {
            decoded = serde_json::from_str::<Value>(raw).map_err(|e| AgentError::InvalidArguments {
                tool: tool.to_string(),
                message: e.to_string(),
            })?;
            &decoded
        }
        other => other,
    };

    T::deserialize(arguments).map_err(|e| AgentError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
