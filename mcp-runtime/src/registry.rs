use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::dispatcher::ResponseEnvelope;
use crate::error::ToolError;
use crate::upstream::UpstreamClient;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ResponseEnvelope, ToolError>> + Send>>;

/// Translates one argument bag into upstream calls and a response envelope.
pub type ToolHandler = fn(Arc<dyn UpstreamClient>, Map<String, Value>) -> HandlerFuture;

/// Immutable metadata describing a tool. The schema is descriptive only;
/// handlers enforce their own required arguments.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object
    #[schema(value_type = Object)]
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// Name-keyed tool table that preserves registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: ToolHandler,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateTool(definition.name));
        }
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            definition,
            handler,
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<ToolHandler> {
        self.index.get(name).map(|&i| self.tools[i].handler)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Definitions in registration order.
    pub fn list(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|tool| &tool.definition)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Closest registered name to a misspelled one, if any is reasonably close.
    pub fn suggest(&self, name: &str) -> Option<String> {
        self.tools
            .iter()
            .map(|tool| {
                (
                    strsim::normalized_levenshtein(name, &tool.definition.name),
                    &tool.definition.name,
                )
            })
            .filter(|(score, _)| *score >= 0.6)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, name)| name.clone())
    }
}
