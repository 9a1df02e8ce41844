//! MCP tool abstraction and registry
//!
//! Every tool exposes a name, description and JSON input schema, and executes
//! against a JSON argument object. The registry dispatches `tools/call`
//! requests and the function-calling bridge by name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use crate::error::{McpError, Result, ToolkitError, ValidationError};
use crate::mcp::types::{CallToolResult, Tool as ToolDefinition};
use crate::schema::{FunctionCall, FunctionCallResult};

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name
    fn name(&self) -> &'static str;

    /// Human-readable description shown to the model
    fn description(&self) -> &'static str;

    /// JSON Schema of the argument object
    fn input_schema(&self) -> Value;

    /// Execute the tool
    async fn call(&self, args: Value) -> Result<CallToolResult>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
        }
    }
}

/// Registry of tools keyed by name, listed in registration order
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool of the same name in place
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name();
        match self.index.get(name) {
            Some(&pos) => {
                tracing::warn!(tool = name, "Replacing previously registered tool");
                self.tools[pos] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&pos| self.tools[pos].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names of all registered tools
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Call a tool by name.
    ///
    /// Never fails: unknown tools and tool errors are reported as error
    /// results so the caller can show them to the model.
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        let Some(tool) = self.get(name) else {
            let err = McpError::UnknownTool {
                name: name.to_string(),
            };
            tracing::debug!(error = %err, "Rejecting tool call");
            return CallToolResult::error(err.to_string());
        };

        match tool.call(args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "Tool returned an error");
                CallToolResult::error(e.to_string())
            }
        }
    }

    /// Run a model-issued function call
    pub async fn execute(&self, call: FunctionCall) -> FunctionCallResult {
        let result = self.call_tool(&call.name, call.arguments).await;
        FunctionCallResult::from_tool_result(call.id, result)
    }
}

/// Deserialize tool arguments, treating `null` as an empty object
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };

    serde_json::from_value(args).map_err(|e| {
        ToolkitError::Validation(ValidationError::InvalidArguments {
            message: e.to_string(),
        })
    })
}

/// Deserialize and validate tool arguments
pub fn parse_validated_args<T: DeserializeOwned + Validate>(args: Value) -> Result<T> {
    let parsed: T = parse_args(args)?;
    parsed.validate().map_err(|errors| {
        ToolkitError::Validation(ValidationError::InvalidArguments {
            message: describe_validation_errors(&errors),
        })
    })?;
    Ok(parsed)
}

/// Flatten validator output into one sentence per failing field
pub fn describe_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                let mut bounds = Vec::new();
                for key in ["min", "max", "equal"] {
                    if let Some(v) = err.params.get(key) {
                        bounds.push(format!("{} {}", key, v));
                    }
                }
                if bounds.is_empty() {
                    format!("'{}' failed {} check", field, err.code)
                } else {
                    format!("'{}' failed {} check ({})", field, err.code, bounds.join(", "))
                }
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}
