//! Tool schemas and function calling
//!
//! Input schemas are derived from argument structs with `schemars`, then
//! rendered in whichever shape a model API expects. Tool invocations coming
//! back from those APIs are normalized into [`FunctionCall`].

use std::str::FromStr;

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{Result, ValidationError};
use crate::mcp::types::{CallToolResult, Tool};

/// Generates a JSON schema for a tool's argument type.
///
/// Subschemas are inlined so that enums appear as plain `enum` lists, and
/// `Option` fields are left as their inner type rather than widened to
/// `[T, "null"]`.
pub fn generate_schema<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.option_add_null_type = false;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();

    let mut value = serde_json::to_value(root).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut value {
        map.remove("title");
        map.entry("type").or_insert_with(|| json!("object"));
        map.entry("properties").or_insert_with(|| json!({}));
    }
    value
}

/// Tool schema dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// MCP `tools/list` entries
    Mcp,
    /// OpenAI chat-completions `tools`
    OpenAi,
    /// Anthropic messages `tools`
    Anthropic,
}

impl FromStr for SchemaFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mcp" => Ok(SchemaFormat::Mcp),
            "openai" => Ok(SchemaFormat::OpenAi),
            "anthropic" => Ok(SchemaFormat::Anthropic),
            other => Err(format!(
                "unknown schema format '{}' (expected mcp, openai or anthropic)",
                other
            )),
        }
    }
}

/// Render a single tool definition in the requested dialect
pub fn format_tool(tool: &Tool, format: SchemaFormat) -> Value {
    let description = tool.description.clone().unwrap_or_default();
    match format {
        SchemaFormat::Mcp => serde_json::to_value(tool).unwrap_or(Value::Null),
        SchemaFormat::OpenAi => json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": description,
                "parameters": tool.input_schema,
            }
        }),
        SchemaFormat::Anthropic => json!({
            "name": tool.name,
            "description": description,
            "input_schema": tool.input_schema,
        }),
    }
}

/// Render a list of tool definitions in the requested dialect
pub fn format_tools(tools: &[Tool], format: SchemaFormat) -> Value {
    Value::Array(tools.iter().map(|t| format_tool(t, format)).collect())
}

/// A model's request to run a named tool
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Provider-assigned call ID, echoed back with the result
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    /// Parse an OpenAI `tool_calls[]` entry.
    ///
    /// `function.arguments` arrives as a JSON-encoded string.
    pub fn from_openai(tool_call: &Value) -> Result<Self> {
        if let Some(kind) = tool_call.get("type").and_then(Value::as_str) {
            if kind != "function" {
                return Err(invalid("type", format!("unsupported tool call type '{}'", kind)));
            }
        }

        let function = tool_call
            .get("function")
            .ok_or_else(|| missing("function"))?;
        let name = function
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("function.name"))?;

        let arguments = match function.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
            Some(Value::String(raw)) => serde_json::from_str(raw)
                .map_err(|e| invalid("function.arguments", e.to_string()))?,
            Some(other) => other.clone(),
        };

        Ok(Self {
            id: tool_call.get("id").and_then(Value::as_str).map(String::from),
            name: name.to_string(),
            arguments,
        })
    }

    /// Parse an Anthropic `tool_use` content block
    pub fn from_anthropic(block: &Value) -> Result<Self> {
        match block.get("type").and_then(Value::as_str) {
            Some("tool_use") => {}
            Some(other) => {
                return Err(invalid("type", format!("expected tool_use block, got '{}'", other)))
            }
            None => return Err(missing("type")),
        }

        let name = block
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("name"))?;

        let arguments = match block.get("input") {
            None | Some(Value::Null) => json!({}),
            Some(input @ Value::Object(_)) => input.clone(),
            Some(_) => return Err(invalid("input", "expected an object".to_string())),
        };

        Ok(Self {
            id: block.get("id").and_then(Value::as_str).map(String::from),
            name: name.to_string(),
            arguments,
        })
    }
}

/// Outcome of a [`FunctionCall`], ready to feed back into a conversation
#[derive(Debug, Clone, Serialize)]
pub struct FunctionCallResult {
    #[serde(skip)]
    pub call_id: Option<String>,
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl FunctionCallResult {
    pub fn from_tool_result(call_id: Option<String>, result: CallToolResult) -> Self {
        let text = result.text_content();
        if result.is_error {
            let message = text.strip_prefix("Error: ").unwrap_or(&text).to_string();
            Self {
                call_id,
                success: false,
                result: None,
                error: Some(message),
            }
        } else {
            Self {
                call_id,
                success: true,
                result: Some(text),
                error: None,
            }
        }
    }

    /// Text to hand back to the model
    pub fn content(&self) -> String {
        if self.success {
            self.result.clone().unwrap_or_default()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }

    /// OpenAI `role: tool` message
    pub fn to_openai_message(&self) -> Value {
        json!({
            "role": "tool",
            "tool_call_id": self.call_id,
            "content": self.content(),
        })
    }

    /// Anthropic `tool_result` content block
    pub fn to_anthropic_block(&self) -> Value {
        let mut block = json!({
            "type": "tool_result",
            "tool_use_id": self.call_id,
            "content": self.content(),
        });
        if !self.success {
            block["is_error"] = json!(true);
        }
        block
    }
}

fn missing(field: &str) -> crate::error::ToolkitError {
    ValidationError::MissingField {
        field: field.to_string(),
    }
    .into()
}

fn invalid(name: &str, message: String) -> crate::error::ToolkitError {
    ValidationError::InvalidParameter {
        name: name.to_string(),
        message,
    }
    .into()
}
