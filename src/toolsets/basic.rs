//! Basic tools: echo, calculator and host information

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, ToolError};
use crate::mcp::tools::{parse_args, Tool, ToolRegistry};
use crate::mcp::types::CallToolResult;
use crate::schema::generate_schema;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(Echo).register(Calculate).register(GetSystemInfo);
}

/// Arguments for tools that take none
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

pub struct Echo;

#[derive(Debug, Deserialize, JsonSchema)]
struct EchoArgs {
    /// Message to echo back
    message: String,
}

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "Echo back the input message"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<EchoArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: EchoArgs = parse_args(args)?;
        Ok(CallToolResult::text(format!("Echo: {}", args.message)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    pub fn apply(&self, a: f64, b: f64) -> std::result::Result<f64, ToolError> {
        match self {
            Operation::Add => Ok(a + b),
            Operation::Subtract => Ok(a - b),
            Operation::Multiply => Ok(a * b),
            Operation::Divide if b == 0.0 => Err(ToolError::DivisionByZero),
            Operation::Divide => Ok(a / b),
        }
    }
}

pub struct Calculate;

#[derive(Debug, Deserialize, JsonSchema)]
struct CalculateArgs {
    /// Mathematical operation to perform
    operation: Operation,
    /// First number
    a: f64,
    /// Second number
    b: f64,
}

#[async_trait]
impl Tool for Calculate {
    fn name(&self) -> &'static str {
        "calculate"
    }

    fn description(&self) -> &'static str {
        "Perform basic mathematical calculations"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<CalculateArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: CalculateArgs = parse_args(args)?;
        let result = args.operation.apply(args.a, args.b)?;
        Ok(CallToolResult::text(format!(
            "Result: {} {} {} = {}",
            args.a,
            args.operation.as_str(),
            args.b,
            result
        )))
    }
}

pub struct GetSystemInfo;

#[async_trait]
impl Tool for GetSystemInfo {
    fn name(&self) -> &'static str {
        "get_system_info"
    }

    fn description(&self) -> &'static str {
        "Get basic system information"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<NoArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let _: NoArgs = parse_args(args)?;

        let current_directory = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let info = json!({
            "os": std::env::consts::OS,
            "family": std::env::consts::FAMILY,
            "architecture": std::env::consts::ARCH,
            "server_version": env!("CARGO_PKG_VERSION"),
            "current_directory": current_directory,
        });

        Ok(CallToolResult::text(format!(
            "System Information:\n{}",
            serde_json::to_string_pretty(&info)?
        )))
    }
}
