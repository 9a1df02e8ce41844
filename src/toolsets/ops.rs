//! Operational tools: health, metrics, data processing and host status

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use sysinfo::System;
use validator::Validate;

use crate::config::ServerConfig;
use crate::error::{Result, ToolError};
use crate::mcp::tools::{parse_args, parse_validated_args, Tool, ToolRegistry};
use crate::mcp::types::CallToolResult;
use crate::metrics::MetricsCollector;
use crate::schema::generate_schema;
use crate::toolsets::basic::NoArgs;

/// Longest `data` accepted by `process_data`, in characters
pub const MAX_DATA_LEN: u64 = 10_000;

/// Preview length used by the `transform` operation
const PREVIEW_CHARS: usize = 100;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// State shared by the ops tools
#[derive(Debug, Clone)]
pub struct OpsContext {
    pub metrics: Arc<MetricsCollector>,
    pub version: String,
    pub metrics_enabled: bool,
}

pub fn register(registry: &mut ToolRegistry, config: &ServerConfig, metrics: Arc<MetricsCollector>) {
    let ctx = OpsContext {
        metrics,
        version: config.version.clone(),
        metrics_enabled: config.enable_metrics,
    };

    registry
        .register(HealthCheck(ctx.clone()))
        .register(GetMetrics(ctx))
        .register(ProcessData)
        .register(SystemInfo);
}

pub struct HealthCheck(pub OpsContext);

#[async_trait]
impl Tool for HealthCheck {
    fn name(&self) -> &'static str {
        "health_check"
    }

    fn description(&self) -> &'static str {
        "Check server health and status"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<NoArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let _: NoArgs = parse_args(args)?;
        let metrics = &self.0.metrics;

        let status = json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "uptime_seconds": metrics.uptime().as_secs_f64(),
            "version": self.0.version,
            "requests_processed": metrics.requests_total(),
            "success_rate": metrics.success_rate(),
        });

        Ok(CallToolResult::text(format!(
            "Health Check:\n{}",
            serde_json::to_string_pretty(&status)?
        )))
    }
}

pub struct GetMetrics(pub OpsContext);

#[derive(Debug, Deserialize, JsonSchema)]
struct GetMetricsArgs {
    /// Include per-tool counts and success/failure totals
    #[serde(default)]
    detailed: bool,
}

#[async_trait]
impl Tool for GetMetrics {
    fn name(&self) -> &'static str {
        "get_metrics"
    }

    fn description(&self) -> &'static str {
        "Get server performance metrics"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<GetMetricsArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: GetMetricsArgs = parse_args(args)?;
        if !self.0.metrics_enabled {
            return Ok(CallToolResult::text("Metrics collection is disabled"));
        }

        let snapshot = self.0.metrics.snapshot();
        let body = if args.detailed {
            serde_json::to_value(&snapshot)?
        } else {
            snapshot.summary()
        };

        Ok(CallToolResult::text(format!(
            "Server Metrics:\n{}",
            serde_json::to_string_pretty(&body)?
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataOperation {
    Analyze,
    Transform,
    Validate,
}

pub struct ProcessData;

#[derive(Debug, Deserialize, Validate, JsonSchema)]
struct ProcessDataArgs {
    /// Data to process
    #[validate(length(min = 1, max = 10000))]
    data: String,
    /// Operation to perform
    operation: DataOperation,
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Run one `process_data` operation
pub fn process(data: &str, operation: DataOperation) -> Value {
    match operation {
        DataOperation::Analyze => json!({
            "operation": "analyze",
            "data_length": data.chars().count(),
            "word_count": data.split_whitespace().count(),
            "contains_numbers": data.chars().any(char::is_numeric),
            "contains_uppercase": data.chars().any(char::is_uppercase),
        }),
        DataOperation::Transform => {
            let upper = data.to_uppercase();
            let length_change = upper.chars().count() as i64 - data.chars().count() as i64;
            json!({
                "operation": "transform",
                "original": preview(data),
                "transformed": preview(&upper),
                "length_change": length_change,
            })
        }
        DataOperation::Validate => {
            let is_valid = !data.trim().is_empty();
            let errors: Vec<&str> = if is_valid {
                Vec::new()
            } else {
                vec!["Empty or whitespace-only data"]
            };
            json!({
                "operation": "validate",
                "is_valid": is_valid,
                "validation_errors": errors,
                "data_type": "string",
                "encoding": "utf-8",
            })
        }
    }
}

#[async_trait]
impl Tool for ProcessData {
    fn name(&self) -> &'static str {
        "process_data"
    }

    fn description(&self) -> &'static str {
        "Process data with validation and error handling"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<ProcessDataArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: ProcessDataArgs = parse_validated_args(args)?;
        let result = process(&args.data, args.operation);

        Ok(CallToolResult::text(format!(
            "Data Processing Result:\n{}",
            serde_json::to_string_pretty(&result)?
        )))
    }
}

pub struct SystemInfo;

fn collect_system_info() -> Value {
    let sys = System::new_all();
    let current_directory = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let round2 = |v: f64| (v * 100.0).round() / 100.0;

    json!({
        "os_name": System::name(),
        "os_version": System::os_version(),
        "kernel_version": System::kernel_version(),
        "host_name": System::host_name(),
        "architecture": std::env::consts::ARCH,
        "cpu_count": sys.cpus().len(),
        "memory_total_gb": round2(sys.total_memory() as f64 / BYTES_PER_GB),
        "memory_available_gb": round2(sys.available_memory() as f64 / BYTES_PER_GB),
        "process_id": std::process::id(),
        "current_directory": current_directory,
    })
}

#[async_trait]
impl Tool for SystemInfo {
    fn name(&self) -> &'static str {
        "system_info"
    }

    fn description(&self) -> &'static str {
        "Get system information and status"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<NoArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let _: NoArgs = parse_args(args)?;

        let info = tokio::task::spawn_blocking(collect_system_info)
            .await
            .map_err(|e| ToolError::Failed {
                message: format!("system probe failed: {}", e),
            })?;

        Ok(CallToolResult::text(format!(
            "System Information:\n{}",
            serde_json::to_string_pretty(&info)?
        )))
    }
}
