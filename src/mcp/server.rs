//! MCP Server implementation
//!
//! Serves newline-delimited JSON-RPC over any async reader/writer pair.
//! Each request runs in its own task; responses are funneled through a
//! single writer task so lines never interleave.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{McpError, Result, ToolkitError};
use crate::mcp::tools::ToolRegistry;
use crate::mcp::types::*;
use crate::metrics::MetricsCollector;
use crate::rate_limit::RateLimiter;

/// Responses buffered between request tasks and the writer
const RESPONSE_QUEUE: usize = 64;

pub const METRICS_URI: &str = "toolkit://metrics";
pub const CONFIG_URI: &str = "toolkit://config";
pub const TOOLS_URI: &str = "toolkit://tools";

/// MCP server over a tool registry
pub struct McpServer {
    config: ServerConfig,
    registry: ToolRegistry,
    metrics: Arc<MetricsCollector>,
    rate_limiter: RateLimiter,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(config: ServerConfig, registry: ToolRegistry, metrics: Arc<MetricsCollector>) -> Self {
        let rate_limiter = RateLimiter::per_minute(config.rate_limit_requests);

        Self {
            config,
            registry,
            metrics,
            rate_limiter,
            initialized: false.into(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Whether the client has sent `notifications/initialized`
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Run the server on stdio until EOF, Ctrl-C or SIGTERM
    pub async fn run_stdio(self: Arc<Self>) -> Result<()> {
        info!(
            name = %self.config.name,
            version = %self.config.version,
            tools = self.registry.len(),
            "Starting MCP server on stdio"
        );
        self.serve(tokio::io::stdin(), tokio::io::stdout(), shutdown_signal())
            .await
    }

    /// Serve requests read from `reader`, writing responses to `writer`.
    ///
    /// Returns once input ends or `shutdown` resolves, after every request
    /// already read has been answered.
    pub async fn serve<R, W, S>(self: Arc<Self>, reader: R, writer: W, shutdown: S) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_QUEUE);

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = rx.recv().await {
                let mut line = serde_json::to_string(&response)?;
                line.push('\n');
                writer.write_all(line.as_bytes()).await?;
                writer.flush().await?;
            }
            Ok::<_, ToolkitError>(())
        });

        let mut lines = BufReader::new(reader).lines();
        let mut in_flight = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let server = Arc::clone(&self);
                        let tx = tx.clone();
                        in_flight.spawn(async move {
                            if let Some(response) = server.answer(line).await {
                                if tx.send(response).await.is_err() {
                                    warn!("Response writer closed, dropping response");
                                }
                            }
                        });
                    }
                    Ok(None) => {
                        debug!("Input closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read request");
                        break;
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Request task failed");
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!(pending = in_flight.len(), "Draining in-flight requests");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Request task failed");
            }
        }

        drop(tx);
        let written = writer_task.await.map_err(|e| McpError::TransportError {
            message: format!("response writer panicked: {}", e),
        })?;

        let snapshot = self.metrics.snapshot();
        info!(
            requests_total = snapshot.requests_total,
            success_rate = snapshot.success_rate,
            average_response_time_ms = snapshot.average_response_time_ms,
            uptime_seconds = snapshot.uptime_seconds,
            "Server stopped"
        );

        written
    }

    /// Run `handle_message` in its own task. A handler that panics still
    /// answers the request with an internal error.
    async fn answer(self: Arc<Self>, line: String) -> Option<JsonRpcResponse> {
        let line: Arc<str> = line.into();
        let message = Arc::clone(&line);
        let handler = tokio::spawn(async move { self.handle_message(&message).await });

        match handler.await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Request handler failed");
                let id = serde_json::from_str::<Value>(&line)
                    .ok()
                    .and_then(|raw| request_id(&raw))?;
                Some(JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::internal_error("Internal error"),
                ))
            }
        }
    }

    /// Handle one incoming JSON-RPC line. Notifications yield `None`.
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        if message.len() > self.config.max_request_size {
            warn!(
                size = message.len(),
                limit = self.config.max_request_size,
                "Rejecting oversize request"
            );
            return Some(JsonRpcResponse::error(
                None,
                JsonRpcError::invalid_request(format!(
                    "Request exceeds maximum size of {} bytes",
                    self.config.max_request_size
                )),
            ));
        }

        let raw: Value = match serde_json::from_str(message) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Unparseable message");
                return Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(format!("Parse error: {}", e)),
                ));
            }
        };

        let request: JsonRpcRequest = match serde_json::from_value(raw.clone()) {
            Ok(req) => req,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    request_id(&raw),
                    JsonRpcError::invalid_request(format!("Invalid request: {}", e)),
                ));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported JSON-RPC version: {}",
                    request.jsonrpc
                )),
            ));
        }

        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }

        debug!(method = %request.method, id = ?request.id, "Handling request");
        let response = match self.dispatch(&request).await {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(err) => JsonRpcResponse::error(request.id, err),
        };
        Some(response)
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            methods::INITIALIZED => {
                self.initialized.store(true, Ordering::Release);
                info!("Client initialized");
            }
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    async fn dispatch(&self, request: &JsonRpcRequest) -> std::result::Result<Value, JsonRpcError> {
        let params = request.params.clone();

        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(params),
            methods::PING => Ok(json!({})),
            methods::LIST_TOOLS => to_result(&ListToolsResult {
                tools: self.registry.list_tools(),
            }),
            methods::CALL_TOOL => self.handle_call_tool(params).await,
            methods::LIST_RESOURCES => to_result(&ListResourcesResult {
                resources: resources(),
            }),
            methods::READ_RESOURCE => self.handle_read_resource(params),
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(init)) => info!(
                client = %init.client_info.name,
                client_version = %init.client_info.version,
                protocol_version = %init.protocol_version,
                "Initialize"
            ),
            Some(Err(e)) => debug!(error = %e, "Initialize without well-formed params"),
            None => debug!("Initialize without params"),
        }

        to_result(&InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                resources: Some(ResourcesCapability::default()),
            },
        })
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = parse_params(params)?;
        let started = Instant::now();

        let result = if !self.rate_limiter.try_acquire() {
            warn!(tool = %params.name, "Rate limit exceeded");
            CallToolResult::error(format!(
                "Rate limit exceeded: at most {} tool calls per {}s",
                self.rate_limiter.max_requests(),
                self.rate_limiter.window().as_secs()
            ))
        } else {
            let timeout = self.config.request_timeout;
            let call = self.registry.call_tool(&params.name, params.arguments);
            match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => {
                    error!(tool = %params.name, timeout_secs = timeout.as_secs_f64(), "Tool timed out");
                    CallToolResult::error(format!(
                        "Tool {} timed out after {}s",
                        params.name,
                        timeout.as_secs_f64()
                    ))
                }
            }
        };

        let elapsed = started.elapsed();
        info!(
            tool = %params.name,
            is_error = result.is_error,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Tool call finished"
        );

        if self.config.enable_metrics {
            let tool_name = self
                .registry
                .contains(&params.name)
                .then_some(params.name.as_str());
            self.metrics.record_request(!result.is_error, elapsed, tool_name);
        }

        to_result(&result)
    }

    fn handle_read_resource(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: ReadResourceParams = parse_params(params)?;

        let body = match params.uri.as_str() {
            METRICS_URI => to_result(&self.metrics.snapshot())?,
            CONFIG_URI => self.config_summary(),
            TOOLS_URI => to_result(&self.registry.list_tools())?,
            _ => {
                return Err(JsonRpcError::invalid_params(format!(
                    "Resource not found: {}",
                    params.uri
                )))
            }
        };

        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;

        to_result(&ReadResourceResult {
            contents: vec![ResourceContent {
                uri: params.uri,
                text: Some(text),
                blob: None,
                mime_type: Some("application/json".to_string()),
            }],
        })
    }

    fn config_summary(&self) -> Value {
        let c = &self.config;
        json!({
            "name": c.name,
            "version": c.version,
            "max_request_size": c.max_request_size,
            "request_timeout_secs": c.request_timeout.as_secs_f64(),
            "rate_limit_requests": c.rate_limit_requests,
            "enable_metrics": c.enable_metrics,
            "allowed_directories": c
                .allowed_directories
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>(),
            "toolsets": c.toolsets.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        })
    }
}

/// Resources exposed by every server
pub fn resources() -> Vec<Resource> {
    let resource = |uri: &str, name: &str, description: &str| Resource {
        uri: uri.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        mime_type: Some("application/json".to_string()),
    };

    vec![
        resource(METRICS_URI, "Server metrics", "Request counters and response times"),
        resource(CONFIG_URI, "Server configuration", "Effective server configuration"),
        resource(TOOLS_URI, "Tool catalog", "Definitions of the registered tools"),
    ]
}

/// The `id` of a raw message, when it has a usable one
fn request_id(raw: &Value) -> Option<RequestId> {
    raw.get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok())
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
) -> std::result::Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_result<T: Serialize>(value: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
