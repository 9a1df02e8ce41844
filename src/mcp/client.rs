//! MCP client over a child process's stdio
//!
//! Spawns a server, speaks newline-delimited JSON-RPC to it and matches
//! responses to requests by id. Requests are issued one at a time.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::{McpError, Result, ToolkitError};
use crate::mcp::types::*;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Default bound on waiting for a single response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the child gets to exit after stdin closes
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Parameters for connecting to an MCP server via stdio subprocess
#[derive(Debug, Clone)]
pub struct StdioConnectionParams {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl StdioConnectionParams {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Add a command-line argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// A connected MCP client
pub struct McpClient {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: i64,
    timeout: Duration,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Start the server process. Call [`McpClient::initialize`] next.
    pub fn spawn(params: &StdioConnectionParams) -> Result<Self> {
        info!(command = %params.command, args = ?params.args, "Spawning MCP server");

        let mut child = Command::new(&params.command)
            .args(&params.args)
            .envs(&params.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::TransportError {
                message: format!("failed to spawn `{}`: {}", params.command, e),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| transport("failed to open stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| transport("failed to open stdout"))?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            timeout: DEFAULT_RESPONSE_TIMEOUT,
            server_info: None,
        })
    }

    /// Spawn and initialize, retrying failures with backoff
    pub async fn connect_with_retry(params: &StdioConnectionParams, policy: &RetryPolicy) -> Result<Self> {
        retry_with_backoff(policy, move |attempt| async move {
            debug!(attempt, "Connecting to MCP server");
            let mut client = Self::spawn(params)?;
            client.initialize().await?;
            Ok::<_, ToolkitError>(client)
        })
        .await
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Server identity, once initialized
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Perform the MCP handshake
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: MCP_VERSION.to_string(),
            client_info: ClientInfo {
                name: "mcp-toolkit-client".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: json!({}),
        };

        let result: InitializeResult = self
            .request(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;
        self.notify(methods::INITIALIZED, None).await?;

        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            "Connected to MCP server"
        );
        self.server_info = Some(result.server_info.clone());
        Ok(result)
    }

    pub async fn list_tools(&mut self) -> Result<Vec<Tool>> {
        let result: ListToolsResult = self.request(methods::LIST_TOOLS, None).await?;
        Ok(result.tools)
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let params = json!({ "name": name, "arguments": arguments });
        self.request(methods::CALL_TOOL, Some(params)).await
    }

    pub async fn list_resources(&mut self) -> Result<Vec<Resource>> {
        let result: ListResourcesResult = self.request(methods::LIST_RESOURCES, None).await?;
        Ok(result.resources)
    }

    pub async fn read_resource(&mut self, uri: &str) -> Result<ReadResourceResult> {
        self.request(methods::READ_RESOURCE, Some(json!({ "uri": uri })))
            .await
    }

    pub async fn ping(&mut self) -> Result<()> {
        let _: Value = self.request(methods::PING, None).await?;
        Ok(())
    }

    /// Close stdin and wait for the server to exit, killing it after a grace period
    pub async fn shutdown(mut self) -> Result<ExitStatus> {
        drop(self.stdin.take());

        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!("MCP server did not exit in time, killing it");
                self.child.kill().await?;
                Ok(self.child.wait().await?)
            }
        }
    }

    async fn request<T: DeserializeOwned>(&mut self, method: &str, params: Option<Value>) -> Result<T> {
        let id = RequestId::Number(self.next_id);
        self.next_id += 1;

        self.send(&JsonRpcRequest::new(id.clone(), method, params)).await?;

        let response = tokio::time::timeout(self.timeout, self.read_response(&id))
            .await
            .map_err(|_| McpError::Timeout {
                method: method.to_string(),
            })??;

        if let Some(err) = response.error {
            return Err(McpError::ServerError {
                code: err.code,
                message: err.message,
            }
            .into());
        }

        let result = response.result.ok_or_else(|| McpError::ProtocolError {
            message: format!("response to {} has neither result nor error", method),
        })?;
        Ok(serde_json::from_value(result)?)
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        self.send(&JsonRpcRequest::notification(method, params)).await
    }

    async fn send(&mut self, message: &JsonRpcRequest) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| transport("connection already closed"))?;

        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        debug!(method = %message.method, "Sending");
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, id: &RequestId) -> Result<JsonRpcResponse> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| transport("server closed its output"))?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(&line) {
                Ok(response) if response.id.as_ref() == Some(id) => return Ok(response),
                Ok(response) => debug!(id = ?response.id, "Skipping unrelated response"),
                Err(e) => debug!(error = %e, "Skipping non-response line"),
            }
        }
    }
}

fn transport(message: &str) -> ToolkitError {
    McpError::TransportError {
        message: message.to_string(),
    }
    .into()
}
