//! Integration tests for the MCP toolkit
//!
//! Protocol tests drive a real server over in-memory pipes. Client tests
//! spawn the compiled binary and talk to it over stdio.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use mcp_toolkit::config::ServerConfig;
use mcp_toolkit::mcp::server::McpServer;
use mcp_toolkit::metrics::MetricsCollector;
use mcp_toolkit::toolsets::{build_registry, Toolset};

/// Helper to create a JSON-RPC request
fn make_request(id: i64, method: &str, params: Option<Value>) -> Value {
    let mut request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(p) = params {
        request["params"] = p;
    }
    request
}

fn tool_call(id: i64, name: &str, arguments: Value) -> Value {
    make_request(id, "tools/call", Some(json!({"name": name, "arguments": arguments})))
}

/// Text of a `tools/call` response
fn result_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"]
        .as_str()
        .expect("tool result should carry text")
}

fn is_error(response: &Value) -> bool {
    response["result"]["isError"].as_bool().unwrap_or(false)
}

/// A server running over in-memory pipes
struct Session {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<mcp_toolkit::Result<()>>,
}

impl Session {
    fn start(config: ServerConfig) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        let registry = build_registry(&config, metrics.clone()).expect("registry should build");
        let server = Arc::new(McpServer::new(config, registry, metrics));

        let (input, server_in) = tokio::io::duplex(1 << 16);
        let (server_out, output) = tokio::io::duplex(1 << 16);
        let (stop, stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(server.serve(server_in, server_out, async move {
            let _ = stopped.await;
        }));

        Self {
            input,
            output: BufReader::new(output).lines(),
            stop: Some(stop),
            task,
        }
    }

    async fn send(&mut self, message: &Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.input.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Option<Value> {
        let line = tokio::time::timeout(Duration::from_secs(5), self.output.next_line())
            .await
            .expect("server should answer in time")
            .unwrap()?;
        Some(serde_json::from_str(&line).expect("response should be JSON"))
    }

    async fn request(&mut self, message: Value) -> Value {
        self.send(&message).await;
        self.recv().await.expect("server closed the stream")
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Close input and wait for the server to finish
    async fn finish(self) {
        drop(self.input);
        self.task.await.unwrap().unwrap();
    }
}

fn config_with(toolsets: &[Toolset]) -> ServerConfig {
    ServerConfig {
        toolsets: toolsets.to_vec(),
        ..ServerConfig::default()
    }
}

mod mcp_protocol_tests {
    use super::*;

    #[tokio::test]
    async fn test_handshake_and_tool_listing() {
        let mut session = Session::start(ServerConfig::default());

        let response = session
            .request(make_request(
                1,
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "clientInfo": {"name": "test-client", "version": "1.0.0"},
                    "capabilities": {}
                })),
            ))
            .await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], "mcp-toolkit");

        session
            .send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;

        let response = session.request(make_request(2, "tools/list", None)).await;
        assert_eq!(response["id"], 2);
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 16);
        for tool in tools {
            assert!(tool["name"].is_string());
            assert!(tool["description"].is_string());
            assert_eq!(tool["inputSchema"]["type"], "object");
        }

        session.finish().await;
    }

    #[tokio::test]
    async fn test_malformed_lines_get_errors() {
        let mut session = Session::start(config_with(&[Toolset::Basic]));

        session.input.write_all(b"this is not json\n").await.unwrap();
        let response = session.recv().await.unwrap();
        assert_eq!(response["error"]["code"], -32700);
        assert!(response["id"].is_null());

        let response = session.request(make_request(7, "prompts/list", None)).await;
        assert_eq!(response["id"], 7);
        assert_eq!(response["error"]["code"], -32601);

        let response = session.request(make_request(8, "ping", None)).await;
        assert_eq!(response["result"], json!({}));

        session.finish().await;
    }

    #[tokio::test]
    async fn test_tool_errors_are_results() {
        let mut session = Session::start(config_with(&[Toolset::Basic]));

        let response = session
            .request(tool_call(1, "calculate", json!({"operation": "multiply", "a": 6, "b": 7})))
            .await;
        assert!(!is_error(&response));
        assert_eq!(result_text(&response), "Result: 6 multiply 7 = 42");

        let response = session
            .request(tool_call(2, "calculate", json!({"operation": "divide", "a": 1, "b": 0})))
            .await;
        assert!(is_error(&response));
        assert_eq!(result_text(&response), "Error: Division by zero");

        let response = session.request(tool_call(3, "get_metrics", json!({}))).await;
        assert!(is_error(&response));
        assert_eq!(result_text(&response), "Error: Unknown tool: get_metrics");

        session.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tools_do_not_block_others() {
        let mut session = Session::start(ServerConfig {
            toolsets: vec![Toolset::Basic, Toolset::Functions],
            simulated_latency: Duration::from_secs(1),
            ..ServerConfig::default()
        });

        session
            .send(&tool_call(1, "get_weather", json!({"city": "London"})))
            .await;
        session
            .send(&tool_call(2, "echo", json!({"message": "fast"})))
            .await;

        let first = session.recv().await.unwrap();
        let second = session.recv().await.unwrap();
        assert_eq!(first["id"], 2);
        assert_eq!(second["id"], 1);
        assert!(result_text(&second).contains("\"city\": \"London\""));

        session.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_in_flight_requests() {
        let mut session = Session::start(ServerConfig {
            toolsets: vec![Toolset::Functions],
            simulated_latency: Duration::from_secs(1),
            ..ServerConfig::default()
        });

        session
            .send(&tool_call(
                1,
                "search_database",
                json!({"query": "rust", "table": "articles", "limit": 2}),
            ))
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.shutdown();

        let response = session.recv().await.unwrap();
        assert_eq!(response["id"], 1);
        assert!(!is_error(&response));
        assert!(session.recv().await.is_none());

        session.finish().await;
    }

    #[tokio::test]
    async fn test_metrics_resource_tracks_calls() {
        let mut session = Session::start(config_with(&[Toolset::Basic, Toolset::Ops]));

        session
            .request(tool_call(1, "echo", json!({"message": "one"})))
            .await;
        session
            .request(tool_call(2, "echo", json!({"message": "two"})))
            .await;

        let response = session
            .request(make_request(
                3,
                "resources/read",
                Some(json!({"uri": "toolkit://metrics"})),
            ))
            .await;
        let text = response["result"]["contents"][0]["text"].as_str().unwrap();
        let metrics: Value = serde_json::from_str(text).unwrap();
        assert_eq!(metrics["requests_total"], 2);
        assert_eq!(metrics["tools_executed"]["echo"], 2);
        assert_eq!(metrics["success_rate"], 100.0);

        let response = session.request(tool_call(4, "health_check", json!({}))).await;
        assert!(result_text(&response).starts_with("Health Check:\n"));

        session.finish().await;
    }
}

mod file_tool_tests {
    use super::*;

    #[tokio::test]
    async fn test_file_round_trip_inside_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::start(ServerConfig {
            toolsets: vec![Toolset::Files],
            allowed_directories: vec![dir.path().to_path_buf()],
            ..ServerConfig::default()
        });
        let path = dir.path().join("notes/today.txt").display().to_string();

        let response = session
            .request(tool_call(
                1,
                "create_directory",
                json!({"directory": dir.path().join("notes").display().to_string()}),
            ))
            .await;
        assert!(!is_error(&response), "{}", response);

        let response = session
            .request(tool_call(2, "write_file", json!({"filepath": path, "content": "hello"})))
            .await;
        assert!(result_text(&response).starts_with("Written to"));

        let response = session
            .request(tool_call(3, "read_file", json!({"filepath": path})))
            .await;
        assert_eq!(result_text(&response), format!("Content of {}:\n\nhello", path));

        let response = session
            .request(tool_call(
                4,
                "search_files",
                json!({"pattern": "**/*.txt", "directory": dir.path().display().to_string()}),
            ))
            .await;
        assert!(result_text(&response).contains("today.txt"));

        session.finish().await;
    }

    #[tokio::test]
    async fn test_paths_outside_sandbox_are_denied() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::start(ServerConfig {
            toolsets: vec![Toolset::Files],
            allowed_directories: vec![dir.path().to_path_buf()],
            ..ServerConfig::default()
        });

        let escape = dir.path().join("../outside.txt").display().to_string();
        let response = session
            .request(tool_call(1, "write_file", json!({"filepath": escape, "content": "x"})))
            .await;
        assert!(is_error(&response));
        assert!(result_text(&response).starts_with("Error: Access denied to"));

        session.finish().await;
    }
}

mod function_calling_tests {
    use mcp_toolkit::schema::{format_tools, FunctionCall, SchemaFormat};

    use super::*;

    fn registry() -> mcp_toolkit::mcp::tools::ToolRegistry {
        let config = config_with(&[Toolset::Basic, Toolset::Functions]);
        build_registry(&config, Arc::new(MetricsCollector::new())).unwrap()
    }

    #[tokio::test]
    async fn test_openai_round_trip() {
        let registry = registry();
        let call = FunctionCall::from_openai(&json!({
            "id": "call_abc",
            "type": "function",
            "function": {
                "name": "calculate_age",
                "arguments": "{\"birth_year\": 1990, \"current_year\": 2025}"
            }
        }))
        .unwrap();

        let result = registry.execute(call).await;
        assert!(result.success);

        let message = result.to_openai_message();
        assert_eq!(message["role"], "tool");
        assert_eq!(message["tool_call_id"], "call_abc");
        assert_eq!(message["content"], "{\"age\":35}");
    }

    #[tokio::test]
    async fn test_anthropic_error_result() {
        let registry = registry();
        let call = FunctionCall::from_anthropic(&json!({
            "type": "tool_use",
            "id": "toolu_01",
            "name": "calculate_age",
            "input": {"birth_year": 2999, "current_year": 2025}
        }))
        .unwrap();

        let result = registry.execute(call).await;
        assert!(!result.success);
        let block = result.to_anthropic_block();
        assert_eq!(block["tool_use_id"], "toolu_01");
        assert_eq!(block["is_error"], true);
        assert_eq!(block["content"], "Error: Birth year cannot be in the future");
    }

    #[test]
    fn test_exported_definitions() {
        let tools = registry().list_tools();

        let openai = format_tools(&tools, SchemaFormat::OpenAi);
        let weather = openai
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["function"]["name"] == "get_weather")
            .unwrap();
        assert_eq!(weather["type"], "function");
        assert_eq!(
            weather["function"]["parameters"]["properties"]["units"]["enum"],
            json!(["celsius", "fahrenheit"])
        );

        let anthropic = format_tools(&tools, SchemaFormat::Anthropic);
        assert!(anthropic
            .as_array()
            .unwrap()
            .iter()
            .all(|t| t["input_schema"]["type"] == "object"));
    }
}

mod client_tests {
    use mcp_toolkit::mcp::client::{McpClient, StdioConnectionParams};
    use mcp_toolkit::retry::RetryPolicy;

    use super::*;

    fn server_params(dir: &std::path::Path) -> StdioConnectionParams {
        StdioConnectionParams::new(env!("CARGO_BIN_EXE_mcp-toolkit"))
            .args(["serve", "--toolsets", "basic,files,ops"])
            .env("MCP_TOOLKIT_ALLOWED_DIRS", dir.display().to_string())
            .env("RUST_LOG", "warn")
    }

    #[tokio::test]
    async fn test_client_against_binary() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = McpClient::spawn(&server_params(dir.path())).unwrap();

        let init = client.initialize().await.unwrap();
        assert_eq!(init.server_info.name, "mcp-toolkit");
        client.ping().await.unwrap();

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 13);

        let result = client
            .call_tool("echo", json!({"message": "over stdio"}))
            .await
            .unwrap();
        assert_eq!(result.text_content(), "Echo: over stdio");

        let outside = std::env::temp_dir().join("mcp-toolkit-never-allowed.txt");
        let result = client
            .call_tool("read_file", json!({"filepath": outside.display().to_string()}))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text_content().starts_with("Error: Access denied to"));

        let resources = client.list_resources().await.unwrap();
        assert_eq!(resources.len(), 3);
        let read = client.read_resource("toolkit://tools").await.unwrap();
        assert!(read.contents[0].text.as_deref().unwrap().contains("\"echo\""));

        let err = client.read_resource("toolkit://missing").await.unwrap_err();
        assert!(err.to_string().contains("Resource not found"));

        let status = client.shutdown().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_connect_with_retry() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RetryPolicy::new(1, Duration::from_millis(10), Duration::from_millis(50));

        let client = McpClient::connect_with_retry(&server_params(dir.path()), &policy)
            .await
            .unwrap();
        assert_eq!(client.server_info().unwrap().name, "mcp-toolkit");
        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_configuration_fails_to_connect() {
        let params = StdioConnectionParams::new(env!("CARGO_BIN_EXE_mcp-toolkit"))
            .args(["serve", "--toolsets", "nonexistent"])
            .env("RUST_LOG", "off");
        let policy = RetryPolicy::new(0, Duration::from_millis(10), Duration::from_millis(10));

        assert!(McpClient::connect_with_retry(&params, &policy).await.is_err());
    }
}
