//! MCP Toolkit - command line entry point
//!
//! Runs the MCP server on stdio, prints tool schemas for model APIs, or
//! drives another MCP server as a demo client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mcp_toolkit::config::ServerConfig;
use mcp_toolkit::mcp::client::{McpClient, StdioConnectionParams};
use mcp_toolkit::mcp::server::{McpServer, METRICS_URI};
use mcp_toolkit::metrics::MetricsCollector;
use mcp_toolkit::retry::RetryPolicy;
use mcp_toolkit::schema::{format_tools, SchemaFormat};
use mcp_toolkit::toolsets::{build_registry, Toolset};

/// Time blocking tasks (the stdin reader) get to finish after serving stops
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// MCP Toolkit
#[derive(Parser)]
#[command(name = "mcp-toolkit")]
#[command(author, version, about = "MCP Toolkit - a Model Context Protocol server with function-calling tools")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (the default)
    Serve(ServeArgs),

    /// Print the enabled tools as model API tool definitions
    Schemas {
        /// Output dialect: mcp, openai or anthropic
        #[arg(long, default_value = "mcp")]
        format: SchemaFormat,

        /// Comma-separated toolsets to include
        #[arg(long, value_name = "LIST")]
        toolsets: Option<String>,
    },

    /// Connect to an MCP server over stdio and exercise its tools
    Client {
        /// Connection attempts after the first failure
        #[arg(long, default_value_t = 3)]
        retries: u32,

        /// Server command and its arguments
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Directory the file tools may access (repeatable)
    #[arg(long = "allow-dir", value_name = "DIR")]
    allow_dirs: Vec<PathBuf>,

    /// Comma-separated toolsets to enable (basic, functions, files, ops or all)
    #[arg(long, value_name = "LIST")]
    toolsets: Option<String>,

    /// Tool calls allowed per minute (0 disables limiting)
    #[arg(long, value_name = "N")]
    rate_limit: Option<u32>,

    /// Tool execution timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

impl ServeArgs {
    /// Overlay command line flags on the environment configuration
    fn apply(self, config: &mut ServerConfig) -> mcp_toolkit::Result<()> {
        if !self.allow_dirs.is_empty() {
            config.allowed_directories = self.allow_dirs;
        }
        if let Some(raw) = self.toolsets {
            config.toolsets = Toolset::parse_list(&raw)?;
        }
        if let Some(limit) = self.rate_limit {
            config.rate_limit_requests = limit;
        }
        if let Some(secs) = self.timeout {
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = ServerConfig::from_env().context("failed to load configuration")?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let outcome = runtime.block_on(run(cli, config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    outcome
}

async fn run(cli: Cli, mut config: ServerConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve(args)) => run_server(config, args).await,
        None => run_server(config, cli.serve).await,
        Some(Commands::Schemas { format, toolsets }) => {
            if let Some(raw) = toolsets {
                config.toolsets = Toolset::parse_list(&raw)?;
            }
            print_schemas(&config, format)
        }
        Some(Commands::Client { retries, command }) => run_client(command, retries).await,
    }
}

async fn run_server(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    args.apply(&mut config)?;

    let metrics = Arc::new(MetricsCollector::new());
    let registry = build_registry(&config, metrics.clone()).context("failed to build tool registry")?;

    let server = Arc::new(McpServer::new(config, registry, metrics));
    server.run_stdio().await?;

    Ok(())
}

fn print_schemas(config: &ServerConfig, format: SchemaFormat) -> anyhow::Result<()> {
    let registry = build_registry(config, Arc::new(MetricsCollector::new()))?;
    let tools = format_tools(&registry.list_tools(), format);
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}

async fn run_client(command: Vec<String>, retries: u32) -> anyhow::Result<()> {
    let (program, args) = command.split_first().context("missing server command")?;
    let params = StdioConnectionParams::new(program.as_str()).args(args.iter().cloned());
    let policy = RetryPolicy {
        max_retries: retries,
        ..RetryPolicy::default()
    };

    let mut client = McpClient::connect_with_retry(&params, &policy)
        .await
        .with_context(|| format!("could not connect to `{}`", program))?;
    client.ping().await?;

    if let Some(info) = client.server_info() {
        println!("Connected to {} {}", info.name, info.version);
    }

    let tools = client.list_tools().await?;
    println!("\nAvailable tools ({}):", tools.len());
    for tool in &tools {
        println!("  - {}: {}", tool.name, tool.description.as_deref().unwrap_or(""));
    }

    for (name, arguments) in demo_calls() {
        if !tools.iter().any(|t| t.name == name) {
            continue;
        }
        println!("\n> {} {}", name, arguments);
        match client.call_tool(name, arguments).await {
            Ok(result) if result.is_error => println!("{} (error)", result.text_content()),
            Ok(result) => println!("{}", result.text_content()),
            Err(e) => println!("call failed: {}", e),
        }
    }

    let resources = client.list_resources().await?;
    println!("\nResources ({}):", resources.len());
    for resource in &resources {
        println!("  - {} ({})", resource.uri, resource.name);
    }
    if resources.iter().any(|r| r.uri == METRICS_URI) {
        let read = client.read_resource(METRICS_URI).await?;
        for content in read.contents {
            println!("\n{}:\n{}", content.uri, content.text.unwrap_or_default());
        }
    }

    let status = client.shutdown().await?;
    debug!(?status, "Server exited");
    Ok(())
}

/// Example arguments for the built-in tools, in demo order
fn demo_calls() -> Vec<(&'static str, Value)> {
    let scratch = std::env::temp_dir().join("mcp-toolkit-demo");
    let note = scratch.join("note.txt");
    let scratch = scratch.display().to_string();
    let note = note.display().to_string();

    vec![
        ("echo", json!({"message": "Hello from MCP client!"})),
        ("calculate", json!({"operation": "add", "a": 15, "b": 27})),
        ("calculate", json!({"operation": "divide", "a": 1, "b": 0})),
        ("get_system_info", json!({})),
        ("calculate_age", json!({"birth_year": 1990})),
        ("get_weather", json!({"city": "London", "units": "celsius"})),
        ("search_database", json!({"query": "python tutorials", "table": "articles", "limit": 3})),
        ("create_directory", json!({"directory": scratch})),
        ("write_file", json!({"filepath": note, "content": "Written by the MCP demo client\n"})),
        ("read_file", json!({"filepath": note})),
        ("get_file_info", json!({"filepath": note})),
        ("list_directory", json!({"directory": scratch})),
        ("search_files", json!({"pattern": "*.txt", "directory": scratch})),
        ("health_check", json!({})),
        ("process_data", json!({"data": "Hello World 42", "operation": "analyze"})),
        ("system_info", json!({})),
        ("get_metrics", json!({"detailed": true})),
    ]
}
