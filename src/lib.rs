//! MCP Toolkit Library
//!
//! A Model Context Protocol (MCP) server and client with a function-calling
//! bridge. Tools are grouped into toolsets (basic, functions, files, ops)
//! and can be exported as MCP, OpenAI or Anthropic tool definitions.

pub mod config;
pub mod error;
pub mod mcp;
pub mod metrics;
pub mod rate_limit;
pub mod retry;
pub mod schema;
pub mod toolsets;

pub use config::ServerConfig;
pub use error::{Result, ToolkitError};
