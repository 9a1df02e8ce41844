//! MCP (Model Context Protocol) module
//!
//! Wire types, the tool registry, the stdio server and a matching client.

pub mod client;
pub mod server;
pub mod tools;
pub mod types;
