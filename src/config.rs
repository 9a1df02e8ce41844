//! Configuration management for the MCP toolkit
//!
//! Handles environment variables, default paths, and limits. CLI flags are
//! applied on top of the values loaded here.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::toolsets::Toolset;

/// Environment variable names
pub mod env {
    pub const NAME: &str = "MCP_TOOLKIT_NAME";
    pub const LOG_LEVEL: &str = "MCP_TOOLKIT_LOG_LEVEL";
    pub const MAX_REQUEST_SIZE: &str = "MCP_TOOLKIT_MAX_REQUEST_SIZE";
    pub const REQUEST_TIMEOUT: &str = "MCP_TOOLKIT_REQUEST_TIMEOUT";
    pub const RATE_LIMIT: &str = "MCP_TOOLKIT_RATE_LIMIT";
    pub const METRICS: &str = "MCP_TOOLKIT_METRICS";
    pub const ALLOWED_DIRS: &str = "MCP_TOOLKIT_ALLOWED_DIRS";
    pub const TOOLSETS: &str = "MCP_TOOLKIT_TOOLSETS";
    pub const SIMULATED_LATENCY_MS: &str = "MCP_TOOLKIT_SIMULATED_LATENCY_MS";
}

/// Default server name reported during `initialize`
pub const DEFAULT_SERVER_NAME: &str = "mcp-toolkit";

/// 1 MiB
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Tool calls admitted per rolling minute
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Configuration for the MCP toolkit server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name reported to clients
    pub name: String,

    /// Server version reported to clients
    pub version: String,

    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Maximum size in bytes of a single JSON-RPC line
    pub max_request_size: usize,

    /// Upper bound on a single tool execution
    pub request_timeout: Duration,

    /// Tool calls admitted per minute (0 disables limiting)
    pub rate_limit_requests: u32,

    /// Whether request metrics are collected
    pub enable_metrics: bool,

    /// Roots the file tools may touch
    pub allowed_directories: Vec<PathBuf>,

    /// Enabled toolsets, in registration order
    pub toolsets: Vec<Toolset>,

    /// Artificial delay applied by the mocked network tools
    pub simulated_latency: Duration,
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(env::NAME).filter(|n| !n.trim().is_empty()) {
            config.name = name;
        }
        if let Some(level) = lookup(env::LOG_LEVEL).filter(|l| !l.trim().is_empty()) {
            config.log_level = level;
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, env::MAX_REQUEST_SIZE)? {
            config.max_request_size = size;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, env::REQUEST_TIMEOUT)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_var::<u32, _>(&lookup, env::RATE_LIMIT)? {
            config.rate_limit_requests = limit;
        }
        if let Some(raw) = lookup(env::METRICS) {
            config.enable_metrics = parse_bool(env::METRICS, &raw)?;
        }
        if let Some(raw) = lookup(env::ALLOWED_DIRS) {
            let dirs: Vec<PathBuf> = std::env::split_paths(&raw)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !dirs.is_empty() {
                config.allowed_directories = dirs;
            }
        }
        if let Some(raw) = lookup(env::TOOLSETS) {
            config.toolsets = Toolset::parse_list(&raw)?;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, env::SIMULATED_LATENCY_MS)? {
            config.simulated_latency = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Whether a toolset is enabled
    pub fn toolset_enabled(&self, toolset: Toolset) -> bool {
        self.toolsets.contains(&toolset)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rate_limit_requests: DEFAULT_RATE_LIMIT,
            enable_metrics: true,
            allowed_directories: default_allowed_directories(),
            toolsets: Toolset::ALL.to_vec(),
            simulated_latency: Duration::ZERO,
        }
    }
}

/// Current directory, `~/Documents` and the system temp directory
pub fn default_allowed_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(documents) = dirs::document_dir() {
        dirs.push(documents);
    }
    dirs.push(std::env::temp_dir());

    dirs
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ConfigError::InvalidValue {
                var: var.to_string(),
                message: format!("'{}': {}", raw, e),
            }
            .into()
        }),
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("'{}' is not a boolean", other),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::ToolkitError;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.name, "mcp-toolkit");
        assert_eq!(config.max_request_size, 1024 * 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.rate_limit_requests, 100);
        assert!(config.enable_metrics);
        assert_eq!(config.toolsets.len(), Toolset::ALL.len());
        assert!(config.allowed_directories.contains(&std::env::temp_dir()));
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (env::NAME, "custom"),
            (env::RATE_LIMIT, "5"),
            (env::REQUEST_TIMEOUT, "2"),
            (env::METRICS, "off"),
            (env::TOOLSETS, "basic, files"),
            (env::SIMULATED_LATENCY_MS, "250"),
        ]))
        .unwrap();

        assert_eq!(config.name, "custom");
        assert_eq!(config.rate_limit_requests, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert!(!config.enable_metrics);
        assert_eq!(config.toolsets, vec![Toolset::Basic, Toolset::Files]);
        assert!(!config.toolset_enabled(Toolset::Ops));
        assert_eq!(config.simulated_latency, Duration::from_millis(250));
    }

    #[test]
    fn test_allowed_dirs_from_env() {
        let joined = std::env::join_paths(["/srv/a", "/srv/b"]).unwrap();
        let joined = joined.to_string_lossy().to_string();
        let config =
            ServerConfig::from_lookup(lookup_from(&[(env::ALLOWED_DIRS, &joined)])).unwrap();
        assert_eq!(
            config.allowed_directories,
            vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]
        );
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[(env::RATE_LIMIT, "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ToolkitError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_invalid_bool_rejected() {
        assert!(ServerConfig::from_lookup(lookup_from(&[(env::METRICS, "maybe")])).is_err());
    }
}
