//! Built-in toolsets
//!
//! Tools are grouped so a deployment can expose only what it needs:
//! `basic` (echo, calculator), `functions` (mocked function-calling
//! examples), `files` (sandboxed file system access) and `ops` (health and
//! metrics).

pub mod basic;
pub mod files;
pub mod functions;
pub mod ops;
pub mod sandbox;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{ConfigError, Result};
use crate::mcp::tools::ToolRegistry;
use crate::metrics::MetricsCollector;

use self::sandbox::Sandbox;

/// A named group of tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toolset {
    Basic,
    Functions,
    Files,
    Ops,
}

impl Toolset {
    pub const ALL: [Toolset; 4] = [
        Toolset::Basic,
        Toolset::Functions,
        Toolset::Files,
        Toolset::Ops,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Toolset::Basic => "basic",
            Toolset::Functions => "functions",
            Toolset::Files => "files",
            Toolset::Ops => "ops",
        }
    }

    /// Parse a comma-separated list such as `basic,files`.
    ///
    /// `all` expands to every toolset. Duplicates are dropped.
    pub fn parse_list(raw: &str) -> Result<Vec<Toolset>> {
        let mut toolsets = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if name.eq_ignore_ascii_case("all") {
                return Ok(Toolset::ALL.to_vec());
            }
            let toolset: Toolset = name.parse()?;
            if !toolsets.contains(&toolset) {
                toolsets.push(toolset);
            }
        }

        if toolsets.is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "toolsets".to_string(),
                message: "at least one toolset must be enabled".to_string(),
            }
            .into());
        }
        Ok(toolsets)
    }
}

impl FromStr for Toolset {
    type Err = crate::error::ToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        Toolset::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ConfigError::UnknownToolset {
                    name: s.to_string(),
                }
                .into()
            })
    }
}

impl fmt::Display for Toolset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a registry holding every enabled toolset
pub fn build_registry(config: &ServerConfig, metrics: Arc<MetricsCollector>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    for toolset in &config.toolsets {
        match toolset {
            Toolset::Basic => basic::register(&mut registry),
            Toolset::Functions => functions::register(&mut registry, config.simulated_latency),
            Toolset::Files => {
                let sandbox = Arc::new(Sandbox::new(&config.allowed_directories)?);
                files::register(&mut registry, sandbox);
            }
            Toolset::Ops => ops::register(&mut registry, config, metrics.clone()),
        }
        tracing::debug!(toolset = %toolset, "Registered toolset");
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            Toolset::parse_list("ops, basic,ops").unwrap(),
            vec![Toolset::Ops, Toolset::Basic]
        );
        assert_eq!(Toolset::parse_list("all").unwrap().len(), 4);
        assert!(Toolset::parse_list("basic,nope").is_err());
        assert!(Toolset::parse_list(" , ").is_err());
    }

    #[test]
    fn test_build_registry_respects_toolsets() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            toolsets: vec![Toolset::Basic, Toolset::Files],
            allowed_directories: vec![dir.path().to_path_buf()],
            ..ServerConfig::default()
        };

        let registry = build_registry(&config, Arc::new(MetricsCollector::new())).unwrap();
        assert!(registry.contains("echo"));
        assert!(registry.contains("read_file"));
        assert!(!registry.contains("health_check"));
        assert!(!registry.contains("get_weather"));
    }

    #[test]
    fn test_full_registry_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            allowed_directories: vec![dir.path().to_path_buf()],
            ..ServerConfig::default()
        };

        let registry = build_registry(&config, Arc::new(MetricsCollector::new())).unwrap();
        assert_eq!(registry.len(), 16);
    }
}
