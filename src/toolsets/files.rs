//! File system tools
//!
//! Read, write, list, search and inspect files. Every path goes through the
//! [`Sandbox`] before it is touched.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, ToolError, ToolkitError};
use crate::mcp::tools::{parse_args, Tool, ToolRegistry};
use crate::mcp::types::CallToolResult;
use crate::schema::generate_schema;
use crate::toolsets::sandbox::Sandbox;

/// Upper bound on matches listed by `search_files`
pub const MAX_SEARCH_RESULTS: usize = 1000;

pub fn register(registry: &mut ToolRegistry, sandbox: Arc<Sandbox>) {
    registry
        .register(ReadFile(sandbox.clone()))
        .register(WriteFile(sandbox.clone()))
        .register(ListDirectory(sandbox.clone()))
        .register(SearchFiles(sandbox.clone()))
        .register(GetFileInfo(sandbox.clone()))
        .register(CreateDirectory(sandbox));
}

/// Human-readable size used in directory listings
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Map a metadata lookup failure to the tool's "not found" error
fn not_found_or(err: std::io::Error, not_found: ToolError) -> ToolkitError {
    if err.kind() == ErrorKind::NotFound {
        not_found.into()
    } else {
        err.into()
    }
}

pub struct ReadFile(Arc<Sandbox>);

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadFileArgs {
    /// Path to the file to read
    filepath: String,
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a text file"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<ReadFileArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: ReadFileArgs = parse_args(args)?;
        let path = self.0.resolve(&args.filepath)?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            not_found_or(
                e,
                ToolError::FileNotFound {
                    path: args.filepath.clone(),
                },
            )
        })?;
        if !metadata.is_file() {
            return Err(ToolError::NotAFile {
                path: args.filepath,
            }
            .into());
        }

        let bytes = tokio::fs::read(&path).await?;
        let content = String::from_utf8(bytes).map_err(|_| ToolError::BinaryFile {
            path: args.filepath.clone(),
        })?;

        Ok(CallToolResult::text(format!(
            "Content of {}:\n\n{}",
            args.filepath, content
        )))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Write,
    Append,
}

pub struct WriteFile(Arc<Sandbox>);

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteFileArgs {
    /// Path to the file to write
    filepath: String,
    /// Content to write to the file
    content: String,
    /// 'write' to overwrite, 'append' to add to the end
    #[serde(default)]
    mode: WriteMode,
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a text file"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<WriteFileArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: WriteFileArgs = parse_args(args)?;
        let path = self.0.resolve(&args.filepath)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let action = match args.mode {
            WriteMode::Write => {
                tokio::fs::write(&path, args.content.as_bytes()).await?;
                "Written to"
            }
            WriteMode::Append => {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                file.write_all(args.content.as_bytes()).await?;
                file.flush().await?;
                "Appended to"
            }
        };

        Ok(CallToolResult::text(format!(
            "{} {} successfully ({} characters)",
            action,
            args.filepath,
            args.content.chars().count()
        )))
    }
}

pub struct ListDirectory(Arc<Sandbox>);

#[derive(Debug, Deserialize, JsonSchema)]
struct ListDirectoryArgs {
    /// Path to the directory to list
    directory: String,
    /// Whether to include hidden files
    #[serde(default)]
    include_hidden: bool,
}

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "List contents of a directory"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<ListDirectoryArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: ListDirectoryArgs = parse_args(args)?;
        let path = self.0.resolve(&args.directory)?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            not_found_or(
                e,
                ToolError::DirectoryNotFound {
                    path: args.directory.clone(),
                },
            )
        })?;
        if !metadata.is_dir() {
            return Err(ToolError::NotADirectory {
                path: args.directory,
            }
            .into());
        }

        let mut items = Vec::new();
        let mut entries = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !args.include_hidden && name.starts_with('.') {
                continue;
            }

            // follow symlinks so a link to a directory lists as DIR
            let line = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_dir() => format!("DIR  {}", name),
                Ok(meta) => format!("FILE {} ({})", name, format_size(meta.len())),
                Err(_) => format!("FILE {} (size unknown)", name),
            };
            items.push(line);
        }
        items.sort();

        Ok(CallToolResult::text(format!(
            "Contents of {}:\n\n{}",
            args.directory,
            items.join("\n")
        )))
    }
}

pub struct SearchFiles(Arc<Sandbox>);

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchFilesArgs {
    /// Glob pattern to search for (e.g. '*.rs', '**/*.txt')
    pattern: String,
    /// Directory to search in (defaults to the current directory)
    #[serde(default = "current_dir_arg")]
    directory: String,
}

fn current_dir_arg() -> String {
    ".".to_string()
}

#[derive(Debug)]
struct SearchMatch {
    path: PathBuf,
    size: Option<u64>,
}

/// `pattern` anchored at `root`, with glob metacharacters in `root` escaped
fn rooted_pattern(root: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }

    let mut full = glob::Pattern::escape(&root.to_string_lossy());
    if !full.ends_with(std::path::is_separator) {
        full.push(std::path::MAIN_SEPARATOR);
    }
    full.push_str(pattern);
    full
}

fn glob_in_sandbox(sandbox: &Sandbox, root: &Path, pattern: &str) -> Result<Vec<SearchMatch>> {
    let full_pattern = rooted_pattern(root, pattern);

    let paths = glob::glob(&full_pattern).map_err(|e| ToolError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;

    let mut matches: Vec<SearchMatch> = paths
        .filter_map(|entry| entry.ok())
        .filter(|path| sandbox.is_allowed(path))
        .map(|path| {
            let size = std::fs::metadata(&path)
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len());
            SearchMatch { path, size }
        })
        .collect();
    matches.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(matches)
}

#[async_trait]
impl Tool for SearchFiles {
    fn name(&self) -> &'static str {
        "search_files"
    }

    fn description(&self) -> &'static str {
        "Search for files matching a glob pattern"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<SearchFilesArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: SearchFilesArgs = parse_args(args)?;
        let root = self.0.resolve(&args.directory)?;

        let sandbox = self.0.clone();
        let pattern = args.pattern.clone();
        let matches = tokio::task::spawn_blocking(move || glob_in_sandbox(&sandbox, &root, &pattern))
            .await
            .map_err(|e| ToolError::Failed {
                message: format!("search task failed: {}", e),
            })??;

        if matches.is_empty() {
            return Ok(CallToolResult::text(format!(
                "No files found matching pattern: {}",
                args.pattern
            )));
        }

        let mut lines = vec![format!(
            "Found {} files matching '{}':",
            matches.len(),
            args.pattern
        )];
        for m in matches.iter().take(MAX_SEARCH_RESULTS) {
            match m.size {
                Some(size) => lines.push(format!("FILE {} ({} bytes)", m.path.display(), size)),
                None => lines.push(format!("DIR  {}", m.path.display())),
            }
        }
        if matches.len() > MAX_SEARCH_RESULTS {
            lines.push(format!(
                "... {} more not shown",
                matches.len() - MAX_SEARCH_RESULTS
            ));
        }

        Ok(CallToolResult::text(lines.join("\n")))
    }
}

pub struct GetFileInfo(Arc<Sandbox>);

#[derive(Debug, Deserialize, JsonSchema)]
struct GetFileInfoArgs {
    /// Path to the file or directory
    filepath: String,
}

fn rfc3339(time: std::io::Result<std::time::SystemTime>) -> Value {
    match time {
        Ok(t) => json!(DateTime::<Utc>::from(t).to_rfc3339()),
        Err(_) => Value::Null,
    }
}

#[async_trait]
impl Tool for GetFileInfo {
    fn name(&self) -> &'static str {
        "get_file_info"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a file or directory"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<GetFileInfoArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: GetFileInfoArgs = parse_args(args)?;
        let path = self.0.resolve(&args.filepath)?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            not_found_or(
                e,
                ToolError::PathNotFound {
                    path: args.filepath.clone(),
                },
            )
        })?;

        let mut info = json!({
            "path": args.filepath,
            "absolute_path": path.display().to_string(),
            "type": if metadata.is_dir() { "directory" } else { "file" },
            "size_bytes": metadata.len(),
            "modified_time": rfc3339(metadata.modified()),
            "created_time": rfc3339(metadata.created()),
            "readonly": metadata.permissions().readonly(),
        });

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            info["permissions"] = json!(format!("{:o}", metadata.permissions().mode() & 0o777));
        }

        if metadata.is_file() {
            let extension = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            info["extension"] = json!(extension);
        }

        Ok(CallToolResult::text(format!(
            "File Information:\n{}",
            serde_json::to_string_pretty(&info)?
        )))
    }
}

pub struct CreateDirectory(Arc<Sandbox>);

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateDirectoryArgs {
    /// Path of the directory to create
    directory: String,
    /// Create parent directories if they don't exist
    #[serde(default = "default_true")]
    recursive: bool,
}

fn default_true() -> bool {
    true
}

#[async_trait]
impl Tool for CreateDirectory {
    fn name(&self) -> &'static str {
        "create_directory"
    }

    fn description(&self) -> &'static str {
        "Create a new directory"
    }

    fn input_schema(&self) -> Value {
        generate_schema::<CreateDirectoryArgs>()
    }

    async fn call(&self, args: Value) -> Result<CallToolResult> {
        let args: CreateDirectoryArgs = parse_args(args)?;
        let path = self.0.resolve(&args.directory)?;

        if tokio::fs::try_exists(&path).await? {
            return Ok(CallToolResult::text(format!(
                "Directory already exists: {}",
                args.directory
            )));
        }

        if args.recursive {
            tokio::fs::create_dir_all(&path).await?;
        } else {
            tokio::fs::create_dir(&path).await?;
        }

        Ok(CallToolResult::text(format!(
            "Created directory: {}",
            args.directory
        )))
    }
}
