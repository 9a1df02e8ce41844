//! Path sandbox for the file tools
//!
//! A path is allowed when its resolved absolute form lies under one of the
//! configured roots. Resolution removes `.`/`..` lexically and then
//! canonicalizes the longest existing ancestor, so symlinks inside a root
//! cannot point the tools outside of it.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::{ConfigError, Result, ToolError};

#[derive(Debug, Clone)]
pub struct Sandbox {
    roots: Vec<PathBuf>,
}

impl Sandbox {
    /// Build a sandbox from configured directories.
    ///
    /// Directories that do not exist are skipped; at least one must remain.
    pub fn new(dirs: &[PathBuf]) -> Result<Self> {
        let mut roots = Vec::new();
        for dir in dirs {
            match absolute(dir).and_then(|p| p.canonicalize()) {
                Ok(root) => {
                    if !roots.contains(&root) {
                        roots.push(root);
                    }
                }
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Skipping unusable allowed directory");
                }
            }
        }

        if roots.is_empty() {
            return Err(ConfigError::NoAllowedDirectories.into());
        }
        Ok(Self { roots })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `path` and check it against the roots
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let resolved = resolve_path(path)?;

        if self.contains(&resolved) {
            Ok(resolved)
        } else {
            Err(ToolError::AccessDenied {
                path: path.display().to_string(),
            }
            .into())
        }
    }

    pub fn is_allowed(&self, path: impl AsRef<Path>) -> bool {
        resolve_path(path.as_ref())
            .map(|p| self.contains(&p))
            .unwrap_or(false)
    }

    fn contains(&self, resolved: &Path) -> bool {
        self.roots.iter().any(|root| resolved.starts_with(root))
    }
}

/// Absolute, normalized path with the existing part canonicalized
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let normalized = normalize_lexically(&absolute(path)?);
    Ok(canonicalize_existing_prefix(&normalized))
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut full = canonical;
            for part in missing.iter().rev() {
                full.push(part);
            }
            return full;
        }

        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn test_paths_inside_root_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(&[dir.path().to_path_buf()]).unwrap();

        let inside = dir.path().join("notes/todo.txt");
        let resolved = tokio_test::assert_ok!(sandbox.resolve(&inside));
        assert!(resolved.ends_with("notes/todo.txt"));
        assert!(sandbox.is_allowed(dir.path()));
    }

    #[test]
    fn test_parent_escape_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(&[dir.path().to_path_buf()]).unwrap();

        let escape = dir.path().join("../../etc/passwd");
        let err = sandbox.resolve(&escape).unwrap_err();
        assert!(err.to_string().starts_with("Access denied to"));
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_denied() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("data");
        let sibling = parent.path().join("data-private");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();

        let sandbox = Sandbox::new(&[root]).unwrap();
        assert!(!sandbox.is_allowed(sibling.join("secret.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_denied() {
        let outside = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        let sandbox = Sandbox::new(&[root.path().to_path_buf()]).unwrap();
        assert!(!sandbox.is_allowed(root.path().join("link/file.txt")));
    }

    #[test]
    fn test_missing_roots_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(&[
            PathBuf::from("/definitely/not/here"),
            dir.path().to_path_buf(),
        ])
        .unwrap();
        assert_eq!(sandbox.roots().len(), 1);

        assert!(Sandbox::new(&[PathBuf::from("/definitely/not/here")]).is_err());
    }
}
