//! Confinement of caller-supplied paths to the workspace root
//!
//! Every path that arrives from a client is a *virtual* path: a `/`-separated
//! string interpreted relative to the workspace root. [`WorkspaceRoot::resolve`]
//! turns it into an absolute path and guarantees the result is the root or one
//! of its descendants, after symlinks are followed. Nothing touches the
//! filesystem or picks a process cwd from client input without going through it.

use crate::{CodebenchError, Result};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// The directory all workspace operations are confined to
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    /// Create the root directory if needed and pin its canonical form
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let root = std::fs::canonicalize(root)?;
        tracing::debug!(root = %root.display(), "workspace root pinned");
        Ok(Self { root })
    }

    /// Canonical absolute path of the root
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a virtual path to an absolute path inside the root
    pub fn resolve(&self, virtual_path: &str) -> Result<PathBuf> {
        let Some(relative) = normalize(virtual_path) else {
            return Err(self.escape(virtual_path));
        };

        let joined = self.root.join(relative);
        let Some(resolved) = canonicalize_existing(&joined, &self.root) else {
            return Err(self.escape(virtual_path));
        };

        if is_within(&self.root, &resolved) {
            Ok(resolved)
        } else {
            Err(self.escape(virtual_path))
        }
    }

    /// Resolve a virtual path without following its final component
    ///
    /// The parent directory is resolved like [`resolve`](Self::resolve) and
    /// the last name is joined as-is, so a symlink addresses the link itself
    /// rather than its target. Used where the entry is removed, not opened.
    pub fn resolve_entry(&self, virtual_path: &str) -> Result<PathBuf> {
        let Some(relative) = normalize(virtual_path) else {
            return Err(self.escape(virtual_path));
        };
        let Some(name) = relative.file_name() else {
            return Ok(self.root.clone());
        };

        let parent = match relative.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.root.join(parent),
            _ => self.root.clone(),
        };
        let Some(parent) = canonicalize_existing(&parent, &self.root) else {
            return Err(self.escape(virtual_path));
        };

        if is_within(&self.root, &parent) {
            Ok(parent.join(name))
        } else {
            Err(self.escape(virtual_path))
        }
    }

    /// Render an absolute path under the root as a `/`-separated virtual path
    #[must_use]
    pub fn to_virtual(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(&self.root)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }

    fn escape(&self, virtual_path: &str) -> CodebenchError {
        tracing::warn!(
            root = %self.root.display(),
            path = virtual_path,
            "rejected path outside workspace"
        );
        CodebenchError::PathEscape(virtual_path.to_string())
    }
}

/// Component-wise containment check; `/ws-other` is not inside `/ws`
#[must_use]
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

/// Collapse `.` and `..` lexically. `None` for absolute paths, NUL bytes, or a
/// `..` that would climb above the root.
fn normalize(virtual_path: &str) -> Option<PathBuf> {
    if virtual_path.contains('\0') {
        return None;
    }

    let unified = virtual_path.replace('\\', "/");
    if unified.starts_with('/') {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            name => segments.push(name),
        }
    }

    let relative: PathBuf = segments.iter().collect();
    // Only plain names may remain; prefixes and roots are refused.
    if relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Some(relative)
    } else {
        None
    }
}

/// Canonicalize the longest existing ancestor of `path` and re-append the
/// rest. `None` if an entry exists but cannot be followed (dangling symlink).
fn canonicalize_existing(path: &Path, root: &Path) -> Option<PathBuf> {
    let mut tail: Vec<OsString> = Vec::new();
    let mut current = path;

    loop {
        if let Ok(canonical) = std::fs::canonicalize(current) {
            return Some(tail.iter().rev().fold(canonical, |acc, seg| acc.join(seg)));
        }

        if current.symlink_metadata().is_ok() && current != root {
            return None;
        }

        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) if current != root => {
                tail.push(name.to_os_string());
                current = parent;
            }
            // Root vanished underneath us; the lexical join is still confined.
            _ => return Some(path.to_path_buf()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, WorkspaceRoot) {
        let dir = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(dir.path().join("ws")).unwrap();
        (dir, root)
    }

    #[test]
    fn test_resolve_plain_paths() {
        let (_dir, root) = setup();
        assert_eq!(root.resolve("").unwrap(), root.path());
        assert_eq!(root.resolve(".").unwrap(), root.path());
        assert_eq!(root.resolve("a/b.py").unwrap(), root.path().join("a/b.py"));
        assert_eq!(root.resolve("./a//b.py").unwrap(), root.path().join("a/b.py"));
        assert_eq!(root.resolve("a/../b.py").unwrap(), root.path().join("b.py"));
        assert_eq!(root.resolve("a\\b.py").unwrap(), root.path().join("a/b.py"));
    }

    #[test]
    fn test_rejects_traversal() {
        let (_dir, root) = setup();
        for path in [
            "..",
            "../etc/passwd",
            "a/../../etc/passwd",
            "a/b/../../../x",
            "..\\..\\windows",
            "./../ws",
        ] {
            assert!(
                matches!(root.resolve(path), Err(CodebenchError::PathEscape(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_absolute_paths() {
        let (_dir, root) = setup();
        assert!(matches!(root.resolve("/etc/passwd"), Err(CodebenchError::PathEscape(_))));
        let inside = root.path().join("file.txt");
        assert!(matches!(
            root.resolve(&inside.to_string_lossy()),
            Err(CodebenchError::PathEscape(_))
        ));
        assert!(matches!(root.resolve("a\0b"), Err(CodebenchError::PathEscape(_))));
    }

    #[test]
    fn test_sibling_prefix_is_not_inside() {
        let (dir, root) = setup();
        let sibling = dir.path().join("ws-other");
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("secret"), b"x").unwrap();

        assert!(matches!(
            root.resolve("../ws-other/secret"),
            Err(CodebenchError::PathEscape(_))
        ));
        assert!(!is_within(root.path(), &std::fs::canonicalize(&sibling).unwrap()));
        assert!(is_within(Path::new("/ws"), Path::new("/ws/a")));
        assert!(!is_within(Path::new("/ws"), Path::new("/ws-other")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (dir, root) = setup();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), root.path().join("dangling"))
            .unwrap();

        assert!(matches!(root.resolve("link"), Err(CodebenchError::PathEscape(_))));
        assert!(matches!(root.resolve("link/new.txt"), Err(CodebenchError::PathEscape(_))));
        assert!(matches!(root.resolve("dangling"), Err(CodebenchError::PathEscape(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_allowed() {
        let (_dir, root) = setup();
        std::fs::create_dir_all(root.path().join("real")).unwrap();
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("alias")).unwrap();

        assert_eq!(
            root.resolve("alias/x.txt").unwrap(),
            root.path().join("real/x.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_entry_keeps_final_link() {
        let (dir, root) = setup();
        std::fs::create_dir_all(root.path().join("real")).unwrap();
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("alias")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), root.path().join("stale")).unwrap();
        std::os::unix::fs::symlink(dir.path(), root.path().join("out")).unwrap();

        assert_eq!(root.resolve_entry("alias").unwrap(), root.path().join("alias"));
        assert_eq!(root.resolve_entry("stale").unwrap(), root.path().join("stale"));
        assert_eq!(
            root.resolve_entry("alias/x.txt").unwrap(),
            root.path().join("real/x.txt")
        );
        assert_eq!(root.resolve_entry("").unwrap(), root.path());
        assert!(matches!(root.resolve_entry("out/ws"), Err(CodebenchError::PathEscape(_))));
        assert!(matches!(root.resolve_entry("../ws"), Err(CodebenchError::PathEscape(_))));
    }

    #[test]
    fn test_to_virtual() {
        let (_dir, root) = setup();
        assert_eq!(root.to_virtual(&root.path().join("a/b.py")), "a/b.py");
        assert_eq!(root.to_virtual(root.path()), "");
    }
}
