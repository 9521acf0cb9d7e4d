//! File operations on the workspace
//!
//! Every operation resolves its caller-supplied path through
//! [`WorkspaceRoot::resolve`] before touching the filesystem. Concurrent
//! writers to the same path are not serialized: the last write wins.

use crate::{CodebenchError, Result, WorkspaceRoot};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    // Declaration order is the listing order.
    Directory,
    File,
}

/// One entry of a tree listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub kind: NodeKind,
    /// Virtual path relative to the workspace root, `/`-separated
    pub path: String,
    /// Always empty for files
    pub children: Vec<FileNode>,
}

impl FileNode {
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }
}

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<FileNode>>> + Send + 'a>>;

/// File operations confined to one workspace root
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: Arc<WorkspaceRoot>,
}

impl WorkspaceStore {
    #[must_use]
    pub const fn new(root: Arc<WorkspaceRoot>) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &WorkspaceRoot {
        &self.root
    }

    /// Top-level entries of the workspace, recursively expanded
    pub async fn tree(&self) -> Result<Vec<FileNode>> {
        Ok(self.list_tree("").await?.children)
    }

    /// Recursively list `dir`
    pub async fn list_tree(&self, dir: &str) -> Result<FileNode> {
        fs::create_dir_all(self.root.path()).await?;

        let path = self.root.resolve(dir)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| CodebenchError::from_io(e, dir))?;
        if !meta.is_dir() {
            return Err(CodebenchError::Io(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{dir} is not a directory"),
            )));
        }

        let children = self.walk(&path).await?;
        Ok(FileNode {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            kind: NodeKind::Directory,
            path: self.root.to_virtual(&path),
            children,
        })
    }

    fn walk<'a>(&'a self, dir: &'a Path) -> WalkFuture<'a> {
        Box::pin(async move {
            let mut entries = fs::read_dir(dir).await?;
            let mut nodes = Vec::new();

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                let virtual_path = self.root.to_virtual(&path);

                // Symlinks are listed as files and never followed.
                if entry.file_type().await?.is_dir() {
                    let children = self.walk(&path).await?;
                    nodes.push(FileNode {
                        name,
                        kind: NodeKind::Directory,
                        path: virtual_path,
                        children,
                    });
                } else {
                    nodes.push(FileNode {
                        name,
                        kind: NodeKind::File,
                        path: virtual_path,
                        children: Vec::new(),
                    });
                }
            }

            sort_nodes(&mut nodes);
            Ok(nodes)
        })
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self.root.resolve(path)?;
        fs::read(&resolved)
            .await
            .map_err(|e| CodebenchError::from_io(e, path))
    }

    /// Overwrite `path` with `content`, creating parent directories
    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let resolved = self.root.resolve(path)?;
        if resolved == self.root.path() {
            return Err(CodebenchError::Io(io::Error::new(
                io::ErrorKind::IsADirectory,
                "cannot write to the workspace root",
            )));
        }

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&resolved, content).await?;

        tracing::debug!(path, bytes = content.len(), "file written");
        Ok(())
    }

    /// Remove a file, or a directory and everything under it
    ///
    /// A symlink is unlinked itself; its target is left alone.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let resolved = self.root.resolve_entry(path)?;
        if resolved == self.root.path() {
            return Err(CodebenchError::RootProtected);
        }

        let meta = fs::symlink_metadata(&resolved)
            .await
            .map_err(|e| CodebenchError::from_io(e, path))?;
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&resolved).await
        } else {
            fs::remove_file(&resolved).await
        };
        removed.map_err(|e| CodebenchError::from_io(e, path))?;

        tracing::debug!(path, dir = meta.is_dir(), "entry deleted");
        Ok(())
    }

    /// Create `path` and any missing parents; existing directories are fine
    pub async fn make_directory(&self, path: &str) -> Result<()> {
        let resolved = self.root.resolve(path)?;
        fs::create_dir_all(&resolved).await?;
        Ok(())
    }

    /// Store an uploaded file directly under the root; returns the stored name
    pub async fn store_uploaded(&self, file_name: &str, content: &[u8]) -> Result<String> {
        let safe = sanitize_file_name(file_name);
        fs::create_dir_all(self.root.path()).await?;
        let resolved = self.root.resolve(&safe)?;
        fs::write(&resolved, content).await?;

        tracing::info!(
            original = file_name,
            stored = %safe,
            bytes = content.len(),
            "upload stored"
        );
        Ok(safe)
    }

    /// Store a batch of uploads, returning stored names in order
    pub async fn store_uploads(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<String>> {
        let mut stored = Vec::with_capacity(files.len());
        for (name, content) in files {
            stored.push(self.store_uploaded(name, content).await?);
        }
        Ok(stored)
    }
}

/// Directories before files, then by name
fn sort_nodes(nodes: &mut [FileNode]) {
    nodes.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
}

/// Reduce a client-supplied file name to a safe basename
#[must_use]
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.chars().all(|c| c == '.') {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format!("upload_{millis}")
    } else {
        safe
    }
}
