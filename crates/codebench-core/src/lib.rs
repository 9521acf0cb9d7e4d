//! # codebench-core
//!
//! Workspace confinement and supervised interpreter execution.
//!
//! This crate provides the pieces behind the codebench daemon:
//! - Path confinement of caller-supplied paths to one workspace root
//! - File operations on the workspace (tree, read, write, delete, upload)
//! - Interpreter execution with timeouts and process-group teardown
//! - Package installation with validated, never shell-interpolated names
//! - The length-prefixed msgpack wire protocol

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod executor;
pub mod installer;
pub mod language;
pub mod path;
pub mod process;
pub mod protocol;
pub mod result;
pub mod workspace;

pub use config::WorkspaceConfig;
pub use error::CodebenchError;
pub use executor::{ExecutionRequest, ProcessRunner};
pub use installer::{InstallRequest, PackageInstaller};
pub use language::{Ecosystem, Language};
pub use path::WorkspaceRoot;
pub use result::ExecutionResult;
pub use workspace::{FileNode, NodeKind, WorkspaceStore};

/// Crate-level result type
pub type Result<T> = std::result::Result<T, CodebenchError>;
