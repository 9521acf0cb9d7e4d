//! Error types for codebench-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodebenchError {
    #[error("invalid path: {0} is outside the workspace")]
    PathEscape(String),

    #[error("refusing to remove the workspace root")]
    RootProtected,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("language {0} not supported")]
    UnsupportedLanguage(String),

    #[error("package installation not supported for {0}")]
    UnsupportedEcosystem(String),

    #[error("invalid package name {0:?}: names must start with an alphanumeric character")]
    InvalidPackageName(String),

    #[error("no packages requested")]
    NoPackages,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CodebenchError {
    /// Stable name of the error class, used on the wire
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PathEscape(_) => "path_escape",
            Self::RootProtected => "root_protected",
            Self::NotFound(_) => "not_found",
            Self::Io(_) => "io",
            Self::UnsupportedLanguage(_) => "unsupported_language",
            Self::UnsupportedEcosystem(_) => "unsupported_ecosystem",
            Self::InvalidPackageName(_) => "invalid_package_name",
            Self::NoPackages => "no_packages",
            Self::Protocol(_) => "protocol",
            Self::Config(_) => "config",
        }
    }

    /// Map an io error on `path` to `NotFound` when the entry is missing
    pub(crate) fn from_io(err: std::io::Error, path: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io(err)
        }
    }
}
