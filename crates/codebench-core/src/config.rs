//! Workspace configuration

use crate::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by every workspace component
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory every file and process operation is confined to
    pub root: PathBuf,

    /// Default wall-clock limit for code execution
    #[serde(with = "duration_secs")]
    pub exec_timeout: Duration,

    /// Wall-clock limit for package installation
    #[serde(with = "duration_secs")]
    pub install_timeout: Duration,

    /// Upper bound for per-request timeout overrides
    #[serde(with = "duration_secs")]
    pub max_timeout: Duration,

    /// Combined output kept per process, in bytes
    pub max_output_bytes: usize,

    /// Interpreter overrides, keyed by language name (`python`, `shell`, ...)
    pub interpreters: BTreeMap<String, PathBuf>,

    /// Package manager used for the python ecosystem
    pub pip_program: PathBuf,

    /// Extra environment variables for spawned processes
    pub env: Vec<(String, String)>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            exec_timeout: Duration::from_secs(30),
            install_timeout: Duration::from_secs(120),
            max_timeout: Duration::from_secs(300),
            max_output_bytes: 1024 * 1024, // 1MB
            interpreters: BTreeMap::new(),
            pip_program: PathBuf::from("pip3"),
            env: vec![],
        }
    }
}

impl WorkspaceConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> WorkspaceConfigBuilder {
        WorkspaceConfigBuilder::default()
    }

    /// Program used to run `language`, honoring overrides
    #[must_use]
    pub fn interpreter(&self, language: Language) -> PathBuf {
        self.interpreters
            .get(language.name())
            .cloned()
            .unwrap_or_else(|| PathBuf::from(language.program()))
    }

    /// Clamp a requested timeout to `max_timeout`, falling back to `exec_timeout`
    #[must_use]
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .filter(|t| !t.is_zero())
            .map_or(self.exec_timeout, |t| t.min(self.max_timeout))
    }
}

/// Builder for WorkspaceConfig
#[derive(Debug, Default)]
pub struct WorkspaceConfigBuilder {
    config: WorkspaceConfig,
}

impl WorkspaceConfigBuilder {
    #[must_use]
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root = path.into();
        self
    }

    #[must_use]
    pub fn exec_timeout(mut self, duration: Duration) -> Self {
        self.config.exec_timeout = duration;
        self
    }

    #[must_use]
    pub fn exec_timeout_secs(self, secs: u64) -> Self {
        self.exec_timeout(Duration::from_secs(secs))
    }

    #[must_use]
    pub fn install_timeout(mut self, duration: Duration) -> Self {
        self.config.install_timeout = duration;
        self
    }

    #[must_use]
    pub fn max_timeout(mut self, duration: Duration) -> Self {
        self.config.max_timeout = duration;
        self
    }

    #[must_use]
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.config.max_output_bytes = bytes;
        self
    }

    #[must_use]
    pub fn interpreter(mut self, language: Language, program: impl Into<PathBuf>) -> Self {
        self.config
            .interpreters
            .insert(language.name().to_string(), program.into());
        self
    }

    #[must_use]
    pub fn pip_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.pip_program = program.into();
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn build(self) -> WorkspaceConfig {
        self.config
    }
}

/// Get default socket path from CODEBENCH_SOCKET env var or system default
///
/// Returns:
/// - `$CODEBENCH_SOCKET` if set (for development)
/// - `/run/codebench/codebench.sock` otherwise (production)
pub fn default_socket_path() -> PathBuf {
    std::env::var("CODEBENCH_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/codebench/codebench.sock"))
}

/// Get default workspace root from CODEBENCH_WORKSPACE env var or `./workspace`
pub fn default_workspace_root() -> PathBuf {
    std::env::var("CODEBENCH_WORKSPACE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("workspace"))
}

/// Durations as whole seconds in config files
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkspaceConfig::default();
        assert_eq!(config.exec_timeout, Duration::from_secs(30));
        assert_eq!(config.install_timeout, Duration::from_secs(120));
        assert_eq!(config.pip_program, PathBuf::from("pip3"));
    }

    #[test]
    fn test_interpreter_override() {
        let config = WorkspaceConfig::builder()
            .interpreter(Language::Shell, "/bin/sh")
            .build();
        assert_eq!(config.interpreter(Language::Shell), PathBuf::from("/bin/sh"));
        assert_eq!(config.interpreter(Language::Python), PathBuf::from("python3"));
    }

    #[test]
    fn test_effective_timeout() {
        let config = WorkspaceConfig::builder()
            .exec_timeout_secs(30)
            .max_timeout(Duration::from_secs(60))
            .build();
        assert_eq!(config.effective_timeout(None), Duration::from_secs(30));
        assert_eq!(
            config.effective_timeout(Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            config.effective_timeout(Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.effective_timeout(Some(Duration::ZERO)),
            Duration::from_secs(30)
        );
    }
}
