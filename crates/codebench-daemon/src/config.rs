//! Daemon configuration

use codebench_core::{CodebenchError, WorkspaceConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to Unix socket
    pub socket_path: PathBuf,

    /// Workspace root, timeouts and interpreters
    pub workspace: WorkspaceConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: codebench_core::config::default_socket_path(),
            workspace: WorkspaceConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CodebenchError::Config(format!("{}: {e}", path.display())).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebench_core::Language;
    use std::time::Duration;

    #[test]
    fn test_partial_toml() {
        let config: DaemonConfig = toml::from_str(
            r#"
            socket_path = "/tmp/codebench.sock"

            [workspace]
            root = "/srv/workspace"
            exec_timeout = 10

            [workspace.interpreters]
            shell = "/bin/sh"
            "#,
        )
        .unwrap();

        assert_eq!(config.socket_path, PathBuf::from("/tmp/codebench.sock"));
        assert_eq!(config.workspace.root, PathBuf::from("/srv/workspace"));
        assert_eq!(config.workspace.exec_timeout, Duration::from_secs(10));
        assert_eq!(config.workspace.install_timeout, Duration::from_secs(120));
        assert_eq!(
            config.workspace.interpreter(Language::Shell),
            PathBuf::from("/bin/sh")
        );
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codebench.toml");
        std::fs::write(&path, "[workspace]\npip_program = \"/opt/pip\"\n").unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.workspace.pip_program, PathBuf::from("/opt/pip"));
        assert!(DaemonConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_load_malformed_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codebench.toml");
        std::fs::write(&path, "[workspace\nexec_timeout = \"soon\"\n").unwrap();

        let err = DaemonConfig::load(&path).unwrap_err();
        let err = err.downcast_ref::<CodebenchError>().unwrap();
        assert!(matches!(err, CodebenchError::Config(msg) if msg.contains("codebench.toml")));
        assert_eq!(err.kind(), "config");
    }
}
