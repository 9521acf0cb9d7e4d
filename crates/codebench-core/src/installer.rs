//! Package installation with validated names
//!
//! Names come straight from clients and end up on a package manager's
//! command line, so a request is checked as a whole before anything is
//! spawned: one bad name rejects all of them.

use crate::process::{format_timeout, supervise, CommandSpec};
use crate::{CodebenchError, Ecosystem, ExecutionResult, Result, WorkspaceConfig, WorkspaceRoot};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

/// Name, optionally followed by extras and a version constraint
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_\-\[\]<>=.]*$").expect("package name pattern is valid")
});

/// Request to install packages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRequest {
    pub packages: Vec<String>,
    /// Ecosystem identifier, e.g. `python`
    pub ecosystem: String,
}

/// Check one package name against the allowlist
///
/// Must start with an ASCII letter or digit and may then contain letters,
/// digits, `_ - . [ ] < > =`. A leading `-` would reach pip as a flag.
#[must_use]
pub fn is_valid_package_name(name: &str) -> bool {
    !name.starts_with('-') && PACKAGE_NAME.is_match(name)
}

/// Validate every name; returns them deduplicated in first-seen order
pub fn validate_packages(packages: &[String]) -> Result<Vec<String>> {
    if packages.is_empty() {
        return Err(CodebenchError::NoPackages);
    }

    let mut accepted: Vec<String> = Vec::with_capacity(packages.len());
    for name in packages {
        if !is_valid_package_name(name) {
            tracing::warn!(package = %name, "rejected package name");
            return Err(CodebenchError::InvalidPackageName(name.clone()));
        }
        if !accepted.contains(name) {
            accepted.push(name.clone());
        }
    }
    Ok(accepted)
}

/// Installs packages with the ecosystem's package manager
#[derive(Debug, Clone)]
pub struct PackageInstaller {
    root: Arc<WorkspaceRoot>,
    config: Arc<WorkspaceConfig>,
}

impl PackageInstaller {
    #[must_use]
    pub const fn new(root: Arc<WorkspaceRoot>, config: Arc<WorkspaceConfig>) -> Self {
        Self { root, config }
    }

    /// Validate and install `request.packages`
    ///
    /// Unsupported ecosystems yield an informational result; invalid names
    /// fail with [`CodebenchError::InvalidPackageName`] before any spawn.
    pub async fn install(&self, request: &InstallRequest) -> Result<ExecutionResult> {
        let Ok(ecosystem) = request.ecosystem.parse::<Ecosystem>() else {
            tracing::info!(ecosystem = %request.ecosystem, "unsupported ecosystem requested");
            return Ok(ExecutionResult::informational(format!(
                "Package installation not supported for {}",
                request.ecosystem
            )));
        };

        let packages = validate_packages(&request.packages)?;
        let spec = self.command(ecosystem, &packages);

        tracing::info!(?ecosystem, packages = ?packages, "installing packages");
        let mut result = supervise(&spec).await.into_result(&format!(
            "Installation timeout after {}",
            format_timeout(spec.timeout)
        ));
        if let Some(code) = result.exit_code {
            result.push_notice(&format!("Exit code: {code}"));
        }

        tracing::info!(
            ?ecosystem,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            "installation finished"
        );
        Ok(result)
    }

    fn command(&self, ecosystem: Ecosystem, packages: &[String]) -> CommandSpec {
        let spec = match ecosystem {
            Ecosystem::Pip => CommandSpec::new(&self.config.pip_program, self.root.path())
                .arg("install")
                .args(packages),
        };
        spec.envs(&self.config.env)
            .timeout(self.config.install_timeout)
            .max_output_bytes(self.config.max_output_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn installer_with(pip: &str) -> (TempDir, PackageInstaller) {
        let dir = TempDir::new().unwrap();
        let config = WorkspaceConfig::builder().root(dir.path()).pip_program(pip).build();
        let root = WorkspaceRoot::new(&config.root).unwrap();
        (dir, PackageInstaller::new(Arc::new(root), Arc::new(config)))
    }

    fn request(packages: &[&str]) -> InstallRequest {
        InstallRequest {
            packages: packages.iter().map(ToString::to_string).collect(),
            ecosystem: "python".into(),
        }
    }

    #[test]
    fn test_valid_names() {
        for name in [
            "requests",
            "numpy==1.26.4",
            "Django>=4.2",
            "black[jupyter]",
            "a_b-c.d",
            "9lives",
        ] {
            assert!(is_valid_package_name(name), "{name} should be accepted");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "",
            "--upgrade",
            "-r",
            "; rm -rf /",
            "pkg;ls",
            "a b",
            "$(id)",
            "_private",
            "pkg|sh",
            "x\n",
            "numpy\n--index-url=evil",
        ] {
            assert!(!is_valid_package_name(name), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_validate_dedupes() {
        let names = validate_packages(&["a".into(), "b".into(), "a".into()]).unwrap();
        assert_eq!(names, ["a", "b"]);
        assert!(matches!(validate_packages(&[]), Err(CodebenchError::NoPackages)));
    }

    #[tokio::test]
    async fn test_invalid_name_rejects_whole_request() {
        // A pip stand-in that would leave a marker if it ever ran
        let (dir, installer) = installer_with("touch");
        let err = installer
            .install(&request(&["requests", "--upgrade"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CodebenchError::InvalidPackageName(ref n) if n == "--upgrade"));

        let err = installer.install(&request(&["; rm -rf /"])).await.unwrap_err();
        assert!(matches!(err, CodebenchError::InvalidPackageName(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_ecosystem() {
        let (_dir, installer) = installer_with("pip3");
        let result = installer
            .install(&InstallRequest {
                packages: vec!["left-pad".into()],
                ecosystem: "npm".into(),
            })
            .await
            .unwrap();
        assert_eq!(result.combined_output, "Package installation not supported for npm");
        assert_eq!(result.exit_code, None);
    }

    #[tokio::test]
    async fn test_names_passed_as_arguments() {
        // `echo install <names>` stands in for pip
        let (_dir, installer) = installer_with("echo");
        let result = installer
            .install(&request(&["requests", "numpy==1.26.4"]))
            .await
            .unwrap();
        assert!(result.combined_output.starts_with("install requests numpy==1.26.4"));
        assert!(result.combined_output.ends_with("Exit code: 0"));
        assert_eq!(result.exit_code, Some(0));
    }
}
