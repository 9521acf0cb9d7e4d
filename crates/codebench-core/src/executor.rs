//! Running source snippets under a language interpreter

use crate::process::{format_timeout, supervise, CommandSpec};
use crate::{ExecutionResult, Language, Result, WorkspaceConfig, WorkspaceRoot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use uuid::Uuid;

/// Request to execute code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Program text, persisted to a file before the interpreter runs
    pub source_code: String,
    /// Language identifier, e.g. `python` or `shell`
    pub language: String,
    /// Virtual path to save the source to; a temporary file otherwise
    pub target_path: Option<String>,
    /// Optional timeout override
    pub timeout: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            language: language.into(),
            target_path: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Executes code artifacts inside the workspace root
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    root: Arc<WorkspaceRoot>,
    config: Arc<WorkspaceConfig>,
}

impl ProcessRunner {
    #[must_use]
    pub const fn new(root: Arc<WorkspaceRoot>, config: Arc<WorkspaceConfig>) -> Self {
        Self { root, config }
    }

    /// Persist `request.source_code` and run it with the interpreter for
    /// `request.language`, cwd pinned to the workspace root.
    ///
    /// Unsupported languages, spawn failures and timeouts are reported in the
    /// returned [`ExecutionResult`]. Errors are only returned when the target
    /// path escapes the workspace or the source file cannot be written.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let Ok(language) = request.language.parse::<Language>() else {
            tracing::info!(language = %request.language, "unsupported language requested");
            return Ok(ExecutionResult::informational(Language::unsupported_message(
                &request.language,
            )));
        };

        let (script, generated) = match &request.target_path {
            Some(target) => (self.root.resolve(target)?, false),
            None => {
                let name = format!("temp_{}.{}", Uuid::new_v4().simple(), language.extension());
                (self.root.resolve(&name)?, true)
            }
        };

        if let Some(parent) = script.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&script, &request.source_code).await?;

        let timeout = self.config.effective_timeout(request.timeout);
        let spec = CommandSpec::new(self.config.interpreter(language), self.root.path())
            .arg(&script)
            .envs(&self.config.env)
            .timeout(timeout)
            .max_output_bytes(self.config.max_output_bytes);

        tracing::info!(
            %language,
            script = %self.root.to_virtual(&script),
            ?timeout,
            "executing"
        );
        let run = supervise(&spec).await;

        if generated {
            if let Err(e) = fs::remove_file(&script).await {
                tracing::warn!(
                    script = %script.display(),
                    error = %e,
                    "failed to remove temp source"
                );
            }
        }

        let notice = format!("Execution timeout after {}", format_timeout(timeout));
        let mut result = run.into_result(&notice);
        if let Some(code) = result.exit_code.filter(|code| *code != 0) {
            result.push_notice(&format!("Process exited with code {code}"));
        }

        tracing::info!(
            %language,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            duration = ?result.duration,
            "execution finished"
        );
        Ok(result)
    }
}
