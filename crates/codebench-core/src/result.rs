//! Execution result types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of running an interpreter or package manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Standard output and standard error, interleaved as they arrived
    pub combined_output: String,

    /// Exit code, absent when the process never ran, was killed, or died by signal
    pub exit_code: Option<i32>,

    /// Whether the process group was killed because the timeout elapsed
    pub timed_out: bool,

    /// Whether output beyond the configured cap was discarded
    pub truncated: bool,

    /// Wall-clock time from spawn to reap
    pub duration: Duration,
}

impl ExecutionResult {
    /// A result that carries only a message; nothing was spawned
    #[must_use]
    pub fn informational(message: impl Into<String>) -> Self {
        Self {
            combined_output: message.into(),
            ..Self::default()
        }
    }

    /// Check if execution was successful (exit code 0, no timeout)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// Append a notice on its own line
    pub fn push_notice(&mut self, notice: &str) {
        self.combined_output.push('\n');
        self.combined_output.push_str(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_informational_is_not_success() {
        let result = ExecutionResult::informational("nothing to do");
        assert_eq!(result.combined_output, "nothing to do");
        assert_eq!(result.exit_code, None);
        assert!(!result.is_success());
    }

    #[test]
    fn test_push_notice() {
        let mut result = ExecutionResult {
            combined_output: "partial".into(),
            exit_code: Some(0),
            ..ExecutionResult::default()
        };
        assert!(result.is_success());
        result.timed_out = true;
        result.push_notice("Execution timeout after 1s");
        assert_eq!(result.combined_output, "partial\nExecution timeout after 1s");
        assert!(!result.is_success());
    }
}
