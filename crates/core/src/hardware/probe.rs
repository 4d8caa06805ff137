//! Classification of diagnostic command results into probe outcomes.

use serde::{Deserialize, Serialize};

/// Answer to "is this capability available", with the supporting text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub available: bool,
    pub detail: String,
}

impl ProbeOutcome {
    pub fn available(detail: impl Into<String>) -> Self {
        Self {
            available: true,
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            available: false,
            detail: detail.into(),
        }
    }
}

/// What happened when a diagnostic command was run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// The executable does not exist on `PATH`.
    NotFound,
    /// The process could not be started for another reason.
    SpawnFailed(String),
    /// The process did not finish within the allotted time and was killed.
    TimedOut { secs: u64 },
    /// The process ran to completion.
    Exited {
        success: bool,
        stdout: String,
        stderr: String,
    },
}

/// Turn a diagnostic command result into a [`ProbeOutcome`].
///
/// - missing executable: unavailable, `"<program> command not found"`
/// - spawn failure: unavailable, the error text
/// - timeout: unavailable, `"<program> timed out after <n>s"`
/// - non-zero exit: unavailable, the raw stderr
/// - empty stdout: unavailable, a fixed sentinel message
/// - anything else: available, trimmed stdout
pub fn classify_probe(program: &str, result: CommandResult) -> ProbeOutcome {
    match result {
        CommandResult::NotFound => ProbeOutcome::unavailable(format!("{program} command not found")),
        CommandResult::SpawnFailed(err) => ProbeOutcome::unavailable(err),
        CommandResult::TimedOut { secs } => {
            ProbeOutcome::unavailable(format!("{program} timed out after {secs}s"))
        }
        CommandResult::Exited {
            success: false,
            stderr,
            ..
        } => ProbeOutcome::unavailable(stderr),
        CommandResult::Exited { stdout, .. } => {
            let trimmed = stdout.trim();
            if trimmed.is_empty() {
                ProbeOutcome::unavailable(format!("No GPU information returned by {program}"))
            } else {
                ProbeOutcome::available(trimmed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited(success: bool, stdout: &str, stderr: &str) -> CommandResult {
        CommandResult::Exited {
            success,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn missing_executable_is_unavailable() {
        let outcome = classify_probe("nvidia-smi", CommandResult::NotFound);
        assert!(!outcome.available);
        assert_eq!(outcome.detail, "nvidia-smi command not found");
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let outcome = classify_probe(
            "docker",
            exited(false, "", "could not select device driver \"\" with capabilities: [[gpu]]\n"),
        );
        assert!(!outcome.available);
        assert!(outcome.detail.starts_with("could not select device driver"));
    }

    #[test]
    fn empty_output_uses_sentinel() {
        let outcome = classify_probe("nvidia-smi", exited(true, "  \n", ""));
        assert!(!outcome.available);
        assert_eq!(outcome.detail, "No GPU information returned by nvidia-smi");
    }

    #[test]
    fn non_empty_output_is_available_and_trimmed() {
        let outcome = classify_probe(
            "nvidia-smi",
            exited(true, "NVIDIA A100-SXM4-40GB, 40960 MiB, 40000 MiB, 960 MiB\n", ""),
        );
        assert!(outcome.available);
        assert_eq!(
            outcome.detail,
            "NVIDIA A100-SXM4-40GB, 40960 MiB, 40000 MiB, 960 MiB"
        );
    }

    #[test]
    fn timeout_is_unavailable() {
        let outcome = classify_probe("docker", CommandResult::TimedOut { secs: 120 });
        assert!(!outcome.available);
        assert_eq!(outcome.detail, "docker timed out after 120s");
    }

    #[test]
    fn spawn_failure_keeps_error_text() {
        let outcome = classify_probe(
            "nvidia-smi",
            CommandResult::SpawnFailed("Permission denied (os error 13)".into()),
        );
        assert!(!outcome.available);
        assert_eq!(outcome.detail, "Permission denied (os error 13)");
    }
}
