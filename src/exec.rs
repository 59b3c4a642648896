//! Bounded execution of the session's external tools.
//!
//! Every invocation shares one time budget; a tool that hangs is killed and
//! reported instead of stalling the detection loop forever.

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;

use crate::error::SwitchError;

/// Default time budget for any external command.
const COMMAND_TIMEOUT_MS: u64 = 10_000;

/// Command time budget, overridable via `BPTV_COMMAND_TIMEOUT_MS`.
fn command_timeout() -> Duration {
    let ms = std::env::var("BPTV_COMMAND_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(COMMAND_TIMEOUT_MS);
    Duration::from_millis(ms)
}

/// Failure modes of a single invocation, before taxonomy mapping.
#[derive(Debug)]
pub(crate) enum ExecError {
    /// The binary is not on `PATH`.
    Missing,
    /// The command was killed after exceeding the time budget.
    TimedOut { timeout_ms: u64 },
    /// Spawning or collecting the command failed for another reason.
    Io(std::io::Error),
}

impl ExecError {
    /// Maps to the taxonomy for read-only queries.
    pub(crate) fn into_query(self, tool: &str, args: &[&str]) -> SwitchError {
        match self {
            Self::Missing => SwitchError::MissingTool(tool.to_string()),
            Self::TimedOut { timeout_ms } => SwitchError::Timeout {
                command: render(tool, args),
                timeout_ms,
            },
            Self::Io(e) => SwitchError::QueryFailed {
                tool: tool.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Maps to the taxonomy for state-changing commands.
    pub(crate) fn into_execution(self, program: &str, args: &[&str]) -> SwitchError {
        match self {
            Self::Missing => SwitchError::MissingTool(program.to_string()),
            Self::TimedOut { timeout_ms } => SwitchError::Timeout {
                command: render(program, args),
                timeout_ms,
            },
            Self::Io(e) => SwitchError::ExecutionFailed {
                command: render(program, args),
                reason: e.to_string(),
            },
        }
    }
}

/// Runs `program` with `args`, killing it if the time budget elapses.
///
/// Exit status is not checked here; callers decide whether a non-zero exit
/// is a query failure or an execution failure.
pub(crate) async fn run(program: &str, args: &[&str]) -> Result<Output, ExecError> {
    let timeout = command_timeout();
    let child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();
    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(ExecError::Missing),
        Ok(Err(e)) => Err(ExecError::Io(e)),
        Err(_) => Err(ExecError::TimedOut {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Human-readable `program arg arg` form for logs and error reports.
pub(crate) fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Trimmed stderr of a failed command, or its exit status when stderr is
/// empty.
pub(crate) fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("exited with {}", output.status)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    use super::*;
    use crate::error::SwitchError;

    fn output_with(status_code: i32, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(status_code << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn render_joins_program_and_args() {
        assert_eq!(render("pactl", &["list", "sinks"]), "pactl list sinks");
        assert_eq!(render("wmctrl", &[]), "wmctrl");
    }

    #[test]
    fn failure_reason_prefers_stderr() {
        let output = output_with(1, "  warning: cannot find output HDMI-1\n");
        assert_eq!(failure_reason(&output), "warning: cannot find output HDMI-1");
    }

    #[test]
    fn failure_reason_falls_back_to_exit_status() {
        let output = output_with(2, "");
        assert!(failure_reason(&output).starts_with("exited with"));
    }

    #[test]
    fn missing_binary_maps_to_missing_tool_either_way() {
        let query = ExecError::Missing.into_query("wmctrl", &["-l"]);
        assert!(matches!(query, SwitchError::MissingTool(name) if name == "wmctrl"));

        let exec = ExecError::Missing.into_execution("xrandr", &["--auto"]);
        assert!(matches!(exec, SwitchError::MissingTool(name) if name == "xrandr"));
    }

    #[test]
    fn io_failures_split_by_call_kind() {
        let io = || std::io::Error::other("pipe closed");
        assert!(matches!(
            ExecError::Io(io()).into_query("pactl", &["info"]),
            SwitchError::QueryFailed { .. }
        ));
        assert!(matches!(
            ExecError::Io(io()).into_execution("pactl", &["set-default-sink", "s"]),
            SwitchError::ExecutionFailed { .. }
        ));
    }

    #[tokio::test]
    async fn nonexistent_program_reports_missing() {
        let result = run("bptv-test-no-such-binary", &[]).await;
        assert!(matches!(result, Err(ExecError::Missing)));
    }

    #[tokio::test]
    async fn captures_stdout_of_a_real_command() {
        let output = run("echo", &["hello"]).await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }
}
