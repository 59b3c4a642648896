//! Display output switching.
//!
//! The command shape depends on the backend: the randr-style tools take
//! `--output` flag pairs, kscreen-doctor addresses outputs by name. Both
//! enable one output and disable the other in a single invocation.

use std::fmt;

use crate::error::{SwitchError, SwitchResult};
use crate::exec;
use crate::session::DisplayBackend;

/// A fully-built output switch invocation, precomputed at mode
/// construction so activation never consults configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCommand {
    program: &'static str,
    args: Vec<String>,
}

impl SwitchCommand {
    /// Builds the backend-specific command enabling `enable` and disabling
    /// `disable`.
    #[must_use]
    pub fn build(backend: DisplayBackend, enable: &str, disable: &str) -> Self {
        let args = match backend {
            DisplayBackend::X11 | DisplayBackend::GnomeWayland => vec![
                "--output".to_string(),
                enable.to_string(),
                "--auto".to_string(),
                "--output".to_string(),
                disable.to_string(),
                "--off".to_string(),
            ],
            DisplayBackend::KdeWayland => vec![
                format!("output.{enable}.enable"),
                format!("output.{disable}.disable"),
            ],
        };
        Self {
            program: backend.tool(),
            args,
        }
    }

    /// Runs the switch.
    ///
    /// # Errors
    /// [`SwitchError::ExecutionFailed`] on a non-zero exit with the tool's
    /// stderr as the reason; [`SwitchError::Timeout`] when the tool hangs
    /// past its budget.
    pub async fn execute(&self) -> SwitchResult<()> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        let output = exec::run(self.program, &args)
            .await
            .map_err(|e| e.into_execution(self.program, &args))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SwitchError::ExecutionFailed {
                command: self.to_string(),
                reason: exec::failure_reason(&output),
            })
        }
    }
}

impl fmt::Display for SwitchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}
