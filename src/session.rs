//! Session backend resolution and external tool validation.
//!
//! The backend decides which output-switching tool the mode pair is built
//! around. There is no safe fallback command shape, so an unrecognized
//! session is a hard stop rather than a guess.

use std::path::{Path, PathBuf};

use crate::error::{SwitchError, SwitchResult};
use crate::{pulse, wmctrl};

/// Display-control mechanism for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayBackend {
    /// Xorg session; outputs switched with xrandr.
    X11,
    /// GNOME on Wayland; outputs switched with gnome-randr.
    GnomeWayland,
    /// KDE Plasma on Wayland; outputs switched with kscreen-doctor.
    KdeWayland,
}

impl DisplayBackend {
    /// The output-switching tool this backend drives.
    #[must_use]
    pub fn tool(self) -> &'static str {
        match self {
            Self::X11 => "xrandr",
            Self::GnomeWayland => "gnome-randr",
            Self::KdeWayland => "kscreen-doctor",
        }
    }

    /// Every external tool a session on this backend needs.
    #[must_use]
    pub fn required_tools(self) -> [&'static str; 3] {
        [self.tool(), wmctrl::TOOL, pulse::TOOL]
    }
}

/// Resolves the backend from `XDG_SESSION_TYPE` and `XDG_CURRENT_DESKTOP`.
///
/// # Errors
/// [`SwitchError::Unsupported`] for anything other than X11, GNOME on
/// Wayland, or KDE on Wayland.
pub fn detect_backend() -> SwitchResult<DisplayBackend> {
    let session = std::env::var("XDG_SESSION_TYPE").unwrap_or_default();
    let desktop = std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default();
    resolve_backend(&session, &desktop)
}

/// Pure resolution from the two XDG signals.
///
/// `desktop` is a colon-separated list (`ubuntu:GNOME`); components are
/// compared case-insensitively.
///
/// # Errors
/// [`SwitchError::Unsupported`] when no component names a desktop with a
/// known Wayland switching tool, or the session type itself is unknown.
pub fn resolve_backend(session: &str, desktop: &str) -> SwitchResult<DisplayBackend> {
    match session.to_lowercase().as_str() {
        "x11" => Ok(DisplayBackend::X11),
        "wayland" => {
            let desktop = desktop.to_lowercase();
            if desktop.split(':').any(|part| part == "gnome") {
                Ok(DisplayBackend::GnomeWayland)
            } else if desktop.split(':').any(|part| part == "kde") {
                Ok(DisplayBackend::KdeWayland)
            } else {
                Err(SwitchError::Unsupported(format!(
                    "wayland desktop '{desktop}' has no known output-switching tool"
                )))
            }
        }
        "" => Err(SwitchError::Unsupported(
            "XDG_SESSION_TYPE is not set".to_string(),
        )),
        other => Err(SwitchError::Unsupported(format!("session type '{other}'"))),
    }
}

/// Checks that every tool is an executable on `PATH`.
///
/// # Errors
/// [`SwitchError::MissingTool`] naming the first absent tool.
pub fn validate_tools<'a, I>(tools: I) -> SwitchResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for tool in tools {
        if which(tool).is_none() {
            return Err(SwitchError::MissingTool(tool.to_string()));
        }
    }
    Ok(())
}

/// `PATH` scan for an executable file named `program`.
fn which(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
