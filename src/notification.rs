//! Desktop notifications
//!
//! Sends mode-switch and detection-state notifications via notify-rust,
//! using `FreeDesktop` standard icon names.

use color_eyre::eyre::{Context, Result};
use notify_rust::Notification;

use crate::mode::ModeKind;

const APP_NAME: &str = "BigPictureTV";
const TIMEOUT_MS: i32 = 3000;

/// Send a desktop notification
///
/// # Errors
/// Returns an error if the notification cannot be shown (e.g., no
/// notification daemon running).
pub fn send(summary: &str, body: &str, icon: &str) -> Result<()> {
    Notification::new()
        .summary(summary)
        .body(body)
        .appname(APP_NAME)
        .icon(icon)
        .timeout(TIMEOUT_MS)
        .show()
        .context("Failed to show notification")?;
    Ok(())
}

/// Icon for a mode switch notification
#[must_use]
pub fn mode_icon(mode: ModeKind) -> &'static str {
    match mode {
        ModeKind::Game => "video-display",
        ModeKind::Desktop => "computer",
    }
}

/// Notify that a mode was entered
///
/// # Errors
/// Returns an error if the notification cannot be shown.
pub fn mode_changed(mode: ModeKind) -> Result<()> {
    let body = match mode {
        ModeKind::Game => "Big picture window detected",
        ModeKind::Desktop => "Big picture window closed",
    };
    send(mode.label(), body, mode_icon(mode))
}

/// Notify that detection was paused or resumed
///
/// # Errors
/// Returns an error if the notification cannot be shown.
pub fn detection_changed(active: bool) -> Result<()> {
    if active {
        send(
            "Detection resumed",
            "Watching for the big picture window",
            "media-playback-start",
        )
    } else {
        send(
            "Detection paused",
            "Window polling is off",
            "media-playback-pause",
        )
    }
}

/// Notify that the daemon came up
///
/// # Errors
/// Returns an error if the notification cannot be shown.
pub fn daemon_started() -> Result<()> {
    send("BigPictureTV started", "Big picture detection running", "video-display")
}

/// Notify that the daemon is going down
///
/// # Errors
/// Returns an error if the notification cannot be shown.
pub fn daemon_stopped() -> Result<()> {
    send("BigPictureTV stopped", "Big picture detection stopped", "video-display")
}
