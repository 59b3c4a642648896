//! `bptv` - Big Picture TV
//!
//! Switches the display output and default audio sink when a configured
//! full-screen window (e.g. Steam Big Picture) appears, and switches back
//! when it disappears.
//!
//! # How it works
//! - Polls `wmctrl -l` for a window whose title contains all configured keywords
//! - Game Mode: enables the TV output and selects the TV audio sink
//! - Desktop Mode: restores the monitor output and desktop sink
//! - Display backends: `xrandr` (X11), `gnome-randr` (GNOME Wayland),
//!   `kscreen-doctor` (KDE Wayland)
//! - Audio via `pactl` (PulseAudio, and PipeWire through its pactl shim)
//!
//! # Surfaces
//! - A long-running daemon with a Unix-socket IPC control channel
//! - One-shot CLI commands (`check`, `list-sinks`, `validate`, `status`, ...)
//! - Desktop notifications on mode and detection changes

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod session;
pub mod wmctrl;
pub mod randr;
pub mod pulse;
pub mod mode;
pub mod detection;
pub mod notification;
pub mod logging;
pub mod style;
pub mod commands;
pub mod daemon;
pub mod ipc;

// Re-export commonly used types for convenience
pub use cli::Args;
pub use config::Config;
pub use error::{Severity, SwitchError, SwitchResult};
