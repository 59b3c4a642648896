//! Command-line interface definitions
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Parser, Subcommand};

/// BPTV - Big Picture TV
///
/// Switches display output and audio sink when a full-screen game window
/// appears.
#[derive(Parser)]
#[command(name = "bptv")]
#[command(version)]
#[command(about = "Big Picture TV - Switch display and audio when a full-screen game window appears")]
#[command(after_help = "\
BEHAVIOR:
  - The daemon polls the window list for a title containing all configured keywords
  - When the window appears, Game Mode enables the TV output and selects its audio sink
  - When it disappears, Desktop Mode restores the monitor output and desktop sink
  - Detection can be paused and resumed at runtime without losing mode state

DAEMON MANAGEMENT:
  bptv daemon              Run the detector daemon
  bptv daemon --foreground Run with logs to stderr instead of the log file
  bptv status              Query daemon status (or just: bptv)
  bptv pause               Pause window detection
  bptv resume              Resume window detection
  bptv toggle              Flip window detection
  bptv shutdown            Gracefully stop the daemon

QUERY COMMANDS:
  bptv check               Probe once for the big picture window
  bptv list-sinks          List audio sinks (fills gamemodeAudio/desktopAudio)
  bptv validate            Validate config file (local, no daemon needed)

IPC SOCKET:
  $XDG_RUNTIME_DIR/bptv.sock (or /tmp/bptv.sock)

SESSION SUPPORT:
  X11 via xrandr, GNOME Wayland via gnome-randr, KDE Wayland via
  kscreen-doctor. Window listing uses wmctrl, audio uses pactl.")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon (polls windows and switches modes)
    Daemon {
        /// Run in foreground with logs to stderr
        #[arg(short, long)]
        foreground: bool,
    },

    /// Query daemon status via IPC
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Pause window detection
    Pause,

    /// Resume window detection
    Resume,

    /// Flip window detection on or off
    Toggle,

    /// Probe once for the big picture window (local, no daemon needed)
    Check {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List audio sinks with the current default marked
    ListSinks {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate config file (local, no daemon needed)
    Validate,

    /// Gracefully shutdown the daemon
    Shutdown,
}
