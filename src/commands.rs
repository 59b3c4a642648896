//! CLI commands
//!
//! Implements both local commands (check, list-sinks, validate) and IPC-based
//! commands that talk to the daemon (status, pause, resume, toggle, shutdown).

use color_eyre::eyre::{Result, bail};
use crossterm::style::Stylize;

use crate::config::Config;
use crate::ipc::{self, Request, Response};
use crate::pulse;
use crate::style::BptvStyle;
use crate::wmctrl;

// ============================================================================
// Local Commands (no daemon needed)
// ============================================================================

/// Probe once for the big picture window
///
/// # Errors
/// Returns an error if the window query fails or wmctrl is missing.
pub async fn check(config: &Config, json_output: bool) -> Result<()> {
    let matched = wmctrl::query_match(&config.big_picture_keywords).await?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "present": matched.is_some(),
                "matched_title": matched,
                "keywords": config.big_picture_keywords,
            }))?
        );
    } else if let Some(title) = matched {
        println!(
            "{} {}",
            "Big picture window detected:".success(),
            title.as_str().bold()
        );
    } else {
        println!("{}", "No open window matches the configured keywords.".dim());
        println!("{} {:?}", "Keywords:".dim(), config.big_picture_keywords);
    }

    Ok(())
}

/// List audio sinks with the current default marked
///
/// # Errors
/// Returns an error if the pactl queries fail or JSON serialization fails.
pub async fn list_sinks(json_output: bool) -> Result<()> {
    let sinks = pulse::list_sinks().await?;
    let default = pulse::default_sink().await?;

    if json_output {
        let entries: Vec<_> = sinks
            .iter()
            .map(|sink| {
                serde_json::json!({
                    "name": sink.name,
                    "description": sink.description,
                    "is_default": Some(sink.name.as_str()) == default.as_deref(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "sinks": entries,
                "current_default": default,
            }))?
        );
    } else {
        println!("{}", "AUDIO SINKS:".header());
        println!("{}", "-".repeat(12));
        if sinks.is_empty() {
            println!("  {}", "(none)".dim());
        } else {
            for sink in &sinks {
                let marker = if Some(sink.name.as_str()) == default.as_deref() {
                    "* "
                } else {
                    "  "
                };
                println!("{}{}", marker, sink.name.as_str().bold());
                if let Some(ref description) = sink.description {
                    println!("    {}", description.as_str().dim());
                }
            }
            println!("\n  {} = current default", "*".dim());
        }

        println!(
            "\nPick a word unique to one sink for {} and {}.",
            "gamemodeAudio".technical(),
            "desktopAudio".technical()
        );
        if let Ok(path) = Config::path() {
            println!("{} {}", "Config:".dim(), path.display());
        }
    }

    Ok(())
}

/// Validate the config file and print a summary
///
/// # Errors
/// Returns an error when a hard validation rule is violated.
pub fn validate(config: &Config) -> Result<()> {
    config.validate()?;
    config.print_summary();

    let warnings = config.warnings();
    if !warnings.is_empty() {
        println!();
        for warning in &warnings {
            println!("{} {}", "warning:".warning(), warning);
        }
    }
    println!("\n{}", "Configuration is valid.".success());
    Ok(())
}

/// Format uptime in human-readable form
fn format_uptime(secs: u64) -> String {
    const SECS_PER_MINUTE: u64 = 60;
    const SECS_PER_HOUR: u64 = 3600;

    if secs < SECS_PER_MINUTE {
        return format!("{secs}s");
    }
    if secs < SECS_PER_HOUR {
        return format!("{mins}m", mins = secs / SECS_PER_MINUTE);
    }
    let hours = secs / SECS_PER_HOUR;
    let mins = (secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
    if mins > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{hours}h")
    }
}

// ============================================================================
// IPC-based Commands (require daemon)
// ============================================================================

/// Query daemon status via IPC
///
/// A daemon that does not answer is reported as not running rather than
/// treated as an error.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub async fn status(json_output: bool) -> Result<()> {
    let reply = match ipc::send_request(&Request::Status).await {
        Ok(Response::Status(reply)) => Some(reply),
        _ => None,
    };

    if json_output {
        let body = match reply {
            Some(reply) => serde_json::json!({
                "running": true,
                "version": reply.version,
                "uptime_secs": reply.uptime_secs,
                "uptime_human": format_uptime(reply.uptime_secs),
                "detection_active": reply.detection_active,
                "last_presence": reply.last_presence,
                "current_mode": reply.current_mode,
                "last_fault": reply.last_fault,
            }),
            None => serde_json::json!({ "running": false }),
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{}", "Daemon".header());
    println!("{}", "-".repeat(6));
    if let Some(reply) = reply {
        println!(
            "{} {}",
            "Status:".dim(),
            format!("Running (uptime: {})", format_uptime(reply.uptime_secs)).success()
        );
        println!("{} {}", "Version:".dim(), reply.version);

        let detection = if reply.detection_active {
            "active".success().to_string()
        } else {
            "paused".warning().to_string()
        };
        println!("{} {}", "Detection:".dim(), detection);

        let presence = match reply.last_presence {
            Some(true) => "big picture window present",
            Some(false) => "no big picture window",
            None => "not polled yet",
        };
        println!("{} {}", "Window:".dim(), presence);

        match reply.current_mode {
            Some(mode) => println!("{} {}", "Mode:".dim(), mode.as_str().bold()),
            None => println!("{} {}", "Mode:".dim(), "not entered yet".dim()),
        }
        if let Some(fault) = reply.last_fault {
            println!("{} {}", "Last fault:".dim(), fault.warning());
        }
    } else {
        println!("{} {}", "Status:".dim(), "Not running".error());
        println!("  Start with: {}", "bptv daemon".technical());
    }

    Ok(())
}

/// Pause window detection in the running daemon
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn pause() -> Result<()> {
    control(Request::Pause).await
}

/// Resume window detection in the running daemon
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn resume() -> Result<()> {
    control(Request::Resume).await
}

/// Flip window detection in the running daemon
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn toggle() -> Result<()> {
    control(Request::Toggle).await
}

/// Gracefully shutdown the daemon
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn shutdown() -> Result<()> {
    control(Request::Shutdown).await
}

async fn control(request: Request) -> Result<()> {
    if !ipc::is_daemon_running() {
        bail!("Daemon is not running. Start it with: bptv daemon");
    }

    match ipc::send_request(&request).await? {
        Response::Ok { message } => {
            println!("{}", message.success());
            Ok(())
        }
        Response::Error { message } => {
            bail!("Error: {message}");
        }
        Response::Status(_) => {
            bail!("Unexpected response from daemon");
        }
    }
}
