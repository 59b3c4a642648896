//! Default audio sink selection through pactl.
//!
//! Sinks are matched by a human-readable label: the first
//! blank-line-separated block of `pactl list sinks` output containing the
//! label wins, and its `Name:` value is what `set-default-sink` accepts.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{SwitchError, SwitchResult};
use crate::exec;

/// The audio tool.
pub const TOOL: &str = "pactl";

/// Lookup attempts before a label is declared missing.
const SINK_WAIT_ATTEMPTS: u32 = 5;
/// Delay between attempts; a freshly enabled output can grow its sink a
/// moment after the display switch.
const SINK_WAIT_MS: u64 = 200;

fn sink_wait_attempts() -> u32 {
    std::env::var("BPTV_SINK_WAIT_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(SINK_WAIT_ATTEMPTS)
        .max(1)
}

fn sink_wait_delay() -> Duration {
    let ms = std::env::var("BPTV_SINK_WAIT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(SINK_WAIT_MS);
    Duration::from_millis(ms)
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*Name:\s*(\S+)").expect("hard-coded pattern"))
}

fn description_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*Description:\s*(.+)$").expect("hard-coded pattern"))
}

/// One sink as reported by `pactl list sinks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sink {
    /// System identifier accepted by `set-default-sink`.
    pub name: String,
    /// Human-readable device description, when the block carries one.
    pub description: Option<String>,
}

/// Sinks currently known to the audio server.
///
/// # Errors
/// [`SwitchError::QueryFailed`] when the listing call fails.
pub async fn list_sinks() -> SwitchResult<Vec<Sink>> {
    Ok(parse_sinks(&list_sinks_raw().await?))
}

/// Name of the current default sink, if the server reports one.
///
/// # Errors
/// [`SwitchError::QueryFailed`] when `pactl info` fails.
pub async fn default_sink() -> SwitchResult<Option<String>> {
    let args = ["info"];
    let output = exec::run(TOOL, &args)
        .await
        .map_err(|e| e.into_query(TOOL, &args))?;
    if !output.status.success() {
        return Err(SwitchError::QueryFailed {
            tool: TOOL.to_string(),
            reason: exec::failure_reason(&output),
        });
    }
    let info = String::from_utf8_lossy(&output.stdout);
    Ok(info.lines().find_map(|line| {
        line.strip_prefix("Default Sink:")
            .map(|value| value.trim().to_string())
    }))
}

/// Makes the sink matching `label` the default and returns its name.
///
/// The lookup is retried a bounded number of times because sink hardware
/// can appear shortly after an output switch; after exhaustion the label is
/// declared missing and the previous default sink stays in place.
///
/// # Errors
/// [`SwitchError::SinkNotFound`] after the attempts are exhausted;
/// [`SwitchError::QueryFailed`] / [`SwitchError::ExecutionFailed`] when
/// pactl itself fails.
pub async fn switch_to(label: &str) -> SwitchResult<String> {
    let attempts = sink_wait_attempts();
    for attempt in 1..=attempts {
        let listing = list_sinks_raw().await?;
        if let Some(name) = resolve_label(&listing, label) {
            set_default_sink(&name).await?;
            return Ok(name);
        }
        if attempt < attempts {
            debug!(label, attempt, "no sink matched yet, waiting");
            tokio::time::sleep(sink_wait_delay()).await;
        }
    }
    Err(SwitchError::SinkNotFound(label.to_string()))
}

async fn list_sinks_raw() -> SwitchResult<String> {
    let args = ["list", "sinks"];
    let output = exec::run(TOOL, &args)
        .await
        .map_err(|e| e.into_query(TOOL, &args))?;
    if !output.status.success() {
        return Err(SwitchError::QueryFailed {
            tool: TOOL.to_string(),
            reason: exec::failure_reason(&output),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn set_default_sink(name: &str) -> SwitchResult<()> {
    let args = ["set-default-sink", name];
    let output = exec::run(TOOL, &args)
        .await
        .map_err(|e| e.into_execution(TOOL, &args))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(SwitchError::ExecutionFailed {
            command: exec::render(TOOL, &args),
            reason: exec::failure_reason(&output),
        })
    }
}

/// System name of the first sink block whose text contains `label`.
///
/// The label is matched against the whole block, so descriptions, ports,
/// and properties all count. Matching is case-sensitive, like the labels
/// pactl prints.
fn resolve_label(listing: &str, label: &str) -> Option<String> {
    for block in listing.split("\n\n") {
        if !block.contains(label) {
            continue;
        }
        if let Some(captures) = name_pattern().captures(block) {
            return captures.get(1).map(|m| m.as_str().to_string());
        }
    }
    None
}

fn parse_sinks(listing: &str) -> Vec<Sink> {
    listing
        .split("\n\n")
        .filter_map(|block| {
            let name = name_pattern().captures(block)?.get(1)?.as_str().to_string();
            let description = description_pattern()
                .captures(block)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string());
            Some(Sink { name, description })
        })
        .collect()
}
