//! Mode definitions and the controller that keeps exactly one active.
//!
//! A mode binds one display output and one audio label. The controller owns
//! the Game/Desktop pair, feeds detection results through a small state
//! machine, and rebuilds the pair from a fresh config snapshot whenever the
//! targets change. Switching is one-directional: leaving a mode changes
//! nothing physically, entering the other mode does.

use std::fmt;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Severity, SwitchResult};
use crate::pulse;
use crate::randr::SwitchCommand;
use crate::session::{self, DisplayBackend};

/// The two operating configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Game,
    Desktop,
}

impl ModeKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Game => "Game Mode",
            Self::Desktop => "Desktop Mode",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Capability seam for the two switch side effects, so the state machine is
/// testable without touching real outputs.
pub trait SwitchExecutor {
    /// Runs an output switch command.
    async fn switch_output(&self, command: &SwitchCommand) -> SwitchResult<()>;
    /// Makes the sink matching `label` the default; returns the sink name.
    async fn switch_audio(&self, label: &str) -> SwitchResult<String>;
}

/// Production executor driving the session's real tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSwitcher;

impl SwitchExecutor for SystemSwitcher {
    async fn switch_output(&self, command: &SwitchCommand) -> SwitchResult<()> {
        command.execute().await
    }

    async fn switch_audio(&self, label: &str) -> SwitchResult<String> {
        pulse::switch_to(label).await
    }
}

/// Everything needed to enter one mode, plus whether we are currently in it.
#[derive(Debug, Clone)]
pub struct ModeDefinition {
    kind: ModeKind,
    output_command: SwitchCommand,
    output_name: String,
    audio_label: String,
    audio_disabled: bool,
    active: bool,
}

impl ModeDefinition {
    fn new(
        kind: ModeKind,
        backend: DisplayBackend,
        enable: &str,
        disable: &str,
        audio_label: &str,
        audio_disabled: bool,
    ) -> Self {
        Self {
            kind,
            output_command: SwitchCommand::build(backend, enable, disable),
            output_name: enable.to_string(),
            audio_label: audio_label.to_string(),
            audio_disabled,
            active: false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Applies the output switch and, unless disabled, the audio switch,
    /// then marks the mode active.
    ///
    /// Always reissues the commands; the controller decides when that would
    /// be redundant. A missing sink is logged and skipped without blocking
    /// activation. Transient failures propagate and leave the mode
    /// inactive, so the next poll retries the transition.
    ///
    /// # Errors
    /// Output/audio failures other than a missing sink.
    pub async fn activate<S: SwitchExecutor>(&mut self, switcher: &S) -> SwitchResult<()> {
        info!(
            output = %self.output_name,
            command = %self.output_command,
            "entering {}", self.kind
        );
        switcher.switch_output(&self.output_command).await?;

        if !self.audio_disabled {
            match switcher.switch_audio(&self.audio_label).await {
                Ok(sink) => info!(%sink, "default sink set for {}", self.kind),
                Err(e) if e.severity() == Severity::Soft => {
                    warn!("keeping previous default sink: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        self.active = true;
        Ok(())
    }

    /// Leaves the mode without touching hardware; entering the other mode
    /// is what changes outputs.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

#[derive(Debug)]
struct ModePair {
    game: ModeDefinition,
    desktop: ModeDefinition,
}

/// Builds both definitions from one config snapshot; each mode enables its
/// own output and disables the other's.
fn build_pair(backend: DisplayBackend, config: &Config) -> ModePair {
    ModePair {
        game: ModeDefinition::new(
            ModeKind::Game,
            backend,
            &config.gamemode_adapter,
            &config.desktop_adapter,
            &config.gamemode_audio,
            config.disable_audio,
        ),
        desktop: ModeDefinition::new(
            ModeKind::Desktop,
            backend,
            &config.desktop_adapter,
            &config.gamemode_adapter,
            &config.desktop_audio,
            config.disable_audio,
        ),
    }
}

/// Owns the Game/Desktop pair and keeps at most one mode active.
///
/// Construction is lazy: the pair is built on the first detection result
/// after startup or invalidation, re-validating the session backend and the
/// required tools each time.
#[derive(Debug, Default)]
pub struct ModeController {
    modes: Option<ModePair>,
}

impl ModeController {
    #[must_use]
    pub fn new() -> Self {
        Self { modes: None }
    }

    /// Drops the current pair; the next detection result rebuilds it from
    /// the then-current config snapshot.
    pub fn invalidate(&mut self) {
        self.modes = None;
    }

    /// Kind of the currently active mode, if any.
    #[must_use]
    pub fn current(&self) -> Option<ModeKind> {
        let modes = self.modes.as_ref()?;
        if modes.game.is_active() {
            Some(ModeKind::Game)
        } else if modes.desktop.is_active() {
            Some(ModeKind::Desktop)
        } else {
            None
        }
    }

    /// Feeds one detection result through the state machine.
    ///
    /// Returns the mode newly entered, or `None` for the no-op transition
    /// when the presence result matches the already-active mode.
    ///
    /// # Errors
    /// Fatal backend/tool validation errors from a rebuild, and transient
    /// switch failures; callers classify them by severity.
    pub async fn apply<S: SwitchExecutor>(
        &mut self,
        present: bool,
        config: &Config,
        switcher: &S,
    ) -> SwitchResult<Option<ModeKind>> {
        let mut modes = match self.modes.take() {
            Some(modes) => modes,
            None => {
                let backend = session::detect_backend()?;
                session::validate_tools(backend.required_tools())?;
                info!(
                    backend = ?backend,
                    game_output = %config.gamemode_adapter,
                    desktop_output = %config.desktop_adapter,
                    audio_switching = !config.disable_audio,
                    "mode pair built"
                );
                build_pair(backend, config)
            }
        };

        let result = Self::step(&mut modes, present, switcher).await;
        self.modes = Some(modes);
        result
    }

    /// One transition. The counterpart mode is deactivated before the
    /// target is entered, so both are never active at once; a failed
    /// activation leaves both inactive and the next poll retries.
    async fn step<S: SwitchExecutor>(
        modes: &mut ModePair,
        present: bool,
        switcher: &S,
    ) -> SwitchResult<Option<ModeKind>> {
        if present && !modes.game.is_active() {
            modes.desktop.deactivate();
            modes.game.activate(switcher).await?;
            Ok(Some(ModeKind::Game))
        } else if !present && !modes.desktop.is_active() {
            modes.game.deactivate();
            modes.desktop.activate(switcher).await?;
            Ok(Some(ModeKind::Desktop))
        } else {
            Ok(None)
        }
    }
}

/// Controller with a pre-built pair, bypassing backend detection.
#[cfg(test)]
pub(crate) fn controller_with_pair(backend: DisplayBackend, config: &Config) -> ModeController {
    ModeController {
        modes: Some(build_pair(backend, config)),
    }
}
