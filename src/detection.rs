//! Detection scheduling: the pausable poll state and the per-tick driver.
//!
//! The daemon's select loop calls [`DetectionLoop::tick`] once per interval.
//! Everything that mutates modes happens inside the tick, on one task; the
//! only cross-task writes are the atomic pause/resume flags on
//! [`DetectionState`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Severity, SwitchError, SwitchResult};
use crate::mode::{ModeController, ModeKind, SwitchExecutor};
use crate::wmctrl::WindowQuery;

const PRESENCE_UNKNOWN: u8 = 0;
const PRESENCE_ABSENT: u8 = 1;
const PRESENCE_PRESENT: u8 = 2;

/// Shared detection flags. The loop reads them at the top of each tick;
/// IPC handlers on other tasks flip `active`.
#[derive(Debug)]
pub struct DetectionState {
    active: AtomicBool,
    last_presence: AtomicU8,
}

impl DetectionState {
    /// Fresh state: detection enabled, presence unknown.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            last_presence: AtomicU8::new(PRESENCE_UNKNOWN),
        }
    }

    /// Whether polling is currently enabled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn pause(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    /// Flips detection and returns the new value.
    pub fn toggle(&self) -> bool {
        !self.active.fetch_xor(true, Ordering::Relaxed)
    }

    /// Result of the last successful poll; `None` before the first one.
    #[must_use]
    pub fn last_presence(&self) -> Option<bool> {
        match self.last_presence.load(Ordering::Relaxed) {
            PRESENCE_PRESENT => Some(true),
            PRESENCE_ABSENT => Some(false),
            _ => None,
        }
    }

    fn record_presence(&self, present: bool) {
        let value = if present {
            PRESENCE_PRESENT
        } else {
            PRESENCE_ABSENT
        };
        self.last_presence.store(value, Ordering::Relaxed);
    }
}

impl Default for DetectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// State changes the status surface renders (notifications, logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// A mode was entered.
    ModeChanged { mode: ModeKind },
    /// Detection was paused or resumed.
    DetectionChanged { active: bool },
}

/// One poll cycle's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Detection is paused; nothing was queried.
    Idle,
    /// The window list was queried; `switched` names a newly entered mode.
    Polled {
        present: bool,
        switched: Option<ModeKind>,
    },
    /// A transient failure was absorbed; the next tick retries.
    Faulted,
}

/// Drives observer results through the controller, once per interval tick.
pub struct DetectionLoop<O, S> {
    state: Arc<DetectionState>,
    controller: ModeController,
    observer: O,
    switcher: S,
    events: mpsc::UnboundedSender<StatusEvent>,
    config: Config,
    last_fault: Option<String>,
}

impl<O: WindowQuery, S: SwitchExecutor> DetectionLoop<O, S> {
    pub fn new(
        state: Arc<DetectionState>,
        observer: O,
        switcher: S,
        events: mpsc::UnboundedSender<StatusEvent>,
        config: Config,
    ) -> Self {
        Self {
            state,
            controller: ModeController::new(),
            observer,
            switcher,
            events,
            config,
            last_fault: None,
        }
    }

    /// Runs one poll cycle.
    ///
    /// Transient and soft failures are absorbed here: logged, recorded as
    /// the last fault, retried implicitly by the next tick.
    ///
    /// # Errors
    /// Only the fatal kinds ([`SwitchError::Unsupported`],
    /// [`SwitchError::MissingTool`]), which end the daemon.
    pub async fn tick(&mut self) -> SwitchResult<Tick> {
        if !self.state.is_active() {
            return Ok(Tick::Idle);
        }

        let present = match self
            .observer
            .present(&self.config.big_picture_keywords)
            .await
        {
            Ok(present) => present,
            Err(e) => return self.absorb(e),
        };
        self.state.record_presence(present);
        debug!(present, "window poll");

        match self
            .controller
            .apply(present, &self.config, &self.switcher)
            .await
        {
            Ok(switched) => {
                self.last_fault = None;
                if let Some(mode) = switched {
                    let _ = self.events.send(StatusEvent::ModeChanged { mode });
                }
                Ok(Tick::Polled { present, switched })
            }
            Err(e) => self.absorb(e),
        }
    }

    fn absorb(&mut self, error: SwitchError) -> SwitchResult<Tick> {
        if error.severity() == Severity::Fatal {
            return Err(error);
        }
        warn!("{error}");
        self.last_fault = Some(error.to_string());
        Ok(Tick::Faulted)
    }

    /// Currently active mode, if the pair is built and one was entered.
    #[must_use]
    pub fn current_mode(&self) -> Option<ModeKind> {
        self.controller.current()
    }

    /// Last absorbed transient failure, cleared by a clean poll.
    #[must_use]
    pub fn last_fault(&self) -> Option<&str> {
        self.last_fault.as_deref()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Installs a fresh config snapshot, rebuilding the mode pair only when
    /// output/audio targets changed.
    pub fn update_config(&mut self, config: Config) {
        if self.config.modes_differ(&config) {
            debug!("switch targets changed, mode pair invalidated");
            self.controller.invalidate();
        }
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::mode::controller_with_pair;
    use crate::randr::SwitchCommand;
    use crate::session::DisplayBackend;

    struct ScriptedObserver {
        results: VecDeque<SwitchResult<bool>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedObserver {
        fn returning(results: Vec<SwitchResult<bool>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    results: results.into(),
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl WindowQuery for ScriptedObserver {
        async fn present(&mut self, _keywords: &[String]) -> SwitchResult<bool> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.results.pop_front().unwrap_or(Ok(false))
        }
    }

    /// Switcher that accepts everything without side effects.
    struct NullSwitcher;

    impl SwitchExecutor for NullSwitcher {
        async fn switch_output(&self, _command: &SwitchCommand) -> SwitchResult<()> {
            Ok(())
        }

        async fn switch_audio(&self, label: &str) -> SwitchResult<String> {
            Ok(label.to_string())
        }
    }

    fn make_config() -> Config {
        Config {
            gamemode_adapter: "HDMI-1".to_string(),
            desktop_adapter: "eDP-1".to_string(),
            ..Config::default()
        }
    }

    fn make_loop(
        results: Vec<SwitchResult<bool>>,
    ) -> (
        DetectionLoop<ScriptedObserver, NullSwitcher>,
        Arc<AtomicUsize>,
        mpsc::UnboundedReceiver<StatusEvent>,
    ) {
        let (observer, calls) = ScriptedObserver::returning(results);
        let (tx, rx) = mpsc::unbounded_channel();
        let config = make_config();
        let detection = DetectionLoop {
            state: Arc::new(DetectionState::new()),
            controller: controller_with_pair(DisplayBackend::X11, &config),
            observer,
            switcher: NullSwitcher,
            events: tx,
            config,
            last_fault: None,
        };
        (detection, calls, rx)
    }

    #[test]
    fn toggle_flips_and_reports_the_new_value() {
        let state = DetectionState::new();
        assert!(state.is_active());
        assert!(!state.toggle());
        assert!(!state.is_active());
        assert!(state.toggle());
        assert!(state.is_active());
    }

    #[test]
    fn presence_is_unknown_until_recorded() {
        let state = DetectionState::new();
        assert_eq!(state.last_presence(), None);
        state.record_presence(true);
        assert_eq!(state.last_presence(), Some(true));
        state.record_presence(false);
        assert_eq!(state.last_presence(), Some(false));
    }

    #[tokio::test]
    async fn paused_loop_never_queries_windows() {
        let (mut detection, calls, _rx) = make_loop(vec![Ok(true)]);
        detection.state.pause();

        for _ in 0..3 {
            assert_eq!(detection.tick().await.unwrap(), Tick::Idle);
        }
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        detection.state.resume();
        let tick = detection.tick().await.unwrap();
        assert!(matches!(tick, Tick::Polled { present: true, .. }));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn pause_preserves_mode_state() {
        let (mut detection, _calls, _rx) = make_loop(vec![Ok(true), Ok(false)]);

        detection.tick().await.unwrap();
        assert_eq!(detection.current_mode(), Some(ModeKind::Game));

        detection.state.pause();
        detection.tick().await.unwrap();
        assert_eq!(detection.current_mode(), Some(ModeKind::Game));
    }

    #[tokio::test]
    async fn tick_records_presence_on_success() {
        let (mut detection, _calls, _rx) = make_loop(vec![Ok(true)]);
        detection.tick().await.unwrap();
        assert_eq!(detection.state.last_presence(), Some(true));
    }

    #[tokio::test]
    async fn mode_changes_emit_events_once() {
        let (mut detection, _calls, mut rx) = make_loop(vec![Ok(true), Ok(true), Ok(false)]);

        detection.tick().await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::ModeChanged {
                mode: ModeKind::Game
            }
        );

        // Unchanged presence: no event.
        detection.tick().await.unwrap();
        assert!(rx.try_recv().is_err());

        detection.tick().await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::ModeChanged {
                mode: ModeKind::Desktop
            }
        );
    }

    #[tokio::test]
    async fn transient_query_failure_is_absorbed() {
        let failure = SwitchError::QueryFailed {
            tool: "wmctrl".to_string(),
            reason: "cannot open display".to_string(),
        };
        let (mut detection, _calls, _rx) = make_loop(vec![Err(failure), Ok(false)]);

        assert_eq!(detection.tick().await.unwrap(), Tick::Faulted);
        assert!(detection.last_fault().unwrap().contains("wmctrl"));
        // Presence stays unknown after a failed query.
        assert_eq!(detection.state.last_presence(), None);

        // A clean poll clears the fault.
        detection.tick().await.unwrap();
        assert_eq!(detection.last_fault(), None);
    }

    #[tokio::test]
    async fn missing_tool_ends_the_loop() {
        let (mut detection, _calls, _rx) =
            make_loop(vec![Err(SwitchError::MissingTool("wmctrl".to_string()))]);
        let err = detection.tick().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn config_swap_keeps_modes_unless_targets_change() {
        let (mut detection, _calls, _rx) = make_loop(vec![Ok(true)]);
        detection.tick().await.unwrap();
        assert_eq!(detection.current_mode(), Some(ModeKind::Game));

        // Polling parameters only: the pair survives.
        let mut faster = detection.config().clone();
        faster.check_rate = 100;
        detection.update_config(faster);
        assert_eq!(detection.current_mode(), Some(ModeKind::Game));

        // A new output target drops the pair until the next poll.
        let mut retargeted = detection.config().clone();
        retargeted.gamemode_adapter = "DP-2".to_string();
        detection.update_config(retargeted);
        assert_eq!(detection.current_mode(), None);
    }
}
