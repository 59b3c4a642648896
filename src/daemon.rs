//! Daemon mode
//!
//! Runs the select loop tying together the detection ticker, the IPC
//! server, config hot reload, and signal handling.

use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::{Result, WrapErr, eyre};
use notify::{RecursiveMode, Watcher};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::detection::{DetectionLoop, DetectionState, StatusEvent};
use crate::ipc::{self, IpcServer, Request, Response, StatusReply};
use crate::logging;
use crate::mode::SystemSwitcher;
use crate::notification;
use crate::wmctrl::WmctrlObserver;

type Detector = DetectionLoop<WmctrlObserver, SystemSwitcher>;

/// Run the daemon with the given configuration
///
/// Returns when asked to stop (signal or IPC shutdown); fatal detection
/// errors (unsupported session, missing tool) end it with an error.
///
/// # Errors
/// When the configuration fails validation, another daemon already owns the
/// socket, or a fatal detection error occurs.
pub async fn run(config: Config, foreground: bool) -> Result<()> {
    let _log_guard = logging::init_daemon(foreground)?;

    config
        .validate()
        .wrap_err("configuration is not ready for the daemon")?;
    for warning in config.warnings() {
        warn!("{warning}");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "starting bptv daemon");
    info!(
        keywords = ?config.big_picture_keywords,
        interval_ms = config.check_rate,
        "watching for the big picture window"
    );

    let ipc_server = IpcServer::bind()?;
    info!(socket = %ipc_server.path().display(), "ipc server listening");

    let state = Arc::new(DetectionState::new());
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    let (config_tx, mut config_rx) = mpsc::unbounded_channel();

    spawn_notifier(event_rx);
    let _watcher = watch_config(config_tx)?;

    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut detector = DetectionLoop::new(
        Arc::clone(&state),
        WmctrlObserver,
        SystemSwitcher,
        event_tx.clone(),
        config,
    );

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .wrap_err("failed to install the SIGTERM handler")?;

    let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]);
    if let Err(e) = notification::daemon_started() {
        warn!("notification failed: {e}");
    }

    let started = Instant::now();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = detector.tick().await {
                    error!("{e}");
                    let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]);
                    return Err(e.into());
                }
            }

            Some(()) = config_rx.recv() => {
                // Editors fire several events per save; one reload covers them.
                while config_rx.try_recv().is_ok() {}
                reload(&mut detector, &mut ticker);
            }

            Some(mut stream) = ipc_server.accept() => {
                let status = StatusReply {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    uptime_secs: started.elapsed().as_secs(),
                    detection_active: state.is_active(),
                    last_presence: state.last_presence(),
                    current_mode: detector.current_mode().map(|mode| mode.label().to_string()),
                    last_fault: detector.last_fault().map(str::to_string),
                };
                let state = Arc::clone(&state);
                let events = event_tx.clone();
                let shutdown = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        handle_client(&mut stream, status, &state, &events, &shutdown).await
                    {
                        warn!("ipc request failed: {e:#}");
                    }
                });
            }

            Some(()) = shutdown_rx.recv() => {
                info!("shutdown requested via ipc");
                break;
            }

            _ = signal::ctrl_c() => {
                info!("received SIGINT");
                break;
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM");
                break;
            }
        }
    }

    let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]);
    if let Err(e) = notification::daemon_stopped() {
        warn!("notification failed: {e}");
    }
    info!("daemon stopped");
    Ok(())
}

/// Forwards status events to desktop notifications.
fn spawn_notifier(mut events: mpsc::UnboundedReceiver<StatusEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let result = match event {
                StatusEvent::ModeChanged { mode } => {
                    info!(mode = %mode, "mode changed");
                    notification::mode_changed(mode)
                }
                StatusEvent::DetectionChanged { active } => {
                    info!(active, "detection state changed");
                    notification::detection_changed(active)
                }
            };
            if let Err(e) = result {
                warn!("notification failed: {e}");
            }
        }
    });
}

/// Reloads the settings file after a watcher event. A broken or invalid
/// edit keeps the previous settings in place.
fn reload(detector: &mut Detector, ticker: &mut Interval) {
    let fresh = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("config reload failed, keeping the previous settings: {e:#}");
            return;
        }
    };
    if let Err(e) = fresh.validate() {
        warn!("edited config is invalid, keeping the previous settings: {e:#}");
        return;
    }
    for warning in fresh.warnings() {
        warn!("{warning}");
    }

    if fresh.poll_interval() != detector.config().poll_interval() {
        *ticker = tokio::time::interval(fresh.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_ms = fresh.check_rate, "poll interval updated");
    }
    detector.update_config(fresh);
    info!("configuration reloaded");
}

/// Watches the config directory for edits to the settings file.
///
/// The directory, not the file, is watched: editors that replace the file
/// on save would otherwise detach the watch.
fn watch_config(tx: mpsc::UnboundedSender<()>) -> Result<notify::RecommendedWatcher> {
    let path = Config::path()?;
    let dir = path
        .parent()
        .ok_or_else(|| eyre!("config path has no parent directory"))?
        .to_path_buf();
    std::fs::create_dir_all(&dir)
        .wrap_err_with(|| format!("failed to create config directory {}", dir.display()))?;

    let file_name = path.file_name().map(std::ffi::OsStr::to_os_string);
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        let Ok(event) = event else { return };
        let relevant = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        ) && event
            .paths
            .iter()
            .any(|p| p.file_name() == file_name.as_deref());
        if relevant {
            let _ = tx.send(());
        }
    })
    .wrap_err("failed to create config watcher")?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .wrap_err_with(|| format!("failed to watch {}", dir.display()))?;
    Ok(watcher)
}

/// Handle a single IPC request from a client
async fn handle_client(
    stream: &mut tokio::net::UnixStream,
    status: StatusReply,
    state: &DetectionState,
    events: &mpsc::UnboundedSender<StatusEvent>,
    shutdown: &mpsc::UnboundedSender<()>,
) -> Result<()> {
    let request = ipc::read_request(stream).await?;
    debug!(?request, "ipc request");

    let response = match request {
        Request::Status => Response::Status(status),

        Request::Pause => {
            if state.is_active() {
                state.pause();
                let _ = events.send(StatusEvent::DetectionChanged { active: false });
                Response::Ok {
                    message: "detection paused".to_string(),
                }
            } else {
                Response::Ok {
                    message: "detection already paused".to_string(),
                }
            }
        }

        Request::Resume => {
            if state.is_active() {
                Response::Ok {
                    message: "detection already active".to_string(),
                }
            } else {
                state.resume();
                let _ = events.send(StatusEvent::DetectionChanged { active: true });
                Response::Ok {
                    message: "detection resumed".to_string(),
                }
            }
        }

        Request::Toggle => {
            let active = state.toggle();
            let _ = events.send(StatusEvent::DetectionChanged { active });
            let message = if active {
                "detection resumed"
            } else {
                "detection paused"
            };
            Response::Ok {
                message: message.to_string(),
            }
        }

        Request::Shutdown => {
            // Reply before signalling so the client sees the confirmation.
            ipc::write_response(
                stream,
                &Response::Ok {
                    message: "daemon shutting down".to_string(),
                },
            )
            .await?;
            let _ = shutdown.send(());
            return Ok(());
        }
    };

    ipc::write_response(stream, &response).await?;
    Ok(())
}
