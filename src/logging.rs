//! Log output setup.
//!
//! CLI commands log to the console; the daemon writes to a size-capped file
//! under `~/.local/share/BigPictureTV/`, rotating the previous contents to
//! `daemon.log.old`. With `--foreground` the daemon logs to stderr instead.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use color_eyre::eyre::{Result, eyre};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Size the daemon log may reach before it is rotated out.
const LOG_ROTATE_BYTES: u64 = 5 * 1024 * 1024;

/// Daemon log location (`~/.local/share/BigPictureTV/daemon.log`).
///
/// # Errors
/// When no data directory can be determined.
pub fn log_file_path() -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| eyre!("could not determine data directory"))?;
    Ok(base.join("BigPictureTV").join("daemon.log"))
}

/// Console logging for one-shot commands. `RUST_LOG` overrides the default
/// `warn` filter.
pub fn init_cli() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
}

/// Daemon logging: stderr in foreground mode, the rotating log file
/// otherwise. The returned guard must live as long as the daemon; dropping
/// it flushes and stops the background log writer.
///
/// # Errors
/// When the log file location cannot be determined.
pub fn init_daemon(foreground: bool) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bptv=info"));

    if foreground {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let appender = RotatingLogWriter::new(log_file_path()?, LOG_ROTATE_BYTES);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

// ============================================================================
// Rotating log file
// ============================================================================

/// A log file writer that keeps at most two files: the active log and the
/// previously rotated one (`<name>.old`).
///
/// Rotation happens when the active file reaches the size cap. Files are
/// created with mode 0o600, and the writer re-creates the active file if it
/// is deleted out from under it.
pub struct RotatingLogWriter {
    path: PathBuf,
    backup_path: PathBuf,
    max_bytes: u64,
    file: Mutex<Option<File>>,
}

impl RotatingLogWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        let path = path.into();
        let backup_path = path.with_extension("log.old");
        Self {
            path,
            backup_path,
            max_bytes,
            file: Mutex::new(None),
        }
    }

    fn open_secure(path: &std::path::Path, append: bool) -> io::Result<File> {
        let mut options = fs::OpenOptions::new();
        options.create(true).write(true);
        if append {
            options.append(true);
        } else {
            options.truncate(true);
        }
        #[cfg(unix)]
        {
            options.mode(0o600);
        }
        options.open(path)
    }

    /// Hands out the active file, opening or re-creating it as needed.
    fn active<'a>(&self, guard: &'a mut Option<File>) -> io::Result<&'a mut File> {
        // Handles external deletion of the log file.
        if !self.path.exists() {
            *guard = None;
        }
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            *guard = Some(Self::open_secure(&self.path, true)?);
        }
        guard
            .as_mut()
            .ok_or_else(|| io::Error::other("log file handle unavailable"))
    }

    /// Renames the active file to the backup and starts a fresh one.
    fn rotate(&self, guard: &mut Option<File>) -> io::Result<()> {
        *guard = None;
        if self.path.exists() {
            fs::rename(&self.path, &self.backup_path)?;
        }
        *guard = Some(Self::open_secure(&self.path, false)?);
        Ok(())
    }
}

impl Write for RotatingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(format!("log mutex poisoned: {e}")))?;

        let current_size = self
            .active(&mut guard)
            .and_then(|file| file.metadata())
            .map_or(0, |meta| meta.len());

        if current_size >= self.max_bytes
            && let Err(e) = self.rotate(&mut guard)
        {
            // Keep logging into the oversized file rather than dropping output.
            eprintln!("failed to rotate log file: {e}");
        }

        let file = self.active(&mut guard)?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(format!("log mutex poisoned: {e}")))?;
        if let Some(file) = guard.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rotates_once_past_the_size_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daemon.log");
        let mut writer = RotatingLogWriter::new(&path, 32);

        writer
            .write_all(b"first line, long enough to cross the cap\n")
            .unwrap();
        writer.write_all(b"second\n").unwrap();

        let backup = dir.path().join("daemon.log.old");
        assert!(backup.exists());
        assert_eq!(
            fs::read_to_string(&backup).unwrap(),
            "first line, long enough to cross the cap\n"
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn stays_on_one_file_below_the_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daemon.log");
        let mut writer = RotatingLogWriter::new(&path, 1024);

        writer.write_all(b"a\n").unwrap();
        writer.write_all(b"b\n").unwrap();

        assert!(!dir.path().join("daemon.log.old").exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn reopens_after_external_deletion() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daemon.log");
        let mut writer = RotatingLogWriter::new(&path, 1024);

        writer.write_all(b"before\n").unwrap();
        fs::remove_file(&path).unwrap();
        writer.write_all(b"after\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "after\n");
    }

    #[test]
    #[cfg(unix)]
    fn creates_the_log_file_privately() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daemon.log");
        let mut writer = RotatingLogWriter::new(&path, 1024);
        writer.write_all(b"x\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
