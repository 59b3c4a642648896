//! Configuration management
//!
//! Loads, validates, and writes back the JSON settings file. The camelCase
//! field names are the file's public interface and are shared ground with
//! the user; serde renaming keeps the Rust side idiomatic.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Type
// ============================================================================

/// Runtime settings, treated as an immutable snapshot: the detection loop
/// holds a clone and mode pairs are rebuilt from a fresh clone on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Keywords that must all appear in a window title for it to count as
    /// the big-picture window.
    pub big_picture_keywords: Vec<String>,
    /// Poll interval in milliseconds.
    pub check_rate: u64,
    /// Sink label selected in game mode.
    pub gamemode_audio: String,
    /// Sink label selected in desktop mode.
    pub desktop_audio: String,
    /// Output enabled in game mode (the TV side).
    pub gamemode_adapter: String,
    /// Output enabled in desktop mode (the monitor side).
    pub desktop_adapter: String,
    /// Skip audio switching entirely.
    pub disable_audio: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            big_picture_keywords: vec![
                "Steam".to_string(),
                "Big".to_string(),
                "Picture".to_string(),
                "mode".to_string(),
            ],
            check_rate: 1000,
            gamemode_audio: String::new(),
            desktop_audio: String::new(),
            gamemode_adapter: String::new(),
            desktop_adapter: String::new(),
            disable_audio: false,
        }
    }
}

// ============================================================================
// Load / Save
// ============================================================================

impl Config {
    /// Settings file location (`~/.config/BigPictureTV/settings.json`).
    ///
    /// # Errors
    /// When no config directory can be determined.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| eyre!("could not determine config directory"))?;
        Ok(base.join("BigPictureTV").join("settings.json"))
    }

    /// Loads the settings file, writing a default one on first run.
    ///
    /// # Errors
    /// On unreadable or malformed JSON, or when the default cannot be
    /// written.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            let config = Self::default();
            config.save_to(&path)?;

            eprintln!("Created default settings at: {}", path.display());
            eprintln!();
            eprintln!("Next steps:");
            eprintln!("  1. Run 'bptv list-sinks' to see audio outputs for gamemodeAudio/desktopAudio");
            eprintln!("  2. Set gamemodeAdapter and desktopAdapter to your display output names");
            eprintln!("  3. Run 'bptv validate' to check the settings");
            eprintln!("  4. Run 'bptv daemon' to start");
            eprintln!();

            return Ok(config);
        }
        Self::load_from_path(&path)
    }

    /// Loads settings from an explicit path.
    ///
    /// # Errors
    /// On unreadable or malformed JSON.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read settings: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("invalid settings: {}", path.display()))?;
        Ok(config)
    }

    /// Writes the settings atomically (temp file + rename) with owner-only
    /// permissions.
    ///
    /// # Errors
    /// When the directory cannot be created or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| eyre!("settings path has no parent directory"))?;
        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create config dir: {}", dir.display()))?;

        let json =
            serde_json::to_string_pretty(self).wrap_err("failed to serialize settings")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .wrap_err("failed to create temporary settings file")?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.write_all(b"\n"))
            .wrap_err("failed to write settings")?;

        let perms = {
            use std::os::unix::fs::PermissionsExt;
            fs::Permissions::from_mode(0o600)
        };
        tmp.as_file()
            .set_permissions(perms)
            .wrap_err("failed to set settings permissions")?;

        tmp.persist(path)
            .wrap_err_with(|| format!("failed to write settings: {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// Validation
// ============================================================================

impl Config {
    /// Hard requirements; the daemon refuses to start while any is unmet.
    ///
    /// # Errors
    /// Names the offending field and what to put there.
    pub fn validate(&self) -> Result<()> {
        if self.check_rate == 0 {
            bail!("checkRate must be at least 1 millisecond");
        }
        if self.gamemode_adapter.is_empty() {
            bail!("gamemodeAdapter is empty. Set it to the output to enable in game mode (e.g. HDMI-1)");
        }
        if self.desktop_adapter.is_empty() {
            bail!("desktopAdapter is empty. Set it to the output to enable in desktop mode (e.g. eDP-1)");
        }
        if self.gamemode_adapter == self.desktop_adapter {
            bail!(
                "gamemodeAdapter and desktopAdapter both name '{}'. The two modes must drive different outputs",
                self.gamemode_adapter
            );
        }
        Ok(())
    }

    /// Soft findings worth a warning but not a refusal.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.big_picture_keywords.is_empty() {
            warnings.push(
                "bigPictureKeywords is empty: every open window counts as the big-picture window"
                    .to_string(),
            );
        }
        if !self.disable_audio {
            if self.gamemode_audio.is_empty() {
                warnings.push(
                    "gamemodeAudio is empty: the first sink pactl reports will be picked in game mode"
                        .to_string(),
                );
            }
            if self.desktop_audio.is_empty() {
                warnings.push(
                    "desktopAudio is empty: the first sink pactl reports will be picked in desktop mode"
                        .to_string(),
                );
            }
        }
        warnings
    }

    /// Whether a reload needs the mode pair rebuilt, i.e. output or audio
    /// targets changed rather than polling parameters.
    #[must_use]
    pub fn modes_differ(&self, other: &Self) -> bool {
        self.gamemode_adapter != other.gamemode_adapter
            || self.desktop_adapter != other.desktop_adapter
            || self.gamemode_audio != other.gamemode_audio
            || self.desktop_audio != other.desktop_audio
            || self.disable_audio != other.disable_audio
    }

    /// Poll interval as a duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.check_rate)
    }

    /// Human-readable settings dump for the `validate` command.
    pub fn print_summary(&self) {
        println!("Settings:");
        println!("  bigPictureKeywords: {:?}", self.big_picture_keywords);
        println!("  checkRate: {} ms", self.check_rate);
        println!("  gamemodeAdapter: {}", display_or(&self.gamemode_adapter));
        println!("  desktopAdapter: {}", display_or(&self.desktop_adapter));
        if self.disable_audio {
            println!("  audio switching: disabled");
        } else {
            println!("  gamemodeAudio: {}", display_or(&self.gamemode_audio));
            println!("  desktopAudio: {}", display_or(&self.desktop_audio));
        }
        if let Ok(path) = Self::path() {
            println!("\nSettings file: {}", path.display());
        }
    }
}

fn display_or(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}
