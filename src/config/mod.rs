// Configuration management for calliope
// Tunables live in a TOML file under the platform config dir; missing files
// fall back to defaults (and are written out for the next run). CLI flags
// override whatever was loaded.

use anyhow::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Extensions accepted by the scanner, video first.
const DEFAULT_EXTENSIONS: &str = "mp4 m4v mov mkv webm mpg ts mts m2ts m2t ogv avi wmv asf \
                                  mp3 ogg oga m4a mka wma wav aif aiff flac";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP remote-control port.
    pub port: u16,
    /// State file holding history, explicit playlist and play counts.
    pub state_file: PathBuf,
    /// How many history entries to keep, in memory and on disk.
    pub history_depth: usize,
    /// Save the state file at every played track.
    pub autosave: bool,
    /// Rescan the content root at every played track.
    pub autoscan: bool,
    /// Player exit-poll cadence.
    pub poll_interval_ms: u64,
    /// A track must play at least this long before its count bumps.
    pub min_play_secs: u64,
    /// Exits faster than this look like a crashing player.
    pub min_accepted_play_secs: f64,
    /// Consecutive fast exits before auto-playback gives up.
    pub max_unsuccessful_plays: u32,
    /// Scanner extension allow-list.
    pub extensions: Vec<String>,
    /// Run the player in fullscreen mode.
    pub fullscreen: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8088,
            state_file: PathBuf::from(".calliope_state"),
            history_depth: 250,
            autosave: cfg!(windows),
            autoscan: false,
            poll_interval_ms: 200,
            min_play_secs: 120,
            min_accepted_play_secs: 3.0,
            max_unsuccessful_plays: 5,
            extensions: DEFAULT_EXTENSIONS
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            fullscreen: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("calliope");

        Ok(config_dir.join("config.toml"))
    }
}
