use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, TerpError};
use crate::language::Language;

const fn default_channel_capacity() -> usize {
    64
}

fn default_server_url() -> String {
    "ws://127.0.0.1:5001/stream".to_string()
}

fn default_transcript_path() -> String {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join("transcript.txt").to_string_lossy().to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub language: Language,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Input device name; `None` selects the system default.
    pub device: Option<String>,

    /// Capacity of the bounded block channel between the audio callback
    /// and the control loop. Blocks are dropped when it fills.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Directory for per-utterance WAV debug dumps. Disabled when unset.
    pub dump_dir: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            channel_capacity: default_channel_capacity(),
            dump_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Where `export` writes the plain-text transcript.
    #[serde(default = "default_transcript_path")]
    pub transcript_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            transcript_path: default_transcript_path(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            // Everything has a default, so a missing config file just means
            // defaults, unlike a present-but-broken one, which is an error.
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            TerpError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;

        let config: Self = serde_yaml_ng::from_str(&contents).map_err(|e| {
            TerpError::Config(format!(
                "failed to parse config file {}: {e}",
                path.display()
            ))
        })?;

        Ok(config)
    }

    #[must_use]
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        config_dir.join("terp/config.yaml")
    }

    /// Expand `~` in a path string to the user's home directory.
    #[must_use]
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    /// Write `audio.device` into the config file, preserving other keys.
    pub fn set_audio_device(path: &Path, device: &str) -> Result<()> {
        use serde_yaml_ng::{Mapping, Value};

        let mut root: Mapping = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                TerpError::Config(format!("failed to read config file {}: {e}", path.display()))
            })?;
            serde_yaml_ng::from_str(&contents).map_err(|e| {
                TerpError::Config(format!(
                    "failed to parse config file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            Mapping::new()
        };

        let audio = root
            .entry(Value::String("audio".to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()))
            .as_mapping_mut()
            .ok_or_else(|| TerpError::Config("audio section is not a mapping".to_string()))?;
        audio.insert(
            Value::String("device".to_string()),
            Value::String(device.to_string()),
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TerpError::Config(format!(
                    "failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let yaml = serde_yaml_ng::to_string(&Value::Mapping(root))
            .map_err(|e| TerpError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, yaml).map_err(|e| {
            TerpError::Config(format!(
                "failed to write config file {}: {e}",
                path.display()
            ))
        })?;

        Ok(())
    }
}
