use crate::error::{BridgeError, Result};
use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;

/// Access units per acknowledgement for MediaSource playback.
/// 16 is roughly 250ms of content in a 60 fps movie.
pub const DEFAULT_ACCESS_UNIT_SIZE: usize = 16;

/// Live sources are forwarded one unit at a time.
pub const LIVE_ACCESS_UNIT_SIZE: usize = 1;

/// Default capacity of the coordinator command queue.
pub const DEFAULT_COMMAND_BUFFER: usize = 100;

const CONFIG_PATHS: [&str; 2] = ["./config.toml", "./msebridge_config.toml"];

lazy_static! {
    static ref CONFIG: RwLock<BridgeConfig> = RwLock::new(BridgeConfig::load());
}

/// Tunables for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Batch capacity used for chunked (MediaSource) playback
    pub access_unit_size: usize,
    /// Whether the Vorbis padding suffix is appended to audio units
    pub audio_padding: bool,
    /// Capacity of the bounded command channel feeding the coordinator
    pub command_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            access_unit_size: DEFAULT_ACCESS_UNIT_SIZE,
            audio_padding: true,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl BridgeConfig {
    /// Builds the configuration from defaults, then environment variables,
    /// then the first readable config file. Invalid values are logged and
    /// skipped.
    pub fn load() -> Self {
        let mut config = BridgeConfig::default();

        for (key, var) in [
            ("access_unit_size", "MSEBRIDGE_ACCESS_UNIT_SIZE"),
            ("audio_padding", "MSEBRIDGE_AUDIO_PADDING"),
            ("command_buffer", "MSEBRIDGE_COMMAND_BUFFER"),
        ] {
            if let Ok(value) = env::var(var) {
                if let Err(e) = config.apply(key, &value) {
                    log::warn!("Ignoring {}: {}", var, e);
                }
            }
        }

        for path in &CONFIG_PATHS {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    if let Err(e) = config.apply_toml_lines(&content) {
                        log::warn!("Ignoring config file {}: {}", path, e);
                    }
                    break;
                }
            }
        }

        config
    }

    /// Reads a config file, layering it over the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = BridgeConfig::default();
        config.apply_toml_lines(&content)?;
        Ok(config)
    }

    /// Applies `key = value` lines. Comments, blank lines and unknown keys are
    /// skipped.
    pub fn apply_toml_lines(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            self.apply(key.trim(), value)?;
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "access_unit_size" => {
                let size: usize = value.parse()?;
                if size == 0 {
                    return Err(BridgeError::Config(
                        "access_unit_size must be at least 1".to_string(),
                    ));
                }
                self.access_unit_size = size;
            }
            "audio_padding" => {
                self.audio_padding = match value {
                    "true" | "1" | "yes" => true,
                    "false" | "0" | "no" => false,
                    other => {
                        return Err(BridgeError::Config(format!(
                            "audio_padding expects a boolean, got {:?}",
                            other
                        )))
                    }
                };
            }
            "command_buffer" => {
                let size: usize = value.parse()?;
                if size == 0 {
                    return Err(BridgeError::Config(
                        "command_buffer must be at least 1".to_string(),
                    ));
                }
                self.command_buffer = size;
            }
            _ => {}
        }
        Ok(())
    }

    /// Reloads the process-wide configuration from the environment and files.
    pub fn reload() {
        let new_config = BridgeConfig::load();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }
}

/// Returns the process-wide configuration.
pub fn global() -> BridgeConfig {
    match CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# msebridge configuration
# This is a template. Replace the values with your actual configuration.

access_unit_size = 16
audio_padding = true
command_buffer = 100
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}
