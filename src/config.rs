//! TOML configuration with per-section defaults.
//!
//! A missing file or a missing section falls back to defaults, so the binary
//! runs with no configuration at all.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "gesture-stream.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub analysis: AnalysisConfig,
    pub push: PushConfig,
    pub models: ModelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket listener.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    /// How long one `next_frame` call waits before reporting a transient
    /// read failure.
    pub read_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            read_timeout_ms: 500,
        }
    }
}

impl CameraConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Target cadence of the analysis loop; best effort, not hard real-time.
    pub tick_ms: u64,
    /// Pause after a failed frame read before the next attempt.
    pub capture_backoff_ms: u64,
    /// Quarantine pause after an error escapes a tick.
    pub fault_backoff_ms: u64,
    /// k for the dominant-color clustering.
    pub color_clusters: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            capture_backoff_ms: 50,
            fault_backoff_ms: 1_000,
            color_clusters: crate::color::DEFAULT_CLUSTERS,
        }
    }
}

impl AnalysisConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn capture_backoff(&self) -> Duration {
        Duration::from_millis(self.capture_backoff_ms)
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_millis(self.fault_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Poll/compare cadence of the gesture push channel. Faster than color,
    /// gesture is the latency-sensitive signal.
    pub gesture_poll_ms: u64,
    /// Poll/compare cadence of the clothing-color push channel.
    pub color_poll_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            gesture_poll_ms: 200,
            color_poll_ms: 500,
        }
    }
}

impl PushConfig {
    pub fn gesture_poll(&self) -> Duration {
        Duration::from_millis(self.gesture_poll_ms)
    }

    pub fn color_poll(&self) -> Duration {
        Duration::from_millis(self.color_poll_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory the ONNX models are downloaded into.
    pub dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
        }
    }
}

impl Config {
    /// Loads the explicit path when given, otherwise `gesture-stream.toml`
    /// when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_PATH);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}
