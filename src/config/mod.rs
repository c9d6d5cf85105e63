use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// Re-export component config types
pub use crate::health::HealthConfig;
pub use crate::marker::MarkerConfig;
pub use crate::mocap::MocapConfig;
pub use crate::outlet::NatsConfig;

/// Complete hub configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub mocap: MocapConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Per-subject position streams
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_broadcast_enabled")]
    pub enabled: bool,
    /// Subject ids ("001" -> `Sub001_Position`)
    #[serde(default = "default_subject_ids")]
    pub subject_ids: Vec<String>,
}

fn default_broadcast_enabled() -> bool {
    true
}

fn default_subject_ids() -> Vec<String> {
    vec!["001".to_string(), "002".to_string()]
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: default_broadcast_enabled(),
            subject_ids: default_subject_ids(),
        }
    }
}

/// Frame ingestion tuning
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Receipt times kept for the frame rate (~5 s at 120 Hz)
    #[serde(default = "default_frame_window_capacity")]
    pub frame_window_capacity: usize,
    /// Per-entity debug lines are emitted on every Nth frame
    #[serde(default = "default_log_every_n_frames")]
    pub log_every_n_frames: u64,
}

fn default_frame_window_capacity() -> usize {
    600
}

fn default_log_every_n_frames() -> u64 {
    120
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            frame_window_capacity: default_frame_window_capacity(),
            log_every_n_frames: default_log_every_n_frames(),
        }
    }
}

/// Periodic stats logging
#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// 0 disables the reporter
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,
}

fn default_report_interval() -> u64 {
    5
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            report_interval_seconds: default_report_interval(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<HubConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: HubConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}
