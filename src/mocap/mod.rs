// Motion-capture client seam

mod replay;

pub use replay::{ReplayClient, ReplayRecord};

use crate::ingest::FramePort;
use serde::Deserialize;
use std::path::PathBuf;

/// Motion-capture connection settings
#[derive(Clone, Debug, Deserialize)]
pub struct MocapConfig {
    #[serde(default = "default_server_address")]
    pub server_address: String,
    #[serde(default = "default_client_address")]
    pub client_address: String,
    #[serde(default = "default_use_multicast")]
    pub use_multicast: bool,
    /// JSON-lines recording to replay instead of a live server
    #[serde(default)]
    pub replay_file: Option<PathBuf>,
    #[serde(default = "default_replay_rate_hz")]
    pub replay_rate_hz: f64,
    /// Restart the recording from the top when it ends
    #[serde(default)]
    pub loop_playback: bool,
}

fn default_server_address() -> String {
    "192.168.3.58".to_string()
}

fn default_client_address() -> String {
    "192.168.3.55".to_string()
}

fn default_use_multicast() -> bool {
    true
}

fn default_replay_rate_hz() -> f64 {
    120.0
}

impl Default for MocapConfig {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            client_address: default_client_address(),
            use_multicast: default_use_multicast(),
            replay_file: None,
            replay_rate_hz: default_replay_rate_hz(),
            loop_playback: false,
        }
    }
}

/// Source of frames and rigid-body samples.
///
/// Implementations deliver through the port on their own thread; the hub
/// never polls them.
pub trait MocapClient: Send {
    /// Connect and begin delivering to `port`. Failure leaves the hub running
    /// with ingestion reported as not live.
    fn start_streaming(&mut self, port: FramePort) -> anyhow::Result<()>;

    fn is_connected(&self) -> bool;

    /// Stop delivery; must be safe to call more than once
    fn shutdown(&mut self);
}
