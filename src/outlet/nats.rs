use crate::outlet::{Outlet, OutletError, OutletFactory, Sample, StreamInfo};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    /// When false the hub runs without a pub/sub sink (degraded mode)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Samples buffered per outlet before pushes start failing
    #[serde(default = "default_outlet_buffer")]
    pub outlet_buffer: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_subject_prefix() -> String {
    "trackhub".to_string()
}

fn default_outlet_buffer() -> usize {
    1024
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            url: default_url(),
            subject_prefix: default_subject_prefix(),
            outlet_buffer: default_outlet_buffer(),
        }
    }
}

/// Published once per outlet on `<prefix>.meta.<source_id>`
#[derive(Serialize)]
struct StreamDescriptor<'a> {
    session_id: Uuid,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    info: &'a StreamInfo,
}

/// Published per sample on `<prefix>.<stream name>`
#[derive(Serialize)]
struct SamplePayload<'a> {
    stream: &'a str,
    timestamp_ms: i64,
    values: &'a Sample,
}

/// Creates outlets backed by NATS core publish
pub struct NatsOutletFactory {
    client: async_nats::Client,
    runtime: Handle,
    config: NatsConfig,
    session_id: Uuid,
}

impl NatsOutletFactory {
    /// Connect to NATS. Must be called from within a tokio runtime; outlet
    /// forwarders are spawned onto that runtime.
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        let session_id = Uuid::now_v7();
        info!(session_id = %session_id, "Connected to NATS");

        Ok(Self {
            client,
            runtime: Handle::current(),
            config,
            session_id,
        })
    }

    /// Identifies this hub run in every stream descriptor
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn sample_subject(&self, info: &StreamInfo) -> String {
        format!("{}.{}", self.config.subject_prefix, info.name)
    }

    pub fn metadata_subject(&self, info: &StreamInfo) -> String {
        format!("{}.meta.{}", self.config.subject_prefix, info.source_id)
    }
}

impl OutletFactory for NatsOutletFactory {
    fn create_outlet(&self, info: StreamInfo) -> Result<Arc<dyn Outlet>> {
        if matches!(
            self.client.connection_state(),
            async_nats::connection::State::Disconnected
        ) {
            bail!("NATS connection to {} is down", self.config.url);
        }

        let descriptor = serde_json::to_vec(&StreamDescriptor {
            session_id: self.session_id,
            created_at: Utc::now(),
            info: &info,
        })
        .context("Failed to serialize stream descriptor")?;

        let sample_subject = self.sample_subject(&info);
        let metadata_subject = self.metadata_subject(&info);
        let (tx, rx) = mpsc::channel(self.config.outlet_buffer.max(1));

        self.runtime.spawn(forward_samples(
            self.client.clone(),
            metadata_subject,
            descriptor,
            sample_subject.clone(),
            rx,
        ));

        info!(
            stream = %info.name,
            subject = %sample_subject,
            channels = info.channel_count,
            "Created NATS outlet"
        );

        Ok(Arc::new(NatsOutlet { info, tx }))
    }
}

/// Publishes queued samples in order until the outlet is dropped
async fn forward_samples(
    client: async_nats::Client,
    metadata_subject: String,
    descriptor: Vec<u8>,
    subject: String,
    mut rx: mpsc::Receiver<Vec<u8>>,
) {
    if let Err(e) = client.publish(metadata_subject.clone(), descriptor.into()).await {
        warn!(subject = %metadata_subject, error = %e, "Failed to publish stream descriptor");
    }

    while let Some(payload) = rx.recv().await {
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            warn!(subject = %subject, error = %e, "Failed to publish sample");
        }
    }

    debug!(subject = %subject, "Outlet dropped, forwarder exiting");
}

struct NatsOutlet {
    info: StreamInfo,
    tx: mpsc::Sender<Vec<u8>>,
}

impl Outlet for NatsOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push(&self, sample: Sample) -> Result<(), OutletError> {
        self.info.check_sample(&sample)?;

        let payload = serde_json::to_vec(&SamplePayload {
            stream: &self.info.name,
            timestamp_ms: Utc::now().timestamp_millis(),
            values: &sample,
        })
        .map_err(|e| OutletError::Encode(e.to_string()))?;

        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => OutletError::Full(self.info.name.clone()),
            TrySendError::Closed(_) => OutletError::Closed(self.info.name.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_payload_shape() {
        let sample = Sample::Float32(vec![1.5, 0.0, -2.0]);
        let payload = SamplePayload {
            stream: "Sub001_Position",
            timestamp_ms: 1_700_000_000_000,
            values: &sample,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["stream"], "Sub001_Position");
        assert_eq!(json["values"], serde_json::json!([1.5, 0.0, -2.0]));
    }

    #[test]
    fn test_descriptor_flattens_stream_info() {
        let info = StreamInfo::subject_position("001");
        let descriptor = StreamDescriptor {
            session_id: Uuid::now_v7(),
            created_at: Utc::now(),
            info: &info,
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["name"], "Sub001_Position");
        assert_eq!(json["source_id"], "optitrack_sub001");
        assert!(json.get("session_id").is_some());
    }

    #[test]
    fn test_default_config() {
        let config = NatsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.subject_prefix, "trackhub");
        assert_eq!(config.outlet_buffer, 1024);
    }
}
