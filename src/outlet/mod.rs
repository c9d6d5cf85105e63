// Output pub/sub channels (marker stream, per-subject position streams)

pub mod memory;
pub mod nats;

pub use memory::{MemoryOutlet, MemoryOutletFactory};
pub use nats::{NatsConfig, NatsOutletFactory};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Element type carried by every channel of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelFormat {
    Int32,
    Float32,
}

/// Per-channel description published with the stream metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelDesc {
    pub label: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_system: Option<String>,
}

/// Declaration of a named output stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,

    /// Content type (e.g. "Markers", "MoCap")
    #[serde(rename = "type")]
    pub stream_type: String,

    pub channel_count: usize,

    /// 0 for irregular-rate streams
    pub nominal_rate: f64,

    pub format: ChannelFormat,

    pub source_id: String,

    #[serde(default)]
    pub channels: Vec<ChannelDesc>,

    /// Acquisition metadata (manufacturer, protocol, ...)
    #[serde(default)]
    pub acquisition: BTreeMap<String, String>,
}

impl StreamInfo {
    /// Single int32 channel carrying event codes
    pub fn markers(name: &str, source_id: &str) -> Self {
        Self {
            name: name.to_string(),
            stream_type: "Markers".to_string(),
            channel_count: 1,
            nominal_rate: 0.0,
            format: ChannelFormat::Int32,
            source_id: source_id.to_string(),
            channels: vec![ChannelDesc {
                label: "TTL_Code".to_string(),
                unit: String::new(),
                kind: "marker".to_string(),
                coordinate_system: None,
            }],
            acquisition: BTreeMap::new(),
        }
    }

    /// X/Y/Z float32 position stream for one subject (`subject_id` like "001")
    pub fn subject_position(subject_id: &str) -> Self {
        let subject = format!("Sub{}", subject_id);
        let channels = ["X", "Y", "Z"]
            .iter()
            .map(|axis| ChannelDesc {
                label: format!("Position_{}", axis),
                unit: "meters".to_string(),
                kind: "Position".to_string(),
                coordinate_system: Some("Motive_World".to_string()),
            })
            .collect();

        let acquisition = [
            ("manufacturer", "OptiTrack".to_string()),
            ("system", "Motive".to_string()),
            ("protocol", "NatNet".to_string()),
            ("subject_id", subject.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            name: format!("{}_Position", subject),
            stream_type: "MoCap".to_string(),
            channel_count: 3,
            nominal_rate: 0.0,
            format: ChannelFormat::Float32,
            source_id: format!("optitrack_sub{}", subject_id),
            channels,
            acquisition,
        }
    }

    /// Reject samples whose type or width doesn't match the declaration
    pub fn check_sample(&self, sample: &Sample) -> Result<(), OutletError> {
        if sample.format() != self.format {
            return Err(OutletError::FormatMismatch {
                stream: self.name.clone(),
                expected: self.format,
                got: sample.format(),
            });
        }
        if sample.len() != self.channel_count {
            return Err(OutletError::ChannelCountMismatch {
                stream: self.name.clone(),
                expected: self.channel_count,
                got: sample.len(),
            });
        }
        Ok(())
    }
}

/// One multi-channel sample
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Sample {
    Int32(Vec<i32>),
    Float32(Vec<f32>),
}

impl Sample {
    pub fn format(&self) -> ChannelFormat {
        match self {
            Sample::Int32(_) => ChannelFormat::Int32,
            Sample::Float32(_) => ChannelFormat::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Sample::Int32(values) => values.len(),
            Sample::Float32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outlet push errors
#[derive(Debug, Clone, PartialEq)]
pub enum OutletError {
    FormatMismatch {
        stream: String,
        expected: ChannelFormat,
        got: ChannelFormat,
    },
    ChannelCountMismatch {
        stream: String,
        expected: usize,
        got: usize,
    },
    /// Outlet's send buffer is full; the sample was dropped
    Full(String),
    /// Outlet was shut down
    Closed(String),
    Encode(String),
    /// Sink refused the sample
    Rejected(String),
}

impl fmt::Display for OutletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutletError::FormatMismatch {
                stream,
                expected,
                got,
            } => write!(
                f,
                "stream '{}' expects {:?} samples, got {:?}",
                stream, expected, got
            ),
            OutletError::ChannelCountMismatch {
                stream,
                expected,
                got,
            } => write!(
                f,
                "stream '{}' expects {} channels, got {}",
                stream, expected, got
            ),
            OutletError::Full(stream) => write!(f, "outlet '{}' send buffer full", stream),
            OutletError::Closed(stream) => write!(f, "outlet '{}' is closed", stream),
            OutletError::Encode(msg) => write!(f, "failed to encode sample: {}", msg),
            OutletError::Rejected(msg) => write!(f, "sample rejected: {}", msg),
        }
    }
}

impl std::error::Error for OutletError {}

/// A declared output stream.
///
/// `push` must not block: it is called from the frame-delivery thread.
pub trait Outlet: Send + Sync {
    fn info(&self) -> &StreamInfo;

    fn push(&self, sample: Sample) -> Result<(), OutletError>;
}

/// Creates outlets on the pub/sub network
pub trait OutletFactory: Send + Sync {
    fn create_outlet(&self, info: StreamInfo) -> Result<Arc<dyn Outlet>>;
}
