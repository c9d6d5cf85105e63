// Entity model and alias-aware position cache
pub mod entity;

// Decoded frame model and per-group extraction
pub mod frame;

// Frame ingestion and receipt statistics
pub mod ingest;

// Output pub/sub channels (NATS, in-memory)
pub mod outlet;

// Asynchronous event markers
pub mod marker;

// Per-subject position streams
pub mod broadcast;

// Connection status and stats
pub mod health;

// Motion-capture client seam and recording replay
pub mod mocap;

// Configuration loading
pub mod config;

// Hub facade
pub mod hub;

pub use config::{load_config, HubConfig};
pub use hub::{PositionReading, RigidBodyReading, TrackingHub};
