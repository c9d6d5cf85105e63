// Asynchronous event-marker publishing

use crate::outlet::{Outlet, OutletFactory, Sample, StreamInfo};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[cfg(test)]
mod tests;

/// Marker publisher configuration
#[derive(Clone, Debug, Deserialize)]
pub struct MarkerConfig {
    /// Maximum markers waiting to be published
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long `stop()` waits for the worker to drain the queue
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
    #[serde(default = "default_source_id")]
    pub source_id: String,
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_join_timeout_ms() -> u64 {
    1000
}

fn default_stream_name() -> String {
    "Navigation_Markers".to_string()
}

fn default_source_id() -> String {
    "navigation_ttl_markers".to_string()
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            join_timeout_ms: default_join_timeout_ms(),
            stream_name: default_stream_name(),
            source_id: default_source_id(),
        }
    }
}

/// Queued marker awaiting publication
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerEvent {
    /// Application-defined event code
    pub code: i32,
    pub description: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// Decouples marker requests from the network publish call.
///
/// `enqueue` never blocks: it hands the marker to a bounded queue drained by a
/// single worker task, so markers reach the sink in enqueue order. Without an
/// outlet (degraded mode) the worker only logs each marker.
pub struct MarkerPublisher {
    config: MarkerConfig,

    outlet: RwLock<Option<Arc<dyn Outlet>>>,

    /// Set when the marker outlet could not be created
    degraded: AtomicBool,

    /// Present only while running
    sender: Mutex<Option<mpsc::Sender<MarkerEvent>>>,

    worker: Mutex<Option<JoinHandle<()>>>,

    dropped: AtomicU64,

    published: Arc<AtomicU64>,
}

impl MarkerPublisher {
    pub fn new(config: MarkerConfig) -> Self {
        Self {
            config,
            outlet: RwLock::new(None),
            degraded: AtomicBool::new(false),
            sender: Mutex::new(None),
            worker: Mutex::new(None),
            dropped: AtomicU64::new(0),
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create the marker outlet. Without a factory, or if creation fails, the
    /// publisher enters degraded mode; either way the publisher stays usable.
    pub fn initialize(&self, factory: Option<&dyn OutletFactory>) {
        let Some(factory) = factory else {
            warn!("No pub/sub sink available, markers will only be logged (degraded mode)");
            self.attach_outlet(None);
            return;
        };

        let info = StreamInfo::markers(&self.config.stream_name, &self.config.source_id);
        match factory.create_outlet(info) {
            Ok(outlet) => {
                info!(stream = %self.config.stream_name, "Marker outlet created");
                self.attach_outlet(Some(outlet));
            }
            Err(e) => {
                error!(
                    stream = %self.config.stream_name,
                    error = %e,
                    "Marker outlet creation failed, entering degraded mode"
                );
                self.attach_outlet(None);
            }
        }
    }

    /// Set the outlet used by the next `start()`; `None` means degraded mode
    pub fn attach_outlet(&self, outlet: Option<Arc<dyn Outlet>>) {
        self.degraded.store(outlet.is_none(), Ordering::SeqCst);
        *self.outlet.write() = outlet;
    }

    /// Spawn the worker task. Requires a tokio runtime context.
    ///
    /// Returns false if a worker is already running.
    pub fn start(&self) -> bool {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            warn!("Marker worker already running");
            return false;
        }

        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let outlet = self.outlet.read().clone();
        let degraded = outlet.is_none();
        let handle = tokio::spawn(run_worker(rx, outlet, Arc::clone(&self.published)));

        *sender = Some(tx);
        *self.worker.lock() = Some(handle);

        info!(
            capacity = self.config.queue_capacity,
            degraded = degraded,
            "Marker worker started"
        );
        true
    }

    /// Queue a marker code for publication
    pub fn enqueue(&self, code: i32) -> bool {
        self.push_event(code, None)
    }

    /// Queue a marker code with a human-readable meaning for the log
    pub fn enqueue_with_description(&self, code: i32, description: impl Into<String>) -> bool {
        self.push_event(code, Some(description.into()))
    }

    fn push_event(&self, code: i32, description: Option<String>) -> bool {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            warn!(code = code, "Marker worker not running, marker rejected");
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        let event = MarkerEvent {
            code,
            description,
            enqueued_at: Utc::now(),
        };

        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    code = event.code,
                    capacity = self.config.queue_capacity,
                    "Marker queue full, marker dropped"
                );
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(code = event.code, "Marker worker exited, marker rejected");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Close the queue and wait (bounded) for the worker to drain it.
    /// Markers still queued when the wait expires are discarded.
    pub async fn stop(&self) {
        let pending = self.queue_len();
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        // Dropping the only sender lets the worker finish once the queue is empty
        drop(sender);

        let Some(mut handle) = self.worker.lock().take() else {
            return;
        };

        let timeout = Duration::from_millis(self.config.join_timeout_ms);
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => info!(drained = pending, "Marker worker stopped"),
            Ok(Err(e)) => error!(error = %e, "Marker worker failed"),
            Err(_) => {
                handle.abort();
                warn!(
                    timeout_ms = self.config.join_timeout_ms,
                    "Marker worker did not drain in time, remaining markers discarded"
                );
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// True when markers are only logged, never published
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn has_outlet(&self) -> bool {
        self.outlet.read().is_some()
    }

    /// Markers currently waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }

    pub fn capacity(&self) -> usize {
        self.config.queue_capacity
    }

    /// Enqueue calls rejected (queue full or worker stopped)
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Markers successfully handed to the outlet
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// Single consumer: drains the queue in FIFO order until every sender is gone
async fn run_worker(
    mut rx: mpsc::Receiver<MarkerEvent>,
    outlet: Option<Arc<dyn Outlet>>,
    published: Arc<AtomicU64>,
) {
    while let Some(event) = rx.recv().await {
        let description = event.description.as_deref().unwrap_or("");
        let latency_ms = (Utc::now() - event.enqueued_at).num_milliseconds();

        match &outlet {
            Some(outlet) => match outlet.push(Sample::Int32(vec![event.code])) {
                Ok(()) => {
                    published.fetch_add(1, Ordering::Relaxed);
                    info!(
                        code = event.code,
                        description = description,
                        latency_ms = latency_ms,
                        "Marker published"
                    );
                }
                Err(e) => {
                    error!(code = event.code, error = %e, "Marker publish failed");
                }
            },
            None => {
                info!(
                    code = event.code,
                    description = description,
                    "[degraded] Marker logged, not published"
                );
            }
        }
    }
}

impl Drop for MarkerPublisher {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            handle.abort();
        }
    }
}
