use crate::frame::{FrameSample, RigidBodySample};
use crate::ingest::FramePort;
use crate::mocap::MocapClient;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest uninterrupted sleep while pacing, so shutdown is prompt
const PACING_SLICE: Duration = Duration::from_millis(10);

/// One line of a recording
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayRecord {
    Frame(FrameSample),
    RigidBody(RigidBodySample),
}

/// Replays a JSON-lines recording through the frame port at a fixed rate.
///
/// Each `frame` record is paced at `rate_hz`; `rigid_body` records are
/// delivered immediately after the preceding frame. Unparseable lines are
/// skipped with a warning.
pub struct ReplayClient {
    path: PathBuf,
    rate_hz: f64,
    loop_playback: bool,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReplayClient {
    pub fn new(path: impl Into<PathBuf>, rate_hz: f64, loop_playback: bool) -> Self {
        Self {
            path: path.into(),
            rate_hz,
            loop_playback,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Parse a recording, skipping blank and malformed lines
    pub fn load(path: &Path) -> Result<Vec<ReplayRecord>> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read recording {}", path.display()))?;

        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ReplayRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping malformed recording line"),
            }
        }
        Ok(records)
    }

    fn frame_interval(&self) -> Result<Duration> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            bail!("Replay rate must be a positive number of Hz, got {}", self.rate_hz);
        }
        Duration::try_from_secs_f64(1.0 / self.rate_hz)
            .with_context(|| format!("Replay rate {} Hz is too low", self.rate_hz))
    }
}

impl MocapClient for ReplayClient {
    fn start_streaming(&mut self, port: FramePort) -> Result<()> {
        if self.thread.is_some() {
            bail!("Replay already streaming");
        }

        let interval = self.frame_interval()?;
        let records = Self::load(&self.path)?;
        if records.is_empty() {
            bail!("Recording {} contains no records", self.path.display());
        }

        info!(
            path = %self.path.display(),
            records = records.len(),
            rate_hz = self.rate_hz,
            looping = self.loop_playback,
            "Replay streaming started"
        );

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let loop_playback = self.loop_playback;

        let handle = thread::Builder::new()
            .name("trackhub-replay".to_string())
            .spawn(move || play(records, port, running, interval, loop_playback))
            .context("Failed to spawn replay thread")?;
        self.thread = Some(handle);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Replay thread panicked");
            }
            info!("Replay streaming stopped");
        }
    }
}

impl Drop for ReplayClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn play(
    records: Vec<ReplayRecord>,
    port: FramePort,
    running: Arc<AtomicBool>,
    interval: Duration,
    loop_playback: bool,
) {
    let mut next_frame = Instant::now();
    let mut passes = 0u64;

    'outer: loop {
        for record in &records {
            if !running.load(Ordering::SeqCst) {
                break 'outer;
            }
            match record {
                ReplayRecord::Frame(frame) => {
                    if !sleep_until(next_frame, &running) {
                        break 'outer;
                    }
                    next_frame += interval;
                    port.deliver_frame(frame);
                }
                ReplayRecord::RigidBody(body) => {
                    port.deliver_rigid_body(body.id, body.position, body.rotation);
                }
            }
        }

        passes += 1;
        debug!(passes = passes, "Recording pass complete");
        if !loop_playback {
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
}

/// Sleep in short slices until `deadline`; false if stopped meanwhile
fn sleep_until(deadline: Instant, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(PACING_SLICE));
    }
}
