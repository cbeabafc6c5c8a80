//! Fixed-cadence simulation clock.
//!
//! One dedicated OS thread per run constructs the simulation, then loops:
//! latch input, step, resolve collisions, render, encode, publish. The thread
//! checks the shared run state once per tick boundary, so a stop request takes
//! effect after the tick in progress completes.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::channel::{BroadcastChannel, StreamEvent};
use super::encoder::FrameEncoder;
use super::snapshot::SnapshotBuilder;
use crate::config::Config;
use crate::game::{InputSource, RenderBuffer, SimError, Simulation, SimulationFactory};
use crate::input::InputBridge;

/// Largest delta handed to the simulation after a stall
const MAX_DELTA: Duration = Duration::from_millis(250);

/// Process-wide clock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockRunState {
    Idle,
    Running,
    Stopping,
}

impl ClockRunState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ClockRunState::Running,
            2 => ClockRunState::Stopping,
            _ => ClockRunState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ClockRunState::Idle => 0,
            ClockRunState::Running => 1,
            ClockRunState::Stopping => 2,
        }
    }
}

/// State shared between the clock thread and everyone observing it
#[derive(Debug, Default)]
pub struct ClockStatus {
    run_state: AtomicU8,
    ticks: AtomicU64,
    frames_encoded: AtomicU64,
    tick_errors: AtomicU64,
    encode_errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ClockStatus {
    pub fn run_state(&self) -> ClockRunState {
        ClockRunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    pub(crate) fn set_run_state(&self, state: ClockRunState) {
        self.run_state.store(state.as_u8(), Ordering::Release);
    }

    /// `Running -> Stopping`. Returns false if the clock was not running.
    pub fn request_stop(&self) -> bool {
        self.run_state
            .compare_exchange(
                ClockRunState::Running.as_u8(),
                ClockRunState::Stopping.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded.load(Ordering::Relaxed)
    }

    pub fn tick_errors(&self) -> u64 {
        self.tick_errors.load(Ordering::Relaxed)
    }

    pub fn encode_errors(&self) -> u64 {
        self.encode_errors.load(Ordering::Relaxed)
    }

    /// Last fatal error (failed start or terminated simulation)
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub(crate) fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock() = error;
    }
}

/// Clock timing and output settings
#[derive(Debug, Clone)]
pub struct ClockSettings {
    pub tick_period: Duration,
    pub snapshot_every_ticks: u32,
    pub error_backoff: Duration,
    pub width: u32,
    pub height: u32,
    pub encoder: FrameEncoder,
}

impl From<&Config> for ClockSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick_period: config.tick_period(),
            snapshot_every_ticks: config.snapshot_every_ticks,
            error_backoff: config.tick_error_backoff,
            width: config.frame_width,
            height: config.frame_height,
            encoder: FrameEncoder::new(config.frame_format, config.frame_quality),
        }
    }
}

/// Why the clock could not enter `Running`
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error("Failed to spawn clock thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Clock thread exited before reporting readiness")]
    WorkerLost,
}

/// Per-tick failures that skip the rest of the tick
#[derive(Debug, thiserror::Error)]
enum TickError {
    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error("Simulation panicked: {0}")]
    Panicked(String),
}

/// Handle to a running clock thread
#[derive(Debug)]
pub struct ClockWorker {
    handle: thread::JoinHandle<()>,
}

impl ClockWorker {
    /// Wait for the thread to exit without blocking the async runtime
    pub async fn join(self) {
        let joined = tokio::task::spawn_blocking(move || self.handle.join()).await;
        if !matches!(joined, Ok(Ok(()))) {
            error!("Clock thread terminated abnormally");
        }
    }
}

pub struct SimulationClock {
    settings: ClockSettings,
    factory: Arc<dyn SimulationFactory>,
    bridge: Arc<InputBridge>,
    channel: Arc<BroadcastChannel>,
    status: Arc<ClockStatus>,
}

impl SimulationClock {
    pub fn new(
        settings: ClockSettings,
        factory: Arc<dyn SimulationFactory>,
        bridge: Arc<InputBridge>,
        channel: Arc<BroadcastChannel>,
        status: Arc<ClockStatus>,
    ) -> Self {
        Self {
            settings,
            factory,
            bridge,
            channel,
            status,
        }
    }

    /// Spawn the clock thread and wait until the simulation is constructed.
    ///
    /// On success the run state is `Running`. On failure it stays `Idle` and
    /// the error is recorded on the status.
    pub async fn start(self) -> Result<ClockWorker, StartError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let status = self.status.clone();

        let handle = thread::Builder::new()
            .name("sim-clock".to_string())
            .spawn(move || self.run(ready_tx))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(ClockWorker { handle }),
            Ok(Err(e)) => {
                let _ = tokio::task::spawn_blocking(move || handle.join()).await;
                Err(StartError::Simulation(e))
            }
            Err(_) => {
                status.set_run_state(ClockRunState::Idle);
                status.set_last_error(Some(StartError::WorkerLost.to_string()));
                Err(StartError::WorkerLost)
            }
        }
    }

    fn run(self, ready: oneshot::Sender<Result<(), SimError>>) {
        let input: Arc<dyn InputSource> = self.bridge.clone();
        let sim = match self.factory.create(input) {
            Ok(sim) => sim,
            Err(e) => {
                error!(error = %e, game = self.factory.name(), "Simulation failed to initialize");
                self.status.set_last_error(Some(e.to_string()));
                self.status.set_run_state(ClockRunState::Idle);
                let _ = ready.send(Err(e));
                return;
            }
        };

        self.status.set_last_error(None);
        self.status.set_run_state(ClockRunState::Running);
        let _ = ready.send(Ok(()));
        info!(
            game = self.factory.name(),
            tick_ms = self.settings.tick_period.as_millis() as u64,
            "Clock running"
        );

        self.tick_loop(sim);

        self.bridge.reset();
        self.status.set_run_state(ClockRunState::Idle);
        info!(ticks = self.status.ticks(), "Clock stopped");
    }

    fn tick_loop(&self, mut sim: Box<dyn Simulation>) {
        let period = self.settings.tick_period;
        let mut buffer = RenderBuffer::new(self.settings.width, self.settings.height);
        let snapshots = SnapshotBuilder::new(self.settings.snapshot_every_ticks);
        let mut tick: u64 = 0;
        let mut next_deadline = Instant::now();
        let mut last_start: Option<Instant> = None;

        while self.status.run_state() == ClockRunState::Running {
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            }

            // An overrun tick pushes the schedule back instead of bursting
            let started = Instant::now();
            next_deadline = started + period;
            let dt = last_start
                .map(|prev| started.duration_since(prev).min(MAX_DELTA))
                .unwrap_or(period);
            last_start = Some(started);

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                self.tick(sim.as_mut(), &mut buffer, &snapshots, tick, dt)
            }))
            .unwrap_or_else(|payload| Err(TickError::Panicked(panic_message(payload))));

            tick += 1;
            self.status.ticks.fetch_add(1, Ordering::Relaxed);

            match result {
                Ok(()) => {}
                Err(TickError::Simulation(e)) if e.is_fatal() => {
                    error!(tick, error = %e, "Simulation cannot continue, stopping clock");
                    self.status.set_last_error(Some(e.to_string()));
                    self.status.request_stop();
                }
                Err(e) => {
                    self.status.tick_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(tick, error = %e, "Tick failed, backing off");
                    thread::sleep(self.settings.error_backoff);
                }
            }
        }

        debug!(tick, "Tearing down simulation");
        drop(sim);
    }

    fn tick(
        &self,
        sim: &mut dyn Simulation,
        buffer: &mut RenderBuffer,
        snapshots: &SnapshotBuilder,
        tick: u64,
        dt: Duration,
    ) -> Result<(), TickError> {
        self.bridge.latch();

        sim.step(dt.as_secs_f32())?;
        sim.resolve_collisions()?;
        sim.render(buffer)?;

        match self.settings.encoder.encode(buffer, tick) {
            Ok(frame) => {
                self.status.frames_encoded.fetch_add(1, Ordering::Relaxed);
                self.channel.broadcast(StreamEvent::Frame(frame));
            }
            Err(e) => {
                // No frame this cycle; the snapshot below still goes out
                self.status.encode_errors.fetch_add(1, Ordering::Relaxed);
                warn!(tick, error = %e, "Frame encoding failed");
            }
        }

        if snapshots.should_send(tick) {
            let snapshot = snapshots.build(tick, sim.observe());
            self.channel.broadcast(StreamEvent::State(snapshot));
        }

        Ok(())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
