//! Starts and stops the simulation clock as sessions come and go

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::channel::BroadcastChannel;
use super::clock::{ClockRunState, ClockSettings, ClockStatus, ClockWorker, SimulationClock, StartError};
use crate::game::SimulationFactory;
use crate::input::InputBridge;

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Owns the clock run state. At most one clock thread (and so one
/// simulation instance) exists at any time.
pub struct SessionLifecycleManager {
    settings: ClockSettings,
    factory: Arc<dyn SimulationFactory>,
    bridge: Arc<InputBridge>,
    channel: Arc<BroadcastChannel>,
    status: Arc<ClockStatus>,
    /// Serializes start/stop transitions
    worker: Mutex<Option<ClockWorker>>,
    sessions: AtomicUsize,
    stop_when_empty: bool,
}

impl SessionLifecycleManager {
    pub fn new(
        settings: ClockSettings,
        stop_when_empty: bool,
        factory: Arc<dyn SimulationFactory>,
        bridge: Arc<InputBridge>,
        channel: Arc<BroadcastChannel>,
    ) -> Self {
        Self {
            settings,
            factory,
            bridge,
            channel,
            status: Arc::new(ClockStatus::default()),
            worker: Mutex::new(None),
            sessions: AtomicUsize::new(0),
            stop_when_empty,
        }
    }

    pub fn status(&self) -> &ClockStatus {
        &self.status
    }

    pub fn run_state(&self) -> ClockRunState {
        self.status.run_state()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::Acquire)
    }

    pub fn game_name(&self) -> &'static str {
        self.factory.name()
    }

    /// A session connected: count it and make sure the clock runs
    pub async fn on_connect(&self) -> Result<StartOutcome, StartError> {
        self.sessions.fetch_add(1, Ordering::AcqRel);
        self.start().await
    }

    /// Idempotent start. Waits for a stopping clock to finish before
    /// starting a fresh run.
    pub async fn start(&self) -> Result<StartOutcome, StartError> {
        let mut worker = self.worker.lock().await;

        if self.status.run_state() == ClockRunState::Running {
            return Ok(StartOutcome::AlreadyRunning);
        }

        if let Some(previous) = worker.take() {
            previous.join().await;
        }

        let clock = SimulationClock::new(
            self.settings.clone(),
            self.factory.clone(),
            self.bridge.clone(),
            self.channel.clone(),
            self.status.clone(),
        );

        match clock.start().await {
            Ok(started) => {
                *worker = Some(started);
                info!(sessions = self.session_count(), "Simulation clock started");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                warn!(error = %e, "Simulation clock failed to start");
                Err(e)
            }
        }
    }

    /// A session disconnected. Returns true if this requested a stop.
    ///
    /// Holds the start lock, so a connect that races this either lands before
    /// the emptiness check (and the clock keeps running) or starts a fresh
    /// clock after the stop.
    pub async fn on_disconnect(&self) -> bool {
        let _worker = self.worker.lock().await;

        let _ = self
            .sessions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));

        if self.stop_when_empty && self.session_count() == 0 && self.status.request_stop() {
            info!("Last session left, stopping clock");
            return true;
        }
        false
    }

    /// Stop regardless of connected sessions. Returns false if not running.
    pub fn on_explicit_stop(&self) -> bool {
        let requested = self.status.request_stop();
        if requested {
            info!(sessions = self.session_count(), "Clock stop requested");
        }
        requested
    }

    /// Stop the clock and wait for its thread (process shutdown)
    pub async fn shutdown(&self) {
        let mut worker = self.worker.lock().await;
        self.status.request_stop();
        if let Some(worker) = worker.take() {
            worker.join().await;
        }
    }
}
