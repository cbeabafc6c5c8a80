//! Translates transport key events into held-key state and serves the
//! per-tick input view to the simulation.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::{translate, ActionSet, InputState, LogicalAction};
use crate::game::InputSource;
use crate::stream::SessionId;

/// Remote input bridge.
///
/// Session handlers call `key_down`/`key_up`; the clock calls `latch` once at
/// the start of each tick and the simulation reads the latched set through
/// [`InputSource`]. The simulation therefore sees one consistent set for the
/// whole tick, no matter how many events arrive meanwhile.
#[derive(Debug, Default)]
pub struct InputBridge {
    state: Arc<InputState>,
    latched: AtomicU8,
}

impl InputBridge {
    pub fn new(state: Arc<InputState>) -> Self {
        Self {
            state,
            latched: AtomicU8::new(0),
        }
    }

    /// Register a session so its presses are accepted
    pub fn connect(&self, session: SessionId) {
        self.state.open_session(session);
    }

    /// Handle a `key_down`. Returns the mapped action, `None` if the key is
    /// unknown or the session has already disconnected.
    pub fn key_down(&self, session: SessionId, key: &str) -> Option<LogicalAction> {
        let mapped = translate(key)?;
        if !self.state.press(session, mapped) {
            trace!(session_id = %session, key, "press from closed session dropped");
            return None;
        }
        trace!(session_id = %session, key, action = ?mapped.action, "press");
        Some(mapped.action)
    }

    /// Handle a `key_up`. Unknown keys are ignored.
    pub fn key_up(&self, session: SessionId, key: &str) -> Option<LogicalAction> {
        let mapped = translate(key)?;
        self.state.release(session, mapped);
        trace!(session_id = %session, key, action = ?mapped.action, "release");
        Some(mapped.action)
    }

    /// Release everything the session was holding
    pub fn disconnect(&self, session: SessionId) {
        self.state.release_session(session);
    }

    /// Snapshot the shared state into the per-tick view and return it
    pub fn latch(&self) -> ActionSet {
        let snapshot = self.state.snapshot();
        self.latched.store(snapshot.bits(), Ordering::Release);
        snapshot
    }

    /// Clear the per-tick view (clock teardown)
    pub fn reset(&self) {
        self.latched.store(0, Ordering::Release);
    }

    /// Live view of the shared state, bypassing the latch
    pub fn current(&self) -> ActionSet {
        self.state.snapshot()
    }
}

impl InputSource for InputBridge {
    fn pressed(&self) -> ActionSet {
        ActionSet::from_bits(self.latched.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn simulation_sees_latched_set_until_next_tick() {
        let bridge = InputBridge::new(Arc::new(InputState::new()));
        let session = Uuid::new_v4();
        bridge.connect(session);

        bridge.key_down(session, "ArrowRight");
        assert!(bridge.pressed().is_empty());

        bridge.latch();
        assert!(bridge.pressed().contains(LogicalAction::MoveRight));

        // Released mid-tick: still visible until the next latch
        bridge.key_up(session, "ArrowRight");
        assert!(bridge.pressed().contains(LogicalAction::MoveRight));

        bridge.latch();
        assert!(bridge.pressed().is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let bridge = InputBridge::new(Arc::new(InputState::new()));
        let session = Uuid::new_v4();
        bridge.connect(session);

        assert_eq!(bridge.key_down(session, "Escape"), None);
        assert_eq!(bridge.key_up(session, "Escape"), None);
        assert!(bridge.current().is_empty());
    }

    #[test]
    fn disconnect_drops_held_keys() {
        let bridge = InputBridge::new(Arc::new(InputState::new()));
        let session = Uuid::new_v4();
        bridge.connect(session);

        bridge.key_down(session, "Space");
        bridge.disconnect(session);
        assert!(bridge.latch().is_empty());

        assert_eq!(bridge.key_down(session, "Space"), None);
        assert!(bridge.latch().is_empty());
    }
}
