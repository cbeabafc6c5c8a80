//! Held-key state shared between session handlers and the clock

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::{ActionSet, MappedKey};
use crate::stream::SessionId;

/// Keys currently held by each connected session.
///
/// An action is asserted while at least one session holds at least one key
/// mapped to it. Every read and write takes the same lock, so a snapshot never
/// sees a half-applied press or release. Only open sessions may press keys;
/// once `release_session` runs, late presses from that session are refused.
#[derive(Debug, Default)]
pub struct InputState {
    held: Mutex<HashMap<SessionId, HashSet<MappedKey>>>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a session (connect)
    pub fn open_session(&self, session: SessionId) {
        self.held.lock().entry(session).or_default();
    }

    /// Mark `key` as held by `session`. Idempotent.
    /// Returns false if the session is not open.
    pub fn press(&self, session: SessionId, key: MappedKey) -> bool {
        match self.held.lock().get_mut(&session) {
            Some(keys) => {
                keys.insert(key);
                true
            }
            None => false,
        }
    }

    /// Mark `key` as released by `session`. Idempotent.
    pub fn release(&self, session: SessionId, key: MappedKey) {
        if let Some(keys) = self.held.lock().get_mut(&session) {
            keys.remove(&key);
        }
    }

    /// Drop everything a session holds (disconnect)
    pub fn release_session(&self, session: SessionId) {
        self.held.lock().remove(&session);
    }

    /// OR of every session's held actions
    pub fn snapshot(&self) -> ActionSet {
        self.held
            .lock()
            .values()
            .flatten()
            .map(|k| k.action)
            .collect()
    }
}
