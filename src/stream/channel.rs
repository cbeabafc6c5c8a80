//! Session registry and fan-out of frames and state snapshots

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::frame::{Frame, StateSnapshot};
use super::session::{PushOutcome, Session, SessionId};
use crate::input::{InputBridge, LogicalAction};
use crate::ws::protocol::ServerMsg;

/// How frames reach clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Every frame is pushed to every session
    Push,
    /// Frames are sent only in reply to `frame_request`
    OnDemand,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "push" => Ok(DeliveryMode::Push),
            "on_demand" | "on-demand" | "pull" => Ok(DeliveryMode::OnDemand),
            other => Err(format!("unknown delivery mode: {other}")),
        }
    }
}

/// Something the clock publishes
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Frame(Frame),
    State(StateSnapshot),
}

/// Inbound control event from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Press(String),
    Release(String),
}

/// Owns the connected sessions.
///
/// Every send is a non-blocking push into the session's bounded queue, so the
/// clock thread never waits on a slow socket.
pub struct BroadcastChannel {
    sessions: DashMap<SessionId, Arc<Session>>,
    bridge: Arc<InputBridge>,
    mode: DeliveryMode,
    queue_capacity: usize,
    /// Most recent frame, kept only in on-demand mode
    latest_frame: RwLock<Option<Arc<str>>>,
    frames_published: AtomicU64,
}

impl BroadcastChannel {
    pub fn new(bridge: Arc<InputBridge>, mode: DeliveryMode, queue_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            bridge,
            mode,
            queue_capacity,
            latest_frame: RwLock::new(None),
            frames_published: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Create and register a session for a new connection
    pub fn register_session(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(self.queue_capacity));
        self.bridge.connect(session.id);
        self.sessions.insert(session.id, session.clone());
        info!(session_id = %session.id, sessions = self.sessions.len(), "Session registered");
        session
    }

    /// Remove a session and release the keys it was holding.
    /// Returns false if it was already gone.
    pub fn unregister_session(&self, id: SessionId) -> bool {
        self.bridge.disconnect(id);
        match self.sessions.remove(&id) {
            Some((_, session)) => {
                session.close();
                info!(
                    session_id = %id,
                    sessions = self.sessions.len(),
                    dropped = session.queue().dropped(),
                    "Session unregistered"
                );
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|s| s.value().clone())
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    /// Publish a clock event to all sessions
    pub fn broadcast(&self, event: StreamEvent) {
        match event {
            StreamEvent::Frame(frame) => {
                self.frames_published.fetch_add(1, Ordering::Relaxed);
                let Some(text) = serialize(&ServerMsg::from(&frame)) else {
                    return;
                };
                match self.mode {
                    DeliveryMode::Push => self.fan_out(text),
                    DeliveryMode::OnDemand => *self.latest_frame.write() = Some(text),
                }
            }
            StreamEvent::State(snapshot) => {
                if let Some(text) = serialize(&ServerMsg::from(&snapshot)) {
                    self.fan_out(text);
                }
            }
        }
    }

    /// Send a message to every session
    pub fn broadcast_msg(&self, msg: &ServerMsg) {
        if let Some(text) = serialize(msg) {
            self.fan_out(text);
        }
    }

    /// Send a message to one session. Returns false if it is gone.
    pub fn send_to(&self, id: SessionId, msg: &ServerMsg) -> bool {
        let Some(session) = self.session(id) else {
            return false;
        };
        match serialize(msg) {
            Some(text) => session.push(text) != PushOutcome::Closed,
            None => false,
        }
    }

    /// Reply to `frame_request` with the latest frame. Returns true if one was queued.
    pub fn handle_frame_request(&self, id: SessionId) -> bool {
        if self.mode != DeliveryMode::OnDemand {
            debug!(session_id = %id, "frame_request ignored in push mode");
            return false;
        }
        let latest = self.latest_frame.read().clone();
        match (latest, self.session(id)) {
            (Some(text), Some(session)) => session.push(text) != PushOutcome::Closed,
            _ => false,
        }
    }

    /// Forward a press/release to the input bridge.
    /// Inputs from all sessions merge into one control surface.
    pub fn route_input(&self, id: SessionId, event: InputEvent) -> Option<LogicalAction> {
        if !self.sessions.contains_key(&id) {
            debug!(session_id = %id, "Input from unknown session ignored");
            return None;
        }
        match event {
            InputEvent::Press(key) => self.bridge.key_down(id, &key),
            InputEvent::Release(key) => self.bridge.key_up(id, &key),
        }
    }

    fn fan_out(&self, text: Arc<str>) {
        let mut dead = Vec::new();
        for entry in self.sessions.iter() {
            let session = entry.value();
            match session.push(text.clone()) {
                PushOutcome::Queued => {}
                PushOutcome::DroppedOldest => {
                    debug!(session_id = %session.id, "Session lagging, dropped oldest message");
                }
                PushOutcome::Closed => dead.push(session.id),
            }
        }

        // Removal must happen outside the iteration to avoid shard deadlocks
        for id in dead {
            self.unregister_session(id);
        }
    }
}

fn serialize(msg: &ServerMsg) -> Option<Arc<str>> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize server message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputState;
    use crate::stream::FrameFormat;
    use bytes::Bytes;

    fn channel(mode: DeliveryMode, capacity: usize) -> BroadcastChannel {
        let bridge = Arc::new(InputBridge::new(Arc::new(InputState::new())));
        BroadcastChannel::new(bridge, mode, capacity)
    }

    fn frame(tick: u64) -> Frame {
        Frame {
            tick,
            timestamp_ms: 0,
            format: FrameFormat::Jpeg,
            width: 1,
            height: 1,
            payload: Bytes::from_static(&[0xFF, 0xD8]),
        }
    }

    fn drain(session: &Session) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while session.queue().len() > 0 {
            let text = tokio_test::block_on(session.queue().recv()).unwrap();
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    #[test]
    fn push_mode_fans_frames_out_to_everyone() {
        let channel = channel(DeliveryMode::Push, 8);
        let a = channel.register_session();
        let b = channel.register_session();

        channel.broadcast(StreamEvent::Frame(frame(3)));

        for session in [&a, &b] {
            let msgs = drain(session);
            assert_eq!(msgs.len(), 1);
            assert_eq!(msgs[0]["type"], "frame");
            assert_eq!(msgs[0]["tick"], 3);
            assert_eq!(msgs[0]["data"], "/9g=");
        }
    }

    #[test]
    fn closed_session_does_not_affect_others() {
        let channel = channel(DeliveryMode::Push, 8);
        let a = channel.register_session();
        let b = channel.register_session();

        // Connection died without unregistering yet
        a.close();
        channel.broadcast(StreamEvent::Frame(frame(1)));

        assert_eq!(drain(&b).len(), 1);
        assert_eq!(channel.session_count(), 1);
        assert!(channel.session(a.id).is_none());
    }

    #[test]
    fn slow_session_keeps_newest_messages() {
        let channel = channel(DeliveryMode::Push, 2);
        let slow = channel.register_session();

        for tick in 0..5 {
            channel.broadcast(StreamEvent::Frame(frame(tick)));
        }

        let ticks: Vec<u64> = drain(&slow)
            .iter()
            .map(|m| m["tick"].as_u64().unwrap())
            .collect();
        assert_eq!(ticks, vec![3, 4]);
        assert_eq!(slow.queue().dropped(), 3);
    }

    #[test]
    fn on_demand_mode_answers_requests_only() {
        let channel = channel(DeliveryMode::OnDemand, 8);
        let a = channel.register_session();

        assert!(!channel.handle_frame_request(a.id));
        channel.broadcast(StreamEvent::Frame(frame(1)));
        channel.broadcast(StreamEvent::Frame(frame(2)));
        assert_eq!(a.queue().len(), 0);

        assert!(channel.handle_frame_request(a.id));
        let msgs = drain(&a);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["tick"], 2);
    }

    #[test]
    fn snapshots_are_pushed_in_both_modes() {
        let channel = channel(DeliveryMode::OnDemand, 8);
        let a = channel.register_session();

        channel.broadcast(StreamEvent::State(StateSnapshot {
            tick: 60,
            health: 100.0,
            score: 0,
            position: None,
        }));

        let msgs = drain(&a);
        assert_eq!(msgs[0]["type"], "game_state");
        assert_eq!(msgs[0]["time"], 60);
    }

    #[test]
    fn unregister_releases_held_input() {
        let bridge = Arc::new(InputBridge::new(Arc::new(InputState::new())));
        let channel = BroadcastChannel::new(bridge.clone(), DeliveryMode::Push, 8);
        let a = channel.register_session();

        assert_eq!(
            channel.route_input(a.id, InputEvent::Press("ArrowRight".into())),
            Some(LogicalAction::MoveRight)
        );
        assert!(bridge.current().contains(LogicalAction::MoveRight));

        assert!(channel.unregister_session(a.id));
        assert!(bridge.current().is_empty());
        assert!(!channel.unregister_session(a.id));
    }

    #[test]
    fn late_press_after_unregister_is_dropped() {
        let bridge = Arc::new(InputBridge::new(Arc::new(InputState::new())));
        let channel = BroadcastChannel::new(bridge.clone(), DeliveryMode::Push, 8);
        let a = channel.register_session();

        // A press that passed the registry check just before removal
        channel.unregister_session(a.id);
        assert_eq!(bridge.key_down(a.id, "ArrowRight"), None);
        assert!(bridge.current().is_empty());
    }

    #[test]
    fn parses_delivery_modes() {
        assert_eq!("push".parse::<DeliveryMode>(), Ok(DeliveryMode::Push));
        assert_eq!("on_demand".parse::<DeliveryMode>(), Ok(DeliveryMode::OnDemand));
        assert!("broadcast".parse::<DeliveryMode>().is_err());
    }
}
