//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::stream::{Frame, FrameFormat, StateSnapshot};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Key pressed. `key` is a `KeyboardEvent.code`; unknown codes are ignored.
    KeyDown {
        #[serde(default)]
        key: String,
    },

    /// Key released
    KeyUp {
        #[serde(default)]
        key: String,
    },

    /// Ask for the latest frame (on-demand delivery)
    FrameRequest,

    /// Start the simulation if it is not running
    StartGame,

    /// Stop the simulation regardless of connected sessions
    StopGame,

    /// Latest frame tick the client displayed
    Ack { tick: u64 },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Human readable connection/start state
    Status {
        msg: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        error: bool,
    },

    /// Encoded frame
    Frame {
        /// Base64 image bytes
        data: String,
        tick: u64,
        format: FrameFormat,
    },

    /// Periodic state snapshot
    GameState {
        health: f32,
        score: u32,
        /// Tick count
        time: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_x: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_y: Option<f32>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn status(msg: impl Into<String>) -> Self {
        ServerMsg::Status {
            msg: msg.into(),
            error: false,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        ServerMsg::Status {
            msg: msg.into(),
            error: true,
        }
    }
}

impl From<&Frame> for ServerMsg {
    fn from(frame: &Frame) -> Self {
        ServerMsg::Frame {
            data: frame.to_base64(),
            tick: frame.tick,
            format: frame.format,
        }
    }
}

impl From<&StateSnapshot> for ServerMsg {
    fn from(snapshot: &StateSnapshot) -> Self {
        ServerMsg::GameState {
            health: snapshot.health,
            score: snapshot.score,
            time: snapshot.tick,
            player_x: snapshot.position.map(|(x, _)| x),
            player_y: snapshot.position.map(|(_, y)| y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_key_events() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"key_down","key":"ArrowRight"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::KeyDown {
                key: "ArrowRight".to_string()
            }
        );

        // A key event without a key is accepted and maps to nothing
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"key_up"}"#).unwrap();
        assert_eq!(msg, ClientMsg::KeyUp { key: String::new() });
    }

    #[test]
    fn parses_unit_events() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"frame_request"}"#).unwrap();
        assert_eq!(msg, ClientMsg::FrameRequest);
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"stop_game"}"#).unwrap();
        assert_eq!(msg, ClientMsg::StopGame);
    }

    #[test]
    fn status_omits_error_flag_when_false() {
        let value = serde_json::to_value(ServerMsg::status("Connected")).unwrap();
        assert_eq!(value, json!({"type": "status", "msg": "Connected"}));

        let value = serde_json::to_value(ServerMsg::error("boom")).unwrap();
        assert_eq!(value, json!({"type": "status", "msg": "boom", "error": true}));
    }

    #[test]
    fn game_state_shape() {
        let snapshot = StateSnapshot {
            tick: 120,
            health: 85.0,
            score: 300,
            position: Some((10.0, 20.0)),
        };
        let value = serde_json::to_value(ServerMsg::from(&snapshot)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "game_state",
                "health": 85.0,
                "score": 300,
                "time": 120,
                "player_x": 10.0,
                "player_y": 20.0
            })
        );

        let headless = StateSnapshot { position: None, ..snapshot };
        let value = serde_json::to_value(ServerMsg::from(&headless)).unwrap();
        assert!(value.get("player_x").is_none());
    }
}
