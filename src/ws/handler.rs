//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::stream::{InputEvent, Session, StartError, StartOutcome};
use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

const CONNECTED_MSG: &str = "Connected to arcade stream server";
const STARTED_MSG: &str = "Game started!";

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session = state.channel.register_session();
    let session_id = session.id;
    info!(session_id = %session_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Writer task: session queue -> WebSocket
    let writer_handle = tokio::spawn(write_loop(session.clone(), ws_sink));

    state.channel.send_to(session_id, &ServerMsg::status(CONNECTED_MSG));
    let started = state.lifecycle.on_connect().await;
    announce_start(&state, &session, started);

    read_loop(&state, &session, ws_stream).await;

    // Cleanup on disconnect
    state.channel.unregister_session(session_id);
    state.lifecycle.on_disconnect().await;
    writer_handle.abort();

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Drain the session's outbound queue into the socket
async fn write_loop(session: Arc<Session>, mut ws_sink: SplitSink<WebSocket, Message>) {
    while let Some(text) = session.queue().recv().await {
        if let Err(e) = ws_sink.send(Message::Text(text.to_string())).await {
            debug!(session_id = %session.id, error = %e, "WebSocket send failed");
            // The next broadcast notices and unregisters the session
            session.close();
            break;
        }
    }
    let _ = ws_sink.close().await;
}

/// Reader loop: WebSocket -> input bridge / lifecycle
async fn read_loop(state: &AppState, session: &Session, mut ws_stream: SplitStream<WebSocket>) {
    let rate_limiter = SessionRateLimiter::new(state.config.input_rate_limit);

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session.id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_client_msg(state, session, msg).await,
                    Err(e) => {
                        warn!(session_id = %session.id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session.id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session.id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session.id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Apply one client message
pub(crate) async fn handle_client_msg(state: &AppState, session: &Session, msg: ClientMsg) {
    match msg {
        ClientMsg::KeyDown { key } => {
            state.channel.route_input(session.id, InputEvent::Press(key));
        }
        ClientMsg::KeyUp { key } => {
            state.channel.route_input(session.id, InputEvent::Release(key));
        }
        ClientMsg::FrameRequest => {
            state.channel.handle_frame_request(session.id);
        }
        ClientMsg::StartGame => match state.lifecycle.start().await {
            Ok(StartOutcome::AlreadyRunning) => {
                state
                    .channel
                    .send_to(session.id, &ServerMsg::status("Game already running"));
            }
            result => announce_start(state, session, result),
        },
        ClientMsg::StopGame => {
            if state.lifecycle.on_explicit_stop() {
                state.channel.broadcast_msg(&ServerMsg::status("Game stopped"));
            } else {
                state
                    .channel
                    .send_to(session.id, &ServerMsg::status("Game is not running"));
            }
        }
        ClientMsg::Ack { tick } => session.ack(tick),
        ClientMsg::Ping { t } => {
            state.channel.send_to(session.id, &ServerMsg::Pong { t });
        }
    }
}

fn announce_start(state: &AppState, session: &Session, result: Result<StartOutcome, StartError>) {
    match result {
        Ok(StartOutcome::Started) => {
            state.channel.send_to(session.id, &ServerMsg::status(STARTED_MSG));
        }
        Ok(StartOutcome::AlreadyRunning) => {}
        Err(e) => {
            state
                .channel
                .send_to(session.id, &ServerMsg::error(format!("Game unavailable: {e}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::stream::clock::tests::ScriptedFactory;
    use crate::stream::{ClockRunState, FrameFormat};
    use serde_json::Value;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            tick_rate: 60,
            snapshot_every_ticks: 3,
            frame_width: 320,
            frame_height: 240,
            frame_format: FrameFormat::Png,
            session_queue_capacity: 64,
            ..Config::default()
        }
    }

    async fn next_of_type(session: &Session, kind: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let text = tokio::time::timeout_at(deadline, session.queue().recv())
                .await
                .expect("timed out waiting for message")
                .expect("queue closed");
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["type"] == kind {
                return value;
            }
        }
    }

    async fn wait_for_idle(state: &AppState) {
        for _ in 0..200 {
            if state.lifecycle.run_state() == ClockRunState::Idle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("clock did not stop");
    }

    #[tokio::test]
    async fn arrow_right_moves_the_player_until_released() {
        let state = AppState::new(Config {
            stop_when_empty: true,
            ..test_config()
        });
        let session = state.channel.register_session();

        let outcome = state.lifecycle.on_connect().await.unwrap();
        announce_start(&state, &session, Ok(outcome));
        assert_eq!(next_of_type(&session, "status").await["msg"], STARTED_MSG);

        let first = next_of_type(&session, "game_state").await;
        let x0 = first["player_x"].as_f64().unwrap();

        let press = ClientMsg::KeyDown { key: "ArrowRight".into() };
        handle_client_msg(&state, &session, press).await;

        let mut x = x0;
        for _ in 0..100 {
            x = next_of_type(&session, "game_state").await["player_x"].as_f64().unwrap();
            if x > x0 {
                break;
            }
        }
        assert!(x > x0, "player never moved right");

        let release = ClientMsg::KeyUp { key: "ArrowRight".into() };
        handle_client_msg(&state, &session, release).await;

        let mut previous = x;
        let mut settled = false;
        for _ in 0..100 {
            let x = next_of_type(&session, "game_state").await["player_x"].as_f64().unwrap();
            if x == previous {
                settled = true;
                break;
            }
            previous = x;
        }
        assert!(settled, "player kept moving after release");

        state.channel.unregister_session(session.id);
        assert!(state.lifecycle.on_disconnect().await);
        wait_for_idle(&state).await;
    }

    #[tokio::test]
    async fn start_and_stop_requests_report_status() {
        let state = AppState::with_factory(test_config(), Arc::new(ScriptedFactory::default()));
        let session = state.channel.register_session();

        handle_client_msg(&state, &session, ClientMsg::StopGame).await;
        assert_eq!(next_of_type(&session, "status").await["msg"], "Game is not running");

        handle_client_msg(&state, &session, ClientMsg::StartGame).await;
        assert_eq!(next_of_type(&session, "status").await["msg"], STARTED_MSG);

        handle_client_msg(&state, &session, ClientMsg::StartGame).await;
        assert_eq!(next_of_type(&session, "status").await["msg"], "Game already running");

        handle_client_msg(&state, &session, ClientMsg::StopGame).await;
        assert_eq!(next_of_type(&session, "status").await["msg"], "Game stopped");
        wait_for_idle(&state).await;
    }

    #[tokio::test]
    async fn failed_start_is_reported_as_error_status() {
        let factory = ScriptedFactory {
            fail_init: true,
            ..Default::default()
        };
        let state = AppState::with_factory(test_config(), Arc::new(factory));
        let session = state.channel.register_session();

        let result = state.lifecycle.on_connect().await;
        announce_start(&state, &session, result);

        let status = next_of_type(&session, "status").await;
        assert_eq!(status["error"], true);
        assert!(status["msg"].as_str().unwrap().starts_with("Game unavailable"));
    }

    #[tokio::test]
    async fn ping_and_ack() {
        let state = AppState::with_factory(test_config(), Arc::new(ScriptedFactory::default()));
        let session = state.channel.register_session();

        handle_client_msg(&state, &session, ClientMsg::Ping { t: 42 }).await;
        assert_eq!(next_of_type(&session, "pong").await["t"], 42);

        handle_client_msg(&state, &session, ClientMsg::Ack { tick: 9 }).await;
        assert_eq!(session.last_ack(), Some(9));
    }
}
