//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{ArenaFactory, SimulationFactory};
use crate::input::{InputBridge, InputState};
use crate::stream::{BroadcastChannel, ClockSettings, SessionLifecycleManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub channel: Arc<BroadcastChannel>,
    pub lifecycle: Arc<SessionLifecycleManager>,
}

impl AppState {
    /// State driving the bundled arena game
    pub fn new(config: Config) -> Self {
        let factory = ArenaFactory {
            width: config.frame_width,
            height: config.frame_height,
            seed: config.sim_seed,
        };
        Self::with_factory(config, Arc::new(factory))
    }

    pub fn with_factory(config: Config, factory: Arc<dyn SimulationFactory>) -> Self {
        let config = Arc::new(config);

        // One input surface for every session
        let bridge = Arc::new(InputBridge::new(Arc::new(InputState::new())));

        let channel = Arc::new(BroadcastChannel::new(
            bridge.clone(),
            config.delivery_mode,
            config.session_queue_capacity,
        ));

        let lifecycle = Arc::new(SessionLifecycleManager::new(
            ClockSettings::from(config.as_ref()),
            config.stop_when_empty,
            factory,
            bridge,
            channel.clone(),
        ));

        Self {
            config,
            channel,
            lifecycle,
        }
    }
}
