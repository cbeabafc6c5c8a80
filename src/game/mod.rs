//! Simulation collaborator interface and the bundled arena game

pub mod arena;
pub mod combat;
pub mod physics;
pub mod render;

pub use arena::{Arena, ArenaFactory};
pub use render::RenderBuffer;

use std::sync::Arc;

use crate::input::ActionSet;

/// Where the simulation reads control input from.
///
/// Injected at construction so the simulation never knows the input is remote.
pub trait InputSource: Send + Sync {
    /// Actions asserted for the current tick
    fn pressed(&self) -> ActionSet;
}

/// Observable values sampled for state snapshots
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observables {
    pub health: f32,
    pub score: u32,
    pub position: Option<(f32, f32)>,
}

/// A stepped 2D simulation driven by a single worker.
///
/// Implementations need not be `Send`: the clock constructs and drives them on
/// its own thread.
pub trait Simulation {
    /// Advance game state by `dt` seconds
    fn step(&mut self, dt: f32) -> Result<(), SimError>;

    /// Resolve collisions produced by the last step
    fn resolve_collisions(&mut self) -> Result<(), SimError>;

    /// Draw the current state into `target`
    fn render(&mut self, target: &mut RenderBuffer) -> Result<(), SimError>;

    fn observe(&self) -> Observables;
}

/// Builds simulation instances for the clock
pub trait SimulationFactory: Send + Sync + 'static {
    /// Short game identifier reported by `/health`
    fn name(&self) -> &'static str;

    fn create(&self, input: Arc<dyn InputSource>) -> Result<Box<dyn Simulation>, SimError>;
}

/// Simulation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimError {
    #[error("Simulation failed to initialize: {0}")]
    Init(String),

    #[error("Simulation step failed: {0}")]
    Step(String),

    #[error("Render failed: {0}")]
    Render(String),

    /// The simulation cannot continue (e.g. it asked to quit)
    #[error("Simulation terminated: {0}")]
    Fatal(String),
}

impl SimError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::Init(_) | SimError::Fatal(_))
    }
}
