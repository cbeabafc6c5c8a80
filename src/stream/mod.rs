//! Streaming core: the simulation clock, frame encoding and fan-out to sessions

pub mod channel;
pub mod clock;
pub mod encoder;
pub mod frame;
pub mod lifecycle;
pub mod session;
pub mod snapshot;

pub use channel::{BroadcastChannel, DeliveryMode, InputEvent, StreamEvent};
pub use clock::{ClockRunState, ClockSettings, ClockStatus, SimulationClock, StartError};
pub use encoder::{EncodeError, FrameEncoder};
pub use frame::{Frame, FrameFormat, StateSnapshot};
pub use lifecycle::{SessionLifecycleManager, StartOutcome};
pub use session::{Session, SessionId};
