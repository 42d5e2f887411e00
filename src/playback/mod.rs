/// Playback management: the queue adapter and the audio engine seam
pub mod engine;
pub mod queue;

pub use engine::{EngineError, EngineEvent, PlaybackEngine, Progress, RodioEngine};
pub use queue::{Direction, PlaybackQueue, QueueError};

/// Transport state of the engine as tracked by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}
