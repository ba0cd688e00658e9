pub mod clock;
pub mod mpv;

pub use clock::{SharedPlayback, WallClock};

/// Position and play state at the moment of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub position_seconds: f64,
    pub is_playing: bool,
}

/// Anything that can report where playback currently is.
pub trait PositionProvider: Send + Sync {
    fn position_seconds(&self) -> f64;
    fn is_playing(&self) -> bool;

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            position_seconds: self.position_seconds().max(0.0),
            is_playing: self.is_playing(),
        }
    }
}
