use super::{PlaybackSnapshot, PositionProvider};
use std::sync::Mutex;
use tokio::time::Instant;

/// Playback state written by a player backend and read by pollers.
#[derive(Debug, Default)]
pub struct SharedPlayback {
    state: Mutex<PlaybackSnapshot>,
}

impl SharedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, seconds: f64) {
        self.update(|s| s.position_seconds = seconds);
    }

    pub fn set_playing(&self, playing: bool) {
        self.update(|s| s.is_playing = playing);
    }

    fn update(&self, f: impl FnOnce(&mut PlaybackSnapshot)) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state);
    }

    fn read(&self) -> PlaybackSnapshot {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PositionProvider for SharedPlayback {
    fn position_seconds(&self) -> f64 {
        self.read().position_seconds
    }

    fn is_playing(&self) -> bool {
        self.read().is_playing
    }
}

/// Pretends a track started playing at `offset` seconds when it was created.
/// Used to follow lyrics without a player attached.
#[derive(Debug)]
pub struct WallClock {
    started: Instant,
    offset: f64,
}

impl WallClock {
    pub fn starting_at(offset: f64) -> Self {
        Self {
            started: Instant::now(),
            offset: offset.max(0.0),
        }
    }
}

impl PositionProvider for WallClock {
    fn position_seconds(&self) -> f64 {
        self.offset + self.started.elapsed().as_secs_f64()
    }

    fn is_playing(&self) -> bool {
        true
    }
}
