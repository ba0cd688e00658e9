//! Drives line-by-line lyric display from a playback position.
//!
//! The dispatcher is either idle or running exactly one polling task. Each
//! tick reads a [`PlaybackSnapshot`], resolves the active [`TimedLine`] and
//! emits `LyricsEvent::LineChanged` only when the text differs from the last
//! emitted line.

use crate::app::events::{Event, LyricsEvent};
use crate::lyrics::TimedLine;
use crate::player::{PlaybackSnapshot, PositionProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Index of the line whose half-open interval `[offset_i, offset_i+1)`
/// contains `position`. The last line is open-ended.
pub fn active_line_index(lines: &[TimedLine], position: f64) -> Option<usize> {
    // Lines are sorted, so the candidate is the last one starting at or
    // before `position`. Among equal stamps only the last has a non-empty
    // interval.
    let idx = lines
        .partition_point(|l| l.offset_seconds <= position)
        .checked_sub(1)?;
    Some(idx)
}

/// Per-run sync state: the lines being followed and what was shown last.
#[derive(Debug)]
pub struct LineTracker {
    lines: Arc<[TimedLine]>,
    last_emitted: Option<String>,
}

impl LineTracker {
    pub fn new(lines: Arc<[TimedLine]>) -> Self {
        Self {
            lines,
            last_emitted: None,
        }
    }

    /// One poll step. Returns the text to emit, if any.
    pub fn step(&mut self, snapshot: PlaybackSnapshot) -> Option<String> {
        if !snapshot.is_playing {
            return None;
        }
        let idx = active_line_index(&self.lines, snapshot.position_seconds)?;
        let text = self.lines[idx].text.as_str();

        // Instrumental gaps are blank lines: keep the previous line up.
        if text.trim().is_empty() || self.last_emitted.as_deref() == Some(text) {
            return None;
        }
        self.last_emitted = Some(text.to_string());
        Some(text.to_string())
    }

    pub fn last_emitted(&self) -> Option<&str> {
        self.last_emitted.as_deref()
    }
}

struct ActiveRun {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SyncDispatcher {
    interval: Duration,
    events: mpsc::Sender<Event>,
    active: Option<ActiveRun>,
}

impl SyncDispatcher {
    pub fn new(interval: Duration, events: mpsc::Sender<Event>) -> Self {
        Self {
            interval,
            events,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Begin following `lines`. A run already in progress is stopped first.
    pub fn start<P>(&mut self, lines: Vec<TimedLine>, provider: Arc<P>)
    where
        P: PositionProvider + ?Sized + 'static,
    {
        self.stop();

        info!("Starting synced lyrics ({} lines)", lines.len());
        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            LineTracker::new(lines.into()),
            provider,
            self.interval,
            self.events.clone(),
            token.clone(),
        ));
        self.active = Some(ActiveRun { token, handle });
    }

    /// Stop polling. Safe to call when idle.
    pub fn stop(&mut self) {
        if let Some(run) = self.active.take() {
            debug!("Stopping synced lyrics");
            run.token.cancel();
        }
    }
}

impl Drop for SyncDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop<P>(
    mut tracker: LineTracker,
    provider: Arc<P>,
    interval: Duration,
    events: mpsc::Sender<Event>,
    token: CancellationToken,
) where
    P: PositionProvider + ?Sized,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(text) = tracker.step(provider.snapshot()) else {
            continue;
        };

        // A tick that raced with stop() must not emit.
        let event = Event::Lyrics(LyricsEvent::LineChanged { text });
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            sent = events.send(event) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Sync run ended at {:?}", tracker.last_emitted());
}
