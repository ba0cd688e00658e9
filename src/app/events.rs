use crate::fallback::TaggedText;

#[derive(Debug, Clone)]
pub enum Event {
    Player(PlayerEvent),
    Lyrics(LyricsEvent),
    Transcription(TaggedText),
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Started,
    Paused,
    Position { seconds: f64 },
    Duration { seconds: f64 },
    Ended,
    Error(String),
}

#[derive(Debug, Clone)]
pub enum LyricsEvent {
    LineChanged { text: String },
}
