pub mod events;

use crate::analysis::AudioSignal;
use crate::config::Config;
use crate::fallback::{FallbackChain, Mood, Transcript, analyze_mood};
use crate::lyrics::title::TitleArtist;
use crate::lyrics::{LrclibClient, LyricCache, LyricRecord, LyricSearch};
use crate::player::PositionProvider;
use crate::storage::StorageHandle;
use crate::sync::SyncDispatcher;
use events::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What a track resolved to: real lyrics, or the fallback chain's line.
#[derive(Debug, Clone)]
pub enum Resolution {
    Lyrics(Arc<LyricRecord>),
    Transcribed(Transcript),
}

/// Everything one listening session needs, wired explicitly. Nothing here is
/// global: the generator token lives inside `chain`.
pub struct Session<S = LrclibClient> {
    lyrics: LyricCache<S>,
    chain: FallbackChain,
    dispatcher: SyncDispatcher,
    history: Option<StorageHandle>,
    generic_artists: Vec<String>,
    events: mpsc::Sender<Event>,
}

impl Session<LrclibClient> {
    pub fn from_config(cfg: &Config, events: mpsc::Sender<Event>) -> anyhow::Result<Self> {
        let lyrics = LyricCache::new(LrclibClient::new(&cfg.lyrics)?);
        let chain = FallbackChain::from_config(cfg)?;
        let mut session = Self::new(lyrics, chain, cfg, events);
        session.history = Some(StorageHandle::new(cfg.history_path()));
        Ok(session)
    }
}

impl<S: LyricSearch> Session<S> {
    /// A session without transcription history.
    pub fn new(
        lyrics: LyricCache<S>,
        chain: FallbackChain,
        cfg: &Config,
        events: mpsc::Sender<Event>,
    ) -> Self {
        let dispatcher = SyncDispatcher::new(
            Duration::from_millis(cfg.sync.poll_interval_ms),
            events.clone(),
        );
        Self {
            lyrics,
            chain,
            dispatcher,
            history: None,
            generic_artists: cfg
                .fallback
                .generic_artists
                .iter()
                .map(|a| a.trim().to_lowercase())
                .collect(),
            events,
        }
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn history(&self) -> Option<&StorageHandle> {
        self.history.as_ref()
    }

    /// Placeholder uploader names that never have real lyrics.
    pub fn is_generic_artist(&self, artist: &str) -> bool {
        let artist = artist.trim().to_lowercase();
        self.generic_artists.iter().any(|g| *g == artist)
    }

    pub async fn lookup(&self, title: &str, artist: &str) -> Option<Arc<LyricRecord>> {
        if self.is_generic_artist(artist) {
            debug!("Skipping lyric lookup for generic artist {artist:?}");
            return None;
        }
        let found = self.lyrics.search(title, artist).await;
        debug!("lyrics cache holds {} entries", self.lyrics.len());
        found
    }

    /// Run the fallback chain, announce the result and keep it in history.
    pub async fn transcribe(&self, signal: &AudioSignal) -> Transcript {
        let transcript = self.chain.run(signal).await;

        if self
            .events
            .send(Event::Transcription(transcript.tagged.clone()))
            .await
            .is_err()
        {
            debug!("No event listener for transcription");
        }

        if let Some(history) = &self.history {
            let tagged = &transcript.tagged;
            if let Err(e) = history
                .record_transcript(
                    tagged.stage.as_str(),
                    tagged.text.clone(),
                    transcript.profile.derived_hash,
                    now_unix(),
                )
                .await
            {
                warn!("Could not store transcript: {e:#}");
            }
        }
        transcript
    }

    /// Lyrics when the track is known and found, otherwise the fallback line.
    pub async fn resolve(&self, track: Option<&TitleArtist>, signal: &AudioSignal) -> Resolution {
        if let Some(track) = track {
            if let Some(record) = self.lookup(&track.title, &track.artist).await {
                return Resolution::Lyrics(record);
            }
        }
        info!("No lyrics available, running fallback chain");
        Resolution::Transcribed(self.transcribe(signal).await)
    }

    /// Start line-by-line sync for `record`. Returns false when it carries no
    /// timed lines, leaving any current run untouched.
    pub fn follow<P>(&mut self, record: &LyricRecord, provider: Arc<P>) -> bool
    where
        P: PositionProvider + ?Sized + 'static,
    {
        let lines = record.timed_lines();
        if lines.is_empty() {
            return false;
        }
        self.dispatcher.start(lines, provider);
        true
    }

    pub fn stop_following(&mut self) {
        if self.dispatcher.is_active() {
            info!("Stopping lyric sync");
        }
        self.dispatcher.stop();
    }

    pub async fn mood(&self, text: &str) -> Mood {
        analyze_mood(self.chain.generator(), text).await
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::steady_wav;
    use crate::error::Failure;
    use crate::fallback::{Stage, UnsupportedGenerator, UnsupportedRecognizer};
    use crate::lyrics::SourceId;
    use crate::player::WallClock;
    use async_trait::async_trait;
    use events::LyricsEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSearch {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LyricSearch for FakeSearch {
        async fn search(&self, title: &str, _artist: &str) -> Result<Option<LyricRecord>, Failure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if title != "September" {
                return Ok(None);
            }
            Ok(Some(LyricRecord {
                plain_text: vec!["Do you remember".into()],
                timed_text: Some("[00:00.50]Do you remember\n[00:01.50]the 21st night".into()),
                duration_secs: Some(215.0),
                source_id: SourceId::External,
            }))
        }
    }

    fn session() -> (Session<FakeSearch>, Arc<AtomicUsize>, mpsc::Receiver<Event>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cfg = Config::default();
        let chain = FallbackChain::new(
            &cfg.fallback,
            Box::new(UnsupportedRecognizer),
            Arc::new(UnsupportedGenerator),
        );
        let (tx, rx) = mpsc::channel(16);
        let lyrics = LyricCache::new(FakeSearch {
            calls: Arc::clone(&calls),
        });
        (Session::new(lyrics, chain, &cfg, tx), calls, rx)
    }

    fn track(artist: &str, title: &str) -> TitleArtist {
        TitleArtist {
            artist: artist.into(),
            title: title.into(),
        }
    }

    #[test]
    fn test_generic_artists_case_insensitive() {
        let (s, _, _) = session();
        assert!(s.is_generic_artist("YouTube"));
        assert!(s.is_generic_artist("  Local File "));
        assert!(!s.is_generic_artist("Earth, Wind & Fire"));
    }

    #[tokio::test]
    async fn test_resolve_prefers_lyrics() {
        let (s, calls, mut rx) = session();
        let found = s
            .resolve(Some(&track("Earth, Wind & Fire", "September")), &steady_wav(0.5))
            .await;
        assert!(matches!(found, Resolution::Lyrics(r) if r.plain_text[0] == "Do you remember"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_generic_artist_goes_straight_to_fallback() {
        let (s, calls, mut rx) = session();
        let out = s
            .resolve(Some(&track("Demo Artist", "September")), &steady_wav(0.5))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let Resolution::Transcribed(t) = out else {
            panic!("expected a transcript");
        };
        // Both collaborators are unsupported, so the vocal catalog answers.
        assert_eq!(t.tagged.stage, Stage::Isolation);
        match rx.try_recv() {
            Ok(Event::Transcription(tagged)) => assert_eq!(tagged, t.tagged),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_track_without_label_transcribes() {
        let (s, calls, _rx) = session();
        let out = s.resolve(None, &AudioSignal::new(vec![1u8; 50])).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(out, Resolution::Transcribed(t) if t.tagged.stage == Stage::Heuristic));
    }

    #[tokio::test]
    async fn test_transcribe_without_listener() {
        let (s, _, rx) = session();
        drop(rx);
        let out = s.transcribe(&AudioSignal::new(vec![3u8; 50])).await;
        assert_eq!(out.tagged.stage, Stage::Heuristic);
        assert!(!out.tagged.text.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_emits_lines() {
        let (mut s, _, mut rx) = session();
        let record = s.lookup("September", "Earth, Wind & Fire").await.unwrap();
        assert!(s.follow(&record, Arc::new(WallClock::starting_at(0.0))));

        tokio::time::sleep(Duration::from_millis(1800)).await;
        s.stop_following();

        let mut seen = Vec::new();
        while let Ok(Event::Lyrics(LyricsEvent::LineChanged { text })) = rx.try_recv() {
            seen.push(text);
        }
        assert_eq!(seen, vec!["Do you remember", "the 21st night"]);
    }

    #[tokio::test]
    async fn test_follow_without_timed_text() {
        let (mut s, _, _) = session();
        let record = LyricRecord {
            plain_text: vec!["only plain".into()],
            timed_text: None,
            duration_secs: None,
            source_id: SourceId::External,
        };
        assert!(!s.follow(&record, Arc::new(WallClock::starting_at(0.0))));
    }
}
