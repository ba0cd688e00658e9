//! Substitute text for segments with no known lyrics.
//!
//! A request first passes the isolation gate: the segment is decoded and its
//! vocal score must exceed the configured threshold. Past the gate the
//! isolated stem goes to the speech recognizer, then to the text generator,
//! and finally to the vocal-band catalog. A segment that fails the gate goes
//! straight to the signal catalog. The catalogs always produce a line, so
//! every request ends with exactly one [`TaggedText`].

pub mod catalog;
pub mod generator;
pub mod recognizer;

pub use generator::{Mood, ReplicateClient, TextGenerator, UnsupportedGenerator, analyze_mood};
pub use recognizer::{CommandRecognizer, SpeechRecognizer, UnsupportedRecognizer};

use crate::analysis::heuristics::rolling_hash;
use crate::analysis::{
    AudioSignal, HeuristicAnalyzer, IsolatedVocals, SignalAnalysis, SignalAnalyzer, SignalProfile,
};
use crate::config::{Config, FallbackConfig};
use crate::error::Failure;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which step of the chain produced a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Isolation,
    Recognizer,
    Generative,
    Heuristic,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Isolation => "isolation",
            Self::Recognizer => "recognizer",
            Self::Generative => "generative",
            Self::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedText {
    pub stage: Stage,
    pub text: String,
}

impl fmt::Display for TaggedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.text)
    }
}

/// Chain result plus the profile it was derived from.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub tagged: TaggedText,
    pub profile: SignalProfile,
}

const ISOLATED_PLAN: &[Stage] = &[Stage::Recognizer, Stage::Generative, Stage::Isolation];
const SIGNAL_PLAN: &[Stage] = &[Stage::Heuristic];

/// Inputs every stage may read.
struct Request<'a> {
    profile: &'a SignalProfile,
    vocals: Option<&'a IsolatedVocals>,
}

pub struct FallbackChain {
    analyzer: Arc<dyn SignalAnalyzer>,
    recognizer: Box<dyn SpeechRecognizer>,
    generator: Arc<dyn TextGenerator>,
    vocal_threshold: f64,
    recognizer_timeout: Duration,
}

impl FallbackChain {
    pub fn new(
        cfg: &FallbackConfig,
        recognizer: Box<dyn SpeechRecognizer>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            analyzer: Arc::new(HeuristicAnalyzer),
            recognizer,
            generator,
            vocal_threshold: cfg.vocal_threshold,
            recognizer_timeout: Duration::from_secs(cfg.recognizer_timeout_secs),
        }
    }

    /// Build the collaborators named in `cfg`. Missing ones are replaced by
    /// stand-ins that report `Unsupported`.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let recognizer: Box<dyn SpeechRecognizer> = match &cfg.fallback.recognizer_command {
            Some(argv) => Box::new(CommandRecognizer::new(argv.clone())?),
            None => Box::new(UnsupportedRecognizer),
        };
        let generator: Arc<dyn TextGenerator> = match &cfg.generator.token {
            Some(token) if !token.trim().is_empty() => {
                Arc::new(ReplicateClient::new(&cfg.generator, token.clone())?)
            }
            _ => Arc::new(UnsupportedGenerator),
        };
        Ok(Self::new(&cfg.fallback, recognizer, generator))
    }

    /// Decode and measure `signal` on the blocking pool.
    pub async fn analyze(&self, signal: &AudioSignal) -> SignalAnalysis {
        let analyzer = Arc::clone(&self.analyzer);
        let owned = signal.clone();
        let threshold = self.vocal_threshold;
        match tokio::task::spawn_blocking(move || analyzer.analyze(&owned, threshold)).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Signal analysis task failed: {e}");
                SignalAnalysis {
                    profile: SignalProfile::from_hash(rolling_hash(signal.bytes()), 0.0),
                    vocals: Err(Failure::malformed(format!("analysis task: {e}"))),
                }
            }
        }
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    /// Run the chain over one segment. Always yields a line.
    pub async fn run(&self, signal: &AudioSignal) -> Transcript {
        let SignalAnalysis { profile, vocals } = self.analyze(signal).await;
        let vocals = match vocals {
            Ok(v) => {
                debug!(
                    "Isolated vocals (confidence {:.2}, {:.1}s)",
                    v.analysis.vocal_confidence, v.analysis.duration_secs
                );
                Some(v)
            }
            Err(failure) => {
                info!("Skipping vocal isolation: {failure}");
                None
            }
        };

        let request = Request {
            profile: &profile,
            vocals: vocals.as_ref(),
        };
        let plan = if vocals.is_some() {
            ISOLATED_PLAN
        } else {
            SIGNAL_PLAN
        };

        for &stage in plan {
            match self.attempt(stage, &request).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!("Fallback produced text at {stage} stage");
                    return Transcript {
                        tagged: TaggedText {
                            stage,
                            text: text.trim().to_string(),
                        },
                        profile,
                    };
                }
                Ok(_) => warn!("{stage} stage failed: {}", Failure::NotFound),
                Err(failure) => warn!("{stage} stage failed: {failure}"),
            }
        }

        // Unreachable while every plan ends in a catalog stage.
        Transcript {
            tagged: TaggedText {
                stage: Stage::Heuristic,
                text: catalog::select_for_signal(&profile).to_string(),
            },
            profile,
        }
    }

    async fn attempt(&self, stage: Stage, req: &Request<'_>) -> Result<String, Failure> {
        match stage {
            Stage::Recognizer => {
                let vocals = req.vocals.ok_or(Failure::NotFound)?;
                tokio::time::timeout(self.recognizer_timeout, self.recognizer.recognize(&vocals.wav))
                    .await
                    .map_err(|_| Failure::Timeout(self.recognizer_timeout))?
            }
            Stage::Generative => {
                let vocals = req.vocals.ok_or(Failure::NotFound)?;
                let prompt = generator::build_prompt(req.profile, &vocals.analysis);
                self.generator.generate(&prompt).await
            }
            Stage::Isolation => {
                let vocals = req.vocals.ok_or(Failure::NotFound)?;
                Ok(
                    catalog::select_for_vocals(req.profile, &vocals.analysis, vocals.wav.len())
                        .to_string(),
                )
            }
            Stage::Heuristic => Ok(catalog::select_for_signal(req.profile).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::steady_wav;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned answer plus a call counter.
    struct Fake {
        reply: Result<String, Failure>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl Fake {
        fn new(reply: Result<&str, Failure>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let fake = Self {
                reply: reply.map(str::to_string),
                delay: Duration::ZERO,
                calls: Arc::clone(&calls),
            };
            (fake, calls)
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        async fn answer(&self) -> Result<String, Failure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone()
        }
    }

    #[async_trait]
    impl SpeechRecognizer for Fake {
        async fn recognize(&self, _wav: &[u8]) -> Result<String, Failure> {
            self.answer().await
        }
    }

    #[async_trait]
    impl TextGenerator for Fake {
        async fn generate(&self, _prompt: &str) -> Result<String, Failure> {
            self.answer().await
        }
    }

    fn chain(recognizer: Fake, generator: Fake) -> FallbackChain {
        FallbackChain::new(
            &FallbackConfig::default(),
            Box::new(recognizer),
            Arc::new(generator),
        )
    }

    #[test]
    fn test_tagged_text_display() {
        let t = TaggedText {
            stage: Stage::Generative,
            text: "Hold me close".into(),
        };
        assert_eq!(t.to_string(), "[generative] Hold me close");
    }

    #[tokio::test]
    async fn test_recognizer_wins_first() {
        let (rec, rec_calls) = Fake::new(Ok("  we sang all night  "));
        let (gen_, gen_calls) = Fake::new(Ok("unused"));
        let out = chain(rec, gen_).run(&steady_wav(0.5)).await;

        assert_eq!(out.tagged.stage, Stage::Recognizer);
        assert_eq!(out.tagged.text, "we sang all night");
        assert_eq!(rec_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gen_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generator_after_recognizer_fails() {
        let (rec, _) = Fake::new(Err(Failure::Unsupported("none".into())));
        let (gen_, gen_calls) = Fake::new(Ok("Lights down low"));
        let out = chain(rec, gen_).run(&steady_wav(0.5)).await;

        assert_eq!(out.tagged.stage, Stage::Generative);
        assert_eq!(out.tagged.text, "Lights down low");
        assert_eq!(gen_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_answers_fall_through_to_vocal_catalog() {
        let (rec, _) = Fake::new(Ok("   "));
        let (gen_, _) = Fake::new(Err(Failure::Transport("offline".into())));
        let signal = steady_wav(0.5);
        let out = chain(rec, gen_).run(&signal).await;

        assert_eq!(out.tagged.stage, Stage::Isolation);
        let vocals = HeuristicAnalyzer.analyze(&signal, 0.6).vocals.unwrap();
        let expected = catalog::select_for_vocals(&out.profile, &vocals.analysis, vocals.wav.len());
        assert_eq!(out.tagged.text, expected);
    }

    #[tokio::test]
    async fn test_low_vocal_confidence_skips_collaborators() {
        let (rec, rec_calls) = Fake::new(Ok("never"));
        let (gen_, gen_calls) = Fake::new(Ok("never"));
        let out = chain(rec, gen_).run(&steady_wav(0.05)).await;

        assert_eq!(out.tagged.stage, Stage::Heuristic);
        assert_eq!(out.tagged.text, catalog::select_for_signal(&out.profile));
        assert_eq!(rec_calls.load(Ordering::SeqCst), 0);
        assert_eq!(gen_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_signal_same_line() {
        let signal = AudioSignal::new((0..50u8).collect::<Vec<_>>());
        let (rec, _) = Fake::new(Ok("never"));
        let (gen_, _) = Fake::new(Ok("never"));
        let chain = chain(rec, gen_);

        let a = chain.run(&signal).await;
        let b = chain.run(&signal).await;
        assert_eq!(a.tagged, b.tagged);
        assert_eq!(a.tagged.stage, Stage::Heuristic);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_recognizer_times_out() {
        let (rec, rec_calls) = Fake::new(Ok("too late"));
        let rec = rec.slow(Duration::from_secs(30));
        let (gen_, _) = Fake::new(Ok("Lights down low"));

        let started = tokio::time::Instant::now();
        let out = chain(rec, gen_).run(&steady_wav(0.5)).await;

        assert_eq!(out.tagged.stage, Stage::Generative);
        assert_eq!(rec_calls.load(Ordering::SeqCst), 1);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(30));
    }

    /// Stands in for a slow decode by holding its thread.
    struct StallingAnalyzer(Duration);

    impl SignalAnalyzer for StallingAnalyzer {
        fn analyze(&self, signal: &AudioSignal, threshold: f64) -> SignalAnalysis {
            std::thread::sleep(self.0);
            HeuristicAnalyzer.analyze(signal, threshold)
        }
    }

    #[tokio::test]
    async fn test_analysis_leaves_runtime_free() {
        let (rec, _) = Fake::new(Ok("we sang all night"));
        let (gen_, _) = Fake::new(Ok("unused"));
        let mut chain = chain(rec, gen_);
        chain.analyzer = Arc::new(StallingAnalyzer(Duration::from_millis(300)));

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        let out = chain.run(&steady_wav(0.5)).await;
        ticker.abort();

        assert_eq!(out.tagged.stage, Stage::Recognizer);
        // a blocked current-thread runtime would tick at most once
        assert!(ticks.load(Ordering::SeqCst) >= 20);
    }
}
