//! Audio analysis behind the [`SignalAnalyzer`] seam.
//!
//! The shipped analyzer is [`HeuristicAnalyzer`], which only hashes bytes and
//! measures amplitudes. A spectral implementation can replace it without the
//! fallback chain noticing.

pub mod decode;
pub mod heuristics;

pub use decode::DecodedAudio;
pub use heuristics::{SignalProfile, VocalAnalysis};

use crate::error::Failure;
use std::path::Path;
use std::sync::Arc;

/// One recorded audio segment in its container format (WAV, FLAC, Ogg).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSignal {
    bytes: Arc<[u8]>,
}

impl AudioSignal {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub async fn read(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        Ok(Self::new(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Output of the isolation step: the vocal stem and what was measured on
/// the way.
#[derive(Debug, Clone)]
pub struct IsolatedVocals {
    pub analysis: VocalAnalysis,
    /// Vocal stem as 16-bit PCM WAV
    pub wav: Vec<u8>,
}

/// Everything measured on one segment: the profile always, the vocal stem
/// only when the segment passed the isolation gate.
#[derive(Debug, Clone)]
pub struct SignalAnalysis {
    pub profile: SignalProfile,
    pub vocals: Result<IsolatedVocals, Failure>,
}

/// Analysis is CPU-bound and synchronous; async callers run it on the
/// blocking pool.
pub trait SignalAnalyzer: Send + Sync {
    /// Decode the payload once, derive its profile and pull out a vocal stem
    /// when the vocal score exceeds `threshold`. The profile is a pure
    /// function of the payload bytes.
    fn analyze(&self, signal: &AudioSignal, threshold: f64) -> SignalAnalysis;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

impl SignalAnalyzer for HeuristicAnalyzer {
    fn analyze(&self, signal: &AudioSignal, threshold: f64) -> SignalAnalysis {
        let hash = heuristics::rolling_hash(signal.bytes());
        let audio = match decode::decode(signal.bytes()) {
            Ok(audio) => audio,
            Err(failure) => {
                return SignalAnalysis {
                    profile: SignalProfile::from_hash(hash, 0.0),
                    vocals: Err(failure),
                };
            }
        };

        let analysis = heuristics::vocal_analysis(&audio);
        let profile = SignalProfile::from_hash(hash, analysis.vocal_confidence);
        let vocals = if analysis.vocal_confidence > threshold {
            Ok(IsolatedVocals {
                analysis,
                wav: heuristics::isolate_vocals(&audio).to_wav(),
            })
        } else {
            Err(Failure::InsufficientVocalConfidence(
                analysis.vocal_confidence,
            ))
        };
        SignalAnalysis { profile, vocals }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Stereo WAV whose samples all sit at `amplitude`.
    pub(crate) fn steady_wav(amplitude: f32) -> AudioSignal {
        let audio = DecodedAudio {
            channels: vec![vec![amplitude; 8000], vec![amplitude; 8000]],
            sample_rate: 8000,
        };
        AudioSignal::new(audio.to_wav())
    }

    #[test]
    fn test_profile_is_deterministic() {
        let payload: Vec<u8> = (0..50u8).map(|b| b.wrapping_mul(37).wrapping_add(11)).collect();
        let a = HeuristicAnalyzer
            .analyze(&AudioSignal::new(payload.clone()), 0.6)
            .profile;
        let b = HeuristicAnalyzer.analyze(&AudioSignal::new(payload), 0.6).profile;
        assert_eq!(a, b);
        assert_eq!(a.rhythm_class, b.rhythm_class);
        assert_eq!(a.vocal_confidence, b.vocal_confidence);
        assert_eq!(a.vocal_confidence, 0.0);
    }

    #[test]
    fn test_profile_reads_vocal_confidence_from_audio() {
        let out = HeuristicAnalyzer.analyze(&steady_wav(0.5), 0.6);
        assert!(out.profile.vocal_confidence > 0.99);
        let vocals = out.vocals.unwrap();
        assert_eq!(vocals.analysis.vocal_confidence, out.profile.vocal_confidence);
    }

    #[test]
    fn test_isolation_gate() {
        let quiet = HeuristicAnalyzer.analyze(&steady_wav(0.05), 0.6);
        assert!(matches!(quiet.vocals, Err(Failure::InsufficientVocalConfidence(c)) if c == 0.0));
        assert_eq!(quiet.profile.vocal_confidence, 0.0);

        let sung = HeuristicAnalyzer.analyze(&steady_wav(0.5), 0.6).vocals.unwrap();
        assert!(sung.analysis.vocal_confidence > 0.6);
        assert!((sung.analysis.duration_secs - 1.0).abs() < 1e-9);
        // mono stem: 44 header bytes + 2 bytes per frame
        assert_eq!(sung.wav.len(), 44 + 8000 * 2);
    }

    #[test]
    fn test_undecodable_payload_fails_isolation() {
        let junk = AudioSignal::new(vec![0u8; 50]);
        let out = HeuristicAnalyzer.analyze(&junk, 0.6);
        assert!(matches!(out.vocals, Err(Failure::Malformed(_))));
        assert_eq!(out.profile.vocal_confidence, 0.0);
    }
}
