//! Deterministic stand-ins for audio analysis.
//!
//! Nothing here is signal processing. The profile is derived from a hash of
//! the payload bytes and the "vocal" score from sample amplitudes, so the
//! same payload always produces the same numbers.

use super::DecodedAudio;

/// Bytes of the payload that feed the hash.
pub const HASH_WINDOW: usize = 1000;
/// Roughly how many samples the vocal score looks at.
const VOCAL_SAMPLE_POINTS: usize = 1000;
/// Amplitude band (exclusive) counted as vocal energy.
const VOCAL_BAND_LOW: f32 = 0.1;
const VOCAL_BAND_HIGH: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalProfile {
    /// 0.0..1.0
    pub intensity: f64,
    /// 1..=7
    pub rhythm_class: u8,
    /// 1..=5
    pub tone_class: u8,
    /// 0.0..=1.0, zero when the payload could not be decoded
    pub vocal_confidence: f64,
    pub derived_hash: u32,
}

impl SignalProfile {
    pub fn from_hash(hash: i32, vocal_confidence: f64) -> Self {
        let h = hash.unsigned_abs();
        Self {
            intensity: f64::from(h % 100) / 100.0,
            rhythm_class: (h % 7) as u8 + 1,
            tone_class: (h % 5) as u8 + 1,
            vocal_confidence,
            derived_hash: h,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VocalAnalysis {
    pub vocal_confidence: f64,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub average_amplitude: f64,
}

/// `hash = hash * 31 + byte` over the first [`HASH_WINDOW`] bytes, wrapping
/// in 32-bit signed arithmetic.
pub fn rolling_hash(bytes: &[u8]) -> i32 {
    bytes
        .iter()
        .take(HASH_WINDOW)
        .fold(0i32, |h, &b| h.wrapping_mul(31).wrapping_add(i32::from(b)))
}

/// Share of sampled amplitude that falls inside the vocal band, doubled and
/// capped at 1. Looks at the first channel only.
pub fn vocal_analysis(audio: &DecodedAudio) -> VocalAnalysis {
    let samples = audio.channels.first().map(Vec::as_slice).unwrap_or(&[]);
    let step = (samples.len() / VOCAL_SAMPLE_POINTS).max(1);

    let mut total = 0.0f64;
    let mut in_band = 0.0f64;
    let mut count = 0usize;
    for s in samples.iter().step_by(step) {
        let a = s.abs();
        total += f64::from(a);
        count += 1;
        if a > VOCAL_BAND_LOW && a < VOCAL_BAND_HIGH {
            in_band += f64::from(a);
        }
    }

    let ratio = if total > 0.0 { in_band / total } else { 0.0 };
    VocalAnalysis {
        vocal_confidence: (ratio * 2.0).min(1.0),
        duration_secs: audio.duration_secs(),
        sample_rate: audio.sample_rate,
        average_amplitude: if count > 0 { total / count as f64 } else { 0.0 },
    }
}

/// Centre-channel extraction: `centre * 1.5 - sides * 0.5`, mixed to mono.
/// Mono input is returned unchanged.
pub fn isolate_vocals(audio: &DecodedAudio) -> DecodedAudio {
    let [left, right, ..] = audio.channels.as_slice() else {
        return audio.clone();
    };
    let mono: Vec<f32> = left
        .iter()
        .zip(right)
        .map(|(l, r)| {
            let centre = (l + r) / 2.0;
            let sides = (l - r) / 2.0;
            centre * 1.5 - sides * 0.5
        })
        .collect();
    DecodedAudio {
        channels: vec![mono],
        sample_rate: audio.sample_rate,
    }
}
