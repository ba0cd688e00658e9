//! Fixed phrase catalogs for the last-resort stages.
//!
//! Selection is `derived_hash % catalog.len()`, so a given payload always maps
//! to the same phrase.

use crate::analysis::{SignalProfile, VocalAnalysis};

const HIGH_ENERGY: &[&str] = &[
    "Electric energy fills the air tonight",
    "Pounding beats make my heart race wild",
    "Dancing until the break of dawn",
    "Feel the power coursing through my veins",
    "Explosive rhythms shake the ground",
];

const RHYTHMIC: &[&str] = &[
    "Steady beats guide my moving feet",
    "Rhythm and rhyme in perfect time",
    "Groove so deep it moves my spirit",
    "Bass lines rumble through my chest",
    "Syncopated patterns hypnotize",
];

const EMOTIONAL: &[&str] = &[
    "Tears of joy fall like summer rain",
    "My heart sings with overwhelming love",
    "Deep emotions rise from within",
    "Memories painted in musical colors",
    "Soul searching through melodic dreams",
];

const MELODIC: &[&str] = &[
    "Gentle melodies carry me away",
    "Soft harmonies touch my soul",
    "Music flows like a peaceful river",
    "Sweet voices sing of love and hope",
    "Tender moments wrapped in song",
];

const VOCAL_RICH: &[&str] = &[
    "Crystal clear vocals soar above the melody",
    "Powerful voice cuts through the harmony",
    "Emotional singing reaches deep into the soul",
    "Strong vocals carry the weight of emotion",
    "Clear pronunciation tells a beautiful story",
];

const VOCAL_CLEAR: &[&str] = &[
    "Soft vocals blend seamlessly with the music",
    "Gentle singing creates atmospheric beauty",
    "Melodic voice weaves through instrumental layers",
    "Subtle vocals add texture to the soundscape",
    "Harmonic singing enhances the musical journey",
];

const VOCAL_SOFT: &[&str] = &[
    "Background vocals add depth and richness",
    "Layered harmonies create sonic texture",
    "Vocal embellishments enhance the arrangement",
    "Supporting voices lift the main melody",
    "Choral elements enrich the musical tapestry",
];

const VOCAL_FAINT: &[&str] = &[
    "Pure instrumental expression speaks volumes",
    "Music without words tells its own story",
    "Melodic instruments replace vocal narratives",
    "Emotional music transcends spoken language",
    "Instrumental poetry flows through sound",
];

/// Which signal class a profile falls into. First match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalClass {
    HighEnergy,
    Rhythmic,
    Emotional,
    Melodic,
}

impl SignalClass {
    pub fn of(profile: &SignalProfile) -> Self {
        if profile.intensity > 0.7 {
            Self::HighEnergy
        } else if profile.rhythm_class > 5 {
            Self::Rhythmic
        } else if profile.tone_class <= 2 {
            Self::Emotional
        } else {
            Self::Melodic
        }
    }

    fn phrases(self) -> &'static [&'static str] {
        match self {
            Self::HighEnergy => HIGH_ENERGY,
            Self::Rhythmic => RHYTHMIC,
            Self::Emotional => EMOTIONAL,
            Self::Melodic => MELODIC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocalBand {
    Rich,
    Clear,
    Soft,
    Faint,
}

impl VocalBand {
    /// `complexity = (stem_len / 10000) * vocal_confidence`
    pub fn of(analysis: &VocalAnalysis, stem_len: usize) -> Self {
        let vc = analysis.vocal_confidence;
        let complexity = (stem_len as f64 / 10_000.0) * vc;
        if vc > 0.8 && complexity > 0.5 {
            Self::Rich
        } else if vc > 0.5 {
            Self::Clear
        } else if vc > 0.3 {
            Self::Soft
        } else {
            Self::Faint
        }
    }

    fn phrases(self) -> &'static [&'static str] {
        match self {
            Self::Rich => VOCAL_RICH,
            Self::Clear => VOCAL_CLEAR,
            Self::Soft => VOCAL_SOFT,
            Self::Faint => VOCAL_FAINT,
        }
    }
}

fn pick(phrases: &'static [&'static str], hash: u32) -> &'static str {
    phrases[hash as usize % phrases.len()]
}

pub fn select_for_signal(profile: &SignalProfile) -> &'static str {
    pick(SignalClass::of(profile).phrases(), profile.derived_hash)
}

pub fn select_for_vocals(
    profile: &SignalProfile,
    analysis: &VocalAnalysis,
    stem_len: usize,
) -> &'static str {
    pick(
        VocalBand::of(analysis, stem_len).phrases(),
        profile.derived_hash,
    )
}
