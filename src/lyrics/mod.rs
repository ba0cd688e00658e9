//! Lyrics acquisition and timed-lyrics parsing
//!
//! This module provides:
//! - Title/artist extraction from free-form labels
//! - LRCLIB API client behind the [`LyricSearch`] seam
//! - A key-normalized, write-through cache in front of the search
//! - LRC format parser for synchronized lyrics

pub mod cache;
pub mod lrclib;
pub mod parser;
pub mod title;

pub use cache::{LyricCache, LyricSearch};
pub use lrclib::LrclibClient;
pub use parser::TimedLine;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceId {
    External,
    None,
}

/// Lyrics for one track. Never mutated after it is fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricRecord {
    /// Plain lyrics, one entry per line
    pub plain_text: Vec<String>,
    /// Raw LRC source, when the provider had synced lyrics
    pub timed_text: Option<String>,
    /// Track length reported by the provider
    pub duration_secs: Option<f64>,
    pub source_id: SourceId,
}

impl LyricRecord {
    /// Record built from a local LRC file rather than a provider.
    pub fn from_lrc(raw: String) -> Self {
        let plain_text = parser::parse(&raw).into_iter().map(|l| l.text).collect();
        Self {
            plain_text,
            timed_text: Some(raw),
            duration_secs: None,
            source_id: SourceId::None,
        }
    }

    pub fn timed_lines(&self) -> Vec<TimedLine> {
        self.timed_text
            .as_deref()
            .map(parser::parse)
            .unwrap_or_default()
    }

    /// First `n` non-blank plain lines.
    pub fn preview(&self, n: usize) -> Vec<&str> {
        self.plain_text
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .take(n)
            .collect()
    }
}
