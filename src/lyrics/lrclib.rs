//! LRCLIB API client
//!
//! LRCLIB is a free lyrics API that provides synchronized (LRC format) lyrics.
//! API Documentation: https://lrclib.net/docs

use crate::config::LyricsConfig;
use crate::error::Failure;
use crate::lyrics::{LyricRecord, LyricSearch, SourceId};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// LRCLIB search result entry
#[derive(Debug, Deserialize, Clone)]
pub struct LrclibResponse {
    #[serde(rename = "plainLyrics")]
    pub plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    pub synced_lyrics: Option<String>,
    pub duration: Option<f64>,
}

impl LrclibResponse {
    pub fn into_record(self) -> LyricRecord {
        let plain_text = self
            .plain_lyrics
            .as_deref()
            .map(|p| p.lines().map(str::to_string).collect())
            .unwrap_or_default();
        let timed_text = self.synced_lyrics.filter(|s| !s.trim().is_empty());

        LyricRecord {
            plain_text,
            timed_text,
            duration_secs: self.duration,
            source_id: SourceId::External,
        }
    }
}

/// LRCLIB API client
#[derive(Debug, Clone)]
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: String,
}

impl LrclibClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://lrclib.net/api";
    pub const USER_AGENT: &'static str = "verse/0.1.0 (https://github.com/verse-lyrics/verse)";

    /// Create a new LRCLIB client
    pub fn new(cfg: &LyricsConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build lrclib http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, track_name: &str, artist_name: &str) -> String {
        format!(
            "{}/search?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(track_name),
            urlencoding::encode(artist_name)
        )
    }
}

#[async_trait]
impl LyricSearch for LrclibClient {
    /// Search for lyrics and keep the first result
    async fn search(&self, title: &str, artist: &str) -> Result<Option<LyricRecord>, Failure> {
        let url = self.search_url(title, artist);
        debug!("lrclib search: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Failure::Transport(format!(
                "LRCLIB search error: {}",
                response.status()
            )));
        }

        let results: Vec<LrclibResponse> = response.json().await.map_err(Failure::malformed)?;
        Ok(results.into_iter().next().map(LrclibResponse::into_record))
    }
}
