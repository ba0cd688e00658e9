//! Generative-text collaborator: a Replicate-style prediction endpoint.

use crate::analysis::{SignalProfile, VocalAnalysis};
use crate::config::GeneratorConfig;
use crate::error::Failure;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, Failure>;
}

/// Stand-in used when no API token is configured.
#[derive(Debug, Default)]
pub struct UnsupportedGenerator;

#[async_trait]
impl TextGenerator for UnsupportedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, Failure> {
        Err(Failure::Unsupported("no generator token configured".into()))
    }
}

#[derive(Debug, Clone)]
pub struct ReplicateClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    token: String,
}

impl ReplicateClient {
    pub fn new(cfg: &GeneratorConfig, token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("build generator http client")?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            token,
        })
    }
}

#[async_trait]
impl TextGenerator for ReplicateClient {
    async fn generate(&self, prompt: &str) -> Result<String, Failure> {
        let body = json!({
            "model": self.model,
            "input": { "prompt": prompt },
        });
        debug!("generator request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Failure::Transport(format!(
                "generator error: {}",
                response.status()
            )));
        }

        let value: Value = response.json().await.map_err(Failure::malformed)?;
        let output = output_text(&value)?;
        let text = clean_output(&output);
        if text.is_empty() {
            return Err(Failure::NotFound);
        }
        Ok(text)
    }
}

/// `output` is either one string or a list of streamed fragments.
fn output_text(value: &Value) -> Result<String, Failure> {
    match &value["output"] {
        Value::String(s) => Ok(s.clone()),
        Value::Array(parts) => Ok(parts.iter().filter_map(Value::as_str).collect()),
        Value::Null => Err(Failure::NotFound),
        other => Err(Failure::Malformed(format!("unexpected output: {other}"))),
    }
}

/// Strip surrounding quotes and a leading `Lyrics:` label.
pub fn clean_output(raw: &str) -> String {
    let mut text = raw.trim();
    if text.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("lyrics:")) {
        text = text[7..].trim_start();
    }
    text.trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

fn rhythm_label(rhythm_class: u8) -> &'static str {
    match rhythm_class {
        6..=u8::MAX => "driving",
        4..=5 => "steady",
        _ => "loose",
    }
}

fn tone_label(tone_class: u8) -> &'static str {
    match tone_class {
        0..=2 => "dark",
        3 => "balanced",
        _ => "bright",
    }
}

pub fn build_prompt(profile: &SignalProfile, vocals: &VocalAnalysis) -> String {
    format!(
        "A short audio clip has been analyzed.\n\
         Vocal confidence: {:.0}%\n\
         Duration: {:.1} seconds\n\
         Energy: {:.0}%\n\
         Intensity: {:.2}\n\
         Rhythm: class {} ({})\n\
         Tone: class {} ({})\n\
         Write 1-2 short lines of song lyrics that could plausibly be sung in this clip. \
         Reply with the lyrics only.",
        vocals.vocal_confidence * 100.0,
        vocals.duration_secs,
        vocals.average_amplitude * 100.0,
        profile.intensity,
        profile.rhythm_class,
        rhythm_label(profile.rhythm_class),
        profile.tone_class,
        tone_label(profile.tone_class),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mood {
    pub mood: String,
    pub colors: Vec<String>,
    pub keywords: Vec<String>,
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            mood: "neutral".to_string(),
            colors: vec!["#4ecdc4".into(), "#45b7d1".into(), "#96ceb4".into()],
            keywords: vec!["music".into(), "song".into(), "melody".into()],
        }
    }
}

fn mood_prompt(text: &str) -> String {
    format!(
        "Analyze the mood of these lyrics: \"{text}\"\n\
         Respond with a JSON object only, shaped like \
         {{\"mood\": \"one word\", \"colors\": [\"#hex\", \"#hex\", \"#hex\"], \
         \"keywords\": [\"word\", \"word\", \"word\"]}}"
    )
}

/// Decode the `{...}` span of a generator reply.
pub fn parse_mood(reply: &str) -> Option<Mood> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

/// Never fails: any problem yields the neutral mood.
pub async fn analyze_mood(generator: &dyn TextGenerator, text: &str) -> Mood {
    match generator.generate(&mood_prompt(text)).await {
        Ok(reply) => parse_mood(&reply).unwrap_or_else(|| {
            warn!("Mood reply was not JSON, using neutral mood");
            Mood::default()
        }),
        Err(err) => {
            warn!("Mood analysis failed: {err}");
            Mood::default()
        }
    }
}
